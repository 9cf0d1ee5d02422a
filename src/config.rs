use std::env;

use crate::errors::AppError;

/// Default pool size, matching the connection count the server ran with before.
const DEFAULT_MAX_CONNECTIONS: u32 = 8;

/// Runtime configuration read from the environment (and `.env` when present).
#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub max_connections: u32,
}

impl Config {
    pub fn from_env() -> Result<Self, AppError> {
        if let Err(e) = dotenvy::dotenv() {
            if !e.not_found() {
                log::warn!("Ignoring unreadable .env file: {e}");
            }
        }

        let database_url = env::var("DATABASE_URL")
            .map_err(|_| AppError::Validation("DATABASE_URL is not set".to_string()))?;

        let max_connections = match env::var("DATABASE_MAX_CONNECTIONS") {
            Ok(val) => parse_max_connections(&val)?,
            Err(_) => DEFAULT_MAX_CONNECTIONS,
        };

        Ok(Config { database_url, max_connections })
    }
}

fn parse_max_connections(val: &str) -> Result<u32, AppError> {
    match val.trim().parse::<u32>() {
        Ok(n) if n > 0 => Ok(n),
        _ => Err(AppError::Validation(format!(
            "DATABASE_MAX_CONNECTIONS must be a positive integer, got {val:?}"
        ))),
    }
}
