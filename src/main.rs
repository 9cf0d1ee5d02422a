use std::process::ExitCode;

use clap::{Arg, ArgMatches, Command};
use serde_json::json;
use tokio::io::AsyncReadExt;

use formbuilder::config::Config;
use formbuilder::db;
use formbuilder::errors::AppError;
use formbuilder::models::element::ElementKind;
use formbuilder::models::rule_filter::{self, FilterRequest};

fn build_cli() -> Command {
    Command::new("formbuilder")
        .about("Form templates, filled forms and rule-tree filters")
        .subcommand_required(true)
        .subcommand(Command::new("migrate").about("Apply pending database migrations"))
        .subcommand(Command::new("element-types").about("List the element type tags"))
        .subcommand(
            Command::new("filter")
                .about("Filter the forms of a template with a rule tree")
                .arg(
                    Arg::new("template")
                        .long("template")
                        .required(true)
                        .value_parser(clap::value_parser!(i64))
                        .help("Template id"),
                )
                .arg(
                    Arg::new("request")
                        .long("request")
                        .help("JSON request file ({\"query\": ..., \"elements\": [...]}); stdin when omitted"),
                ),
        )
}

#[tokio::main]
async fn main() -> ExitCode {
    env_logger::init();

    let matches = build_cli().get_matches();
    match run(&matches).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            if e.is_client_error() {
                log::warn!("{e}");
            } else {
                log::error!("{e}");
            }
            eprintln!("{e}");
            ExitCode::FAILURE
        }
    }
}

async fn run(matches: &ArgMatches) -> Result<(), AppError> {
    match matches.subcommand() {
        Some(("element-types", _)) => {
            let tags: Vec<&str> = ElementKind::ALL.iter().map(|k| k.tag()).collect();
            println!("{}", json!(tags));
            Ok(())
        }
        Some(("migrate", _)) => {
            let config = Config::from_env()?;
            let pool = db::init_pool(&config).await?;
            db::run_migrations(&pool).await
        }
        Some(("filter", sub)) => {
            let template_id = sub
                .get_one::<i64>("template")
                .copied()
                .ok_or_else(|| AppError::Validation("--template is required".to_string()))?;
            let raw = read_request(sub.get_one::<String>("request")).await?;
            let request: FilterRequest = serde_json::from_str(&raw)
                .map_err(|e| AppError::Validation(format!("Invalid filter request: {e}")))?;

            let config = Config::from_env()?;
            let pool = db::init_pool(&config).await?;
            let forms = rule_filter::evaluate(&pool, template_id, &request).await?;
            let out = serde_json::to_string_pretty(&forms)
                .map_err(|e| AppError::Validation(format!("Cannot encode result: {e}")))?;
            println!("{out}");
            Ok(())
        }
        _ => Err(AppError::Validation("Unknown command".to_string())),
    }
}

async fn read_request(path: Option<&String>) -> Result<String, AppError> {
    let read = match path {
        Some(path) => tokio::fs::read_to_string(path).await,
        None => {
            let mut buf = String::new();
            tokio::io::stdin().read_to_string(&mut buf).await.map(|_| buf)
        }
    };
    read.map_err(|e| AppError::Validation(format!("Cannot read filter request: {e}")))
}
