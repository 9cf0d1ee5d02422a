//! Shared test infrastructure for model layer tests.
//!
//! Each test gets its own Postgres schema on the server named by
//! `DATABASE_URL` (read from the environment or `.env`), with all
//! migrations applied. The database tests fail when `DATABASE_URL` is unset.

#![allow(dead_code)]

use serde_json::Value;
use sqlx::postgres::PgPoolOptions;
use sqlx::{Executor, PgPool};

use formbuilder::db::MIGRATOR;
use formbuilder::models::element::{self, ElementKind, NewElement};
use formbuilder::models::data::NewData;
use formbuilder::models::field::{self, NewField};
use formbuilder::models::form::{self, NewForm};
use formbuilder::models::sub_form::{self, NewSubForm};
use formbuilder::models::template::{self, NewTemplate};

pub struct TestDb {
    pool: PgPool,
    pub schema: String,
}

impl TestDb {
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

/// Fresh schema with migrations applied.
pub async fn setup_test_db() -> TestDb {
    let _ = dotenvy::dotenv();
    let url = database_url().expect("DATABASE_URL must point at a Postgres server for database tests");

    let schema = format!("test_{:016x}", rand::random::<u64>());
    let admin = PgPool::connect(&url).await.expect("Failed to connect to test database");
    admin
        .execute(format!("CREATE SCHEMA {schema}").as_str())
        .await
        .expect("Failed to create test schema");
    admin.close().await;

    let search_path = schema.clone();
    let pool = PgPoolOptions::new()
        .max_connections(4)
        .after_connect(move |conn, _meta| {
            let sql = format!("SET search_path TO {search_path}");
            Box::pin(async move {
                conn.execute(sql.as_str()).await?;
                Ok(())
            })
        })
        .connect(&url)
        .await
        .expect("Failed to open test pool");

    MIGRATOR.run(&pool).await.expect("Failed to run migrations");

    TestDb { pool, schema }
}

fn database_url() -> Option<String> {
    std::env::var("DATABASE_URL").ok().filter(|url| !url.trim().is_empty())
}

// ============================================================================
// FIXTURES
// ============================================================================

/// A template with one sub-form holding one field, ready for elements.
pub struct TemplateFixture {
    pub template_id: i64,
    pub sub_form_id: i64,
    pub field_id: i64,
}

pub async fn create_template(pool: &PgPool, title: &str) -> TemplateFixture {
    let template_id = template::create(
        pool,
        &NewTemplate { title: title.to_string(), ..Default::default() },
    )
    .await
    .expect("Failed to create template");
    let sub_form_id = sub_form::create(
        pool,
        &NewSubForm { template_id, title: "Section".to_string(), ..Default::default() },
    )
    .await
    .expect("Failed to create sub-form");
    let field_id = field::create(
        pool,
        &NewField { sub_form_id, title: "Field".to_string(), ..Default::default() },
    )
    .await
    .expect("Failed to create field");
    TemplateFixture { template_id, sub_form_id, field_id }
}

pub async fn create_element(pool: &PgPool, field_id: i64, kind: ElementKind, title: &str) -> i64 {
    element::create(
        pool,
        kind,
        &NewElement { field_id, title: title.to_string(), ..Default::default() },
    )
    .await
    .expect("Failed to create element")
}

/// Choice element with one option per label.
pub async fn create_choice(pool: &PgPool, field_id: i64, kind: ElementKind, options: &[&str]) -> i64 {
    let data = options
        .iter()
        .map(|o| NewData { label: o.to_string(), value: o.to_string(), selected: false })
        .collect();
    element::create(
        pool,
        kind,
        &NewElement { field_id, title: format!("{kind} element"), sort_order: 0, data },
    )
    .await
    .expect("Failed to create choice element")
}

pub async fn create_form(pool: &PgPool, template_id: i64, description: &str) -> i64 {
    form::create(
        pool,
        &NewForm { template_id, filler_id: None, description: description.to_string() },
    )
    .await
    .expect("Failed to create form")
}

pub async fn answer(pool: &PgPool, form_id: i64, kind: ElementKind, element_id: i64, raw: Value) -> i64 {
    form::answer_element(pool, form_id, kind, element_id, &raw)
        .await
        .expect("Failed to answer element")
}
