use serde::{Deserialize, Serialize};
use sqlx::PgPool;

use crate::errors::AppError;

/// Ordered group of fields within a template.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct SubForm {
    pub id: i64,
    pub template_id: i64,
    pub title: String,
    pub description: String,
    pub sort_order: i32,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct NewSubForm {
    pub template_id: i64,
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub sort_order: i32,
}

const SELECT_SUB_FORM: &str =
    "SELECT id, template_id, title, description, sort_order FROM sub_forms";

pub async fn create(pool: &PgPool, new: &NewSubForm) -> Result<i64, AppError> {
    if new.title.trim().is_empty() {
        return Err(AppError::Validation("Title is required".to_string()));
    }
    let template: Option<(i64,)> = sqlx::query_as("SELECT id FROM templates WHERE id = $1")
        .bind(new.template_id)
        .fetch_optional(pool)
        .await?;
    if template.is_none() {
        return Err(AppError::NotFound);
    }

    let (id,): (i64,) = sqlx::query_as(
        "INSERT INTO sub_forms (template_id, title, description, sort_order) \
         VALUES ($1, $2, $3, $4) RETURNING id",
    )
    .bind(new.template_id)
    .bind(&new.title)
    .bind(&new.description)
    .bind(new.sort_order)
    .fetch_one(pool)
    .await?;
    Ok(id)
}

pub async fn find_by_id(pool: &PgPool, id: i64) -> Result<Option<SubForm>, AppError> {
    let row = sqlx::query_as::<_, SubForm>(&format!("{SELECT_SUB_FORM} WHERE id = $1"))
        .bind(id)
        .fetch_optional(pool)
        .await?;
    Ok(row)
}

pub async fn list_for_template(pool: &PgPool, template_id: i64) -> Result<Vec<SubForm>, AppError> {
    let rows = sqlx::query_as::<_, SubForm>(&format!(
        "{SELECT_SUB_FORM} WHERE template_id = $1 ORDER BY sort_order, id"
    ))
    .bind(template_id)
    .fetch_all(pool)
    .await?;
    Ok(rows)
}

pub async fn update(
    pool: &PgPool,
    id: i64,
    title: &str,
    description: &str,
    sort_order: i32,
) -> Result<(), AppError> {
    if title.trim().is_empty() {
        return Err(AppError::Validation("Title is required".to_string()));
    }
    let result = sqlx::query(
        "UPDATE sub_forms SET title = $1, description = $2, sort_order = $3 WHERE id = $4",
    )
    .bind(title)
    .bind(description)
    .bind(sort_order)
    .bind(id)
    .execute(pool)
    .await?;
    if result.rows_affected() == 0 {
        return Err(AppError::NotFound);
    }
    Ok(())
}

pub async fn delete(pool: &PgPool, id: i64) -> Result<(), AppError> {
    let result = sqlx::query("DELETE FROM sub_forms WHERE id = $1").bind(id).execute(pool).await?;
    if result.rows_affected() == 0 {
        return Err(AppError::NotFound);
    }
    Ok(())
}
