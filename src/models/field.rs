use serde::{Deserialize, Serialize};
use sqlx::PgPool;

use crate::errors::AppError;

/// Named slot within a sub-form, holding element definitions.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Field {
    pub id: i64,
    pub sub_form_id: i64,
    pub title: String,
    pub sort_order: i32,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct NewField {
    pub sub_form_id: i64,
    pub title: String,
    #[serde(default)]
    pub sort_order: i32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FieldOrder {
    pub pk: i64,
    pub order: i32,
}

pub async fn create(pool: &PgPool, new: &NewField) -> Result<i64, AppError> {
    if new.title.trim().is_empty() {
        return Err(AppError::Validation("Title is required".to_string()));
    }
    let sub_form: Option<(i64,)> = sqlx::query_as("SELECT id FROM sub_forms WHERE id = $1")
        .bind(new.sub_form_id)
        .fetch_optional(pool)
        .await?;
    if sub_form.is_none() {
        return Err(AppError::NotFound);
    }

    let (id,): (i64,) = sqlx::query_as(
        "INSERT INTO fields (sub_form_id, title, sort_order) VALUES ($1, $2, $3) RETURNING id",
    )
    .bind(new.sub_form_id)
    .bind(&new.title)
    .bind(new.sort_order)
    .fetch_one(pool)
    .await?;
    Ok(id)
}

pub async fn find_by_id(pool: &PgPool, id: i64) -> Result<Option<Field>, AppError> {
    let row = sqlx::query_as::<_, Field>(
        "SELECT id, sub_form_id, title, sort_order FROM fields WHERE id = $1",
    )
    .bind(id)
    .fetch_optional(pool)
    .await?;
    Ok(row)
}

pub async fn list_for_sub_form(pool: &PgPool, sub_form_id: i64) -> Result<Vec<Field>, AppError> {
    let rows = sqlx::query_as::<_, Field>(
        "SELECT id, sub_form_id, title, sort_order FROM fields \
         WHERE sub_form_id = $1 ORDER BY sort_order, id",
    )
    .bind(sub_form_id)
    .fetch_all(pool)
    .await?;
    Ok(rows)
}

/// Every field of a template, grouped by sub-form order.
pub async fn list_for_template(pool: &PgPool, template_id: i64) -> Result<Vec<Field>, AppError> {
    let rows = sqlx::query_as::<_, Field>(
        "SELECT f.id, f.sub_form_id, f.title, f.sort_order FROM fields f \
         JOIN sub_forms s ON s.id = f.sub_form_id \
         WHERE s.template_id = $1 \
         ORDER BY s.sort_order, s.id, f.sort_order, f.id",
    )
    .bind(template_id)
    .fetch_all(pool)
    .await?;
    Ok(rows)
}

pub async fn update(pool: &PgPool, id: i64, title: &str) -> Result<(), AppError> {
    if title.trim().is_empty() {
        return Err(AppError::Validation("Title is required".to_string()));
    }
    let result = sqlx::query("UPDATE fields SET title = $1 WHERE id = $2")
        .bind(title)
        .bind(id)
        .execute(pool)
        .await?;
    if result.rows_affected() == 0 {
        return Err(AppError::NotFound);
    }
    Ok(())
}

pub async fn delete(pool: &PgPool, id: i64) -> Result<(), AppError> {
    let result = sqlx::query("DELETE FROM fields WHERE id = $1").bind(id).execute(pool).await?;
    if result.rows_affected() == 0 {
        return Err(AppError::NotFound);
    }
    Ok(())
}

/// Apply a batch of field orders; nothing is written if any field is missing.
pub async fn set_orders(pool: &PgPool, orders: &[FieldOrder]) -> Result<(), AppError> {
    let mut tx = pool.begin().await?;
    for order in orders {
        let result = sqlx::query("UPDATE fields SET sort_order = $1 WHERE id = $2")
            .bind(order.order)
            .bind(order.pk)
            .execute(&mut *tx)
            .await?;
        if result.rows_affected() == 0 {
            return Err(AppError::NotFound);
        }
    }
    tx.commit().await?;
    Ok(())
}
