use sqlx::PgPool;

use super::types::{FieldDetail, NewTemplate, SubFormDetail, Template, TemplateDetail};
use crate::errors::AppError;
use crate::models::{element, field, sub_form};

const SELECT_TEMPLATE: &str =
    "SELECT id, title, description, access_level, creator_id, created_at FROM templates";

fn validate(new: &NewTemplate) -> Result<(), AppError> {
    if new.title.trim().is_empty() {
        return Err(AppError::Validation("Title is required".to_string()));
    }
    if new.access_level < 0 {
        return Err(AppError::Validation("Access level must not be negative".to_string()));
    }
    Ok(())
}

pub async fn create(pool: &PgPool, new: &NewTemplate) -> Result<i64, AppError> {
    validate(new)?;
    let (id,): (i64,) = sqlx::query_as(
        "INSERT INTO templates (title, description, access_level, creator_id) \
         VALUES ($1, $2, $3, $4) RETURNING id",
    )
    .bind(&new.title)
    .bind(&new.description)
    .bind(new.access_level)
    .bind(new.creator_id)
    .fetch_one(pool)
    .await?;

    log::info!("Created template {id} ({})", new.title);
    Ok(id)
}

pub async fn find_by_id(pool: &PgPool, id: i64) -> Result<Option<Template>, AppError> {
    let template = sqlx::query_as::<_, Template>(&format!("{SELECT_TEMPLATE} WHERE id = $1"))
        .bind(id)
        .fetch_optional(pool)
        .await?;
    Ok(template)
}

/// Template with sub-forms, fields and element definitions, each level in
/// `sort_order, id` order.
pub async fn find_detail(pool: &PgPool, id: i64) -> Result<Option<TemplateDetail>, AppError> {
    let Some(template) = find_by_id(pool, id).await? else {
        return Ok(None);
    };

    let sub_forms = sub_form::list_for_template(pool, id).await?;
    let fields = field::list_for_template(pool, id).await?;
    let elements = element::list_for_template(pool, id).await?;

    let mut details = Vec::with_capacity(sub_forms.len());
    for sub_form in sub_forms {
        let field_details = fields
            .iter()
            .filter(|f| f.sub_form_id == sub_form.id)
            .map(|f| FieldDetail {
                field: f.clone(),
                elements: elements.iter().filter(|e| e.field_id == f.id).cloned().collect(),
            })
            .collect();
        details.push(SubFormDetail { sub_form, fields: field_details });
    }

    Ok(Some(TemplateDetail { template, sub_forms: details }))
}

/// Templates open to the given access level, newest first.
pub async fn list_accessible(pool: &PgPool, access_level: i32) -> Result<Vec<Template>, AppError> {
    let templates = sqlx::query_as::<_, Template>(&format!(
        "{SELECT_TEMPLATE} WHERE access_level <= $1 ORDER BY id DESC"
    ))
    .bind(access_level)
    .fetch_all(pool)
    .await?;
    Ok(templates)
}

pub async fn update(pool: &PgPool, id: i64, new: &NewTemplate) -> Result<(), AppError> {
    validate(new)?;
    let result = sqlx::query(
        "UPDATE templates SET title = $1, description = $2, access_level = $3 WHERE id = $4",
    )
    .bind(&new.title)
    .bind(&new.description)
    .bind(new.access_level)
    .bind(id)
    .execute(pool)
    .await?;
    if result.rows_affected() == 0 {
        return Err(AppError::NotFound);
    }
    Ok(())
}

/// Delete a template with its sub-forms, fields, elements and forms.
pub async fn delete(pool: &PgPool, id: i64) -> Result<(), AppError> {
    let result = sqlx::query("DELETE FROM templates WHERE id = $1").bind(id).execute(pool).await?;
    if result.rows_affected() == 0 {
        return Err(AppError::NotFound);
    }
    log::info!("Deleted template {id}");
    Ok(())
}
