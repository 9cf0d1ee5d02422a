use serde_json::Value;
use sqlx::{PgConnection, PgPool};

use super::answers;
use super::types::{Form, NewForm};
use crate::errors::AppError;
use crate::models::element::{self, ElementKind};

const SELECT_FORM: &str = "SELECT f.id, f.template_id, f.filler_id, f.description, f.fork_date FROM forms f";

/// Start a new form from a template. Returns the form id.
pub async fn create(pool: &PgPool, new: &NewForm) -> Result<i64, AppError> {
    let template: Option<(i64,)> = sqlx::query_as("SELECT id FROM templates WHERE id = $1")
        .bind(new.template_id)
        .fetch_optional(pool)
        .await?;
    if template.is_none() {
        return Err(AppError::NotFound);
    }

    let (id,): (i64,) = sqlx::query_as(
        "INSERT INTO forms (template_id, filler_id, description) VALUES ($1, $2, $3) RETURNING id",
    )
    .bind(new.template_id)
    .bind(new.filler_id)
    .bind(&new.description)
    .fetch_one(pool)
    .await?;

    log::info!("Created form {id} from template {}", new.template_id);
    Ok(id)
}

pub async fn find_by_id(pool: &PgPool, id: i64) -> Result<Option<Form>, AppError> {
    let mut conn = pool.acquire().await?;
    Ok(find_in(&mut conn, id).await?)
}

async fn find_in(conn: &mut PgConnection, id: i64) -> Result<Option<Form>, sqlx::Error> {
    sqlx::query_as::<_, Form>(&format!("{SELECT_FORM} WHERE f.id = $1"))
        .bind(id)
        .fetch_optional(&mut *conn)
        .await
}

/// Forms of a template, most recently modified first, optionally for one filler.
pub async fn list_for_template(
    pool: &PgPool,
    template_id: i64,
    filler_id: Option<i64>,
) -> Result<Vec<Form>, AppError> {
    let forms = sqlx::query_as::<_, Form>(&format!(
        "{SELECT_FORM} WHERE f.template_id = $1 AND ($2::BIGINT IS NULL OR f.filler_id = $2) \
         ORDER BY f.fork_date DESC, f.id DESC"
    ))
    .bind(template_id)
    .bind(filler_id)
    .fetch_all(pool)
    .await?;
    Ok(forms)
}

pub async fn list_by_filler(pool: &PgPool, filler_id: i64) -> Result<Vec<Form>, AppError> {
    let forms = sqlx::query_as::<_, Form>(&format!(
        "{SELECT_FORM} WHERE f.filler_id = $1 ORDER BY f.fork_date DESC, f.id DESC"
    ))
    .bind(filler_id)
    .fetch_all(pool)
    .await?;
    Ok(forms)
}

/// Forms whose template is open to the given access level.
pub async fn list_accessible(pool: &PgPool, access_level: i32) -> Result<Vec<Form>, AppError> {
    let forms = sqlx::query_as::<_, Form>(&format!(
        "{SELECT_FORM} JOIN templates t ON t.id = f.template_id \
         WHERE t.access_level <= $1 ORDER BY f.fork_date DESC, f.id DESC"
    ))
    .bind(access_level)
    .fetch_all(pool)
    .await?;
    Ok(forms)
}

pub async fn update_description(pool: &PgPool, id: i64, description: &str) -> Result<(), AppError> {
    let result = sqlx::query("UPDATE forms SET description = $1 WHERE id = $2")
        .bind(description)
        .bind(id)
        .execute(pool)
        .await?;
    if result.rows_affected() == 0 {
        return Err(AppError::NotFound);
    }
    Ok(())
}

pub async fn delete(pool: &PgPool, id: i64) -> Result<(), AppError> {
    let result = sqlx::query("DELETE FROM forms WHERE id = $1").bind(id).execute(pool).await?;
    if result.rows_affected() == 0 {
        return Err(AppError::NotFound);
    }
    Ok(())
}

/// Write the answer of a form to one element.
///
/// `element_id` may name the template definition, in which case the form's
/// answer row is fetched or created, or an existing answer of this form.
/// The raw value is normalized by the element kind; JSON null clears it.
/// Bumps the form's `fork_date`. Returns the answer id.
pub async fn answer_element(
    pool: &PgPool,
    form_id: i64,
    kind: ElementKind,
    element_id: i64,
    raw: &Value,
) -> Result<i64, AppError> {
    let value = if raw.is_null() { None } else { Some(kind.normalize(raw)?) };

    let mut tx = pool.begin().await?;

    let form = find_in(&mut tx, form_id).await?.ok_or(AppError::NotFound)?;
    let element = element::find_row(&mut tx, kind, element_id)
        .await?
        .ok_or(AppError::NotFound)?;

    let answer_id = match element.answer_of {
        None => {
            let template_id = element::template_id_of(&mut tx, kind, element_id).await?;
            if template_id != Some(form.template_id) {
                return Err(AppError::Validation("invalid element id".to_string()));
            }
            get_or_create_answer(&mut tx, kind, &element, form_id).await?
        }
        Some(_) => {
            if element.form_id != Some(form_id) {
                return Err(AppError::Validation(
                    "element is an answer of another form".to_string(),
                ));
            }
            element.id
        }
    };

    answers::write_value(&mut tx, kind, answer_id, value.as_ref()).await?;

    sqlx::query("UPDATE forms SET fork_date = now() WHERE id = $1")
        .bind(form_id)
        .execute(&mut *tx)
        .await?;

    tx.commit().await?;
    log::debug!("Form {form_id} answered {kind} element {element_id} (answer {answer_id})");
    Ok(answer_id)
}

async fn get_or_create_answer(
    conn: &mut PgConnection,
    kind: ElementKind,
    definition: &element::types::ElementRow,
    form_id: i64,
) -> Result<i64, sqlx::Error> {
    let insert = format!(
        "INSERT INTO {} (field_id, title, sort_order, answer_of, form_id) \
         VALUES ($1, $2, $3, $4, $5) \
         ON CONFLICT (answer_of, form_id) DO NOTHING RETURNING id",
        kind.table()
    );
    let created: Option<(i64,)> = sqlx::query_as(&insert)
        .bind(definition.field_id)
        .bind(&definition.title)
        .bind(definition.sort_order)
        .bind(definition.id)
        .bind(form_id)
        .fetch_optional(&mut *conn)
        .await?;
    if let Some((id,)) = created {
        return Ok(id);
    }

    let existing = format!("SELECT id FROM {} WHERE answer_of = $1 AND form_id = $2", kind.table());
    let (id,): (i64,) = sqlx::query_as(&existing)
        .bind(definition.id)
        .bind(form_id)
        .fetch_one(&mut *conn)
        .await?;
    Ok(id)
}
