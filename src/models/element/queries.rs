use std::collections::HashSet;

use sqlx::{PgConnection, PgPool};

use super::types::{Element, ElementOrder, ElementRef, ElementRow, NewElement};
use super::ElementKind;
use crate::errors::AppError;
use crate::models::data::{self, NewData};

const ELEMENT_COLUMNS: &str = "e.id, e.field_id, e.title, e.sort_order, e.answer_of, e.form_id";

/// The template definitions reachable from one template.
#[derive(Debug, Clone, Default)]
pub struct ElementCatalogue {
    refs: HashSet<ElementRef>,
}

impl ElementCatalogue {
    pub fn contains(&self, kind: ElementKind, pk: i64) -> bool {
        self.refs.contains(&ElementRef::new(kind, pk))
    }

    pub fn len(&self) -> usize {
        self.refs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.refs.is_empty()
    }
}

impl FromIterator<ElementRef> for ElementCatalogue {
    fn from_iter<I: IntoIterator<Item = ElementRef>>(iter: I) -> Self {
        ElementCatalogue { refs: iter.into_iter().collect() }
    }
}

/// Add a template definition to a field, with its options for choice kinds.
pub async fn create(pool: &PgPool, kind: ElementKind, new: &NewElement) -> Result<i64, AppError> {
    if new.title.trim().is_empty() {
        return Err(AppError::Validation("Title is required".to_string()));
    }
    if !new.data.is_empty() && !kind.has_options() {
        return Err(AppError::Validation(format!("{kind} elements do not take options")));
    }

    let mut tx = pool.begin().await?;

    let field: Option<(i64,)> = sqlx::query_as("SELECT id FROM fields WHERE id = $1")
        .bind(new.field_id)
        .fetch_optional(&mut *tx)
        .await?;
    if field.is_none() {
        return Err(AppError::NotFound);
    }

    let sql = format!(
        "INSERT INTO {} (field_id, title, sort_order) VALUES ($1, $2, $3) RETURNING id",
        kind.table()
    );
    let (id,): (i64,) = sqlx::query_as(&sql)
        .bind(new.field_id)
        .bind(&new.title)
        .bind(new.sort_order)
        .fetch_one(&mut *tx)
        .await?;

    for option in &new.data {
        data::insert_for_element(&mut tx, kind, id, option).await?;
    }

    tx.commit().await?;
    log::info!("Created {kind} element {id} on field {}", new.field_id);
    Ok(id)
}

pub async fn find_by_id(pool: &PgPool, kind: ElementKind, id: i64) -> Result<Option<Element>, AppError> {
    let mut conn = pool.acquire().await?;
    let Some(row) = find_row(&mut conn, kind, id).await? else {
        return Ok(None);
    };
    let mut options = data::list_for_elements(&mut conn, kind, &[id]).await?;
    Ok(Some(row.into_element(kind, options.remove(&id).unwrap_or_default())))
}

pub(crate) async fn find_row(
    conn: &mut PgConnection,
    kind: ElementKind,
    id: i64,
) -> Result<Option<ElementRow>, sqlx::Error> {
    let sql = format!("SELECT {ELEMENT_COLUMNS} FROM {} e WHERE e.id = $1", kind.table());
    sqlx::query_as::<_, ElementRow>(&sql)
        .bind(id)
        .fetch_optional(&mut *conn)
        .await
}

/// Template owning the field an element sits on.
pub(crate) async fn template_id_of(
    conn: &mut PgConnection,
    kind: ElementKind,
    id: i64,
) -> Result<Option<i64>, sqlx::Error> {
    let sql = format!(
        "SELECT s.template_id FROM {} e \
         JOIN fields f ON f.id = e.field_id \
         JOIN sub_forms s ON s.id = f.sub_form_id \
         WHERE e.id = $1",
        kind.table()
    );
    let row: Option<(i64,)> = sqlx::query_as(&sql).bind(id).fetch_optional(&mut *conn).await?;
    Ok(row.map(|r| r.0))
}

pub async fn update(
    pool: &PgPool,
    kind: ElementKind,
    id: i64,
    title: &str,
    sort_order: i32,
) -> Result<(), AppError> {
    if title.trim().is_empty() {
        return Err(AppError::Validation("Title is required".to_string()));
    }
    let sql = format!("UPDATE {} SET title = $1, sort_order = $2 WHERE id = $3", kind.table());
    let result = sqlx::query(&sql)
        .bind(title)
        .bind(sort_order)
        .bind(id)
        .execute(pool)
        .await?;
    if result.rows_affected() == 0 {
        return Err(AppError::NotFound);
    }
    Ok(())
}

/// Delete an element. Deleting a template definition also removes its answers.
pub async fn delete(pool: &PgPool, kind: ElementKind, id: i64) -> Result<(), AppError> {
    let sql = format!("DELETE FROM {} WHERE id = $1", kind.table());
    let result = sqlx::query(&sql).bind(id).execute(pool).await?;
    if result.rows_affected() == 0 {
        return Err(AppError::NotFound);
    }
    Ok(())
}

/// Attach a new option to a choice element. Returns the data id.
pub async fn add_data(
    pool: &PgPool,
    kind: ElementKind,
    element_id: i64,
    option: &NewData,
) -> Result<i64, AppError> {
    if !kind.has_options() {
        return Err(AppError::Validation(format!("{kind} elements do not take options")));
    }
    let mut tx = pool.begin().await?;
    if find_row(&mut tx, kind, element_id).await?.is_none() {
        return Err(AppError::NotFound);
    }
    let data_id = data::insert_for_element(&mut tx, kind, element_id, option).await?;
    tx.commit().await?;
    Ok(data_id)
}

/// Apply a batch of element orders; nothing is written if any element is missing.
pub async fn set_orders(pool: &PgPool, orders: &[ElementOrder]) -> Result<(), AppError> {
    let mut tx = pool.begin().await?;
    for order in orders {
        let sql = format!("UPDATE {} SET sort_order = $1 WHERE id = $2", order.kind.table());
        let result = sqlx::query(&sql)
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

/// Every template definition under a template, in sub-form, field and element order.
pub async fn list_for_template(pool: &PgPool, template_id: i64) -> Result<Vec<Element>, AppError> {
    #[derive(sqlx::FromRow)]
    struct Row {
        #[sqlx(flatten)]
        element: ElementRow,
        sub_form_id: i64,
        sub_form_order: i32,
        field_order: i32,
    }

    let mut conn = pool.acquire().await?;
    let mut keyed = Vec::new();

    for kind in ElementKind::ALL {
        let sql = format!(
            "SELECT {ELEMENT_COLUMNS}, s.id AS sub_form_id, s.sort_order AS sub_form_order, \
                    f.sort_order AS field_order \
             FROM {} e \
             JOIN fields f ON f.id = e.field_id \
             JOIN sub_forms s ON s.id = f.sub_form_id \
             WHERE s.template_id = $1 AND e.answer_of IS NULL",
            kind.table()
        );
        let rows = sqlx::query_as::<_, Row>(&sql)
            .bind(template_id)
            .fetch_all(&mut *conn)
            .await?;

        let ids: Vec<i64> = rows.iter().map(|r| r.element.id).collect();
        let mut options = data::list_for_elements(&mut conn, kind, &ids).await?;

        for row in rows {
            let sort_key = (
                row.sub_form_order,
                row.sub_form_id,
                row.field_order,
                row.element.field_id,
                row.element.sort_order,
                kind,
                row.element.id,
            );
            let data = options.remove(&row.element.id).unwrap_or_default();
            keyed.push((sort_key, row.element.into_element(kind, data)));
        }
    }

    keyed.sort_by(|a, b| a.0.cmp(&b.0));
    Ok(keyed.into_iter().map(|(_, element)| element).collect())
}

/// Refs of every template definition under a template, in one round trip.
pub async fn catalogue(pool: &PgPool, template_id: i64) -> Result<ElementCatalogue, AppError> {
    let sql = ElementKind::ALL
        .iter()
        .map(|kind| {
            format!(
                "SELECT '{}' AS kind, e.id FROM {} e \
                 JOIN fields f ON f.id = e.field_id \
                 JOIN sub_forms s ON s.id = f.sub_form_id \
                 WHERE s.template_id = $1 AND e.answer_of IS NULL",
                kind.tag(),
                kind.table()
            )
        })
        .collect::<Vec<_>>()
        .join(" UNION ALL ");

    let rows: Vec<(String, i64)> = sqlx::query_as(&sql).bind(template_id).fetch_all(pool).await?;

    Ok(rows
        .into_iter()
        .filter_map(|(tag, id)| ElementKind::from_tag(&tag).map(|kind| ElementRef::new(kind, id)))
        .collect())
}
