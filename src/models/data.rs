use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use sqlx::{PgConnection, PgPool};

use crate::errors::AppError;
use crate::models::element::ElementKind;

/// A labeled option of a choice element, with its selection state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Data {
    pub id: i64,
    pub label: String,
    pub value: String,
    pub selected: bool,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct NewData {
    #[serde(default)]
    pub label: String,
    pub value: String,
    #[serde(default)]
    pub selected: bool,
}

pub async fn find_by_id(pool: &PgPool, id: i64) -> Result<Option<Data>, AppError> {
    let row = sqlx::query_as::<_, Data>("SELECT id, label, value, selected FROM data WHERE id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await?;
    Ok(row)
}

pub async fn update(pool: &PgPool, id: i64, data: &NewData) -> Result<(), AppError> {
    let result = sqlx::query("UPDATE data SET label = $1, value = $2, selected = $3 WHERE id = $4")
        .bind(&data.label)
        .bind(&data.value)
        .bind(data.selected)
        .bind(id)
        .execute(pool)
        .await?;
    if result.rows_affected() == 0 {
        return Err(AppError::NotFound);
    }
    Ok(())
}

pub async fn list_for_element(
    pool: &PgPool,
    kind: ElementKind,
    element_id: i64,
) -> Result<Vec<Data>, AppError> {
    let mut conn = pool.acquire().await?;
    let mut by_element = list_for_elements(&mut conn, kind, &[element_id]).await?;
    Ok(by_element.remove(&element_id).unwrap_or_default())
}

/// Options of many elements of one kind, keyed by element id.
pub(crate) async fn list_for_elements(
    conn: &mut PgConnection,
    kind: ElementKind,
    element_ids: &[i64],
) -> Result<HashMap<i64, Vec<Data>>, sqlx::Error> {
    let Some(link_table) = kind.data_table() else {
        return Ok(HashMap::new());
    };
    if element_ids.is_empty() {
        return Ok(HashMap::new());
    }

    #[derive(sqlx::FromRow)]
    struct Row {
        element_id: i64,
        #[sqlx(flatten)]
        data: Data,
    }

    let sql = format!(
        "SELECT l.element_id, d.id, d.label, d.value, d.selected \
         FROM {link_table} l JOIN data d ON d.id = l.data_id \
         WHERE l.element_id = ANY($1) \
         ORDER BY l.element_id, d.id"
    );
    let rows = sqlx::query_as::<_, Row>(&sql)
        .bind(element_ids)
        .fetch_all(&mut *conn)
        .await?;

    let mut out: HashMap<i64, Vec<Data>> = HashMap::new();
    for row in rows {
        out.entry(row.element_id).or_default().push(row.data);
    }
    Ok(out)
}

/// Insert an option and attach it to a choice element. Returns the data id.
pub(crate) async fn insert_for_element(
    conn: &mut PgConnection,
    kind: ElementKind,
    element_id: i64,
    data: &NewData,
) -> Result<i64, AppError> {
    let link_table = kind.data_table().ok_or_else(|| {
        AppError::Validation(format!("{kind} elements do not take options"))
    })?;

    let (data_id,): (i64,) = sqlx::query_as(
        "INSERT INTO data (label, value, selected) VALUES ($1, $2, $3) RETURNING id",
    )
    .bind(&data.label)
    .bind(&data.value)
    .bind(data.selected)
    .fetch_one(&mut *conn)
    .await?;

    let sql = format!("INSERT INTO {link_table} (element_id, data_id) VALUES ($1, $2)");
    sqlx::query(&sql)
        .bind(element_id)
        .bind(data_id)
        .execute(&mut *conn)
        .await?;

    Ok(data_id)
}
