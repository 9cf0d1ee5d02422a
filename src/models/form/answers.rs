use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use sqlx::{PgConnection, PgPool, Postgres, QueryBuilder};

use super::types::Answer;
use crate::errors::AppError;
use crate::models::element::{AnswerValue, ElementKind, ValueType};
use crate::models::element::ValueStorage;

/// All answers of a form, ordered by kind then answered element.
pub async fn find_answers(pool: &PgPool, form_id: i64) -> Result<Vec<Answer>, AppError> {
    let mut conn = pool.acquire().await?;
    let exists: Option<(i64,)> = sqlx::query_as("SELECT id FROM forms WHERE id = $1")
        .bind(form_id)
        .fetch_optional(&mut *conn)
        .await?;
    if exists.is_none() {
        return Err(AppError::NotFound);
    }
    Ok(load_for_forms(&mut conn, &[form_id]).await?)
}

/// Answers of many forms, ordered by form, kind, answered element.
pub(crate) async fn load_for_forms(
    conn: &mut PgConnection,
    form_ids: &[i64],
) -> Result<Vec<Answer>, sqlx::Error> {
    let mut answers = Vec::new();
    if form_ids.is_empty() {
        return Ok(answers);
    }

    for kind in ElementKind::ALL {
        let mut batch = match kind.value_type() {
            ValueType::Text => load_scalar::<String>(conn, kind, form_ids, AnswerValue::Text).await?,
            ValueType::Date => load_scalar::<NaiveDate>(conn, kind, form_ids, AnswerValue::Date).await?,
            ValueType::Time => load_scalar::<NaiveTime>(conn, kind, form_ids, AnswerValue::Time).await?,
            ValueType::DateTime => {
                load_scalar::<DateTime<Utc>>(conn, kind, form_ids, AnswerValue::DateTime).await?
            }
            ValueType::Bool => load_scalar::<bool>(conn, kind, form_ids, AnswerValue::Bool).await?,
            ValueType::TextList => load_multi(conn, kind, form_ids).await?,
        };
        answers.append(&mut batch);
    }

    answers.sort_by(|a, b| (a.form_id, a.kind, a.answer_of).cmp(&(b.form_id, b.kind, b.answer_of)));
    Ok(answers)
}

async fn load_scalar<T>(
    conn: &mut PgConnection,
    kind: ElementKind,
    form_ids: &[i64],
    wrap: fn(T) -> AnswerValue,
) -> Result<Vec<Answer>, sqlx::Error>
where
    T: Send + Unpin + for<'r> sqlx::Decode<'r, Postgres> + sqlx::Type<Postgres>,
{
    let sql = format!(
        "SELECT a.form_id, a.answer_of, a.value FROM {} a \
         WHERE a.form_id = ANY($1) AND a.answer_of IS NOT NULL",
        kind.table()
    );
    let rows: Vec<(i64, i64, Option<T>)> = sqlx::query_as(&sql)
        .bind(form_ids)
        .fetch_all(&mut *conn)
        .await?;

    Ok(rows
        .into_iter()
        .map(|(form_id, answer_of, value)| Answer { form_id, kind, answer_of, value: value.map(wrap) })
        .collect())
}

/// Multi-valued answers always carry a list, empty when nothing is selected.
async fn load_multi(
    conn: &mut PgConnection,
    kind: ElementKind,
    form_ids: &[i64],
) -> Result<Vec<Answer>, sqlx::Error> {
    let ValueStorage::ChildTable { table, column } = kind.relation().storage else {
        return Ok(Vec::new());
    };
    let sql = format!(
        "SELECT a.form_id, a.answer_of, v.{column} FROM {} a \
         LEFT JOIN {table} v ON v.element_id = a.id \
         WHERE a.form_id = ANY($1) AND a.answer_of IS NOT NULL \
         ORDER BY a.form_id, a.answer_of, v.id",
        kind.table()
    );
    let rows: Vec<(i64, i64, Option<String>)> = sqlx::query_as(&sql)
        .bind(form_ids)
        .fetch_all(&mut *conn)
        .await?;

    let mut answers: Vec<Answer> = Vec::new();
    for (form_id, answer_of, value) in rows {
        let same = answers
            .last()
            .is_some_and(|a| a.form_id == form_id && a.answer_of == answer_of);
        if !same {
            answers.push(Answer {
                form_id,
                kind,
                answer_of,
                value: Some(AnswerValue::Values(Vec::new())),
            });
        }
        if let (Some(v), Some(Answer { value: Some(AnswerValue::Values(vs)), .. })) =
            (value, answers.last_mut())
        {
            vs.push(v);
        }
    }
    Ok(answers)
}

/// Overwrite the value of an answer row. `None` clears it.
pub(crate) async fn write_value(
    conn: &mut PgConnection,
    kind: ElementKind,
    answer_id: i64,
    value: Option<&AnswerValue>,
) -> Result<(), AppError> {
    let relation = kind.relation();
    match relation.storage {
        ValueStorage::Column(column) => {
            let mut qb: QueryBuilder<'_, Postgres> =
                QueryBuilder::new(format!("UPDATE {} SET {column} = ", relation.table));
            match value {
                Some(v) => v.push_bind(&mut qb),
                None => {
                    qb.push("NULL");
                }
            }
            qb.push(" WHERE id = ").push_bind(answer_id);
            qb.build().execute(&mut *conn).await?;
        }
        ValueStorage::ChildTable { table, column } => {
            let values: &[String] = match value {
                Some(AnswerValue::Values(vs)) => vs,
                None => &[],
                Some(_) => {
                    return Err(AppError::Validation(format!(
                        "{kind} answers take a list of values"
                    )));
                }
            };

            let sql = format!("DELETE FROM {table} WHERE element_id = $1");
            sqlx::query(&sql).bind(answer_id).execute(&mut *conn).await?;

            if !values.is_empty() {
                let mut qb: QueryBuilder<'_, Postgres> =
                    QueryBuilder::new(format!("INSERT INTO {table} (element_id, {column}) "));
                qb.push_values(values, |mut b, v| {
                    b.push_bind(answer_id).push_bind(v.clone());
                });
                qb.build().execute(&mut *conn).await?;
            }
        }
    }
    Ok(())
}
