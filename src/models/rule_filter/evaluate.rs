use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::PgPool;

use super::{builder, predicate, RuleError, RuleNode};
use crate::errors::AppError;
use crate::models::element::{self, ElementRef};
use crate::models::form::{answers, Answer};
use crate::models::template;

/// Body of a filter request: the rule tree and the answer keys to project.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct FilterRequest {
    #[serde(default)]
    pub query: Value,
    /// Empty means every answer.
    #[serde(default)]
    pub elements: Vec<ElementRef>,
}

/// A matching form, flattened into `description` plus `<type>_<pk>` keys.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FilteredForm {
    #[serde(skip_serializing)]
    pub form_id: i64,
    pub description: String,
    #[serde(flatten)]
    pub answers: BTreeMap<String, Value>,
}

/// Run a rule-tree filter over the forms of a template.
///
/// The tree and requested element references are validated in full before
/// the form query runs.
pub async fn evaluate(
    pool: &PgPool,
    template_id: i64,
    request: &FilterRequest,
) -> Result<Vec<FilteredForm>, AppError> {
    let tree = RuleNode::parse(&request.query).inspect_err(|e| {
        log::warn!("Rejected rule tree for template {template_id}: {e}");
    })?;

    if template::find_by_id(pool, template_id).await?.is_none() {
        return Err(AppError::NotFound);
    }

    let catalogue = element::catalogue(pool, template_id).await?;
    if let Some(unknown) = request.elements.iter().find(|r| !catalogue.contains(r.kind, r.pk)) {
        return Err(RuleError::UnknownElement { kind: unknown.kind, pk: unknown.pk }.into());
    }

    let pred = predicate::compile(&tree, &catalogue).inspect_err(|e| {
        log::warn!("Rejected rule tree for template {template_id}: {e}");
    })?;

    let mut qb = builder::form_query(template_id, &pred);
    log::debug!("Filter on template {template_id} ({} tests): {}", pred.match_count(), qb.sql());

    let mut conn = pool.acquire().await?;
    let forms: Vec<(i64, String)> = qb.build_query_as().fetch_all(&mut *conn).await?;

    let ids: Vec<i64> = forms.iter().map(|(id, _)| *id).collect();
    let loaded = answers::load_for_forms(&mut conn, &ids).await?;

    log::info!("Filter on template {template_id} matched {} forms", forms.len());
    Ok(project(forms, &loaded, &request.elements))
}

/// Flatten forms and their answers. Forms keep their order; `loaded` must
/// be grouped by form. Requested keys with no answer come out as null.
fn project(forms: Vec<(i64, String)>, loaded: &[Answer], requested: &[ElementRef]) -> Vec<FilteredForm> {
    let mut by_form: BTreeMap<i64, Vec<&Answer>> = BTreeMap::new();
    for answer in loaded {
        by_form.entry(answer.form_id).or_default().push(answer);
    }

    forms
        .into_iter()
        .map(|(form_id, description)| {
            let mut projected = BTreeMap::new();
            for answer in by_form.get(&form_id).into_iter().flatten() {
                let wanted = requested.is_empty()
                    || requested.iter().any(|r| r.kind == answer.kind && r.pk == answer.answer_of);
                if wanted {
                    let value = answer.value.as_ref().map_or(Value::Null, |v| v.to_json());
                    projected.insert(answer.key(), value);
                }
            }
            for r in requested {
                projected.entry(r.key()).or_insert(Value::Null);
            }
            FilteredForm { form_id, description, answers: projected }
        })
        .collect()
}
