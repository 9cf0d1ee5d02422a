use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::element::Element;
use crate::models::field::Field;
use crate::models::sub_form::SubForm;

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Template {
    pub id: i64,
    pub title: String,
    pub description: String,
    /// Minimum access level a user needs to see the template.
    pub access_level: i32,
    pub creator_id: Option<i64>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct NewTemplate {
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub access_level: i32,
    #[serde(default)]
    pub creator_id: Option<i64>,
}

/// Template with its whole definition graph.
#[derive(Debug, Clone, Serialize)]
pub struct TemplateDetail {
    #[serde(flatten)]
    pub template: Template,
    pub sub_forms: Vec<SubFormDetail>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SubFormDetail {
    #[serde(flatten)]
    pub sub_form: SubForm,
    pub fields: Vec<FieldDetail>,
}

#[derive(Debug, Clone, Serialize)]
pub struct FieldDetail {
    #[serde(flatten)]
    pub field: Field,
    pub elements: Vec<Element>,
}
