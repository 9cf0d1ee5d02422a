use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::element::{AnswerValue, ElementKind};

/// One filled instance of a template.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Form {
    pub id: i64,
    pub template_id: i64,
    pub filler_id: Option<i64>,
    pub description: String,
    /// Last time an answer of this form was written.
    pub fork_date: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct NewForm {
    pub template_id: i64,
    #[serde(default)]
    pub filler_id: Option<i64>,
    #[serde(default)]
    pub description: String,
}

/// A stored answer, identified by the template element it answers.
#[derive(Debug, Clone, PartialEq)]
pub struct Answer {
    pub form_id: i64,
    pub kind: ElementKind,
    pub answer_of: i64,
    /// `None` until a value has been written.
    pub value: Option<AnswerValue>,
}

impl Answer {
    pub fn key(&self) -> String {
        self.kind.answer_key(self.answer_of)
    }
}
