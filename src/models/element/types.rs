use serde::{Deserialize, Serialize};

use super::ElementKind;
use crate::models::data::{Data, NewData};

/// An element row of any kind, without its answer value.
#[derive(Debug, Clone, Serialize)]
pub struct Element {
    pub id: i64,
    #[serde(rename = "type")]
    pub kind: ElementKind,
    pub field_id: i64,
    pub title: String,
    pub sort_order: i32,
    pub answer_of: Option<i64>,
    pub form_id: Option<i64>,
    /// Options of choice kinds; empty for the others.
    pub data: Vec<Data>,
}

impl Element {
    pub fn is_template_definition(&self) -> bool {
        self.answer_of.is_none()
    }
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub(crate) struct ElementRow {
    pub id: i64,
    pub field_id: i64,
    pub title: String,
    pub sort_order: i32,
    pub answer_of: Option<i64>,
    pub form_id: Option<i64>,
}

impl ElementRow {
    pub(crate) fn into_element(self, kind: ElementKind, data: Vec<Data>) -> Element {
        Element {
            id: self.id,
            kind,
            field_id: self.field_id,
            title: self.title,
            sort_order: self.sort_order,
            answer_of: self.answer_of,
            form_id: self.form_id,
            data,
        }
    }
}

/// Template definition to add to a field.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct NewElement {
    pub field_id: i64,
    pub title: String,
    #[serde(default)]
    pub sort_order: i32,
    #[serde(default)]
    pub data: Vec<NewData>,
}

/// Reference to a template element by kind and id, as used in filter
/// requests (`{"type": "select", "pk": 5}`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ElementRef {
    #[serde(rename = "type")]
    pub kind: ElementKind,
    pub pk: i64,
}

impl ElementRef {
    pub fn new(kind: ElementKind, pk: i64) -> Self {
        ElementRef { kind, pk }
    }

    pub fn key(&self) -> String {
        self.kind.answer_key(self.pk)
    }
}

/// One entry of a bulk reorder request.
#[derive(Debug, Clone, Deserialize)]
pub struct ElementOrder {
    #[serde(rename = "type")]
    pub kind: ElementKind,
    pub pk: i64,
    pub order: i32,
}
