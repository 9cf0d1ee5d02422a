//! Element kinds and their storage.
//!
//! Every kind lives in its own table (`<tag>_elements`). A row with no
//! `answer_of` is a template definition; otherwise it is the answer of a
//! form to that definition. Multi-valued kinds keep their selected values in
//! `<tag>_element_values`, choice kinds link their options through
//! `<tag>_element_data`.

pub mod queries;
pub mod types;
pub mod value;

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

pub use queries::*;
pub use types::*;
pub use value::{AnswerValue, NormalizeError, ValueType};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ElementKind {
    Input,
    Select,
    Radio,
    Checkbox,
    Date,
    Time,
    DateTime,
    Boolean,
}

/// Where the answers of one element kind are stored, relative to `forms`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AnswerRelation {
    /// Relation name from a form to its answers of this kind.
    pub name: &'static str,
    pub table: &'static str,
    pub storage: ValueStorage,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueStorage {
    /// The value is a column on the element row.
    Column(&'static str),
    /// Values are rows of a child table keyed by `element_id`.
    ChildTable { table: &'static str, column: &'static str },
}

impl ElementKind {
    pub const ALL: [ElementKind; 8] = [
        ElementKind::Input,
        ElementKind::Select,
        ElementKind::Radio,
        ElementKind::Checkbox,
        ElementKind::Date,
        ElementKind::Time,
        ElementKind::DateTime,
        ElementKind::Boolean,
    ];

    pub fn tag(self) -> &'static str {
        match self {
            ElementKind::Input => "input",
            ElementKind::Select => "select",
            ElementKind::Radio => "radio",
            ElementKind::Checkbox => "checkbox",
            ElementKind::Date => "date",
            ElementKind::Time => "time",
            ElementKind::DateTime => "datetime",
            ElementKind::Boolean => "boolean",
        }
    }

    pub fn from_tag(tag: &str) -> Option<Self> {
        ElementKind::ALL.into_iter().find(|k| k.tag() == tag)
    }

    pub fn table(self) -> &'static str {
        match self {
            ElementKind::Input => "input_elements",
            ElementKind::Select => "select_elements",
            ElementKind::Radio => "radio_elements",
            ElementKind::Checkbox => "checkbox_elements",
            ElementKind::Date => "date_elements",
            ElementKind::Time => "time_elements",
            ElementKind::DateTime => "datetime_elements",
            ElementKind::Boolean => "boolean_elements",
        }
    }

    /// Name of the attribute holding the answer, also the key of the raw
    /// value in filter leaves.
    pub fn value_field(self) -> &'static str {
        if self.is_multi_valued() { "values" } else { "value" }
    }

    pub fn related_name_to_form(self) -> &'static str {
        match self {
            ElementKind::Input => "answers_input",
            ElementKind::Select => "answers_select",
            ElementKind::Radio => "answers_radio",
            ElementKind::Checkbox => "answers_checkbox",
            ElementKind::Date => "answers_date",
            ElementKind::Time => "answers_time",
            ElementKind::DateTime => "answers_datetime",
            ElementKind::Boolean => "answers_boolean",
        }
    }

    pub fn value_type(self) -> ValueType {
        match self {
            ElementKind::Input | ElementKind::Radio => ValueType::Text,
            ElementKind::Select | ElementKind::Checkbox => ValueType::TextList,
            ElementKind::Date => ValueType::Date,
            ElementKind::Time => ValueType::Time,
            ElementKind::DateTime => ValueType::DateTime,
            ElementKind::Boolean => ValueType::Bool,
        }
    }

    pub fn is_multi_valued(self) -> bool {
        matches!(self, ElementKind::Select | ElementKind::Checkbox)
    }

    /// Choice kinds carry Data options.
    pub fn has_options(self) -> bool {
        matches!(self, ElementKind::Select | ElementKind::Radio | ElementKind::Checkbox)
    }

    /// Option link table, for choice kinds only.
    pub fn data_table(self) -> Option<&'static str> {
        match self {
            ElementKind::Select => Some("select_element_data"),
            ElementKind::Radio => Some("radio_element_data"),
            ElementKind::Checkbox => Some("checkbox_element_data"),
            _ => None,
        }
    }

    pub fn relation(self) -> AnswerRelation {
        let storage = match self {
            ElementKind::Select => ValueStorage::ChildTable {
                table: "select_element_values",
                column: "value",
            },
            ElementKind::Checkbox => ValueStorage::ChildTable {
                table: "checkbox_element_values",
                column: "value",
            },
            _ => ValueStorage::Column("value"),
        };
        AnswerRelation {
            name: self.related_name_to_form(),
            table: self.table(),
            storage,
        }
    }

    /// Coerce a raw JSON value into this kind's native answer value.
    pub fn normalize(self, raw: &serde_json::Value) -> Result<AnswerValue, NormalizeError> {
        value::normalize(self.value_type(), raw)
    }

    /// Key used for this kind's answers in flattened projections.
    pub fn answer_key(self, element_id: i64) -> String {
        format!("{}_{}", self.tag(), element_id)
    }
}

impl fmt::Display for ElementKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

impl FromStr for ElementKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ElementKind::from_tag(s).ok_or_else(|| format!("unknown element type: {s}"))
    }
}
