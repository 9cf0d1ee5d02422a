//! Rule-tree filters over the forms of a template.
//!
//! A filter is a tree of `and`/`or` groups whose leaves test the answer a
//! form gave to one template element:
//!
//! ```json
//! {"matchType": "and", "rules": [
//!     {"type": "select", "pk": 5, "filter": "", "values": [{"value": "x"}]},
//!     {"matchType": "or", "rules": [
//!         {"type": "date", "pk": 9, "filter": "gte", "value": "2020-01-01"}
//!     ]}
//! ]}
//! ```
//!
//! The tree is parsed and validated in full ([`RuleNode::parse`]), checked
//! against the template's elements while compiling into a [`Predicate`]
//! ([`predicate::compile`]), rendered into SQL ([`builder`]) and run by
//! [`evaluate()`].

pub mod builder;
pub mod evaluate;
pub mod predicate;

use std::fmt;

use serde::Deserialize;
use serde_json::{Map, Value};

use crate::models::element::{AnswerValue, ElementKind, NormalizeError};

pub use evaluate::{evaluate, FilterRequest, FilteredForm};
pub use predicate::{compile, AnswerMatch, Lookup, Predicate};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MatchType {
    #[default]
    And,
    Or,
}

impl MatchType {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "and" => Some(MatchType::And),
            "or" => Some(MatchType::Or),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum RuleNode {
    Group(RuleGroup),
    Leaf(RuleLeaf),
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct RuleGroup {
    pub match_type: MatchType,
    pub rules: Vec<RuleNode>,
}

/// One comparison against the answer to a template element.
#[derive(Debug, Clone, PartialEq)]
pub struct RuleLeaf {
    pub kind: ElementKind,
    pub pk: i64,
    pub lookup: Lookup,
    /// Already normalized by the element kind.
    pub value: AnswerValue,
}

#[derive(Debug, Clone, PartialEq)]
pub enum RuleError {
    NotAnObject,
    MissingMatchType,
    UnknownMatchType(String),
    Malformed(String),
    MissingType,
    UnknownType(String),
    MissingPk,
    InvalidPk(String),
    UnknownLookup(String),
    UnsupportedLookup { lookup: Lookup, kind: ElementKind },
    MissingValue { kind: ElementKind },
    InvalidValue { kind: ElementKind, error: NormalizeError },
    EmptyValues { kind: ElementKind },
    UnknownElement { kind: ElementKind, pk: i64 },
}

impl fmt::Display for RuleError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RuleError::NotAnObject => write!(f, "rule node must be an object"),
            RuleError::MissingMatchType => write!(f, "group node is missing matchType"),
            RuleError::UnknownMatchType(m) => write!(f, "unknown matchType {m}, expected \"and\" or \"or\""),
            RuleError::Malformed(e) => write!(f, "malformed rule node: {e}"),
            RuleError::MissingType => write!(f, "rule is missing the element type"),
            RuleError::UnknownType(t) => write!(f, "unknown element type {t}"),
            RuleError::MissingPk => write!(f, "rule is missing pk"),
            RuleError::InvalidPk(pk) => write!(f, "invalid pk {pk}"),
            RuleError::UnknownLookup(l) => write!(f, "unknown filter {l}"),
            RuleError::UnsupportedLookup { lookup, kind } => {
                write!(f, "filter {lookup} is not supported for {kind} elements")
            }
            RuleError::MissingValue { kind } => {
                write!(f, "{kind} rule is missing \"{}\"", kind.value_field())
            }
            RuleError::InvalidValue { kind, error } => write!(f, "invalid {kind} value: {error}"),
            RuleError::EmptyValues { kind } => write!(f, "{kind} rule needs at least one value"),
            RuleError::UnknownElement { kind, pk } => {
                write!(f, "template has no {kind} element with pk {pk}")
            }
        }
    }
}

impl std::error::Error for RuleError {}

/// A rule node as sent by clients. Groups and leaves share one shape so
/// that every error can name the field at fault.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawNode {
    qtype: Option<String>,
    #[serde(rename = "matchType")]
    match_type: Option<String>,
    rules: Option<Vec<RawNode>>,
    #[serde(rename = "type")]
    kind: Option<String>,
    pk: Option<RawPk>,
    filter: Option<String>,
    value: Option<Value>,
    values: Option<Value>,
    #[serde(flatten)]
    extra: Map<String, Value>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawPk {
    Int(i64),
    Text(String),
    Other(Value),
}

impl RawNode {
    fn is_group(&self) -> bool {
        self.qtype.as_deref() == Some("group") || self.match_type.is_some() || self.rules.is_some()
    }

    /// `{}`: no field of either shape.
    fn is_blank(&self) -> bool {
        self.kind.is_none()
            && self.pk.is_none()
            && self.filter.is_none()
            && self.value.is_none()
            && self.values.is_none()
            && self.extra.is_empty()
    }

    fn validate(self) -> Result<RuleNode, RuleError> {
        if self.is_group() {
            self.into_group().map(RuleNode::Group)
        } else if self.is_blank() {
            Ok(RuleNode::empty())
        } else {
            self.into_leaf().map(RuleNode::Leaf)
        }
    }

    fn into_group(self) -> Result<RuleGroup, RuleError> {
        let match_type = match self.match_type {
            None => return Err(RuleError::MissingMatchType),
            Some(m) => MatchType::parse(&m).ok_or(RuleError::UnknownMatchType(m))?,
        };
        let rules = self
            .rules
            .unwrap_or_default()
            .into_iter()
            .map(RawNode::validate)
            .collect::<Result<_, _>>()?;
        Ok(RuleGroup { match_type, rules })
    }

    fn into_leaf(self) -> Result<RuleLeaf, RuleError> {
        let tag = self.kind.ok_or(RuleError::MissingType)?;
        let kind = ElementKind::from_tag(&tag).ok_or(RuleError::UnknownType(tag))?;

        let pk = match self.pk.ok_or(RuleError::MissingPk)? {
            RawPk::Int(n) => n,
            RawPk::Text(s) => s.trim().parse().map_err(|_| RuleError::InvalidPk(s))?,
            RawPk::Other(v) => return Err(RuleError::InvalidPk(v.to_string())),
        };

        let lookup = match self.filter {
            None => Lookup::Exact,
            Some(f) => Lookup::parse(&f).ok_or(RuleError::UnknownLookup(f))?,
        };
        if !lookup.supports(kind.value_type()) {
            return Err(RuleError::UnsupportedLookup { lookup, kind });
        }

        let raw = if kind.is_multi_valued() { self.values } else { self.value };
        let raw = raw.ok_or(RuleError::MissingValue { kind })?;
        let value = kind
            .normalize(&raw)
            .map_err(|error| RuleError::InvalidValue { kind, error })?;
        if matches!(&value, AnswerValue::Values(vs) if vs.is_empty()) {
            return Err(RuleError::EmptyValues { kind });
        }

        Ok(RuleLeaf { kind, pk, lookup, value })
    }
}

impl RuleNode {
    /// The group that places no constraint.
    pub fn empty() -> Self {
        RuleNode::Group(RuleGroup::default())
    }

    /// Parse and validate a whole rule tree. `null` and `{}` are the empty group.
    pub fn parse(raw: &Value) -> Result<Self, RuleError> {
        match raw {
            Value::Null => return Ok(RuleNode::empty()),
            Value::Object(_) => {}
            _ => return Err(RuleError::NotAnObject),
        }
        RawNode::deserialize(raw)
            .map_err(|e| RuleError::Malformed(e.to_string()))?
            .validate()
    }
}
