use std::fmt;
use std::ops;

use super::{MatchType, RuleError, RuleLeaf, RuleNode};
use crate::models::element::{AnswerValue, ElementCatalogue, ElementKind, ValueType};

/// Comparison applied between a stored answer and the rule value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lookup {
    Exact,
    IExact,
    Contains,
    IContains,
    StartsWith,
    IStartsWith,
    EndsWith,
    IEndsWith,
    Gt,
    Gte,
    Lt,
    Lte,
}

impl Lookup {
    /// `""` means equality.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "" | "exact" => Some(Lookup::Exact),
            "iexact" => Some(Lookup::IExact),
            "contains" => Some(Lookup::Contains),
            "icontains" => Some(Lookup::IContains),
            "startswith" => Some(Lookup::StartsWith),
            "istartswith" => Some(Lookup::IStartsWith),
            "endswith" => Some(Lookup::EndsWith),
            "iendswith" => Some(Lookup::IEndsWith),
            "gt" => Some(Lookup::Gt),
            "gte" => Some(Lookup::Gte),
            "lt" => Some(Lookup::Lt),
            "lte" => Some(Lookup::Lte),
            _ => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Lookup::Exact => "exact",
            Lookup::IExact => "iexact",
            Lookup::Contains => "contains",
            Lookup::IContains => "icontains",
            Lookup::StartsWith => "startswith",
            Lookup::IStartsWith => "istartswith",
            Lookup::EndsWith => "endswith",
            Lookup::IEndsWith => "iendswith",
            Lookup::Gt => "gt",
            Lookup::Gte => "gte",
            Lookup::Lt => "lt",
            Lookup::Lte => "lte",
        }
    }

    /// Text-only lookups.
    pub fn is_pattern(self) -> bool {
        matches!(
            self,
            Lookup::IExact
                | Lookup::Contains
                | Lookup::IContains
                | Lookup::StartsWith
                | Lookup::IStartsWith
                | Lookup::EndsWith
                | Lookup::IEndsWith
        )
    }

    pub fn supports(self, ty: ValueType) -> bool {
        match ty {
            ValueType::Text | ValueType::TextList => true,
            ValueType::Date | ValueType::Time | ValueType::DateTime => !self.is_pattern(),
            ValueType::Bool => self == Lookup::Exact,
        }
    }
}

impl fmt::Display for Lookup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// "The form has an answer of `kind` to element `answer_of` whose value
/// satisfies `lookup` against `operand`."
#[derive(Debug, Clone, PartialEq)]
pub struct AnswerMatch {
    pub kind: ElementKind,
    pub answer_of: i64,
    pub lookup: Lookup,
    /// A scalar value; one selected value for multi-valued kinds.
    pub operand: AnswerValue,
}

/// Compiled filter over the forms of a template.
#[derive(Debug, Clone, PartialEq)]
pub enum Predicate {
    /// No constraint. Identity of both `&` and `|`.
    Empty,
    Match(AnswerMatch),
    And(Vec<Predicate>),
    Or(Vec<Predicate>),
}

impl Predicate {
    pub fn is_empty(&self) -> bool {
        matches!(self, Predicate::Empty)
    }

    /// Number of answer tests in the predicate.
    pub fn match_count(&self) -> usize {
        match self {
            Predicate::Empty => 0,
            Predicate::Match(_) => 1,
            Predicate::And(children) | Predicate::Or(children) => {
                children.iter().map(Predicate::match_count).sum()
            }
        }
    }
}

impl ops::BitAnd for Predicate {
    type Output = Self;

    fn bitand(self, rhs: Self) -> Self::Output {
        match (self, rhs) {
            (Predicate::Empty, other) | (other, Predicate::Empty) => other,
            (Predicate::And(mut left), Predicate::And(right)) => {
                left.extend(right);
                Predicate::And(left)
            }
            (Predicate::And(mut left), other) => {
                left.push(other);
                Predicate::And(left)
            }
            (other, Predicate::And(mut right)) => {
                right.insert(0, other);
                Predicate::And(right)
            }
            (left, right) => Predicate::And(vec![left, right]),
        }
    }
}

impl ops::BitOr for Predicate {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self::Output {
        match (self, rhs) {
            (Predicate::Empty, other) | (other, Predicate::Empty) => other,
            (Predicate::Or(mut left), Predicate::Or(right)) => {
                left.extend(right);
                Predicate::Or(left)
            }
            (Predicate::Or(mut left), other) => {
                left.push(other);
                Predicate::Or(left)
            }
            (other, Predicate::Or(mut right)) => {
                right.insert(0, other);
                Predicate::Or(right)
            }
            (left, right) => Predicate::Or(vec![left, right]),
        }
    }
}

/// Compile a parsed rule tree. Every leaf must reference a template
/// definition present in `catalogue`.
pub fn compile(node: &RuleNode, catalogue: &ElementCatalogue) -> Result<Predicate, RuleError> {
    match node {
        RuleNode::Group(group) => {
            let mut acc = Predicate::Empty;
            for rule in &group.rules {
                let child = compile(rule, catalogue)?;
                acc = match group.match_type {
                    MatchType::And => acc & child,
                    MatchType::Or => acc | child,
                };
            }
            Ok(acc)
        }
        RuleNode::Leaf(leaf) => {
            if !catalogue.contains(leaf.kind, leaf.pk) {
                return Err(RuleError::UnknownElement { kind: leaf.kind, pk: leaf.pk });
            }
            Ok(leaf_predicate(leaf))
        }
    }
}

/// Multi-valued leaves need every listed value, whatever the parent group's
/// operator is.
fn leaf_predicate(leaf: &RuleLeaf) -> Predicate {
    let answer = |operand: AnswerValue| {
        Predicate::Match(AnswerMatch {
            kind: leaf.kind,
            answer_of: leaf.pk,
            lookup: leaf.lookup,
            operand,
        })
    };
    match &leaf.value {
        AnswerValue::Values(values) => values
            .iter()
            .map(|v| answer(AnswerValue::Text(v.clone())))
            .fold(Predicate::Empty, |acc, p| acc & p),
        scalar => answer(scalar.clone()),
    }
}
