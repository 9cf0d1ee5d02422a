// src/models/rule_filter/builder.rs

use sqlx::{Postgres, QueryBuilder};

use super::predicate::{AnswerMatch, Lookup, Predicate};
use crate::models::element::{AnswerValue, ValueStorage};

/// Forms of `template_id` satisfying `pred`, most recently modified first.
/// Selects `(id, description)`.
pub fn form_query(template_id: i64, pred: &Predicate) -> QueryBuilder<'static, Postgres> {
    let mut qb = QueryBuilder::new("SELECT f.id, f.description FROM forms f WHERE f.template_id = ");
    qb.push_bind(template_id);
    if !pred.is_empty() {
        qb.push(" AND ");
        push_predicate(&mut qb, pred, "f");
    }
    qb.push(" ORDER BY f.fork_date DESC, f.id DESC");
    qb
}

/// Append `pred` as a boolean SQL expression over the form row aliased `form_alias`.
pub fn push_predicate(qb: &mut QueryBuilder<'static, Postgres>, pred: &Predicate, form_alias: &str) {
    match pred {
        Predicate::Empty => {
            qb.push("TRUE");
        }
        Predicate::Match(m) => push_match(qb, m, form_alias),
        Predicate::And(children) => push_junction(qb, children, " AND ", form_alias),
        Predicate::Or(children) => push_junction(qb, children, " OR ", form_alias),
    }
}

fn push_junction(
    qb: &mut QueryBuilder<'static, Postgres>,
    children: &[Predicate],
    logic: &str,
    form_alias: &str,
) {
    if children.is_empty() {
        qb.push("TRUE");
        return;
    }
    qb.push("(");
    for (i, child) in children.iter().enumerate() {
        if i > 0 {
            qb.push(logic);
        }
        push_predicate(qb, child, form_alias);
    }
    qb.push(")");
}

fn push_match(qb: &mut QueryBuilder<'static, Postgres>, m: &AnswerMatch, form_alias: &str) {
    let relation = m.kind.relation();
    qb.push(format!("EXISTS (SELECT 1 FROM {} a ", relation.table));
    let column = match relation.storage {
        ValueStorage::Column(column) => format!("a.{column}"),
        ValueStorage::ChildTable { table, column } => {
            qb.push(format!("JOIN {table} v ON v.element_id = a.id "));
            format!("v.{column}")
        }
    };
    qb.push(format!("WHERE a.form_id = {form_alias}.id AND a.answer_of = "));
    qb.push_bind(m.answer_of);
    qb.push(" AND ");
    push_comparison(qb, &column, m.lookup, &m.operand);
    qb.push(")");
}

fn push_comparison(
    qb: &mut QueryBuilder<'static, Postgres>,
    column: &str,
    lookup: Lookup,
    operand: &AnswerValue,
) {
    // compile splits multi-valued leaves into one text operand per value
    debug_assert!(
        !matches!(operand, AnswerValue::Values(_)),
        "list operand reached the SQL builder"
    );
    let text = match operand {
        AnswerValue::Text(s) => Some(s.as_str()),
        _ => None,
    };

    match lookup {
        Lookup::Exact => {
            qb.push(format!("{column} = "));
            operand.push_bind(qb);
        }
        Lookup::Gt | Lookup::Gte | Lookup::Lt | Lookup::Lte => {
            let op = match lookup {
                Lookup::Gt => ">",
                Lookup::Gte => ">=",
                Lookup::Lt => "<",
                _ => "<=",
            };
            qb.push(format!("{column} {op} "));
            operand.push_bind(qb);
        }
        Lookup::IExact => match text {
            Some(s) => {
                qb.push(format!("LOWER({column}) = LOWER("));
                qb.push_bind(s.to_string());
                qb.push(")");
            }
            None => {
                qb.push("FALSE");
            }
        },
        pattern => match text {
            Some(s) => {
                let (op, like) = like_pattern(pattern, s);
                qb.push(format!("{column} {op} "));
                qb.push_bind(like);
            }
            None => {
                qb.push("FALSE");
            }
        },
    }
}

/// Operator and escaped pattern for the LIKE family of lookups.
fn like_pattern(lookup: Lookup, s: &str) -> (&'static str, String) {
    let escaped = escape_like(s);
    match lookup {
        Lookup::Contains => ("LIKE", format!("%{escaped}%")),
        Lookup::IContains => ("ILIKE", format!("%{escaped}%")),
        Lookup::StartsWith => ("LIKE", format!("{escaped}%")),
        Lookup::IStartsWith => ("ILIKE", format!("{escaped}%")),
        Lookup::EndsWith => ("LIKE", format!("%{escaped}")),
        Lookup::IEndsWith => ("ILIKE", format!("%{escaped}")),
        _ => ("=", s.to_string()),
    }
}

fn escape_like(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        if matches!(c, '\\' | '%' | '_') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}
