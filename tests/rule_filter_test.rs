//! Rule-tree filter tests against a live database.
//!
//! Covers the matching semantics (and/or, lookups, multi-valued leaves),
//! validation before any form query, and the flattened projection.

mod common;

use serde_json::{json, Value};
use sqlx::PgPool;

use formbuilder::errors::AppError;
use formbuilder::models::element::ElementKind;
use formbuilder::models::rule_filter::{evaluate, FilterRequest};
use common::*;

struct Survey {
    template_id: i64,
    field_id: i64,
    name: i64,
    colors: i64,
    born: i64,
    agree: i64,
}

async fn create_survey(pool: &PgPool) -> Survey {
    let t = create_template(pool, "Survey").await;
    Survey {
        template_id: t.template_id,
        field_id: t.field_id,
        name: create_element(pool, t.field_id, ElementKind::Input, "Name").await,
        colors: create_choice(pool, t.field_id, ElementKind::Select, &["x", "y", "z"]).await,
        born: create_element(pool, t.field_id, ElementKind::Date, "Born").await,
        agree: create_element(pool, t.field_id, ElementKind::Boolean, "Agree").await,
    }
}

async fn run(pool: &PgPool, template_id: i64, query: Value) -> Result<Vec<String>, AppError> {
    let request = FilterRequest { query, elements: Vec::new() };
    let forms = evaluate(pool, template_id, &request).await?;
    let mut descriptions: Vec<String> = forms.into_iter().map(|f| f.description).collect();
    descriptions.sort();
    Ok(descriptions)
}

fn leaf(kind: &str, pk: i64, filter: &str, value: Value) -> Value {
    let field = if matches!(kind, "select" | "checkbox") { "values" } else { "value" };
    let mut node = json!({"type": kind, "pk": pk, "filter": filter});
    node[field] = value;
    node
}

#[tokio::test]
async fn test_select_example_needs_every_value() {
    let db = setup_test_db().await;
    let pool = db.pool();
    let s = create_survey(pool).await;

    let a = create_form(pool, s.template_id, "A").await;
    let b = create_form(pool, s.template_id, "B").await;
    answer(pool, a, ElementKind::Select, s.colors, json!([{"value": "x"}, {"value": "y"}])).await;
    answer(pool, b, ElementKind::Select, s.colors, json!([{"value": "x"}])).await;

    let xy = leaf("select", s.colors, "", json!([{"value": "x"}, {"value": "y"}]));
    let got = run(pool, s.template_id, json!({"matchType": "and", "rules": [xy.clone()]})).await.unwrap();
    assert_eq!(got, vec!["A"]);

    let got = run(pool, s.template_id, json!({"matchType": "or", "rules": [xy]})).await.unwrap();
    assert_eq!(got, vec!["A"]);

    let x = leaf("select", s.colors, "", json!(["x"]));
    let got = run(pool, s.template_id, json!({"matchType": "and", "rules": [x]})).await.unwrap();
    assert_eq!(got, vec!["A", "B"]);
}

#[tokio::test]
async fn test_and_is_intersection_or_is_union() {
    let db = setup_test_db().await;
    let pool = db.pool();
    let s = create_survey(pool).await;

    let both = create_form(pool, s.template_id, "both").await;
    let name_only = create_form(pool, s.template_id, "name_only").await;
    let agree_only = create_form(pool, s.template_id, "agree_only").await;
    create_form(pool, s.template_id, "neither").await;

    answer(pool, both, ElementKind::Input, s.name, json!("ada")).await;
    answer(pool, both, ElementKind::Boolean, s.agree, json!(true)).await;
    answer(pool, name_only, ElementKind::Input, s.name, json!("ada")).await;
    answer(pool, agree_only, ElementKind::Boolean, s.agree, json!(true)).await;

    let l1 = leaf("input", s.name, "", json!("ada"));
    let l2 = leaf("boolean", s.agree, "", json!(true));

    let and = run(pool, s.template_id, json!({"matchType": "and", "rules": [l1.clone(), l2.clone()]})).await.unwrap();
    assert_eq!(and, vec!["both"]);

    let or = run(pool, s.template_id, json!({"matchType": "or", "rules": [l1, l2]})).await.unwrap();
    assert_eq!(or, vec!["agree_only", "both", "name_only"]);
}

#[tokio::test]
async fn test_empty_tree_returns_every_form() {
    let db = setup_test_db().await;
    let pool = db.pool();
    let s = create_survey(pool).await;
    let other = create_template(pool, "Other").await;

    create_form(pool, s.template_id, "one").await;
    create_form(pool, s.template_id, "two").await;
    create_form(pool, other.template_id, "elsewhere").await;

    for query in [json!({"matchType": "and", "rules": []}), json!({}), Value::Null] {
        let got = run(pool, s.template_id, query).await.unwrap();
        assert_eq!(got, vec!["one", "two"]);
    }
}

#[tokio::test]
async fn test_relational_filters_on_dates() {
    let db = setup_test_db().await;
    let pool = db.pool();
    let s = create_survey(pool).await;

    for (desc, day) in [("early", "2019-05-01"), ("mid", "2020-01-01"), ("late", "2021-07-15")] {
        let form_id = create_form(pool, s.template_id, desc).await;
        answer(pool, form_id, ElementKind::Date, s.born, json!(day)).await;
    }
    create_form(pool, s.template_id, "unanswered").await;

    let q = |filter: &str| json!({"matchType": "and", "rules": [leaf("date", s.born, filter, json!("2020-01-01"))]});
    assert_eq!(run(pool, s.template_id, q("")).await.unwrap(), vec!["mid"]);
    assert_eq!(run(pool, s.template_id, q("gt")).await.unwrap(), vec!["late"]);
    assert_eq!(run(pool, s.template_id, q("gte")).await.unwrap(), vec!["late", "mid"]);
    assert_eq!(run(pool, s.template_id, q("lt")).await.unwrap(), vec!["early"]);
}

#[tokio::test]
async fn test_text_pattern_lookups() {
    let db = setup_test_db().await;
    let pool = db.pool();
    let s = create_survey(pool).await;

    for name in ["Ada Lovelace", "ada", "100%_done"] {
        let form_id = create_form(pool, s.template_id, name).await;
        answer(pool, form_id, ElementKind::Input, s.name, json!(name)).await;
    }

    let q = |filter: &str, value: &str| json!({"matchType": "and", "rules": [leaf("input", s.name, filter, json!(value))]});
    assert_eq!(run(pool, s.template_id, q("iexact", "ADA")).await.unwrap(), vec!["ada"]);
    assert_eq!(run(pool, s.template_id, q("icontains", "ADA")).await.unwrap(), vec!["Ada Lovelace", "ada"]);
    assert_eq!(run(pool, s.template_id, q("startswith", "Ada")).await.unwrap(), vec!["Ada Lovelace"]);
    assert_eq!(run(pool, s.template_id, q("contains", "%_")).await.unwrap(), vec!["100%_done"]);
    assert!(run(pool, s.template_id, q("contains", "0_d")).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_nested_groups() {
    let db = setup_test_db().await;
    let pool = db.pool();
    let s = create_survey(pool).await;

    let a = create_form(pool, s.template_id, "a").await;
    let b = create_form(pool, s.template_id, "b").await;
    let c = create_form(pool, s.template_id, "c").await;
    answer(pool, a, ElementKind::Boolean, s.agree, json!(true)).await;
    answer(pool, a, ElementKind::Input, s.name, json!("ada")).await;
    answer(pool, b, ElementKind::Boolean, s.agree, json!(true)).await;
    answer(pool, b, ElementKind::Select, s.colors, json!(["z"])).await;
    answer(pool, c, ElementKind::Input, s.name, json!("ada")).await;

    let query = json!({
        "matchType": "and",
        "rules": [
            leaf("boolean", s.agree, "", json!(true)),
            {"qtype": "group", "matchType": "or", "rules": [
                leaf("input", s.name, "", json!("ada")),
                leaf("select", s.colors, "", json!(["z"])),
                {"matchType": "and", "rules": []}
            ]}
        ]
    });
    assert_eq!(run(pool, s.template_id, query).await.unwrap(), vec!["a", "b"]);
}

#[tokio::test]
async fn test_unknown_pk_fails_validation() {
    let db = setup_test_db().await;
    let pool = db.pool();
    let s = create_survey(pool).await;
    let other = create_template(pool, "Other").await;
    let foreign = create_element(pool, other.field_id, ElementKind::Input, "Foreign").await;
    create_form(pool, s.template_id, "one").await;

    let query = json!({"matchType": "and", "rules": [leaf("input", foreign, "", json!("x"))]});
    assert!(matches!(run(pool, s.template_id, query).await, Err(AppError::Validation(_))));
}

#[tokio::test]
async fn test_pk_is_resolved_within_its_kind() {
    let db = setup_test_db().await;
    let pool = db.pool();
    let s = create_survey(pool).await;
    let nickname = create_element(pool, s.field_id, ElementKind::Input, "Nickname").await;
    assert_ne!(nickname, s.born, "nickname must not share an id with the date element");

    let form_id = create_form(pool, s.template_id, "born_1990").await;
    answer(pool, form_id, ElementKind::Date, s.born, json!("1990-04-02")).await;

    // every kind has its own id sequence, so these two collide in a fresh schema
    assert_eq!(s.name, s.born);
    let query = json!({"matchType": "and", "rules": [leaf("date", s.name, "", json!("1990-04-02"))]});
    assert_eq!(run(pool, s.template_id, query).await.unwrap(), vec!["born_1990"]);

    let query = json!({"matchType": "and", "rules": [leaf("date", nickname, "", json!("1990-04-02"))]});
    let result = run(pool, s.template_id, query).await;
    assert!(matches!(result, Err(AppError::Validation(_))), "{result:?}");
}

#[tokio::test]
async fn test_malformed_trees_are_client_errors() {
    let db = setup_test_db().await;
    let pool = db.pool();
    let s = create_survey(pool).await;

    let bad = [
        json!({"rules": [leaf("input", s.name, "", json!("x"))]}),
        json!({"matchType": "xor", "rules": []}),
        json!({"matchType": "and", "rules": {}}),
        json!({"matchType": "and", "rules": [{"type": "slider", "pk": 1, "value": 3}]}),
        json!({"matchType": "and", "rules": [leaf("input", s.name, "regex", json!("x"))]}),
        json!({"matchType": "and", "rules": [leaf("boolean", s.agree, "gt", json!(true))]}),
        json!({"matchType": "and", "rules": [leaf("date", s.born, "", json!("soon"))]}),
        json!({"matchType": "and", "rules": [leaf("select", s.colors, "", json!([]))]}),
    ];
    for query in bad {
        let err = run(pool, s.template_id, query.clone()).await.unwrap_err();
        assert!(err.is_client_error(), "{query} gave {err}");
    }
}

#[tokio::test]
async fn test_unknown_template_is_not_found() {
    let db = setup_test_db().await;
    let result = run(db.pool(), 999_999, json!({})).await;
    assert!(matches!(result, Err(AppError::NotFound)));
}

#[tokio::test]
async fn test_projection_and_idempotence() {
    let db = setup_test_db().await;
    let pool = db.pool();
    let s = create_survey(pool).await;

    let older = create_form(pool, s.template_id, "older").await;
    let newer = create_form(pool, s.template_id, "newer").await;
    answer(pool, older, ElementKind::Select, s.colors, json!(["x", "y"])).await;
    answer(pool, older, ElementKind::Input, s.name, json!("ada")).await;
    answer(pool, newer, ElementKind::Input, s.name, json!("grace")).await;

    let request: FilterRequest = serde_json::from_value(json!({
        "query": {"matchType": "and", "rules": []},
        "elements": [{"type": "select", "pk": s.colors}]
    }))
    .unwrap();

    let first = evaluate(pool, s.template_id, &request).await.unwrap();
    let second = evaluate(pool, s.template_id, &request).await.unwrap();
    assert_eq!(first, second);

    let key = format!("select_{}", s.colors);
    assert_eq!(first.iter().map(|f| f.description.as_str()).collect::<Vec<_>>(), vec!["newer", "older"]);
    assert_eq!(first[0].answers.len(), 1);
    assert_eq!(first[0].answers[&key], Value::Null);
    assert_eq!(first[1].answers[&key], json!(["x", "y"]));

    let everything = evaluate(pool, s.template_id, &FilterRequest::default()).await.unwrap();
    let older_row = everything.iter().find(|f| f.form_id == older).unwrap();
    assert_eq!(older_row.answers[&format!("input_{}", s.name)], json!("ada"));
    assert_eq!(older_row.answers.len(), 2);
}

#[tokio::test]
async fn test_requested_element_must_belong_to_template() {
    let db = setup_test_db().await;
    let pool = db.pool();
    let s = create_survey(pool).await;

    let request = FilterRequest {
        query: Value::Null,
        elements: vec![formbuilder::models::element::ElementRef::new(ElementKind::Time, s.name)],
    };
    assert!(matches!(evaluate(pool, s.template_id, &request).await, Err(AppError::Validation(_))));
}
