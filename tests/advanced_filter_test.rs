use axum::Router;
use axum::http::StatusCode;
use serde_json::{Value, json};

mod common;
use common::{column, send, setup_test_app};

const FILTERS: &str = "/api/v1/search/identity/filters";
const RESULTS: &str = "/api/v1/search/identity/results?start=0&limit=25&sort=name&dir=ASC";

async fn add(app: &Router, field: &str, operation: &str, value: Value) -> (StatusCode, Value) {
    let body = json!({"field": field, "operation": operation, "value": value});
    send(app, "POST", FILTERS, Some(&body)).await
}

async fn run_names(app: &Router) -> Vec<String> {
    let (status, _) = send(app, "POST", "/api/v1/search/identity/run", None).await;
    assert_eq!(status, StatusCode::OK);
    let (_, grid) = send(app, "GET", RESULTS, None).await;
    column(&grid, "name")
}

// ============================================================================
// Building rows
// ============================================================================

#[tokio::test]
async fn test_added_rows_are_anded() {
    let app = setup_test_app().await;

    let (status, body) = add(&app, "department", "IN", json!("Finance, Executive")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["outcome"], "filtersAdded");
    assert_eq!(body["rows"][0]["description"], "department In Finance, Executive");

    let (_, body) = add(&app, "riskScore", "GE", json!(500)).await;
    assert_eq!(body["rows"].as_array().unwrap().len(), 2);
    assert!(body["source"].as_str().unwrap().contains("&&"));

    assert_eq!(run_names(&app).await, vec!["alice.adams", "carol.clark"]);
}

#[tokio::test]
async fn test_negated_row_uses_inverse_operator() {
    let app = setup_test_app().await;

    let body = json!({"field": "department", "operation": "EQ", "value": "Finance", "negated": true});
    let (status, body) = send(&app, "POST", FILTERS, Some(&body)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["rows"][0]["description"], "Not department Equals Finance");
    assert!(body["rows"][0]["source"].as_str().unwrap().contains("!="));

    assert_eq!(run_names(&app).await, vec!["carol.clark", "dave.davis", "erin.evans"]);
}

#[tokio::test]
async fn test_operator_must_fit_the_field() {
    let app = setup_test_app().await;

    let (status, body) = add(&app, "riskScore", "LIKE", json!("5")).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["details"][0]["field"], "operation");

    let (status, _) = add(&app, "noSuchField", "EQ", json!("x")).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);

    let (_, listed) = send(&app, "GET", FILTERS, None).await;
    assert!(listed["rows"].as_array().unwrap().is_empty());
}

// ============================================================================
// Grouping
// ============================================================================

#[tokio::test]
async fn test_group_and_ungroup() {
    let app = setup_test_app().await;
    add(&app, "department", "IN", json!("Finance, Executive")).await;
    add(&app, "riskScore", "GE", json!(500)).await;

    let group = json!({"indices": [0, 1], "operation": "OR"});
    let (status, body) = send(&app, "POST", &format!("{FILTERS}/group"), Some(&group)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["outcome"], "filtersGrouped");
    assert_eq!(body["rows"].as_array().unwrap().len(), 1);
    assert_eq!(body["rows"][0]["composite"], true);
    assert!(body["rows"][0]["description"].as_str().unwrap().contains(" OR "));

    assert_eq!(
        run_names(&app).await,
        vec!["alice.adams", "bob.brown", "carol.clark", "erin.evans"]
    );

    let (status, body) = send(&app, "POST", &format!("{FILTERS}/ungroup"), Some(&json!({"index": 0}))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["rows"].as_array().unwrap().len(), 2);
    assert_eq!(body["rows"][0]["composite"], false);
}

#[tokio::test]
async fn test_group_needs_two_rows_in_range() {
    let app = setup_test_app().await;
    add(&app, "department", "EQ", json!("Finance")).await;

    let group = json!({"indices": [0], "operation": "AND"});
    let (status, _) = send(&app, "POST", &format!("{FILTERS}/group"), Some(&group)).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);

    let group = json!({"indices": [0, 3]});
    let (status, _) = send(&app, "POST", &format!("{FILTERS}/group"), Some(&group)).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);

    let (status, _) = send(&app, "POST", &format!("{FILTERS}/ungroup"), Some(&json!({"index": 0}))).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn test_remove_rows() {
    let app = setup_test_app().await;
    add(&app, "department", "EQ", json!("Finance")).await;
    add(&app, "riskScore", "GE", json!(500)).await;

    let (status, body) = send(&app, "POST", &format!("{FILTERS}/remove"), Some(&json!({"indices": [0]}))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["outcome"], "filtersRemoved");
    assert_eq!(body["rows"].as_array().unwrap().len(), 1);

    assert_eq!(run_names(&app).await, vec!["alice.adams", "carol.clark", "erin.evans"]);
}

// ============================================================================
// Expression text
// ============================================================================

#[tokio::test]
async fn test_convert_splits_top_level_or() {
    let app = setup_test_app().await;

    let source = json!({"source": r#"department == "Engineering" || risk_score >= 800"#});
    let (status, body) = send(&app, "POST", &format!("{FILTERS}/convert"), Some(&source)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["outcome"], "convertedStringToFilter");
    assert_eq!(body["rows"].as_array().unwrap().len(), 2);

    let (_, view) = send(&app, "GET", "/api/v1/search/identity/inputs", None).await;
    assert_eq!(view["operation"], "OR");

    assert_eq!(run_names(&app).await, vec!["alice.adams", "dave.davis", "erin.evans"]);
}

#[tokio::test]
async fn test_compile_error_keeps_rows() {
    let app = setup_test_app().await;
    add(&app, "department", "EQ", json!("Finance")).await;

    let source = json!({"source": "department == "});
    let (status, body) = send(&app, "POST", &format!("{FILTERS}/compile"), Some(&source)).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["details"][0]["field"], "source");

    let (status, text) = send(&app, "GET", &format!("{FILTERS}/source"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert!(text.as_str().unwrap().contains("Finance"));
}

#[tokio::test]
async fn test_deeply_nested_expression_is_rejected() {
    let app = setup_test_app().await;
    add(&app, "department", "EQ", json!("Finance")).await;

    let nested = format!("{}department == \"Finance\"{}", "(".repeat(50_000), ")".repeat(50_000));
    for action in ["compile", "convert"] {
        let (status, body) = send(&app, "POST", &format!("{FILTERS}/{action}"), Some(&json!({"source": nested}))).await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert!(body["details"][0]["message"].as_str().unwrap().contains("nested too deeply"));
    }

    let (_, body) = send(&app, "GET", FILTERS, None).await;
    assert_eq!(body["rows"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_blank_compile_clears_rows() {
    let app = setup_test_app().await;
    add(&app, "department", "EQ", json!("Finance")).await;

    let (status, body) = send(&app, "POST", &format!("{FILTERS}/compile"), Some(&json!({"source": "  "}))).await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["rows"].as_array().unwrap().is_empty());
    assert_eq!(body["source"], "");
}

// ============================================================================
// Operator choices
// ============================================================================

#[tokio::test]
async fn test_refresh_operations_resets_unavailable_operator() {
    let app = setup_test_app().await;

    let (status, body) = send(
        &app,
        "GET",
        "/api/v1/search/identity/operations/riskScore?current=LIKE",
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["selected"], "EQ");
    assert_eq!(body["valueCleared"], true);
    assert!(body["operations"].as_array().unwrap().contains(&json!("GE")));

    let (_, body) = send(&app, "GET", "/api/v1/search/identity/operations/riskScore?current=GE", None).await;
    assert_eq!(body["selected"], "GE");
    assert_eq!(body["valueCleared"], false);
}
