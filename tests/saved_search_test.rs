use axum::http::StatusCode;
use serde_json::json;

mod common;
use common::{column, send, setup_test_app};

const SAVED: &str = "/api/v1/search/identity/saved";

async fn finance_search(app: &axum::Router) {
    let update = json!({"inputs": [{"name": "department", "value": ["Finance"]}]});
    let (status, _) = send(app, "PUT", "/api/v1/search/identity/inputs", Some(&update)).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_save_list_and_load() {
    let app = setup_test_app().await;
    finance_search(&app).await;

    let body = json!({"name": "Finance", "description": "Finance staff"});
    let (status, saved) = send(&app, "POST", SAVED, Some(&body)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(saved["outcome"], "rememberSearchItem");

    let (_, listed) = send(&app, "GET", SAVED, None).await;
    assert_eq!(listed.as_array().unwrap().len(), 1);
    assert_eq!(listed[0]["name"], "Finance");
    assert_eq!(listed[0]["description"], "Finance staff");

    send(&app, "POST", "/api/v1/search/identity/clear", None).await;
    let (status, loaded) = send(&app, "POST", &format!("{SAVED}/Finance/load"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(loaded["outcome"], "loadSearchItem");

    let (_, view) = send(&app, "GET", "/api/v1/search/identity/inputs", None).await;
    assert_eq!(view["loadedName"], "Finance");
    assert_eq!(view["filters"].as_array().unwrap().len(), 1);

    send(&app, "POST", "/api/v1/search/identity/run", None).await;
    let (_, grid) = send(&app, "GET", "/api/v1/search/identity/results?sort=name", None).await;
    assert_eq!(column(&grid, "name"), vec!["alice.adams", "bob.brown"]);
}

#[tokio::test]
async fn test_resaving_the_loaded_search_overwrites_it() {
    let app = setup_test_app().await;
    finance_search(&app).await;
    send(&app, "POST", SAVED, Some(&json!({"name": "Finance"}))).await;

    let update = json!({"inputs": [{"name": "riskScore", "value": 500}]});
    send(&app, "PUT", "/api/v1/search/identity/inputs", Some(&update)).await;
    let body = json!({"name": "Finance", "description": "High risk finance"});
    let (status, _) = send(&app, "POST", SAVED, Some(&body)).await;
    assert_eq!(status, StatusCode::OK);

    let (_, listed) = send(&app, "GET", SAVED, None).await;
    assert_eq!(listed.as_array().unwrap().len(), 1);
    assert_eq!(listed[0]["description"], "High risk finance");
}

#[tokio::test]
async fn test_another_search_cannot_take_a_used_name() {
    let app = setup_test_app().await;
    finance_search(&app).await;
    send(&app, "POST", SAVED, Some(&json!({"name": "Finance"}))).await;
    send(&app, "POST", SAVED, Some(&json!({"name": "Finance Copy"}))).await;

    let (status, body) = send(&app, "POST", SAVED, Some(&json!({"name": "Finance"}))).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert!(body["error"].as_str().unwrap().contains("Finance"));
}

#[tokio::test]
async fn test_save_requires_a_name_and_a_search() {
    let app = setup_test_app().await;

    let (status, _) = send(&app, "POST", SAVED, Some(&json!({"name": "Nothing yet"}))).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    finance_search(&app).await;
    let (status, _) = send(&app, "POST", SAVED, Some(&json!({"name": "  "}))).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn test_delete_saved_search() {
    let app = setup_test_app().await;
    finance_search(&app).await;
    send(&app, "POST", SAVED, Some(&json!({"name": "Finance"}))).await;

    let (status, body) = send(&app, "DELETE", &format!("{SAVED}/Finance"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["outcome"], "deleteSearchItem");

    let (_, listed) = send(&app, "GET", SAVED, None).await;
    assert!(listed.as_array().unwrap().is_empty());

    let (status, _) = send(&app, "DELETE", &format!("{SAVED}/Finance"), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let (status, _) = send(&app, "POST", &format!("{SAVED}/Finance/load"), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_saved_searches_are_per_type() {
    let app = setup_test_app().await;
    finance_search(&app).await;
    send(&app, "POST", SAVED, Some(&json!({"name": "Finance"}))).await;

    let (_, listed) = send(&app, "GET", "/api/v1/search/link/saved", None).await;
    assert!(listed.as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_overlong_name_is_rejected() {
    let app = setup_test_app().await;
    finance_search(&app).await;

    let name = "x".repeat(200);
    let (status, body) = send(&app, "POST", SAVED, Some(&json!({"name": name}))).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["details"][0]["field"], "name");
}
