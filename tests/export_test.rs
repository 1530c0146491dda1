use axum::http::StatusCode;
use serde_json::json;

mod common;
use common::{send, send_raw, setup_test_app};

#[tokio::test]
async fn test_csv_export_of_all_matching_rows() {
    let app = setup_test_app().await;

    let update = json!({
        "selectedFields": ["name", "email", "riskScore"],
        "inputs": [{"name": "department", "value": ["Finance"]}]
    });
    send(&app, "PUT", "/api/v1/search/identity/inputs", Some(&update)).await;
    send(&app, "POST", "/api/v1/search/identity/run", None).await;
    // A one-row page must not limit the export.
    send(&app, "GET", "/api/v1/search/identity/results?start=0&limit=1&sort=name&dir=ASC", None).await;

    let (status, body) = send_raw(&app, "GET", "/api/v1/search/identity/export/csv", None).await;
    assert_eq!(status, StatusCode::OK);
    let lines: Vec<&str> = body.split("\r\n").filter(|l| !l.is_empty()).collect();
    assert_eq!(lines.len(), 3);
    assert_eq!(lines[0], "User Name,Email,Risk Score");
    assert_eq!(lines[1], "alice.adams,alice@example.com,820");
    assert_eq!(lines[2], "bob.brown,bob@example.com,310");
}

#[tokio::test]
async fn test_csv_export_sets_attachment_headers() {
    use axum::body::Body;
    use axum::http::{Request, header};
    use identity_search::api::SESSION_HEADER;
    use tower::ServiceExt;

    let app = setup_test_app().await;
    let response = app
        .oneshot(
            Request::builder()
                .uri("/api/v1/search/identity/export/csv")
                .header(SESSION_HEADER, "headers")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers()[header::CONTENT_DISPOSITION],
        "attachment; filename=\"identitySearch.csv\""
    );
    assert!(
        response.headers()[header::CONTENT_TYPE]
            .to_str()
            .unwrap()
            .starts_with("text/csv")
    );
}

#[tokio::test]
async fn test_cef_export_of_syslog_events() {
    let app = setup_test_app().await;
    send(&app, "POST", "/api/v1/search/syslog/run", None).await;

    let (status, body) = send_raw(&app, "GET", "/api/v1/search/syslog/export/cef", None).await;
    assert_eq!(status, StatusCode::OK);
    let lines: Vec<&str> = body.lines().collect();
    assert_eq!(lines.len(), 2);

    let error = lines.iter().find(|l| l.contains("Connection refused")).unwrap();
    assert!(error.contains("|SailPoint|IdentityIQ|"));
    assert!(error.contains("|Syslog|Syslog|10|"));
    assert!(error.contains("cat=Syslog"));

    let warning = lines.iter().find(|l| l.contains("WRN-1")).unwrap();
    assert!(warning.contains("|Syslog|Syslog|5|"));
    assert!(warning.contains(r"Slow query \= 5s"));
}

#[tokio::test]
async fn test_cef_export_with_no_rows_is_rejected() {
    let app = setup_test_app().await;

    let update = json!({"inputs": [{"name": "department", "value": ["Marketing"]}]});
    send(&app, "PUT", "/api/v1/search/identity/inputs", Some(&update)).await;
    send(&app, "POST", "/api/v1/search/identity/run", None).await;

    let (status, body) = send(&app, "GET", "/api/v1/search/identity/export/cef", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "No Result found");
}
