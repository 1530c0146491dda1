#![allow(dead_code)]

use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode, header};
use identity_search::api::{self, AppState, SESSION_HEADER, USER_HEADER};
use identity_search::config::AppConfig;
use identity_search::definitions::Catalog;
use identity_search::migration::Migrator;
use identity_search::search::SessionStore;
use identity_search::search::service::SearchServices;
use identity_search::tasks::DatabaseTaskLauncher;
use sea_orm::{ConnectionTrait, Database, DatabaseConnection, DbErr};
use sea_orm_migration::MigratorTrait;
use serde_json::Value;
use std::sync::Arc;
use tower::ServiceExt;
use utoipa_axum::router::OpenApiRouter;

pub const SESSION: &str = "test-session";
pub const USER: &str = "spadmin";

/// The searchable object tables, owned by the host system in production.
const HOST_TABLES: &[&str] = &[
    r"CREATE TABLE identities (
        id TEXT PRIMARY KEY NOT NULL,
        name TEXT NOT NULL,
        firstname TEXT,
        lastname TEXT,
        display_name TEXT,
        email TEXT,
        department TEXT,
        manager_name TEXT,
        inactive BOOLEAN NOT NULL DEFAULT 0,
        risk_score INTEGER,
        created TEXT,
        last_refresh TEXT
    )",
    r"CREATE TABLE links (
        id TEXT PRIMARY KEY NOT NULL,
        identity_id TEXT NOT NULL,
        application_name TEXT NOT NULL,
        native_identity TEXT NOT NULL,
        display_name TEXT,
        instance TEXT,
        department TEXT,
        created TEXT,
        last_refresh TEXT
    )",
    r"CREATE TABLE identity_capabilities (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        identity_id TEXT NOT NULL,
        name TEXT NOT NULL
    )",
    r"CREATE TABLE identity_workgroups (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        identity_id TEXT NOT NULL,
        name TEXT NOT NULL
    )",
    r"CREATE TABLE identity_external_attributes (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        object_id TEXT NOT NULL,
        attribute_name TEXT NOT NULL,
        value TEXT
    )",
    r"CREATE TABLE audit_events (
        id TEXT PRIMARY KEY NOT NULL,
        created TEXT,
        action TEXT,
        source TEXT,
        target TEXT,
        application TEXT,
        account_name TEXT,
        attribute_name TEXT,
        attribute_value TEXT
    )",
    r"CREATE TABLE syslog_events (
        id TEXT PRIMARY KEY NOT NULL,
        created TEXT,
        event_level TEXT,
        quick_key TEXT,
        server TEXT,
        classname TEXT,
        message TEXT,
        username TEXT
    )",
];

const SEED: &[&str] = &[
    r"INSERT INTO identities (id, name, firstname, lastname, email, department, manager_name, inactive, risk_score) VALUES
        ('i1', 'alice.adams', 'Alice', 'Adams', 'alice@example.com', 'Finance', 'carol.clark', 0, 820),
        ('i2', 'bob.brown', 'Bob', 'Brown', 'bob@example.com', 'Finance', 'carol.clark', 0, 310),
        ('i3', 'carol.clark', 'Carol', 'Clark', 'carol@example.com', 'Executive', NULL, 0, 650),
        ('i4', 'dave.davis', 'Dave', 'Davis', 'dave@example.com', 'Engineering', 'carol.clark', 1, 120),
        ('i5', 'erin.evans', 'Erin', 'Evans', 'erin@example.com', 'Engineering', 'dave.davis', 0, 540)",
    r"INSERT INTO links (id, identity_id, application_name, native_identity, department) VALUES
        ('l1', 'i1', 'Active Directory', 'CN=alice', 'Finance'),
        ('l2', 'i1', 'SAP', 'AADAMS', 'Accounting'),
        ('l3', 'i2', 'Active Directory', 'CN=bob', 'Finance'),
        ('l4', 'i5', 'LDAP', 'uid=erin', 'R&D')",
    r"INSERT INTO identity_capabilities (identity_id, name) VALUES
        ('i3', 'SystemAdministrator'),
        ('i3', 'Auditor'),
        ('i5', 'Auditor')",
    r"INSERT INTO identity_workgroups (identity_id, name) VALUES
        ('i1', 'Finance Approvers'),
        ('i2', 'Finance Approvers')",
    r"INSERT INTO identity_external_attributes (object_id, attribute_name, value) VALUES
        ('i1', 'costCenter', 'CC-100'),
        ('i1', 'region', 'EMEA'),
        ('i2', 'costCenter', 'CC-200'),
        ('i5', 'region', 'EMEA')",
    r"INSERT INTO audit_events (id, created, action, source, target, application) VALUES
        ('a1', '2024-03-01T10:00:00Z', 'login', 'alice.adams', 'alice.adams', 'IdentityIQ'),
        ('a2', '2024-03-01T11:00:00Z', 'passwordChange', 'bob.brown', 'bob.brown', 'Active Directory')",
    r"INSERT INTO syslog_events (id, created, event_level, quick_key, server, message) VALUES
        ('s1', '2024-03-02T08:00:00Z', 'ERROR', 'ERR-1', 'app01', 'Connection refused'),
        ('s2', '2024-03-02T08:05:00Z', 'WARN', 'WRN-1', 'app02', 'Slow query = 5s')",
];

/// Create and fill the host tables. They sit outside the crate's migration history.
async fn create_host_tables(db: &DatabaseConnection) -> Result<(), DbErr> {
    for statement in HOST_TABLES.iter().chain(SEED) {
        db.execute_unprepared(statement).await?;
    }
    Ok(())
}

pub async fn setup_test_db() -> Result<DatabaseConnection, DbErr> {
    let db = Database::connect("sqlite::memory:").await?;
    Migrator::up(&db, None).await?;
    create_host_tables(&db).await?;
    Ok(db)
}

pub fn setup_state(db: DatabaseConnection) -> AppState {
    let config = Arc::new(AppConfig::default());
    AppState {
        search: SearchServices {
            db: db.clone(),
            sessions: SessionStore::new(),
            catalog: Arc::new(Catalog::embedded().expect("embedded catalog parses")),
            settings: config.search.clone(),
        },
        config,
        launcher: Arc::new(DatabaseTaskLauncher::new(db)),
    }
}

pub async fn setup_test_app() -> Router {
    let db = setup_test_db().await.expect("Failed to setup test database");
    let (router, _) = OpenApiRouter::new()
        .nest("/api/v1", api::router(setup_state(db)))
        .split_for_parts();
    router
}

fn request(method: &str, uri: &str, body: Option<&Value>) -> Request<Body> {
    let builder = Request::builder()
        .method(method)
        .uri(uri)
        .header(SESSION_HEADER, SESSION)
        .header(USER_HEADER, USER);
    match body {
        Some(body) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(serde_json::to_vec(body).unwrap()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    }
}

/// Send a request in the test session and return status and raw body.
pub async fn send_raw(app: &Router, method: &str, uri: &str, body: Option<&Value>) -> (StatusCode, String) {
    let response = app.clone().oneshot(request(method, uri, body)).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    (status, String::from_utf8(bytes.to_vec()).unwrap())
}

/// Send a request in the test session and parse the JSON body (`Null` when empty).
pub async fn send(app: &Router, method: &str, uri: &str, body: Option<&Value>) -> (StatusCode, Value) {
    let (status, text) = send_raw(app, method, uri, body).await;
    let json = if text.is_empty() {
        Value::Null
    } else {
        serde_json::from_str(&text).unwrap_or(Value::String(text))
    };
    (status, json)
}

/// Column values of `field` across the rows of a grid response.
pub fn column(grid: &Value, field: &str) -> Vec<String> {
    grid["results"]
        .as_array()
        .unwrap()
        .iter()
        .map(|row| row[field].as_str().unwrap_or_default().to_string())
        .collect()
}
