//! # HTTP API
//!
//! `axum` handlers for every search, editor, export and mining action, documented with
//! `utoipa` and collected by [`router`].
//!
//! Requests identify the client session with the `x-session-id` header and the acting user
//! with `x-user-name`:
//!
//! ```text
//! PUT  /api/v1/search/identity/inputs     {"inputs":[{"name":"department","value":["Finance"]}]}
//! POST /api/v1/search/identity/run
//! GET  /api/v1/search/identity/results?start=0&limit=25&sort=name&dir=ASC
//! ```

pub mod advanced;
pub mod export;
pub mod mining;
pub mod saved;
pub mod search;

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use serde::Serialize;
use std::sync::Arc;
use utoipa::{OpenApi, ToSchema};
use utoipa_axum::{router::OpenApiRouter, routes};

use crate::config::AppConfig;
use crate::errors::ApiError;
use crate::search::service::SearchServices;
use crate::search::{Outcome, SearchSession, SearchType};
use crate::tasks::TaskLauncher;

pub const SESSION_HEADER: &str = "x-session-id";
pub const USER_HEADER: &str = "x-user-name";
const ANONYMOUS_USER: &str = "anonymous";

#[derive(Clone)]
pub struct AppState {
    pub search: SearchServices,
    pub config: Arc<AppConfig>,
    pub launcher: Arc<dyn TaskLauncher>,
}

impl AppState {
    /// The caller's search of `search_type`, restored from their session.
    ///
    /// # Errors
    /// `NotFound` when the catalog does not configure `search_type`.
    pub async fn session(&self, ctx: &SessionContext, search_type: SearchType) -> Result<SearchSession, ApiError> {
        SearchSession::restore(self.search.clone(), &ctx.session_id, &ctx.user, search_type).await
    }
}

/// Session id and user of a request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionContext {
    pub session_id: String,
    pub user: String,
}

fn header(parts: &Parts, name: &str) -> Option<String> {
    parts
        .headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(ToString::to_string)
}

impl<S: Send + Sync> FromRequestParts<S> for SessionContext {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let session_id = header(parts, SESSION_HEADER)
            .ok_or_else(|| ApiError::bad_request(format!("Missing {SESSION_HEADER} header")))?;
        let user = header(parts, USER_HEADER).unwrap_or_else(|| ANONYMOUS_USER.to_string());
        Ok(Self { session_id, user })
    }
}

/// Navigation outcome of an action.
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct OutcomeResponse {
    pub outcome: Outcome,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl From<Outcome> for OutcomeResponse {
    fn from(outcome: Outcome) -> Self {
        Self { outcome, message: None }
    }
}

#[derive(OpenApi)]
#[openapi(
    info(title = "Identity Search", description = "Advanced analytics search, export and role mining"),
    tags(
        (name = "search", description = "Search inputs, queries and results"),
        (name = "filters", description = "Advanced filter editor"),
        (name = "saved", description = "Saved searches"),
        (name = "export", description = "CSV and CEF export"),
        (name = "mining", description = "Role mining wizards"),
    )
)]
pub struct ApiDoc;

/// All routes, relative to the API prefix.
pub fn router(state: AppState) -> OpenApiRouter {
    OpenApiRouter::new()
        .routes(routes!(search::get_inputs, search::update_inputs))
        .routes(routes!(search::run_query))
        .routes(routes!(search::results))
        .routes(routes!(search::clear))
        .routes(routes!(search::save_as_report))
        .routes(routes!(saved::list_saved, saved::save_query))
        .routes(routes!(saved::load_saved))
        .routes(routes!(saved::delete_saved))
        .routes(routes!(export::export_csv))
        .routes(routes!(export::export_cef))
        .routes(routes!(advanced::list_filters, advanced::add_filter))
        .routes(routes!(advanced::remove_filters))
        .routes(routes!(advanced::group_filters))
        .routes(routes!(advanced::ungroup_filter))
        .routes(routes!(advanced::compile_filter))
        .routes(routes!(advanced::convert_filter))
        .routes(routes!(advanced::filter_source))
        .routes(routes!(advanced::refresh_operations))
        .routes(routes!(mining::directed_arguments))
        .routes(routes!(mining::it_arguments))
        .routes(routes!(mining::list_templates, mining::save_template))
        .routes(routes!(mining::delete_template))
        .routes(routes!(mining::launch))
        .with_state(state)
}
