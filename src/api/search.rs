use axum::{
    Json,
    extract::{Path, Query, State},
};
use serde::Deserialize;
use utoipa::ToSchema;

use super::{AppState, OutcomeResponse, SessionContext};
use crate::errors::ApiError;
use crate::grid::{GridParams, GridResponse};
use crate::search::SearchType;
use crate::search::service::{InputsUpdate, SearchView};

#[utoipa::path(
    get,
    path = "/search/{search_type}/inputs",
    tag = "search",
    params(("search_type" = SearchType, Path, description = "Object type searched")),
    responses(
        (status = 200, description = "Current form state", body = SearchView),
        (status = 404, description = "Search type not configured")
    )
)]
pub async fn get_inputs(
    State(state): State<AppState>,
    ctx: SessionContext,
    Path(search_type): Path<SearchType>,
) -> Result<Json<SearchView>, ApiError> {
    let session = state.session(&ctx, search_type).await?;
    Ok(Json(session.view()))
}

#[utoipa::path(
    put,
    path = "/search/{search_type}/inputs",
    tag = "search",
    params(("search_type" = SearchType, Path, description = "Object type searched")),
    request_body = InputsUpdate,
    responses(
        (status = 200, description = "Inputs saved to the session", body = SearchView),
        (status = 422, description = "A field, operator or value is invalid")
    )
)]
pub async fn update_inputs(
    State(state): State<AppState>,
    ctx: SessionContext,
    Path(search_type): Path<SearchType>,
    Json(update): Json<InputsUpdate>,
) -> Result<Json<SearchView>, ApiError> {
    let mut session = state.session(&ctx, search_type).await?;
    session.update_inputs(update).await?;
    Ok(Json(session.view()))
}

#[utoipa::path(
    post,
    path = "/search/{search_type}/run",
    tag = "search",
    params(("search_type" = SearchType, Path, description = "Object type searched")),
    responses(
        (status = 200, description = "Query accepted", body = OutcomeResponse),
        (status = 400, description = "The search filters are invalid")
    )
)]
pub async fn run_query(
    State(state): State<AppState>,
    ctx: SessionContext,
    Path(search_type): Path<SearchType>,
) -> Result<Json<OutcomeResponse>, ApiError> {
    let mut session = state.session(&ctx, search_type).await?;
    Ok(Json(session.run_query().await?.into()))
}

#[utoipa::path(
    get,
    path = "/search/{search_type}/results",
    tag = "search",
    params(("search_type" = SearchType, Path, description = "Object type searched"), GridParams),
    responses(
        (status = 200, description = "One grid page", body = GridResponse),
        (status = 400, description = "The last query was rejected")
    )
)]
pub async fn results(
    State(state): State<AppState>,
    ctx: SessionContext,
    Path(search_type): Path<SearchType>,
    Query(params): Query<GridParams>,
) -> Result<Json<GridResponse>, ApiError> {
    let mut session = state.session(&ctx, search_type).await?;
    Ok(Json(session.results(&params).await?))
}

#[utoipa::path(
    post,
    path = "/search/{search_type}/clear",
    tag = "search",
    params(("search_type" = SearchType, Path, description = "Object type searched")),
    responses((status = 200, description = "Session state of the type removed", body = OutcomeResponse))
)]
pub async fn clear(
    State(state): State<AppState>,
    ctx: SessionContext,
    Path(search_type): Path<SearchType>,
) -> Result<Json<OutcomeResponse>, ApiError> {
    let mut session = state.session(&ctx, search_type).await?;
    Ok(Json(session.clear().await.into()))
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct NamedRequest {
    pub name: String,
    pub description: Option<String>,
}

#[utoipa::path(
    post,
    path = "/search/{search_type}/report",
    tag = "search",
    params(("search_type" = SearchType, Path, description = "Object type searched")),
    request_body = NamedRequest,
    responses(
        (status = 200, description = "Report definition created", body = OutcomeResponse),
        (status = 409, description = "A report with this name exists")
    )
)]
pub async fn save_as_report(
    State(state): State<AppState>,
    ctx: SessionContext,
    Path(search_type): Path<SearchType>,
    Json(request): Json<NamedRequest>,
) -> Result<Json<OutcomeResponse>, ApiError> {
    let session = state.session(&ctx, search_type).await?;
    let outcome = session.save_as_report(&request.name, request.description).await?;
    Ok(Json(outcome.into()))
}
