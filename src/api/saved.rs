use axum::{
    Json,
    extract::{Path, State},
};

use super::search::NamedRequest;
use super::{AppState, OutcomeResponse, SessionContext};
use crate::entities::saved_search::SavedSearchSummary;
use crate::errors::ApiError;
use crate::search::SearchType;

#[utoipa::path(
    get,
    path = "/search/{search_type}/saved",
    tag = "saved",
    params(("search_type" = SearchType, Path, description = "Object type searched")),
    responses((status = 200, description = "The caller's saved searches", body = [SavedSearchSummary]))
)]
pub async fn list_saved(
    State(state): State<AppState>,
    ctx: SessionContext,
    Path(search_type): Path<SearchType>,
) -> Result<Json<Vec<SavedSearchSummary>>, ApiError> {
    let session = state.session(&ctx, search_type).await?;
    Ok(Json(session.list_saved().await?))
}

#[utoipa::path(
    post,
    path = "/search/{search_type}/saved",
    tag = "saved",
    params(("search_type" = SearchType, Path, description = "Object type searched")),
    request_body = NamedRequest,
    responses(
        (status = 200, description = "Search saved", body = OutcomeResponse),
        (status = 409, description = "Another saved search has this name")
    )
)]
pub async fn save_query(
    State(state): State<AppState>,
    ctx: SessionContext,
    Path(search_type): Path<SearchType>,
    Json(request): Json<NamedRequest>,
) -> Result<Json<OutcomeResponse>, ApiError> {
    let mut session = state.session(&ctx, search_type).await?;
    let outcome = session.save_query(&request.name, request.description).await?;
    Ok(Json(outcome.into()))
}

#[utoipa::path(
    post,
    path = "/search/{search_type}/saved/{name}/load",
    tag = "saved",
    params(
        ("search_type" = SearchType, Path, description = "Object type searched"),
        ("name" = String, Path, description = "Saved search name")
    ),
    responses(
        (status = 200, description = "Saved search placed in the session", body = OutcomeResponse),
        (status = 404, description = "No saved search with this name")
    )
)]
pub async fn load_saved(
    State(state): State<AppState>,
    ctx: SessionContext,
    Path((search_type, name)): Path<(SearchType, String)>,
) -> Result<Json<OutcomeResponse>, ApiError> {
    let mut session = state.session(&ctx, search_type).await?;
    Ok(Json(session.load(&name).await?.into()))
}

#[utoipa::path(
    delete,
    path = "/search/{search_type}/saved/{name}",
    tag = "saved",
    params(
        ("search_type" = SearchType, Path, description = "Object type searched"),
        ("name" = String, Path, description = "Saved search name")
    ),
    responses(
        (status = 200, description = "Saved search deleted", body = OutcomeResponse),
        (status = 404, description = "No saved search with this name")
    )
)]
pub async fn delete_saved(
    State(state): State<AppState>,
    ctx: SessionContext,
    Path((search_type, name)): Path<(SearchType, String)>,
) -> Result<Json<OutcomeResponse>, ApiError> {
    let mut session = state.session(&ctx, search_type).await?;
    Ok(Json(session.delete(&name).await?.into()))
}
