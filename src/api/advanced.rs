use axum::{
    Json,
    extract::{Path, Query, State},
};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

use super::{AppState, SessionContext};
use crate::errors::ApiError;
use crate::filter::BooleanOperation;
use crate::search::advanced::{FilterRow, NewFilterRequest, OperationChoices};
use crate::search::{AdvancedEditor, Outcome, SearchSession, SearchType};

/// Advanced rows after an editor action.
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct FiltersResponse {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub outcome: Option<Outcome>,
    pub rows: Vec<FilterRow>,
    pub source: String,
}

impl FiltersResponse {
    fn new(session: &mut SearchSession, outcome: Option<Outcome>) -> Self {
        let editor = AdvancedEditor::new(session);
        Self {
            outcome,
            rows: editor.rows(),
            source: editor.source(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct IndicesRequest {
    pub indices: Vec<usize>,
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct GroupRequest {
    pub indices: Vec<usize>,
    /// `AND` or `OR`.
    #[schema(value_type = String)]
    #[serde(default)]
    pub operation: BooleanOperation,
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct IndexRequest {
    pub index: usize,
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct SourceRequest {
    pub source: String,
}

#[derive(Debug, Clone, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct OperationQuery {
    /// Operation currently selected for the field.
    pub current: Option<String>,
}

#[utoipa::path(
    get,
    path = "/search/{search_type}/filters",
    tag = "filters",
    params(("search_type" = SearchType, Path, description = "Object type searched")),
    responses((status = 200, description = "Advanced filter rows", body = FiltersResponse))
)]
pub async fn list_filters(
    State(state): State<AppState>,
    ctx: SessionContext,
    Path(search_type): Path<SearchType>,
) -> Result<Json<FiltersResponse>, ApiError> {
    let mut session = state.session(&ctx, search_type).await?;
    Ok(Json(FiltersResponse::new(&mut session, None)))
}

#[utoipa::path(
    post,
    path = "/search/{search_type}/filters",
    tag = "filters",
    params(("search_type" = SearchType, Path, description = "Object type searched")),
    request_body = NewFilterRequest,
    responses(
        (status = 200, description = "Row added", body = FiltersResponse),
        (status = 422, description = "Unknown field, unavailable operator or missing value")
    )
)]
pub async fn add_filter(
    State(state): State<AppState>,
    ctx: SessionContext,
    Path(search_type): Path<SearchType>,
    Json(request): Json<NewFilterRequest>,
) -> Result<Json<FiltersResponse>, ApiError> {
    let mut session = state.session(&ctx, search_type).await?;
    let outcome = AdvancedEditor::new(&mut session).add(request).await?;
    Ok(Json(FiltersResponse::new(&mut session, Some(outcome))))
}

#[utoipa::path(
    post,
    path = "/search/{search_type}/filters/remove",
    tag = "filters",
    params(("search_type" = SearchType, Path, description = "Object type searched")),
    request_body = IndicesRequest,
    responses((status = 200, description = "Rows removed", body = FiltersResponse))
)]
pub async fn remove_filters(
    State(state): State<AppState>,
    ctx: SessionContext,
    Path(search_type): Path<SearchType>,
    Json(request): Json<IndicesRequest>,
) -> Result<Json<FiltersResponse>, ApiError> {
    let mut session = state.session(&ctx, search_type).await?;
    let outcome = AdvancedEditor::new(&mut session).remove(&request.indices).await?;
    Ok(Json(FiltersResponse::new(&mut session, Some(outcome))))
}

#[utoipa::path(
    post,
    path = "/search/{search_type}/filters/group",
    tag = "filters",
    params(("search_type" = SearchType, Path, description = "Object type searched")),
    request_body = GroupRequest,
    responses((status = 200, description = "Rows grouped", body = FiltersResponse))
)]
pub async fn group_filters(
    State(state): State<AppState>,
    ctx: SessionContext,
    Path(search_type): Path<SearchType>,
    Json(request): Json<GroupRequest>,
) -> Result<Json<FiltersResponse>, ApiError> {
    let mut session = state.session(&ctx, search_type).await?;
    let outcome = AdvancedEditor::new(&mut session)
        .group(&request.indices, request.operation)
        .await?;
    Ok(Json(FiltersResponse::new(&mut session, Some(outcome))))
}

#[utoipa::path(
    post,
    path = "/search/{search_type}/filters/ungroup",
    tag = "filters",
    params(("search_type" = SearchType, Path, description = "Object type searched")),
    request_body = IndexRequest,
    responses((status = 200, description = "Group split into rows", body = FiltersResponse))
)]
pub async fn ungroup_filter(
    State(state): State<AppState>,
    ctx: SessionContext,
    Path(search_type): Path<SearchType>,
    Json(request): Json<IndexRequest>,
) -> Result<Json<FiltersResponse>, ApiError> {
    let mut session = state.session(&ctx, search_type).await?;
    let outcome = AdvancedEditor::new(&mut session).ungroup(request.index).await?;
    Ok(Json(FiltersResponse::new(&mut session, Some(outcome))))
}

#[utoipa::path(
    post,
    path = "/search/{search_type}/filters/compile",
    tag = "filters",
    params(("search_type" = SearchType, Path, description = "Object type searched")),
    request_body = SourceRequest,
    responses(
        (status = 200, description = "Rows replaced by the compiled expression", body = FiltersResponse),
        (status = 422, description = "The expression does not compile")
    )
)]
pub async fn compile_filter(
    State(state): State<AppState>,
    ctx: SessionContext,
    Path(search_type): Path<SearchType>,
    Json(request): Json<SourceRequest>,
) -> Result<Json<FiltersResponse>, ApiError> {
    let mut session = state.session(&ctx, search_type).await?;
    let outcome = AdvancedEditor::new(&mut session).compile(&request.source).await?;
    Ok(Json(FiltersResponse::new(&mut session, Some(outcome))))
}

#[utoipa::path(
    post,
    path = "/search/{search_type}/filters/convert",
    tag = "filters",
    params(("search_type" = SearchType, Path, description = "Object type searched")),
    request_body = SourceRequest,
    responses(
        (status = 200, description = "Expression split into rows", body = FiltersResponse),
        (status = 422, description = "The expression does not compile")
    )
)]
pub async fn convert_filter(
    State(state): State<AppState>,
    ctx: SessionContext,
    Path(search_type): Path<SearchType>,
    Json(request): Json<SourceRequest>,
) -> Result<Json<FiltersResponse>, ApiError> {
    let mut session = state.session(&ctx, search_type).await?;
    let outcome = AdvancedEditor::new(&mut session)
        .convert_string_to_filters(&request.source)
        .await?;
    Ok(Json(FiltersResponse::new(&mut session, Some(outcome))))
}

#[utoipa::path(
    get,
    path = "/search/{search_type}/filters/source",
    tag = "filters",
    params(("search_type" = SearchType, Path, description = "Object type searched")),
    responses((status = 200, description = "Advanced rows as expression text", body = String))
)]
pub async fn filter_source(
    State(state): State<AppState>,
    ctx: SessionContext,
    Path(search_type): Path<SearchType>,
) -> Result<String, ApiError> {
    let mut session = state.session(&ctx, search_type).await?;
    Ok(AdvancedEditor::new(&mut session).source())
}

#[utoipa::path(
    get,
    path = "/search/{search_type}/operations/{field}",
    tag = "filters",
    params(
        ("search_type" = SearchType, Path, description = "Object type searched"),
        ("field" = String, Path, description = "Search field name"),
        OperationQuery
    ),
    responses(
        (status = 200, description = "Operators offered for the field", body = OperationChoices),
        (status = 422, description = "Unknown field")
    )
)]
pub async fn refresh_operations(
    State(state): State<AppState>,
    ctx: SessionContext,
    Path((search_type, field)): Path<(SearchType, String)>,
    Query(query): Query<OperationQuery>,
) -> Result<Json<OperationChoices>, ApiError> {
    let mut session = state.session(&ctx, search_type).await?;
    let choices = AdvancedEditor::new(&mut session).refresh_operations(&field, query.current.as_deref())?;
    Ok(Json(choices))
}
