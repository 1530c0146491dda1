use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

use super::{AppState, SessionContext};
use crate::entities::task_definition::{self, TaskDefinition};
use crate::errors::ApiError;
use crate::mining::{self, DirectedMiningForm, ItMiningForm, MiningForm};
use crate::search::Outcome;
use crate::tasks::{self, LaunchResult, TaskArguments};

#[utoipa::path(
    post,
    path = "/mining/directed/args",
    tag = "mining",
    request_body = DirectedMiningForm,
    responses(
        (status = 200, description = "Task arguments of the wizard", body = BTreeMap<String, String>),
        (status = 422, description = "The wizard is incomplete")
    )
)]
pub async fn directed_arguments(
    ctx: SessionContext,
    Json(form): Json<DirectedMiningForm>,
) -> Result<Json<TaskArguments>, ApiError> {
    Ok(Json(form.arguments(&ctx.user)?))
}

#[utoipa::path(
    post,
    path = "/mining/it/args",
    tag = "mining",
    request_body = ItMiningForm,
    responses(
        (status = 200, description = "Task arguments of the wizard", body = BTreeMap<String, String>),
        (status = 422, description = "The wizard is incomplete")
    )
)]
pub async fn it_arguments(
    State(state): State<AppState>,
    ctx: SessionContext,
    Json(form): Json<ItMiningForm>,
) -> Result<Json<TaskArguments>, ApiError> {
    Ok(Json(form.arguments(&ctx.user, &state.config.mining)?))
}

#[derive(Debug, Clone, Copy, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub enum MiningKind {
    Directed,
    It,
}

#[derive(Debug, Clone, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct TemplateQuery {
    /// `directed` or `it`.
    pub kind: MiningKind,
}

#[utoipa::path(
    get,
    path = "/mining/templates",
    tag = "mining",
    params(TemplateQuery),
    responses((status = 200, description = "Templates of one wizard", body = [TaskDefinition]))
)]
pub async fn list_templates(
    State(state): State<AppState>,
    Query(query): Query<TemplateQuery>,
) -> Result<Json<Vec<TaskDefinition>>, ApiError> {
    let sub_type = match query.kind {
        MiningKind::Directed => task_definition::SUB_TYPE_DIRECTED_MINING,
        MiningKind::It => task_definition::SUB_TYPE_IT_MINING,
    };
    Ok(Json(tasks::list_templates(&state.search.db, sub_type).await?))
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SaveTemplateRequest {
    pub form: MiningForm,
    pub description: Option<String>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct TemplateResponse {
    pub outcome: Outcome,
    pub template: TaskDefinition,
}

#[utoipa::path(
    post,
    path = "/mining/templates",
    tag = "mining",
    request_body = SaveTemplateRequest,
    responses(
        (status = 200, description = "Template saved", body = TemplateResponse),
        (status = 409, description = "A template with this name exists"),
        (status = 422, description = "The wizard is incomplete")
    )
)]
pub async fn save_template(
    State(state): State<AppState>,
    ctx: SessionContext,
    Json(request): Json<SaveTemplateRequest>,
) -> Result<Json<TemplateResponse>, ApiError> {
    let template = mining::save_template(
        &state.search.db,
        &request.form,
        request.description,
        &ctx.user,
        &state.config.mining,
    )
    .await?;
    Ok(Json(TemplateResponse {
        outcome: Outcome::TemplateSaved,
        template,
    }))
}

#[utoipa::path(
    delete,
    path = "/mining/templates/{id}",
    tag = "mining",
    params(("id" = Uuid, Path, description = "Template id")),
    responses(
        (status = 204, description = "Template deleted"),
        (status = 404, description = "Template not found")
    )
)]
pub async fn delete_template(State(state): State<AppState>, Path(id): Path<Uuid>) -> Result<StatusCode, ApiError> {
    tasks::delete_template(&state.search.db, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct LaunchResponse {
    pub outcome: Outcome,
    pub result: LaunchResult,
}

#[utoipa::path(
    post,
    path = "/mining/launch",
    tag = "mining",
    request_body = MiningForm,
    responses(
        (status = 200, description = "Task submitted", body = LaunchResponse),
        (status = 409, description = "The same mining run is already pending"),
        (status = 422, description = "The wizard is incomplete")
    )
)]
pub async fn launch(
    State(state): State<AppState>,
    ctx: SessionContext,
    Json(form): Json<MiningForm>,
) -> Result<Json<LaunchResponse>, ApiError> {
    let result = mining::launch(state.launcher.as_ref(), &form, &ctx.user, &state.config.mining).await?;
    Ok(Json(LaunchResponse {
        outcome: Outcome::TaskLaunched,
        result,
    }))
}
