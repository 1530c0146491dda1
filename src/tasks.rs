//! Task definitions and task submission.
//!
//! Reports saved from a search and role mining templates are both task definitions with a
//! flat string argument map. Submitting a task goes through [`TaskLauncher`]; the bundled
//! [`DatabaseTaskLauncher`] records a pending task result for an external executor.

use async_trait::async_trait;
use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ActiveValue::Set, ColumnTrait, DatabaseConnection, EntityTrait, PaginatorTrait,
    QueryFilter, QueryOrder,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::{debug, info};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::entities::{task_definition, task_result};
use crate::errors::ApiError;

/// Flat argument map understood by the task executors.
pub type TaskArguments = BTreeMap<String, String>;

/// Argument carrying the name of the result a run produces.
pub const ARG_RESULT_NAME: &str = "resultName";

/// A definition to create, or to update when `id` is set.
#[derive(Debug, Clone)]
pub struct DefinitionDraft {
    pub id: Option<Uuid>,
    pub name: String,
    pub sub_type: String,
    pub owner: String,
    pub description: Option<String>,
    pub template: bool,
    pub arguments: TaskArguments,
}

/// Store `draft`.
///
/// An update by id replaces the arguments of that definition. It only reaches a definition
/// of the draft's owner, sub-type and template flag. A new definition is refused when any
/// definition already uses its name.
///
/// # Errors
/// `NotFound` for an id outside that scope, `Conflict` for a duplicate name, `Database`
/// otherwise.
pub async fn save_definition(
    db: &DatabaseConnection,
    draft: DefinitionDraft,
    kind: &str,
) -> Result<task_definition::TaskDefinition, ApiError> {
    let now = Utc::now();
    let arguments = serde_json::to_value(&draft.arguments)
        .map_err(|err| ApiError::internal("Cannot encode task arguments", Some(err.to_string())))?;

    if let Some(id) = draft.id {
        let existing = task_definition::Entity::find_by_id(id)
            .filter(task_definition::Column::SubType.eq(draft.sub_type.as_str()))
            .filter(task_definition::Column::Template.eq(draft.template))
            .filter(task_definition::Column::Owner.eq(draft.owner.as_str()))
            .one(db)
            .await?
            .ok_or_else(|| ApiError::not_found(kind, Some(id.to_string())))?;
        let mut active: task_definition::ActiveModel = existing.into();
        active.arguments = Set(arguments);
        if draft.description.is_some() {
            active.description = Set(draft.description);
        }
        active.updated_at = Set(now);
        let model = active.update(db).await?;
        info!(id = %model.id, name = %model.name, "Updated task definition");
        return Ok(model.into());
    }

    let count = task_definition::Entity::find()
        .filter(task_definition::Column::Name.eq(draft.name.as_str()))
        .count(db)
        .await?;
    if count > 0 {
        return Err(ApiError::duplicate_name(kind, &draft.name));
    }

    let model = task_definition::ActiveModel {
        id: Set(Uuid::new_v4()),
        name: Set(draft.name),
        sub_type: Set(draft.sub_type),
        owner: Set(draft.owner),
        description: Set(draft.description),
        template: Set(draft.template),
        arguments: Set(arguments),
        created_at: Set(now),
        updated_at: Set(now),
    }
    .insert(db)
    .await?;
    info!(id = %model.id, name = %model.name, sub_type = %model.sub_type, "Created task definition");
    Ok(model.into())
}

/// Templates of one sub-type, by name.
///
/// # Errors
/// Propagates database errors.
pub async fn list_templates(
    db: &DatabaseConnection,
    sub_type: &str,
) -> Result<Vec<task_definition::TaskDefinition>, ApiError> {
    let models = task_definition::Entity::find()
        .filter(task_definition::Column::SubType.eq(sub_type))
        .filter(task_definition::Column::Template.eq(true))
        .order_by_asc(task_definition::Column::Name)
        .all(db)
        .await?;
    Ok(models.into_iter().map(Into::into).collect())
}

/// Delete the template `id`. Other task definitions are never touched.
///
/// # Errors
/// `NotFound` when no template has `id`.
pub async fn delete_template(db: &DatabaseConnection, id: Uuid) -> Result<(), ApiError> {
    let result = task_definition::Entity::delete_many()
        .filter(task_definition::Column::Id.eq(id))
        .filter(task_definition::Column::Template.eq(true))
        .exec(db)
        .await?;
    if result.rows_affected == 0 {
        return Err(ApiError::not_found("template", Some(id.to_string())));
    }
    info!(%id, "Deleted template");
    Ok(())
}

/// A task run to submit.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct LaunchRequest {
    pub name: String,
    pub sub_type: String,
    pub definition_id: Option<Uuid>,
    pub launcher: String,
    pub arguments: TaskArguments,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct LaunchResult {
    pub task_result_id: Uuid,
    pub name: String,
    pub status: String,
}

#[async_trait]
pub trait TaskLauncher: Send + Sync {
    /// Submit `request` for execution.
    ///
    /// # Errors
    /// `Conflict` when a run producing the same result is still pending.
    async fn launch(&self, request: LaunchRequest) -> Result<LaunchResult, ApiError>;
}

/// Records each launch as a pending task result.
#[derive(Debug, Clone)]
pub struct DatabaseTaskLauncher {
    db: DatabaseConnection,
}

impl DatabaseTaskLauncher {
    #[must_use]
    pub const fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    async fn is_running(&self, request: &LaunchRequest) -> Result<bool, ApiError> {
        let Some(result_name) = request.arguments.get(ARG_RESULT_NAME) else {
            return Ok(false);
        };
        let pending = task_result::Entity::find()
            .filter(task_result::Column::Status.eq(task_result::STATUS_PENDING))
            .filter(task_result::Column::SubType.eq(request.sub_type.as_str()))
            .all(&self.db)
            .await?;
        Ok(pending.iter().any(|result| {
            result
                .arguments
                .get(ARG_RESULT_NAME)
                .and_then(serde_json::Value::as_str)
                == Some(result_name.as_str())
        }))
    }
}

#[async_trait]
impl TaskLauncher for DatabaseTaskLauncher {
    async fn launch(&self, request: LaunchRequest) -> Result<LaunchResult, ApiError> {
        if self.is_running(&request).await? {
            return Err(ApiError::conflict(format!("{} is already running", request.sub_type)));
        }
        let arguments = serde_json::to_value(&request.arguments)
            .map_err(|err| ApiError::internal("Cannot encode task arguments", Some(err.to_string())))?;

        let model = task_result::ActiveModel {
            id: Set(Uuid::new_v4()),
            definition_id: Set(request.definition_id),
            name: Set(request.name),
            sub_type: Set(request.sub_type),
            launcher: Set(request.launcher),
            status: Set(task_result::STATUS_PENDING.to_string()),
            arguments: Set(arguments),
            launched_at: Set(Utc::now()),
        }
        .insert(&self.db)
        .await?;
        debug!(id = %model.id, launcher = %model.launcher, "Queued task");
        info!(id = %model.id, name = %model.name, "Launched task");

        Ok(LaunchResult {
            task_result_id: model.id,
            name: model.name,
            status: model.status,
        })
    }
}
