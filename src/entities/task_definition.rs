use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use utoipa::ToSchema;

pub const SUB_TYPE_SEARCH_REPORT: &str = "Search Report";
pub const SUB_TYPE_DIRECTED_MINING: &str = "Directed Role Mining";
pub const SUB_TYPE_IT_MINING: &str = "IT Role Mining";

/// A runnable task: a report saved from a search, or a role mining template.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Deserialize, Serialize)]
#[sea_orm(table_name = "task_definitions")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    #[sea_orm(unique)]
    pub name: String,
    pub sub_type: String,
    pub owner: String,
    #[sea_orm(column_type = "Text", nullable)]
    pub description: Option<String>,
    pub template: bool,
    /// Flat string argument map.
    #[sea_orm(column_type = "Json")]
    pub arguments: Json,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct TaskDefinition {
    pub id: Uuid,
    pub name: String,
    pub sub_type: String,
    pub owner: String,
    pub description: Option<String>,
    pub template: bool,
    pub arguments: BTreeMap<String, String>,
    pub updated_at: DateTime<Utc>,
}

impl From<Model> for TaskDefinition {
    fn from(model: Model) -> Self {
        Self {
            id: model.id,
            name: model.name,
            sub_type: model.sub_type,
            owner: model.owner,
            description: model.description,
            template: model.template,
            arguments: serde_json::from_value(model.arguments).unwrap_or_default(),
            updated_at: model.updated_at,
        }
    }
}
