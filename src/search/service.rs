use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ActiveValue::Set, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::str::FromStr;
use std::sync::Arc;
use tracing::{debug, info, warn};
use utoipa::ToSchema;
use uuid::Uuid;

use super::{
    ExportMonitor, GridState, Outcome, QueryExecutor, Row, SearchEvent, SearchItem, SearchItemFilter, SearchPhase,
    SearchType, SessionStore,
};
use crate::config::SearchSettings;
use crate::convert::{FilterConverter, compose};
use crate::definitions::{
    BuildContext, Catalog, FieldConfig, InputType, ListOperation, SearchInputDefinition, TypeConfig,
};
use crate::entities::saved_search::{self, SavedSearchSummary};
use crate::entities::task_definition;
use crate::errors::ApiError;
use crate::filter::{BooleanOperation, Filter, FilterValue, MatchMode};
use crate::grid::{GridParams, GridResponse};
use crate::tasks::{self, DefinitionDraft, TaskArguments};
use crate::validation::{MAX_NAME_LENGTH, ValidationError, ValidationErrors, validators};

/// Definition family restricted to the selected applications.
pub const EXTENDED_LINK_TYPE: &str = "ExtendedLinkIdentity";
const LINK_APPLICATION_PROPERTY: &str = "Link.application_name";

/// Everything a search session needs besides its own state.
#[derive(Debug, Clone)]
pub struct SearchServices {
    pub db: DatabaseConnection,
    pub sessions: SessionStore,
    pub catalog: Arc<Catalog>,
    pub settings: SearchSettings,
}

/// One edited input.
#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct InputValue {
    pub name: String,
    #[serde(default)]
    #[schema(value_type = Object)]
    pub value: serde_json::Value,
    pub input_type: Option<String>,
    pub match_mode: Option<String>,
    pub ignore_case: Option<bool>,
    pub list_operation: Option<String>,
}

/// Form submission for a search.
#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct InputsUpdate {
    #[serde(default)]
    pub inputs: Vec<InputValue>,
    pub operation: Option<String>,
    pub selected_fields: Option<Vec<String>>,
    pub applications: Option<Vec<String>>,
    /// Clear every input value before applying `inputs`.
    #[serde(default)]
    pub reset: bool,
}

/// Form state returned to the client.
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SearchView {
    pub search_type: SearchType,
    pub phase: SearchPhase,
    #[schema(value_type = String)]
    pub operation: BooleanOperation,
    pub name: Option<String>,
    pub description: Option<String>,
    pub loaded_name: Option<String>,
    pub selected_fields: Vec<String>,
    pub applications: Vec<String>,
    pub fields: Vec<FieldConfig>,
    pub inputs: Vec<SearchInputDefinition>,
    pub filters: Vec<SearchItemFilter>,
    pub advanced_filters: Vec<SearchItemFilter>,
}

/// Columns and rows of a full, unpaged result.
#[derive(Debug, Clone)]
pub struct ExportData {
    pub fields: Vec<FieldConfig>,
    pub rows: Vec<Row>,
}

fn restrict_to_applications(filter: Filter, applications: &[String]) -> Filter {
    let mut restricted: Vec<Filter> = applications
        .iter()
        .map(|app| Filter::and(vec![filter.clone(), Filter::eq(LINK_APPLICATION_PROPERTY, app.as_str())]))
        .collect();
    match restricted.len() {
        0 => filter,
        1 => restricted.remove(0),
        _ => Filter::or(restricted),
    }
}

fn parse_field<T: FromStr>(
    field: &str,
    value: Option<&str>,
    errors: &mut ValidationErrors,
) -> Option<T>
where
    T::Err: std::fmt::Display,
{
    let value = value.filter(|v| !v.trim().is_empty())?;
    match value.parse::<T>() {
        Ok(parsed) => Some(parsed),
        Err(err) => {
            errors.add(ValidationError::new(field, err.to_string()));
            None
        }
    }
}

/// The search of one object type within one client session.
pub struct SearchSession {
    services: SearchServices,
    session_id: String,
    owner: String,
    search_type: SearchType,
    config: TypeConfig,
    definitions: BTreeMap<String, SearchInputDefinition>,
    item: SearchItem,
}

impl SearchSession {
    /// Restore the session's cached item, or start a fresh one.
    ///
    /// # Errors
    /// `NotFound` when the catalog has no configuration for `search_type`.
    pub async fn restore(
        services: SearchServices,
        session_id: impl Into<String>,
        owner: impl Into<String>,
        search_type: SearchType,
    ) -> Result<Self, ApiError> {
        let session_id = session_id.into();
        let config = services
            .catalog
            .type_config(search_type)
            .cloned()
            .ok_or_else(|| ApiError::not_found("search type", Some(search_type.to_string())))?;
        let item = services
            .sessions
            .get::<SearchItem>(&session_id, &search_type.search_item_key())
            .await
            .unwrap_or_else(|| Self::fresh_item(search_type, &config));

        let mut session = Self {
            definitions: BTreeMap::new(),
            services,
            session_id,
            owner: owner.into(),
            search_type,
            config,
            item,
        };
        session.restore_inputs();
        debug!(search_type = %search_type, phase = ?session.item.phase, "Restored search session");
        Ok(session)
    }

    fn fresh_item(search_type: SearchType, config: &TypeConfig) -> SearchItem {
        let mut item = SearchItem::new(search_type);
        item.selected_fields.clone_from(&config.default_fields);
        item
    }

    /// Catalog definitions with the item's saved inputs laid over them.
    fn restore_inputs(&mut self) {
        self.definitions = self.services.catalog.definitions_for(self.search_type);
        for input in &self.item.inputs {
            if let Some(definition) = self.definitions.get_mut(&input.name) {
                *definition = input.clone();
            }
        }
    }

    // ============================================================================
    // Accessors
    // ============================================================================

    #[must_use]
    pub const fn search_type(&self) -> SearchType {
        self.search_type
    }

    #[must_use]
    pub const fn item(&self) -> &SearchItem {
        &self.item
    }

    #[must_use]
    pub const fn phase(&self) -> SearchPhase {
        self.item.phase
    }

    #[must_use]
    pub const fn definitions(&self) -> &BTreeMap<String, SearchInputDefinition> {
        &self.definitions
    }

    #[must_use]
    pub const fn type_config(&self) -> &TypeConfig {
        &self.config
    }

    #[must_use]
    pub fn view(&self) -> SearchView {
        SearchView {
            search_type: self.search_type,
            phase: self.item.phase,
            operation: self.item.operation,
            name: self.item.name.clone(),
            description: self.item.description.clone(),
            loaded_name: self.item.loaded_name.clone(),
            selected_fields: self.item.selected_fields.clone(),
            applications: self.item.applications.clone(),
            fields: self.config.fields.clone(),
            inputs: self.definitions.values().cloned().collect(),
            filters: self.item.filters.clone(),
            advanced_filters: self.item.advanced_filters.clone(),
        }
    }

    pub(super) const fn item_mut(&mut self) -> &mut SearchItem {
        &mut self.item
    }

    pub(super) const fn build_context(&self) -> BuildContext {
        BuildContext {
            enable_calendar: self.services.settings.enable_calendar,
        }
    }

    pub(super) fn transition(&mut self, event: SearchEvent) {
        let next = self.item.phase.next(event);
        debug!(search_type = %self.search_type, from = ?self.item.phase, to = ?next, ?event, "Search phase");
        self.item.phase = next;
    }

    pub(super) async fn store_item(&self) -> Result<(), ApiError> {
        self.services
            .sessions
            .put(&self.session_id, &self.search_type.search_item_key(), &self.item)
            .await
    }

    fn executor(&self) -> QueryExecutor<'_> {
        QueryExecutor::new(&self.services.db, &self.config.schema)
    }

    /// Field configurations of the selected columns, in selection order.
    #[must_use]
    pub fn selected_fields(&self) -> Vec<&FieldConfig> {
        let names = if self.item.selected_fields.is_empty() {
            &self.config.default_fields
        } else {
            &self.item.selected_fields
        };
        names
            .iter()
            .filter_map(|name| {
                let field = self.config.field(name);
                if field.is_none() {
                    debug!(search_type = %self.search_type, field = %name, "Skipping unknown column");
                }
                field
            })
            .collect()
    }

    // ============================================================================
    // Form editing
    // ============================================================================

    /// Apply a form submission and save the item. Nothing changes when any field is invalid.
    ///
    /// # Errors
    /// `ValidationFailed` listing every malformed operator, match mode or unknown field.
    pub async fn update_inputs(&mut self, update: InputsUpdate) -> Result<(), ApiError> {
        let mut errors = ValidationErrors::new();
        let operation = parse_field::<BooleanOperation>("operation", update.operation.as_deref(), &mut errors);

        let mut staged = Vec::with_capacity(update.inputs.len());
        for input in &update.inputs {
            let Some(current) = self.definitions.get(&input.name) else {
                errors.add(ValidationError::new(&input.name, "Unknown search field"));
                continue;
            };
            let mut definition = current.clone();
            if let Some(input_type) = parse_field::<InputType>(&input.name, input.input_type.as_deref(), &mut errors) {
                definition.input_type = input_type;
            }
            if let Some(mode) = parse_field::<MatchMode>(&input.name, input.match_mode.as_deref(), &mut errors) {
                definition.match_mode = Some(mode);
            }
            if let Some(list_operation) =
                parse_field::<ListOperation>(&input.name, input.list_operation.as_deref(), &mut errors)
            {
                definition.list_operation = list_operation;
            }
            if let Some(ignore_case) = input.ignore_case {
                definition.ignore_case = ignore_case;
            }
            definition.value = FilterValue::from_json(&input.value);
            staged.push(definition);
        }

        if let Some(fields) = &update.selected_fields {
            for name in fields {
                if self.config.field(name).is_none() {
                    errors.add(ValidationError::new("selectedFields", format!("Unknown column: {name}")));
                }
            }
        }
        errors.result()?;

        if update.reset {
            self.definitions.values_mut().for_each(SearchInputDefinition::clear);
        }
        for definition in staged {
            self.definitions.insert(definition.name.clone(), definition);
        }
        if let Some(operation) = operation {
            self.item.operation = operation;
        }
        if let Some(fields) = update.selected_fields {
            self.item.selected_fields = fields;
        }
        if let Some(applications) = update.applications {
            self.item.applications = applications;
        }
        self.transition(SearchEvent::Edit);
        self.save().await
    }

    /// Rebuild the form rows from the populated inputs and cache the item.
    ///
    /// # Errors
    /// `ValidationFailed` when a value does not fit its field. The cached item is left as it was.
    pub async fn save(&mut self) -> Result<(), ApiError> {
        let ctx = self.build_context();
        let mut errors = ValidationErrors::new();
        let mut rows = Vec::new();
        let mut inputs = Vec::new();

        for definition in self.definitions.values() {
            if definition.value.is_blank() || !self.config.allows(&definition.search_type) {
                continue;
            }
            let filter = match definition.filter(&ctx) {
                Ok(Some(filter)) => filter,
                Ok(None) => continue,
                Err(err) => {
                    errors.add(ValidationError::new(&definition.name, err.to_string()));
                    continue;
                }
            };
            let filter = if definition.search_type == EXTENDED_LINK_TYPE {
                restrict_to_applications(filter, &self.item.applications)
            } else {
                filter
            };
            let description = format!(
                "{} {} {}",
                definition.header(),
                definition.input_type.operation().display_name(),
                definition.value.display_text()
            );
            rows.push(SearchItemFilter {
                description: description.trim_end().to_string(),
                value: definition.value.clone(),
                filter,
                join: definition.join(),
            });
            inputs.push(definition.clone());
        }
        errors.result()?;

        self.item.filters = rows;
        self.item.inputs = inputs;
        self.transition(SearchEvent::Save);
        self.store_item().await
    }

    /// The single filter the current item searches with.
    #[must_use]
    pub fn get_filter(&self) -> Option<Filter> {
        let mut filters = self.item.all_joins();
        for name in &self.item.selected_fields {
            if let Some(join) = self.definitions.get(name).and_then(SearchInputDefinition::join)
                && !filters.contains(&join)
            {
                filters.push(join);
            }
        }
        filters.extend(self.item.filter_list());
        let converted = FilterConverter::new(&self.definitions).convert(&filters);
        compose(self.item.operation, converted)
    }

    // ============================================================================
    // Querying
    // ============================================================================

    /// Save the item and, when configured, prove its filter executes.
    ///
    /// # Errors
    /// `BadRequest` with the invalid-filters message when validation fails. The session
    /// returns to editing.
    pub async fn run_query(&mut self) -> Result<Outcome, ApiError> {
        if self.item.search_type != self.search_type {
            self.clear_session().await;
        }
        self.save().await?;

        if self.services.settings.pre_validate {
            let filter = self.get_filter();
            if let Err(err) = self.executor().validate(filter.as_ref()).await {
                warn!(search_type = %self.search_type, error = %err, "Search filters failed validation");
                self.transition(SearchEvent::QueryFailed);
                self.store_item().await?;
                return Err(ApiError::invalid_filters());
            }
        }

        self.transition(SearchEvent::QuerySucceeded);
        self.store_item().await?;
        info!(search_type = %self.search_type, filters = self.item.filter_list().len(), "Search query accepted");
        Ok(Outcome::SearchResults)
    }

    /// One grid page. Paging and sorting fall back to the last grid state of the session.
    ///
    /// # Errors
    /// `BadRequest` while the last query failed, `Database` on query errors.
    pub async fn results(&mut self, params: &GridParams) -> Result<GridResponse, ApiError> {
        if self.item.phase == SearchPhase::Edited {
            return Err(ApiError::invalid_filters());
        }
        let settings = &self.services.settings;
        let grid_key = self.search_type.grid_state_key();
        let stored: Option<GridState> = self.services.sessions.get(&self.session_id, &grid_key).await;

        let (start, limit) = params
            .pagination(settings.max_page_size)
            .or_else(|| stored.as_ref().map(|s| (s.start, s.limit)))
            .unwrap_or((0, settings.default_page_size));
        let sorters = params
            .sorting()
            .or_else(|| stored.map(|s| s.sorters))
            .unwrap_or_default();

        let filter = self.get_filter();
        let fields = self.selected_fields();
        let executor = self.executor();
        let total = executor.count(filter.as_ref()).await?;
        let rows = executor
            .rows(filter.as_ref(), &fields, &sorters, Some((start, limit)))
            .await?;
        let response = GridResponse::new(&fields, rows, total, &sorters);

        self.services
            .sessions
            .put(&self.session_id, &grid_key, &GridState { start, limit, sorters })
            .await?;
        self.transition(SearchEvent::Render);
        self.store_item().await?;
        Ok(response)
    }

    /// Every matching row, ordered like the grid.
    ///
    /// # Errors
    /// `Database` on query errors.
    pub async fn export_data(&self) -> Result<ExportData, ApiError> {
        let sorters = self
            .services
            .sessions
            .get::<GridState>(&self.session_id, &self.search_type.grid_state_key())
            .await
            .map(|s| s.sorters)
            .unwrap_or_default();
        let filter = self.get_filter();
        let fields = self.selected_fields();
        let rows = self.executor().rows(filter.as_ref(), &fields, &sorters, None).await?;
        Ok(ExportData {
            fields: fields.into_iter().cloned().collect(),
            rows,
        })
    }

    /// Record a finished export.
    ///
    /// # Errors
    /// Only when the monitor cannot be stored.
    pub async fn record_export(&self, format: &str, file_name: &str, rows: usize) -> Result<(), ApiError> {
        let monitor = ExportMonitor {
            format: format.to_string(),
            file_name: file_name.to_string(),
            rows: rows as u64,
            completed: true,
        };
        self.services
            .sessions
            .put(&self.session_id, &self.search_type.export_monitor_key(), &monitor)
            .await
    }

    // ============================================================================
    // Saved searches
    // ============================================================================

    async fn find_saved(&self, name: &str) -> Result<Option<saved_search::Model>, ApiError> {
        Ok(saved_search::Entity::find()
            .filter(saved_search::Column::Owner.eq(self.owner.as_str()))
            .filter(saved_search::Column::SearchType.eq(self.search_type.slug()))
            .filter(saved_search::Column::Name.eq(name))
            .one(&self.services.db)
            .await?)
    }

    /// The owner's saved searches of this type.
    ///
    /// # Errors
    /// `Database` on query errors.
    pub async fn list_saved(&self) -> Result<Vec<SavedSearchSummary>, ApiError> {
        let models = saved_search::Entity::find()
            .filter(saved_search::Column::Owner.eq(self.owner.as_str()))
            .filter(saved_search::Column::SearchType.eq(self.search_type.slug()))
            .order_by_asc(saved_search::Column::Name)
            .all(&self.services.db)
            .await?;
        Ok(models.into_iter().map(Into::into).collect())
    }

    /// Persist the cached item under `name`.
    ///
    /// An existing search of that name is only overwritten when it is the one this item
    /// was loaded from.
    ///
    /// # Errors
    /// `ValidationFailed` for an empty name, `NotFound` without a cached item, `Conflict`
    /// for a duplicate name.
    pub async fn save_query(&mut self, name: &str, description: Option<String>) -> Result<Outcome, ApiError> {
        validators::validate_required("name", name)?;
        validators::validate_length("name", name.trim(), None, Some(MAX_NAME_LENGTH))?;
        let name = name.trim();
        let cached: Option<SearchItem> = self
            .services
            .sessions
            .get(&self.session_id, &self.search_type.search_item_key())
            .await;
        if cached.is_none() {
            return Err(ApiError::not_found("search item", None));
        }

        let existing = self.find_saved(name).await?;
        let mut item = self.item.clone();
        item.name = Some(name.to_string());
        item.description.clone_from(&description);
        item.loaded_name = Some(name.to_string());
        let json = serde_json::to_value(&item)
            .map_err(|err| ApiError::internal("Cannot encode search item", Some(err.to_string())))?;
        let now = Utc::now();

        match existing {
            Some(model) if self.item.loaded_name.as_deref() == Some(name) => {
                let mut active: saved_search::ActiveModel = model.into();
                active.item = Set(json);
                active.description = Set(description);
                active.updated_at = Set(now);
                active.update(&self.services.db).await?;
                info!(search_type = %self.search_type, name, "Updated saved search");
            }
            Some(_) => return Err(ApiError::duplicate_name("search", name)),
            None => {
                saved_search::ActiveModel {
                    id: Set(Uuid::new_v4()),
                    owner: Set(self.owner.clone()),
                    search_type: Set(self.search_type.slug().to_string()),
                    name: Set(name.to_string()),
                    description: Set(description),
                    item: Set(json),
                    created_at: Set(now),
                    updated_at: Set(now),
                }
                .insert(&self.services.db)
                .await?;
                info!(search_type = %self.search_type, name, "Saved search");
            }
        }

        self.item = item;
        self.store_item().await?;
        Ok(Outcome::RememberSearchItem)
    }

    /// Replace the session's search with the saved one.
    ///
    /// # Errors
    /// `NotFound` for an unknown name.
    pub async fn load(&mut self, name: &str) -> Result<Outcome, ApiError> {
        let model = self
            .find_saved(name)
            .await?
            .ok_or_else(|| ApiError::not_found("saved search", Some(name.to_string())))?;
        let mut item: SearchItem = serde_json::from_value(model.item)
            .map_err(|err| ApiError::internal("Saved search is unreadable", Some(err.to_string())))?;

        self.clear_session().await;
        item.search_type = self.search_type;
        item.name = Some(model.name.clone());
        item.description = model.description;
        item.loaded_name = Some(model.name);
        self.item = item;
        self.transition(SearchEvent::Load);
        self.restore_inputs();
        self.store_item().await?;
        info!(search_type = %self.search_type, name, "Loaded saved search");
        Ok(Outcome::LoadSearchItem)
    }

    /// # Errors
    /// `NotFound` for an unknown name.
    pub async fn delete(&mut self, name: &str) -> Result<Outcome, ApiError> {
        let result = saved_search::Entity::delete_many()
            .filter(saved_search::Column::Owner.eq(self.owner.as_str()))
            .filter(saved_search::Column::SearchType.eq(self.search_type.slug()))
            .filter(saved_search::Column::Name.eq(name))
            .exec(&self.services.db)
            .await?;
        if result.rows_affected == 0 {
            return Err(ApiError::not_found("saved search", Some(name.to_string())));
        }
        if self.item.loaded_name.as_deref() == Some(name) {
            self.item.loaded_name = None;
            self.store_item().await?;
        }
        info!(search_type = %self.search_type, name, "Deleted saved search");
        Ok(Outcome::DeleteSearchItem)
    }

    async fn clear_session(&mut self) {
        self.services
            .sessions
            .clear_type(&self.session_id, self.search_type)
            .await;
        self.item = Self::fresh_item(self.search_type, &self.config);
        self.restore_inputs();
    }

    /// Drop this type's session state.
    pub async fn clear(&mut self) -> Outcome {
        self.clear_session().await;
        self.transition(SearchEvent::Clear);
        info!(search_type = %self.search_type, "Cleared search item");
        Outcome::SearchResults
    }

    // ============================================================================
    // Reports
    // ============================================================================

    /// Store the current search as a report definition.
    ///
    /// # Errors
    /// `ValidationFailed` for an empty name, `Conflict` when a task definition already
    /// uses it.
    pub async fn save_as_report(&self, name: &str, description: Option<String>) -> Result<Outcome, ApiError> {
        validators::validate_required("name", name)?;
        validators::validate_length("name", name.trim(), None, Some(MAX_NAME_LENGTH))?;
        let mut arguments = TaskArguments::new();
        arguments.insert("searchType".into(), self.search_type.slug().to_string());
        arguments.insert("operation".into(), self.item.operation.as_str().to_string());
        arguments.insert(
            "fields".into(),
            self.selected_fields()
                .iter()
                .map(|f| f.name.as_str())
                .collect::<Vec<_>>()
                .join(","),
        );
        if let Some(filter) = self.get_filter() {
            arguments.insert("filter".into(), filter.to_string());
        }

        let draft = DefinitionDraft {
            id: None,
            name: name.trim().to_string(),
            sub_type: task_definition::SUB_TYPE_SEARCH_REPORT.to_string(),
            owner: self.owner.clone(),
            description,
            template: false,
            arguments,
        };
        tasks::save_definition(&self.services.db, draft, "report").await?;
        Ok(Outcome::SaveSearchAsReport)
    }
}
