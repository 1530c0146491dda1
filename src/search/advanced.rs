//! Row editing behind the advanced filter panel.
//!
//! Rows live in [`SearchItem::advanced_filters`](super::SearchItem) and are composed with the
//! form rows under the item's operation. Every change marks the search as edited, so the
//! next `run_query` re-validates.

use serde::{Deserialize, Serialize};
use tracing::debug;
use utoipa::ToSchema;

use super::{Outcome, SearchEvent, SearchItemFilter, SearchSession};
use crate::definitions::{InputType, SearchInputDefinition};
use crate::errors::ApiError;
use crate::filter::{self, BooleanOperation, Filter, FilterValue, LogicalOperation, MatchMode};

/// A row to add from a field, an operator and a value.
#[derive(Debug, Clone, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct NewFilterRequest {
    pub field: String,
    /// Logical operation token (`EQ`, `LIKE`, `IN`, ...).
    pub operation: String,
    pub match_mode: Option<String>,
    #[serde(default)]
    #[schema(value_type = Object)]
    pub value: serde_json::Value,
    #[serde(default)]
    pub ignore_case: bool,
    #[serde(default)]
    pub negated: bool,
}

/// Operators offered for a field after the user picks it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct OperationChoices {
    pub field: String,
    pub operations: Vec<String>,
    pub selected: String,
    /// The value input must be emptied: the operator changed or ignores values.
    pub value_cleared: bool,
}

/// Row of the advanced panel, with its position.
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct FilterRow {
    pub index: usize,
    pub description: String,
    pub source: String,
    pub composite: bool,
}

/// Splits comma separated text for list operators.
fn list_value(value: FilterValue) -> FilterValue {
    match value {
        FilterValue::Text(text) => FilterValue::List(
            text.split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(FilterValue::from)
                .collect(),
        ),
        other => other,
    }
}

fn negate(filter: Filter) -> Filter {
    match filter {
        Filter::Leaf(mut leaf) => match leaf.operation.inverse() {
            Some(inverse) => {
                leaf.operation = inverse;
                Filter::Leaf(leaf)
            }
            None => Filter::not(Filter::Leaf(leaf)),
        },
        other => Filter::not(other),
    }
}

fn parse_operation(field: &str, token: &str) -> Result<LogicalOperation, ApiError> {
    token
        .parse::<LogicalOperation>()
        .map_err(|err| ApiError::field(field, err.to_string()))
}

pub struct AdvancedEditor<'a> {
    session: &'a mut SearchSession,
}

impl<'a> AdvancedEditor<'a> {
    pub const fn new(session: &'a mut SearchSession) -> Self {
        Self { session }
    }

    #[must_use]
    pub fn rows(&self) -> Vec<FilterRow> {
        self.session
            .item()
            .advanced_filters
            .iter()
            .enumerate()
            .map(|(index, row)| FilterRow {
                index,
                description: row.description.clone(),
                source: row.filter.to_string(),
                composite: matches!(row.filter, Filter::Composite(_)),
            })
            .collect()
    }

    /// The advanced rows composed with the item's operation, as expression text.
    #[must_use]
    pub fn source(&self) -> String {
        let item = self.session.item();
        let filters = item.advanced_filters.iter().map(|r| r.filter.clone()).collect();
        Filter::combine(item.operation, filters)
            .map(|f| f.to_string())
            .unwrap_or_default()
    }

    fn definition(&self, field: &str) -> Result<&SearchInputDefinition, ApiError> {
        self.session
            .definitions()
            .get(field)
            .ok_or_else(|| ApiError::field("field", format!("Unknown search field: {field}")))
    }

    async fn commit(&mut self, outcome: Outcome) -> Result<Outcome, ApiError> {
        self.session.transition(SearchEvent::Edit);
        self.session.store_item().await?;
        debug!(
            search_type = %self.session.search_type(),
            rows = self.session.item().advanced_filters.len(),
            ?outcome,
            "Advanced filters changed"
        );
        Ok(outcome)
    }

    fn checked_indices(&self, indices: &[usize]) -> Result<Vec<usize>, ApiError> {
        let len = self.session.item().advanced_filters.len();
        let mut checked = indices.to_vec();
        checked.sort_unstable();
        checked.dedup();
        if let Some(bad) = checked.iter().find(|&&i| i >= len) {
            return Err(ApiError::field("indices", format!("No filter row at position {bad}")));
        }
        Ok(checked)
    }

    /// Append a row built from one field.
    ///
    /// # Errors
    /// `ValidationFailed` for an unknown field, an operator the field does not offer, or a
    /// value that yields no predicate.
    pub async fn add(&mut self, request: NewFilterRequest) -> Result<Outcome, ApiError> {
        let operation = parse_operation("operation", &request.operation)?;
        let mut definition = self.definition(&request.field)?.clone();
        if !definition.property_type.allowed_operations().contains(&operation) {
            return Err(ApiError::field(
                "operation",
                format!("{} is not available for {}", operation.display_name(), definition.header()),
            ));
        }
        if let Some(mode) = request.match_mode.as_deref().filter(|m| !m.trim().is_empty()) {
            let mode = mode
                .parse::<MatchMode>()
                .map_err(|err| ApiError::field("matchMode", err.to_string()))?;
            definition.match_mode = Some(mode);
        }

        let value = FilterValue::from_json(&request.value);
        definition.value = if operation.is_list() { list_value(value) } else { value };
        definition.input_type = InputType::from_operation(operation);
        definition.ignore_case = request.ignore_case;

        let built = definition
            .filter(&self.session.build_context())
            .map_err(|err| ApiError::field(&request.field, err.to_string()))?
            .ok_or_else(|| ApiError::field("value", "A value is required"))?;
        let filter = if request.negated { negate(built) } else { built };

        let description = format!(
            "{}{} {} {}",
            if request.negated { "Not " } else { "" },
            definition.header(),
            operation.display_name(),
            definition.value.display_text()
        );
        let row = SearchItemFilter {
            description: description.trim_end().to_string(),
            value: definition.value.clone(),
            filter,
            join: definition.join(),
        };
        self.session.item_mut().advanced_filters.push(row);
        self.commit(Outcome::FiltersAdded).await
    }

    /// # Errors
    /// `ValidationFailed` when an index is out of range.
    pub async fn remove(&mut self, indices: &[usize]) -> Result<Outcome, ApiError> {
        let indices = self.checked_indices(indices)?;
        let rows = &mut self.session.item_mut().advanced_filters;
        for index in indices.into_iter().rev() {
            rows.remove(index);
        }
        self.commit(Outcome::FiltersRemoved).await
    }

    /// Replace the selected rows with one composite row at the first selected position.
    ///
    /// # Errors
    /// `ValidationFailed` for fewer than two rows or an out of range index.
    pub async fn group(&mut self, indices: &[usize], operation: BooleanOperation) -> Result<Outcome, ApiError> {
        let indices = self.checked_indices(indices)?;
        if indices.len() < 2 {
            return Err(ApiError::field("indices", "Select at least two filters to group"));
        }

        let item = self.session.item_mut();
        let mut members = Vec::with_capacity(indices.len());
        for &index in indices.iter().rev() {
            members.push(item.advanced_filters.remove(index));
        }
        members.reverse();

        for join in members.iter().filter_map(|m| m.join.clone()) {
            if !item.joins.contains(&join) {
                item.joins.push(join);
            }
        }
        let separator = format!(" {} ", operation.as_str());
        let description = format!(
            "({})",
            members.iter().map(|m| m.description.as_str()).collect::<Vec<_>>().join(&separator)
        );
        let filters = members.into_iter().map(|m| m.filter).collect();
        let Some(filter) = Filter::combine(operation, filters) else {
            return Err(ApiError::internal("Empty filter group", None));
        };

        item.advanced_filters.insert(
            indices[0],
            SearchItemFilter {
                description,
                value: FilterValue::Null,
                filter,
                join: None,
            },
        );
        self.commit(Outcome::FiltersGrouped).await
    }

    /// Split an AND or OR row back into one row per child.
    ///
    /// # Errors
    /// `ValidationFailed` when the row is not such a group.
    pub async fn ungroup(&mut self, index: usize) -> Result<Outcome, ApiError> {
        self.checked_indices(&[index])?;
        let item = self.session.item_mut();
        let children = match &item.advanced_filters[index].filter {
            Filter::Composite(group) if group.operation != BooleanOperation::Not => group.children.clone(),
            _ => return Err(ApiError::field("index", "Only AND or OR groups can be ungrouped")),
        };

        let row = item.advanced_filters.remove(index);
        if let Some(join) = row.join
            && !item.joins.contains(&join)
        {
            item.joins.push(join);
        }
        for (offset, child) in children.into_iter().enumerate() {
            item.advanced_filters.insert(index + offset, SearchItemFilter::new(child));
        }
        self.commit(Outcome::FiltersUngrouped).await
    }

    /// Replace every advanced row with the compiled expression. Blank text clears them.
    ///
    /// # Errors
    /// `ValidationFailed` on `source` with the compiler message. Nothing changes.
    pub async fn compile(&mut self, source: &str) -> Result<Outcome, ApiError> {
        let rows = if source.trim().is_empty() {
            Vec::new()
        } else {
            let filter = filter::compile(source).map_err(|err| ApiError::field("source", err.to_string()))?;
            vec![SearchItemFilter::new(filter)]
        };
        self.session.item_mut().advanced_filters = rows;
        self.commit(Outcome::FilterCompiled).await
    }

    /// Like [`compile`](Self::compile), but a top-level AND or OR becomes the item's
    /// operation with one row per child.
    ///
    /// # Errors
    /// `ValidationFailed` on `source` with the compiler message. Nothing changes.
    pub async fn convert_string_to_filters(&mut self, source: &str) -> Result<Outcome, ApiError> {
        let filter = filter::compile(source).map_err(|err| ApiError::field("source", err.to_string()))?;
        let item = self.session.item_mut();
        match filter {
            Filter::Composite(group) if group.operation != BooleanOperation::Not => {
                item.operation = group.operation;
                item.advanced_filters = group.children.into_iter().map(SearchItemFilter::new).collect();
            }
            other => item.advanced_filters = vec![SearchItemFilter::new(other)],
        }
        self.commit(Outcome::ConvertedStringToFilter).await
    }

    /// Operators for `field`, keeping `current` when the field offers it.
    ///
    /// # Errors
    /// `ValidationFailed` for an unknown field or operator token.
    pub fn refresh_operations(&self, field: &str, current: Option<&str>) -> Result<OperationChoices, ApiError> {
        let definition = self.definition(field)?;
        let allowed = definition.property_type.allowed_operations();
        let current = current
            .filter(|c| !c.trim().is_empty())
            .map(|c| parse_operation("operation", c))
            .transpose()?;
        let kept = current.filter(|op| allowed.contains(op));
        let selected = kept.or_else(|| allowed.first().copied()).unwrap_or(LogicalOperation::Eq);

        Ok(OperationChoices {
            field: field.to_string(),
            operations: allowed.iter().map(|op| op.as_str().to_string()).collect(),
            selected: selected.as_str().to_string(),
            value_cleared: selected.is_unary() || (current.is_some() && kept.is_none()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SearchSettings;
    use crate::definitions::Catalog;
    use crate::search::service::SearchServices;
    use crate::search::{SearchType, SessionStore};
    use sea_orm::Database;
    use std::sync::Arc;

    async fn session() -> SearchSession {
        let services = SearchServices {
            db: Database::connect("sqlite::memory:").await.unwrap(),
            sessions: SessionStore::new(),
            catalog: Arc::new(Catalog::embedded().unwrap()),
            settings: SearchSettings::default(),
        };
        SearchSession::restore(services, "s1", "spadmin", SearchType::Identity)
            .await
            .unwrap()
    }

    fn request(field: &str, operation: &str, value: serde_json::Value) -> NewFilterRequest {
        NewFilterRequest {
            field: field.into(),
            operation: operation.into(),
            match_mode: None,
            value,
            ignore_case: false,
            negated: false,
        }
    }

    // ============================================================================
    // Adding and removing
    // ============================================================================

    #[tokio::test]
    async fn test_add_builds_row_from_definition() {
        let mut session = session().await;
        let mut editor = AdvancedEditor::new(&mut session);
        let outcome = editor
            .add(request("department", "IN", serde_json::json!("Finance, HR")))
            .await
            .unwrap();
        assert_eq!(outcome, Outcome::FiltersAdded);

        let rows = editor.rows();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].source, r#"department.in({"Finance", "HR"})"#);
        assert_eq!(rows[0].description, "department In Finance, HR");
        assert_eq!(session.phase(), crate::search::SearchPhase::Edited);
    }

    #[tokio::test]
    async fn test_negated_add_uses_inverse_operator() {
        let mut session = session().await;
        let mut editor = AdvancedEditor::new(&mut session);
        let mut req = request("email", "EQ", serde_json::json!("a@example.com"));
        req.negated = true;
        editor.add(req).await.unwrap();
        assert_eq!(editor.rows()[0].source, r#"email != "a@example.com""#);

        let mut req = request("email", "LIKE", serde_json::json!("a"));
        req.negated = true;
        editor.add(req).await.unwrap();
        assert_eq!(editor.rows()[1].source, r#"!(email.startsWith("a"))"#);
    }

    #[tokio::test]
    async fn test_add_rejects_unavailable_operator_and_blank_value() {
        let mut session = session().await;
        let mut editor = AdvancedEditor::new(&mut session);
        let err = editor
            .add(request("riskScore", "LIKE", serde_json::json!("1")))
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::ValidationFailed { .. }));

        let err = editor.add(request("email", "EQ", serde_json::Value::Null)).await.unwrap_err();
        assert!(matches!(err, ApiError::ValidationFailed { .. }));
        assert!(editor.rows().is_empty());
    }

    #[tokio::test]
    async fn test_remove_checks_indices() {
        let mut session = session().await;
        let mut editor = AdvancedEditor::new(&mut session);
        editor.compile(r#"a == 1 && b == 2"#).await.unwrap();
        assert!(editor.remove(&[3]).await.is_err());
        editor.remove(&[0]).await.unwrap();
        assert!(editor.rows().is_empty());
    }

    // ============================================================================
    // Grouping
    // ============================================================================

    #[tokio::test]
    async fn test_group_and_ungroup() {
        let mut session = session().await;
        let mut editor = AdvancedEditor::new(&mut session);
        editor.convert_string_to_filters(r#"a == 1 || b == 2 || c == 3"#).await.unwrap();
        assert_eq!(editor.rows().len(), 3);

        editor.group(&[2, 0], BooleanOperation::And).await.unwrap();
        let rows = editor.rows();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].source, "(a == 1 && c == 3)");
        assert!(rows[0].composite);
        assert_eq!(rows[1].source, "b == 2");
        assert_eq!(editor.source(), "((a == 1 && c == 3) || b == 2)");

        editor.ungroup(0).await.unwrap();
        let sources: Vec<_> = editor.rows().into_iter().map(|r| r.source).collect();
        assert_eq!(sources, vec!["a == 1", "c == 3", "b == 2"]);
    }

    #[tokio::test]
    async fn test_group_needs_two_rows_and_ungroup_needs_a_group() {
        let mut session = session().await;
        let mut editor = AdvancedEditor::new(&mut session);
        editor.compile("a == 1").await.unwrap();
        assert!(editor.group(&[0, 0], BooleanOperation::Or).await.is_err());
        assert!(editor.ungroup(0).await.is_err());
    }

    // ============================================================================
    // Expression text
    // ============================================================================

    #[tokio::test]
    async fn test_compile_error_leaves_rows_untouched() {
        let mut session = session().await;
        let mut editor = AdvancedEditor::new(&mut session);
        editor.compile("a == 1").await.unwrap();
        let err = editor.compile("a == ").await.unwrap_err();
        assert!(matches!(err, ApiError::ValidationFailed { .. }));
        assert_eq!(editor.rows().len(), 1);

        editor.compile("  ").await.unwrap();
        assert!(editor.rows().is_empty());
    }

    #[tokio::test]
    async fn test_convert_sets_operation() {
        let mut session = session().await;
        let mut editor = AdvancedEditor::new(&mut session);
        editor.convert_string_to_filters("a == 1 || b == 2").await.unwrap();
        assert_eq!(session.item().operation, BooleanOperation::Or);
        assert_eq!(session.item().advanced_filters.len(), 2);
    }

    #[tokio::test]
    async fn test_refresh_operations() {
        let mut session = session().await;
        let editor = AdvancedEditor::new(&mut session);

        let choices = editor.refresh_operations("riskScore", Some("GE")).unwrap();
        assert_eq!(choices.selected, "GE");
        assert!(!choices.value_cleared);
        assert!(!choices.operations.contains(&"LIKE".to_string()));

        let choices = editor.refresh_operations("riskScore", Some("LIKE")).unwrap();
        assert_eq!(choices.selected, "EQ");
        assert!(choices.value_cleared);

        assert!(editor.refresh_operations("nope", None).is_err());
    }
}
