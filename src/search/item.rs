use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::{SearchPhase, SearchType};
use crate::definitions::SearchInputDefinition;
use crate::filter::{BooleanOperation, Filter, FilterValue};

/// One predicate of a search item, with the join its property needs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SearchItemFilter {
    pub description: String,
    #[serde(default)]
    #[schema(value_type = Object)]
    pub value: FilterValue,
    #[schema(value_type = Object)]
    pub filter: Filter,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[schema(value_type = Option<Object>)]
    pub join: Option<Filter>,
}

impl SearchItemFilter {
    #[must_use]
    pub fn new(filter: Filter) -> Self {
        Self {
            description: filter.to_string(),
            value: FilterValue::Null,
            filter,
            join: None,
        }
    }
}

/// Session-cached description of a search. Persisted only on an explicit save.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SearchItem {
    pub search_type: SearchType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    #[schema(value_type = String)]
    pub operation: BooleanOperation,
    /// Rows built from the input form. Rebuilt on every save.
    #[serde(default)]
    pub filters: Vec<SearchItemFilter>,
    /// Rows maintained by the advanced filter editor.
    #[serde(default)]
    pub advanced_filters: Vec<SearchItemFilter>,
    /// Joins added outside any single filter row.
    #[serde(default)]
    #[schema(value_type = Vec<Object>)]
    pub joins: Vec<Filter>,
    #[serde(default)]
    pub selected_fields: Vec<String>,
    /// Definitions that carried a value when the item was saved, for redisplay.
    #[serde(default)]
    pub inputs: Vec<SearchInputDefinition>,
    /// Applications an extended link attribute is restricted to.
    #[serde(default)]
    pub applications: Vec<String>,
    /// Saved-search name this item was loaded from.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub loaded_name: Option<String>,
    #[serde(default)]
    pub phase: SearchPhase,
}

impl SearchItem {
    #[must_use]
    pub const fn new(search_type: SearchType) -> Self {
        Self {
            search_type,
            name: None,
            description: None,
            operation: BooleanOperation::And,
            filters: Vec::new(),
            advanced_filters: Vec::new(),
            joins: Vec::new(),
            selected_fields: Vec::new(),
            inputs: Vec::new(),
            applications: Vec::new(),
            loaded_name: None,
            phase: SearchPhase::Restored,
        }
    }

    fn rows(&self) -> impl Iterator<Item = &SearchItemFilter> {
        self.filters.iter().chain(&self.advanced_filters)
    }

    /// Predicates of the form rows followed by the advanced rows.
    #[must_use]
    pub fn filter_list(&self) -> Vec<Filter> {
        self.rows().map(|f| f.filter.clone()).collect()
    }

    /// Item joins followed by the joins of each filter row, each once.
    #[must_use]
    pub fn all_joins(&self) -> Vec<Filter> {
        let mut joins: Vec<Filter> = Vec::new();
        for join in self.joins.iter().chain(self.rows().filter_map(|f| f.join.as_ref())) {
            if !joins.contains(join) {
                joins.push(join.clone());
            }
        }
        joins
    }

    /// Value of a saved input, if the definition was populated.
    #[must_use]
    pub fn input(&self, name: &str) -> Option<&SearchInputDefinition> {
        self.inputs.iter().find(|d| d.name == name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_all_joins_are_unique() {
        let join = Filter::join("id", "Link.identity_id");
        let mut item = SearchItem::new(SearchType::Identity);
        item.joins.push(join.clone());
        item.filters.push(SearchItemFilter {
            join: Some(join.clone()),
            ..SearchItemFilter::new(Filter::eq("Link.native_identity", "a"))
        });
        item.advanced_filters.push(SearchItemFilter {
            join: Some(join.clone()),
            ..SearchItemFilter::new(Filter::eq("Link.native_identity", "b"))
        });
        assert_eq!(item.all_joins(), vec![join]);
        assert_eq!(item.filter_list().len(), 2);
    }

    #[test]
    fn test_item_serde_roundtrip_keeps_filters() {
        let mut item = SearchItem::new(SearchType::Identity);
        item.operation = BooleanOperation::Or;
        item.filters.push(SearchItemFilter::new(Filter::eq("name", "jsmith")));
        item.selected_fields = vec!["name".into()];

        let json = serde_json::to_value(&item).unwrap();
        assert_eq!(json["searchType"], "identity");
        let back: SearchItem = serde_json::from_value(json).unwrap();
        assert_eq!(back, item);
    }
}
