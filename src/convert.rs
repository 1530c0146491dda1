//! Join resolution and composition of search predicates.
//!
//! The converter never touches its input. It deep-clones every predicate, rewrites leaves on
//! collection fields into `collectionCondition` nodes, and collects the joins that link
//! fields depend on. [`compose`] then folds the result under the search's global
//! operator, keeping joins outside any negation.

use std::collections::BTreeMap;
use tracing::debug;

use crate::definitions::{FilterBuilder, SearchInputDefinition};
use crate::filter::{BooleanOperation, Filter, FilterValue, LeafFilter, LogicalOperation};

pub struct FilterConverter<'a> {
    definitions: &'a BTreeMap<String, SearchInputDefinition>,
}

impl<'a> FilterConverter<'a> {
    #[must_use]
    pub const fn new(definitions: &'a BTreeMap<String, SearchInputDefinition>) -> Self {
        Self { definitions }
    }

    /// Cloned, join-resolved predicates: joins first (each once), then the rewritten filters.
    #[must_use]
    pub fn convert(&self, filters: &[Filter]) -> Vec<Filter> {
        let mut joins: Vec<Filter> = Vec::new();
        let mut predicates = Vec::with_capacity(filters.len());

        for filter in filters {
            if let Some(rewritten) = self.rewrite(filter.clone(), &mut joins) {
                predicates.push(rewritten);
            }
        }

        debug!(joins = joins.len(), predicates = predicates.len(), "Converted filters");
        joins.extend(predicates);
        joins
    }

    fn definition_for(&self, property: &str) -> Option<(&SearchInputDefinition, FilterBuilder)> {
        self.definitions.values().find_map(|def| {
            let builder = def.builder();
            builder.owns_property(def, property).then_some((def, builder))
        })
    }

    fn rewrite(&self, filter: Filter, joins: &mut Vec<Filter>) -> Option<Filter> {
        match filter {
            Filter::Join(_) => {
                push_unique(joins, filter);
                None
            }
            Filter::Composite(mut composite) => {
                composite.children = composite
                    .children
                    .into_iter()
                    .filter_map(|child| self.rewrite(child, joins))
                    .collect();
                if composite.children.is_empty() {
                    return None;
                }
                Some(Filter::Composite(composite))
            }
            Filter::Collection(_) => Some(filter),
            Filter::Leaf(leaf) => {
                let Some((def, builder)) = self.definition_for(&leaf.property) else {
                    return Some(Filter::Leaf(leaf));
                };
                if let Some(join) = builder.join(def) {
                    push_unique(joins, join);
                }
                if builder == FilterBuilder::Collection {
                    return Some(collection_leaf(FilterBuilder::collection_root(def), leaf));
                }
                Some(Filter::Leaf(leaf))
            }
        }
    }
}

fn push_unique(joins: &mut Vec<Filter>, join: Filter) {
    if !joins.contains(&join) {
        joins.push(join);
    }
}

/// Rewrite a leaf on `root.column` into conditions over the collection's members.
fn collection_leaf(root: &str, mut leaf: LeafFilter) -> Filter {
    let Some(column) = leaf
        .property
        .strip_prefix(root)
        .and_then(|rest| rest.strip_prefix('.'))
        .map(str::to_string)
    else {
        return Filter::Leaf(leaf);
    };

    match leaf.operation {
        LogicalOperation::IsNull | LogicalOperation::IsEmpty => Filter::is_empty(root),
        LogicalOperation::NotNull => Filter::not_null(root),
        LogicalOperation::ContainsAll => {
            let values = match &leaf.value {
                FilterValue::List(items) => items.clone(),
                other => vec![other.clone()],
            };
            let members = values
                .into_iter()
                .map(|value| {
                    let member = Filter::eq(column.clone(), value);
                    Filter::collection(root, if leaf.ignore_case { member.ignore_case() } else { member })
                })
                .collect();
            Filter::combine(BooleanOperation::And, members).unwrap_or_else(|| Filter::and(Vec::new()))
        }
        _ => {
            leaf.property = column;
            Filter::collection(root, Filter::Leaf(leaf))
        }
    }
}

/// Fold converted predicates under `operation`.
///
/// Joins are pulled out first and stay un-negated: with joins present the result is
/// `AND(joins.., body)`.
#[must_use]
pub fn compose(operation: BooleanOperation, filters: Vec<Filter>) -> Option<Filter> {
    let (joins, predicates): (Vec<_>, Vec<_>) = filters.into_iter().partition(Filter::is_join);
    let body = Filter::combine(operation, predicates);
    if joins.is_empty() {
        return body;
    }
    let mut children = joins;
    children.extend(body);
    Filter::combine(BooleanOperation::And, children)
}
