//! Relational layout of the searchable object types.
//!
//! Each search type maps onto one base table. Dotted property paths reach other tables in
//! two ways: an *alias* is a joined table (one row per match, de-duplicated by id later),
//! a *collection* is a child table tested with `EXISTS`.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A table reachable by an inner or left join.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JoinedTable {
    pub table: String,
    /// Column on the base table.
    pub base_column: String,
    /// Column on the joined table.
    pub target_column: String,
}

/// A child table holding the members of a multi-valued property.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollectionTable {
    pub table: String,
    /// Column on the child table referencing the base id.
    pub foreign_key: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectSchema {
    pub table: String,
    #[serde(default = "default_id_column")]
    pub id_column: String,
    #[serde(default)]
    pub joins: BTreeMap<String, JoinedTable>,
    #[serde(default)]
    pub collections: BTreeMap<String, CollectionTable>,
}

fn default_id_column() -> String {
    "id".to_string()
}

/// Where a property path lands once resolved against a schema.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ColumnRef {
    Base { column: String },
    Joined { alias: String, column: String },
    Collection { root: String, column: Option<String> },
}

/// Column names are restricted to identifier characters before they reach SQL.
#[must_use]
pub fn is_valid_identifier(name: &str) -> bool {
    !name.is_empty()
        && name.len() <= 100
        && !name.starts_with('_')
        && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
}

impl ObjectSchema {
    #[must_use]
    pub fn new(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            id_column: default_id_column(),
            joins: BTreeMap::new(),
            collections: BTreeMap::new(),
        }
    }

    #[must_use]
    pub fn with_join(mut self, alias: impl Into<String>, joined: JoinedTable) -> Self {
        self.joins.insert(alias.into(), joined);
        self
    }

    #[must_use]
    pub fn with_collection(mut self, root: impl Into<String>, collection: CollectionTable) -> Self {
        self.collections.insert(root.into(), collection);
        self
    }

    /// Resolve a property path. Returns `None` if a column name is not a plain identifier.
    #[must_use]
    pub fn resolve(&self, property: &str) -> Option<ColumnRef> {
        let (head, rest) = property
            .split_once('.')
            .map_or((property, None), |(head, rest)| (head, Some(rest)));

        if self.collections.contains_key(head) {
            let column = rest.map(|r| r.replace('.', "_"));
            if column.as_deref().is_some_and(|c| !is_valid_identifier(c)) {
                return None;
            }
            return Some(ColumnRef::Collection {
                root: head.to_string(),
                column,
            });
        }

        if let (true, Some(rest)) = (self.joins.contains_key(head), rest) {
            let column = rest.replace('.', "_");
            return is_valid_identifier(&column).then(|| ColumnRef::Joined {
                alias: head.to_string(),
                column,
            });
        }

        let column = property.replace('.', "_");
        is_valid_identifier(&column).then_some(ColumnRef::Base { column })
    }

    /// Schema used for conditions evaluated inside a collection's child table.
    #[must_use]
    pub fn collection_schema(&self, root: &str) -> Option<Self> {
        self.collections.get(root).map(|c| Self::new(c.table.clone()))
    }
}
