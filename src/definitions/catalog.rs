//! The system-wide catalog of search types and input definitions.
//!
//! The catalog is JSON. A default copy is compiled into the crate; a deployment can point
//! `catalog.path` at its own file. Outer structure errors are fatal, while a single malformed
//! type or definition entry is logged and skipped.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;
use tracing::{debug, warn};
use utoipa::ToSchema;

use super::{CALCULATED_PREFIX, PropertyType, SearchInputDefinition};
use crate::schema::ObjectSchema;
use crate::search::SearchType;

const DEFAULT_CATALOG: &str = include_str!("default_catalog.json");

/// A column that can be selected for display.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct FieldConfig {
    pub name: String,
    pub property: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub header: Option<String>,
    #[serde(default)]
    pub property_type: PropertyType,
    #[serde(default = "default_sortable")]
    pub sortable: bool,
}

const fn default_sortable() -> bool {
    true
}

impl FieldConfig {
    #[must_use]
    pub fn header(&self) -> &str {
        self.header.as_deref().unwrap_or(&self.name)
    }

    #[must_use]
    pub fn is_calculated(&self) -> bool {
        self.name.starts_with(CALCULATED_PREFIX)
    }
}

/// Per-object-type configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TypeConfig {
    pub schema: ObjectSchema,
    /// Definition `searchType` values allowed in this type's searches.
    #[serde(default)]
    pub definition_types: Vec<String>,
    #[serde(default)]
    pub default_fields: Vec<String>,
    #[serde(default)]
    pub fields: Vec<FieldConfig>,
}

impl TypeConfig {
    #[must_use]
    pub fn field(&self, name: &str) -> Option<&FieldConfig> {
        self.fields.iter().find(|f| f.name == name)
    }

    #[must_use]
    pub fn allows(&self, definition_type: &str) -> bool {
        self.definition_types.iter().any(|t| t == definition_type)
    }
}

#[derive(Debug)]
pub enum CatalogError {
    Io(std::io::Error),
    Parse(serde_json::Error),
}

impl fmt::Display for CatalogError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io(err) => write!(f, "Cannot read catalog: {err}"),
            Self::Parse(err) => write!(f, "Cannot parse catalog: {err}"),
        }
    }
}

impl std::error::Error for CatalogError {}

#[derive(Deserialize)]
struct RawCatalog {
    #[serde(default)]
    types: BTreeMap<String, serde_json::Value>,
    #[serde(default)]
    definitions: Vec<serde_json::Value>,
}

#[derive(Debug, Clone, Default)]
pub struct Catalog {
    pub types: BTreeMap<SearchType, TypeConfig>,
    pub definitions: Vec<SearchInputDefinition>,
}

impl Catalog {
    /// # Errors
    /// Fails if the document is not a JSON object with `types`/`definitions`.
    pub fn from_json(text: &str) -> Result<Self, CatalogError> {
        let raw: RawCatalog = serde_json::from_str(text).map_err(CatalogError::Parse)?;
        let mut catalog = Self::default();

        for (key, value) in raw.types {
            let search_type = match key.parse::<SearchType>() {
                Ok(search_type) => search_type,
                Err(err) => {
                    warn!(error = %err, "Skipping catalog type");
                    continue;
                }
            };
            match serde_json::from_value::<TypeConfig>(value) {
                Ok(config) => {
                    catalog.types.insert(search_type, config);
                }
                Err(err) => warn!(search_type = %key, error = %err, "Skipping malformed catalog type"),
            }
        }

        for (index, value) in raw.definitions.into_iter().enumerate() {
            match serde_json::from_value::<SearchInputDefinition>(value) {
                Ok(definition) => catalog.definitions.push(definition),
                Err(err) => warn!(index, error = %err, "Skipping malformed input definition"),
            }
        }

        debug!(
            types = catalog.types.len(),
            definitions = catalog.definitions.len(),
            "Loaded search catalog"
        );
        Ok(catalog)
    }

    /// The catalog compiled into the crate.
    ///
    /// # Errors
    /// Only if the embedded document is itself malformed.
    pub fn embedded() -> Result<Self, CatalogError> {
        Self::from_json(DEFAULT_CATALOG)
    }

    /// Load from `path`, or the embedded catalog when no path is configured.
    ///
    /// # Errors
    /// Fails when the file cannot be read or parsed.
    pub fn load(path: Option<&Path>) -> Result<Self, CatalogError> {
        match path {
            Some(path) => {
                let text = std::fs::read_to_string(path).map_err(CatalogError::Io)?;
                Self::from_json(&text)
            }
            None => Self::embedded(),
        }
    }

    #[must_use]
    pub fn type_config(&self, search_type: SearchType) -> Option<&TypeConfig> {
        self.types.get(&search_type)
    }

    /// Fresh copies of the definitions allowed for `search_type`, keyed by name.
    #[must_use]
    pub fn definitions_for(&self, search_type: SearchType) -> BTreeMap<String, SearchInputDefinition> {
        let Some(config) = self.type_config(search_type) else {
            return BTreeMap::new();
        };
        self.definitions
            .iter()
            .filter(|d| config.allows(&d.search_type))
            .map(|d| (d.name.clone(), d.clone()))
            .collect()
    }
}
