//! # Grid Results
//!
//! Query parameters for paging and sorting, and the JSON envelope a data grid consumes:
//!
//! ```json
//! {
//!   "totalCount": 42,
//!   "results": [{ "id": "1", "name": "jsmith" }],
//!   "metaData": {
//!     "totalProperty": "totalCount", "root": "results", "id": "id",
//!     "fields": [{ "name": "name" }],
//!     "columnConfig": [{ "header": "User Name", "dataIndex": "name", "sortable": true }],
//!     "sortColumn": "name", "sortDirection": "ASC"
//!   }
//! }
//! ```
//!
//! Three sort formats are accepted: `sort=[{"property":"name","direction":"DESC"}]`,
//! `sort=["name","DESC"]` and `sort=name&dir=DESC`.

use serde::{Deserialize, Serialize};
use serde_with::skip_serializing_none;
use utoipa::{IntoParams, ToSchema};

use crate::definitions::{FieldConfig, PropertyType};
use crate::search::Row;

const DEFAULT_SORT_ORDER: &str = "ASC";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "UPPERCASE")]
pub enum SortDirection {
    #[default]
    Asc,
    Desc,
}

impl SortDirection {
    fn parse(order: &str) -> Self {
        if order.eq_ignore_ascii_case("DESC") { Self::Desc } else { Self::Asc }
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Asc => "ASC",
            Self::Desc => "DESC",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct SortSpec {
    pub property: String,
    #[serde(default)]
    pub direction: SortDirection,
}

impl SortSpec {
    pub fn new(property: impl Into<String>, direction: SortDirection) -> Self {
        Self {
            property: property.into(),
            direction,
        }
    }
}

/// Paging and sorting parameters of a grid request.
#[derive(Debug, Clone, Default, Deserialize, IntoParams, ToSchema)]
#[into_params(parameter_in = Query)]
pub struct GridParams {
    /// Offset of the first row.
    #[param(example = 0)]
    pub start: Option<u64>,
    /// Rows per page.
    #[param(example = 25)]
    pub limit: Option<u64>,
    /// 1-based page number, used with `per_page`.
    pub page: Option<u64>,
    pub per_page: Option<u64>,
    /// Sort specification, see the module documentation.
    #[param(example = r#"[{"property":"name","direction":"ASC"}]"#)]
    pub sort: Option<String>,
    /// Direction for a plain `sort=column`.
    #[param(example = "ASC")]
    pub dir: Option<String>,
}

impl GridParams {
    /// `(offset, limit)`, or `None` when the request carries no paging at all.
    #[must_use]
    pub fn pagination(&self, max_limit: u64) -> Option<(u64, u64)> {
        let clamp = |limit: u64| limit.clamp(1, max_limit.max(1));
        if let (Some(page), Some(per_page)) = (self.page, self.per_page) {
            let per_page = clamp(per_page);
            return Some((page.saturating_sub(1) * per_page, per_page));
        }
        match (self.start, self.limit) {
            (None, None) => None,
            (start, limit) => Some((start.unwrap_or(0), clamp(limit.unwrap_or(max_limit)))),
        }
    }

    /// Requested orderings. Column names use `-` where the property path has dots.
    #[must_use]
    pub fn sorting(&self) -> Option<Vec<SortSpec>> {
        let sort = self.sort.as_deref()?.trim();
        if sort.is_empty() {
            return None;
        }
        let specs = if sort.starts_with("[{") {
            serde_json::from_str::<Vec<SortSpec>>(sort).ok()?
        } else if sort.starts_with('[') {
            let parts: Vec<String> = serde_json::from_str(sort).ok()?;
            let column = parts.first()?.clone();
            let order = parts.get(1).map_or(DEFAULT_SORT_ORDER, String::as_str);
            vec![SortSpec::new(column, SortDirection::parse(order))]
        } else {
            let order = self.dir.as_deref().unwrap_or(DEFAULT_SORT_ORDER);
            vec![SortSpec::new(sort, SortDirection::parse(order))]
        };
        Some(
            specs
                .into_iter()
                .map(|s| SortSpec::new(s.property.replace('-', "."), s.direction))
                .collect(),
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct GridField {
    pub name: String,
}

#[skip_serializing_none]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ColumnConfig {
    pub header: String,
    pub data_index: String,
    pub sortable: bool,
    pub renderer: Option<String>,
    pub date_style: Option<String>,
    pub time_style: Option<String>,
}

impl ColumnConfig {
    #[must_use]
    pub fn for_field(field: &FieldConfig) -> Self {
        let mut config = Self {
            header: field.header().to_string(),
            data_index: field.name.clone(),
            sortable: field.sortable && !field.is_calculated(),
            renderer: None,
            date_style: None,
            time_style: None,
        };
        match field.property_type {
            PropertyType::Date => {
                config.date_style = Some("long".to_string());
                config.time_style = Some("short".to_string());
            }
            PropertyType::Boolean => config.renderer = Some("renderBoolean".to_string()),
            _ => {}
        }
        config
    }
}

#[skip_serializing_none]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct GridMetaData {
    pub total_property: String,
    pub root: String,
    pub id: String,
    pub fields: Vec<GridField>,
    pub column_config: Vec<ColumnConfig>,
    pub sort_column: Option<String>,
    pub sort_direction: Option<String>,
    pub sorters: Option<Vec<SortSpec>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct GridResponse {
    pub total_count: u64,
    #[schema(value_type = Vec<Object>)]
    pub results: Vec<Row>,
    pub meta_data: GridMetaData,
}

impl GridResponse {
    #[must_use]
    pub fn new(fields: &[&FieldConfig], rows: Vec<Row>, total_count: u64, sorters: &[SortSpec]) -> Self {
        let (sort_column, sort_direction, sorters) = match sorters {
            [] => (None, None, None),
            [single] => (
                Some(single.property.replace('.', "-")),
                Some(single.direction.as_str().to_string()),
                None,
            ),
            many => (None, None, Some(many.to_vec())),
        };

        Self {
            total_count,
            results: rows,
            meta_data: GridMetaData {
                total_property: "totalCount".to_string(),
                root: "results".to_string(),
                id: "id".to_string(),
                fields: fields
                    .iter()
                    .map(|f| GridField { name: f.name.clone() })
                    .collect(),
                column_config: fields.iter().map(|f| ColumnConfig::for_field(f)).collect(),
                sort_column,
                sort_direction,
                sorters,
            },
        }
    }
}
