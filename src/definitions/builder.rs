//! Per-field filter builders.
//!
//! The strategy is picked by name from the definition (`base`, `extended`, `collection`,
//! `link`). Link properties live in a joined table and bring a join with them. Extended
//! attributes are key/value rows, so each one is tested with its own `collectionCondition`;
//! other collection properties are rewritten into those nodes later by the converter.

use tracing::warn;

use super::{BuildError, ListOperation, PropertyType, SearchInputDefinition};
use crate::filter::{BooleanOperation, Filter, FilterValue, LogicalOperation};

/// Collection holding extended attribute rows (`attribute_name`, `value`).
pub const EXTENDED_ROOT: &str = "externalAttributes";
pub const LINK_ALIAS: &str = "Link";

#[derive(Debug, Clone, Copy, Default)]
pub struct BuildContext {
    /// Date fields compare as native dates instead of strings.
    pub enable_calendar: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FilterBuilder {
    #[default]
    Base,
    Extended,
    Collection,
    Link,
}

impl FilterBuilder {
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "base" | "default" => Some(Self::Base),
            "extended" => Some(Self::Extended),
            "collection" => Some(Self::Collection),
            "link" => Some(Self::Link),
            _ => None,
        }
    }

    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Base => "base",
            Self::Extended => "extended",
            Self::Collection => "collection",
            Self::Link => "link",
        }
    }

    /// Strategy for a definition. Unknown names fall back to [`FilterBuilder::Base`].
    #[must_use]
    pub fn for_definition(def: &SearchInputDefinition) -> Self {
        match def.filter_builder.as_deref() {
            None if def.extended => Self::Extended,
            None => Self::Base,
            Some(name) => Self::from_name(name).unwrap_or_else(|| {
                warn!(field = %def.name, builder = %name, "Unknown filter builder, using base");
                Self::Base
            }),
        }
    }

    #[must_use]
    pub const fn requires_join(self) -> bool {
        matches!(self, Self::Link)
    }

    #[must_use]
    pub fn join(self, _def: &SearchInputDefinition) -> Option<Filter> {
        match self {
            Self::Link => Some(Filter::join("id", format!("{LINK_ALIAS}.identity_id"))),
            Self::Base | Self::Extended | Self::Collection => None,
        }
    }

    /// Root of a collection property (`capabilities` for `capabilities.name`).
    #[must_use]
    pub fn collection_root(def: &SearchInputDefinition) -> &str {
        def.property_name
            .split_once('.')
            .map_or(def.property_name.as_str(), |(root, _)| root)
    }

    /// Whether a predicate on `property` was produced by this strategy for `def`.
    #[must_use]
    pub fn owns_property(self, def: &SearchInputDefinition, property: &str) -> bool {
        match self {
            Self::Extended => property
                .strip_prefix(EXTENDED_ROOT)
                .is_some_and(|rest| rest.starts_with('.')),
            _ => {
                property == self.property(def)
                    || def.null_property_name.as_deref() == Some(property)
            }
        }
    }

    fn property(self, def: &SearchInputDefinition) -> String {
        match self {
            Self::Extended => format!("{EXTENDED_ROOT}.value"),
            Self::Link if !def.property_name.starts_with("Link.") => {
                format!("{LINK_ALIAS}.{}", def.property_name)
            }
            _ => def.property_name.clone(),
        }
    }

    /// # Errors
    /// Fails when the value does not fit the declared property type.
    pub fn filter(self, def: &SearchInputDefinition, ctx: &BuildContext) -> Result<Option<Filter>, BuildError> {
        if def.property_type == PropertyType::None || !def.has_value() {
            return Ok(None);
        }

        let operation = def.input_type.operation();
        if let FilterValue::List(items) = &def.value
            && !operation.is_list()
            && !operation.is_unary()
        {
            let mut parts = Vec::with_capacity(items.len());
            for item in items {
                if let Some(filter) = self.single(def, item, ctx)? {
                    parts.push(filter);
                }
            }
            let combine = match def.list_operation {
                ListOperation::Or => BooleanOperation::Or,
                ListOperation::And => BooleanOperation::And,
            };
            return Ok(Filter::combine(combine, parts));
        }

        self.single(def, &def.value, ctx)
    }

    fn single(
        self,
        def: &SearchInputDefinition,
        value: &FilterValue,
        ctx: &BuildContext,
    ) -> Result<Option<Filter>, BuildError> {
        let property = self.property(def);
        let Some(leaf) = leaf(def, &property, value, ctx)? else {
            return Ok(None);
        };
        Ok(Some(match self {
            Self::Extended => extended_condition(def, leaf),
            _ => leaf,
        }))
    }
}

/// `EXISTS` over the attribute rows named after `def`. A missing row counts as null.
fn extended_condition(def: &SearchInputDefinition, leaf: Filter) -> Filter {
    let named = |condition: Filter| {
        Filter::collection(
            EXTENDED_ROOT,
            Filter::and(vec![
                Filter::eq(format!("{EXTENDED_ROOT}.attribute_name"), def.property_name.as_str()),
                condition,
            ]),
        )
    };
    match leaf {
        Filter::Leaf(leaf) if leaf.operation == LogicalOperation::IsNull => {
            Filter::not(named(Filter::not_null(leaf.property)))
        }
        other => named(other),
    }
}

fn as_list(value: &FilterValue) -> FilterValue {
    match value {
        FilterValue::List(_) => value.clone(),
        FilterValue::Null => FilterValue::List(Vec::new()),
        other => FilterValue::List(vec![other.clone()]),
    }
}

fn leaf(
    def: &SearchInputDefinition,
    property: &str,
    value: &FilterValue,
    ctx: &BuildContext,
) -> Result<Option<Filter>, BuildError> {
    let operation = def.input_type.operation();
    let null_property = def.null_property_name.as_deref().unwrap_or(property);

    let filter = match operation {
        LogicalOperation::IsNull => return Ok(Some(Filter::is_null(null_property))),
        LogicalOperation::NotNull => return Ok(Some(Filter::not_null(null_property))),
        LogicalOperation::IsEmpty => return Ok(Some(Filter::is_empty(property))),
        LogicalOperation::In | LogicalOperation::ContainsAll => {
            let values = def.property_type.coerce(&def.name, &as_list(value), ctx.enable_calendar)?;
            if values.is_blank() {
                return Ok(None);
            }
            Filter::leaf(property, operation, values)
        }
        LogicalOperation::Like => {
            if value.is_blank() {
                return Ok(None);
            }
            Filter::like(property, value.display_text(), def.match_mode.unwrap_or_default())
        }
        _ => {
            if value.is_blank() {
                return Ok(None);
            }
            let value = def.property_type.coerce(&def.name, value, ctx.enable_calendar)?;
            Filter::leaf(property, operation, value)
        }
    };

    Ok(Some(if def.ignore_case { filter.ignore_case() } else { filter }))
}
