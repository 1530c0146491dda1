//! # Search Input Definitions
//!
//! A [`SearchInputDefinition`] is one configured search field: the property it targets, the
//! operator the user picked, the value typed into the form and how the value is typed. The
//! system-wide [`Catalog`] holds every definition; each search session takes fresh copies of
//! the ones its object type allows.
//!
//! Turning a populated definition into a predicate is the job of the [`FilterBuilder`]
//! strategies in [`builder`].

pub mod builder;
pub mod catalog;

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use utoipa::ToSchema;

use crate::filter::{Filter, FilterValue, LogicalOperation, MatchMode, UnknownVariant};

pub use builder::{BuildContext, FilterBuilder};
pub use catalog::{Catalog, FieldConfig, TypeConfig};

/// Raised while turning a definition into a predicate. Callers report it against the field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BuildError {
    /// An operator, match mode or list operation string was not recognised.
    IllegalArgument(UnknownVariant),
    /// The value does not parse as the declared property type.
    InvalidValue { field: String, reason: String },
}

impl fmt::Display for BuildError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::IllegalArgument(err) => write!(f, "{err}"),
            Self::InvalidValue { field, reason } => write!(f, "Invalid value for {field}: {reason}"),
        }
    }
}

impl std::error::Error for BuildError {}

impl From<UnknownVariant> for BuildError {
    fn from(err: UnknownVariant) -> Self {
        Self::IllegalArgument(err)
    }
}

/// Operator selected for a search field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default, ToSchema)]
pub enum InputType {
    GreaterThanEqual,
    LessThanEqual,
    GreaterThan,
    LessThan,
    Before,
    After,
    Like,
    #[default]
    Equal,
    NotEqual,
    In,
    ContainsAll,
    Null,
    NotNull,
    None,
}

impl InputType {
    pub const ALL: [Self; 14] = [
        Self::GreaterThanEqual,
        Self::LessThanEqual,
        Self::GreaterThan,
        Self::LessThan,
        Self::Before,
        Self::After,
        Self::Like,
        Self::Equal,
        Self::NotEqual,
        Self::In,
        Self::ContainsAll,
        Self::Null,
        Self::NotNull,
        Self::None,
    ];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::GreaterThanEqual => "GreaterThanEqual",
            Self::LessThanEqual => "LessThanEqual",
            Self::GreaterThan => "GreaterThan",
            Self::LessThan => "LessThan",
            Self::Before => "Before",
            Self::After => "After",
            Self::Like => "Like",
            Self::Equal => "Equal",
            Self::NotEqual => "NotEqual",
            Self::In => "In",
            Self::ContainsAll => "ContainsAll",
            Self::Null => "Null",
            Self::NotNull => "NotNull",
            Self::None => "None",
        }
    }

    #[must_use]
    pub const fn operation(self) -> LogicalOperation {
        match self {
            Self::GreaterThanEqual => LogicalOperation::Ge,
            Self::LessThanEqual => LogicalOperation::Le,
            Self::GreaterThan | Self::After => LogicalOperation::Gt,
            Self::LessThan | Self::Before => LogicalOperation::Lt,
            Self::Like => LogicalOperation::Like,
            Self::Equal => LogicalOperation::Eq,
            Self::NotEqual => LogicalOperation::Ne,
            Self::In => LogicalOperation::In,
            Self::ContainsAll => LogicalOperation::ContainsAll,
            Self::Null => LogicalOperation::IsNull,
            Self::NotNull => LogicalOperation::NotNull,
            Self::None => LogicalOperation::IsEmpty,
        }
    }

    /// Reverse of [`operation`](Self::operation); `LT`/`GT` map to the numeric forms.
    #[must_use]
    pub const fn from_operation(operation: LogicalOperation) -> Self {
        match operation {
            LogicalOperation::Ge => Self::GreaterThanEqual,
            LogicalOperation::Le => Self::LessThanEqual,
            LogicalOperation::Gt => Self::GreaterThan,
            LogicalOperation::Lt => Self::LessThan,
            LogicalOperation::Like => Self::Like,
            LogicalOperation::Eq => Self::Equal,
            LogicalOperation::Ne => Self::NotEqual,
            LogicalOperation::In => Self::In,
            LogicalOperation::ContainsAll => Self::ContainsAll,
            LogicalOperation::IsNull => Self::Null,
            LogicalOperation::NotNull => Self::NotNull,
            LogicalOperation::IsEmpty => Self::None,
        }
    }
}

impl FromStr for InputType {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim();
        Self::ALL
            .into_iter()
            .find(|t| t.as_str().eq_ignore_ascii_case(wanted))
            .ok_or_else(|| UnknownVariant {
                kind: "input type",
                value: s.to_string(),
            })
    }
}

/// Declared type of the value behind a search field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default, ToSchema)]
pub enum PropertyType {
    #[default]
    String,
    Integer,
    Boolean,
    Date,
    Identity,
    Rule,
    StringList,
    TimePeriodList,
    OrdList,
    AndedList,
    Collection,
    None,
}

impl PropertyType {
    /// Operations offered by the advanced editor for a property of this type.
    #[must_use]
    pub const fn allowed_operations(self) -> &'static [LogicalOperation] {
        use LogicalOperation as Op;
        match self {
            Self::StringList | Self::TimePeriodList => &[
                Op::Eq,
                Op::Ne,
                Op::In,
                Op::ContainsAll,
                Op::IsNull,
                Op::NotNull,
                Op::IsEmpty,
            ],
            Self::OrdList | Self::AndedList | Self::Collection => {
                &[Op::Eq, Op::Ne, Op::IsNull, Op::NotNull, Op::IsEmpty]
            }
            Self::Integer | Self::Date => &[
                Op::Eq,
                Op::Ne,
                Op::Lt,
                Op::Gt,
                Op::Le,
                Op::Ge,
                Op::IsNull,
                Op::NotNull,
            ],
            Self::String => &[Op::Eq, Op::Ne, Op::Like, Op::In, Op::IsNull, Op::NotNull],
            Self::Boolean => &[Op::Eq],
            _ => &[Op::Eq, Op::Ne, Op::IsNull, Op::NotNull],
        }
    }

    /// Coerce a loosely typed value to this type.
    ///
    /// Dates become native dates only with the calendar enabled; otherwise they compare as text.
    ///
    /// # Errors
    /// Fails when text does not parse as the declared integer, boolean or date.
    pub fn coerce(self, field: &str, value: &FilterValue, calendar: bool) -> Result<FilterValue, BuildError> {
        let invalid = |reason: &str| BuildError::InvalidValue {
            field: field.to_string(),
            reason: reason.to_string(),
        };
        match (self, value) {
            (_, FilterValue::List(items)) => Ok(FilterValue::List(
                items
                    .iter()
                    .map(|item| self.coerce(field, item, calendar))
                    .collect::<Result<_, _>>()?,
            )),
            (_, FilterValue::Null) => Ok(FilterValue::Null),
            (Self::Integer, FilterValue::Text(s)) => s
                .trim()
                .parse::<i64>()
                .map(FilterValue::Integer)
                .map_err(|_| invalid("expected a whole number")),
            (Self::Boolean, FilterValue::Text(s)) => match s.trim().to_ascii_lowercase().as_str() {
                "true" => Ok(FilterValue::Boolean(true)),
                "false" => Ok(FilterValue::Boolean(false)),
                _ => Err(invalid("expected true or false")),
            },
            (Self::Date, FilterValue::Text(s)) if calendar => {
                parse_date(s).map(FilterValue::Date).ok_or_else(|| invalid("expected a date"))
            }
            (Self::Date, FilterValue::Integer(millis)) if calendar => Utc
                .timestamp_millis_opt(*millis)
                .single()
                .map(FilterValue::Date)
                .ok_or_else(|| invalid("timestamp out of range")),
            (Self::Date, FilterValue::Date(d)) if !calendar => Ok(FilterValue::Text(d.to_rfc3339())),
            (Self::Date, FilterValue::Integer(i)) if !calendar => Ok(FilterValue::Text(i.to_string())),
            (_, other) => Ok(other.clone()),
        }
    }
}

/// Accepts RFC 3339 timestamps and plain `YYYY-MM-DD` dates (midnight UTC).
fn parse_date(text: &str) -> Option<DateTime<Utc>> {
    let text = text.trim();
    DateTime::parse_from_rfc3339(text)
        .map(|d| d.with_timezone(&Utc))
        .ok()
        .or_else(|| {
            chrono::NaiveDate::parse_from_str(text, "%Y-%m-%d")
                .ok()
                .and_then(|d| d.and_hms_opt(0, 0, 0))
                .map(|d| d.and_utc())
        })
}

/// How a multi-valued input expands when its operator is not a list operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default, ToSchema)]
#[serde(rename_all = "UPPERCASE")]
pub enum ListOperation {
    #[default]
    And,
    Or,
}

impl FromStr for ListOperation {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "AND" => Ok(Self::And),
            "OR" => Ok(Self::Or),
            _ => Err(UnknownVariant {
                kind: "list operation",
                value: s.to_string(),
            }),
        }
    }
}

/// Prefix of calculated (non-persistent) columns.
pub const CALCULATED_PREFIX: &str = "SPT_";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SearchInputDefinition {
    pub name: String,
    pub property_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub null_property_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub header_key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    #[schema(value_type = Object)]
    pub value: FilterValue,
    #[serde(default)]
    pub input_type: InputType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[schema(value_type = Option<String>)]
    pub match_mode: Option<MatchMode>,
    #[serde(default)]
    pub property_type: PropertyType,
    #[serde(default)]
    pub list_operation: ListOperation,
    #[serde(default)]
    pub ignore_case: bool,
    pub search_type: String,
    #[serde(default)]
    pub extended: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filter_builder: Option<String>,
    #[serde(default = "default_true")]
    pub sortable: bool,
    #[serde(default)]
    pub calculated: bool,
}

const fn default_true() -> bool {
    true
}

impl SearchInputDefinition {
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        property_name: impl Into<String>,
        property_type: PropertyType,
        search_type: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            property_name: property_name.into(),
            null_property_name: None,
            header_key: None,
            description: None,
            value: FilterValue::Null,
            input_type: InputType::Equal,
            match_mode: None,
            property_type,
            list_operation: ListOperation::And,
            ignore_case: false,
            search_type: search_type.into(),
            extended: false,
            filter_builder: None,
            sortable: true,
            calculated: false,
        }
    }

    #[must_use]
    pub fn with_input(mut self, input_type: InputType, value: impl Into<FilterValue>) -> Self {
        self.input_type = input_type;
        self.value = value.into();
        self
    }

    #[must_use]
    pub const fn with_match_mode(mut self, mode: MatchMode) -> Self {
        self.match_mode = Some(mode);
        self
    }

    #[must_use]
    pub fn with_builder(mut self, builder: impl Into<String>) -> Self {
        self.filter_builder = Some(builder.into());
        self
    }

    #[must_use]
    pub fn header(&self) -> &str {
        self.header_key.as_deref().unwrap_or(&self.name)
    }

    #[must_use]
    pub fn is_calculated(&self) -> bool {
        self.calculated || self.name.starts_with(CALCULATED_PREFIX)
    }

    /// A definition contributes a predicate only when it carries a value,
    /// or when its operator ignores values altogether.
    #[must_use]
    pub fn has_value(&self) -> bool {
        self.input_type.operation().is_unary() || !self.value.is_blank()
    }

    /// Reset the user-editable part of the definition.
    pub fn clear(&mut self) {
        self.value = FilterValue::Null;
    }

    #[must_use]
    pub fn builder(&self) -> FilterBuilder {
        FilterBuilder::for_definition(self)
    }

    /// Predicate for the current value, `None` when the field contributes nothing.
    ///
    /// # Errors
    /// Fails when the value does not fit the declared property type.
    pub fn filter(&self, ctx: &BuildContext) -> Result<Option<Filter>, BuildError> {
        self.builder().filter(self, ctx)
    }

    /// Join predicate the property requires, if any.
    #[must_use]
    pub fn join(&self) -> Option<Filter> {
        self.builder().join(self)
    }
}
