use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Error raised when an operator, boolean operation or match mode string is not recognised.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownVariant {
    pub kind: &'static str,
    pub value: String,
}

impl fmt::Display for UnknownVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Unknown {}: '{}'", self.kind, self.value)
    }
}

impl std::error::Error for UnknownVariant {}

/// Comparison applied by a leaf predicate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LogicalOperation {
    #[serde(rename = "EQ")]
    Eq,
    #[serde(rename = "NE")]
    Ne,
    #[serde(rename = "LT")]
    Lt,
    #[serde(rename = "GT")]
    Gt,
    #[serde(rename = "LE")]
    Le,
    #[serde(rename = "GE")]
    Ge,
    #[serde(rename = "IN")]
    In,
    #[serde(rename = "CONTAINS_ALL")]
    ContainsAll,
    #[serde(rename = "LIKE")]
    Like,
    #[serde(rename = "ISNULL")]
    IsNull,
    #[serde(rename = "NOTNULL")]
    NotNull,
    #[serde(rename = "ISEMPTY")]
    IsEmpty,
}

impl LogicalOperation {
    pub const ALL: [Self; 12] = [
        Self::Eq,
        Self::Ne,
        Self::Lt,
        Self::Gt,
        Self::Le,
        Self::Ge,
        Self::In,
        Self::ContainsAll,
        Self::Like,
        Self::IsNull,
        Self::NotNull,
        Self::IsEmpty,
    ];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Eq => "EQ",
            Self::Ne => "NE",
            Self::Lt => "LT",
            Self::Gt => "GT",
            Self::Le => "LE",
            Self::Ge => "GE",
            Self::In => "IN",
            Self::ContainsAll => "CONTAINS_ALL",
            Self::Like => "LIKE",
            Self::IsNull => "ISNULL",
            Self::NotNull => "NOTNULL",
            Self::IsEmpty => "ISEMPTY",
        }
    }

    /// Infix symbol for binary comparisons, `None` for operations rendered as method calls.
    #[must_use]
    pub const fn symbol(self) -> Option<&'static str> {
        match self {
            Self::Eq => Some("=="),
            Self::Ne => Some("!="),
            Self::Lt => Some("<"),
            Self::Gt => Some(">"),
            Self::Le => Some("<="),
            Self::Ge => Some(">="),
            _ => None,
        }
    }

    #[must_use]
    pub const fn display_name(self) -> &'static str {
        match self {
            Self::Eq => "Equals",
            Self::Ne => "Not equals",
            Self::Lt => "Less than",
            Self::Gt => "Greater than",
            Self::Le => "Less than or equal",
            Self::Ge => "Greater than or equal",
            Self::In => "In",
            Self::ContainsAll => "Contains all",
            Self::Like => "Like",
            Self::IsNull => "Is null",
            Self::NotNull => "Is not null",
            Self::IsEmpty => "Is empty",
        }
    }

    /// Logical negation of the comparison, where a single operator expresses it.
    #[must_use]
    pub const fn inverse(self) -> Option<Self> {
        match self {
            Self::Eq => Some(Self::Ne),
            Self::Ne => Some(Self::Eq),
            Self::Lt => Some(Self::Ge),
            Self::Ge => Some(Self::Lt),
            Self::Gt => Some(Self::Le),
            Self::Le => Some(Self::Gt),
            Self::IsNull => Some(Self::NotNull),
            Self::NotNull => Some(Self::IsNull),
            _ => None,
        }
    }

    /// Operations that never look at the predicate value.
    #[must_use]
    pub const fn is_unary(self) -> bool {
        matches!(self, Self::IsNull | Self::NotNull | Self::IsEmpty)
    }

    #[must_use]
    pub const fn is_list(self) -> bool {
        matches!(self, Self::In | Self::ContainsAll)
    }
}

impl fmt::Display for LogicalOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LogicalOperation {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let upper = s.trim().to_ascii_uppercase();
        Self::ALL
            .into_iter()
            .find(|op| op.as_str() == upper)
            .ok_or_else(|| UnknownVariant {
                kind: "logical operation",
                value: s.to_string(),
            })
    }
}

/// Operator joining the children of a composite predicate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "UPPERCASE")]
pub enum BooleanOperation {
    #[default]
    And,
    Or,
    Not,
}

impl BooleanOperation {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::And => "AND",
            Self::Or => "OR",
            Self::Not => "NOT",
        }
    }

    #[must_use]
    pub const fn symbol(self) -> &'static str {
        match self {
            Self::And => "&&",
            Self::Or => "||",
            Self::Not => "!",
        }
    }
}

impl fmt::Display for BooleanOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BooleanOperation {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "AND" => Ok(Self::And),
            "OR" => Ok(Self::Or),
            "NOT" => Ok(Self::Not),
            _ => Err(UnknownVariant {
                kind: "boolean operation",
                value: s.to_string(),
            }),
        }
    }
}

/// Where a LIKE pattern anchors its value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "UPPERCASE")]
pub enum MatchMode {
    #[default]
    Start,
    End,
    Anywhere,
    Exact,
}

impl MatchMode {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Start => "START",
            Self::End => "END",
            Self::Anywhere => "ANYWHERE",
            Self::Exact => "EXACT",
        }
    }

    /// SQL LIKE pattern for `value` under this mode.
    #[must_use]
    pub fn pattern(self, value: &str) -> String {
        match self {
            Self::Start => format!("{value}%"),
            Self::End => format!("%{value}"),
            Self::Anywhere => format!("%{value}%"),
            Self::Exact => value.to_string(),
        }
    }
}

impl FromStr for MatchMode {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "START" => Ok(Self::Start),
            "END" => Ok(Self::End),
            "ANYWHERE" => Ok(Self::Anywhere),
            "EXACT" => Ok(Self::Exact),
            _ => Err(UnknownVariant {
                kind: "match mode",
                value: s.to_string(),
            }),
        }
    }
}

/// Literal carried by a leaf predicate.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum FilterValue {
    #[default]
    Null,
    Text(String),
    Integer(i64),
    Boolean(bool),
    Date(DateTime<Utc>),
    List(Vec<FilterValue>),
}

impl FilterValue {
    /// True for null, the empty string and the empty list.
    #[must_use]
    pub fn is_blank(&self) -> bool {
        match self {
            Self::Null => true,
            Self::Text(s) => s.is_empty(),
            Self::List(items) => items.is_empty(),
            _ => false,
        }
    }

    /// Plain display text, as used in grids and exports.
    #[must_use]
    pub fn display_text(&self) -> String {
        match self {
            Self::Null => String::new(),
            Self::Text(s) => s.clone(),
            Self::Integer(i) => i.to_string(),
            Self::Boolean(b) => b.to_string(),
            Self::Date(d) => d.to_rfc3339(),
            Self::List(items) => items
                .iter()
                .map(Self::display_text)
                .collect::<Vec<_>>()
                .join(", "),
        }
    }

    /// Best-effort conversion from a JSON value with no declared type.
    #[must_use]
    pub fn from_json(value: &serde_json::Value) -> Self {
        match value {
            serde_json::Value::Null => Self::Null,
            serde_json::Value::Bool(b) => Self::Boolean(*b),
            serde_json::Value::Number(n) => n
                .as_i64()
                .map_or_else(|| Self::Text(n.to_string()), Self::Integer),
            serde_json::Value::String(s) => Self::Text(s.clone()),
            serde_json::Value::Array(items) => Self::List(items.iter().map(Self::from_json).collect()),
            serde_json::Value::Object(_) => Self::Text(value.to_string()),
        }
    }

    #[must_use]
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Self::Null => serde_json::Value::Null,
            Self::Text(s) => serde_json::Value::String(s.clone()),
            Self::Integer(i) => serde_json::Value::from(*i),
            Self::Boolean(b) => serde_json::Value::Bool(*b),
            Self::Date(d) => serde_json::Value::String(d.to_rfc3339()),
            Self::List(items) => serde_json::Value::Array(items.iter().map(Self::to_json).collect()),
        }
    }
}

impl From<&str> for FilterValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for FilterValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<i64> for FilterValue {
    fn from(value: i64) -> Self {
        Self::Integer(value)
    }
}

impl From<bool> for FilterValue {
    fn from(value: bool) -> Self {
        Self::Boolean(value)
    }
}

impl From<DateTime<Utc>> for FilterValue {
    fn from(value: DateTime<Utc>) -> Self {
        Self::Date(value)
    }
}

impl<T: Into<FilterValue>> From<Vec<T>> for FilterValue {
    fn from(values: Vec<T>) -> Self {
        Self::List(values.into_iter().map(Into::into).collect())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LeafFilter {
    pub property: String,
    pub operation: LogicalOperation,
    #[serde(default)]
    pub value: FilterValue,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub match_mode: Option<MatchMode>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub ignore_case: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CompositeFilter {
    pub operation: BooleanOperation,
    pub children: Vec<Filter>,
}

/// Join of `property` on the base object to `join_property` (`Alias.column`) on another table.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct JoinFilter {
    pub property: String,
    pub join_property: String,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub left: bool,
}

/// Condition evaluated against the members of a multi-valued property.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CollectionFilter {
    pub property: String,
    pub condition: Box<Filter>,
}

/// A boolean predicate tree.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Filter {
    Leaf(LeafFilter),
    Composite(CompositeFilter),
    Join(JoinFilter),
    Collection(CollectionFilter),
}

impl Filter {
    /// Leaf with an arbitrary operation.
    pub fn leaf(property: impl Into<String>, operation: LogicalOperation, value: FilterValue) -> Self {
        Self::Leaf(LeafFilter {
            property: property.into(),
            operation,
            value,
            match_mode: None,
            ignore_case: false,
        })
    }

    pub fn eq(property: impl Into<String>, value: impl Into<FilterValue>) -> Self {
        Self::leaf(property, LogicalOperation::Eq, value.into())
    }

    pub fn ne(property: impl Into<String>, value: impl Into<FilterValue>) -> Self {
        Self::leaf(property, LogicalOperation::Ne, value.into())
    }

    pub fn lt(property: impl Into<String>, value: impl Into<FilterValue>) -> Self {
        Self::leaf(property, LogicalOperation::Lt, value.into())
    }

    pub fn gt(property: impl Into<String>, value: impl Into<FilterValue>) -> Self {
        Self::leaf(property, LogicalOperation::Gt, value.into())
    }

    pub fn le(property: impl Into<String>, value: impl Into<FilterValue>) -> Self {
        Self::leaf(property, LogicalOperation::Le, value.into())
    }

    pub fn ge(property: impl Into<String>, value: impl Into<FilterValue>) -> Self {
        Self::leaf(property, LogicalOperation::Ge, value.into())
    }

    pub fn like(property: impl Into<String>, value: impl Into<FilterValue>, mode: MatchMode) -> Self {
        Self::Leaf(LeafFilter {
            property: property.into(),
            operation: LogicalOperation::Like,
            value: value.into(),
            match_mode: Some(mode),
            ignore_case: false,
        })
    }

    pub fn is_in(property: impl Into<String>, values: impl Into<FilterValue>) -> Self {
        Self::leaf(property, LogicalOperation::In, values.into())
    }

    pub fn contains_all(property: impl Into<String>, values: impl Into<FilterValue>) -> Self {
        Self::leaf(property, LogicalOperation::ContainsAll, values.into())
    }

    pub fn is_null(property: impl Into<String>) -> Self {
        Self::leaf(property, LogicalOperation::IsNull, FilterValue::Null)
    }

    pub fn not_null(property: impl Into<String>) -> Self {
        Self::leaf(property, LogicalOperation::NotNull, FilterValue::Null)
    }

    pub fn is_empty(property: impl Into<String>) -> Self {
        Self::leaf(property, LogicalOperation::IsEmpty, FilterValue::Null)
    }

    #[must_use]
    pub const fn and(children: Vec<Self>) -> Self {
        Self::Composite(CompositeFilter {
            operation: BooleanOperation::And,
            children,
        })
    }

    #[must_use]
    pub const fn or(children: Vec<Self>) -> Self {
        Self::Composite(CompositeFilter {
            operation: BooleanOperation::Or,
            children,
        })
    }

    #[must_use]
    pub fn not(child: Self) -> Self {
        Self::Composite(CompositeFilter {
            operation: BooleanOperation::Not,
            children: vec![child],
        })
    }

    pub fn join(property: impl Into<String>, join_property: impl Into<String>) -> Self {
        Self::Join(JoinFilter {
            property: property.into(),
            join_property: join_property.into(),
            left: false,
        })
    }

    pub fn left_join(property: impl Into<String>, join_property: impl Into<String>) -> Self {
        Self::Join(JoinFilter {
            property: property.into(),
            join_property: join_property.into(),
            left: true,
        })
    }

    pub fn collection(property: impl Into<String>, condition: Self) -> Self {
        Self::Collection(CollectionFilter {
            property: property.into(),
            condition: Box::new(condition),
        })
    }

    /// Marks a leaf as case-insensitive. Other nodes are returned unchanged.
    #[must_use]
    pub fn ignore_case(mut self) -> Self {
        if let Self::Leaf(leaf) = &mut self {
            leaf.ignore_case = true;
        }
        self
    }

    #[must_use]
    pub const fn is_join(&self) -> bool {
        matches!(self, Self::Join(_))
    }

    /// Every leaf property referenced by this tree, in visiting order.
    #[must_use]
    pub fn properties(&self) -> Vec<&str> {
        let mut out = Vec::new();
        self.collect_properties(&mut out);
        out
    }

    fn collect_properties<'a>(&'a self, out: &mut Vec<&'a str>) {
        match self {
            Self::Leaf(leaf) => out.push(&leaf.property),
            Self::Composite(composite) => {
                for child in &composite.children {
                    child.collect_properties(out);
                }
            }
            Self::Join(join) => out.push(&join.property),
            Self::Collection(collection) => out.push(&collection.property),
        }
    }

    /// Combine filters with `operation`. One filter under AND/OR comes back bare.
    #[must_use]
    pub fn combine(operation: BooleanOperation, mut filters: Vec<Self>) -> Option<Self> {
        match (operation, filters.len()) {
            (_, 0) => None,
            (BooleanOperation::And | BooleanOperation::Or, 1) => filters.pop(),
            (BooleanOperation::And | BooleanOperation::Or, _) => {
                Some(Self::Composite(CompositeFilter {
                    operation,
                    children: filters,
                }))
            }
            (BooleanOperation::Not, 1) => filters.pop().map(Self::not),
            (BooleanOperation::Not, _) => Some(Self::not(Self::and(filters))),
        }
    }
}
