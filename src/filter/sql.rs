//! Translation of filter trees into `sea-query` conditions.

use sea_orm::{
    Condition, Value,
    sea_query::{Alias, Expr, Func, Query, SimpleExpr},
};
use std::fmt;

use super::ast::{BooleanOperation, Filter, FilterValue, JoinFilter, LeafFilter, LogicalOperation};
use crate::schema::{ColumnRef, ObjectSchema, is_valid_identifier};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TranslateError {
    /// The property path cannot be mapped to a column.
    InvalidProperty(String),
    /// A join names an alias the schema does not know.
    UnknownJoin(String),
    /// The value cannot be used with the operation.
    InvalidValue { property: String, reason: String },
}

impl fmt::Display for TranslateError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidProperty(property) => write!(f, "Unknown or invalid property '{property}'"),
            Self::UnknownJoin(alias) => write!(f, "Unknown join target '{alias}'"),
            Self::InvalidValue { property, reason } => {
                write!(f, "Invalid value for '{property}': {reason}")
            }
        }
    }
}

impl std::error::Error for TranslateError {}

/// A join the query must carry for the condition to be valid.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JoinClause {
    pub alias: String,
    pub table: String,
    pub base_column: String,
    pub target_column: String,
    pub left: bool,
}

#[derive(Debug, Clone)]
pub struct Translation {
    pub condition: Condition,
    pub joins: Vec<JoinClause>,
}

/// Translate `filter` against `schema`.
///
/// # Errors
/// Fails when a property or join target does not resolve, or a value does not fit its operation.
pub fn translate(filter: &Filter, schema: &ObjectSchema) -> Result<Translation, TranslateError> {
    let mut translator = Translator::new(schema);
    let condition = translator.condition(filter)?;
    Ok(Translation {
        condition,
        joins: translator.joins,
    })
}

/// Walks a filter tree, collecting joins as aliases are referenced.
pub struct Translator<'a> {
    schema: &'a ObjectSchema,
    prefix: Option<String>,
    joins: Vec<JoinClause>,
}

fn column(table: &str, column: &str) -> SimpleExpr {
    Expr::col((Alias::new(table), Alias::new(column))).into()
}

fn scalar(value: &FilterValue, upper: bool) -> Option<Value> {
    match value {
        FilterValue::Text(s) if upper => Some(s.to_uppercase().into()),
        FilterValue::Text(s) => Some(s.clone().into()),
        FilterValue::Integer(i) => Some((*i).into()),
        FilterValue::Boolean(b) => Some((*b).into()),
        FilterValue::Date(d) => Some((*d).into()),
        FilterValue::Null | FilterValue::List(_) => None,
    }
}

fn list(value: &FilterValue, upper: bool) -> Vec<Value> {
    match value {
        FilterValue::List(items) => items.iter().filter_map(|v| scalar(v, upper)).collect(),
        other => scalar(other, upper).into_iter().collect(),
    }
}

fn comparison(target: SimpleExpr, leaf: &LeafFilter) -> Result<Condition, TranslateError> {
    let upper = leaf.ignore_case && matches!(leaf.value, FilterValue::Text(_) | FilterValue::List(_));
    let target = if upper {
        SimpleExpr::FunctionCall(Func::upper(target))
    } else {
        target
    };
    let expr = || Expr::expr(target.clone());
    let invalid = |reason: &str| TranslateError::InvalidValue {
        property: leaf.property.clone(),
        reason: reason.to_string(),
    };

    let simple = match leaf.operation {
        LogicalOperation::Eq => match &leaf.value {
            FilterValue::Null => expr().is_null(),
            FilterValue::List(_) => expr().is_in(list(&leaf.value, upper)),
            value => expr().eq(scalar(value, upper).ok_or_else(|| invalid("expected a value"))?),
        },
        LogicalOperation::Ne => match &leaf.value {
            FilterValue::Null => expr().is_not_null(),
            FilterValue::List(_) => expr().is_not_in(list(&leaf.value, upper)),
            value => expr().ne(scalar(value, upper).ok_or_else(|| invalid("expected a value"))?),
        },
        op @ (LogicalOperation::Lt | LogicalOperation::Gt | LogicalOperation::Le | LogicalOperation::Ge) => {
            let value = scalar(&leaf.value, upper).ok_or_else(|| invalid("expected a single value"))?;
            match op {
                LogicalOperation::Lt => expr().lt(value),
                LogicalOperation::Gt => expr().gt(value),
                LogicalOperation::Le => expr().lte(value),
                _ => expr().gte(value),
            }
        }
        LogicalOperation::Like => {
            let text = leaf.value.display_text();
            let text = if upper { text.to_uppercase() } else { text };
            expr().like(leaf.match_mode.unwrap_or_default().pattern(&text))
        }
        LogicalOperation::In => expr().is_in(list(&leaf.value, upper)),
        LogicalOperation::ContainsAll => {
            return Ok(list(&leaf.value, upper)
                .into_iter()
                .fold(Condition::all(), |acc, v| acc.add(expr().eq(v))));
        }
        LogicalOperation::IsNull => expr().is_null(),
        LogicalOperation::NotNull => expr().is_not_null(),
        LogicalOperation::IsEmpty => {
            return Ok(Condition::any().add(expr().is_null()).add(expr().eq("")));
        }
    };
    Ok(Condition::all().add(simple))
}

impl<'a> Translator<'a> {
    #[must_use]
    pub const fn new(schema: &'a ObjectSchema) -> Self {
        Self {
            schema,
            prefix: None,
            joins: Vec::new(),
        }
    }

    /// Joins collected so far.
    #[must_use]
    pub fn joins(&self) -> &[JoinClause] {
        &self.joins
    }

    /// Condition for `filter`; joins it needs are collected on the translator.
    ///
    /// # Errors
    /// See [`translate`].
    pub fn condition(&mut self, filter: &Filter) -> Result<Condition, TranslateError> {
        Ok(self.node(filter)?.unwrap_or_else(Condition::all))
    }

    /// Make sure the join declared for `alias` is part of the query.
    ///
    /// # Errors
    /// Fails if the schema has no join for `alias`.
    pub fn require_alias(&mut self, alias: &str, left: bool) -> Result<(), TranslateError> {
        if self.joins.iter().any(|j| j.alias == alias) {
            return Ok(());
        }
        let joined = self
            .schema
            .joins
            .get(alias)
            .ok_or_else(|| TranslateError::UnknownJoin(alias.to_string()))?;
        self.joins.push(JoinClause {
            alias: alias.to_string(),
            table: joined.table.clone(),
            base_column: joined.base_column.clone(),
            target_column: joined.target_column.clone(),
            left,
        });
        Ok(())
    }

    /// Column expression for a resolved base or joined property. Aliases not yet joined are
    /// added as left joins, so projecting a column never drops rows.
    ///
    /// # Errors
    /// Fails for unresolvable properties and collection roots.
    pub fn column_for(&mut self, property: &str) -> Result<SimpleExpr, TranslateError> {
        match self.resolve(property)? {
            ColumnRef::Base { column: c } => Ok(column(&self.schema.table, &c)),
            ColumnRef::Joined { alias, column: c } => {
                self.require_alias(&alias, true)?;
                Ok(column(&alias, &c))
            }
            ColumnRef::Collection { .. } => Err(TranslateError::InvalidProperty(property.to_string())),
        }
    }

    fn resolve(&self, property: &str) -> Result<ColumnRef, TranslateError> {
        let stripped = self
            .prefix
            .as_deref()
            .and_then(|p| property.strip_prefix(p))
            .and_then(|rest| rest.strip_prefix('.'))
            .unwrap_or(property);
        self.schema
            .resolve(stripped)
            .ok_or_else(|| TranslateError::InvalidProperty(property.to_string()))
    }

    fn node(&mut self, filter: &Filter) -> Result<Option<Condition>, TranslateError> {
        match filter {
            Filter::Leaf(leaf) => self.leaf(leaf).map(Some),
            Filter::Composite(composite) => {
                let mut parts = Vec::with_capacity(composite.children.len());
                for child in &composite.children {
                    if let Some(condition) = self.node(child)? {
                        parts.push(condition);
                    }
                }
                if parts.is_empty() {
                    return Ok(None);
                }
                let combined = match composite.operation {
                    BooleanOperation::And => parts.into_iter().fold(Condition::all(), Condition::add),
                    BooleanOperation::Or => parts.into_iter().fold(Condition::any(), Condition::add),
                    BooleanOperation::Not => parts.into_iter().fold(Condition::all(), Condition::add).not(),
                };
                Ok(Some(combined))
            }
            Filter::Join(join) => {
                self.explicit_join(join)?;
                Ok(None)
            }
            Filter::Collection(collection) => {
                let root = collection.property.as_str();
                let child_schema = self
                    .schema
                    .collection_schema(root)
                    .ok_or_else(|| TranslateError::InvalidProperty(root.to_string()))?;
                let mut inner = Translator {
                    schema: &child_schema,
                    prefix: Some(root.to_string()),
                    joins: Vec::new(),
                };
                let condition = inner.node(&collection.condition)?.unwrap_or_else(Condition::all);
                if let Some(join) = inner.joins.first() {
                    return Err(TranslateError::UnknownJoin(join.alias.clone()));
                }
                Ok(Some(Condition::all().add(self.exists(root, condition)?)))
            }
        }
    }

    fn explicit_join(&mut self, join: &JoinFilter) -> Result<(), TranslateError> {
        let (alias, target_column) = join
            .join_property
            .split_once('.')
            .ok_or_else(|| TranslateError::UnknownJoin(join.join_property.clone()))?;
        if self.joins.iter().any(|j| j.alias == alias) {
            return Ok(());
        }
        let base_column = join.property.replace('.', "_");
        let target_column = target_column.replace('.', "_");
        if !is_valid_identifier(&base_column) || !is_valid_identifier(&target_column) {
            return Err(TranslateError::InvalidProperty(join.property.clone()));
        }
        let table = match self.schema.joins.get(alias) {
            Some(joined) => joined.table.clone(),
            None if is_valid_identifier(alias) => alias.to_string(),
            None => return Err(TranslateError::UnknownJoin(alias.to_string())),
        };
        self.joins.push(JoinClause {
            alias: alias.to_string(),
            table,
            base_column,
            target_column,
            left: join.left,
        });
        Ok(())
    }

    fn leaf(&mut self, leaf: &LeafFilter) -> Result<Condition, TranslateError> {
        match self.resolve(&leaf.property)? {
            ColumnRef::Base { column: c } => comparison(column(&self.schema.table, &c), leaf),
            ColumnRef::Joined { alias, column: c } => {
                self.require_alias(&alias, false)?;
                comparison(column(&alias, &c), leaf)
            }
            ColumnRef::Collection { root, column: None } => match leaf.operation {
                LogicalOperation::IsEmpty | LogicalOperation::IsNull => {
                    Ok(Condition::all().add(self.exists(&root, Condition::all())?).not())
                }
                LogicalOperation::NotNull => Ok(Condition::all().add(self.exists(&root, Condition::all())?)),
                _ => Err(TranslateError::InvalidProperty(leaf.property.clone())),
            },
            ColumnRef::Collection { root, column: Some(c) } => {
                let table = self
                    .schema
                    .collections
                    .get(&root)
                    .map(|t| t.table.clone())
                    .ok_or_else(|| TranslateError::InvalidProperty(root.clone()))?;
                if leaf.operation == LogicalOperation::ContainsAll {
                    let mut all = Condition::all();
                    for value in list(&leaf.value, false) {
                        let member = Condition::all().add(Expr::expr(column(&table, &c)).eq(value));
                        all = all.add(self.exists(&root, member)?);
                    }
                    return Ok(all);
                }
                let member = comparison(column(&table, &c), leaf)?;
                Ok(Condition::all().add(self.exists(&root, member)?))
            }
        }
    }

    fn exists(&self, root: &str, condition: Condition) -> Result<SimpleExpr, TranslateError> {
        let collection = self
            .schema
            .collections
            .get(root)
            .ok_or_else(|| TranslateError::InvalidProperty(root.to_string()))?;
        let subquery = Query::select()
            .expr(Expr::val(1))
            .from(Alias::new(&collection.table))
            .and_where(
                Expr::col((Alias::new(&collection.table), Alias::new(&collection.foreign_key)))
                    .equals((Alias::new(&self.schema.table), Alias::new(&self.schema.id_column))),
            )
            .cond_where(condition)
            .to_owned();
        Ok(Expr::exists(subquery))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::ast::MatchMode;
    use crate::schema::{CollectionTable, JoinedTable};
    use sea_orm::sea_query::SqliteQueryBuilder;

    fn schema() -> ObjectSchema {
        ObjectSchema::new("identities")
            .with_join(
                "Link",
                JoinedTable {
                    table: "links".into(),
                    base_column: "id".into(),
                    target_column: "identity_id".into(),
                },
            )
            .with_collection(
                "capabilities",
                CollectionTable {
                    table: "identity_capabilities".into(),
                    foreign_key: "identity_id".into(),
                },
            )
    }

    fn where_sql(filter: &Filter) -> String {
        let translation = translate(filter, &schema()).unwrap();
        Query::select()
            .column((Alias::new("identities"), Alias::new("id")))
            .from(Alias::new("identities"))
            .cond_where(translation.condition)
            .to_string(SqliteQueryBuilder)
    }

    #[test]
    fn test_like_start_pattern() {
        let sql = where_sql(&Filter::like("name", "jsmith", MatchMode::Start));
        assert!(sql.contains(r#""identities"."name" LIKE 'jsmith%'"#), "{sql}");
    }

    #[test]
    fn test_ignore_case_wraps_upper() {
        let sql = where_sql(&Filter::eq("name", "jsmith").ignore_case());
        assert!(sql.contains(r#"UPPER("identities"."name") = 'JSMITH'"#), "{sql}");
    }

    #[test]
    fn test_null_checks() {
        let sql = where_sql(&Filter::is_null("manager_id"));
        assert!(sql.contains(r#""identities"."manager_id" IS NULL"#), "{sql}");
        let sql = where_sql(&Filter::not_null("manager_id"));
        assert!(sql.contains(r#""identities"."manager_id" IS NOT NULL"#), "{sql}");
    }

    #[test]
    fn test_in_list() {
        let sql = where_sql(&Filter::is_in("department", vec!["Finance", "HR"]));
        assert!(sql.contains(r#""identities"."department" IN ('Finance', 'HR')"#), "{sql}");
    }

    #[test]
    fn test_not_composite() {
        let sql = where_sql(&Filter::not(Filter::eq("inactive", true)));
        assert!(sql.contains("NOT"), "{sql}");
    }

    #[test]
    fn test_joined_alias_is_registered() {
        let translation = translate(&Filter::eq("Link.application.id", "app-1"), &schema()).unwrap();
        assert_eq!(translation.joins.len(), 1);
        assert_eq!(translation.joins[0].table, "links");
        assert_eq!(translation.joins[0].target_column, "identity_id");
    }

    #[test]
    fn test_explicit_join_is_not_duplicated() {
        let filter = Filter::and(vec![
            Filter::join("id", "Link.identity_id"),
            Filter::eq("Link.native_identity", "jsmith"),
            Filter::eq("Link.application.id", "app-1"),
        ]);
        let translation = translate(&filter, &schema()).unwrap();
        assert_eq!(translation.joins.len(), 1);
    }

    #[test]
    fn test_collection_uses_exists() {
        let sql = where_sql(&Filter::collection("capabilities", Filter::eq("name", "Admin")));
        assert!(sql.contains("EXISTS"), "{sql}");
        assert!(sql.contains(r#""identity_capabilities"."identity_id" = "identities"."id""#), "{sql}");
        assert!(sql.contains(r#""identity_capabilities"."name" = 'Admin'"#), "{sql}");
    }

    #[test]
    fn test_collection_leaf_without_wrapper() {
        let sql = where_sql(&Filter::contains_all("capabilities.name", vec!["Admin", "Auditor"]));
        assert_eq!(sql.matches("EXISTS").count(), 2, "{sql}");
    }

    #[test]
    fn test_invalid_property_is_rejected() {
        let err = translate(&Filter::eq("name OR 1=1", "x"), &schema()).unwrap_err();
        assert_eq!(err, TranslateError::InvalidProperty("name OR 1=1".into()));
    }

    #[test]
    fn test_unknown_collection_inside_collection_condition() {
        let err = translate(&Filter::collection("roles", Filter::eq("name", "x")), &schema()).unwrap_err();
        assert_eq!(err, TranslateError::InvalidProperty("roles".into()));
    }

    #[test]
    fn test_comparison_requires_scalar() {
        let err = translate(&Filter::lt("created", FilterValue::Null), &schema()).unwrap_err();
        assert!(matches!(err, TranslateError::InvalidValue { .. }));
    }
}
