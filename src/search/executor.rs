//! Query execution against the search tables.
//!
//! Statements are built with `sea-query` from the translated filter and read back as JSON rows.
//! Selected columns are aliased `c0..cN` and renamed to their field names afterwards; `id` is
//! always projected and rows are de-duplicated by it.
//!
//! A page is cut from the distinct ids first, so joins to many rows cannot shorten a page or
//! repeat an id across pages. The columns of those ids are fetched by a second query.

use sea_orm::{
    ConnectionTrait, DatabaseConnection, FromQueryResult, JsonValue, Value,
    sea_query::{Alias, Expr, Func, JoinType, Order, Query, SelectStatement, SimpleExpr},
};
use std::collections::{HashMap, HashSet};
use tracing::debug;

use crate::definitions::FieldConfig;
use crate::errors::ApiError;
use crate::filter::{Filter, JoinClause, TranslateError, Translator};
use crate::grid::{SortDirection, SortSpec};
use crate::schema::ObjectSchema;

/// One projected result row, keyed by field name.
pub type Row = serde_json::Map<String, serde_json::Value>;

#[derive(Debug, FromQueryResult)]
struct CountRow {
    count: i64,
}

/// A built page query and the alias of each projected field.
#[derive(Debug, Clone)]
pub struct PageQuery {
    pub select: SelectStatement,
    pub columns: Vec<(String, String)>,
}

pub struct QueryExecutor<'a> {
    db: &'a DatabaseConnection,
    schema: &'a ObjectSchema,
}

fn apply_joins(select: &mut SelectStatement, schema: &ObjectSchema, joins: &[JoinClause]) {
    for join in joins {
        let kind = if join.left { JoinType::LeftJoin } else { JoinType::InnerJoin };
        select.join_as(
            kind,
            Alias::new(&join.table),
            Alias::new(&join.alias),
            Expr::col((Alias::new(&schema.table), Alias::new(&join.base_column)))
                .equals((Alias::new(&join.alias), Alias::new(&join.target_column))),
        );
    }
}

impl<'a> QueryExecutor<'a> {
    #[must_use]
    pub const fn new(db: &'a DatabaseConnection, schema: &'a ObjectSchema) -> Self {
        Self { db, schema }
    }

    fn id_column(&self) -> (Alias, Alias) {
        (Alias::new(&self.schema.table), Alias::new(&self.schema.id_column))
    }

    fn sort_exprs(
        translator: &mut Translator<'_>,
        fields: &[&FieldConfig],
        sorters: &[SortSpec],
    ) -> Result<Vec<(SimpleExpr, Order)>, TranslateError> {
        let mut exprs = Vec::with_capacity(sorters.len());
        for sorter in sorters {
            let Some(field) = fields.iter().find(|f| f.name == sorter.property) else {
                debug!(column = %sorter.property, "Ignoring sort on unselected column");
                continue;
            };
            if field.is_calculated() || !field.sortable {
                continue;
            }
            let order = match sorter.direction {
                SortDirection::Asc => Order::Asc,
                SortDirection::Desc => Order::Desc,
            };
            exprs.push((translator.column_for(&field.property)?, order));
        }
        Ok(exprs)
    }

    /// One page of distinct ids matching `filter`. Sorting on a column with several values
    /// per id uses the smallest value ascending and the largest descending.
    ///
    /// # Errors
    /// Fails when the filter or a sort field does not resolve against the schema.
    pub fn id_page_query(
        &self,
        filter: Option<&Filter>,
        fields: &[&FieldConfig],
        sorters: &[SortSpec],
        (offset, limit): (u64, u64),
    ) -> Result<SelectStatement, TranslateError> {
        let mut translator = Translator::new(self.schema);
        let condition = filter.map(|f| translator.condition(f)).transpose()?;

        let mut select = Query::select();
        select
            .expr_as(Expr::col(self.id_column()), Alias::new("id"))
            .from(Alias::new(&self.schema.table))
            .group_by_col(self.id_column());

        for (expr, order) in Self::sort_exprs(&mut translator, fields, sorters)? {
            let aggregate = match order {
                Order::Desc => Func::max(expr),
                _ => Func::min(expr),
            };
            select.order_by_expr(aggregate.into(), order);
        }
        select.order_by(self.id_column(), Order::Asc);

        if let Some(condition) = condition {
            select.cond_where(condition);
        }
        apply_joins(&mut select, self.schema, translator.joins());
        select.offset(offset).limit(limit);
        Ok(select)
    }

    /// Distinct page query over `fields`, ordered by `sorters` (base id when empty).
    ///
    /// # Errors
    /// Fails when the filter or a field does not resolve against the schema.
    pub fn page_query(
        &self,
        filter: Option<&Filter>,
        fields: &[&FieldConfig],
        sorters: &[SortSpec],
        page: Option<(u64, u64)>,
    ) -> Result<PageQuery, TranslateError> {
        let mut translator = Translator::new(self.schema);
        let condition = filter.map(|f| translator.condition(f)).transpose()?;

        let mut select = Query::select();
        select
            .distinct()
            .expr_as(Expr::col(self.id_column()), Alias::new("id"))
            .from(Alias::new(&self.schema.table));

        let mut columns = Vec::new();
        for (index, field) in fields.iter().enumerate() {
            if field.is_calculated() || field.name == "id" {
                continue;
            }
            let alias = format!("c{index}");
            select.expr_as(translator.column_for(&field.property)?, Alias::new(&alias));
            columns.push((alias, field.name.clone()));
        }

        for (expr, order) in Self::sort_exprs(&mut translator, fields, sorters)? {
            select.order_by_expr(expr, order);
        }
        select.order_by(self.id_column(), Order::Asc);

        if let Some(condition) = condition {
            select.cond_where(condition);
        }
        apply_joins(&mut select, self.schema, translator.joins());
        if let Some((offset, limit)) = page {
            select.offset(offset).limit(limit);
        }

        Ok(PageQuery { select, columns })
    }

    /// Count of distinct base rows matching `filter`.
    ///
    /// # Errors
    /// Fails on translation or database errors.
    pub async fn count(&self, filter: Option<&Filter>) -> Result<u64, ApiError> {
        let mut translator = Translator::new(self.schema);
        let condition = filter.map(|f| translator.condition(f)).transpose()?;

        let mut select = Query::select();
        select
            .expr_as(Func::count_distinct(Expr::col(self.id_column())), Alias::new("count"))
            .from(Alias::new(&self.schema.table));
        if let Some(condition) = condition {
            select.cond_where(condition);
        }
        apply_joins(&mut select, self.schema, translator.joins());

        let statement = self.db.get_database_backend().build(&select);
        let count = CountRow::find_by_statement(statement)
            .one(self.db)
            .await?
            .map_or(0, |row| row.count);
        Ok(u64::try_from(count).unwrap_or(0))
    }

    async fn fetch(&self, select: &SelectStatement) -> Result<Vec<JsonValue>, ApiError> {
        let statement = self.db.get_database_backend().build(select);
        debug!(statement = ?statement, "Executing search");
        Ok(JsonValue::find_by_statement(statement).all(self.db).await?)
    }

    /// Rows of one page (every row without `page`), renamed to field names and unique by id.
    ///
    /// # Errors
    /// Fails on translation or database errors.
    pub async fn rows(
        &self,
        filter: Option<&Filter>,
        fields: &[&FieldConfig],
        sorters: &[SortSpec],
        page: Option<(u64, u64)>,
    ) -> Result<Vec<Row>, ApiError> {
        let Some(page) = page else {
            let query = self.page_query(filter, fields, sorters, None)?;
            return Ok(project(self.fetch(&query.select).await?, &query.columns, fields));
        };

        let ids: Vec<JsonValue> = self
            .fetch(&self.id_page_query(filter, fields, sorters, page)?)
            .await?
            .into_iter()
            .filter_map(|row| match row {
                JsonValue::Object(mut object) => object.remove("id"),
                _ => None,
            })
            .collect();
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let mut query = self.page_query(None, fields, sorters, None)?;
        query
            .select
            .and_where(Expr::col(self.id_column()).is_in(ids.iter().filter_map(id_value)));
        let mut rows = project(self.fetch(&query.select).await?, &query.columns, fields);

        let position: HashMap<String, usize> = ids.iter().enumerate().map(|(i, id)| (id.to_string(), i)).collect();
        rows.sort_by_key(|row| {
            row.get("id")
                .and_then(|id| position.get(&id.to_string()).copied())
                .unwrap_or(usize::MAX)
        });
        Ok(rows)
    }

    /// Run the query with a one-row limit to prove the filter executes.
    ///
    /// # Errors
    /// Returns the translation or database error that made the query fail.
    pub async fn validate(&self, filter: Option<&Filter>) -> Result<(), ApiError> {
        let query = self.page_query(filter, &[], &[], Some((0, 1)))?;
        let statement = self.db.get_database_backend().build(&query.select);
        JsonValue::find_by_statement(statement)
            .one(self.db)
            .await
            .map(|_| ())
            .map_err(ApiError::database)
    }
}

fn id_value(id: &JsonValue) -> Option<Value> {
    match id {
        JsonValue::String(s) => Some(s.clone().into()),
        JsonValue::Number(n) => n.as_i64().map(Into::into),
        _ => None,
    }
}

fn project(raw: Vec<JsonValue>, columns: &[(String, String)], fields: &[&FieldConfig]) -> Vec<Row> {
    let mut seen = HashSet::new();
    let mut rows = Vec::with_capacity(raw.len());
    for value in raw {
        let JsonValue::Object(mut object) = value else {
            continue;
        };
        let id = object.remove("id").unwrap_or(JsonValue::Null);
        if !seen.insert(id.to_string()) {
            continue;
        }
        let mut row = Row::new();
        row.insert("id".to_string(), id);
        for field in fields {
            let value = columns
                .iter()
                .find(|(_, name)| *name == field.name)
                .and_then(|(alias, _)| object.remove(alias))
                .unwrap_or(JsonValue::Null);
            row.insert(field.name.clone(), value);
        }
        rows.push(row);
    }
    rows
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::definitions::PropertyType;
    use crate::schema::JoinedTable;
    use sea_orm::sea_query::SqliteQueryBuilder;
    use serde_json::json;

    fn schema() -> ObjectSchema {
        ObjectSchema::new("links").with_join(
            "Identity",
            JoinedTable {
                table: "identities".into(),
                base_column: "identity_id".into(),
                target_column: "id".into(),
            },
        )
    }

    fn field(name: &str, property: &str) -> FieldConfig {
        FieldConfig {
            name: name.into(),
            property: property.into(),
            header: None,
            property_type: PropertyType::String,
            sortable: true,
        }
    }

    fn sql(filter: Option<&Filter>, fields: &[&FieldConfig], sorters: &[SortSpec]) -> String {
        let schema = schema();
        let db = DatabaseConnection::Disconnected;
        let executor = QueryExecutor::new(&db, &schema);
        executor
            .page_query(filter, fields, sorters, Some((10, 5)))
            .unwrap()
            .select
            .to_string(SqliteQueryBuilder)
    }

    #[test]
    fn test_projection_left_joins_alias() {
        let identity = field("identityName", "Identity.name");
        let sql = sql(None, &[&identity], &[]);
        assert!(sql.contains(r#"LEFT JOIN "identities" AS "Identity""#), "{sql}");
        assert!(sql.contains(r#""Identity"."name" AS "c0""#), "{sql}");
        assert!(sql.contains("LIMIT 5 OFFSET 10"), "{sql}");
    }

    #[test]
    fn test_filter_inner_joins_alias() {
        let filter = Filter::eq("Identity.name", "jsmith");
        let identity = field("identityName", "Identity.name");
        let sql = sql(Some(&filter), &[&identity], &[]);
        assert!(sql.contains(r#"INNER JOIN "identities" AS "Identity""#), "{sql}");
        assert!(!sql.contains("LEFT JOIN"), "{sql}");
    }

    #[test]
    fn test_sort_by_selected_field() {
        let app = field("application", "application_name");
        let sql = sql(None, &[&app], &[SortSpec::new("application", SortDirection::Desc)]);
        assert!(sql.contains(r#"ORDER BY "links"."application_name" DESC, "links"."id" ASC"#), "{sql}");
    }

    #[test]
    fn test_calculated_fields_are_not_projected() {
        let calculated = field("SPT_score", "score");
        let sql = sql(None, &[&calculated], &[SortSpec::new("SPT_score", SortDirection::Asc)]);
        assert!(!sql.contains("score"), "{sql}");
    }

    #[test]
    fn test_id_page_groups_by_id_and_aggregates_sort() {
        let schema = schema();
        let db = DatabaseConnection::Disconnected;
        let executor = QueryExecutor::new(&db, &schema);
        let identity = field("identityName", "Identity.name");
        let sql = executor
            .id_page_query(None, &[&identity], &[SortSpec::new("identityName", SortDirection::Desc)], (10, 5))
            .unwrap()
            .to_string(SqliteQueryBuilder);
        assert!(sql.contains(r#"GROUP BY "links"."id""#), "{sql}");
        assert!(sql.contains(r#"ORDER BY MAX("Identity"."name") DESC, "links"."id" ASC"#), "{sql}");
        assert!(sql.contains("LIMIT 5 OFFSET 10"), "{sql}");
        assert!(!sql.contains("c0"), "{sql}");
    }

    async fn linked_db() -> DatabaseConnection {
        let db = sea_orm::Database::connect("sqlite::memory:").await.unwrap();
        for statement in [
            "CREATE TABLE identities (id TEXT PRIMARY KEY NOT NULL, name TEXT NOT NULL)",
            "CREATE TABLE links (id TEXT PRIMARY KEY NOT NULL, identity_id TEXT NOT NULL, application_name TEXT)",
            "INSERT INTO identities (id, name) VALUES ('i1', 'alice'), ('i2', 'bob'), ('i3', 'carol'), ('i4', 'dave')",
            "INSERT INTO links (id, identity_id, application_name) VALUES
                ('l1', 'i1', 'AD'), ('l2', 'i1', 'SAP'), ('l3', 'i1', 'LDAP'),
                ('l4', 'i2', 'AD'), ('l5', 'i2', 'SAP'), ('l6', 'i3', 'LDAP')",
        ] {
            db.execute_unprepared(statement).await.unwrap();
        }
        db
    }

    #[tokio::test]
    async fn test_pages_stay_full_with_to_many_projection() {
        let db = linked_db().await;
        let schema = ObjectSchema::new("identities").with_join(
            "Link",
            JoinedTable {
                table: "links".into(),
                base_column: "id".into(),
                target_column: "identity_id".into(),
            },
        );
        let executor = QueryExecutor::new(&db, &schema);
        let name = field("name", "name");
        let application = field("application", "Link.application_name");
        let fields = [&name, &application];
        let sorters = [SortSpec::new("name", SortDirection::Asc)];

        let first = executor.rows(None, &fields, &sorters, Some((0, 2))).await.unwrap();
        let second = executor.rows(None, &fields, &sorters, Some((2, 2))).await.unwrap();
        let names = |rows: &[Row]| rows.iter().map(|r| r["name"].clone()).collect::<Vec<_>>();
        assert_eq!(names(&first), vec![json!("alice"), json!("bob")]);
        assert_eq!(names(&second), vec![json!("carol"), json!("dave")]);
        assert_eq!(second[1]["application"], JsonValue::Null);
        assert_eq!(executor.count(None).await.unwrap(), 4);

        let by_application = [SortSpec::new("application", SortDirection::Desc)];
        let rows = executor.rows(None, &fields, &by_application, Some((0, 3))).await.unwrap();
        assert_eq!(names(&rows), vec![json!("alice"), json!("bob"), json!("carol")]);
    }

    #[test]
    fn test_project_renames_and_dedupes() {
        let app = field("application", "application_name");
        let calculated = field("SPT_score", "score");
        let columns = vec![("c0".to_string(), "application".to_string())];
        let raw = vec![
            json!({"id": 1, "c0": "AD"}),
            json!({"id": 1, "c0": "LDAP"}),
            json!({"id": 2, "c0": null}),
        ];
        let rows = project(raw, &columns, &[&app, &calculated]);
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0]["application"], "AD");
        assert_eq!(rows[0]["SPT_score"], JsonValue::Null);
        assert_eq!(rows[1]["id"], 2);
    }
}
