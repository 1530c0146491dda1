//! Textual filter expressions.
//!
//! Every [`Filter`] renders to the expression language read by
//! [`compile`](super::compile). Rendering then compiling yields the same tree for
//! anything the grammar can express; `LIKE` with [`MatchMode::Exact`] renders as `==`.

use std::fmt::{self, Write};

use super::ast::{BooleanOperation, Filter, FilterValue, LeafFilter, LogicalOperation, MatchMode};

/// Quote a string literal, escaping backslashes and double quotes.
#[must_use]
pub fn quote(value: &str) -> String {
    let mut out = String::with_capacity(value.len() + 2);
    out.push('"');
    for c in value.chars() {
        if c == '"' || c == '\\' {
            out.push('\\');
        }
        out.push(c);
    }
    out.push('"');
    out
}

fn write_literal(f: &mut impl Write, value: &FilterValue) -> fmt::Result {
    match value {
        FilterValue::Null => f.write_str("null"),
        FilterValue::Text(s) => f.write_str(&quote(s)),
        FilterValue::Integer(i) => write!(f, "{i}"),
        FilterValue::Boolean(b) => write!(f, "{b}"),
        FilterValue::Date(d) => write!(f, "DATE${}", d.timestamp_millis()),
        FilterValue::List(items) => {
            f.write_char('{')?;
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    f.write_str(", ")?;
                }
                write_literal(f, item)?;
            }
            f.write_char('}')
        }
    }
}

fn write_list_argument(f: &mut impl Write, value: &FilterValue) -> fmt::Result {
    match value {
        FilterValue::List(_) => write_literal(f, value),
        other => {
            f.write_char('{')?;
            write_literal(f, other)?;
            f.write_char('}')
        }
    }
}

fn write_leaf(f: &mut impl Write, leaf: &LeafFilter) -> fmt::Result {
    let suffix = if leaf.ignore_case { "IgnoreCase" } else { "" };
    let case_prefix = if leaf.ignore_case { "i" } else { "" };
    let property = &leaf.property;

    match leaf.operation {
        LogicalOperation::Like => {
            let text = leaf.value.display_text();
            let function = match leaf.match_mode.unwrap_or_default() {
                MatchMode::Start => "startsWith",
                MatchMode::End => "endsWith",
                MatchMode::Anywhere => "contains",
                MatchMode::Exact => {
                    return write!(f, "{property} {case_prefix}== {}", quote(&text));
                }
            };
            write!(f, "{property}.{function}{suffix}({})", quote(&text))
        }
        LogicalOperation::In | LogicalOperation::ContainsAll => {
            let function = if leaf.operation == LogicalOperation::In {
                "in"
            } else {
                "containsAll"
            };
            write!(f, "{property}.{function}{suffix}(")?;
            write_list_argument(f, &leaf.value)?;
            f.write_char(')')
        }
        LogicalOperation::IsNull => write!(f, "{property}.isNull()"),
        LogicalOperation::NotNull => write!(f, "{property}.notNull()"),
        LogicalOperation::IsEmpty => write!(f, "{property}.isEmpty()"),
        op => {
            // Remaining operations are the infix comparisons.
            let symbol = op.symbol().unwrap_or("==");
            write!(f, "{property} {case_prefix}{symbol} ")?;
            write_literal(f, &leaf.value)
        }
    }
}

fn write_filter(f: &mut impl Write, filter: &Filter) -> fmt::Result {
    match filter {
        Filter::Leaf(leaf) => write_leaf(f, leaf),
        Filter::Composite(composite) => match composite.operation {
            BooleanOperation::Not => {
                f.write_char('!')?;
                match composite.children.as_slice() {
                    [Filter::Composite(inner)] if inner.operation != BooleanOperation::Not => {
                        write_filter(f, &composite.children[0])
                    }
                    [single] => {
                        f.write_char('(')?;
                        write_filter(f, single)?;
                        f.write_char(')')
                    }
                    children => {
                        f.write_char('(')?;
                        write_joined(f, children, BooleanOperation::And)?;
                        f.write_char(')')
                    }
                }
            }
            operation => {
                f.write_char('(')?;
                write_joined(f, &composite.children, operation)?;
                f.write_char(')')
            }
        },
        Filter::Join(join) => {
            let function = if join.left { "leftJoin" } else { "join" };
            write!(f, "{}.{function}({})", join.property, join.join_property)
        }
        Filter::Collection(collection) => {
            let inner = collection.condition.to_string();
            write!(
                f,
                "{}.collectionCondition({})",
                collection.property,
                quote(&inner)
            )
        }
    }
}

fn write_joined(f: &mut impl Write, children: &[Filter], operation: BooleanOperation) -> fmt::Result {
    for (i, child) in children.iter().enumerate() {
        if i > 0 {
            write!(f, " {} ", operation.symbol())?;
        }
        write_filter(f, child)?;
    }
    Ok(())
}

impl fmt::Display for Filter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write_filter(f, self)
    }
}

impl fmt::Display for FilterValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write_literal(f, self)
    }
}
