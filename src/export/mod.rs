//! # Result Export
//!
//! Full result sets rendered as CSV or CEF. Both exporters take the columns and rows of
//! [`SearchSession::export_data`](crate::search::SearchSession::export_data) and return the
//! whole file in memory.

pub mod cef;
pub mod csv;

use std::fmt;

pub use self::cef::{CefExporter, cef_file_name};
pub use self::csv::{csv_file_name, export_csv};

#[derive(Debug)]
pub enum ExportError {
    /// Nothing matched the search.
    NoResults,
    Format(String),
}

impl fmt::Display for ExportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoResults => f.write_str("No Result found"),
            Self::Format(message) => write!(f, "Export failed: {message}"),
        }
    }
}

impl std::error::Error for ExportError {}

/// Display text of a cell. Nulls are empty.
#[must_use]
pub fn cell_text(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::Null => String::new(),
        serde_json::Value::String(s) => s.clone(),
        serde_json::Value::Array(items) => items.iter().map(cell_text).collect::<Vec<_>>().join(", "),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_cell_text() {
        assert_eq!(cell_text(&json!(null)), "");
        assert_eq!(cell_text(&json!("a")), "a");
        assert_eq!(cell_text(&json!(42)), "42");
        assert_eq!(cell_text(&json!(true)), "true");
        assert_eq!(cell_text(&json!(["a", "b"])), "a, b");
    }
}
