//! CEF (Common Event Format) export.
//!
//! Each row becomes one syslog-prefixed line:
//!
//! ```text
//! Mar 04 09:15:02 host CEF:0|SailPoint|IdentityIQ|0.3.0|Identity|Identity|10|name=jsmith fileId=1 cat=Identity
//! ```

use chrono::{DateTime, Utc};

use super::{ExportError, cell_text};
use crate::config::CefConfig;
use crate::definitions::FieldConfig;
use crate::search::{Row, SearchType};

/// Row column carrying a syslog event level.
const EVENT_LEVEL_COLUMN: &str = "eventLevel";
const LINK_EVENT_NAME: &str = "Account Link";

#[must_use]
pub fn cef_file_name(search_type: SearchType) -> &'static str {
    match search_type {
        SearchType::Identity => "identitySearch.cef",
        SearchType::Syslog => "syslogSearch.cef",
        SearchType::Audit => "auditSearch.cef",
        SearchType::Link => "accountSearch.cef",
        _ => "search.cef",
    }
}

fn escape_header(value: &str) -> String {
    value.replace('\\', "\\\\").replace('|', "\\|")
}

fn escape_extension(value: &str) -> String {
    value
        .replace('\\', "\\\\")
        .replace('=', "\\=")
        .replace(['\r', '\n'], " \\n ")
}

pub struct CefExporter<'a> {
    config: &'a CefConfig,
    search_type: SearchType,
    host: String,
}

impl<'a> CefExporter<'a> {
    #[must_use]
    pub fn new(config: &'a CefConfig, search_type: SearchType) -> Self {
        let host = config
            .hostname
            .clone()
            .or_else(|| std::env::var("HOSTNAME").ok())
            .filter(|h| !h.trim().is_empty())
            .unwrap_or_else(|| "localhost".to_string());
        Self {
            config,
            search_type,
            host,
        }
    }

    /// Every row as one CEF line, stamped with `now`.
    ///
    /// # Errors
    /// [`ExportError::NoResults`] when `rows` is empty.
    pub fn export(&self, fields: &[FieldConfig], rows: &[Row], now: DateTime<Utc>) -> Result<String, ExportError> {
        if rows.is_empty() {
            return Err(ExportError::NoResults);
        }
        let mut out = String::new();
        for row in rows {
            out.push_str(&self.line(fields, row, now));
            out.push('\n');
        }
        Ok(out)
    }

    fn line(&self, fields: &[FieldConfig], row: &Row, now: DateTime<Utc>) -> String {
        let name = escape_header(&self.event_name(row));
        format!(
            "{} {} {}|{}|{}|{}|{}|{}|{}|{}",
            now.format("%b %d %H:%M:%S"),
            self.host,
            escape_header(&self.config.version),
            escape_header(&self.config.vendor),
            escape_header(&self.config.product),
            escape_header(&self.config.device_version),
            name,
            name,
            escape_header(self.severity(row)),
            self.extension(fields, row)
        )
    }

    fn event_name(&self, row: &Row) -> String {
        match self.search_type {
            SearchType::Link => LINK_EVENT_NAME.to_string(),
            SearchType::Audit => row
                .get("action")
                .map(cell_text)
                .filter(|a| !a.is_empty())
                .unwrap_or_else(|| self.search_type.as_str().to_string()),
            other => other.as_str().to_string(),
        }
    }

    fn severity(&self, row: &Row) -> &str {
        row.get(EVENT_LEVEL_COLUMN)
            .map(cell_text)
            .and_then(|level| self.config.severity_for_level(&level))
            .filter(|s| !s.is_empty())
            .unwrap_or(&self.config.severity)
    }

    fn extension(&self, fields: &[FieldConfig], row: &Row) -> String {
        let mut parts = Vec::with_capacity(fields.len() + 2);
        for field in fields {
            let Some(value) = row.get(&field.name).filter(|v| !v.is_null()) else {
                continue;
            };
            let value = escape_extension(&cell_text(value));
            let mapped = self
                .config
                .extension_for(self.search_type.slug(), &field.name)
                .filter(|key| !key.is_empty());
            parts.push(match mapped {
                Some(key) if key.chars().any(|c| c.is_ascii_digit()) => {
                    let (key, label) = key.split_once(':').unwrap_or((key, field.name.as_str()));
                    format!("{key}={value} {key}Label={label}")
                }
                Some(key) => format!("{key}={value}"),
                None => format!("{}={value}", field.name),
            });
        }
        let id = row.get("id").map(cell_text).unwrap_or_default();
        parts.push(format!("fileId={id}"));
        parts.push(format!("cat={}", self.search_type.as_str()));
        parts.join(" ")
    }
}
