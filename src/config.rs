//! Service configuration.
//!
//! [`AppConfig::load`] layers the embedded defaults, an optional TOML file and `SEARCH__*`
//! environment variables (`SEARCH__DATABASE__URL`, `SEARCH__SEARCH__PRE_VALIDATE`, ...).
//! [`AppConfig::default`] returns the same defaults without reading anything.

use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

// ---------------------------------------------------------------------------
// Embedded defaults
// ---------------------------------------------------------------------------

const DEFAULT_CONFIG: &str = r#"
[server]
bind = "127.0.0.1:3000"

[database]
url = "sqlite::memory:"

[logging]
level = "info"

[session]
idle_timeout_secs = 1800
sweep_interval_secs = 60

[search]
pre_validate = true
enable_calendar = false
default_page_size = 25
max_page_size = 500

[cef]
version = "CEF:0"
vendor = "SailPoint"
product = "IdentityIQ"
severity = "10"

[mining]
min_identities = 0
min_entitlements = 0
max_candidate_roles = 1000
"#;

// ---------------------------------------------------------------------------
// Sections
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub session: SessionConfig,
    #[serde(default)]
    pub search: SearchSettings,
    #[serde(default)]
    pub cef: CefConfig,
    #[serde(default)]
    pub mining: MiningConfig,
    #[serde(default)]
    pub catalog: CatalogConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub bind: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "127.0.0.1:3000".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    pub url: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: "sqlite::memory:".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default `EnvFilter` directive when `RUST_LOG` is unset.
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

/// Lifetime of client sessions.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Seconds without a request before a session is forgotten.
    pub idle_timeout_secs: u64,
    pub sweep_interval_secs: u64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            idle_timeout_secs: 1800,
            sweep_interval_secs: 60,
        }
    }
}

impl SessionConfig {
    #[must_use]
    pub const fn idle_timeout(&self) -> Duration {
        Duration::from_secs(self.idle_timeout_secs)
    }

    #[must_use]
    pub const fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs)
    }
}

/// Behaviour of search sessions.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SearchSettings {
    /// Run the query with a one-row limit before accepting it.
    pub pre_validate: bool,
    /// Date inputs are compared as dates rather than strings.
    pub enable_calendar: bool,
    pub default_page_size: u64,
    pub max_page_size: u64,
}

impl Default for SearchSettings {
    fn default() -> Self {
        Self {
            pre_validate: true,
            enable_calendar: false,
            default_page_size: 25,
            max_page_size: 500,
        }
    }
}

/// Header values and extension mappings of CEF exports.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CefConfig {
    pub version: String,
    pub vendor: String,
    pub product: String,
    pub device_version: String,
    /// Severity used when no better one is known.
    pub severity: String,
    /// Host written into the syslog prefix. Detected when unset.
    pub hostname: Option<String>,
    /// Syslog event level to CEF severity.
    pub syslog_severity: BTreeMap<String, String>,
    /// Per search type (`identity`, `audit`, ...): column name to CEF key, optionally
    /// `cs1:Label`.
    pub extensions: BTreeMap<String, BTreeMap<String, String>>,
}

impl Default for CefConfig {
    fn default() -> Self {
        let syslog_severity = [
            ("ERROR", "10"),
            ("FATAL", "9"),
            ("WARN", "5"),
            ("TRACE", "4"),
            ("DEBUG", "3"),
            ("INFO", "2"),
            ("ALL", "1"),
        ]
        .into_iter()
        .map(|(level, severity)| (level.to_string(), severity.to_string()))
        .collect();

        Self {
            version: "CEF:0".to_string(),
            vendor: "SailPoint".to_string(),
            product: "IdentityIQ".to_string(),
            device_version: env!("CARGO_PKG_VERSION").to_string(),
            severity: "10".to_string(),
            hostname: None,
            syslog_severity,
            extensions: BTreeMap::new(),
        }
    }
}

impl CefConfig {
    /// Extension mapping of one search type. Column lookups ignore case.
    #[must_use]
    pub fn extension_for(&self, search_type: &str, column: &str) -> Option<&str> {
        self.extensions
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(search_type))
            .and_then(|(_, map)| map.iter().find(|(c, _)| c.eq_ignore_ascii_case(column)))
            .map(|(_, key)| key.as_str())
    }

    #[must_use]
    pub fn severity_for_level(&self, level: &str) -> Option<&str> {
        self.syslog_severity
            .iter()
            .find(|(l, _)| l.eq_ignore_ascii_case(level))
            .map(|(_, severity)| severity.as_str())
    }
}

/// Defaults for IT role mining arguments.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct MiningConfig {
    pub min_identities: u32,
    pub min_entitlements: u32,
    pub max_candidate_roles: u32,
}

impl Default for MiningConfig {
    fn default() -> Self {
        Self {
            min_identities: 0,
            min_entitlements: 0,
            max_candidate_roles: 1000,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct CatalogConfig {
    /// JSON catalog replacing the embedded one.
    pub path: Option<PathBuf>,
}

impl AppConfig {
    /// Embedded defaults, then `path` when given, then the environment.
    ///
    /// # Errors
    /// Fails when the file is missing or any source does not deserialize.
    pub fn load(path: Option<&Path>) -> Result<Self, config::ConfigError> {
        let mut builder = config::Config::builder()
            .add_source(config::File::from_str(DEFAULT_CONFIG, config::FileFormat::Toml));
        if let Some(path) = path {
            builder = builder.add_source(config::File::from(path).required(true));
        }
        builder
            .add_source(
                config::Environment::with_prefix("SEARCH")
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_embedded_defaults_match_default_impls() {
        let loaded: AppConfig = config::Config::builder()
            .add_source(config::File::from_str(DEFAULT_CONFIG, config::FileFormat::Toml))
            .build()
            .unwrap()
            .try_deserialize()
            .unwrap();
        let defaults = AppConfig::default();
        assert_eq!(loaded.server.bind, defaults.server.bind);
        assert_eq!(loaded.search.max_page_size, defaults.search.max_page_size);
        assert_eq!(loaded.mining.max_candidate_roles, 1000);
        assert_eq!(loaded.cef.vendor, "SailPoint");
        assert!(loaded.search.pre_validate);
        assert_eq!(loaded.session.idle_timeout(), defaults.session.idle_timeout());
        assert_eq!(loaded.session.sweep_interval_secs, 60);
    }

    #[test]
    fn test_file_overrides_defaults() {
        let dir = std::env::temp_dir().join(format!("identity-search-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("search.toml");
        std::fs::write(
            &path,
            "[search]\nmax_page_size = 50\n[cef.extensions.identity]\nemail = \"suser\"\nmanager = \"cs1:Manager\"\n",
        )
        .unwrap();

        let config = AppConfig::load(Some(&path)).unwrap();
        assert_eq!(config.search.max_page_size, 50);
        assert_eq!(config.search.default_page_size, 25);
        assert_eq!(config.cef.extension_for("identity", "email"), Some("suser"));
        assert_eq!(config.cef.extension_for("Identity", "Manager"), Some("cs1:Manager"));
        assert_eq!(config.cef.extension_for("audit", "email"), None);
        std::fs::remove_dir_all(dir).ok();
    }

    #[test]
    fn test_missing_file_is_an_error() {
        assert!(AppConfig::load(Some(Path::new("/nonexistent/search.toml"))).is_err());
    }

    #[test]
    fn test_syslog_severity_lookup_ignores_case() {
        let cef = CefConfig::default();
        assert_eq!(cef.severity_for_level("error"), Some("10"));
        assert_eq!(cef.severity_for_level("Warn"), Some("5"));
        assert_eq!(cef.severity_for_level("NOTICE"), None);
    }
}
