//! # Search Sessions
//!
//! One [`SearchSession`] drives a search for one object type: it restores the cached
//! [`SearchItem`] from the client's session, applies form edits, builds and converts the
//! predicates, validates and executes the query and hands rows to the grid and exporters.
//!
//! ## Main Components
//!
//! - **[`SearchType`]**: the searchable object types and their session keys
//! - **[`SearchItem`]**: the cached (and optionally saved) description of one search
//! - **[`SessionStore`]**: per-client key/value storage shared by all requests
//! - **[`SearchSession`]**: the actions (`run_query`, `save_query`, `load`, `clear`, ...)
//! - **[`AdvancedEditor`]**: add/remove/group/ungroup/compile on the item's filter rows
//! - **[`QueryExecutor`]**: the `sea-query` statements behind counts and grid pages

pub mod advanced;
pub mod executor;
pub mod item;
pub mod outcome;
pub mod service;
pub mod session;
pub mod state;

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use utoipa::ToSchema;

use crate::filter::UnknownVariant;

pub use advanced::AdvancedEditor;
pub use executor::{QueryExecutor, Row};
pub use item::{SearchItem, SearchItemFilter};
pub use outcome::Outcome;
pub use service::SearchSession;
pub use session::{ExportMonitor, GridState, SessionStore};
pub use state::{SearchEvent, SearchPhase};

/// Session attribute shared with the entitlement filter panel of identity searches.
pub const ENTITLEMENT_FILTER_KEY: &str = "EntitlementFilterBean";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub enum SearchType {
    Identity,
    Role,
    Certification,
    Audit,
    Link,
    AccountGroup,
    IdentityRequest,
    Syslog,
    Activity,
}

impl SearchType {
    pub const ALL: [Self; 9] = [
        Self::Identity,
        Self::Role,
        Self::Certification,
        Self::Audit,
        Self::Link,
        Self::AccountGroup,
        Self::IdentityRequest,
        Self::Syslog,
        Self::Activity,
    ];

    /// Name used in session keys and CEF headers.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Identity => "Identity",
            Self::Role => "Role",
            Self::Certification => "Certification",
            Self::Audit => "Audit",
            Self::Link => "Link",
            Self::AccountGroup => "AccountGroup",
            Self::IdentityRequest => "IdentityRequest",
            Self::Syslog => "Syslog",
            Self::Activity => "Activity",
        }
    }

    /// Path segment and catalog key.
    #[must_use]
    pub const fn slug(self) -> &'static str {
        match self {
            Self::Identity => "identity",
            Self::Role => "role",
            Self::Certification => "certification",
            Self::Audit => "audit",
            Self::Link => "link",
            Self::AccountGroup => "accountGroup",
            Self::IdentityRequest => "identityRequest",
            Self::Syslog => "syslog",
            Self::Activity => "activity",
        }
    }

    #[must_use]
    pub fn search_item_key(self) -> String {
        format!("{}SearchItem", self.as_str())
    }

    #[must_use]
    pub fn grid_state_key(self) -> String {
        format!("{}GridState", self.as_str())
    }

    #[must_use]
    pub fn export_monitor_key(self) -> String {
        format!("{}ExportMonitor", self.as_str())
    }

    /// Every session key owned by this type.
    #[must_use]
    pub fn session_keys(self) -> Vec<String> {
        let mut keys = vec![
            self.search_item_key(),
            self.grid_state_key(),
            self.export_monitor_key(),
        ];
        if self == Self::Identity {
            keys.push(ENTITLEMENT_FILTER_KEY.to_string());
        }
        keys
    }
}

impl fmt::Display for SearchType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.slug())
    }
}

impl FromStr for SearchType {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|t| t.slug().eq_ignore_ascii_case(s) || t.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| UnknownVariant {
                kind: "search type",
                value: s.to_string(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_keys() {
        assert_eq!(
            SearchType::Audit.session_keys(),
            vec!["AuditSearchItem", "AuditGridState", "AuditExportMonitor"]
        );
        assert!(SearchType::Identity
            .session_keys()
            .contains(&ENTITLEMENT_FILTER_KEY.to_string()));
    }

    #[test]
    fn test_parse_slug_and_name() {
        assert_eq!("accountGroup".parse::<SearchType>().unwrap(), SearchType::AccountGroup);
        assert_eq!("IdentityRequest".parse::<SearchType>().unwrap(), SearchType::IdentityRequest);
        assert!("bundle".parse::<SearchType>().is_err());
    }

    #[test]
    fn test_serde_uses_slug() {
        assert_eq!(
            serde_json::to_string(&SearchType::IdentityRequest).unwrap(),
            r#""identityRequest""#
        );
    }
}
