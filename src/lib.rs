//! # identity-search
//!
//! Advanced analytics search for an identity governance system. Users pick an object type
//! (identities, accounts, roles, audit events, ...), fill in a form of search inputs or build
//! a free-form filter expression, and page through the matching rows in a grid. Searches can
//! be saved per user, saved as reports, and exported to CSV or CEF. Two role mining wizards
//! turn a filled form into task arguments and launch the mining task.
//!
//! The crate is layered bottom-up:
//!
//! - [`filter`]: the filter AST, its string compiler and renderer, and SQL translation.
//! - [`definitions`]: the catalog of search inputs per object type and how inputs become
//!   filters.
//! - [`search`]: per-session search state, the query executor and the advanced editor.
//! - [`grid`] and [`export`]: paging, sorting and the CSV/CEF writers.
//! - [`mining`] and [`tasks`]: wizard forms, templates and task launches.
//! - [`api`]: the `axum` router and its `utoipa` documentation.
//!
//! ```rust,no_run
//! use identity_search::filter::{compile, Filter};
//!
//! let filter = compile(r#"department == "Finance" && riskScore >= 500"#).unwrap();
//! assert_eq!(filter, Filter::and(vec![
//!     Filter::eq("department", "Finance"),
//!     Filter::ge("riskScore", 500_i64),
//! ]));
//! ```

pub mod api;
pub mod config;
pub mod convert;
pub mod definitions;
pub mod entities;
pub mod errors;
pub mod export;
pub mod filter;
pub mod grid;
pub mod migration;
pub mod mining;
pub mod schema;
pub mod search;
pub mod tasks;
pub mod validation;

pub use errors::ApiError;
