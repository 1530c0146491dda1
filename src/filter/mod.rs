//! # Filter Predicates
//!
//! Search criteria are held as a [`Filter`] tree: leaves compare one property, composites
//! combine children with AND/OR/NOT, join nodes pull in a secondary table and collection
//! nodes test the members of a multi-valued property.
//!
//! ## Main Components
//!
//! - **[`Filter`]**: the predicate tree with constructor helpers
//! - **[`compile`]**: parses the textual expression language
//! - **`Display`**: renders a tree back to that language
//! - **[`translate`]**: turns a tree into a `sea-query` condition for one [`ObjectSchema`](crate::schema::ObjectSchema)
//!
//! ## Expression Language
//!
//! ```rust,ignore
//! name == "jsmith"
//! name.startsWithIgnoreCase("js") && !(inactive == true)
//! department.in({"Finance", "HR"})
//! id.join(IdentityExternalAttribute.identity)
//! links.collectionCondition("application == \"AD\"")
//! created >= DATE$1704164645000
//! ```

pub mod ast;
pub mod compiler;
pub mod render;
pub mod sql;

pub use ast::{
    BooleanOperation, CollectionFilter, CompositeFilter, Filter, FilterValue, JoinFilter,
    LeafFilter, LogicalOperation, MatchMode, UnknownVariant,
};
pub use compiler::{FilterError, compile};
pub use render::quote;
pub use sql::{JoinClause, TranslateError, Translation, Translator, translate};
