//! Persistent records: saved searches, task definitions (reports and mining templates)
//! and submitted task results.

pub mod saved_search;
pub mod task_definition;
pub mod task_result;
