//! Persistence layer: libSQL-backed duplicate tracker.

pub mod libsql_backend;
pub mod migrations;
pub mod traits;

pub use libsql_backend::LibSqlTracker;
pub use traits::{ProcessedRecord, ProcessedStore, TrackerStats};
