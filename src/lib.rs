//! Daily planning and completion engine.
//!
//! Task storage, one-plan-per-day ordering with write-time validation,
//! cursor pagination, completion reconciliation, and productivity insights,
//! backed by SQLite. Ordering suggestions and natural-language task parsing
//! delegate to a pluggable oracle with a deterministic fallback.

pub mod auth;
pub mod config;
pub mod db;
pub mod error;
pub mod oracle;
pub mod rank;
pub mod types;
pub mod validate;
