//! One-way, incremental bulk replication between two SQL Server databases.
//!
//! The engine inserts into the target every source row whose primary-key
//! tuple (or, under deep compare, whose full projection tuple) is absent
//! from the target; it never updates or deletes existing target rows unless
//! running in bulk-refresh mode, which truncates and reloads. Tables are
//! scheduled parent-before-child over the foreign-key graph and synced with
//! bounded parallelism inside each level.

pub mod concurrency;
pub mod coordinator;
pub mod error;
pub mod macros;
pub mod planner;
pub mod report;
pub mod retry;
pub mod schema;
pub mod selection;
pub mod sync;
pub mod warden;
