//! SQL Server (TDS) access layer for mssync.
//!
//! This crate owns everything that talks the TDS dialect directly: connecting
//! from ADO.NET-style connection strings, an owned value model for moving rows
//! between two servers, and the raw catalog queries the sync engine probes
//! schemas with. Higher-level policy (retries, classification, orchestration)
//! lives in the `mssync` crate.

pub mod client;
pub mod metadata;
pub mod types;
pub mod value;

pub use client::MssqlClient;
pub use types::{ColumnInfo, ForeignKey, TableRef, quote_ident};
pub use value::{NullKind, SqlValue, row_values};
