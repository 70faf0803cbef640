//! Configuration objects for the mssync engine.
//!
//! [`SyncParameters`] is the bundle the engine consumes; the mapping and
//! ignore directives mirror the CLI's repeatable `--map-column` and
//! `--ignore-column` options.

pub mod mapping;
pub mod params;

pub use mapping::{ColumnMappings, DirectiveError, IgnoreSet};
pub use params::{ParameterError, SyncParameters, parse_start_rows};
