use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::mapping::{ColumnMappings, IgnoreSet};

/// Errors raised while building or validating [`SyncParameters`].
#[derive(Debug, Error)]
pub enum ParameterError {
    #[error("invalid value for `{field}`: {constraint}")]
    InvalidFieldValue { field: String, constraint: String },

    #[error("invalid start-row entry `{0}`, expected a non-negative integer")]
    InvalidStartRow(String),
}

/// The configuration bundle consumed by the sync engine.
///
/// Every field corresponds to one CLI option; the whole struct is echoed
/// verbatim into the run-result file, so the serialized shape is part of the
/// output contract. Connection strings are deliberately not part of this
/// bundle.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct SyncParameters {
    /// Rows per batch on the incremental path, and the load chunk size on the
    /// bulk-refresh path.
    #[serde(default = "default_batch_size")]
    pub batch_size: u64,

    /// Maximum number of tables synced concurrently within one execution
    /// level.
    #[serde(default = "default_threads")]
    pub threads: usize,

    /// Permit the incremental path on tables without a primary key.
    #[serde(default)]
    pub allow_no_pk: bool,

    /// Use the full projection as the anti-join key. Only meaningful together
    /// with `allow_no_pk`.
    #[serde(default)]
    pub deep_compare: bool,

    /// Truncate-and-reload instead of incremental insertion.
    #[serde(default)]
    pub clear_target: bool,

    /// Restrict the projection to columns that exist in the target.
    #[serde(default)]
    pub target_columns_only: bool,

    /// Page the source by primary-key order instead of the first projection
    /// column.
    #[serde(default)]
    pub order_by_pk: bool,

    #[serde(default)]
    pub column_mappings: ColumnMappings,

    #[serde(default)]
    pub ignored_columns: IgnoreSet,

    /// Per-table source row offsets, applied positionally to the resolved
    /// selection.
    #[serde(default)]
    pub start_rows: Vec<u64>,

    /// Directory the run-result file is written into.
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,

    /// Raw selection tokens as given on the command line; empty means `all`.
    #[serde(default)]
    pub selection: Vec<String>,
}

impl SyncParameters {
    pub const DEFAULT_BATCH_SIZE: u64 = 100_000;
    pub const DEFAULT_THREADS: usize = 4;

    /// Checks the cross-field constraints the CLI cannot express.
    pub fn validate(&self) -> Result<(), ParameterError> {
        if self.batch_size == 0 {
            return Err(ParameterError::InvalidFieldValue {
                field: "batch_size".to_string(),
                constraint: "must be greater than 0".to_string(),
            });
        }
        if self.threads == 0 {
            return Err(ParameterError::InvalidFieldValue {
                field: "threads".to_string(),
                constraint: "must be greater than 0".to_string(),
            });
        }
        if self.deep_compare && !self.allow_no_pk {
            return Err(ParameterError::InvalidFieldValue {
                field: "deep_compare".to_string(),
                constraint: "only valid together with allow_no_pk".to_string(),
            });
        }

        Ok(())
    }
}

impl Default for SyncParameters {
    fn default() -> Self {
        Self {
            batch_size: default_batch_size(),
            threads: default_threads(),
            allow_no_pk: false,
            deep_compare: false,
            clear_target: false,
            target_columns_only: false,
            order_by_pk: false,
            column_mappings: ColumnMappings::default(),
            ignored_columns: IgnoreSet::default(),
            start_rows: Vec::new(),
            output_dir: default_output_dir(),
            selection: Vec::new(),
        }
    }
}

fn default_batch_size() -> u64 {
    SyncParameters::DEFAULT_BATCH_SIZE
}

fn default_threads() -> usize {
    SyncParameters::DEFAULT_THREADS
}

fn default_output_dir() -> PathBuf {
    PathBuf::from(".")
}

/// Parses the `--start-row` comma list into per-table offsets.
pub fn parse_start_rows(raw: &str) -> Result<Vec<u64>, ParameterError> {
    raw.split(',')
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .map(|part| {
            part.parse::<u64>()
                .map_err(|_| ParameterError::InvalidStartRow(part.to_string()))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_sane() {
        let params = SyncParameters::default();
        assert_eq!(params.batch_size, 100_000);
        assert_eq!(params.threads, 4);
        assert!(!params.clear_target);
        assert!(params.validate().is_ok());
    }

    #[test]
    fn deep_compare_requires_allow_no_pk() {
        let params = SyncParameters {
            deep_compare: true,
            ..Default::default()
        };
        assert!(params.validate().is_err());

        let params = SyncParameters {
            deep_compare: true,
            allow_no_pk: true,
            ..Default::default()
        };
        assert!(params.validate().is_ok());
    }

    #[test]
    fn zero_batch_size_is_rejected() {
        let params = SyncParameters {
            batch_size: 0,
            ..Default::default()
        };
        assert!(params.validate().is_err());
    }

    #[test]
    fn start_rows_parse() {
        assert_eq!(parse_start_rows("0,100, 2500").unwrap(), vec![0, 100, 2500]);
        assert_eq!(parse_start_rows("").unwrap(), Vec::<u64>::new());
        assert!(parse_start_rows("1,-2").is_err());
        assert!(parse_start_rows("abc").is_err());
    }

    #[test]
    fn parameters_serialize_in_pascal_case() {
        let params = SyncParameters::default();
        let json = serde_json::to_value(&params).unwrap();
        assert!(json.get("BatchSize").is_some());
        assert!(json.get("OrderByPk").is_some());
        assert!(json.get("batch_size").is_none());
    }
}
