use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use mssync_config::{SyncParameters, parse_start_rows};

/// One-way incremental bulk replication between SQL Server databases.
///
/// Inserts into the target every source row whose primary key is absent from
/// the target; never updates or deletes existing rows unless --clear-target
/// is given.
#[derive(Parser, Debug)]
#[command(name = "mssync", version, about, long_about = None)]
pub struct Args {
    /// Source server host name
    pub source_host: Option<String>,
    /// Source database name
    pub source_db: Option<String>,
    /// Target server host name
    pub target_host: Option<String>,
    /// Target database name
    pub target_db: Option<String>,
    /// Comma-separated selection: `all`/`*`, `schema.table`, a schema name,
    /// or a bare table name matching `dbo.<name>`. Empty means all.
    pub table_selection: Option<String>,

    /// Rows per batch (also the bulk-refresh load chunk size)
    #[arg(long, default_value_t = SyncParameters::DEFAULT_BATCH_SIZE)]
    pub batch_size: u64,

    /// Tables synced concurrently within one execution level
    #[arg(long, default_value_t = SyncParameters::DEFAULT_THREADS)]
    pub threads: usize,

    /// Full source connection string; overrides source host/database
    #[arg(long)]
    pub source_conn: Option<String>,

    /// Full target connection string; overrides target host/database
    #[arg(long)]
    pub target_conn: Option<String>,

    /// Permit syncing tables without a primary key (requires --deep-compare)
    #[arg(long)]
    pub allow_no_pk: bool,

    /// Anti-join on the full projection tuple; only valid with --allow-no-pk
    #[arg(long)]
    pub deep_compare: bool,

    /// Truncate-and-reload every selected table instead of inserting
    /// missing rows
    #[arg(long)]
    pub clear_target: bool,

    /// Restrict the projection to columns that exist in the target
    #[arg(long)]
    pub target_columns_only: bool,

    /// Drop a column from the projection; `schema.table.col`, `table.col`
    /// or `col` (global)
    #[arg(long = "ignore-column", value_name = "COLUMN")]
    pub ignore_columns: Vec<String>,

    /// Map a source column to a target column; `schema.table.src=tgt` or
    /// `table.src=tgt`
    #[arg(long = "map-column", value_name = "MAPPING")]
    pub map_columns: Vec<String>,

    /// Comma list of non-negative start offsets, one per selected table,
    /// applied positionally
    #[arg(long, value_name = "OFFSETS")]
    pub start_row: Option<String>,

    /// Page the source by primary-key order (recommended with --start-row)
    #[arg(long)]
    pub order_by_pk: bool,

    /// Directory for run-result files
    #[arg(long, default_value = ".")]
    pub output_dir: PathBuf,

    /// Read-only comparison of row counts and column sets; writes nothing
    #[arg(long)]
    pub compare_counts_and_schema: bool,
}

impl Args {
    /// Builds the engine parameter bundle from the parsed arguments.
    pub fn to_parameters(&self) -> anyhow::Result<SyncParameters> {
        let mut params = SyncParameters {
            batch_size: self.batch_size,
            threads: self.threads,
            allow_no_pk: self.allow_no_pk,
            deep_compare: self.deep_compare,
            clear_target: self.clear_target,
            target_columns_only: self.target_columns_only,
            order_by_pk: self.order_by_pk,
            output_dir: self.output_dir.clone(),
            selection: self
                .table_selection
                .as_deref()
                .unwrap_or_default()
                .split(',')
                .map(str::trim)
                .filter(|token| !token.is_empty())
                .map(str::to_string)
                .collect(),
            ..Default::default()
        };

        for directive in &self.map_columns {
            params
                .column_mappings
                .add_directive(directive)
                .with_context(|| format!("--map-column {directive}"))?;
        }
        for directive in &self.ignore_columns {
            params
                .ignored_columns
                .add_directive(directive)
                .with_context(|| format!("--ignore-column {directive}"))?;
        }
        if let Some(raw) = &self.start_row {
            params.start_rows = parse_start_rows(raw).context("--start-row")?;
        }

        params.validate()?;
        Ok(params)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(argv: &[&str]) -> Args {
        Args::try_parse_from(std::iter::once("mssync").chain(argv.iter().copied())).unwrap()
    }

    #[test]
    fn positional_arguments_parse_in_order() {
        let args = parse(&["src-host", "SrcDb", "tgt-host", "TgtDb", "dbo.Users,sales"]);
        assert_eq!(args.source_host.as_deref(), Some("src-host"));
        assert_eq!(args.target_db.as_deref(), Some("TgtDb"));

        let params = args.to_parameters().unwrap();
        assert_eq!(params.selection, vec!["dbo.Users", "sales"]);
    }

    #[test]
    fn repeatable_options_accumulate() {
        let args = parse(&[
            "--map-column",
            "dbo.U.Id=UserId",
            "--map-column",
            "dbo.U.FullName=DisplayName",
            "--ignore-column",
            "Secret",
        ]);
        let params = args.to_parameters().unwrap();
        assert_eq!(params.column_mappings.target_for("dbo.u", "id"), Some("UserId"));
        assert!(params.ignored_columns.contains("dbo.u", "secret"));
    }

    #[test]
    fn start_row_parses_as_comma_list() {
        let args = parse(&["--start-row", "9000000,0"]);
        let params = args.to_parameters().unwrap();
        assert_eq!(params.start_rows, vec![9_000_000, 0]);
    }

    #[test]
    fn deep_compare_without_allow_no_pk_is_rejected() {
        let args = parse(&["--deep-compare"]);
        assert!(args.to_parameters().is_err());
    }

    #[test]
    fn defaults_match_the_engine_defaults() {
        let args = parse(&[]);
        let params = args.to_parameters().unwrap();
        assert_eq!(params.batch_size, 100_000);
        assert_eq!(params.threads, 4);
        assert!(params.selection.is_empty());
    }
}
