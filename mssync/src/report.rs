use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::{debug, error};
use uuid::Uuid;

use mssync_config::SyncParameters;
use mssync_tds::TableRef;

use crate::error::{ErrorClass, ErrorKind, SyncError, SyncResult};
use crate::sync_error;

/// Terminal and intermediate states of one table within a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TableStatus {
    Pending,
    Running,
    Completed,
    Failed,
    Skipped,
}

/// Overall state of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RunStatus {
    Running,
    Completed,
    Failed,
}

/// Advisory record of how the source and target schemas differed for one
/// table. Purely informational except for `schema_mismatch_details`, which
/// carries the message of a schema-classified failure.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct SchemaDrift {
    /// Source columns with no representable counterpart in the target.
    #[serde(default)]
    pub missing_columns_in_target: Vec<String>,
    /// Target columns not filled by any source column.
    #[serde(default)]
    pub missing_columns_in_source: Vec<String>,
    /// Computed and generated-always columns excluded from the projection.
    #[serde(default)]
    pub excluded_columns: Vec<String>,
    /// The columns the sync actually touched.
    #[serde(default)]
    pub common_columns: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schema_mismatch_details: Option<String>,
}

/// Outcome of one table within a run.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct TableSyncResult {
    pub table_name: TableRef,
    pub status: TableStatus,
    pub source_count: i64,
    pub target_count: i64,
    pub inserted: u64,
    pub skipped: u64,
    pub start_row_offset: u64,
    pub start_time: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_time: Option<DateTime<Utc>>,
    pub duration_seconds: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_details: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schema_errors: Option<SchemaDrift>,
}

impl TableSyncResult {
    pub fn new(table_name: TableRef) -> Self {
        Self {
            table_name,
            status: TableStatus::Pending,
            source_count: 0,
            target_count: 0,
            inserted: 0,
            skipped: 0,
            start_row_offset: 0,
            start_time: Utc::now(),
            end_time: None,
            duration_seconds: 0.0,
            error_message: None,
            error_type: None,
            error_details: None,
            schema_errors: None,
        }
    }

    /// Marks the table as running and stamps the start time.
    pub fn begin(&mut self) {
        self.status = TableStatus::Running;
        self.start_time = Utc::now();
    }

    pub fn complete(&mut self) {
        self.finish(TableStatus::Completed);
    }

    /// Marks the table as skipped with a human-readable reason.
    pub fn skip(&mut self, reason: impl Into<String>) {
        self.error_message = Some(reason.into());
        self.finish(TableStatus::Skipped);
    }

    /// Marks the table as failed or skipped according to the error class and
    /// stamps the error fields. Schema-classified errors additionally land in
    /// the drift record's mismatch details.
    pub fn fail(&mut self, err: &SyncError) {
        self.error_message = Some(err.description().to_string());
        self.error_type = Some(err.kind().as_str().to_string());
        self.error_details = err.detail().map(str::to_string);

        match err.class() {
            ErrorClass::Schema => {
                let drift = self.schema_errors.get_or_insert_with(SchemaDrift::default);
                drift.schema_mismatch_details = Some(err.to_string());
                self.finish(TableStatus::Failed);
            }
            ErrorClass::Structural => self.finish(TableStatus::Skipped),
            _ => self.finish(TableStatus::Failed),
        }
    }

    fn finish(&mut self, status: TableStatus) {
        let end = Utc::now();
        self.status = status;
        self.end_time = Some(end);
        self.duration_seconds = (end - self.start_time)
            .to_std()
            .map(|d| d.as_secs_f64())
            .unwrap_or(0.0);
    }
}

/// The full outcome of a run, serialized as the run-result file.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct RunResult {
    pub run_id: String,
    pub start_time: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_time: Option<DateTime<Utc>>,
    pub parameters: SyncParameters,
    pub status: RunStatus,
    pub tables: Vec<TableSyncResult>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
}

impl RunResult {
    pub fn new(parameters: SyncParameters) -> Self {
        Self {
            run_id: Uuid::new_v4().to_string(),
            start_time: Utc::now(),
            end_time: None,
            parameters,
            status: RunStatus::Running,
            tables: Vec::new(),
            warnings: Vec::new(),
        }
    }

    /// Inserts or replaces the entry for the result's table. At most one
    /// entry per qualified table name exists in a run.
    pub fn upsert_table(&mut self, result: TableSyncResult) {
        match self
            .tables
            .iter_mut()
            .find(|t| t.table_name == result.table_name)
        {
            Some(existing) => *existing = result,
            None => self.tables.push(result),
        }
    }

    pub fn table(&self, table: &TableRef) -> Option<&TableSyncResult> {
        self.tables.iter().find(|t| &t.table_name == table)
    }

    pub fn count_with_status(&self, status: TableStatus) -> usize {
        self.tables.iter().filter(|t| t.status == status).count()
    }
}

struct RunReportInner {
    result: RunResult,
    path: PathBuf,
}

/// Shared, persisted handle to the run result.
///
/// All updates from parallel table workers serialize through one mutex, and
/// the result file is rewritten in full after every table completes, so a
/// crash leaves the file reflecting the last finished table.
#[derive(Clone)]
pub struct RunReport {
    inner: Arc<Mutex<RunReportInner>>,
}

impl RunReport {
    /// Creates the report, its output directory and the initial result file.
    pub async fn create(parameters: SyncParameters, output_dir: &Path) -> SyncResult<Self> {
        let result = RunResult::new(parameters);
        let file_name = format!(
            "sync-result-{}.json",
            result.start_time.format("%Y%m%d_%H%M%S")
        );
        let path = output_dir.join(file_name);

        tokio::fs::create_dir_all(output_dir).await.map_err(|err| {
            sync_error!(
                ErrorKind::ReportIo,
                "Could not create the output directory",
                err
            )
        })?;

        let inner = RunReportInner { result, path };
        Self::persist(&inner).await?;

        Ok(Self {
            inner: Arc::new(Mutex::new(inner)),
        })
    }

    /// Path of the result file.
    pub async fn path(&self) -> PathBuf {
        self.inner.lock().await.path.clone()
    }

    /// Records a table outcome and rewrites the result file.
    ///
    /// Persistence failures are logged but do not fail the table: the run
    /// result still exists in memory and is written again at the next
    /// boundary.
    pub async fn record_table(&self, result: TableSyncResult) {
        let mut inner = self.inner.lock().await;
        debug!(table = %result.table_name, status = ?result.status, "recording table result");
        inner.result.upsert_table(result);
        if let Err(err) = Self::persist(&inner).await {
            error!(error = %err, "failed to persist run result");
        }
    }

    pub async fn add_warnings(&self, warnings: Vec<String>) {
        if warnings.is_empty() {
            return;
        }
        let mut inner = self.inner.lock().await;
        inner.result.warnings.extend(warnings);
    }

    /// Sets the terminal status, writes the file once more and returns the
    /// final snapshot.
    pub async fn finalize(&self, status: RunStatus) -> SyncResult<RunResult> {
        let mut inner = self.inner.lock().await;
        inner.result.status = status;
        inner.result.end_time = Some(Utc::now());
        Self::persist(&inner).await?;
        Ok(inner.result.clone())
    }

    /// Current in-memory snapshot of the run result.
    pub async fn snapshot(&self) -> RunResult {
        self.inner.lock().await.result.clone()
    }

    async fn persist(inner: &RunReportInner) -> SyncResult<()> {
        let json = serde_json::to_string_pretty(&inner.result).map_err(|err| {
            sync_error!(ErrorKind::ReportIo, "Could not serialize the run result", err)
        })?;
        tokio::fs::write(&inner.path, json).await.map_err(|err| {
            sync_error!(ErrorKind::ReportIo, "Could not write the run result file", err)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table_result(name: &str, status: TableStatus) -> TableSyncResult {
        let mut result = TableSyncResult::new(TableRef::parse(name));
        result.status = status;
        result
    }

    #[test]
    fn upsert_keeps_one_entry_per_table() {
        let mut run = RunResult::new(SyncParameters::default());
        run.upsert_table(table_result("dbo.Users", TableStatus::Running));
        run.upsert_table(table_result("DBO.USERS", TableStatus::Completed));
        run.upsert_table(table_result("dbo.Orders", TableStatus::Completed));

        assert_eq!(run.tables.len(), 2);
        assert_eq!(
            run.table(&TableRef::parse("dbo.Users")).unwrap().status,
            TableStatus::Completed
        );
    }

    #[test]
    fn fail_routes_by_error_class() {
        let mut result = table_result("dbo.T", TableStatus::Running);
        result.fail(&sync_error!(ErrorKind::InvalidColumn, "sql server error"));
        assert_eq!(result.status, TableStatus::Failed);
        assert_eq!(result.error_type.as_deref(), Some("InvalidColumn"));
        let drift = result.schema_errors.unwrap();
        assert!(drift.schema_mismatch_details.is_some());

        let mut result = table_result("dbo.T", TableStatus::Running);
        result.fail(&sync_error!(
            ErrorKind::TemporalHistoryWrite,
            "cannot delete from history table"
        ));
        assert_eq!(result.status, TableStatus::Skipped);

        let mut result = table_result("dbo.T", TableStatus::Running);
        result.fail(&sync_error!(ErrorKind::QueryFailed, "boom"));
        assert_eq!(result.status, TableStatus::Failed);
        assert!(result.schema_errors.is_none());
    }

    #[test]
    fn result_serializes_with_pascal_case_schema() {
        let mut run = RunResult::new(SyncParameters::default());
        let mut table = table_result("dbo.Users", TableStatus::Completed);
        table.inserted = 2;
        table.skipped = 1;
        run.upsert_table(table);

        let json = serde_json::to_value(&run).unwrap();
        assert!(json.get("RunId").is_some());
        assert!(json.get("StartTime").is_some());
        assert!(json.get("Parameters").is_some());
        assert_eq!(json["Status"], "Running");

        let entry = &json["Tables"][0];
        assert_eq!(entry["TableName"], "dbo.Users");
        assert_eq!(entry["Status"], "Completed");
        assert_eq!(entry["Inserted"], 2);
        assert_eq!(entry["Skipped"], 1);
        assert!(entry.get("SourceCount").is_some());
        assert!(entry.get("StartRowOffset").is_some());
        // Optional fields stay absent until set.
        assert!(entry.get("ErrorMessage").is_none());
        assert!(entry.get("SchemaErrors").is_none());
    }

    #[test]
    fn skip_records_the_reason() {
        let mut result = table_result("dbo.T", TableStatus::Running);
        result.skip("table has no primary key");
        assert_eq!(result.status, TableStatus::Skipped);
        assert_eq!(
            result.error_message.as_deref(),
            Some("table has no primary key")
        );
        assert!(result.end_time.is_some());
    }
}
