//! Per-table driver: probe, reconcile, choose a path, run it, record the
//! outcome. Errors never propagate past this module; every terminal state
//! lands in the run report instead.

use std::sync::Arc;

use mssync_config::SyncParameters;
use mssync_tds::{MssqlClient, TableRef};
use tracing::{error, info, warn};

use crate::concurrency::shutdown::ShutdownRx;
use crate::error::{SyncError, SyncResult};
use crate::report::{RunReport, TableSyncResult};
use crate::retry::with_retries;
use crate::schema::{probe, reconcile};
use crate::sync::incremental::{self, IncrementalOutcome};
use crate::sync::refresh::{self, RefreshOutcome};
use crate::sync::{SyncKey, TablePlan};

/// One table's slice of the run.
#[derive(Debug, Clone)]
pub struct TableJob {
    pub table: TableRef,
    pub start_row_offset: u64,
}

/// Everything a table worker needs, cheap to clone per worker.
#[derive(Clone)]
pub struct TableContext {
    pub source_conn: String,
    pub target_conn: String,
    pub params: Arc<SyncParameters>,
    pub report: RunReport,
    pub shutdown: ShutdownRx,
}

/// Synchronizes one table and records its outcome in the run report.
///
/// The result is written through to disk both when the table starts running
/// and at its terminal state, so a crash leaves the report reflecting the
/// last finished table.
pub async fn sync_table<'a>(ctx: &'a TableContext, job: &'a TableJob) {
    let mut result = TableSyncResult::new(job.table.clone());
    result.start_row_offset = job.start_row_offset;
    result.begin();
    ctx.report.record_table(result.clone()).await;

    info!(table = %job.table, "starting table sync");

    if let Err(err) = run_table(ctx, job, &mut result).await {
        error!(
            table = %job.table,
            error = %err,
            class = %err.class(),
            "table sync failed"
        );
        result.fail(&err);
    }

    ctx.report.record_table(result.clone()).await;
}

async fn run_table(
    ctx: &TableContext,
    job: &TableJob,
    result: &mut TableSyncResult,
) -> SyncResult<()> {
    let params = &ctx.params;

    let mut source = with_retries("connect to source", async || {
        MssqlClient::connect(&ctx.source_conn, true)
            .await
            .map_err(SyncError::from)
    })
    .await?;
    let mut target = with_retries("connect to target", async || {
        MssqlClient::connect(&ctx.target_conn, false)
            .await
            .map_err(SyncError::from)
    })
    .await?;

    let source_columns = probe::columns(&mut source, &job.table).await?;
    let target_columns = probe::columns(&mut target, &job.table).await?;
    let pk_columns = probe::primary_key_columns(&mut source, &job.table).await?;

    let reconciled = reconcile(
        &job.table,
        &source_columns,
        &target_columns,
        &pk_columns,
        &params.column_mappings,
        &params.ignored_columns,
        params.target_columns_only,
    )?;
    result.schema_errors = Some(reconciled.drift.clone());

    // Counts are recorded but never used to skip the table: equal counts do
    // not imply equal content, and the anti-join already prevents duplicates.
    result.source_count = probe::count_rows(&mut source, &job.table).await?;
    result.target_count = probe::count_rows(&mut target, &job.table).await?;

    let identity_column = probe::identity_column(&mut target, &job.table)
        .await?
        .filter(|column| reconciled.projection.contains_target(column));

    if params.clear_target {
        let plan = TablePlan {
            table: job.table.clone(),
            projection: reconciled.projection.clone(),
            key: SyncKey::FullProjection,
            identity_column,
            source_count: result.source_count,
            start_row_offset: 0,
            order_by: Vec::new(),
        };

        let outcome = with_retries("refresh table", async || {
            refresh::run(
                &mut source,
                &mut target,
                &plan,
                params.batch_size,
                &ctx.shutdown,
            )
            .await
        })
        .await?;

        match outcome {
            RefreshOutcome::Completed { loaded } => {
                result.inserted = loaded;
                result.complete();
            }
            RefreshOutcome::Skipped { reason } => result.skip(reason),
            RefreshOutcome::Interrupted { loaded } => {
                result.inserted = loaded;
                result.skip("run cancelled before completion");
            }
        }

        return Ok(());
    }

    let key = if !reconciled.primary_key.is_empty() {
        SyncKey::PrimaryKey(reconciled.primary_key.clone())
    } else if !params.allow_no_pk {
        result.skip("table has no primary key (use --allow-no-pk with --deep-compare)");
        return Ok(());
    } else if !params.deep_compare {
        result.skip("table has no primary key and deep-compare is not enabled");
        return Ok(());
    } else {
        SyncKey::FullProjection
    };

    let order_by: Vec<String> = if params.order_by_pk && !reconciled.primary_key.is_empty() {
        reconciled
            .primary_key
            .iter()
            .map(|pair| pair.source.clone())
            .collect()
    } else {
        reconciled
            .projection
            .first()
            .map(|entry| vec![entry.source.clone()])
            .unwrap_or_default()
    };

    if job.start_row_offset > 0 && !params.order_by_pk {
        warn!(
            table = %job.table,
            "start-row offset without order-by-pk; the paging order may differ between runs"
        );
    }

    let plan = TablePlan {
        table: job.table.clone(),
        projection: reconciled.projection.clone(),
        key,
        identity_column,
        source_count: result.source_count,
        start_row_offset: job.start_row_offset,
        order_by,
    };

    let outcome = incremental::run(
        &mut source,
        &mut target,
        &plan,
        params.batch_size,
        &ctx.shutdown,
    )
    .await?;

    match outcome {
        IncrementalOutcome::Completed(totals) => {
            result.inserted = totals.inserted;
            result.skipped = totals.skipped;
            result.complete();
        }
        IncrementalOutcome::Interrupted(totals) => {
            result.inserted = totals.inserted;
            result.skipped = totals.skipped;
            result.skip("run cancelled before completion");
        }
    }

    Ok(())
}
