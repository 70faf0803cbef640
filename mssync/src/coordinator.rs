//! The run coordinator: enumerates and selects tables, plans execution
//! levels over the foreign-key graph, fans table workers out with bounded
//! concurrency within a level, and owns the run report for the lifetime of
//! the run.
//!
//! Levels are strictly sequential, so every table in level `n` observes all
//! writes from level `n - 1`. When the bulk-refresh path is selected the
//! whole run executes inside the warden's scope, and the warden is released
//! on every exit path, including cancellation and per-table failures.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use mssync_config::SyncParameters;
use mssync_tds::{MssqlClient, TableRef};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

use crate::concurrency::shutdown::{ShutdownRx, is_triggered};
use crate::error::{ErrorKind, SyncError, SyncResult};
use crate::planner;
use crate::report::{RunReport, RunResult, RunStatus, TableStatus};
use crate::retry::with_retries;
use crate::schema::probe;
use crate::selection;
use crate::sync::table::{TableContext, TableJob, sync_table};
use crate::sync_error;
use crate::warden;

/// Final state of a run: the full result and where it was written.
pub struct RunOutcome {
    pub result: RunResult,
    pub report_path: PathBuf,
}

/// Executes a complete sync run.
///
/// The returned error reflects only coordinator-level failures (parameter
/// validation, planning, warden engagement, report I/O); per-table outcomes
/// live in the run result regardless.
pub async fn execute_run(
    source_conn: &str,
    target_conn: &str,
    params: SyncParameters,
    shutdown: ShutdownRx,
) -> SyncResult<RunOutcome> {
    params
        .validate()
        .map_err(|err| sync_error!(ErrorKind::ConfigError, "Invalid sync parameters", err))?;

    let report = RunReport::create(params.clone(), &params.output_dir).await?;
    let run = run_inner(source_conn, target_conn, &params, &report, shutdown).await;

    let status = if run.is_ok() {
        RunStatus::Completed
    } else {
        RunStatus::Failed
    };
    let result = report.finalize(status).await?;
    run?;

    info!(
        run_id = %result.run_id,
        completed = result.count_with_status(TableStatus::Completed),
        failed = result.count_with_status(TableStatus::Failed),
        skipped = result.count_with_status(TableStatus::Skipped),
        "sync run finished"
    );

    Ok(RunOutcome {
        report_path: report.path().await,
        result,
    })
}

async fn run_inner(
    source_conn: &str,
    target_conn: &str,
    params: &SyncParameters,
    report: &RunReport,
    shutdown: ShutdownRx,
) -> SyncResult<()> {
    let mut source = with_retries("connect to source", async || {
        MssqlClient::connect(source_conn, true)
            .await
            .map_err(SyncError::from)
    })
    .await?;
    let mut target = with_retries("connect to target", async || {
        MssqlClient::connect(target_conn, false)
            .await
            .map_err(SyncError::from)
    })
    .await?;

    let source_tables = probe::base_tables(&mut source).await?;
    let target_tables = probe::base_tables(&mut target).await?;
    let selected = selection::resolve(&params.selection, &source_tables, &target_tables);

    if selected.is_empty() {
        warn!("selection matched no tables present in both source and target");
        return Ok(());
    }

    // Start-row offsets apply positionally to the resolved selection.
    let jobs: HashMap<TableRef, TableJob> = selected
        .iter()
        .enumerate()
        .map(|(index, table)| {
            (
                table.clone(),
                TableJob {
                    table: table.clone(),
                    start_row_offset: params.start_rows.get(index).copied().unwrap_or(0),
                },
            )
        })
        .collect();

    let edges = probe::foreign_keys(&mut target).await?;
    let levels = planner::plan_levels(&selected, &edges);
    info!(
        tables = selected.len(),
        levels = levels.len(),
        "planned execution levels"
    );

    let warden_guard = if params.clear_target {
        Some(warden::engage(&mut target, &selected).await?)
    } else {
        None
    };

    let dispatch = run_levels(
        source_conn,
        target_conn,
        params,
        report,
        &shutdown,
        &levels,
        &jobs,
    )
    .await;

    if let Some(guard) = warden_guard {
        let warnings = guard.release(&mut target).await;
        report.add_warnings(warnings).await;
    }

    dispatch
}

#[expect(clippy::too_many_arguments)]
async fn run_levels(
    source_conn: &str,
    target_conn: &str,
    params: &SyncParameters,
    report: &RunReport,
    shutdown: &ShutdownRx,
    levels: &[Vec<TableRef>],
    jobs: &HashMap<TableRef, TableJob>,
) -> SyncResult<()> {
    let params = Arc::new(params.clone());

    for (index, level) in levels.iter().enumerate() {
        if is_triggered(shutdown) {
            warn!(
                level = index,
                "shutdown requested, aborting dispatch of remaining levels"
            );
            break;
        }

        info!(level = index, tables = level.len(), "starting execution level");

        let semaphore = Arc::new(Semaphore::new(params.threads));
        let mut workers: JoinSet<TableRef> = JoinSet::new();

        for table in level {
            let Some(job) = jobs.get(table) else {
                continue;
            };

            let permit = semaphore
                .clone()
                .acquire_owned()
                .await
                .map_err(|err| {
                    sync_error!(
                        ErrorKind::WorkerPoolFailed,
                        "Could not acquire a worker slot",
                        err
                    )
                })?;

            let ctx = TableContext {
                source_conn: source_conn.to_string(),
                target_conn: target_conn.to_string(),
                params: params.clone(),
                report: report.clone(),
                shutdown: shutdown.clone(),
            };
            let job = job.clone();

            workers.spawn(Box::pin(async move {
                let table = job.table.clone();
                sync_table(&ctx, &job).await;
                drop(permit);
                table
            }));
        }

        // The level must drain before the next one starts: children may only
        // run once every parent insert is committed.
        while let Some(joined) = workers.join_next().await {
            match joined {
                Ok(table) => debug!(%table, "table worker finished"),
                Err(join_err) if join_err.is_cancelled() => {
                    debug!("table worker cancelled");
                }
                Err(join_err) => {
                    error!(error = %join_err, "table worker panicked");
                }
            }
        }
    }

    Ok(())
}
