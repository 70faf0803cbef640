//! The bulk-refresh path: discard the target's content and reload it from
//! the source.
//!
//! The clear step tries TRUNCATE first and falls back to a constraint-relaxed
//! DELETE. The load streams the full aliased projection from the source and
//! applies it in engine-batch-size chunks through the staging mechanism, one
//! transaction per chunk. This path only runs inside the warden's scope.

use futures::TryStreamExt;
use mssync_tds::{MssqlClient, SqlValue, TableRef, row_values};
use tiberius::QueryItem;
use tracing::{debug, warn};

use crate::concurrency::shutdown::{ShutdownRx, is_triggered};
use crate::error::{ErrorKind, SyncError, SyncResult};
use crate::sync::{TablePlan, sql, stage_rows};

/// How the path ended.
#[derive(Debug)]
pub enum RefreshOutcome {
    Completed {
        loaded: u64,
    },
    /// The clear step hit a structural condition (temporal history table,
    /// unresolved foreign-key reference); the table is left as it was.
    Skipped {
        reason: String,
    },
    /// Shutdown was requested between chunks.
    Interrupted {
        loaded: u64,
    },
}

enum ClearOutcome {
    Cleared,
    Skip(String),
}

/// Clears the target table and reloads it from the source.
pub async fn run(
    source: &mut MssqlClient,
    target: &mut MssqlClient,
    plan: &TablePlan,
    batch_size: u64,
    shutdown: &ShutdownRx,
) -> SyncResult<RefreshOutcome> {
    match clear_target(target, &plan.table).await? {
        ClearOutcome::Cleared => {}
        ClearOutcome::Skip(reason) => return Ok(RefreshOutcome::Skipped { reason }),
    }

    let select = sql::full_select(&plan.table, &plan.projection);
    let mut loaded: u64 = 0;
    let mut chunk: Vec<Vec<SqlValue>> = Vec::new();

    let mut stream = source.query_stream(&select, &[]).await?;
    while let Some(item) = stream.try_next().await? {
        let QueryItem::Row(row) = item else { continue };
        chunk.push(row_values(&row));

        if chunk.len() as u64 >= batch_size {
            loaded += load_chunk(target, plan, &chunk).await?;
            chunk.clear();
            debug!(table = %plan.table, loaded, "refresh chunk loaded");

            if is_triggered(shutdown) {
                warn!(table = %plan.table, loaded, "shutdown requested, interrupting refresh");
                return Ok(RefreshOutcome::Interrupted { loaded });
            }
        }
    }
    drop(stream);

    if !chunk.is_empty() {
        loaded += load_chunk(target, plan, &chunk).await?;
    }

    Ok(RefreshOutcome::Completed { loaded })
}

/// Empties the target table.
///
/// TRUNCATE needs no fallback on tables without incoming references. When it
/// fails, constraints are relaxed for a DELETE; a DELETE rejected because the
/// table is a temporal history table or still referenced is a structural
/// skip, not a failure.
async fn clear_target(target: &mut MssqlClient, table: &TableRef) -> SyncResult<ClearOutcome> {
    match target.execute(&sql::truncate(table), &[]).await {
        Ok(_) => return Ok(ClearOutcome::Cleared),
        Err(err) => {
            let err = SyncError::from(err);
            warn!(%table, error = %err, "truncate failed, falling back to delete");
        }
    }

    target
        .execute(&sql::nocheck_constraints(table), &[])
        .await?;
    let delete_result = target.execute(&sql::delete_all(table), &[]).await;
    if let Err(err) = target.execute(&sql::check_constraints(table), &[]).await {
        warn!(
            %table,
            error = %SyncError::from(err),
            "failed to re-enable constraints after delete"
        );
    }

    match delete_result {
        Ok(_) => Ok(ClearOutcome::Cleared),
        Err(err) => {
            let err = SyncError::from(err);
            match err.kind() {
                ErrorKind::TemporalHistoryWrite => Ok(ClearOutcome::Skip(
                    "cannot delete rows from a temporal history table".to_string(),
                )),
                ErrorKind::ConstraintConflict => Ok(ClearOutcome::Skip(
                    "delete blocked by an unresolved foreign-key reference".to_string(),
                )),
                _ => Err(err),
            }
        }
    }
}

/// Stages one chunk and inserts it unconditionally, in one transaction.
async fn load_chunk(
    target: &mut MssqlClient,
    plan: &TablePlan,
    rows: &[Vec<SqlValue>],
) -> SyncResult<u64> {
    let staging = sql::staging_name(&plan.table);

    target.begin_transaction().await?;
    match write_chunk(target, plan, rows, &staging).await {
        Ok(loaded) => {
            target.commit_transaction().await?;
            Ok(loaded)
        }
        Err(err) => {
            if let Err(rollback_err) = target.rollback_transaction().await {
                warn!(
                    table = %plan.table,
                    error = %SyncError::from(rollback_err),
                    "rollback failed after refresh chunk error"
                );
            }
            Err(err)
        }
    }
}

async fn write_chunk(
    target: &mut MssqlClient,
    plan: &TablePlan,
    rows: &[Vec<SqlValue>],
    staging: &str,
) -> SyncResult<u64> {
    stage_rows(target, staging, plan, rows).await?;

    let insert = sql::insert_from_staging(&plan.table, staging, &plan.projection);
    let loaded = if plan.identity_column.is_some() {
        target
            .execute(&sql::set_identity_insert(&plan.table, true), &[])
            .await?;
        let loaded = target.execute(&insert, &[]).await?;
        target
            .execute(&sql::set_identity_insert(&plan.table, false), &[])
            .await?;
        loaded
    } else {
        target.execute(&insert, &[]).await?
    };

    target.execute(&sql::drop_staging(staging), &[]).await?;

    Ok(loaded)
}
