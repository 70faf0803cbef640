//! Per-table synchronization paths and their orchestration.

pub mod incremental;
pub mod refresh;
pub mod sql;
pub mod table;

use mssync_tds::{MssqlClient, SqlValue, TableRef};
use tiberius::TokenRow;

use crate::error::SyncResult;
use crate::schema::{ColumnPair, Projection};

/// How staged rows are matched against the target.
#[derive(Debug, Clone)]
pub enum SyncKey {
    /// The primary key, translated to target-space column names.
    PrimaryKey(Vec<ColumnPair>),
    /// Deep compare: the full projection tuple.
    FullProjection,
}

/// Everything a sync path needs to know about one table.
#[derive(Debug, Clone)]
pub struct TablePlan {
    pub table: TableRef,
    pub projection: Projection,
    pub key: SyncKey,
    /// The target's identity column, when the projection writes it.
    pub identity_column: Option<String>,
    pub source_count: i64,
    pub start_row_offset: u64,
    /// Source column names the paging ORDER BY uses.
    pub order_by: Vec<String>,
}

/// Creates a staging table cloned from the target and bulk-loads one batch
/// of rows into it. The staging table lives inside the caller's transaction.
pub(crate) async fn stage_rows(
    target: &mut MssqlClient,
    staging: &str,
    plan: &TablePlan,
    rows: &[Vec<SqlValue>],
) -> SyncResult<()> {
    target
        .execute(&sql::staging_clone(staging, &plan.table, &plan.projection), &[])
        .await?;

    let mut bulk = target.bulk_insert(staging).await?;
    for row in rows {
        let mut token = TokenRow::new();
        for value in row {
            token.push(value.clone().into_sql());
        }
        bulk.send(token).await?;
    }
    bulk.finalize().await?;

    Ok(())
}
