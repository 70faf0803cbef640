//! Retry-wrapped metadata probe over the raw catalog queries.
//!
//! Every probe routes through the retry policy, so a transient hiccup while
//! reading `INFORMATION_SCHEMA` does not fail a table before any data moved.

use mssync_tds::{ColumnInfo, ForeignKey, MssqlClient, TableRef, metadata};

use crate::error::{SyncError, SyncResult};
use crate::retry::with_retries;

pub async fn base_tables(client: &mut MssqlClient) -> SyncResult<Vec<TableRef>> {
    with_retries("list base tables", async || {
        metadata::base_tables(&mut *client).await.map_err(SyncError::from)
    })
    .await
}

pub async fn columns(client: &mut MssqlClient, table: &TableRef) -> SyncResult<Vec<ColumnInfo>> {
    with_retries("list columns", async || {
        metadata::columns(&mut *client, table).await.map_err(SyncError::from)
    })
    .await
}

pub async fn primary_key_columns(
    client: &mut MssqlClient,
    table: &TableRef,
) -> SyncResult<Vec<String>> {
    with_retries("read primary key", async || {
        metadata::primary_key_columns(&mut *client, table)
            .await
            .map_err(SyncError::from)
    })
    .await
}

pub async fn identity_column(
    client: &mut MssqlClient,
    table: &TableRef,
) -> SyncResult<Option<String>> {
    with_retries("read identity column", async || {
        metadata::identity_column(&mut *client, table)
            .await
            .map_err(SyncError::from)
    })
    .await
}

pub async fn temporal_history_of(
    client: &mut MssqlClient,
    table: &TableRef,
) -> SyncResult<Option<TableRef>> {
    with_retries("read temporal topology", async || {
        metadata::temporal_history_of(&mut *client, table)
            .await
            .map_err(SyncError::from)
    })
    .await
}

pub async fn temporal_base_of(
    client: &mut MssqlClient,
    table: &TableRef,
) -> SyncResult<Option<TableRef>> {
    with_retries("read temporal topology", async || {
        metadata::temporal_base_of(&mut *client, table)
            .await
            .map_err(SyncError::from)
    })
    .await
}

pub async fn foreign_keys(client: &mut MssqlClient) -> SyncResult<Vec<ForeignKey>> {
    with_retries("list foreign keys", async || {
        metadata::foreign_keys(&mut *client).await.map_err(SyncError::from)
    })
    .await
}

pub async fn count_rows(client: &mut MssqlClient, table: &TableRef) -> SyncResult<i64> {
    with_retries("count rows", async || {
        metadata::count_rows(&mut *client, table)
            .await
            .map_err(SyncError::from)
    })
    .await
}
