//! Raw catalog queries against `INFORMATION_SCHEMA` and `sys.*` views.
//!
//! These return driver errors untouched; the sync engine wraps each call in
//! its retry policy and classifies failures there.

use crate::client::MssqlClient;
use crate::types::{ColumnInfo, ForeignKey, TableRef};

/// Lists every base table in the database.
pub async fn base_tables(
    client: &mut MssqlClient,
) -> Result<Vec<TableRef>, tiberius::error::Error> {
    const SQL: &str = "SELECT TABLE_SCHEMA, TABLE_NAME \
         FROM INFORMATION_SCHEMA.TABLES \
         WHERE TABLE_TYPE = 'BASE TABLE' \
         ORDER BY TABLE_SCHEMA, TABLE_NAME";

    let rows = client.query(SQL, &[]).await?;
    Ok(rows
        .iter()
        .filter_map(|row| {
            let schema = row.try_get::<&str, _>(0).ok().flatten()?;
            let name = row.try_get::<&str, _>(1).ok().flatten()?;
            Some(TableRef::new(schema, name))
        })
        .collect())
}

/// Primary-key column names of `table`, in key ordinal order. Empty when the
/// table has no primary key.
pub async fn primary_key_columns(
    client: &mut MssqlClient,
    table: &TableRef,
) -> Result<Vec<String>, tiberius::error::Error> {
    const SQL: &str = "SELECT kcu.COLUMN_NAME \
         FROM INFORMATION_SCHEMA.KEY_COLUMN_USAGE kcu \
         JOIN INFORMATION_SCHEMA.TABLE_CONSTRAINTS tc \
           ON tc.CONSTRAINT_NAME = kcu.CONSTRAINT_NAME \
          AND tc.TABLE_SCHEMA = kcu.TABLE_SCHEMA \
          AND tc.TABLE_NAME = kcu.TABLE_NAME \
         WHERE tc.CONSTRAINT_TYPE = 'PRIMARY KEY' \
           AND kcu.TABLE_SCHEMA = @P1 AND kcu.TABLE_NAME = @P2 \
         ORDER BY kcu.ORDINAL_POSITION";

    let rows = client
        .query(SQL, &[&table.schema(), &table.name()])
        .await?;
    Ok(rows
        .iter()
        .filter_map(|row| {
            row.try_get::<&str, _>(0)
                .ok()
                .flatten()
                .map(str::to_string)
        })
        .collect())
}

/// All columns of `table` in ordinal order, with identity/computed/generated
/// flags. Callers decide which columns are projectable.
pub async fn columns(
    client: &mut MssqlClient,
    table: &TableRef,
) -> Result<Vec<ColumnInfo>, tiberius::error::Error> {
    const SQL: &str = "SELECT c.name, c.column_id, c.is_identity, c.is_computed, \
                c.generated_always_type \
         FROM sys.columns c \
         JOIN sys.tables t ON t.object_id = c.object_id \
         JOIN sys.schemas s ON s.schema_id = t.schema_id \
         WHERE s.name = @P1 AND t.name = @P2 \
         ORDER BY c.column_id";

    let rows = client
        .query(SQL, &[&table.schema(), &table.name()])
        .await?;
    Ok(rows
        .iter()
        .filter_map(|row| {
            let name = row.try_get::<&str, _>(0).ok().flatten()?.to_string();
            let ordinal = row.try_get::<i32, _>(1).ok().flatten()?;
            let is_identity = row.try_get::<bool, _>(2).ok().flatten().unwrap_or(false);
            let is_computed = row.try_get::<bool, _>(3).ok().flatten().unwrap_or(false);
            let generated = row.try_get::<u8, _>(4).ok().flatten().unwrap_or(0);
            Some(ColumnInfo {
                name,
                ordinal,
                is_identity,
                is_computed,
                is_generated_always: generated != 0,
            })
        })
        .collect())
}

/// Name of the identity column of `table`, if it has one.
pub async fn identity_column(
    client: &mut MssqlClient,
    table: &TableRef,
) -> Result<Option<String>, tiberius::error::Error> {
    const SQL: &str = "SELECT c.name \
         FROM sys.columns c \
         JOIN sys.tables t ON t.object_id = c.object_id \
         JOIN sys.schemas s ON s.schema_id = t.schema_id \
         WHERE s.name = @P1 AND t.name = @P2 AND c.is_identity = 1";

    let row = client
        .query_row(SQL, &[&table.schema(), &table.name()])
        .await?;
    Ok(row.and_then(|r| r.try_get::<&str, _>(0).ok().flatten().map(str::to_string)))
}

/// If `table` is a system-versioned base table, returns its history table.
pub async fn temporal_history_of(
    client: &mut MssqlClient,
    table: &TableRef,
) -> Result<Option<TableRef>, tiberius::error::Error> {
    const SQL: &str = "SELECT hs.name, h.name \
         FROM sys.tables t \
         JOIN sys.schemas s ON s.schema_id = t.schema_id \
         JOIN sys.tables h ON h.object_id = t.history_table_id \
         JOIN sys.schemas hs ON hs.schema_id = h.schema_id \
         WHERE s.name = @P1 AND t.name = @P2 AND t.temporal_type = 2";

    let row = client
        .query_row(SQL, &[&table.schema(), &table.name()])
        .await?;
    Ok(row.and_then(|r| {
        let schema = r.try_get::<&str, _>(0).ok().flatten()?;
        let name = r.try_get::<&str, _>(1).ok().flatten()?;
        Some(TableRef::new(schema, name))
    }))
}

/// If `table` is a temporal history table, returns the base table it backs.
pub async fn temporal_base_of(
    client: &mut MssqlClient,
    table: &TableRef,
) -> Result<Option<TableRef>, tiberius::error::Error> {
    const SQL: &str = "SELECT bs.name, b.name \
         FROM sys.tables b \
         JOIN sys.schemas bs ON bs.schema_id = b.schema_id \
         JOIN sys.tables h ON h.object_id = b.history_table_id \
         JOIN sys.schemas hs ON hs.schema_id = h.schema_id \
         WHERE hs.name = @P1 AND h.name = @P2 AND b.temporal_type = 2";

    let row = client
        .query_row(SQL, &[&table.schema(), &table.name()])
        .await?;
    Ok(row.and_then(|r| {
        let schema = r.try_get::<&str, _>(0).ok().flatten()?;
        let name = r.try_get::<&str, _>(1).ok().flatten()?;
        Some(TableRef::new(schema, name))
    }))
}

/// Every enabled foreign-key edge in the database, child → parent.
pub async fn foreign_keys(
    client: &mut MssqlClient,
) -> Result<Vec<ForeignKey>, tiberius::error::Error> {
    const SQL: &str = "SELECT cs.name, ct.name, ps.name, pt.name \
         FROM sys.foreign_keys fk \
         JOIN sys.tables ct ON ct.object_id = fk.parent_object_id \
         JOIN sys.schemas cs ON cs.schema_id = ct.schema_id \
         JOIN sys.tables pt ON pt.object_id = fk.referenced_object_id \
         JOIN sys.schemas ps ON ps.schema_id = pt.schema_id \
         WHERE fk.is_disabled = 0";

    let rows = client.query(SQL, &[]).await?;
    Ok(rows
        .iter()
        .filter_map(|row| {
            let child_schema = row.try_get::<&str, _>(0).ok().flatten()?;
            let child_name = row.try_get::<&str, _>(1).ok().flatten()?;
            let parent_schema = row.try_get::<&str, _>(2).ok().flatten()?;
            let parent_name = row.try_get::<&str, _>(3).ok().flatten()?;
            Some(ForeignKey {
                child: TableRef::new(child_schema, child_name),
                parent: TableRef::new(parent_schema, parent_name),
            })
        })
        .collect())
}

/// Exact row count of `table`.
pub async fn count_rows(
    client: &mut MssqlClient,
    table: &TableRef,
) -> Result<i64, tiberius::error::Error> {
    let sql = format!("SELECT COUNT_BIG(*) FROM {}", table.bracketed());
    let row = client.query_row(&sql, &[]).await?;
    Ok(row
        .and_then(|r| r.try_get::<i64, _>(0).ok().flatten())
        .unwrap_or(0))
}
