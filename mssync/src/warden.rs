//! Scoped suspension of foreign keys and system versioning around a
//! bulk-refresh run.
//!
//! The disable set is deliberately the whole target database, not just the
//! selection: selected tables can be children of unselected parents. Disable
//! and restore failures are collected as warnings rather than failing the
//! run; the coordinator guarantees [`WardenGuard::release`] runs on every
//! exit path.

use mssync_tds::{MssqlClient, TableRef};
use tracing::{info, warn};

use crate::error::{SyncError, SyncResult};
use crate::schema::probe;
use crate::sync::sql;

/// Remembers what was disabled so release can restore it.
#[must_use = "the warden must be released to restore constraints and versioning"]
pub struct WardenGuard {
    fk_tables: Vec<TableRef>,
    temporal_pairs: Vec<(TableRef, TableRef)>,
    warnings: Vec<String>,
}

/// Disables all foreign keys in the target and system versioning for every
/// temporal base in the selection (including the base partner of a selected
/// history table).
pub async fn engage(client: &mut MssqlClient, selection: &[TableRef]) -> SyncResult<WardenGuard> {
    let fk_tables = probe::base_tables(client).await?;
    let mut warnings = Vec::new();

    for table in &fk_tables {
        if let Err(err) = client.execute(&sql::nocheck_constraints(table), &[]).await {
            let err = SyncError::from(err);
            warn!(%table, error = %err, "failed to disable constraints");
            warnings.push(format!("failed to disable constraints on {table}: {err}"));
        }
    }

    // Constraints are already down at this point, so a temporal-topology
    // probe failure degrades to a warning instead of aborting with foreign
    // keys left unchecked.
    let mut temporal_pairs: Vec<(TableRef, TableRef)> = Vec::new();
    for table in selection {
        match temporal_pair_for(client, table).await {
            Ok(Some((base, history))) => push_pair(&mut temporal_pairs, base, history),
            Ok(None) => {}
            Err(err) => {
                warn!(%table, error = %err, "failed to probe temporal topology");
                warnings.push(format!("failed to probe temporal topology of {table}: {err}"));
            }
        }
    }

    for (base, _) in &temporal_pairs {
        if let Err(err) = client.execute(&sql::versioning_off(base), &[]).await {
            let err = SyncError::from(err);
            warn!(table = %base, error = %err, "failed to disable system versioning");
            warnings.push(format!(
                "failed to disable system versioning on {base}: {err}"
            ));
        }
    }

    info!(
        constrained_tables = fk_tables.len(),
        temporal_tables = temporal_pairs.len(),
        "constraint/temporal warden engaged"
    );

    Ok(WardenGuard {
        fk_tables,
        temporal_pairs,
        warnings,
    })
}

/// The (base, history) pair `table` belongs to, whether it is the base table
/// itself or a selected history table whose base must be unversioned.
async fn temporal_pair_for(
    client: &mut MssqlClient,
    table: &TableRef,
) -> SyncResult<Option<(TableRef, TableRef)>> {
    if let Some(history) = probe::temporal_history_of(client, table).await? {
        return Ok(Some((table.clone(), history)));
    }
    if let Some(base) = probe::temporal_base_of(client, table).await? {
        if let Some(history) = probe::temporal_history_of(client, &base).await? {
            return Ok(Some((base, history)));
        }
    }
    Ok(None)
}

fn push_pair(pairs: &mut Vec<(TableRef, TableRef)>, base: TableRef, history: TableRef) {
    if !pairs.iter().any(|(existing, _)| existing == &base) {
        pairs.push((base, history));
    }
}

impl WardenGuard {
    /// Restores system versioning and re-enables every foreign key, returning
    /// all warnings collected across the warden's scope. Never fails: a
    /// restore problem is a warning in the run report, not a run failure.
    pub async fn release(mut self, client: &mut MssqlClient) -> Vec<String> {
        for (base, history) in &self.temporal_pairs {
            if let Err(err) = client.execute(&sql::versioning_on(base, history), &[]).await {
                let err = SyncError::from(err);
                warn!(table = %base, error = %err, "failed to restore system versioning");
                self.warnings.push(format!(
                    "failed to restore system versioning on {base}: {err}"
                ));
            }
        }

        for table in &self.fk_tables {
            if let Err(err) = client.execute(&sql::check_constraints(table), &[]).await {
                let err = SyncError::from(err);
                warn!(%table, error = %err, "failed to re-enable constraints");
                self.warnings
                    .push(format!("failed to re-enable constraints on {table}: {err}"));
            }
        }

        info!(
            constrained_tables = self.fk_tables.len(),
            temporal_tables = self.temporal_pairs.len(),
            warnings = self.warnings.len(),
            "constraint/temporal warden released"
        );

        self.warnings
    }
}
