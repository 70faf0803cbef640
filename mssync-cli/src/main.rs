//! mssync command-line driver.
//!
//! Parses arguments, assembles the connection strings, wires Ctrl-C into the
//! engine's cooperative shutdown channel and prints a per-table summary when
//! the run finishes. The run-result JSON file is the authoritative outcome;
//! the process exit code only reflects coordinator-level failures.

use clap::Parser;
use mssync::concurrency::shutdown::create_shutdown;
use mssync::coordinator;
use tracing::{info, warn};

use crate::args::Args;
use crate::connect::{Role, resolve_conn_string};

mod args;
mod compare;
mod connect;

fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    mssync_telemetry::init_tracing(env!("CARGO_BIN_NAME"));

    let params = args.to_parameters()?;
    let source_conn = resolve_conn_string(
        Role::Source,
        args.source_conn.as_deref(),
        args.source_host.as_deref(),
        args.source_db.as_deref(),
    )?;
    let target_conn = resolve_conn_string(
        Role::Target,
        args.target_conn.as_deref(),
        args.target_host.as_deref(),
        args.target_db.as_deref(),
    )?;

    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?
        .block_on(async_main(
            args.compare_counts_and_schema,
            source_conn,
            target_conn,
            params,
        ))
}

async fn async_main(
    compare_only: bool,
    source_conn: String,
    target_conn: String,
    params: mssync_config::SyncParameters,
) -> anyhow::Result<()> {
    if compare_only {
        return compare::run_compare(&source_conn, &target_conn, &params).await;
    }

    let (shutdown_tx, shutdown_rx) = create_shutdown();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("interrupt received, finishing in-flight batches before stopping");
            let _ = shutdown_tx.send(true);
        }
    });

    let outcome =
        coordinator::execute_run(&source_conn, &target_conn, params, shutdown_rx).await?;

    let result = &outcome.result;
    println!();
    println!(
        "{:<40} {:>12} {:>12} {:>12}  STATUS",
        "TABLE", "SOURCE", "INSERTED", "SKIPPED"
    );
    for table in &result.tables {
        println!(
            "{:<40} {:>12} {:>12} {:>12}  {:?}",
            table.table_name.to_string(),
            table.source_count,
            table.inserted,
            table.skipped,
            table.status
        );
    }
    println!();

    info!(
        run_id = %result.run_id,
        report = %outcome.report_path.display(),
        "run result written"
    );

    Ok(())
}
