//! Read-only comparison mode: row counts and column-set differences for the
//! selected tables, printed without touching any data.

use mssync::schema::probe;
use mssync::selection;
use mssync_config::SyncParameters;
use mssync_tds::MssqlClient;
use tracing::info;

pub async fn run_compare(
    source_conn: &str,
    target_conn: &str,
    params: &SyncParameters,
) -> anyhow::Result<()> {
    let mut source = MssqlClient::connect(source_conn, true).await?;
    let mut target = MssqlClient::connect(target_conn, false).await?;

    let source_tables = probe::base_tables(&mut source).await?;
    let target_tables = probe::base_tables(&mut target).await?;
    let selected = selection::resolve(&params.selection, &source_tables, &target_tables);

    info!(tables = selected.len(), "comparing counts and schema");
    println!(
        "{:<40} {:>14} {:>14}  NOTES",
        "TABLE", "SOURCE ROWS", "TARGET ROWS"
    );

    for table in &selected {
        let source_count = probe::count_rows(&mut source, table).await?;
        let target_count = probe::count_rows(&mut target, table).await?;

        let source_columns = probe::columns(&mut source, table).await?;
        let target_columns = probe::columns(&mut target, table).await?;

        let mut notes = Vec::new();
        if source_count != target_count {
            notes.push("count mismatch".to_string());
        }
        let missing_in_target: Vec<&str> = source_columns
            .iter()
            .filter(|c| {
                !target_columns
                    .iter()
                    .any(|t| t.name.eq_ignore_ascii_case(&c.name))
            })
            .map(|c| c.name.as_str())
            .collect();
        if !missing_in_target.is_empty() {
            notes.push(format!("missing in target: {}", missing_in_target.join(", ")));
        }
        let missing_in_source: Vec<&str> = target_columns
            .iter()
            .filter(|c| {
                !source_columns
                    .iter()
                    .any(|s| s.name.eq_ignore_ascii_case(&c.name))
            })
            .map(|c| c.name.as_str())
            .collect();
        if !missing_in_source.is_empty() {
            notes.push(format!("missing in source: {}", missing_in_source.join(", ")));
        }

        println!(
            "{:<40} {:>14} {:>14}  {}",
            table.to_string(),
            source_count,
            target_count,
            if notes.is_empty() {
                "ok".to_string()
            } else {
                notes.join("; ")
            }
        );
    }

    Ok(())
}
