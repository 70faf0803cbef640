//! The run report is a write-through barrier: after any table completes, the
//! file on disk reflects that table's final state, and readers may observe a
//! run in progress.

use mssync::report::{RunReport, RunResult, RunStatus, TableStatus, TableSyncResult};
use mssync_config::SyncParameters;
use mssync_tds::TableRef;

#[tokio::test]
async fn report_is_written_through_at_every_table_boundary() {
    let dir = tempfile::tempdir().unwrap();
    let report = RunReport::create(SyncParameters::default(), dir.path())
        .await
        .unwrap();
    let path = report.path().await;

    // The file exists before any table ran and parses as a running result.
    let on_disk: RunResult =
        serde_json::from_str(&tokio::fs::read_to_string(&path).await.unwrap()).unwrap();
    assert_eq!(on_disk.status, RunStatus::Running);
    assert!(on_disk.tables.is_empty());
    assert!(!on_disk.run_id.is_empty());

    // A mid-run observer sees the completed table.
    let mut users = TableSyncResult::new(TableRef::parse("dbo.Users"));
    users.begin();
    users.inserted = 2;
    users.skipped = 1;
    users.complete();
    report.record_table(users).await;

    let on_disk: RunResult =
        serde_json::from_str(&tokio::fs::read_to_string(&path).await.unwrap()).unwrap();
    assert_eq!(on_disk.status, RunStatus::Running);
    assert_eq!(on_disk.tables.len(), 1);
    assert_eq!(on_disk.tables[0].status, TableStatus::Completed);
    assert_eq!(on_disk.tables[0].inserted, 2);

    // Re-recording the same table overwrites instead of duplicating.
    let mut users = TableSyncResult::new(TableRef::parse("DBO.USERS"));
    users.begin();
    users.skip("second pass");
    report.record_table(users).await;

    let on_disk: RunResult =
        serde_json::from_str(&tokio::fs::read_to_string(&path).await.unwrap()).unwrap();
    assert_eq!(on_disk.tables.len(), 1);
    assert_eq!(on_disk.tables[0].status, TableStatus::Skipped);

    // Finalizing stamps the end time and terminal status.
    report.add_warnings(vec!["warden warning".to_string()]).await;
    let final_result = report.finalize(RunStatus::Completed).await.unwrap();
    assert_eq!(final_result.status, RunStatus::Completed);
    assert!(final_result.end_time.is_some());

    let on_disk: RunResult =
        serde_json::from_str(&tokio::fs::read_to_string(&path).await.unwrap()).unwrap();
    assert_eq!(on_disk.status, RunStatus::Completed);
    assert_eq!(on_disk.warnings, vec!["warden warning".to_string()]);
}

#[tokio::test]
async fn report_file_name_carries_the_start_timestamp() {
    let dir = tempfile::tempdir().unwrap();
    let report = RunReport::create(SyncParameters::default(), dir.path())
        .await
        .unwrap();
    let path = report.path().await;

    let name = path.file_name().unwrap().to_str().unwrap();
    assert!(name.starts_with("sync-result-"));
    assert!(name.ends_with(".json"));
    // sync-result-YYYYMMDD_HHMMSS.json
    let stamp = name
        .trim_start_matches("sync-result-")
        .trim_end_matches(".json");
    assert_eq!(stamp.len(), 15);
    assert_eq!(stamp.as_bytes()[8], b'_');
}

#[tokio::test]
async fn parameters_round_trip_through_the_report() {
    let dir = tempfile::tempdir().unwrap();

    let mut params = SyncParameters {
        batch_size: 500,
        threads: 2,
        allow_no_pk: true,
        deep_compare: true,
        order_by_pk: true,
        start_rows: vec![1000, 0],
        selection: vec!["dbo.Users".to_string()],
        ..Default::default()
    };
    params
        .column_mappings
        .add_directive("dbo.U.Id=UserId")
        .unwrap();
    params.ignored_columns.add_directive("Secret").unwrap();

    let report = RunReport::create(params, dir.path()).await.unwrap();
    let path = report.path().await;

    let on_disk: RunResult =
        serde_json::from_str(&tokio::fs::read_to_string(&path).await.unwrap()).unwrap();
    assert_eq!(on_disk.parameters.batch_size, 500);
    assert_eq!(on_disk.parameters.start_rows, vec![1000, 0]);
    assert!(on_disk.parameters.deep_compare);
    assert_eq!(
        on_disk.parameters.column_mappings.target_for("dbo.u", "id"),
        Some("UserId")
    );
    assert!(on_disk.parameters.ignored_columns.contains("dbo.x", "secret"));
}
