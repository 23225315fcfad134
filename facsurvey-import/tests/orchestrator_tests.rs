//! End-to-end batch behavior over an in-memory source and a real database

mod helpers;

use chrono::NaiveDate;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

use facsurvey_import::db::{facilities, surveys};
use facsurvey_import::error::ImportError;
use facsurvey_import::models::{ElectricitySource, RawImportStatus};
use helpers::{create_test_db, nameless_submission, orchestrator, submission, InMemorySource};

fn range() -> (NaiveDate, NaiveDate) {
    (
        NaiveDate::from_ymd_opt(2024, 3, 1).unwrap(),
        NaiveDate::from_ymd_opt(2024, 4, 1).unwrap(),
    )
}

#[tokio::test]
async fn test_range_import_stores_surveys_and_facilities() {
    let (_dir, pool) = create_test_db().await;
    let source = Arc::new(InMemorySource::new(vec![
        submission(1, "Test Clinic"),
        submission(2, "  test   CLINIC "),
        submission(3, "Riverside School"),
    ]));
    let orch = orchestrator(&pool, source, 4);
    let (start, end) = range();

    let summary = orch
        .import_by_date_range(start, end, &CancellationToken::new())
        .await
        .unwrap();

    assert!(summary.success);
    assert_eq!(summary.imported, 3);
    assert_eq!(summary.failed, 0);
    assert_eq!(summary.message, "Imported 3 of 3 submissions (0 failed)");

    assert_eq!(surveys::count(&pool).await.unwrap(), 3);
    assert_eq!(facilities::count(&pool).await.unwrap(), 2);

    let clinic = facilities::find_by_name(&pool, "TEST CLINIC").await.unwrap().unwrap();
    assert_eq!(clinic.owner_user_id.as_deref(), Some("importer"));
    assert_eq!(surveys::list_for_facility(&pool, clinic.id).await.unwrap().len(), 2);

    let counts = orch.raw_store().count_by_status().await.unwrap();
    assert_eq!(counts.get(&RawImportStatus::Succeeded), Some(&3));
    assert_eq!(counts.get(&RawImportStatus::Pending), None);
}

#[tokio::test]
async fn test_reimport_updates_survey_in_place() {
    let (_dir, pool) = create_test_db().await;
    let source = Arc::new(InMemorySource::new(vec![submission(101, "Test Clinic")]));
    let orch = orchestrator(&pool, source.clone(), 2);
    let token = CancellationToken::new();

    let first = orch.import_by_id("101", &token).await.unwrap();
    assert_eq!(first.imported, 1);
    let before = surveys::find_by_external_id(&pool, "101").await.unwrap().unwrap();
    assert_eq!(before.facility_data.electricity_source, ElectricitySource::Solar);

    let mut edited = submission(101, "Test Clinic");
    edited["electricity_source"] = json!("national grid");
    source.set_records(vec![edited]);

    let second = orch.import_by_id("101", &token).await.unwrap();
    assert_eq!(second.imported, 1);

    let after = surveys::find_by_external_id(&pool, "101").await.unwrap().unwrap();
    assert_eq!(after.id, before.id);
    assert_eq!(after.facility_data.electricity_source, ElectricitySource::Grid);
    assert_eq!(after.raw_data["electricity_source"], json!("national grid"));
    assert_ne!(after.raw_import_id, before.raw_import_id);
    assert_eq!(surveys::count(&pool).await.unwrap(), 1);
    assert_eq!(facilities::count(&pool).await.unwrap(), 1);

    // Each fetch is staged separately
    let succeeded = orch
        .raw_store()
        .list_by_status(RawImportStatus::Succeeded, None)
        .await
        .unwrap();
    assert_eq!(succeeded.len(), 2);
}

#[tokio::test]
async fn test_failed_records_are_isolated() {
    let (_dir, pool) = create_test_db().await;
    let source = Arc::new(InMemorySource::new(vec![
        submission(1, "Alpha"),
        nameless_submission(2),
        submission(3, "Beta"),
        nameless_submission(4),
        submission(5, "Gamma"),
    ]));
    let orch = orchestrator(&pool, source, 3);
    let (start, end) = range();

    let summary = orch
        .import_by_date_range(start, end, &CancellationToken::new())
        .await
        .unwrap();

    assert!(summary.success);
    assert_eq!(summary.imported, 3);
    assert_eq!(summary.failed, 2);

    let mut failed_ids: Vec<&str> = summary.errors.iter().map(|e| e.external_id.as_str()).collect();
    failed_ids.sort();
    assert_eq!(failed_ids, vec!["2", "4"]);
    assert!(summary.errors.iter().all(|e| e.reason.contains("facility name")));

    let failed = orch
        .raw_store()
        .list_by_status(RawImportStatus::Failed, None)
        .await
        .unwrap();
    assert_eq!(failed.len(), 2);
    assert!(failed.iter().all(|r| r.error.as_deref().is_some_and(|e| !e.is_empty())));
    assert_eq!(surveys::count(&pool).await.unwrap(), 3);
}

#[tokio::test]
async fn test_empty_range_is_successful_noop() {
    let (_dir, pool) = create_test_db().await;
    let orch = orchestrator(&pool, Arc::new(InMemorySource::new(vec![])), 4);
    let (start, end) = range();

    let summary = orch
        .import_by_date_range(start, end, &CancellationToken::new())
        .await
        .unwrap();

    assert!(summary.success);
    assert_eq!(summary.imported, 0);
    assert_eq!(summary.failed, 0);
    assert!(summary.errors.is_empty());
}

#[tokio::test]
async fn test_unknown_id_reports_not_found() {
    let (_dir, pool) = create_test_db().await;
    let orch = orchestrator(&pool, Arc::new(InMemorySource::new(vec![])), 1);

    let summary = orch.import_by_id("404", &CancellationToken::new()).await.unwrap();

    assert!(!summary.success);
    assert_eq!(summary.imported, 0);
    assert!(summary.message.contains("404"));
    assert!(orch.raw_store().count_by_status().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_source_outage_aborts_before_staging() {
    let (_dir, pool) = create_test_db().await;
    let orch = orchestrator(&pool, Arc::new(InMemorySource::unavailable()), 4);
    let (start, end) = range();

    let err = orch
        .import_by_date_range(start, end, &CancellationToken::new())
        .await
        .unwrap_err();

    assert!(matches!(err, ImportError::SourceUnavailable(_)), "{:?}", err);
    assert!(orch.raw_store().count_by_status().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_unreachable_database_aborts_batch() {
    let (_dir, pool) = create_test_db().await;
    let source = Arc::new(InMemorySource::new(vec![submission(1, "Alpha")]));
    let orch = orchestrator(&pool, source.clone(), 4);
    pool.close().await;

    let (start, end) = range();
    let err = orch
        .import_by_date_range(start, end, &CancellationToken::new())
        .await
        .unwrap_err();

    assert!(matches!(err, ImportError::Persistence(_)), "{:?}", err);
    assert_eq!(source.range_calls(), 0);
}

#[tokio::test]
async fn test_cancelled_batch_stages_records_for_replay() {
    let (_dir, pool) = create_test_db().await;
    let source = Arc::new(InMemorySource::new(vec![
        submission(1, "Alpha"),
        submission(2, "Beta"),
    ]));
    let orch = orchestrator(&pool, source, 2);

    let token = CancellationToken::new();
    token.cancel();
    let (start, end) = range();
    let summary = orch.import_by_date_range(start, end, &token).await.unwrap();

    assert!(!summary.success);
    assert_eq!(summary.imported, 0);
    assert!(summary.message.starts_with("Import cancelled"));
    assert_eq!(surveys::count(&pool).await.unwrap(), 0);

    // Fetched payloads are kept as pending rather than dropped
    let counts = orch.raw_store().count_by_status().await.unwrap();
    assert_eq!(counts.get(&RawImportStatus::Pending), Some(&2));

    let replayed = orch.replay_pending(&CancellationToken::new()).await.unwrap();
    assert!(replayed.success);
    assert_eq!(replayed.imported, 2);
    assert_eq!(surveys::count(&pool).await.unwrap(), 2);
}

#[tokio::test]
async fn test_replay_processes_pending_rows() {
    let (_dir, pool) = create_test_db().await;
    let orch = orchestrator(&pool, Arc::new(InMemorySource::new(vec![])), 2);

    orch.raw_store().stage("kobo", &submission(7, "Hilltop Dispensary")).await.unwrap();
    orch.raw_store().stage("kobo", &nameless_submission(8)).await.unwrap();

    let summary = orch.replay_pending(&CancellationToken::new()).await.unwrap();

    assert!(summary.success);
    assert_eq!(summary.imported, 1);
    assert_eq!(summary.failed, 1);
    assert_eq!(summary.errors[0].external_id, "8");

    let counts = orch.raw_store().count_by_status().await.unwrap();
    assert_eq!(counts.get(&RawImportStatus::Succeeded), Some(&1));
    assert_eq!(counts.get(&RawImportStatus::Failed), Some(&1));

    let survey = surveys::find_by_external_id(&pool, "7").await.unwrap().unwrap();
    assert!(survey.raw_import_id.is_some());
}

#[tokio::test]
async fn test_retry_failed_requeues_and_reprocesses() {
    let (_dir, pool) = create_test_db().await;
    let orch = orchestrator(&pool, Arc::new(InMemorySource::new(vec![])), 2);
    let store = orch.raw_store();

    // A valid payload that failed for a transient reason
    let raw = store.stage("kobo", &submission(11, "Lakeside Clinic")).await.unwrap();
    store.mark_processing(raw.id).await.unwrap();
    store.mark_failed(raw.id, "database is locked").await.unwrap();

    let summary = orch.retry_failed(&CancellationToken::new()).await.unwrap();

    assert!(summary.success);
    assert_eq!(summary.imported, 1);
    let reloaded = store.load(raw.id).await.unwrap().unwrap();
    assert_eq!(reloaded.status, RawImportStatus::Succeeded);
    assert!(surveys::find_by_external_id(&pool, "11").await.unwrap().is_some());

    // Nothing left to retry
    let again = orch.retry_failed(&CancellationToken::new()).await.unwrap();
    assert_eq!(again.imported + again.failed, 0);
}

#[tokio::test]
async fn test_recover_stale_reclaims_stuck_rows() {
    let (_dir, pool) = create_test_db().await;
    let orch = orchestrator(&pool, Arc::new(InMemorySource::new(vec![])), 2);
    let store = orch.raw_store();

    // Claimed by a run that died before finishing
    let raw = store.stage("kobo", &submission(21, "Ridge Clinic")).await.unwrap();
    store.mark_processing(raw.id).await.unwrap();

    let token = CancellationToken::new();
    assert_eq!(orch.replay_pending(&token).await.unwrap().imported, 0);
    assert_eq!(orch.retry_failed(&token).await.unwrap().imported, 0);

    let summary = orch.recover_stale(Duration::ZERO, &token).await.unwrap();

    assert!(summary.success);
    assert_eq!(summary.imported, 1);
    let reloaded = store.load(raw.id).await.unwrap().unwrap();
    assert_eq!(reloaded.status, RawImportStatus::Succeeded);
    assert!(surveys::find_by_external_id(&pool, "21").await.unwrap().is_some());
}

#[tokio::test]
async fn test_parallel_workers_share_one_facility() {
    let (_dir, pool) = create_test_db().await;
    let records = (1..=20).map(|id| submission(id, "Central Hospital")).collect();
    let orch = orchestrator(&pool, Arc::new(InMemorySource::new(records)), 8);
    let (start, end) = range();

    let summary = orch
        .import_by_date_range(start, end, &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(summary.imported, 20, "{:?}", summary.errors);
    assert_eq!(facilities::count(&pool).await.unwrap(), 1);
    assert_eq!(surveys::count(&pool).await.unwrap(), 20);
}
