mod common;

use chrono::{Duration, TimeZone, Utc};
use common::{job_data, setup_db, CountingPipeline, ScriptedSource};
use jobdoctor::analysis::{HeuristicFinding, Severity};
use jobdoctor::jobs::{JobId, Poller, PollerConfig};
use jobdoctor::reports::{build_report, JobReport, PgReportStore, ReportLimits, ReportStore};
use jobdoctor::StoreError;
use serial_test::serial;
use std::sync::Arc;

fn report(id: &str, analysed_offset_secs: i64) -> JobReport {
    let analysed = Utc.with_ymd_and_hms(2026, 3, 2, 8, 0, 0).unwrap()
        + Duration::seconds(analysed_offset_secs)
        + Duration::microseconds(123_456);
    build_report(
        &JobId::from(id),
        &job_data(id),
        vec![
            HeuristicFinding::new("Mapper Data Skew", Severity::Severe)
                .with_row(["Number of tasks", "40"])
                .with_row(["Group A", "20 tasks, 10 bytes avg"]),
            HeuristicFinding::new("Spill Ratio", Severity::Low),
        ],
        &ReportLimits::default(),
        analysed,
    )
}

#[tokio::test]
#[serial]
async fn saved_report_reads_back_identical() {
    let Some(pool) = setup_db().await else {
        return;
    };
    let store = PgReportStore::new(pool);

    let saved = report("job_1", 0);
    store.save(&saved).await.unwrap();

    let loaded = store.find_by_id(&"job_1".into()).await.unwrap();
    assert_eq!(loaded, Some(saved));
    assert_eq!(store.find_by_id(&"job_2".into()).await.unwrap(), None);
}

#[tokio::test]
#[serial]
async fn second_report_for_a_job_is_rejected() {
    let Some(pool) = setup_db().await else {
        return;
    };
    let store = PgReportStore::new(pool.clone());

    store.save(&report("job_1", 0)).await.unwrap();
    let err = store.save(&report("job_1", 60)).await.unwrap_err();
    assert!(matches!(err, StoreError::Rejected(ref id) if id.as_str() == "job_1"));

    // the rejected write left nothing behind
    let (findings,): (i64,) =
        sqlx::query_as("SELECT COUNT(*) FROM job_report_findings WHERE job_id = 'job_1'")
            .fetch_one(&pool)
            .await
            .unwrap();
    assert_eq!(findings, 2);
    let kept = store.find_by_id(&"job_1".into()).await.unwrap().unwrap();
    assert_eq!(kept, report("job_1", 0));
}

#[tokio::test]
#[serial]
async fn recent_reports_come_newest_first() {
    let Some(pool) = setup_db().await else {
        return;
    };
    let store = PgReportStore::new(pool);

    store.save(&report("job_a", 0)).await.unwrap();
    store.save(&report("job_b", 120)).await.unwrap();
    store.save(&report("job_c", 60)).await.unwrap();

    let recent = store.list_recent(2).await.unwrap();
    let ids: Vec<&str> = recent.iter().map(|r| r.job_id.as_str()).collect();
    assert_eq!(ids, ["job_b", "job_c"]);
    assert_eq!(recent[0].findings.len(), 2);
}

#[tokio::test]
#[serial]
async fn restarted_poller_skips_jobs_reported_in_postgres() {
    let Some(pool) = setup_db().await else {
        return;
    };
    let store = Arc::new(PgReportStore::new(pool));
    let source = ScriptedSource::with_jobs(&["job_1", "job_2"]);

    let first = Poller::new(
        source.clone(),
        CountingPipeline::new(),
        store.clone(),
        PollerConfig::default(),
    );
    assert_eq!(first.run_cycle().await.unwrap().reported, 2);

    let pipeline = CountingPipeline::new();
    let restarted = Poller::new(
        source,
        pipeline.clone(),
        store.clone(),
        PollerConfig::default(),
    );
    let summary = restarted.run_cycle().await.unwrap();
    assert_eq!(summary.selected, 0);
    assert_eq!(pipeline.total_calls(), 0);
    assert_eq!(store.list_recent(10).await.unwrap().len(), 2);
}
