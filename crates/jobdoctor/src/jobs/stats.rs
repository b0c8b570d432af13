use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};

/// Counters updated by the poller, read by the admin API.
#[derive(Debug, Default)]
pub struct PollerStats {
    cycles_completed: AtomicU64,
    cycles_failed: AtomicU64,
    reports_saved: AtomicU64,
    jobs_vanished: AtomicU64,
    jobs_already_reported: AtomicU64,
    job_failures: AtomicU64,
    last_cycle_started_ms: AtomicI64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct StatsSnapshot {
    pub cycles_completed: u64,
    pub cycles_failed: u64,
    pub reports_saved: u64,
    pub jobs_vanished: u64,
    pub jobs_already_reported: u64,
    pub job_failures: u64,
    pub seen_jobs: usize,
    pub last_cycle_started_at: Option<DateTime<Utc>>,
    pub stopped: bool,
}

impl PollerStats {
    pub fn record_cycle_start(&self, at: DateTime<Utc>) {
        self.last_cycle_started_ms
            .store(at.timestamp_millis(), Ordering::Relaxed);
    }

    pub fn record_cycle_completed(&self) {
        self.cycles_completed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_cycle_failed(&self) {
        self.cycles_failed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_report_saved(&self) {
        self.reports_saved.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_vanished(&self) {
        self.jobs_vanished.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_already_reported(&self) {
        self.jobs_already_reported.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_job_failure(&self) {
        self.job_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self, seen_jobs: usize, stopped: bool) -> StatsSnapshot {
        let last_ms = self.last_cycle_started_ms.load(Ordering::Relaxed);
        let last_cycle_started_at = if last_ms > 0 {
            Utc.timestamp_millis_opt(last_ms).single()
        } else {
            None
        };

        StatsSnapshot {
            cycles_completed: self.cycles_completed.load(Ordering::Relaxed),
            cycles_failed: self.cycles_failed.load(Ordering::Relaxed),
            reports_saved: self.reports_saved.load(Ordering::Relaxed),
            jobs_vanished: self.jobs_vanished.load(Ordering::Relaxed),
            jobs_already_reported: self.jobs_already_reported.load(Ordering::Relaxed),
            job_failures: self.job_failures.load(Ordering::Relaxed),
            seen_jobs,
            last_cycle_started_at,
            stopped,
        }
    }
}

impl StatsSnapshot {
    /// Prometheus text exposition.
    pub fn to_prometheus(&self) -> String {
        let last_cycle = self
            .last_cycle_started_at
            .map(|t| t.timestamp())
            .unwrap_or(0);

        format!(
            concat!(
                "# HELP jobdoctor_cycles_completed_total Poll cycles that finished\n",
                "# TYPE jobdoctor_cycles_completed_total counter\n",
                "jobdoctor_cycles_completed_total {}\n",
                "# HELP jobdoctor_cycles_failed_total Poll cycles aborted before analysis\n",
                "# TYPE jobdoctor_cycles_failed_total counter\n",
                "jobdoctor_cycles_failed_total {}\n",
                "# HELP jobdoctor_reports_saved_total Reports persisted\n",
                "# TYPE jobdoctor_reports_saved_total counter\n",
                "jobdoctor_reports_saved_total {}\n",
                "# HELP jobdoctor_jobs_vanished_total Jobs gone before their data was fetched\n",
                "# TYPE jobdoctor_jobs_vanished_total counter\n",
                "jobdoctor_jobs_vanished_total {}\n",
                "# HELP jobdoctor_jobs_already_reported_total Reappearing jobs whose report was already stored\n",
                "# TYPE jobdoctor_jobs_already_reported_total counter\n",
                "jobdoctor_jobs_already_reported_total {}\n",
                "# HELP jobdoctor_job_failures_total Per-job fetch/analysis/persist failures\n",
                "# TYPE jobdoctor_job_failures_total counter\n",
                "jobdoctor_job_failures_total {}\n",
                "# HELP jobdoctor_seen_jobs Jobs currently in the seen set\n",
                "# TYPE jobdoctor_seen_jobs gauge\n",
                "jobdoctor_seen_jobs {}\n",
                "# HELP jobdoctor_last_cycle_start_seconds Unix time the last cycle started\n",
                "# TYPE jobdoctor_last_cycle_start_seconds gauge\n",
                "jobdoctor_last_cycle_start_seconds {}\n"
            ),
            self.cycles_completed,
            self.cycles_failed,
            self.reports_saved,
            self.jobs_vanished,
            self.jobs_already_reported,
            self.job_failures,
            self.seen_jobs,
            last_cycle,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snapshot_reflects_counters() {
        let stats = PollerStats::default();
        assert_eq!(stats.snapshot(0, false).last_cycle_started_at, None);

        stats.record_cycle_start(Utc::now());
        stats.record_report_saved();
        stats.record_report_saved();
        stats.record_job_failure();
        stats.record_already_reported();

        let snap = stats.snapshot(2, true);
        assert_eq!(snap.reports_saved, 2);
        assert_eq!(snap.job_failures, 1);
        assert_eq!(snap.jobs_already_reported, 1);
        assert!(snap.last_cycle_started_at.is_some());
        assert!(snap.stopped);
        assert!(snap
            .to_prometheus()
            .contains("jobdoctor_reports_saved_total 2\n"));
        assert!(snap
            .to_prometheus()
            .contains("jobdoctor_jobs_already_reported_total 1\n"));
    }
}
