use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::{JoinError, JoinSet};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::analysis::{AnalysisPipeline, Severity};
use crate::error::{PollError, StoreError};
use crate::jobs::model::{successful_jobs, JobId};
use crate::jobs::seen::SeenSet;
use crate::jobs::source::JobSource;
use crate::jobs::stats::{PollerStats, StatsSnapshot};
use crate::reports::{build_report, ReportLimits, ReportStore};

#[derive(Debug, Clone)]
pub struct PollerConfig {
    pub interval: Duration,
    pub limits: ReportLimits,
    /// Jobs analysed at the same time within one cycle.
    pub analysis_concurrency: usize,
}

impl Default for PollerConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(5 * 60),
            limits: ReportLimits::default(),
            analysis_concurrency: 1,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobOutcome {
    Reported(Severity),
    /// The store already held a report (a pruned job came back).
    AlreadyReported,
    /// The source dropped the job between listing and fetching it.
    Vanished,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CycleSummary {
    pub listed: usize,
    pub candidates: usize,
    pub selected: usize,
    pub reported: usize,
    pub vanished: usize,
    pub already_reported: usize,
    pub failed: usize,
    /// Selected jobs left untouched because a stop was requested.
    pub deferred: usize,
}

/// Everything one job needs: fetch -> analyze -> persist -> mark seen.
#[derive(Clone)]
struct JobWorker {
    source: Arc<dyn JobSource>,
    pipeline: Arc<dyn AnalysisPipeline>,
    store: Arc<dyn ReportStore>,
    seen: Arc<SeenSet>,
    limits: ReportLimits,
}

impl JobWorker {
    async fn process(&self, job_id: &JobId) -> Result<JobOutcome, PollError> {
        debug!(job_id = %job_id, "looking at job");

        let data = self
            .source
            .fetch_job_data(job_id)
            .await
            .map_err(|source| PollError::FetchFailure {
                job_id: job_id.clone(),
                source,
            })?;

        let Some(data) = data else {
            return Ok(JobOutcome::Vanished);
        };

        let findings = self
            .pipeline
            .analyze(&data)
            .map_err(|source| PollError::AnalysisFailure {
                job_id: job_id.clone(),
                source,
            })?;

        let report = build_report(job_id, &data, findings, &self.limits, Utc::now());

        let outcome = match self.store.save(&report).await {
            Ok(()) => JobOutcome::Reported(report.severity),
            Err(StoreError::Rejected(_)) => JobOutcome::AlreadyReported,
            Err(source) if source.is_fatal() => {
                return Err(PollError::Fatal(format!(
                    "saving report for job {job_id}: {source}"
                )));
            }
            Err(source) => {
                return Err(PollError::PersistFailure {
                    job_id: job_id.clone(),
                    source,
                });
            }
        };

        // Only a persisted report makes a job "seen".
        self.seen.mark_analyzed(job_id.clone());
        Ok(outcome)
    }
}

/// Lets other tasks stop the poller and read its counters.
#[derive(Clone)]
pub struct PollerHandle {
    shutdown: CancellationToken,
    stats: Arc<PollerStats>,
    seen: Arc<SeenSet>,
}

impl PollerHandle {
    /// Idempotent. The poller finishes jobs already in flight, then exits
    /// instead of sleeping.
    pub fn stop(&self) {
        if !self.shutdown.is_cancelled() {
            info!("poller stop requested");
        }
        self.shutdown.cancel();
    }

    pub fn is_stopped(&self) -> bool {
        self.shutdown.is_cancelled()
    }

    pub fn is_seen(&self, job_id: &JobId) -> bool {
        self.seen.contains(job_id)
    }

    pub fn stats(&self) -> StatsSnapshot {
        self.stats.snapshot(self.seen.len(), self.is_stopped())
    }
}

/// The poll -> analyze -> persist loop.
pub struct Poller {
    worker: JobWorker,
    cfg: PollerConfig,
    stats: Arc<PollerStats>,
    shutdown: CancellationToken,
}

impl Poller {
    pub fn new(
        source: Arc<dyn JobSource>,
        pipeline: Arc<dyn AnalysisPipeline>,
        store: Arc<dyn ReportStore>,
        cfg: PollerConfig,
    ) -> Self {
        Self {
            worker: JobWorker {
                source,
                pipeline,
                store,
                seen: Arc::new(SeenSet::new()),
                limits: cfg.limits,
            },
            cfg,
            stats: Arc::new(PollerStats::default()),
            shutdown: CancellationToken::new(),
        }
    }

    /// Stop when `token` is cancelled (e.g. by a signal handler).
    pub fn with_shutdown(mut self, token: CancellationToken) -> Self {
        self.shutdown = token;
        self
    }

    pub fn handle(&self) -> PollerHandle {
        PollerHandle {
            shutdown: self.shutdown.clone(),
            stats: self.stats.clone(),
            seen: self.worker.seen.clone(),
        }
    }

    /// Cycle until stopped. Returns `Err` only for [`PollError::Fatal`].
    pub async fn run(self) -> Result<(), PollError> {
        info!(
            interval_secs = self.cfg.interval.as_secs(),
            analysis_concurrency = self.cfg.analysis_concurrency,
            "poller starting"
        );

        while !self.shutdown.is_cancelled() {
            let started = Instant::now();

            match self.run_cycle().await {
                Ok(summary) => {
                    self.stats.record_cycle_completed();
                    info!(
                        reported = summary.reported,
                        vanished = summary.vanished,
                        failed = summary.failed,
                        deferred = summary.deferred,
                        elapsed_ms = started.elapsed().as_millis() as u64,
                        "finished all jobs, waiting for refresh"
                    );
                }
                Err(e) if e.is_fatal() => {
                    error!(error = %e, "poller stopping on unrecoverable error");
                    self.shutdown.cancel();
                    return Err(e);
                }
                Err(e) => {
                    self.stats.record_cycle_failed();
                    error!(error = %e, "cycle aborted");
                }
            }

            // Fixed cadence: an overrunning cycle is followed immediately by
            // exactly one more, never by a burst.
            let wait = self.cfg.interval.saturating_sub(started.elapsed());
            if !self.wait_for_next_cycle(wait).await {
                break;
            }
        }

        info!("poller stopped");
        Ok(())
    }

    /// One full pass. Per-job failures are absorbed into the summary; only
    /// source, reconciliation and fatal errors come back as `Err`.
    pub async fn run_cycle(&self) -> Result<CycleSummary, PollError> {
        self.stats.record_cycle_start(Utc::now());

        // 1) snapshot
        debug!("fetching job list");
        let snapshot = self
            .worker
            .source
            .list_jobs()
            .await
            .map_err(|e| PollError::SourceUnavailable(e.to_string()))?;

        // 2) succeeded + complete, minus what is already reported
        let candidates = successful_jobs(&snapshot);
        let to_analyze = self
            .worker
            .seen
            .reconcile(&candidates, self.worker.store.as_ref())
            .await
            .map_err(PollError::from_reconcile)?;

        let mut summary = CycleSummary {
            listed: snapshot.len(),
            candidates: candidates.len(),
            selected: to_analyze.len(),
            ..Default::default()
        };
        info!(
            listed = summary.listed,
            candidates = summary.candidates,
            jobs = summary.selected,
            "jobs to analyse"
        );

        // 3) analyze + persist, at most `analysis_concurrency` at a time
        let limit = self.cfg.analysis_concurrency.max(1);
        let mut tasks = JoinSet::new();
        let mut fatal: Option<PollError> = None;
        let total = to_analyze.len();

        for (i, job_id) in to_analyze.into_iter().enumerate() {
            // A slot frees up only once its result has been absorbed, so a
            // fatal outcome is always seen before the next job starts.
            while tasks.len() >= limit {
                match tasks.join_next().await {
                    Some(joined) => self.absorb(joined, &mut summary, &mut fatal),
                    None => break,
                }
            }
            while let Some(joined) = tasks.try_join_next() {
                self.absorb(joined, &mut summary, &mut fatal);
            }

            if fatal.is_some() || self.shutdown.is_cancelled() {
                summary.deferred = total - i;
                info!(deferred = summary.deferred, "leaving remaining jobs for a later cycle");
                break;
            }

            let worker = self.worker.clone();
            tasks.spawn(async move {
                let outcome = worker.process(&job_id).await;
                (job_id, outcome)
            });
        }

        // In-flight jobs always run to completion.
        while let Some(joined) = tasks.join_next().await {
            self.absorb(joined, &mut summary, &mut fatal);
        }

        match fatal {
            Some(e) => Err(e),
            None => Ok(summary),
        }
    }

    fn absorb(
        &self,
        joined: Result<(JobId, Result<JobOutcome, PollError>), JoinError>,
        summary: &mut CycleSummary,
        fatal: &mut Option<PollError>,
    ) {
        match joined {
            Ok((job_id, Ok(JobOutcome::Reported(severity)))) => {
                summary.reported += 1;
                self.stats.record_report_saved();
                info!(job_id = %job_id, severity = %severity, "report saved");
            }
            Ok((job_id, Ok(JobOutcome::AlreadyReported))) => {
                summary.already_reported += 1;
                self.stats.record_already_reported();
                warn!(job_id = %job_id, "report already stored, keeping the existing one");
            }
            Ok((job_id, Ok(JobOutcome::Vanished))) => {
                summary.vanished += 1;
                self.stats.record_vanished();
                debug!(job_id = %job_id, "job vanished before it could be analysed");
            }
            Ok((job_id, Err(e))) if e.is_fatal() => {
                summary.failed += 1;
                self.stats.record_job_failure();
                error!(job_id = %job_id, error = %e, "unrecoverable failure");
                fatal.get_or_insert(e);
            }
            Ok((job_id, Err(e))) => {
                summary.failed += 1;
                self.stats.record_job_failure();
                warn!(job_id = %job_id, error = %e, "error analysing job, retrying next cycle");
            }
            Err(e) => {
                summary.failed += 1;
                self.stats.record_job_failure();
                error!(error = %e, "analysis task panicked");
            }
        }
    }

    /// Sleep for `wait` unless stopped first. `false` means stop.
    async fn wait_for_next_cycle(&self, wait: Duration) -> bool {
        if self.shutdown.is_cancelled() {
            return false;
        }
        if wait.is_zero() {
            return true;
        }

        tokio::select! {
            _ = self.shutdown.cancelled() => false,
            _ = tokio::time::sleep(wait) => true,
        }
    }
}
