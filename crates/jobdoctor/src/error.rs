use thiserror::Error;

use crate::jobs::model::JobId;

/// Failures reported by a [`crate::jobs::source::JobSource`].
#[derive(Error, Debug)]
pub enum SourceError {
    #[error("job source unavailable: {0}")]
    Unavailable(String),

    #[error("job source returned HTTP {status} for {url}")]
    Http { status: u16, url: String },

    #[error("job source request failed: {0}")]
    Transport(#[from] reqwest::Error),
}

#[derive(Error, Debug)]
pub enum AnalysisError {
    #[error("heuristic '{heuristic}' failed: {message}")]
    Heuristic { heuristic: String, message: String },

    #[error("invalid execution data: {0}")]
    InvalidData(String),
}

/// Failures reported by a [`crate::reports::ReportStore`].
///
/// Only `Fatal` is allowed to stop the poller; everything else is retried on
/// a later cycle.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("report for job {0} already exists")]
    Rejected(JobId),

    #[error("result store unavailable: {0}")]
    Unavailable(String),

    #[error("stored report is malformed: {0}")]
    Malformed(String),

    #[error("result store failed permanently: {0}")]
    Fatal(String),
}

impl StoreError {
    pub fn is_fatal(&self) -> bool {
        matches!(self, StoreError::Fatal(_))
    }
}

impl From<sqlx::Error> for StoreError {
    fn from(e: sqlx::Error) -> Self {
        match e {
            sqlx::Error::PoolClosed => StoreError::Fatal("connection pool closed".into()),
            sqlx::Error::Decode(inner) => StoreError::Malformed(inner.to_string()),
            other => StoreError::Unavailable(other.to_string()),
        }
    }
}

#[derive(Error, Debug)]
pub enum PollError {
    #[error("job source unavailable: {0}")]
    SourceUnavailable(String),

    #[error("failed to fetch job {job_id}: {source}")]
    FetchFailure {
        job_id: JobId,
        #[source]
        source: SourceError,
    },

    #[error("analysis failed for job {job_id}: {source}")]
    AnalysisFailure {
        job_id: JobId,
        #[source]
        source: AnalysisError,
    },

    #[error("failed to persist report for job {job_id}: {source}")]
    PersistFailure {
        job_id: JobId,
        #[source]
        source: StoreError,
    },

    #[error("reconciliation against the result store failed: {0}")]
    Reconcile(#[source] StoreError),

    #[error("fatal: {0}")]
    Fatal(String),
}

impl PollError {
    pub fn is_fatal(&self) -> bool {
        matches!(self, PollError::Fatal(_))
    }

    /// Escalate fatal store failures, keep everything else cycle-scoped.
    pub(crate) fn from_reconcile(e: StoreError) -> Self {
        if e.is_fatal() {
            PollError::Fatal(e.to_string())
        } else {
            PollError::Reconcile(e)
        }
    }
}
