pub mod memory;
pub mod model;
pub mod repo;

pub use memory::MemoryReportStore;
pub use model::{build_report, JobReport, ReportLimits};
pub use repo::PgReportStore;

use async_trait::async_trait;

use crate::error::StoreError;
use crate::jobs::model::JobId;

/// Where finished reports live. The store is authoritative across restarts:
/// a job with a stored report is never analysed again.
#[async_trait]
pub trait ReportStore: Send + Sync {
    async fn find_by_id(&self, job_id: &JobId) -> Result<Option<JobReport>, StoreError>;

    /// Persist a new report. Saving a second report for the same job fails
    /// with [`StoreError::Rejected`].
    async fn save(&self, report: &JobReport) -> Result<(), StoreError>;

    /// Newest reports first, by analysis time.
    async fn list_recent(&self, limit: i64) -> Result<Vec<JobReport>, StoreError>;
}
