use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::error::StoreError;
use crate::jobs::model::JobId;
use crate::reports::{JobReport, ReportStore};

/// In-process store for tests and local dry runs.
#[derive(Clone, Default)]
pub struct MemoryReportStore {
    reports: Arc<RwLock<HashMap<JobId, JobReport>>>,
}

impl MemoryReportStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.reports.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.reports.read().await.is_empty()
    }

    pub async fn contains(&self, job_id: &JobId) -> bool {
        self.reports.read().await.contains_key(job_id)
    }
}

#[async_trait]
impl ReportStore for MemoryReportStore {
    async fn find_by_id(&self, job_id: &JobId) -> Result<Option<JobReport>, StoreError> {
        Ok(self.reports.read().await.get(job_id).cloned())
    }

    async fn save(&self, report: &JobReport) -> Result<(), StoreError> {
        let mut reports = self.reports.write().await;
        if reports.contains_key(&report.job_id) {
            return Err(StoreError::Rejected(report.job_id.clone()));
        }
        reports.insert(report.job_id.clone(), report.clone());
        Ok(())
    }

    async fn list_recent(&self, limit: i64) -> Result<Vec<JobReport>, StoreError> {
        let mut out: Vec<JobReport> = self.reports.read().await.values().cloned().collect();
        out.sort_by(|a, b| {
            b.analysis_time
                .cmp(&a.analysis_time)
                .then_with(|| a.job_id.cmp(&b.job_id))
        });
        out.truncate(limit.max(0) as usize);
        Ok(out)
    }
}
