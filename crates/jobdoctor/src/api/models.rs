use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::analysis::Severity;
use crate::jobs::JobId;
use crate::reports::JobReport;

/// Report header without findings, for listings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ReportListItem {
    pub job_id: JobId,
    pub name: String,
    pub owner: String,
    pub url: String,
    pub severity: Severity,
    pub findings: usize,
    pub start_time: DateTime<Utc>,
    pub analysis_time: DateTime<Utc>,
}

impl From<&JobReport> for ReportListItem {
    fn from(r: &JobReport) -> Self {
        Self {
            job_id: r.job_id.clone(),
            name: r.name.clone(),
            owner: r.owner.clone(),
            url: r.url.clone(),
            severity: r.severity,
            findings: r.findings.len(),
            start_time: r.start_time,
            analysis_time: r.analysis_time,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ListReportsResponse {
    pub items: Vec<ReportListItem>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
}
