use chrono::{DateTime, SubsecRound, Utc};
use serde::{Deserialize, Serialize};

use crate::analysis::{HeuristicFinding, Severity};
use crate::jobs::model::{JobExecutionData, JobId};

pub const TRUNCATION_MARKER: &str = "...";

/// Persisted outcome of analysing one job. Written once, never updated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobReport {
    pub job_id: JobId,
    pub url: String,
    pub owner: String,
    pub start_time: DateTime<Utc>,
    pub analysis_time: DateTime<Utc>,
    pub name: String,
    pub severity: Severity,
    pub findings: Vec<HeuristicFinding>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReportLimits {
    /// Maximum display name length in characters, marker included.
    pub name_max_len: usize,
    pub min_detail_columns: i32,
}

impl Default for ReportLimits {
    fn default() -> Self {
        Self {
            name_max_len: 100,
            min_detail_columns: 1,
        }
    }
}

/// Assemble the report for `job_id` out of its data and pipeline output.
///
/// Timestamps are cut to microseconds so a report read back from Postgres
/// compares equal to the one that was saved.
pub fn build_report(
    job_id: &JobId,
    data: &JobExecutionData,
    findings: Vec<HeuristicFinding>,
    limits: &ReportLimits,
    analysis_time: DateTime<Utc>,
) -> JobReport {
    let findings: Vec<HeuristicFinding> = findings
        .into_iter()
        .map(|mut f| {
            f.columns = clamp_columns(f.columns, limits.min_detail_columns);
            f
        })
        .collect();

    let severity = Severity::worst(findings.iter().map(|f| f.severity));

    JobReport {
        job_id: job_id.clone(),
        url: data.url.clone(),
        owner: data.owner.clone(),
        start_time: data.start_time.trunc_subsecs(6),
        analysis_time: analysis_time.trunc_subsecs(6),
        name: truncate_name(&data.name, limits.name_max_len),
        severity,
        findings,
    }
}

/// Cut `name` to `max_len` characters, the last three replaced by the marker.
pub fn truncate_name(name: &str, max_len: usize) -> String {
    if name.chars().count() <= max_len {
        return name.to_string();
    }

    let marker_len = TRUNCATION_MARKER.chars().count();
    if max_len <= marker_len {
        return name.chars().take(max_len).collect();
    }

    let mut out: String = name.chars().take(max_len - marker_len).collect();
    out.push_str(TRUNCATION_MARKER);
    out
}

pub fn clamp_columns(columns: i32, min: i32) -> i32 {
    columns.max(min)
}
