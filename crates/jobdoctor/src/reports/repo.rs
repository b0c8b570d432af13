use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;
use sqlx::{FromRow, PgPool};

use crate::analysis::{HeuristicFinding, Severity};
use crate::error::StoreError;
use crate::jobs::model::JobId;
use crate::reports::{JobReport, ReportStore};

#[derive(Debug, FromRow)]
struct ReportRow {
    job_id: String,
    url: String,
    owner: String,
    name: String,
    start_time: DateTime<Utc>,
    analysis_time: DateTime<Utc>,
    severity: i16,
}

#[derive(Debug, FromRow)]
struct FindingRow {
    analysis: String,
    severity: i16,
    detail_json: Value,
    detail_columns: i32,
}

/// Postgres-backed report store (`job_reports` + `job_report_findings`).
#[derive(Clone)]
pub struct PgReportStore {
    pool: PgPool,
}

impl PgReportStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    async fn load_findings(&self, job_id: &str) -> Result<Vec<HeuristicFinding>, StoreError> {
        let rows = sqlx::query_as::<_, FindingRow>(
            r#"
            SELECT analysis, severity, detail_json, detail_columns
            FROM job_report_findings
            WHERE job_id = $1
            ORDER BY position ASC
            "#,
        )
        .bind(job_id)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter()
            .map(|r| {
                let detail: Vec<Vec<String>> = serde_json::from_value(r.detail_json)
                    .map_err(|e| StoreError::Malformed(format!("detail_json: {e}")))?;
                Ok(HeuristicFinding {
                    analysis: r.analysis,
                    severity: severity_from_db(r.severity)?,
                    detail,
                    columns: r.detail_columns,
                })
            })
            .collect()
    }

    async fn hydrate(&self, row: ReportRow) -> Result<JobReport, StoreError> {
        let findings = self.load_findings(&row.job_id).await?;
        Ok(JobReport {
            job_id: JobId::new(row.job_id),
            url: row.url,
            owner: row.owner,
            start_time: row.start_time,
            analysis_time: row.analysis_time,
            name: row.name,
            severity: severity_from_db(row.severity)?,
            findings,
        })
    }
}

#[async_trait]
impl ReportStore for PgReportStore {
    async fn find_by_id(&self, job_id: &JobId) -> Result<Option<JobReport>, StoreError> {
        let row = sqlx::query_as::<_, ReportRow>(
            r#"
            SELECT job_id, url, owner, name, start_time, analysis_time, severity
            FROM job_reports
            WHERE job_id = $1
            "#,
        )
        .bind(job_id.as_str())
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => Ok(Some(self.hydrate(row).await?)),
            None => Ok(None),
        }
    }

    /// Header and findings go in one transaction; a half-written report is
    /// never visible to `find_by_id`.
    async fn save(&self, report: &JobReport) -> Result<(), StoreError> {
        let mut tx = self.pool.begin().await?;

        let inserted = sqlx::query(
            r#"
            INSERT INTO job_reports (
                job_id, url, owner, name, start_time, analysis_time, severity
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(report.job_id.as_str())
        .bind(&report.url)
        .bind(&report.owner)
        .bind(&report.name)
        .bind(report.start_time)
        .bind(report.analysis_time)
        .bind(report.severity.value())
        .execute(&mut *tx)
        .await;

        if let Err(e) = inserted {
            return Err(match e {
                sqlx::Error::Database(db) if db.is_unique_violation() => {
                    StoreError::Rejected(report.job_id.clone())
                }
                other => other.into(),
            });
        }

        for (position, finding) in report.findings.iter().enumerate() {
            let detail_json = serde_json::to_value(&finding.detail)
                .map_err(|e| StoreError::Malformed(format!("detail_json: {e}")))?;

            sqlx::query(
                r#"
                INSERT INTO job_report_findings (
                    job_id, position, analysis, severity, detail_json, detail_columns
                )
                VALUES ($1, $2, $3, $4, $5, $6)
                "#,
            )
            .bind(report.job_id.as_str())
            .bind(position as i32)
            .bind(&finding.analysis)
            .bind(finding.severity.value())
            .bind(detail_json)
            .bind(finding.columns)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    async fn list_recent(&self, limit: i64) -> Result<Vec<JobReport>, StoreError> {
        let rows = sqlx::query_as::<_, ReportRow>(
            r#"
            SELECT job_id, url, owner, name, start_time, analysis_time, severity
            FROM job_reports
            ORDER BY analysis_time DESC, job_id ASC
            LIMIT $1
            "#,
        )
        .bind(limit.max(0))
        .fetch_all(&self.pool)
        .await?;

        let mut out = Vec::with_capacity(rows.len());
        for row in rows {
            out.push(self.hydrate(row).await?);
        }
        Ok(out)
    }
}

fn severity_from_db(v: i16) -> Result<Severity, StoreError> {
    Severity::from_value(v).ok_or_else(|| StoreError::Malformed(format!("severity {v}")))
}
