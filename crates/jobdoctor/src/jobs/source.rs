use async_trait::async_trait;
use reqwest::{StatusCode, Url};
use std::time::Duration;

use crate::error::SourceError;
use crate::jobs::model::{JobExecutionData, JobId, JobStatusEntry};

/// The resource manager, seen from the poller.
#[async_trait]
pub trait JobSource: Send + Sync {
    /// Current status of every job the source still knows about.
    async fn list_jobs(&self) -> Result<Vec<JobStatusEntry>, SourceError>;

    /// Execution data for one job, `None` when the source has already
    /// dropped it.
    async fn fetch_job_data(&self, job_id: &JobId)
        -> Result<Option<JobExecutionData>, SourceError>;
}

/// JSON-over-HTTP job source.
///
/// - `GET {base}/jobs` -> `[{"id", "state", "complete"}]`
/// - `GET {base}/jobs/{id}` -> execution data, `404` once the job is gone
#[derive(Clone)]
pub struct HttpJobSource {
    client: reqwest::Client,
    base_url: Url,
}

impl HttpJobSource {
    pub fn new(base_url: &str, timeout: Duration) -> anyhow::Result<Self> {
        let base_url = Url::parse(base_url)?;
        if base_url.cannot_be_a_base() {
            anyhow::bail!("job source url {base_url} cannot take a path");
        }
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self { client, base_url })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// `base` + one percent-encoded path segment per entry.
    fn endpoint(&self, segments: &[&str]) -> Url {
        let mut url = self.base_url.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }
}

#[async_trait]
impl JobSource for HttpJobSource {
    async fn list_jobs(&self) -> Result<Vec<JobStatusEntry>, SourceError> {
        let url = self.endpoint(&["jobs"]);

        let resp = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| SourceError::Unavailable(e.to_string()))?;

        if !resp.status().is_success() {
            return Err(SourceError::Unavailable(format!(
                "job list returned HTTP {}",
                resp.status().as_u16()
            )));
        }

        // A literal `null` body means the source had nothing to give us.
        let jobs: Option<Vec<JobStatusEntry>> = resp
            .json()
            .await
            .map_err(|e| SourceError::Unavailable(format!("undecodable job list: {e}")))?;

        jobs.ok_or_else(|| SourceError::Unavailable("job source returned a null job list".into()))
    }

    async fn fetch_job_data(
        &self,
        job_id: &JobId,
    ) -> Result<Option<JobExecutionData>, SourceError> {
        let url = self.endpoint(&["jobs", job_id.as_str()]);

        let resp = self.client.get(url.clone()).send().await?;

        match resp.status() {
            StatusCode::NOT_FOUND | StatusCode::GONE => Ok(None),
            status if status.is_success() => Ok(Some(resp.json().await?)),
            status => Err(SourceError::Http {
                status: status.as_u16(),
                url: url.to_string(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn source(base: &str) -> HttpJobSource {
        HttpJobSource::new(base, Duration::from_secs(1)).unwrap()
    }

    #[test]
    fn job_ids_are_one_encoded_path_segment() {
        let src = source("http://rm.example:8088/api/");
        let url = src.endpoint(&["jobs", "team/etl?run#3"]);
        assert_eq!(
            url.as_str(),
            "http://rm.example:8088/api/jobs/team%2Fetl%3Frun%233"
        );
        assert_eq!(url.query(), None);
        assert_eq!(url.fragment(), None);
    }

    #[test]
    fn trailing_slash_on_the_base_is_optional() {
        assert_eq!(
            source("http://rm:8088").endpoint(&["jobs"]).as_str(),
            "http://rm:8088/jobs"
        );
        assert_eq!(
            source("http://rm:8088/").endpoint(&["jobs"]).as_str(),
            "http://rm:8088/jobs"
        );
    }

    #[test]
    fn rejects_urls_without_a_path() {
        assert!(HttpJobSource::new("mailto:ops@example.com", Duration::from_secs(1)).is_err());
        assert!(HttpJobSource::new("not a url", Duration::from_secs(1)).is_err());
    }
}
