pub mod heuristics;
pub mod severity;

pub use heuristics::default_registry;
pub use severity::Severity;

use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::error::AnalysisError;
use crate::jobs::model::JobExecutionData;

/// Result of one heuristic: a grade plus a small table explaining it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HeuristicFinding {
    pub analysis: String,
    pub severity: Severity,
    pub detail: Vec<Vec<String>>,
    pub columns: i32,
}

impl HeuristicFinding {
    pub fn new(analysis: impl Into<String>, severity: Severity) -> Self {
        Self {
            analysis: analysis.into(),
            severity,
            detail: Vec::new(),
            columns: 0,
        }
    }

    /// Append a detail row; `columns` tracks the widest row.
    pub fn with_row<I, S>(mut self, cells: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let row: Vec<String> = cells.into_iter().map(Into::into).collect();
        self.columns = self.columns.max(row.len() as i32);
        self.detail.push(row);
        self
    }
}

/// A single diagnostic rule.
pub trait Heuristic: Send + Sync {
    fn name(&self) -> &str;

    fn apply(&self, data: &JobExecutionData) -> Result<HeuristicFinding, AnalysisError>;
}

/// Turns a job's execution data into findings. Must not have side effects;
/// the poller calls it at most once per job.
pub trait AnalysisPipeline: Send + Sync {
    fn analyze(&self, data: &JobExecutionData) -> Result<Vec<HeuristicFinding>, AnalysisError>;
}

/// Ordered set of heuristics; findings come back in registration order.
#[derive(Clone, Default)]
pub struct HeuristicRegistry {
    heuristics: Vec<Arc<dyn Heuristic>>,
}

impl HeuristicRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<H>(&mut self, heuristic: H)
    where
        H: Heuristic + 'static,
    {
        self.heuristics.push(Arc::new(heuristic));
    }

    pub fn names(&self) -> Vec<&str> {
        self.heuristics.iter().map(|h| h.name()).collect()
    }

    pub fn len(&self) -> usize {
        self.heuristics.len()
    }

    pub fn is_empty(&self) -> bool {
        self.heuristics.is_empty()
    }
}

impl AnalysisPipeline for HeuristicRegistry {
    fn analyze(&self, data: &JobExecutionData) -> Result<Vec<HeuristicFinding>, AnalysisError> {
        self.heuristics
            .iter()
            .map(|h| {
                h.apply(data).map_err(|e| match e {
                    AnalysisError::InvalidData(message) => AnalysisError::Heuristic {
                        heuristic: h.name().to_string(),
                        message,
                    },
                    other => other,
                })
            })
            .collect()
    }
}
