use std::sync::Arc;

use crate::analysis::{Heuristic, HeuristicFinding, HeuristicRegistry, Severity};
use crate::error::AnalysisError;
use crate::jobs::model::{JobExecutionData, TaskKind};

const MINUTE_MS: f64 = 60_000.0;

/// Mapper-time grading only kicks in for jobs with more maps than this.
const MANY_MAPS: usize = 50;

pub const SPILLED_RECORDS: &str = "SPILLED_RECORDS";
pub const MAP_OUTPUT_RECORDS: &str = "MAP_OUTPUT_RECORDS";

/// The heuristics the poller runs by default.
pub fn default_registry() -> Arc<HeuristicRegistry> {
    let mut registry = HeuristicRegistry::new();
    registry.register(DataSkew::new(TaskKind::Map));
    registry.register(DataSkew::new(TaskKind::Reduce));
    registry.register(MapperTime);
    registry.register(SpillRatio);
    Arc::new(registry)
}

/// Compares the mean input of the larger half of tasks with the smaller half.
pub struct DataSkew {
    kind: TaskKind,
    name: &'static str,
}

impl DataSkew {
    pub fn new(kind: TaskKind) -> Self {
        let name = match kind {
            TaskKind::Map => "Mapper Data Skew",
            TaskKind::Reduce => "Reducer Data Skew",
        };
        Self { kind, name }
    }
}

impl Heuristic for DataSkew {
    fn name(&self) -> &str {
        self.name
    }

    fn apply(&self, data: &JobExecutionData) -> Result<HeuristicFinding, AnalysisError> {
        let mut sizes = Vec::new();
        for task in data.tasks_of(self.kind) {
            if task.input_bytes < 0 {
                return Err(AnalysisError::InvalidData(format!(
                    "task input_bytes is negative ({})",
                    task.input_bytes
                )));
            }
            sizes.push(task.input_bytes);
        }

        if sizes.len() < 2 {
            return Ok(HeuristicFinding::new(self.name, Severity::None)
                .with_row(["Number of tasks".to_string(), sizes.len().to_string()]));
        }

        sizes.sort_unstable();
        let (small, large) = sizes.split_at(sizes.len() / 2);
        let small_mean = mean(small);
        let large_mean = mean(large);
        let ratio = large_mean / small_mean.max(1.0);

        let severity = Severity::ascending(ratio, 2.0, 4.0, 8.0, 16.0);

        Ok(HeuristicFinding::new(self.name, severity)
            .with_row(["Number of tasks".to_string(), sizes.len().to_string()])
            .with_row([
                "Group A".to_string(),
                format!("{} tasks @ {:.0} bytes avg", small.len(), small_mean),
            ])
            .with_row([
                "Group B".to_string(),
                format!("{} tasks @ {:.0} bytes avg", large.len(), large_mean),
            ]))
    }
}

/// Flags jobs that fan out into many very short mappers.
pub struct MapperTime;

impl Heuristic for MapperTime {
    fn name(&self) -> &str {
        "Mapper Time"
    }

    fn apply(&self, data: &JobExecutionData) -> Result<HeuristicFinding, AnalysisError> {
        let runtimes: Vec<i64> = data
            .tasks_of(TaskKind::Map)
            .map(|t| t.runtime_ms)
            .collect();

        if runtimes.iter().any(|&ms| ms < 0) {
            return Err(AnalysisError::InvalidData(
                "task runtime_ms is negative".into(),
            ));
        }

        if runtimes.is_empty() {
            return Ok(HeuristicFinding::new(self.name(), Severity::None)
                .with_row(["Number of tasks", "0"]));
        }

        let avg_ms = mean(&runtimes);
        let severity = if runtimes.len() > MANY_MAPS {
            Severity::descending(
                avg_ms,
                10.0 * MINUTE_MS,
                5.0 * MINUTE_MS,
                2.5 * MINUTE_MS,
                MINUTE_MS,
            )
        } else {
            Severity::None
        };

        Ok(HeuristicFinding::new(self.name(), severity)
            .with_row(["Number of tasks".to_string(), runtimes.len().to_string()])
            .with_row([
                "Average task time".to_string(),
                format!("{:.1}s", avg_ms / 1000.0),
            ]))
    }
}

/// Records spilled to disk per map output record.
pub struct SpillRatio;

impl Heuristic for SpillRatio {
    fn name(&self) -> &str {
        "Spill Ratio"
    }

    fn apply(&self, data: &JobExecutionData) -> Result<HeuristicFinding, AnalysisError> {
        let (Some(spilled), Some(output)) = (
            data.counter(SPILLED_RECORDS),
            data.counter(MAP_OUTPUT_RECORDS),
        ) else {
            return Ok(HeuristicFinding::new(self.name(), Severity::None)
                .with_row(["Spill ratio", "n/a"]));
        };

        if output <= 0 {
            return Ok(HeuristicFinding::new(self.name(), Severity::None)
                .with_row(["Spill ratio", "n/a"]));
        }

        let ratio = spilled as f64 / output as f64;
        let severity = Severity::ascending(ratio, 2.0, 2.5, 3.0, 3.5);

        Ok(HeuristicFinding::new(self.name(), severity)
            .with_row(["Spilled records".to_string(), spilled.to_string()])
            .with_row(["Map output records".to_string(), output.to_string()])
            .with_row(["Spill ratio".to_string(), format!("{ratio:.2}")]))
    }
}

fn mean(values: &[i64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().map(|&v| v as f64).sum::<f64>() / values.len() as f64
}
