pub mod model;
pub mod runner;
pub mod seen;
pub mod source;
pub mod stats;

pub use model::{JobExecutionData, JobId, JobStatusEntry, RunState, TaskKind, TaskSample};
pub use runner::{CycleSummary, JobOutcome, Poller, PollerConfig, PollerHandle};
pub use seen::SeenSet;
pub use source::{HttpJobSource, JobSource};
pub use stats::{PollerStats, StatsSnapshot};
