use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::fmt;

/// Opaque job handle assigned by the resource manager.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(String);

impl JobId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for JobId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for JobId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RunState {
    Prep,
    Running,
    Succeeded,
    Failed,
    Killed,
    #[serde(other)]
    Unknown,
}

impl RunState {
    pub fn as_str(&self) -> &'static str {
        match self {
            RunState::Prep => "PREP",
            RunState::Running => "RUNNING",
            RunState::Succeeded => "SUCCEEDED",
            RunState::Failed => "FAILED",
            RunState::Killed => "KILLED",
            RunState::Unknown => "UNKNOWN",
        }
    }
}

/// One row of the job list returned by the source on every poll.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobStatusEntry {
    pub id: JobId,
    pub state: RunState,
    pub complete: bool,
}

impl JobStatusEntry {
    pub fn new(id: impl Into<JobId>, state: RunState, complete: bool) -> Self {
        Self {
            id: id.into(),
            state,
            complete,
        }
    }

    pub fn is_successful(&self) -> bool {
        self.state == RunState::Succeeded && self.complete
    }
}

/// Ids of succeeded + complete jobs, in snapshot order, without duplicates.
pub fn successful_jobs(snapshot: &[JobStatusEntry]) -> Vec<JobId> {
    let mut seen = HashSet::new();
    snapshot
        .iter()
        .filter(|e| e.is_successful())
        .filter(|e| seen.insert(e.id.clone()))
        .map(|e| e.id.clone())
        .collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskKind {
    Map,
    Reduce,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskSample {
    pub kind: TaskKind,
    pub input_bytes: i64,
    pub runtime_ms: i64,
}

/// Full metadata for one finished job. `counters` and `tasks` are only read by
/// heuristics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobExecutionData {
    pub id: JobId,
    pub url: String,
    pub owner: String,
    pub start_time: DateTime<Utc>,
    pub name: String,

    #[serde(default)]
    pub counters: BTreeMap<String, i64>,
    #[serde(default)]
    pub tasks: Vec<TaskSample>,
}

impl JobExecutionData {
    pub fn counter(&self, name: &str) -> Option<i64> {
        self.counters.get(name).copied()
    }

    pub fn tasks_of(&self, kind: TaskKind) -> impl Iterator<Item = &TaskSample> {
        self.tasks.iter().filter(move |t| t.kind == kind)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_succeeded_and_complete_jobs_are_selected() {
        let snapshot = vec![
            JobStatusEntry::new("job_1", RunState::Succeeded, true),
            JobStatusEntry::new("job_2", RunState::Succeeded, false),
            JobStatusEntry::new("job_3", RunState::Failed, true),
            JobStatusEntry::new("job_4", RunState::Running, false),
            JobStatusEntry::new("job_5", RunState::Killed, true),
            JobStatusEntry::new("job_6", RunState::Succeeded, true),
            JobStatusEntry::new("job_1", RunState::Succeeded, true),
        ];

        let ids = successful_jobs(&snapshot);
        assert_eq!(ids, vec![JobId::from("job_1"), JobId::from("job_6")]);
    }

    #[test]
    fn unknown_run_states_deserialize_without_failing_the_list() {
        let raw = r#"[
            {"id": "job_1", "state": "SUCCEEDED", "complete": true},
            {"id": "job_2", "state": "SUSPENDED", "complete": false}
        ]"#;

        let entries: Vec<JobStatusEntry> = serde_json::from_str(raw).unwrap();
        assert_eq!(entries[0].state, RunState::Succeeded);
        assert_eq!(entries[1].state, RunState::Unknown);
    }
}
