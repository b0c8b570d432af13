use std::collections::HashSet;
use std::sync::{Mutex, MutexGuard};

use crate::error::StoreError;
use crate::jobs::model::JobId;
use crate::reports::ReportStore;

#[derive(Debug, Default)]
struct SeenState {
    ids: HashSet<JobId>,
    reconciled: bool,
}

/// Jobs already reported during this process lifetime.
///
/// The first `reconcile` seeds the set from the report store; later calls
/// only prune it against the live job list.
#[derive(Debug, Default)]
pub struct SeenSet {
    state: Mutex<SeenState>,
}

impl SeenSet {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, SeenState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn is_reconciled(&self) -> bool {
        self.lock().reconciled
    }

    /// Return the ids in `candidates` that still need analysis.
    ///
    /// `candidates` is the succeeded + complete subset of the current
    /// snapshot. On a store error nothing is recorded and the first-run pass
    /// is retried on the next call.
    pub async fn reconcile(
        &self,
        candidates: &[JobId],
        store: &dyn ReportStore,
    ) -> Result<Vec<JobId>, StoreError> {
        let mut unique = HashSet::with_capacity(candidates.len());
        let candidates: Vec<JobId> = candidates
            .iter()
            .filter(|id| unique.insert((*id).clone()))
            .cloned()
            .collect();

        if !self.is_reconciled() {
            let mut fresh = Vec::new();
            let mut known = Vec::new();
            for id in candidates {
                match store.find_by_id(&id).await? {
                    Some(_) => known.push(id),
                    None => fresh.push(id),
                }
            }

            let mut state = self.lock();
            state.ids.extend(known);
            state.reconciled = true;
            fresh.retain(|id| !state.ids.contains(id));
            return Ok(fresh);
        }

        let mut state = self.lock();
        // The source decides what still exists.
        state.ids.retain(|id| unique.contains(id));
        Ok(candidates
            .into_iter()
            .filter(|id| !state.ids.contains(id))
            .collect())
    }

    /// Record a job whose report has been persisted.
    pub fn mark_analyzed(&self, job_id: JobId) {
        self.lock().ids.insert(job_id);
    }

    pub fn contains(&self, job_id: &JobId) -> bool {
        self.lock().ids.contains(job_id)
    }

    pub fn len(&self) -> usize {
        self.lock().ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().ids.is_empty()
    }
}
