//! In-memory job registry.
//!
//! Owns every in-flight [`Job`] and the active-job-per-node index that
//! enforces the one-active-job-per-node invariant. All mutation happens
//! under a single write lock, so a reservation, activation, or phase change
//! is atomic with respect to every other caller; no lock is ever held
//! across an await.

use std::collections::HashMap;

use tokio::sync::RwLock;

use storyreel_core::error::CoreError;

use crate::job::{Job, JobId, JobPhase, JobResult};

#[derive(Default)]
struct Inner {
    jobs: HashMap<JobId, Job>,
    /// node_id -> job_id of the node's single active (non-terminal) job.
    active_by_node: HashMap<String, JobId>,
}

/// Registry of in-flight and recently finished jobs.
#[derive(Default)]
pub struct JobRegistry {
    inner: RwLock<Inner>,
}

impl JobRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reserve the active slot for a node before submitting to the provider.
    ///
    /// Rejects with `ConflictError` when the node already has an active job,
    /// so two submissions can never race past each other.
    pub async fn reserve(&self, node_id: &str, job_id: &JobId) -> Result<(), CoreError> {
        let mut inner = self.inner.write().await;
        if inner.active_by_node.contains_key(node_id) {
            return Err(CoreError::Conflict(format!(
                "Node {node_id} already has an active generation job"
            )));
        }
        inner
            .active_by_node
            .insert(node_id.to_string(), job_id.clone());
        Ok(())
    }

    /// Drop a reservation after a failed submission.
    pub async fn release(&self, node_id: &str, job_id: &JobId) {
        let mut inner = self.inner.write().await;
        if inner.active_by_node.get(node_id) == Some(job_id) {
            inner.active_by_node.remove(node_id);
        }
    }

    /// Record a successfully submitted job under its reservation.
    pub async fn activate(&self, job: Job) {
        let mut inner = self.inner.write().await;
        inner.jobs.insert(job.job_id.clone(), job);
    }

    /// Clone of a job's current record.
    pub async fn snapshot(&self, job_id: &str) -> Option<Job> {
        self.inner.read().await.jobs.get(job_id).cloned()
    }

    /// Whether a node currently has an active job.
    pub async fn has_active(&self, node_id: &str) -> bool {
        self.inner.read().await.active_by_node.contains_key(node_id)
    }

    /// Atomically move a job from `Polling` to `Finalizing`.
    ///
    /// Returns false when the job is already finalizing or terminal, in
    /// which case the caller must not run terminal handling itself.
    pub async fn begin_finalizing(&self, job_id: &str) -> bool {
        let mut inner = self.inner.write().await;
        match inner.jobs.get_mut(job_id) {
            Some(job) if matches!(job.phase, JobPhase::Polling) => {
                job.phase = JobPhase::Finalizing;
                true
            }
            _ => false,
        }
    }

    /// Return a finalizing job to `Polling` after a recoverable failure.
    pub async fn resume_polling(&self, job_id: &str) {
        let mut inner = self.inner.write().await;
        if let Some(job) = inner.jobs.get_mut(job_id) {
            if matches!(job.phase, JobPhase::Finalizing) {
                job.phase = JobPhase::Polling;
            }
        }
    }

    /// Record a failed poll transport; returns the new consecutive count.
    pub async fn record_transient(&self, job_id: &str) -> u32 {
        let mut inner = self.inner.write().await;
        match inner.jobs.get_mut(job_id) {
            Some(job) => {
                job.transient_failures += 1;
                job.transient_failures
            }
            None => 0,
        }
    }

    /// Reset the consecutive transient-failure count after a good poll.
    pub async fn reset_transient(&self, job_id: &str) {
        let mut inner = self.inner.write().await;
        if let Some(job) = inner.jobs.get_mut(job_id) {
            job.transient_failures = 0;
        }
    }

    /// Note that the provider reported progress; returns true the first
    /// time, when the node still needs its `pending -> processing` move.
    pub async fn note_progress(&self, job_id: &str) -> bool {
        let mut inner = self.inner.write().await;
        match inner.jobs.get_mut(job_id) {
            Some(job) if !job.saw_progress => {
                job.saw_progress = true;
                true
            }
            _ => false,
        }
    }

    /// Mark a job terminal with its cached result and free the node's
    /// active slot. The cached payload answers all later polls.
    pub async fn finish(&self, job_id: &str, result: JobResult) {
        let mut inner = self.inner.write().await;
        if let Some(job) = inner.jobs.get_mut(job_id) {
            let node_id = job.node_id.clone();
            job.phase = JobPhase::Terminal(result);
            if inner.active_by_node.get(&node_id) == Some(&job_id.to_string()) {
                inner.active_by_node.remove(&node_id);
            }
        }
    }

    /// Swap the node's active job during a moderation resubmission: the old
    /// job turns terminal with a `retrying` payload and the new job takes
    /// over the active slot, in one critical section.
    pub async fn swap_active(&self, old_job_id: &str, new_job: Job) {
        let mut inner = self.inner.write().await;
        let node_id = new_job.node_id.clone();
        let new_job_id = new_job.job_id.clone();

        if let Some(old) = inner.jobs.get_mut(old_job_id) {
            old.phase = JobPhase::Terminal(JobResult::Retrying {
                new_job_id: new_job_id.clone(),
            });
        }
        inner.active_by_node.insert(node_id, new_job_id);
        inner.jobs.insert(new_job.job_id.clone(), new_job);
    }
}
