//! Ephemeral job records and the poll result payload.
//!
//! A [`Job`] is one attempt to generate a node's clip. It lives only in the
//! in-memory registry: a process restart forgets all jobs, while the node
//! table remains the durable source of truth.

use serde::Serialize;
use storyreel_core::options::StoryOption;
use storyreel_core::status::OptionsSource;
use storyreel_provider::SubmitRequest;

pub type JobId = String;

/// One generation attempt against the provider.
#[derive(Debug, Clone)]
pub struct Job {
    pub job_id: JobId,
    pub node_id: String,
    pub story_id: String,
    /// The provider's own identifier for this job.
    pub provider_handle: String,
    /// 1 on first submission, 2 after the single moderation resubmission.
    pub attempt: u8,
    /// Consecutive poll transport failures; reset by any successful poll.
    pub transient_failures: u32,
    /// Whether the node has been moved to `processing` yet.
    pub saw_progress: bool,
    /// The request as submitted, kept for moderation resubmission.
    pub request: SubmitRequest,
    pub phase: JobPhase,
}

impl Job {
    pub fn new(
        job_id: JobId,
        node_id: String,
        story_id: String,
        provider_handle: String,
        attempt: u8,
        request: SubmitRequest,
    ) -> Self {
        Self {
            job_id,
            node_id,
            story_id,
            provider_handle,
            attempt,
            transient_failures: 0,
            saw_progress: false,
            request,
            phase: JobPhase::Polling,
        }
    }
}

/// Lifecycle phase of a job inside the registry.
#[derive(Debug, Clone)]
pub enum JobPhase {
    /// Awaiting a provider verdict; polls go to the wire.
    Polling,
    /// One poller is running the terminal-handling pipeline (download,
    /// extraction, resubmission). Concurrent polls see `processing`.
    Finalizing,
    /// Done. The cached payload answers every subsequent poll identically.
    Terminal(JobResult),
}

/// Structured failure payload persisted on the node and returned to callers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct JobError {
    pub code: String,
    pub message: String,
}

/// Externally visible result of polling a job.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum JobResult {
    /// Queued or running provider-side; poll again later.
    Processing,
    /// The prompt was softened and resubmitted; swap the polling target.
    Retrying { new_job_id: JobId },
    Completed {
        node_id: String,
        video_url: String,
        frame_url: String,
        options: Vec<StoryOption>,
        options_source: OptionsSource,
    },
    Failed { node_id: String, error: JobError },
}

impl JobResult {
    /// Whether this result ends the job.
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobResult::Completed { .. } | JobResult::Failed { .. })
    }
}
