//! Job orchestration for branching video stories.
//!
//! [`orchestrator::JobOrchestrator`] drives the per-request state machine
//! (submit, poll, moderation resubmission, completion pipeline) over the
//! trait seams of the provider, media, and store crates. [`registry`] keeps
//! the ephemeral in-memory job table with its one-active-job-per-node
//! invariant; [`poller::watch_job`] is the cancellable per-job poll driver.

pub mod context;
pub mod error;
pub mod job;
pub mod orchestrator;
pub mod poller;
pub mod registry;

pub use error::OrchestratorError;
pub use job::{Job, JobError, JobPhase, JobResult};
pub use orchestrator::{ContinueStory, JobOrchestrator, OrchestratorConfig, StartedGeneration};
pub use poller::{watch_job, DEFAULT_POLL_INTERVAL};
pub use registry::JobRegistry;
