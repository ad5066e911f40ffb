//! Per-job poll driver.
//!
//! Polling is an explicit, cancellable task owned by the caller — not an
//! ambient timer. The watcher drives [`JobOrchestrator::poll`] on a fixed
//! interval, transparently swaps its target when a moderation resubmission
//! returns a `new_job_id`, and resolves with the terminal payload.

use std::sync::Arc;
use std::time::Duration;

use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use crate::job::JobResult;
use crate::orchestrator::JobOrchestrator;

/// Default poll interval; the provider's guidance is 10-20 seconds.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(12);

/// Watch a job to its terminal state.
///
/// Returns `Some(result)` with the terminal payload, or `None` when the
/// token is cancelled or the job id is unknown. Cancellation only abandons
/// watching: the provider-side job runs on, and its result stays
/// retrievable through [`JobOrchestrator::poll`] for the orchestrator's
/// lifetime.
pub async fn watch_job(
    orchestrator: Arc<JobOrchestrator>,
    job_id: String,
    interval: Duration,
    cancel: CancellationToken,
) -> Option<JobResult> {
    let mut target = job_id;
    let mut ticker = tokio::time::interval(interval);
    // A slow poll must not cause a burst of catch-up polls.
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    // interval() fires immediately; skip that first tick so the provider
    // gets a head start before the first status check.
    ticker.tick().await;

    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                tracing::debug!(job_id = %target, "job watch cancelled");
                return None;
            }
            _ = ticker.tick() => {}
        }

        match orchestrator.poll(&target).await {
            Ok(JobResult::Processing) => continue,
            Ok(JobResult::Retrying { new_job_id }) => {
                tracing::info!(old_job_id = %target, new_job_id, "watch target swapped");
                target = new_job_id;
            }
            Ok(terminal) => return Some(terminal),
            Err(err) => {
                tracing::warn!(job_id = %target, error = %err, "job watch aborted");
                return None;
            }
        }
    }
}
