//! The per-request generation state machine.
//!
//! One `JobOrchestrator` instance serves the whole deployment. Story-level
//! operations (`start_story`, `continue_story`) create nodes and submit
//! generation jobs; `poll` advances a job against the provider's reported
//! status and, on completion, runs the download -> frame extraction ->
//! option suggestion -> atomic node update pipeline. Moderation blocks get
//! exactly one softened resubmission; a second block fails the node.

use std::sync::Arc;

use storyreel_core::clip::{self, ClipParams};
use storyreel_core::error::CoreError;
use storyreel_core::ids::IdSource;
use storyreel_core::options::{fallback_options, normalize_options};
use storyreel_core::prompt::{self, ContextBudget};
use storyreel_core::status::{
    NodeStatus, OptionsSource, CODE_EXTRACTION_FAILED, CODE_MODERATION_EXHAUSTED,
    CODE_PROVIDER_FAILED, CODE_PROVIDER_UNREACHABLE, CODE_SUBMISSION_REJECTED,
};
use storyreel_db::models::{NewNode, StoryNode};
use storyreel_db::repositories::NodeRepo;
use storyreel_db::DbPool;
use storyreel_media::store::validate_segment;
use storyreel_media::{FrameExtractor, MediaStore};
use storyreel_provider::{GenerationClient, OptionSuggester, PollOutcome, ProviderError, SubmitRequest};

use crate::context::path_beats;
use crate::error::OrchestratorError;
use crate::job::{Job, JobError, JobPhase, JobResult};
use crate::registry::JobRegistry;

/// Orchestrator tunables.
#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    /// Consecutive failed poll transports before the node fails with
    /// `provider_unreachable`.
    pub max_transient_polls: u32,
    /// Budget for context included in composed prompts.
    pub context_budget: ContextBudget,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            max_transient_polls: 8,
            context_budget: ContextBudget::default(),
        }
    }
}

/// Budget for the context handed to the option suggester. Wider than the
/// prompt budget: the suggestion model benefits from more story, and its
/// context never lands inside a generation prompt.
const SUGGESTION_CONTEXT_BUDGET: ContextBudget = ContextBudget {
    max_beats: 6,
    max_chars: 1000,
};

/// Handle returned by `start_story` / `continue_story`.
#[derive(Debug, Clone, serde::Serialize)]
pub struct StartedGeneration {
    pub job_id: String,
    pub node_id: String,
}

/// Parameters for continuing a story from a completed node.
#[derive(Debug, Clone)]
pub struct ContinueStory {
    pub story_id: String,
    pub parent_node_id: String,
    pub choice_label: String,
    pub provider_prompt: String,
    pub include_context: bool,
    pub params: ClipParams,
}

/// Drives generation jobs for all stories of a deployment.
pub struct JobOrchestrator {
    pool: DbPool,
    media: MediaStore,
    client: Arc<dyn GenerationClient>,
    suggester: Arc<dyn OptionSuggester>,
    extractor: Arc<dyn FrameExtractor>,
    ids: Arc<dyn IdSource>,
    registry: JobRegistry,
    config: OrchestratorConfig,
}

impl JobOrchestrator {
    pub fn new(
        pool: DbPool,
        media: MediaStore,
        client: Arc<dyn GenerationClient>,
        suggester: Arc<dyn OptionSuggester>,
        extractor: Arc<dyn FrameExtractor>,
        ids: Arc<dyn IdSource>,
        config: OrchestratorConfig,
    ) -> Self {
        Self {
            pool,
            media,
            client,
            suggester,
            extractor,
            ids,
            registry: JobRegistry::new(),
            config,
        }
    }

    pub fn pool(&self) -> &DbPool {
        &self.pool
    }

    // -- story-level operations ---------------------------------------------

    /// Create a story's root node and submit its generation.
    pub async fn start_story(
        &self,
        story_id: &str,
        base_prompt: &str,
        params: ClipParams,
    ) -> Result<StartedGeneration, OrchestratorError> {
        validate_segment(story_id)
            .map_err(|_| CoreError::Validation(format!("Invalid story id: '{story_id}'")))?;
        clip::validate_prompt(base_prompt)?;
        params.validate()?;

        let node = NodeRepo::create_root(
            &self.pool,
            &NewNode {
                id: self.ids.generate(),
                story_id: story_id.to_string(),
                parent_id: None,
                choice_label: None,
                prompt: base_prompt.to_string(),
                base_prompt: base_prompt.to_string(),
                seconds: params.seconds,
                size: params.size.clone(),
                model: params.model.clone(),
            },
        )
        .await?;

        tracing::info!(story_id, node_id = %node.id, "story root created");
        self.start_generation(&node, None).await
    }

    /// Create a child node from a chosen option and submit its generation.
    ///
    /// The parent must be `completed`: its extracted last frame is the
    /// child's visual continuity anchor and is attached as the reference
    /// image. With `include_context`, the prompt is prefixed with the
    /// budgeted condensation of the beats along the branch taken.
    pub async fn continue_story(
        &self,
        req: ContinueStory,
    ) -> Result<StartedGeneration, OrchestratorError> {
        validate_segment(&req.story_id)
            .map_err(|_| CoreError::Validation(format!("Invalid story id: '{}'", req.story_id)))?;
        clip::validate_prompt(&req.provider_prompt)?;
        req.params.validate()?;

        let parent = NodeRepo::find_by_id(&self.pool, &req.parent_node_id)
            .await?
            .filter(|n| n.story_id == req.story_id)
            .ok_or_else(|| CoreError::ParentNotFound {
                story_id: req.story_id.clone(),
                parent_id: req.parent_node_id.clone(),
            })?;

        if parent.node_status()? != NodeStatus::Completed {
            return Err(CoreError::Conflict(format!(
                "Parent node {} has not completed (status: {})",
                parent.id, parent.status
            ))
            .into());
        }
        let frame_key = parent.frame_key.as_deref().ok_or_else(|| {
            CoreError::Internal(format!("Completed node {} has no frame key", parent.id))
        })?;
        let frame_bytes = self.media.read(frame_key).await?;

        let final_prompt = if req.include_context {
            let nodes = NodeRepo::list_by_story(&self.pool, &req.story_id).await?;
            let beats = path_beats(&nodes, &parent.id);
            let context = prompt::condense(&beats, &self.config.context_budget);
            prompt::compose(&req.provider_prompt, Some(&context))
        } else {
            req.provider_prompt.clone()
        };

        let node = NodeRepo::create_child(
            &self.pool,
            &NewNode {
                id: self.ids.generate(),
                story_id: req.story_id.clone(),
                parent_id: Some(parent.id.clone()),
                choice_label: Some(req.choice_label.clone()),
                prompt: final_prompt,
                base_prompt: req.provider_prompt.clone(),
                seconds: req.params.seconds,
                size: req.params.size.clone(),
                model: req.params.model.clone(),
            },
        )
        .await?;

        tracing::info!(
            story_id = %req.story_id,
            node_id = %node.id,
            parent_id = %parent.id,
            "story continued"
        );
        self.start_generation(&node, Some(frame_bytes)).await
    }

    // -- per-job state machine ----------------------------------------------

    /// Submit a node's generation request and register the resulting job.
    ///
    /// Non-blocking: returns as soon as the provider accepts the request.
    /// An outright rejection marks the node `failed` (`submission_rejected`)
    /// and surfaces the provider error to the caller.
    pub async fn start_generation(
        &self,
        node: &StoryNode,
        reference_frame: Option<Vec<u8>>,
    ) -> Result<StartedGeneration, OrchestratorError> {
        let job_id = self.ids.generate();
        self.registry.reserve(&node.id, &job_id).await?;

        let request = SubmitRequest {
            model: node.model.clone(),
            prompt: node.prompt.clone(),
            seconds: node.seconds,
            size: node.size.clone(),
            reference_image: reference_frame,
        };

        match self.client.submit(&request).await {
            Ok(handle) => {
                tracing::info!(
                    job_id,
                    node_id = %node.id,
                    provider_handle = %handle,
                    "generation job submitted"
                );
                self.registry
                    .activate(Job::new(
                        job_id.clone(),
                        node.id.clone(),
                        node.story_id.clone(),
                        handle,
                        1,
                        request,
                    ))
                    .await;
                Ok(StartedGeneration {
                    job_id,
                    node_id: node.id.clone(),
                })
            }
            Err(err) => {
                self.registry.release(&node.id, &job_id).await;
                let code = match &err {
                    ProviderError::Transient(_) => CODE_PROVIDER_UNREACHABLE,
                    _ => CODE_SUBMISSION_REJECTED,
                };
                NodeRepo::fail(&self.pool, &node.id, code, &err.to_string()).await?;
                tracing::warn!(node_id = %node.id, error = %err, "submission rejected");
                Err(err.into())
            }
        }
    }

    /// Advance a job one poll step and report its externally visible status.
    ///
    /// Terminal jobs answer from the cached payload with no side effects.
    pub async fn poll(&self, job_id: &str) -> Result<JobResult, OrchestratorError> {
        let job = self
            .registry
            .snapshot(job_id)
            .await
            .ok_or_else(|| CoreError::NotFound {
                entity: "job",
                id: job_id.to_string(),
            })?;

        match &job.phase {
            JobPhase::Terminal(result) => return Ok(result.clone()),
            // Another poller is already running terminal handling.
            JobPhase::Finalizing => return Ok(JobResult::Processing),
            JobPhase::Polling => {}
        }

        let outcome = match self.client.poll(&job.provider_handle).await {
            Ok(outcome) => outcome,
            Err(err) if err.is_transient() => {
                return self.note_transient(&job, &err).await;
            }
            Err(err) => {
                // A non-transient poll error is a provider verdict on the job.
                let result = self
                    .fail_job(&job, CODE_PROVIDER_FAILED, &err.to_string())
                    .await?;
                return Ok(result);
            }
        };

        match outcome {
            PollOutcome::Queued | PollOutcome::Running => {
                self.registry.reset_transient(job_id).await;
                if self.registry.note_progress(job_id).await {
                    self.ensure_processing(&job.node_id).await?;
                }
                Ok(JobResult::Processing)
            }

            PollOutcome::Completed { download_url } => {
                if !self.registry.begin_finalizing(job_id).await {
                    return Ok(JobResult::Processing);
                }
                match self.complete_job(&job, download_url.as_deref()).await {
                    Ok(result) => {
                        self.registry.finish(job_id, result.clone()).await;
                        Ok(result)
                    }
                    Err(OrchestratorError::Provider(err)) if err.is_transient() => {
                        // Download hiccup: stay in flight, retry next poll.
                        self.registry.resume_polling(job_id).await;
                        self.note_transient(&job, &err).await
                    }
                    Err(OrchestratorError::Extraction(err)) => {
                        let result = self
                            .fail_job(&job, CODE_EXTRACTION_FAILED, &err.to_string())
                            .await?;
                        Ok(result)
                    }
                    Err(other) => {
                        // Store trouble: leave the job pollable, surface it.
                        self.registry.resume_polling(job_id).await;
                        Err(other)
                    }
                }
            }

            PollOutcome::Blocked { message } => {
                if !self.registry.begin_finalizing(job_id).await {
                    return Ok(JobResult::Processing);
                }
                if job.attempt >= 2 {
                    let result = self
                        .fail_job(&job, CODE_MODERATION_EXHAUSTED, &message)
                        .await?;
                    return Ok(result);
                }
                self.resubmit_softened(&job).await
            }

            PollOutcome::Failed { code, message } => {
                tracing::warn!(job_id, code = %code, "provider failed the job");
                let result = self.fail_job(&job, CODE_PROVIDER_FAILED, &message).await?;
                Ok(result)
            }
        }
    }

    // -- pipeline steps ------------------------------------------------------

    /// Soften the blocked prompt and resubmit as a new job (attempt 2),
    /// atomically swapping the node's active job.
    async fn resubmit_softened(&self, job: &Job) -> Result<JobResult, OrchestratorError> {
        // A block is progress: the provider looked at the job. The node may
        // still be pending when the block arrives on the first poll.
        self.ensure_processing(&job.node_id).await?;
        let softened = prompt::soften(&job.request.prompt);
        NodeRepo::set_prompt(&self.pool, &job.node_id, &softened).await?;

        let request = SubmitRequest {
            prompt: softened,
            ..job.request.clone()
        };

        match self.client.submit(&request).await {
            Ok(handle) => {
                let new_job_id = self.ids.generate();
                tracing::info!(
                    old_job_id = %job.job_id,
                    new_job_id,
                    node_id = %job.node_id,
                    "moderation block, softened prompt resubmitted"
                );
                let mut replacement = Job::new(
                    new_job_id.clone(),
                    job.node_id.clone(),
                    job.story_id.clone(),
                    handle,
                    2,
                    request,
                );
                // The node is already processing; no second pending move.
                replacement.saw_progress = true;
                self.registry.swap_active(&job.job_id, replacement).await;
                Ok(JobResult::Retrying { new_job_id })
            }
            Err(ProviderError::Moderation(message)) => {
                // The softened prompt was blocked at the door: that is the
                // second moderation verdict for this node.
                let result = self
                    .fail_job(job, CODE_MODERATION_EXHAUSTED, &message)
                    .await?;
                Ok(result)
            }
            Err(err) if err.is_transient() => {
                // Resubmission is retried from the same blocked verdict on
                // the next poll; softening is idempotent.
                self.registry.resume_polling(&job.job_id).await;
                self.note_transient(job, &err).await
            }
            Err(err) => {
                let result = self
                    .fail_job(job, CODE_SUBMISSION_REJECTED, &err.to_string())
                    .await?;
                Ok(result)
            }
        }
    }

    /// Download, materialize, extract the anchor frame, obtain options, and
    /// commit the node as completed in one atomic update.
    async fn complete_job(
        &self,
        job: &Job,
        download_url: Option<&str>,
    ) -> Result<JobResult, OrchestratorError> {
        let bytes = self
            .client
            .download(&job.provider_handle, download_url)
            .await?;

        let video_key = self
            .media
            .write_video(&job.story_id, &job.node_id, &bytes)
            .await?;
        let video_path = self.media.absolute_path(&video_key)?;
        let (frame_key, frame_path) = self.media.frame_target(&job.story_id, &job.node_id).await?;

        let (width, height) = clip::parse_size(&job.request.size)?;
        self.extractor
            .extract_last_frame(&video_path, &frame_path, width, height)
            .await?;

        // The provider can jump straight from queued to completed between
        // polls, leaving the node pending.
        self.ensure_processing(&job.node_id).await?;

        // Options are generated exactly once per node: finalizing is
        // single-entry and a blocked first attempt never reaches completion,
        // so there is nothing persisted to reuse at this point.
        let (options, source) = self.obtain_options(job, &frame_key).await;

        let node = NodeRepo::complete(
            &self.pool,
            &job.node_id,
            &video_key,
            &frame_key,
            &options,
            source,
        )
        .await?;

        tracing::info!(
            job_id = %job.job_id,
            node_id = %node.id,
            video_key = %video_key,
            options_source = source.as_str(),
            "node completed"
        );

        Ok(JobResult::Completed {
            node_id: node.id,
            video_url: MediaStore::url_for(&video_key),
            frame_url: MediaStore::url_for(&frame_key),
            options,
            options_source: source,
        })
    }

    /// Ask the suggester for continuation options; fall back to the
    /// deterministic built-in set on any failure. Never fails the clip.
    async fn obtain_options(
        &self,
        job: &Job,
        frame_key: &str,
    ) -> (Vec<storyreel_core::options::StoryOption>, OptionsSource) {
        let context = match NodeRepo::list_by_story(&self.pool, &job.story_id).await {
            Ok(nodes) => {
                let beats = path_beats(&nodes, &job.node_id);
                prompt::condense(&beats, &SUGGESTION_CONTEXT_BUDGET)
            }
            Err(err) => {
                tracing::warn!(error = %err, "could not load story for option context");
                String::new()
            }
        };
        let frame = self.media.read(frame_key).await.ok();

        match self.suggester.suggest(&context, frame.as_deref()).await {
            Ok(raw) => match normalize_options(raw) {
                Some(options) => (options, OptionsSource::Model),
                None => {
                    tracing::warn!(node_id = %job.node_id, "suggester returned unusable options");
                    (fallback_options(), OptionsSource::Fallback)
                }
            },
            Err(err) => {
                tracing::warn!(node_id = %job.node_id, error = %err, "option suggestion failed");
                (fallback_options(), OptionsSource::Fallback)
            }
        }
    }

    /// Promote a still-pending node to `processing`.
    async fn ensure_processing(&self, node_id: &str) -> Result<(), OrchestratorError> {
        let node = NodeRepo::get(&self.pool, node_id).await?;
        if node.node_status()? == NodeStatus::Pending {
            NodeRepo::mark_processing(&self.pool, node_id).await?;
        }
        Ok(())
    }

    /// Absorb one failed poll transport; past the cap the node fails with
    /// `provider_unreachable`.
    async fn note_transient(
        &self,
        job: &Job,
        err: &ProviderError,
    ) -> Result<JobResult, OrchestratorError> {
        let count = self.registry.record_transient(&job.job_id).await;
        tracing::warn!(
            job_id = %job.job_id,
            consecutive = count,
            error = %err,
            "transient poll failure"
        );
        if count >= self.config.max_transient_polls {
            let result = self
                .fail_job(job, CODE_PROVIDER_UNREACHABLE, &err.to_string())
                .await?;
            return Ok(result);
        }
        Ok(JobResult::Processing)
    }

    /// Persist a node failure and retire the job with its cached payload.
    async fn fail_job(
        &self,
        job: &Job,
        code: &str,
        message: &str,
    ) -> Result<JobResult, OrchestratorError> {
        NodeRepo::fail(&self.pool, &job.node_id, code, message).await?;
        let result = JobResult::Failed {
            node_id: job.node_id.clone(),
            error: JobError {
                code: code.to_string(),
                message: message.to_string(),
            },
        };
        self.registry.finish(&job.job_id, result.clone()).await;
        tracing::warn!(job_id = %job.job_id, node_id = %job.node_id, code, "node failed");
        Ok(result)
    }
}
