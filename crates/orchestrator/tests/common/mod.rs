//! Shared test fixtures: scripted fakes behind the provider/media trait
//! seams and a harness that wires a full orchestrator over a temp media
//! root and a migrated test database.

use std::collections::VecDeque;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use storyreel_core::ids::SequenceIds;
use storyreel_core::options::StoryOption;
use storyreel_db::DbPool;
use storyreel_media::{ExtractionError, FrameExtractor, MediaStore};
use storyreel_orchestrator::{JobOrchestrator, OrchestratorConfig};
use storyreel_provider::{
    GenerationClient, OptionSuggester, PollOutcome, ProviderError, SubmitRequest,
};

pub const CLIP_BYTES: &[u8] = b"fake-clip-bytes";
pub const FRAME_BYTES: &[u8] = b"fake-frame-bytes";

// ---------------------------------------------------------------------------
// Scripted generation client
// ---------------------------------------------------------------------------

/// Generation client driven by scripted submit/poll outcomes.
///
/// Submissions are recorded for assertions; poll outcomes are consumed
/// front-to-back, with `Running` once the script is exhausted.
#[derive(Default)]
pub struct ScriptedClient {
    pub submissions: Mutex<Vec<SubmitRequest>>,
    submit_results: Mutex<VecDeque<Result<String, ProviderError>>>,
    poll_results: Mutex<VecDeque<Result<PollOutcome, ProviderError>>>,
    download_failures: Mutex<u32>,
}

impl ScriptedClient {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn script_submit(&self, result: Result<String, ProviderError>) {
        self.submit_results.lock().unwrap().push_back(result);
    }

    pub fn script_poll(&self, result: Result<PollOutcome, ProviderError>) {
        self.poll_results.lock().unwrap().push_back(result);
    }

    /// Make the next `n` downloads fail with a transient error.
    pub fn fail_downloads(&self, n: u32) {
        *self.download_failures.lock().unwrap() = n;
    }

    pub fn submission_count(&self) -> usize {
        self.submissions.lock().unwrap().len()
    }

    pub fn submission(&self, index: usize) -> SubmitRequest {
        self.submissions.lock().unwrap()[index].clone()
    }
}

#[async_trait]
impl GenerationClient for ScriptedClient {
    async fn submit(&self, request: &SubmitRequest) -> Result<String, ProviderError> {
        let mut submissions = self.submissions.lock().unwrap();
        submissions.push(request.clone());
        let handle = format!("prov-{}", submissions.len());
        drop(submissions);

        self.submit_results
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(Ok(handle))
    }

    async fn poll(&self, _handle: &str) -> Result<PollOutcome, ProviderError> {
        self.poll_results
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(Ok(PollOutcome::Running))
    }

    async fn download(
        &self,
        _handle: &str,
        _download_url: Option<&str>,
    ) -> Result<Vec<u8>, ProviderError> {
        let mut failures = self.download_failures.lock().unwrap();
        if *failures > 0 {
            *failures -= 1;
            return Err(ProviderError::Transient("connection reset".into()));
        }
        Ok(CLIP_BYTES.to_vec())
    }
}

// ---------------------------------------------------------------------------
// Stub extractor and suggester
// ---------------------------------------------------------------------------

/// Extractor that writes fixed frame bytes, or fails when told to.
#[derive(Default)]
pub struct StubExtractor {
    pub fail: bool,
}

#[async_trait]
impl FrameExtractor for StubExtractor {
    async fn extract_last_frame(
        &self,
        video_path: &Path,
        frame_path: &Path,
        _width: u32,
        _height: u32,
    ) -> Result<(), ExtractionError> {
        if self.fail {
            return Err(ExtractionError::ZeroDuration(
                video_path.to_string_lossy().to_string(),
            ));
        }
        tokio::fs::write(frame_path, FRAME_BYTES).await?;
        Ok(())
    }
}

/// Suggester returning a fixed option set, or failing when told to.
/// Calls are counted so tests can assert suggestion happens exactly once.
#[derive(Default)]
pub struct StubSuggester {
    pub fail: bool,
    pub calls: Arc<AtomicUsize>,
}

pub fn model_options() -> Vec<StoryOption> {
    vec![
        StoryOption::new("Set sail", "The boat pulls away from the dock."),
        StoryOption::new("Wave goodbye", "The crowd waves from the pier."),
        StoryOption::new("Check the map", "A weathered map unrolls on the table."),
    ]
}

#[async_trait]
impl OptionSuggester for StubSuggester {
    async fn suggest(
        &self,
        _context: &str,
        _frame: Option<&[u8]>,
    ) -> Result<Vec<StoryOption>, ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(ProviderError::Transient("chat endpoint unavailable".into()));
        }
        Ok(model_options())
    }
}

// ---------------------------------------------------------------------------
// Harness
// ---------------------------------------------------------------------------

pub struct Harness {
    pub orchestrator: Arc<JobOrchestrator>,
    pub client: Arc<ScriptedClient>,
    pub media: MediaStore,
    // Held so the media root outlives the test.
    _dir: tempfile::TempDir,
}

pub fn harness(pool: DbPool) -> Harness {
    harness_with(pool, StubExtractor::default(), StubSuggester::default(), OrchestratorConfig::default())
}

pub fn harness_with(
    pool: DbPool,
    extractor: StubExtractor,
    suggester: StubSuggester,
    config: OrchestratorConfig,
) -> Harness {
    let dir = tempfile::tempdir().unwrap();
    let media = MediaStore::new(dir.path());
    let client = ScriptedClient::new();

    let orchestrator = Arc::new(JobOrchestrator::new(
        pool,
        media.clone(),
        Arc::clone(&client) as Arc<dyn GenerationClient>,
        Arc::new(suggester),
        Arc::new(extractor),
        Arc::new(SequenceIds::new("id")),
        config,
    ));

    Harness {
        orchestrator,
        client,
        media,
        _dir: dir,
    }
}
