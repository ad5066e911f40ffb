//! Shared test fixtures: a full application router over scripted provider
//! fakes, plus oneshot request helpers.

use std::collections::VecDeque;
use std::path::Path;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use axum::response::Response;
use axum::Router;
use http_body_util::BodyExt;
use tower::ServiceExt;

use storyreel_api::config::ServerConfig;
use storyreel_api::router::build_app_router;
use storyreel_api::state::AppState;
use storyreel_core::clip::ClipParams;
use storyreel_core::ids::SequenceIds;
use storyreel_core::options::StoryOption;
use storyreel_db::DbPool;
use storyreel_media::{ExtractionError, FrameExtractor, MediaStore};
use storyreel_orchestrator::{JobOrchestrator, OrchestratorConfig};
use storyreel_provider::{
    GenerationClient, OptionSuggester, PollOutcome, ProviderError, SubmitRequest,
};

pub const FRAME_BYTES: &[u8] = b"fake-frame-bytes";

/// Build a test `ServerConfig` with safe defaults.
pub fn test_config() -> ServerConfig {
    ServerConfig {
        host: "127.0.0.1".to_string(),
        port: 0,
        cors_origins: vec!["http://localhost:5173".to_string()],
        request_timeout_secs: 30,
        shutdown_timeout_secs: 30,
        media_root: "./media".to_string(),
    }
}

// ---------------------------------------------------------------------------
// Scripted provider fakes
// ---------------------------------------------------------------------------

/// Generation client driven by scripted poll outcomes; submissions always
/// succeed and are recorded for assertions.
#[derive(Default)]
pub struct ScriptedClient {
    pub submissions: Mutex<Vec<SubmitRequest>>,
    poll_results: Mutex<VecDeque<Result<PollOutcome, ProviderError>>>,
}

impl ScriptedClient {
    pub fn script_poll(&self, result: Result<PollOutcome, ProviderError>) {
        self.poll_results.lock().unwrap().push_back(result);
    }
}

#[async_trait]
impl GenerationClient for ScriptedClient {
    async fn submit(&self, request: &SubmitRequest) -> Result<String, ProviderError> {
        let mut submissions = self.submissions.lock().unwrap();
        submissions.push(request.clone());
        Ok(format!("prov-{}", submissions.len()))
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
        Ok(b"fake-clip-bytes".to_vec())
    }
}

struct StubExtractor;

#[async_trait]
impl FrameExtractor for StubExtractor {
    async fn extract_last_frame(
        &self,
        _video_path: &Path,
        frame_path: &Path,
        _width: u32,
        _height: u32,
    ) -> Result<(), ExtractionError> {
        tokio::fs::write(frame_path, FRAME_BYTES).await?;
        Ok(())
    }
}

struct StubSuggester;

#[async_trait]
impl OptionSuggester for StubSuggester {
    async fn suggest(
        &self,
        _context: &str,
        _frame: Option<&[u8]>,
    ) -> Result<Vec<StoryOption>, ProviderError> {
        Ok(vec![
            StoryOption::new("Set sail", "The boat pulls away from the dock."),
            StoryOption::new("Wave goodbye", "The crowd waves from the pier."),
            StoryOption::new("Check the map", "A weathered map unrolls on the table."),
        ])
    }
}

// ---------------------------------------------------------------------------
// Application fixture
// ---------------------------------------------------------------------------

pub struct TestApp {
    pub app: Router,
    pub client: Arc<ScriptedClient>,
    // Held so the media root outlives the test.
    _dir: tempfile::TempDir,
}

/// Build the full application router with all middleware layers, wired over
/// scripted provider fakes and a temp media root.
///
/// This mirrors the router construction in `main.rs` so integration tests
/// exercise the same middleware stack that production uses.
pub fn build_test_app(pool: DbPool) -> TestApp {
    build_test_app_with_defaults(pool, ClipParams::default())
}

/// Same as [`build_test_app`], with configured clip defaults.
pub fn build_test_app_with_defaults(pool: DbPool, clip_defaults: ClipParams) -> TestApp {
    let config = test_config();
    let dir = tempfile::tempdir().unwrap();
    let client = Arc::new(ScriptedClient::default());

    let orchestrator = Arc::new(JobOrchestrator::new(
        pool.clone(),
        MediaStore::new(dir.path()),
        Arc::clone(&client) as Arc<dyn GenerationClient>,
        Arc::new(StubSuggester),
        Arc::new(StubExtractor),
        Arc::new(SequenceIds::new("id")),
        OrchestratorConfig::default(),
    ));

    let state = AppState {
        pool,
        config: Arc::new(config.clone()),
        clip_defaults,
        orchestrator,
    };

    TestApp {
        app: build_app_router(state, &config),
        client,
        _dir: dir,
    }
}

// ---------------------------------------------------------------------------
// Request helpers
// ---------------------------------------------------------------------------

pub async fn get(app: &Router, uri: &str) -> Response {
    app.clone()
        .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap()
}

pub async fn post_json(app: &Router, uri: &str, body: serde_json::Value) -> Response {
    app.clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri(uri)
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
        )
        .await
        .unwrap()
}

pub async fn body_json(response: Response) -> serde_json::Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

/// Assert an error response's status and `code` field, returning the body.
pub async fn assert_error(
    response: Response,
    status: StatusCode,
    code: &str,
) -> serde_json::Value {
    assert_eq!(response.status(), status);
    let body = body_json(response).await;
    assert_eq!(body["code"], code, "body: {body}");
    assert!(body["error"].is_string());
    body
}
