//! Client for the provider's asynchronous Videos API.
//!
//! Submits generation jobs (`POST /v1/videos`), polls them
//! (`GET /v1/videos/{id}`), and downloads completed clips. The provider's
//! status strings, error shapes, and download-URL placement vary between
//! snapshots; [`normalize_status`] and [`mine_download_url`] fold all known
//! shapes into [`PollOutcome`] so nothing downstream ever inspects raw JSON.

use async_trait::async_trait;
use serde_json::Value;

use crate::error::ProviderError;

/// One clip generation request as it goes over the wire.
#[derive(Debug, Clone)]
pub struct SubmitRequest {
    pub model: String,
    pub prompt: String,
    /// Crosses the wire as a string literal: `"4" | "8" | "12"`.
    pub seconds: u32,
    /// `WxH`, e.g. `1280x720`.
    pub size: String,
    /// JPEG bytes of the parent's last frame, absent for a story root.
    pub reference_image: Option<Vec<u8>>,
}

/// Normalized result of polling a provider job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollOutcome {
    Queued,
    Running,
    /// The clip is ready. `download_url` is present when the response
    /// carried one; otherwise the `/content` fallback applies.
    Completed { download_url: Option<String> },
    /// The prompt was rejected on policy grounds.
    Blocked { message: String },
    /// The provider explicitly failed the job.
    Failed { code: String, message: String },
}

/// Contract with the external video-generation provider.
#[async_trait]
pub trait GenerationClient: Send + Sync {
    /// Submit a generation request; returns the provider's job handle.
    async fn submit(&self, request: &SubmitRequest) -> Result<String, ProviderError>;

    /// Non-blocking status check on a previously submitted job.
    async fn poll(&self, handle: &str) -> Result<PollOutcome, ProviderError>;

    /// Fetch the completed clip's bytes, via `download_url` when known or
    /// the provider's `/content` endpoint otherwise.
    async fn download(
        &self,
        handle: &str,
        download_url: Option<&str>,
    ) -> Result<Vec<u8>, ProviderError>;
}

/// Production client for an OpenAI-compatible Videos API.
pub struct VideoApiClient {
    client: reqwest::Client,
    api_base: String,
    api_key: String,
}

impl VideoApiClient {
    /// * `api_base` - e.g. `https://api.openai.com`, no trailing slash.
    pub fn new(api_base: String, api_key: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_base,
            api_key,
        }
    }

    /// Reuse an existing [`reqwest::Client`] for connection pooling.
    pub fn with_client(client: reqwest::Client, api_base: String, api_key: String) -> Self {
        Self {
            client,
            api_base,
            api_key,
        }
    }

    fn videos_url(&self) -> String {
        format!("{}/v1/videos", self.api_base)
    }

    /// Ensure a success status, classifying failures by status code.
    async fn ensure_success(
        response: reqwest::Response,
    ) -> Result<reqwest::Response, ProviderError> {
        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<unreadable body>".to_string());
            return Err(ProviderError::from_status(status.as_u16(), body));
        }
        Ok(response)
    }
}

#[async_trait]
impl GenerationClient for VideoApiClient {
    async fn submit(&self, request: &SubmitRequest) -> Result<String, ProviderError> {
        let response = match &request.reference_image {
            Some(bytes) => {
                // The reference image rides along as a multipart file part;
                // 'input_reference' is the only field name the API accepts.
                let part = reqwest::multipart::Part::bytes(bytes.clone())
                    .file_name("reference.jpg")
                    .mime_str("image/jpeg")
                    .map_err(|e| ProviderError::Transient(e.to_string()))?;
                let form = reqwest::multipart::Form::new()
                    .text("model", request.model.clone())
                    .text("prompt", request.prompt.clone())
                    .text("seconds", request.seconds.to_string())
                    .text("size", request.size.clone())
                    .part("input_reference", part);

                self.client
                    .post(self.videos_url())
                    .bearer_auth(&self.api_key)
                    .multipart(form)
                    .send()
                    .await?
            }
            None => {
                let body = serde_json::json!({
                    "model": request.model,
                    "prompt": request.prompt,
                    "seconds": request.seconds.to_string(),
                    "size": request.size,
                });
                self.client
                    .post(self.videos_url())
                    .bearer_auth(&self.api_key)
                    .json(&body)
                    .send()
                    .await?
            }
        };

        let response = Self::ensure_success(response).await?;
        let json: Value = response.json().await?;

        mine_job_handle(&json).ok_or_else(|| ProviderError::Submission {
            status: 200,
            body: format!("submission response carried no job id: {json}"),
        })
    }

    async fn poll(&self, handle: &str) -> Result<PollOutcome, ProviderError> {
        let response = self
            .client
            .get(format!("{}/{handle}", self.videos_url()))
            .bearer_auth(&self.api_key)
            .send()
            .await?;

        let response = Self::ensure_success(response).await?;
        let json: Value = response.json().await?;
        Ok(normalize_status(&json))
    }

    async fn download(
        &self,
        handle: &str,
        download_url: Option<&str>,
    ) -> Result<Vec<u8>, ProviderError> {
        let url = match download_url {
            Some(url) if url.starts_with("http") => url.to_string(),
            Some(relative) => format!("{}{relative}", self.api_base),
            // Some snapshots expose bytes only via /content.
            None => format!("{}/{handle}/content", self.videos_url()),
        };

        let response = self
            .client
            .get(&url)
            .bearer_auth(&self.api_key)
            .send()
            .await?;
        let response = Self::ensure_success(response).await?;
        let bytes = response.bytes().await?;

        tracing::debug!(handle, bytes = bytes.len(), "clip downloaded");
        Ok(bytes.to_vec())
    }
}

// ---------------------------------------------------------------------------
// Wire-shape normalization
// ---------------------------------------------------------------------------

/// Pull the job handle out of a submission response (`id` or `job_id`).
pub fn mine_job_handle(json: &Value) -> Option<String> {
    json.get("id")
        .or_else(|| json.get("job_id"))
        .and_then(Value::as_str)
        .map(String::from)
}

/// Fold a poll response into a [`PollOutcome`].
///
/// Progress strings (`queued`, `in_progress`, `running`, `processing`) map
/// to queued/running. A `failed` (or `blocked`) status inspects the error
/// payload: anything mentioning moderation is a policy block, everything
/// else a fatal provider failure. Unrecognized statuses are treated as
/// still-running rather than failing the job on a vocabulary change.
pub fn normalize_status(json: &Value) -> PollOutcome {
    let status = json
        .get("status")
        .or_else(|| json.get("job_status"))
        .and_then(Value::as_str)
        .unwrap_or("");

    match status {
        "queued" | "pending" => PollOutcome::Queued,
        "in_progress" | "running" | "processing" => PollOutcome::Running,
        "completed" | "succeeded" => PollOutcome::Completed {
            download_url: mine_download_url(json),
        },
        "blocked" | "rejected" => PollOutcome::Blocked {
            message: error_message(json)
                .unwrap_or_else(|| "prompt rejected by moderation".to_string()),
        },
        "failed" | "error" => {
            let code = error_code(json).unwrap_or_else(|| "unknown".to_string());
            let message =
                error_message(json).unwrap_or_else(|| "Generation failed".to_string());
            if is_moderation(&code, &message) {
                PollOutcome::Blocked { message }
            } else {
                PollOutcome::Failed { code, message }
            }
        }
        other => {
            tracing::debug!(status = other, "unrecognized provider status, treating as running");
            PollOutcome::Running
        }
    }
}

/// Locate a download URL in any of the provider's known response shapes.
///
/// Checked in order: direct string keys, the `output` list/object, the
/// `assets` object/list, and a nested `video` object.
pub fn mine_download_url(json: &Value) -> Option<String> {
    // Direct keys.
    for key in ["download_url", "asset_url", "video_url", "url"] {
        if let Some(url) = json.get(key).and_then(Value::as_str) {
            if url.starts_with("http") {
                return Some(url.to_string());
            }
        }
    }

    // output: [{url}] or {video: {url}} / {asset: {url}}.
    match json.get("output") {
        Some(Value::Array(items)) => {
            if let Some(Value::Object(first)) = items.first() {
                for key in ["url", "download_url"] {
                    if let Some(Value::String(url)) = first.get(key) {
                        return Some(url.clone());
                    }
                }
            }
        }
        Some(Value::Object(map)) => {
            for key in ["video", "asset"] {
                if let Some(url) = map.get(key).and_then(|v| v.get("url")).and_then(Value::as_str)
                {
                    return Some(url.to_string());
                }
            }
        }
        _ => {}
    }

    // assets: {video: {url} | "http..."} or [{type, url}].
    match json.get("assets") {
        Some(Value::Object(map)) => {
            for key in ["video", "original", "mp4"] {
                match map.get(key) {
                    Some(Value::Object(item)) => {
                        if let Some(Value::String(url)) = item.get("url") {
                            return Some(url.clone());
                        }
                    }
                    Some(Value::String(url)) if url.starts_with("http") => {
                        return Some(url.clone());
                    }
                    _ => {}
                }
            }
        }
        Some(Value::Array(items)) => {
            // Prefer an asset tagged as video, else the first with a URL.
            for item in items {
                let is_video = item
                    .get("type")
                    .and_then(Value::as_str)
                    .is_some_and(|t| t.starts_with("video"));
                if is_video {
                    if let Some(url) = item.get("url").and_then(Value::as_str) {
                        return Some(url.to_string());
                    }
                }
            }
            for item in items {
                if let Some(url) = item.get("url").and_then(Value::as_str) {
                    return Some(url.to_string());
                }
            }
        }
        _ => {}
    }

    json.get("video")
        .and_then(|v| v.get("url"))
        .and_then(Value::as_str)
        .map(String::from)
}

/// Whether an error code/message pair indicates a moderation rejection.
fn is_moderation(code: &str, message: &str) -> bool {
    let code = code.to_ascii_lowercase();
    let message = message.to_ascii_lowercase();
    code.contains("moderation")
        || message.contains("moderation")
        || message.contains("content policy")
}

/// The error payload arrives as a string or as `{code, message}`.
fn error_message(json: &Value) -> Option<String> {
    match json.get("error") {
        Some(Value::String(s)) => Some(s.clone()),
        Some(Value::Object(map)) => map
            .get("message")
            .and_then(Value::as_str)
            .map(String::from),
        _ => None,
    }
}

fn error_code(json: &Value) -> Option<String> {
    json.get("error")
        .and_then(|e| e.get("code"))
        .and_then(Value::as_str)
        .map(String::from)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
