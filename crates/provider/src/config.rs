//! Provider configuration loaded from environment variables.

use storyreel_core::clip::{ClipParams, DEFAULT_MODEL, DEFAULT_SECONDS, DEFAULT_SIZE};

/// Default API base when `OPENAI_API_BASE` is unset.
const DEFAULT_API_BASE: &str = "https://api.openai.com";

/// Default model for continuation-option suggestions.
const DEFAULT_OPTIONS_MODEL: &str = "gpt-5-mini";

/// Connection details and defaults for the generation provider.
#[derive(Debug, Clone)]
pub struct ProviderConfig {
    /// Base URL of the OpenAI-compatible API, without a trailing slash.
    pub api_base: String,
    /// Bearer token for both the Videos and chat-completions APIs.
    pub api_key: String,
    /// Video generation model identifier.
    pub video_model: String,
    /// Chat model used to propose continuation options.
    pub options_model: String,
    /// Default clip duration in seconds.
    pub default_seconds: u32,
    /// Default clip size as `WxH`.
    pub default_size: String,
}

impl ProviderConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var           | Default                  |
    /// |-------------------|--------------------------|
    /// | `OPENAI_API_BASE` | `https://api.openai.com` |
    /// | `OPENAI_API_KEY`  | (required)               |
    /// | `VIDEO_MODEL`     | `sora-2`                 |
    /// | `OPTIONS_MODEL`   | `gpt-5-mini`             |
    /// | `CLIP_SECONDS`    | `8`                      |
    /// | `CLIP_SIZE`       | `1280x720`               |
    pub fn from_env() -> Self {
        let api_base = std::env::var("OPENAI_API_BASE")
            .unwrap_or_else(|_| DEFAULT_API_BASE.into())
            .trim_end_matches('/')
            .to_string();

        let api_key = std::env::var("OPENAI_API_KEY").expect("OPENAI_API_KEY must be set");

        let video_model =
            std::env::var("VIDEO_MODEL").unwrap_or_else(|_| DEFAULT_MODEL.into());
        let options_model =
            std::env::var("OPTIONS_MODEL").unwrap_or_else(|_| DEFAULT_OPTIONS_MODEL.into());

        let default_seconds: u32 = std::env::var("CLIP_SECONDS")
            .unwrap_or_else(|_| DEFAULT_SECONDS.to_string())
            .parse()
            .expect("CLIP_SECONDS must be a valid u32");

        let default_size = std::env::var("CLIP_SIZE").unwrap_or_else(|_| DEFAULT_SIZE.into());

        Self {
            api_base,
            api_key,
            video_model,
            options_model,
            default_seconds,
            default_size,
        }
    }

    /// The clip parameters applied when a request does not override them.
    pub fn clip_defaults(&self) -> ClipParams {
        ClipParams {
            seconds: self.default_seconds,
            size: self.default_size.clone(),
            model: self.video_model.clone(),
        }
    }
}
