//! Continuation-option suggestion via an OpenAI-compatible chat API.
//!
//! Sends the story context and the freshly extracted last frame (as a base64
//! data URL) to a chat-completions endpoint, constrained by a JSON schema to
//! return candidate options. Raw parsing only; count/length normalization
//! and the fallback set live in `storyreel_core::options`, applied by the
//! orchestrator so a suggestion failure can never fail the clip.

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use serde::Deserialize;
use serde_json::{json, Value};
use storyreel_core::options::{StoryOption, OPTION_COUNT};

use crate::error::ProviderError;

/// Proposes candidate continuations for a completed clip.
#[async_trait]
pub trait OptionSuggester: Send + Sync {
    /// Ask for continuation options given condensed story context and,
    /// when available, the clip's last frame.
    async fn suggest(
        &self,
        context: &str,
        frame: Option<&[u8]>,
    ) -> Result<Vec<StoryOption>, ProviderError>;
}

/// Production suggester calling `POST {base}/v1/chat/completions`.
pub struct ChatApiClient {
    client: reqwest::Client,
    api_base: String,
    api_key: String,
    model: String,
}

impl ChatApiClient {
    pub fn new(api_base: String, api_key: String, model: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_base,
            api_key,
            model,
        }
    }

    /// Reuse an existing [`reqwest::Client`] for connection pooling.
    pub fn with_client(
        client: reqwest::Client,
        api_base: String,
        api_key: String,
        model: String,
    ) -> Self {
        Self {
            client,
            api_base,
            api_key,
            model,
        }
    }
}

#[async_trait]
impl OptionSuggester for ChatApiClient {
    async fn suggest(
        &self,
        context: &str,
        frame: Option<&[u8]>,
    ) -> Result<Vec<StoryOption>, ProviderError> {
        let body = build_request_body(&self.model, context, frame);

        let response = self
            .client
            .post(format!("{}/v1/chat/completions", self.api_base))
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<unreadable body>".to_string());
            return Err(ProviderError::from_status(status.as_u16(), body));
        }

        let json: Value = response.json().await?;
        let options = parse_options(&json)?;

        tracing::debug!(count = options.len(), "options proposed");
        Ok(options)
    }
}

// ---------------------------------------------------------------------------
// Request construction
// ---------------------------------------------------------------------------

/// Build the chat-completions request body.
///
/// The response is schema-constrained so parsing never has to scrape
/// options out of free text; the frame rides along as an image part.
pub fn build_request_body(model: &str, context: &str, frame: Option<&[u8]>) -> Value {
    let prompt = format!(
        "You are a narrative designer. Based on the running story context below and \
         the current frame, propose {OPTION_COUNT} distinct next actions.\n\
         Each option must include:\n\
         - \"label\": maximum 5 words (keep it short and punchy),\n\
         - \"provider_prompt\": 1-2 sentences describing the next beat (visual), \
         plus a Dialogue: block if any.\n\
         Keep them visually actionable, not abstract. Maintain continuity and avoid \
         introducing new major characters unless already foreshadowed.\n\n\
         CONTEXT:\n{context}"
    );

    let mut content_parts = vec![json!({"type": "text", "text": prompt})];
    if let Some(bytes) = frame {
        let b64 = BASE64.encode(bytes);
        content_parts.push(json!({
            "type": "image_url",
            "image_url": {"url": format!("data:image/jpeg;base64,{b64}")}
        }));
    }

    json!({
        "model": model,
        "messages": [{"role": "user", "content": content_parts}],
        "max_completion_tokens": 2000,
        "response_format": {
            "type": "json_schema",
            "json_schema": {
                "name": "options_schema",
                "strict": true,
                "schema": {
                    "type": "object",
                    "properties": {
                        "options": {
                            "type": "array",
                            "description": format!("List of exactly {OPTION_COUNT} action options"),
                            "items": {
                                "type": "object",
                                "properties": {
                                    "label": {
                                        "type": "string",
                                        "description": "Maximum 5 words describing the action"
                                    },
                                    "provider_prompt": {
                                        "type": "string",
                                        "description": "1-2 sentences with visual description and dialogue"
                                    }
                                },
                                "required": ["label", "provider_prompt"],
                                "additionalProperties": false
                            }
                        }
                    },
                    "required": ["options"],
                    "additionalProperties": false
                }
            }
        }
    })
}

// ---------------------------------------------------------------------------
// Response parsing
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct OptionsEnvelope {
    options: Vec<StoryOption>,
}

/// Extract the options list from a chat-completions response.
///
/// The model's message content is itself a JSON document (schema-enforced);
/// a malformed or empty payload is a fatal parse failure the caller turns
/// into the fallback set.
pub fn parse_options(response: &Value) -> Result<Vec<StoryOption>, ProviderError> {
    let content = response
        .get("choices")
        .and_then(Value::as_array)
        .and_then(|choices| choices.first())
        .and_then(|c| c.get("message"))
        .and_then(|m| m.get("content"))
        .and_then(Value::as_str)
        .ok_or_else(|| ProviderError::Fatal {
            code: "bad_options_response".into(),
            message: "chat response carried no message content".into(),
        })?;

    let envelope: OptionsEnvelope =
        serde_json::from_str(content).map_err(|e| ProviderError::Fatal {
            code: "bad_options_response".into(),
            message: format!("options content was not valid JSON: {e}"),
        })?;

    Ok(envelope.options)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    // -- build_request_body --

    #[test]
    fn body_without_frame_has_single_text_part() {
        let body = build_request_body("gpt-5-mini", "Setup: at sea", None);
        let parts = body["messages"][0]["content"].as_array().unwrap();
        assert_eq!(parts.len(), 1);
        assert_eq!(parts[0]["type"], "text");
        assert!(parts[0]["text"].as_str().unwrap().contains("Setup: at sea"));
    }

    #[test]
    fn frame_becomes_data_url_part() {
        let body = build_request_body("gpt-5-mini", "ctx", Some(b"jpegbytes"));
        let parts = body["messages"][0]["content"].as_array().unwrap();
        assert_eq!(parts.len(), 2);
        let url = parts[1]["image_url"]["url"].as_str().unwrap();
        assert!(url.starts_with("data:image/jpeg;base64,"));
        assert_eq!(url.trim_start_matches("data:image/jpeg;base64,"), BASE64.encode(b"jpegbytes"));
    }

    #[test]
    fn body_requests_schema_constrained_json() {
        let body = build_request_body("gpt-5-mini", "ctx", None);
        assert_eq!(body["response_format"]["type"], "json_schema");
        assert_eq!(
            body["response_format"]["json_schema"]["schema"]["required"][0],
            "options"
        );
    }

    // -- parse_options --

    #[test]
    fn valid_response_parses() {
        let content = serde_json::json!({
            "options": [
                {"label": "Push forward", "provider_prompt": "The hero advances."},
                {"label": "Hide", "provider_prompt": "The hero ducks away."},
                {"label": "Climb", "provider_prompt": "The hero scales the wall."}
            ]
        })
        .to_string();
        let response = serde_json::json!({
            "choices": [{"message": {"content": content}}]
        });

        let options = parse_options(&response).unwrap();
        assert_eq!(options.len(), 3);
        assert_eq!(options[0].label, "Push forward");
    }

    #[test]
    fn missing_content_is_fatal() {
        let response = serde_json::json!({"choices": []});
        assert!(parse_options(&response).is_err());
    }

    #[test]
    fn non_json_content_is_fatal() {
        let response = serde_json::json!({
            "choices": [{"message": {"content": "sorry, I can't do that"}}]
        });
        let err = parse_options(&response).unwrap_err();
        assert!(err.to_string().contains("not valid JSON"));
    }
}
