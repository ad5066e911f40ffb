//! Provider error taxonomy.
//!
//! Every failure leaving this crate is one of four dispositions: the
//! submission was rejected outright, the prompt was blocked on moderation
//! grounds, the transport hiccuped (retry on the polling cadence), or the
//! provider explicitly failed the job. Classification happens at this
//! boundary so nothing downstream has to inspect HTTP statuses or loose
//! JSON error shapes.

/// Errors from the provider API layer.
#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    /// The provider rejected the request outright (bad parameters, model
    /// access). Not retried.
    #[error("Provider rejected submission ({status}): {body}")]
    Submission { status: u16, body: String },

    /// The prompt was blocked on policy grounds.
    #[error("Prompt blocked by moderation: {0}")]
    Moderation(String),

    /// Network / timeout / 5xx / 429. Absorbed by the polling cadence.
    #[error("Transient provider error: {0}")]
    Transient(String),

    /// The provider explicitly failed the job. Terminal.
    #[error("Provider failed the job ({code}): {message}")]
    Fatal { code: String, message: String },
}

impl ProviderError {
    /// Whether polling again on the normal cadence can recover from this.
    pub fn is_transient(&self) -> bool {
        matches!(self, ProviderError::Transient(_))
    }

    /// Classify a non-2xx response status together with its body text.
    ///
    /// 5xx and 429 are worth retrying; any other client error means the
    /// request itself was bad.
    pub fn from_status(status: u16, body: String) -> Self {
        if status >= 500 || status == 429 {
            ProviderError::Transient(format!("HTTP {status}: {body}"))
        } else {
            ProviderError::Submission { status, body }
        }
    }
}

impl From<reqwest::Error> for ProviderError {
    fn from(err: reqwest::Error) -> Self {
        // A transport-level reqwest error never carries a provider verdict.
        ProviderError::Transient(err.to_string())
    }
}
