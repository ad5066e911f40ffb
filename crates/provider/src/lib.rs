//! Clients for the external generation provider.
//!
//! Everything loose about the provider's wire shapes is normalized here:
//! downstream code only ever sees the [`error::ProviderError`] taxonomy and
//! the five [`videos::PollOutcome`] statuses. [`videos`] talks to the Videos
//! API (submit / poll / download), [`suggest`] to the chat-completions API
//! that proposes continuation options.

pub mod config;
pub mod error;
pub mod suggest;
pub mod videos;

pub use config::ProviderConfig;
pub use error::ProviderError;
pub use suggest::{ChatApiClient, OptionSuggester};
pub use videos::{GenerationClient, PollOutcome, SubmitRequest, VideoApiClient};
