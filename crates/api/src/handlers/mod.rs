//! Request handlers.
//!
//! Handlers stay thin: they parse the request, delegate to the orchestrator
//! or a repository, and map errors via [`crate::error::AppError`].

pub mod jobs;
pub mod stories;
