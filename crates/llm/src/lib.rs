//! Language model access for deck translation: an OpenAI-compatible chat
//! client implementing the translator and rephraser seams, plus the
//! terminology preflight.

pub mod client;
pub mod error;
pub mod preflight;

pub use client::{ChatCompletion, CompletionOptions, LlmConfig, OpenAiClient};
pub use error::{LlmError, Result};
pub use preflight::{run_preflight, PreflightOptions, PreflightResult, PreflightTerm};
