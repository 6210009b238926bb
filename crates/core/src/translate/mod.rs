//! Batched, deduplicating translation protocol.
//!
//! The language model itself lives behind the [`Translator`] trait. This
//! module owns everything around it: deduplication, batching, the JSON
//! response contract, the corrective retry and progress reporting.

mod batcher;
mod documents;
pub mod prompt;

pub use batcher::{BatchReport, TranslationBatcher, DEFAULT_BATCH_SIZE, MAX_PARSE_RETRIES};
pub use documents::{collect_document_texts, translate_documents};

use crate::error::Result;
use crate::glossary::Glossary;
use serde::{Deserialize, Serialize};

/// Settings of one translation call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TranslationConfig {
    /// Source language code, or `auto` to detect per item.
    pub source_lang: String,
    pub target_lang: String,
    pub model_id: String,
    pub temperature: f32,
    pub glossary: Option<Glossary>,
    pub extra_instructions: Option<String>,
}

impl Default for TranslationConfig {
    fn default() -> Self {
        Self {
            source_lang: "auto".to_string(),
            target_lang: "en".to_string(),
            model_id: "gpt-4o-mini".to_string(),
            temperature: 0.1,
            glossary: None,
            extra_instructions: None,
        }
    }
}

impl TranslationConfig {
    pub fn new(source_lang: impl Into<String>, target_lang: impl Into<String>) -> Self {
        Self {
            source_lang: source_lang.into(),
            target_lang: target_lang.into(),
            ..Self::default()
        }
    }

    pub fn with_model(mut self, model_id: impl Into<String>) -> Self {
        self.model_id = model_id.into();
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn with_glossary(mut self, glossary: Option<Glossary>) -> Self {
        self.glossary = glossary.filter(|g| !g.is_empty());
        self
    }

    pub fn with_extra_instructions(mut self, instructions: Option<String>) -> Self {
        self.extra_instructions = instructions.filter(|s| !s.trim().is_empty());
        self
    }

    /// Same-language requests polish the text instead of translating it.
    pub fn is_polish(&self) -> bool {
        let source = self.source_lang.to_lowercase();
        source != "auto" && source == self.target_lang.to_lowercase()
    }
}

/// Speaker of a chat message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

/// One chat message sent to a language model.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }
}

/// One batch of unique source strings on its way to the translator.
#[derive(Debug)]
pub struct BatchRequest<'a> {
    /// 0-based batch number.
    pub index: usize,
    /// 0 for the first attempt, incremented for each corrective retry.
    pub attempt: usize,
    pub items: &'a [&'a str],
    pub config: &'a TranslationConfig,
    /// Chat messages carrying `items` and the instructions.
    pub messages: &'a [ChatMessage],
}

/// External translator.
///
/// Implementations return the raw response body, which must be a JSON
/// object `{"result": [...]}` with one string per item, in item order.
pub trait Translator {
    fn translate_batch(&self, request: &BatchRequest<'_>) -> Result<String>;
}

impl<T: Translator + ?Sized> Translator for &T {
    fn translate_batch(&self, request: &BatchRequest<'_>) -> Result<String> {
        (**self).translate_batch(request)
    }
}

/// External helper that shortens one line to a character budget.
pub trait Rephraser {
    fn shorten(&self, text: &str, max_chars: usize) -> Result<String>;
}

impl<T: Rephraser + ?Sized> Rephraser for &T {
    fn shorten(&self, text: &str, max_chars: usize) -> Result<String> {
        (**self).shorten(text, max_chars)
    }
}
