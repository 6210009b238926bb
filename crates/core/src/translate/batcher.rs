//! Deduplicating batch dispatcher.

use super::prompt;
use super::{BatchRequest, TranslationConfig, Translator};
use crate::error::{Error, Result};
use crate::progress::Progress;
use indexmap::IndexSet;
use serde_json::Value;

/// Unique strings per request unless configured otherwise.
pub const DEFAULT_BATCH_SIZE: usize = 200;

/// Corrective retries after an undecodable reply.
pub const MAX_PARSE_RETRIES: usize = 1;

/// Characters of a bad reply kept in a parse error.
const SNIPPET_CHARS: usize = 2000;

/// Outcome of [`TranslationBatcher::run`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BatchReport {
    /// One translation per input string, in input order.
    pub translations: Vec<String>,
    /// Distinct non-blank strings that were sent.
    pub unique: usize,
    /// Requests issued, retries excluded.
    pub batches: usize,
}

/// Sends strings to a [`Translator`] in ordered, deduplicated batches.
pub struct TranslationBatcher<'a> {
    translator: &'a dyn Translator,
    batch_size: usize,
    max_retries: usize,
}

impl<'a> TranslationBatcher<'a> {
    pub fn new(translator: &'a dyn Translator) -> Self {
        Self {
            translator,
            batch_size: DEFAULT_BATCH_SIZE,
            max_retries: MAX_PARSE_RETRIES,
        }
    }

    /// Set the number of unique strings per request (at least 1).
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    pub fn with_max_retries(mut self, max_retries: usize) -> Self {
        self.max_retries = max_retries;
        self
    }

    /// Translate `texts`, returning one result per input in input order.
    pub fn translate_all(&self, texts: &[String], config: &TranslationConfig) -> Result<Vec<String>> {
        self.run(texts, config, &Progress::none(), (0.0, 1.0))
            .map(|report| report.translations)
    }

    /// Translate `texts`, reporting progress within the `span` ratio window.
    ///
    /// Identical strings are sent once and share their translation.
    /// Whitespace-only strings are returned unchanged without a request.
    pub fn run(
        &self,
        texts: &[String],
        config: &TranslationConfig,
        progress: &Progress<'_>,
        span: (f64, f64),
    ) -> Result<BatchReport> {
        if texts.is_empty() {
            return Ok(BatchReport::default());
        }

        let mut unique: IndexSet<&str> = IndexSet::new();
        let back_refs: Vec<Option<usize>> = texts
            .iter()
            .map(|text| {
                if text.trim().is_empty() {
                    None
                } else {
                    Some(unique.insert_full(text.as_str()).0)
                }
            })
            .collect();

        let unique: Vec<&str> = unique.into_iter().collect();
        let total = unique.len();
        let (start, end) = span;
        let at = |done: usize| start + (end - start) * (done as f64 / total.max(1) as f64);

        log::debug!(
            "Translating {} strings ({} unique) in batches of {}",
            texts.len(),
            total,
            self.batch_size
        );

        let mut translated: Vec<String> = Vec::with_capacity(total);
        let mut batches = 0;
        for (index, batch) in unique.chunks(self.batch_size).enumerate() {
            let first = translated.len();
            progress.emit(
                at(first),
                format!("Translating {}-{} of {}", first + 1, first + batch.len(), total),
            );
            let items = self.translate_batch(index, batch, config)?;
            translated.extend(items);
            batches += 1;
            progress.emit(
                at(translated.len()),
                format!("Translated {} of {}", translated.len(), total),
            );
        }

        let translations = texts
            .iter()
            .zip(back_refs)
            .map(|(text, slot)| match slot {
                Some(idx) => translated[idx].clone(),
                None => text.clone(),
            })
            .collect();

        Ok(BatchReport {
            translations,
            unique: total,
            batches,
        })
    }

    fn translate_batch(
        &self,
        index: usize,
        items: &[&str],
        config: &TranslationConfig,
    ) -> Result<Vec<String>> {
        let mut messages = prompt::translation_messages(items, config);
        let mut attempt = 0;
        loop {
            let request = BatchRequest {
                index,
                attempt,
                items,
                config,
                messages: &messages,
            };
            let content = self.translator.translate_batch(&request)?;
            match decode_payload(&content) {
                Ok(decoded) if decoded.len() == items.len() => return Ok(decoded),
                Ok(decoded) => {
                    return Err(Error::TranslationLengthMismatch {
                        batch: index,
                        expected: items.len(),
                        actual: decoded.len(),
                    })
                }
                Err(reason) if attempt < self.max_retries => {
                    log::warn!(
                        "Batch {} reply could not be decoded ({}), retrying",
                        index,
                        reason
                    );
                    messages.push(prompt::corrective_message());
                    attempt += 1;
                }
                Err(reason) => {
                    return Err(Error::TranslationParse {
                        reason,
                        snippet: content.chars().take(SNIPPET_CHARS).collect(),
                    })
                }
            }
        }
    }
}

/// Decode a `{"result": [...]}` reply.
///
/// Strings are kept, `null` becomes an empty string and other scalars are
/// stringified.
fn decode_payload(content: &str) -> std::result::Result<Vec<String>, String> {
    let value: Value =
        serde_json::from_str(strip_code_fence(content)).map_err(|e| format!("invalid JSON: {}", e))?;
    let object = value
        .as_object()
        .ok_or_else(|| "payload root is not an object".to_string())?;
    let result = object
        .get("result")
        .and_then(Value::as_array)
        .ok_or_else(|| "missing 'result' array".to_string())?;

    Ok(result
        .iter()
        .map(|item| match item {
            Value::String(s) => s.clone(),
            Value::Null => String::new(),
            other => other.to_string(),
        })
        .collect())
}

/// Remove a surrounding Markdown code fence some models add.
pub(crate) fn strip_code_fence(content: &str) -> &str {
    let trimmed = content.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let rest = rest.trim_start_matches(|c: char| c.is_ascii_alphanumeric());
    rest.strip_suffix("```").unwrap_or(rest).trim()
}
