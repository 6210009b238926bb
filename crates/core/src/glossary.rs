//! User supplied glossaries.
//!
//! A glossary maps source terms to the translation that must be used for
//! them. It is validated against size limits before any translation request
//! is made.

use crate::error::{Error, Result};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use unicode_normalization::UnicodeNormalization;

/// Limits applied when parsing an uploaded glossary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GlossaryLimits {
    pub max_bytes: usize,
    pub max_entries: usize,
    /// Maximum characters of either side of an entry.
    pub max_entry_chars: usize,
}

impl Default for GlossaryLimits {
    fn default() -> Self {
        Self {
            max_bytes: 64 * 1024,
            max_entries: 500,
            max_entry_chars: 200,
        }
    }
}

/// Ordered source term → translation mapping.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Glossary {
    entries: IndexMap<String, String>,
}

impl Glossary {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a glossary from a JSON object or from `source<sep>target` lines.
    ///
    /// Line separators are a tab, `=` or a comma (first match wins). Blank
    /// lines and lines starting with `#` are ignored.
    pub fn parse(content: &str, limits: &GlossaryLimits) -> Result<Self> {
        if content.len() > limits.max_bytes {
            return Err(Error::GlossaryValidation(format!(
                "glossary is {} bytes, the limit is {} bytes; split it or remove unused entries",
                content.len(),
                limits.max_bytes
            )));
        }

        let content = content.trim_start_matches('\u{feff}').trim();
        let pairs = if content.starts_with('{') {
            parse_json(content)?
        } else {
            parse_lines(content)?
        };

        let mut glossary = Glossary::new();
        for (line, (source, target)) in pairs.into_iter().enumerate() {
            let source: String = source.trim().nfc().collect();
            let target: String = target.trim().nfc().collect();
            if source.is_empty() {
                return Err(Error::GlossaryValidation(format!(
                    "entry {} has an empty source term",
                    line + 1
                )));
            }
            for side in [&source, &target] {
                let chars = side.chars().count();
                if chars > limits.max_entry_chars {
                    return Err(Error::GlossaryValidation(format!(
                        "entry '{}' is {} characters long, the limit is {}",
                        truncate_for_message(side),
                        chars,
                        limits.max_entry_chars
                    )));
                }
            }
            if let Some(previous) = glossary.entries.insert(source.clone(), target) {
                log::warn!(
                    "Glossary term '{}' defined twice, replacing '{}'",
                    source,
                    previous
                );
            }
        }

        if glossary.len() > limits.max_entries {
            return Err(Error::GlossaryValidation(format!(
                "glossary has {} entries, the limit is {}",
                glossary.len(),
                limits.max_entries
            )));
        }

        Ok(glossary)
    }

    pub fn insert(&mut self, source: impl Into<String>, target: impl Into<String>) {
        self.entries.insert(source.into(), target.into());
    }

    pub fn get(&self, source: &str) -> Option<&str> {
        self.entries.get(source).map(String::as_str)
    }

    /// Add entries from `other` that are not defined here yet.
    pub fn merge_missing(&mut self, other: &Glossary) {
        for (source, target) in &other.entries {
            self.entries
                .entry(source.clone())
                .or_insert_with(|| target.clone());
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// JSON object form used inside prompts.
    pub fn to_json(&self) -> String {
        serde_json::to_string(&self.entries).unwrap_or_else(|_| "{}".to_string())
    }
}

impl FromIterator<(String, String)> for Glossary {
    fn from_iter<I: IntoIterator<Item = (String, String)>>(iter: I) -> Self {
        Self {
            entries: iter.into_iter().collect(),
        }
    }
}

fn parse_json(content: &str) -> Result<Vec<(String, String)>> {
    let map: IndexMap<String, serde_json::Value> = serde_json::from_str(content)
        .map_err(|e| Error::GlossaryValidation(format!("invalid JSON glossary: {}", e)))?;
    map.into_iter()
        .map(|(source, value)| match value {
            serde_json::Value::String(target) => Ok((source, target)),
            other => Err(Error::GlossaryValidation(format!(
                "translation of '{}' must be a string, got {}",
                truncate_for_message(&source),
                other
            ))),
        })
        .collect()
}

fn parse_lines(content: &str) -> Result<Vec<(String, String)>> {
    let mut pairs = Vec::new();
    for (idx, line) in content.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let split = ['\t', '=', ',']
            .iter()
            .find_map(|sep| line.split_once(*sep));
        match split {
            Some((source, target)) => pairs.push((source.to_string(), target.to_string())),
            None => {
                return Err(Error::GlossaryValidation(format!(
                    "line {} has no separator; use 'term<TAB>translation', 'term=translation' or 'term,translation'",
                    idx + 1
                )))
            }
        }
    }
    Ok(pairs)
}

fn truncate_for_message(text: &str) -> String {
    if text.chars().count() <= 40 {
        text.to_string()
    } else {
        let head: String = text.chars().take(37).collect();
        format!("{}...", head)
    }
}
