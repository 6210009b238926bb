//! Terminology review before translation.
//!
//! Candidate terms are mined from the deck locally and sent to the model with
//! a short outline. Whatever goes wrong with the model, the caller still gets
//! the raw candidates back.

use crate::client::{ChatCompletion, CompletionOptions};
use deck_core::terms::{DEFAULT_MAX_TERMS, DEFAULT_OUTLINE_LINES};
use deck_core::translate::prompt;
use deck_core::{build_outline, collect_term_candidates, Glossary, SlideDocument, TermCandidate};
use serde::{Deserialize, Serialize};

const PREFLIGHT_TEMPERATURE: f32 = 0.2;

/// A glossary suggestion from the model.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PreflightTerm {
    pub source_term: String,
    #[serde(default)]
    pub preferred_translation: Option<String>,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub rationale: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PreflightResult {
    pub terms: Vec<PreflightTerm>,
    pub style_note: String,
    pub ambiguous_spots: Vec<String>,
    pub raw_candidates: Vec<TermCandidate>,
}

impl PreflightResult {
    /// Terms with a preferred translation, as a glossary.
    pub fn suggested_glossary(&self) -> Glossary {
        let mut glossary = Glossary::new();
        for term in &self.terms {
            if let Some(target) = term.preferred_translation.as_deref() {
                glossary.insert(term.source_term.as_str(), target);
            }
        }
        glossary
    }
}

#[derive(Debug, Clone)]
pub struct PreflightOptions {
    pub target_lang: String,
    /// Overrides the client's model.
    pub model: Option<String>,
    pub max_terms: usize,
}

impl Default for PreflightOptions {
    fn default() -> Self {
        Self {
            target_lang: "en".to_string(),
            model: None,
            max_terms: DEFAULT_MAX_TERMS,
        }
    }
}

impl PreflightOptions {
    pub fn new(target_lang: impl Into<String>) -> Self {
        Self {
            target_lang: target_lang.into(),
            ..Self::default()
        }
    }

    pub fn with_model(mut self, model: Option<String>) -> Self {
        self.model = model;
        self
    }

    pub fn with_max_terms(mut self, max_terms: usize) -> Self {
        self.max_terms = max_terms;
        self
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct PreflightResponse {
    terms: Vec<PreflightTerm>,
    style_note: String,
    ambiguous_spots: Vec<String>,
}

#[derive(Serialize)]
struct CandidatePayload<'a> {
    term: &'a str,
    score: usize,
    context: &'a str,
    slide: usize,
}

fn candidates_json(candidates: &[TermCandidate]) -> String {
    let payload: Vec<CandidatePayload<'_>> = candidates
        .iter()
        .map(|c| CandidatePayload {
            term: &c.term,
            score: c.score,
            context: &c.context,
            slide: c.slide_index + 1,
        })
        .collect();
    serde_json::to_string(&payload).unwrap_or_else(|_| "[]".to_string())
}

fn parse_response(content: &str) -> Result<PreflightResponse, serde_json::Error> {
    serde_json::from_str(content)
}

fn clean(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Ask the model for glossary suggestions on `documents`.
pub fn run_preflight(
    documents: &[SlideDocument],
    chat: &dyn ChatCompletion,
    options: &PreflightOptions,
) -> PreflightResult {
    let candidates = collect_term_candidates(documents, options.max_terms);
    if candidates.is_empty() {
        log::info!("No terminology candidates found");
        return PreflightResult::default();
    }

    let fallback = |reason: String| {
        log::warn!("Terminology preflight failed, using raw candidates: {}", reason);
        PreflightResult {
            raw_candidates: candidates.clone(),
            ..PreflightResult::default()
        }
    };

    let outline = build_outline(documents, DEFAULT_OUTLINE_LINES);
    let messages =
        prompt::preflight_messages(&outline, &candidates_json(&candidates), &options.target_lang);
    let completion = CompletionOptions {
        model: options.model.clone(),
        temperature: Some(PREFLIGHT_TEMPERATURE),
    };

    let content = match chat.complete(&messages, &completion) {
        Ok(content) => content,
        Err(e) => return fallback(e.to_string()),
    };
    let response = match parse_response(&content) {
        Ok(response) => response,
        Err(e) => return fallback(e.to_string()),
    };

    let terms: Vec<PreflightTerm> = response
        .terms
        .into_iter()
        .filter_map(|t| {
            let source_term = t.source_term.trim().to_string();
            (!source_term.is_empty()).then(|| PreflightTerm {
                source_term,
                preferred_translation: clean(t.preferred_translation),
                category: clean(t.category),
                rationale: clean(t.rationale),
            })
        })
        .collect();
    log::info!(
        "Preflight suggested {} terms from {} candidates",
        terms.len(),
        candidates.len()
    );

    PreflightResult {
        terms,
        style_note: response.style_note.trim().to_string(),
        ambiguous_spots: response
            .ambiguous_spots
            .into_iter()
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect(),
        raw_candidates: candidates,
    }
}
