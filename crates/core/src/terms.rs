//! Terminology candidates and deck outlines for the preflight review.

use crate::types::{Block, SlideDocument};
use indexmap::IndexMap;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::OnceLock;

const MAX_CONTEXTS: usize = 3;
const SNIPPET_CHARS: usize = 160;
const OUTLINE_LINES_PER_SLIDE: usize = 3;

pub const DEFAULT_MAX_TERMS: usize = 50;
pub const DEFAULT_OUTLINE_LINES: usize = 40;

/// A term that may need a fixed translation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TermCandidate {
    pub term: String,
    /// 0-based slide where the term first appears.
    pub slide_index: usize,
    /// Up to three occurrences, joined with `; `.
    pub context: String,
    /// Number of text segments containing the term.
    pub score: usize,
}

fn term_patterns() -> &'static [Regex] {
    static PATTERNS: OnceLock<Vec<Regex>> = OnceLock::new();
    PATTERNS.get_or_init(|| {
        [
            // acronyms
            r"\b[A-Z][A-Z0-9]{2,}\b",
            // multi-word proper nouns
            r"\b[A-Z][a-z]+(?: [A-Z][a-z]+)+\b",
            // hyphenated
            r"\b[A-Za-z]+(?:-[A-Za-z0-9]+)+\b",
            r"\b[A-Za-z]*\d+[A-Za-z]*\b",
            r"[가-힣]{4,}",
        ]
        .iter()
        .filter_map(|p| Regex::new(p).ok())
        .collect()
    })
}

/// Non-empty text segments as `(slide_index, label, text)`. Table rows are
/// joined with ` | `; notes are labelled as such.
fn text_segments(documents: &[SlideDocument]) -> Vec<(usize, String, String)> {
    let mut segments = Vec::new();
    for doc in documents {
        for block in &doc.blocks {
            match block {
                Block::Text(text) => {
                    for line in &text.lines {
                        let line = line.trim();
                        if !line.is_empty() {
                            segments.push((doc.slide_index, doc.title.clone(), line.to_string()));
                        }
                    }
                }
                Block::Table(table) => {
                    for row in &table.rows {
                        let joined = row
                            .iter()
                            .map(|cell| cell.trim())
                            .filter(|cell| !cell.is_empty())
                            .collect::<Vec<_>>()
                            .join(" | ");
                        if !joined.is_empty() {
                            segments.push((doc.slide_index, doc.title.clone(), joined));
                        }
                    }
                }
                Block::Note(note) => {
                    let text = note.text.trim();
                    if !text.is_empty() {
                        segments.push((
                            doc.slide_index,
                            format!("{} (Note)", doc.title),
                            text.to_string(),
                        ));
                    }
                }
                Block::Figure(_) => {}
            }
        }
    }
    segments
}

/// Distinct terms matched in `text`, in pattern order.
fn terms_in(text: &str) -> Vec<&str> {
    let mut found: Vec<&str> = Vec::new();
    for pattern in term_patterns() {
        for m in pattern.find_iter(text) {
            let term = m.as_str().trim();
            if !term.is_empty() && !found.contains(&term) {
                found.push(term);
            }
        }
    }
    found
}

fn snippet(text: &str) -> String {
    if text.chars().count() <= SNIPPET_CHARS {
        text.to_string()
    } else {
        let head: String = text.chars().take(SNIPPET_CHARS - 3).collect();
        format!("{}...", head)
    }
}

struct Bucket {
    term: String,
    first_slide: usize,
    count: usize,
    contexts: Vec<String>,
}

/// Heuristic terminology candidates, most frequent first.
///
/// Terms are grouped case-insensitively; the first spelling seen wins. Ties
/// keep first-appearance order.
pub fn collect_term_candidates(documents: &[SlideDocument], max_terms: usize) -> Vec<TermCandidate> {
    let mut buckets: IndexMap<String, Bucket> = IndexMap::new();

    for (slide_index, _label, text) in text_segments(documents) {
        let context = format!("Slide {} - {}", slide_index + 1, snippet(&text));
        for term in terms_in(&text) {
            let bucket = buckets.entry(term.to_lowercase()).or_insert_with(|| Bucket {
                term: term.to_string(),
                first_slide: slide_index,
                count: 0,
                contexts: Vec::new(),
            });
            bucket.count += 1;
            if bucket.contexts.len() < MAX_CONTEXTS {
                bucket.contexts.push(context.clone());
            }
        }
    }

    let mut candidates: Vec<TermCandidate> = buckets
        .into_values()
        .map(|b| TermCandidate {
            term: b.term,
            slide_index: b.first_slide,
            context: b.contexts.join("; "),
            score: b.count,
        })
        .collect();
    candidates.sort_by(|a, b| b.score.cmp(&a.score));
    candidates.truncate(max_terms);
    candidates
}

/// Short outline: a header per slide followed by its first text lines.
pub fn build_outline(documents: &[SlideDocument], line_limit: usize) -> String {
    let mut lines = Vec::new();
    for doc in documents {
        lines.push(format!("Slide {}: {}", doc.number(), doc.title));
        let slide_lines = doc
            .blocks
            .iter()
            .filter_map(|block| match block {
                Block::Text(text) => Some(text.lines.iter()),
                _ => None,
            })
            .flatten()
            .map(|line| line.trim())
            .filter(|line| !line.is_empty())
            .take(OUTLINE_LINES_PER_SLIDE);
        lines.extend(slide_lines.map(|line| format!("- {}", line)));
    }
    lines.truncate(line_limit);
    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{NoteBlock, TableBlock, TextBlock};

    fn deck() -> Vec<SlideDocument> {
        let mut first = SlideDocument::new(0, "Launch");
        first.push(TextBlock::new(
            "2",
            vec![
                "Our KPI for Battle Royale".into(),
                "free-to-play model in GDC2025".into(),
            ],
        ));
        let mut second = SlideDocument::new(1, "Metrics");
        second.push(TableBlock::new(
            "3",
            vec![vec!["kpi".into(), "".into(), "게임플레이어".into()]],
            false,
        ));
        second.push(NoteBlock::new("Mention the KPI again"));
        vec![first, second]
    }

    #[test]
    fn test_candidates_are_ranked_by_frequency() {
        let candidates = collect_term_candidates(&deck(), DEFAULT_MAX_TERMS);
        let kpi = &candidates[0];
        assert_eq!(kpi.term, "KPI");
        assert_eq!(kpi.score, 2);
        assert_eq!(kpi.slide_index, 0);
        assert_eq!(
            kpi.context,
            "Slide 1 - Our KPI for Battle Royale; Slide 2 - Mention the KPI again"
        );

        let terms: Vec<&str> = candidates.iter().map(|c| c.term.as_str()).collect();
        assert!(terms.contains(&"Battle Royale"));
        assert!(terms.contains(&"free-to-play"));
        assert!(terms.contains(&"GDC2025"));
        assert!(terms.contains(&"게임플레이어"));
    }

    #[test]
    fn test_max_terms_limits_output() {
        assert_eq!(collect_term_candidates(&deck(), 1).len(), 1);
        assert!(collect_term_candidates(&[], 10).is_empty());
    }

    #[test]
    fn test_outline() {
        let outline = build_outline(&deck(), DEFAULT_OUTLINE_LINES);
        assert_eq!(
            outline,
            "Slide 1: Launch\n- Our KPI for Battle Royale\n- free-to-play model in GDC2025\nSlide 2: Metrics"
        );
        assert_eq!(build_outline(&deck(), 1), "Slide 1: Launch");
    }
}
