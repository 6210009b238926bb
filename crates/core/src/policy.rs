//! Overflow mitigation for reinserted text.

use crate::translate::Rephraser;
use serde::{Deserialize, Serialize};

/// Limits applied when translated lines are written back into shapes.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct OverflowPolicy {
    /// Lines longer than this many characters are shortened first.
    pub max_chars_per_paragraph: usize,
    /// Font size floor when shrinking.
    pub min_font_size_pt: f32,
    /// Shrink step applied once to every run of an overflowing shape.
    pub reduce_step_pt: f32,
}

impl Default for OverflowPolicy {
    fn default() -> Self {
        Self {
            max_chars_per_paragraph: 180,
            min_font_size_pt: 12.0,
            reduce_step_pt: 1.0,
        }
    }
}

impl OverflowPolicy {
    pub fn with_max_chars(mut self, max_chars: usize) -> Self {
        self.max_chars_per_paragraph = max_chars.max(1);
        self
    }

    pub fn with_min_font_size(mut self, min_pt: f32) -> Self {
        self.min_font_size_pt = min_pt;
        self
    }

    pub fn with_reduce_step(mut self, step_pt: f32) -> Self {
        self.reduce_step_pt = step_pt;
        self
    }

    /// Whether `line` is over the character budget.
    pub fn exceeds(&self, line: &str) -> bool {
        line.chars().count() > self.max_chars_per_paragraph
    }

    /// The size a run of `current` points shrinks to, never below the floor
    /// and never above its current size.
    pub fn reduced_size(&self, current: f32) -> f32 {
        (current - self.reduce_step_pt)
            .max(self.min_font_size_pt)
            .min(current)
    }
}

/// How a line got to its final form.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShortenKind {
    /// Already within budget.
    Unchanged,
    /// Rewritten by the rephraser. May still exceed the budget.
    Rephrased,
    /// Cut at the character limit.
    Truncated,
}

/// A line after shortening.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Shortened {
    pub text: String,
    pub kind: ShortenKind,
}

/// Bring `line` within `max_chars` characters.
///
/// The rephraser is asked first. When it fails, returns nothing, or is not
/// available the line is truncated at the limit. A rephrased line that is
/// still too long is kept as is; the caller shrinks the font instead.
pub fn shorten_line(line: &str, max_chars: usize, rephraser: Option<&dyn Rephraser>) -> Shortened {
    if line.chars().count() <= max_chars {
        return Shortened {
            text: line.to_string(),
            kind: ShortenKind::Unchanged,
        };
    }

    if let Some(rephraser) = rephraser {
        match rephraser.shorten(line, max_chars) {
            Ok(text) if !text.trim().is_empty() => {
                let text = text.trim().to_string();
                if text.chars().count() > max_chars {
                    log::debug!(
                        "Rephrased line still has {} characters (budget {})",
                        text.chars().count(),
                        max_chars
                    );
                }
                return Shortened {
                    text,
                    kind: ShortenKind::Rephrased,
                };
            }
            Ok(_) => log::warn!("Rephraser returned an empty line, truncating instead"),
            Err(e) => log::warn!("Rephrasing failed, truncating instead: {}", e),
        }
    }

    Shortened {
        text: truncate_chars(line, max_chars),
        kind: ShortenKind::Truncated,
    }
}

/// First `max_chars` characters of `text`, trailing whitespace removed.
pub fn truncate_chars(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((byte_idx, _)) => text[..byte_idx].trim_end().to_string(),
        None => text.to_string(),
    }
}
