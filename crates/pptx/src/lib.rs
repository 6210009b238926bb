//! PPTX (Office Open XML) backend: block extraction, translation
//! reinsertion and media recompression.
//!
//! A .pptx file is a ZIP archive of XML parts. Slides and notes are kept as
//! editable element trees; everything else is copied through untouched.

pub mod extract;
pub mod font;
pub mod media;
pub mod package;
pub mod reinsert;
pub mod shapes;
pub mod text;
pub mod xml;

#[cfg(test)]
mod fixture;

pub use extract::{extract, extract_with_report, notes_text, ExtractReport};
pub use media::{optimize_archive, recompress, MediaCache, MediaStats};
pub use package::{Deck, Relationship, Slide};
pub use reinsert::{
    apply_paragraphs, collect_paragraphs, reinsert_blocks, translate_presentation, ApplyReport,
    BlockReinsertStats, ParagraphInfo, ParagraphSite, TranslationStats,
};
