//! Core domain types, Markdown rendering, and the translation protocol
//! for PowerPoint decks.

pub mod error;
pub mod glossary;
pub mod markdown;
pub mod options;
pub mod policy;
pub mod progress;
pub mod terms;
pub mod translate;
pub mod types;
pub mod walker;

pub use error::{Error, Result};
pub use glossary::{Glossary, GlossaryLimits};
pub use markdown::MarkdownRenderer;
pub use options::{ChartMode, ExtractOptions, FigureMode, SlideRange};
pub use policy::{shorten_line, OverflowPolicy, ShortenKind, Shortened};
pub use progress::{Progress, ProgressEvent, ProgressSink};
pub use terms::{build_outline, collect_term_candidates, TermCandidate};
pub use translate::{
    BatchRequest, ChatMessage, Rephraser, Role, TranslationBatcher, TranslationConfig, Translator,
};
pub use types::{
    Block, FigureBlock, FigureType, FontColor, FontFingerprint, NoteBlock, SlideDocument,
    TableBlock, TextBlock,
};
pub use walker::{walk, ShapeNode, WalkedShape};
