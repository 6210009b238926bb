//! Domain types for representing extracted slide content.

use serde::{Deserialize, Serialize};

/// The content of one slide, in shape document order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SlideDocument {
    /// 0-based position of the slide in the source deck.
    pub slide_index: usize,

    /// Resolved slide title.
    pub title: String,

    /// Shape that supplied the title, when it came from a title placeholder.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title_shape_id: Option<String>,

    /// Blocks in shape document order.
    pub blocks: Vec<Block>,
}

impl SlideDocument {
    /// Create a slide document with no blocks.
    pub fn new(slide_index: usize, title: impl Into<String>) -> Self {
        Self {
            slide_index,
            title: title.into(),
            title_shape_id: None,
            blocks: Vec::new(),
        }
    }

    /// 1-based slide number.
    pub fn number(&self) -> usize {
        self.slide_index + 1
    }

    /// Add a block to this slide.
    pub fn push(&mut self, block: impl Into<Block>) {
        self.blocks.push(block.into());
    }

    /// Find the block extracted from the given shape.
    pub fn block_for_shape(&self, shape_id: &str) -> Option<&Block> {
        self.blocks.iter().find(|b| b.shape_id() == Some(shape_id))
    }

    /// Count whitespace-separated words across all textual blocks.
    pub fn word_count(&self) -> usize {
        self.blocks
            .iter()
            .map(|block| match block {
                Block::Text(text) => text.lines.iter().map(|l| l.split_whitespace().count()).sum(),
                Block::Table(table) => table
                    .rows
                    .iter()
                    .flatten()
                    .map(|c| c.split_whitespace().count())
                    .sum(),
                Block::Note(note) => note.text.split_whitespace().count(),
                Block::Figure(_) => 0,
            })
            .sum()
    }
}

/// One unit of slide content derived from one shape.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Block {
    Text(TextBlock),
    Table(TableBlock),
    Figure(FigureBlock),
    Note(NoteBlock),
}

impl Block {
    /// The shape this block was extracted from. Notes have none.
    pub fn shape_id(&self) -> Option<&str> {
        match self {
            Block::Text(b) => Some(&b.shape_id),
            Block::Table(b) => Some(&b.shape_id),
            Block::Figure(b) => Some(&b.shape_id),
            Block::Note(_) => None,
        }
    }
}

/// Paragraph text of a text-bearing shape.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextBlock {
    pub shape_id: String,
    /// One entry per paragraph, trimmed. Blank entries are kept.
    pub lines: Vec<String>,
    /// Indent level of `lines[i]`; missing entries mean level 0.
    #[serde(default)]
    pub indent_levels: Vec<u32>,
}

impl TextBlock {
    pub fn new(shape_id: impl Into<String>, lines: Vec<String>) -> Self {
        Self {
            shape_id: shape_id.into(),
            lines,
            indent_levels: Vec::new(),
        }
    }

    pub fn with_indent_levels(mut self, levels: Vec<u32>) -> Self {
        self.indent_levels = levels;
        self
    }

    /// Indent level of the line at `idx`.
    pub fn level(&self, idx: usize) -> u32 {
        self.indent_levels.get(idx).copied().unwrap_or(0)
    }

    /// Whether at least one line has visible text.
    pub fn has_text(&self) -> bool {
        self.lines.iter().any(|l| !l.trim().is_empty())
    }
}

impl From<TextBlock> for Block {
    fn from(block: TextBlock) -> Self {
        Block::Text(block)
    }
}

/// Cell text of a table shape. Rows may be ragged.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableBlock {
    pub shape_id: String,
    pub rows: Vec<Vec<String>>,
    pub has_header: bool,
}

impl TableBlock {
    pub fn new(shape_id: impl Into<String>, rows: Vec<Vec<String>>, has_header: bool) -> Self {
        Self {
            shape_id: shape_id.into(),
            rows,
            has_header,
        }
    }
}

impl From<TableBlock> for Block {
    fn from(block: TableBlock) -> Self {
        Block::Table(block)
    }
}

/// Kind of non-textual content a figure stands for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FigureType {
    Image,
    Chart,
}

/// Placeholder for a picture or chart.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FigureBlock {
    pub shape_id: String,
    pub figure_type: FigureType,
    pub title: Option<String>,
}

impl FigureBlock {
    pub fn image(shape_id: impl Into<String>, title: Option<String>) -> Self {
        Self {
            shape_id: shape_id.into(),
            figure_type: FigureType::Image,
            title,
        }
    }

    pub fn chart(shape_id: impl Into<String>, title: Option<String>) -> Self {
        Self {
            shape_id: shape_id.into(),
            figure_type: FigureType::Chart,
            title,
        }
    }
}

impl From<FigureBlock> for Block {
    fn from(block: FigureBlock) -> Self {
        Block::Figure(block)
    }
}

/// Presenter notes of a slide.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NoteBlock {
    pub text: String,
}

impl NoteBlock {
    pub fn new(text: impl Into<String>) -> Self {
        Self { text: text.into() }
    }
}

impl From<NoteBlock> for Block {
    fn from(block: NoteBlock) -> Self {
        Block::Note(block)
    }
}

/// Minimal formatting captured from the first run of a paragraph.
///
/// Every property is optional: a property that was unset or unreadable in
/// the source is simply not restored.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FontFingerprint {
    pub name: Option<String>,
    /// Size in points.
    pub size: Option<f32>,
    pub bold: Option<bool>,
    pub italic: Option<bool>,
    pub underline: Option<bool>,
    pub color: Option<FontColor>,
}

impl FontFingerprint {
    /// True when nothing was captured.
    pub fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.size.is_none()
            && self.bold.is_none()
            && self.italic.is_none()
            && self.underline.is_none()
            && self.color.is_none()
    }
}

/// Text color, either explicit or a reference into the theme.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", content = "value", rename_all = "snake_case")]
pub enum FontColor {
    /// Hex RGB value such as `1F4E79`.
    Rgb(String),
    /// Theme color scheme name such as `accent1`.
    Theme(String),
}
