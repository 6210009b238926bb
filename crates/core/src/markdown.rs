//! Markdown output.
//!
//! A deterministic, lossy projection of slide documents into Markdown: one
//! `##` section per slide, bullets for text, pipe tables, bracketed figure
//! placeholders and block-quoted notes.

use crate::options::{ChartMode, ExtractOptions, FigureMode};
use crate::types::{Block, FigureBlock, FigureType, NoteBlock, SlideDocument, TableBlock, TextBlock};

/// Renderer for Markdown output.
#[derive(Debug, Clone, Default)]
pub struct MarkdownRenderer {
    figures: FigureMode,
    charts: ChartMode,
}

impl MarkdownRenderer {
    /// Create a renderer with default figure and chart modes.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a renderer that follows the figure and chart modes of `options`.
    pub fn from_options(options: &ExtractOptions) -> Self {
        Self {
            figures: options.figures,
            charts: options.charts,
        }
    }

    pub fn with_figures(mut self, figures: FigureMode) -> Self {
        self.figures = figures;
        self
    }

    pub fn with_charts(mut self, charts: ChartMode) -> Self {
        self.charts = charts;
        self
    }

    /// Render all slides, terminated by a single newline.
    pub fn render(&self, documents: &[SlideDocument]) -> String {
        let mut out: Vec<String> = Vec::new();
        for doc in documents {
            out.push(format!("## Slide {} - {}", doc.number(), doc.title));
            out.push(String::new());
            for block in &doc.blocks {
                if is_title_block(doc, block) {
                    continue;
                }
                let lines = self.render_block(block);
                if !lines.is_empty() {
                    out.extend(lines);
                    out.push(String::new());
                }
            }
        }
        let mut text = out.join("\n").trim_end().to_string();
        text.push('\n');
        text
    }

    /// Render a single block to its output lines. Empty when omitted.
    pub fn render_block(&self, block: &Block) -> Vec<String> {
        match block {
            Block::Text(text) => render_text(text),
            Block::Table(table) => render_table(table),
            Block::Figure(figure) => self.render_figure(figure).into_iter().collect(),
            Block::Note(note) => vec![render_note(note)],
        }
    }

    fn render_figure(&self, figure: &FigureBlock) -> Option<String> {
        match figure.figure_type {
            FigureType::Image => (self.figures == FigureMode::Placeholder)
                .then(|| format!("[Figure: {}]", title_or(&figure.title, "Image"))),
            FigureType::Chart => {
                if self.charts == ChartMode::Labels {
                    Some(format!(
                        "[Figure: Chart, title=\"{}\"]",
                        title_or(&figure.title, "Chart")
                    ))
                } else if self.figures == FigureMode::Placeholder {
                    Some("[Figure: Chart]".to_string())
                } else {
                    None
                }
            }
        }
    }
}

/// Render slides with the figure and chart modes of `options`.
pub fn render(documents: &[SlideDocument], options: &ExtractOptions) -> String {
    MarkdownRenderer::from_options(options).render(documents)
}

/// The title placeholder already forms the section header.
fn is_title_block(doc: &SlideDocument, block: &Block) -> bool {
    matches!(block, Block::Text(_))
        && doc.title_shape_id.is_some()
        && block.shape_id() == doc.title_shape_id.as_deref()
}

fn title_or<'a>(title: &'a Option<String>, fallback: &'a str) -> &'a str {
    title
        .as_deref()
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .unwrap_or(fallback)
}

fn render_text(block: &TextBlock) -> Vec<String> {
    block
        .lines
        .iter()
        .enumerate()
        .filter_map(|(idx, line)| {
            let line = line.trim();
            if line.is_empty() {
                return None;
            }
            let indent = "  ".repeat(block.level(idx) as usize);
            Some(format!("{}- {}", indent, line))
        })
        .collect()
}

fn render_table(block: &TableBlock) -> Vec<String> {
    if block.rows.is_empty() {
        return Vec::new();
    }
    let mut lines = Vec::with_capacity(block.rows.len() + 1);
    let body = if block.has_header {
        let header = &block.rows[0];
        lines.push(table_row(header));
        lines.push(format!("| {} |", vec!["---"; header.len()].join(" | ")));
        &block.rows[1..]
    } else {
        &block.rows[..]
    };
    lines.extend(body.iter().map(|row| table_row(row)));
    lines
}

fn table_row(cells: &[String]) -> String {
    let cells: Vec<String> = cells.iter().map(|c| escape_cell(c)).collect();
    format!("| {} |", cells.join(" | "))
}

fn escape_cell(text: &str) -> String {
    text.replace('|', "\\|").replace('\n', " ")
}

fn render_note(note: &NoteBlock) -> String {
    let collapsed = note
        .text
        .lines()
        .map(str::trim)
        .collect::<Vec<_>>()
        .join(" ");
    format!("> NOTE: {}", collapsed.trim())
}
