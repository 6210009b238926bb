//! Slide-by-slide extraction of the block model.

use crate::package::{Deck, Slide};
use crate::shapes::{
    chart_rel_id, is_text_box, is_title_placeholder, kind, notes_body, shape_id, shape_name,
    table, text_body, top_level_shapes, ShapeKind,
};
use crate::text::{body_lines, body_text, cell_text, table_cells};
use crate::xml::Element;
use deck_core::{
    walk, Block, ChartMode, Error, ExtractOptions, FigureBlock, FigureMode, NoteBlock, Result,
    SlideDocument, TableBlock, TextBlock,
};
use serde::Serialize;

/// Extraction result with the number of shapes that had to be skipped.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ExtractReport {
    pub documents: Vec<SlideDocument>,
    pub skipped_shapes: usize,
}

/// Extract the block model of every selected slide.
pub fn extract(deck: &Deck, options: &ExtractOptions) -> Result<Vec<SlideDocument>> {
    Ok(extract_with_report(deck, options)?.documents)
}

pub fn extract_with_report(deck: &Deck, options: &ExtractOptions) -> Result<ExtractReport> {
    let mut report = ExtractReport::default();
    for slide in deck.slides() {
        if !options.includes_slide(slide.number()) {
            continue;
        }
        let doc = extract_slide(deck, slide, options, &mut report.skipped_shapes)?;
        log::debug!(
            "Slide {}: {:?}, {} blocks",
            slide.number(),
            doc.title,
            doc.blocks.len()
        );
        report.documents.push(doc);
    }
    if report.skipped_shapes > 0 {
        log::warn!("Skipped {} shapes that could not be read", report.skipped_shapes);
    }
    Ok(report)
}

/// Extract one slide. Shapes that fail are logged, counted in `skipped`
/// and left out; only a malformed group hierarchy aborts.
pub fn extract_slide(
    deck: &Deck,
    slide: &Slide,
    options: &ExtractOptions,
    skipped: &mut usize,
) -> Result<SlideDocument> {
    let Some(tree) = slide.shape_tree() else {
        log::warn!("{} has no shape tree", slide.part_name);
        return Ok(SlideDocument::new(slide.index, format!("Slide {}", slide.number())));
    };

    let walked = walk(top_level_shapes(tree))?;
    let (title, title_shape_id) = slide_title(slide, tree, walked.iter().map(|w| w.shape));
    let mut doc = SlideDocument::new(slide.index, title);
    doc.title_shape_id = title_shape_id;

    for shape in walked.iter().map(|w| w.shape) {
        match shape_block(deck, slide, shape, options) {
            Ok(Some(block)) => doc.push(block),
            Ok(None) => {}
            Err(e) => {
                log::warn!("Slide {}: {}", slide.number(), e);
                *skipped += 1;
            }
        }
    }

    if options.with_notes {
        if let Some(text) = notes_text(slide) {
            doc.push(NoteBlock::new(text));
        }
    }
    Ok(doc)
}

/// Title placeholder text, else the first line of the first text box, else
/// `Slide {n}`.
fn slide_title<'a>(
    slide: &Slide,
    tree: &Element,
    shapes: impl Iterator<Item = &'a Element>,
) -> (String, Option<String>) {
    let placeholder = top_level_shapes(tree)
        .into_iter()
        .find(|s| is_title_placeholder(s));
    if let Some(shape) = placeholder {
        let text = text_body(shape)
            .map(|body| {
                body_lines(body)
                    .0
                    .into_iter()
                    .filter(|l| !l.is_empty())
                    .collect::<Vec<_>>()
                    .join(" ")
            })
            .unwrap_or_default();
        if !text.is_empty() {
            return (text, shape_id(shape).map(str::to_string));
        }
    }

    let first_text_box = shapes
        .filter(|s| is_text_box(s))
        .find_map(|s| text_body(s));
    if let Some(body) = first_text_box {
        if let Some(line) = body_lines(body).0.into_iter().find(|l| !l.is_empty()) {
            return (line, None);
        }
    }

    (format!("Slide {}", slide.number()), None)
}

fn structural(shape_id: &str, reason: impl Into<String>) -> Error {
    Error::StructuralExtraction {
        shape_id: shape_id.to_string(),
        reason: reason.into(),
    }
}

fn shape_block(
    deck: &Deck,
    slide: &Slide,
    shape: &Element,
    options: &ExtractOptions,
) -> Result<Option<Block>> {
    let shape_kind = kind(shape);
    if matches!(shape_kind, ShapeKind::Other | ShapeKind::Group) {
        return Ok(None);
    }
    let id = shape_id(shape)
        .ok_or_else(|| structural("?", format!("<{}> has no cNvPr id", shape.name)))?;

    let block: Option<Block> = match shape_kind {
        ShapeKind::Table => {
            let tbl = table(shape).ok_or_else(|| structural(id, "table frame without a:tbl"))?;
            let rows: Vec<Vec<String>> = table_cells(tbl)
                .iter()
                .map(|row| row.iter().map(|cell| cell_text(cell)).collect())
                .collect();
            Some(TableBlock::new(id, rows, options.table_header).into())
        }
        ShapeKind::Picture => match options.figures {
            FigureMode::Omit => None,
            FigureMode::Placeholder => {
                Some(FigureBlock::image(id, shape_name(shape).map(str::to_string)).into())
            }
        },
        ShapeKind::Chart => match (options.charts, options.figures) {
            (ChartMode::Labels, _) => Some(FigureBlock::chart(id, chart_title(deck, slide, shape)).into()),
            (_, FigureMode::Placeholder) => Some(FigureBlock::chart(id, None).into()),
            _ => None,
        },
        ShapeKind::Text => {
            let body = text_body(shape).ok_or_else(|| structural(id, "shape without txBody"))?;
            let (lines, levels) = body_lines(body);
            let block = TextBlock::new(id, lines).with_indent_levels(levels);
            block.has_text().then(|| block.into())
        }
        ShapeKind::Other | ShapeKind::Group => None,
    };
    Ok(block)
}

/// Title text of the chart part behind a chart frame, if non-empty.
fn chart_title(deck: &Deck, slide: &Slide, shape: &Element) -> Option<String> {
    let rel_id = chart_rel_id(shape)?;
    let rel = slide.relationship(rel_id)?;
    let chart = deck.chart(&rel.target)?;
    let rich = chart.root.path(&["chart", "title", "tx", "rich"])?;
    let text = body_text(rich);
    (!text.is_empty()).then_some(text)
}

/// Text of the notes body placeholder, if non-blank.
pub fn notes_text(slide: &Slide) -> Option<String> {
    let notes = slide.notes.as_ref()?;
    let tree = notes.xml.root.path(&["cSld", "spTree"])?;
    let text = body_text(notes_body(tree)?);
    (!text.is_empty()).then_some(text)
}
