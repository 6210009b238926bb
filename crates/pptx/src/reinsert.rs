//! Writing translated text back into a deck.
//!
//! Two engines share the shape-id join:
//!
//! * paragraph level ([`collect_paragraphs`] / [`apply_paragraphs`]): every
//!   paragraph keeps its own properties, and its runs collapse into one run
//!   carrying the first run's formatting;
//! * block level ([`reinsert_blocks`]): a shape's paragraphs are rebuilt
//!   from a translated [`TextBlock`]/[`TableBlock`], with long lines
//!   shortened and fonts shrunk when they still overflow.
//!
//! Both address shapes by `cNvPr/@id` only, so the deck being written can be
//! loaded independently from the one that was read. Entries without a
//! counterpart on the other side are skipped.

use crate::font::{capture, restore, run_size, set_run_size};
use crate::package::{Deck, Slide};
use crate::shapes::{
    kind, notes_body_mut, shape_at_path_mut, shape_id, table, table_mut, text_body, text_body_mut,
    top_level_shapes, ShapeKind,
};
use crate::text::{
    add_paragraph, add_run, cell_body_mut, clear_text_body, has_runs, paragraph_mut,
    paragraph_text, paragraphs, paragraphs_mut, set_paragraph_text, table_cells,
};
use crate::xml::Element;
use deck_core::policy::shorten_line;
use deck_core::{
    walk, Block, Error, FontFingerprint, OverflowPolicy, Progress, Rephraser, Result,
    ShortenKind, SlideDocument, TranslationBatcher, TranslationConfig,
};
use serde::Serialize;
use std::collections::HashMap;

/// Run size assumed when shrinking a run that has no explicit size.
pub const DEFAULT_RUN_SIZE_PT: f32 = 18.0;

/// Where a paragraph sits inside its shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ParagraphSite {
    TextBody,
    TableCell { row: usize, column: usize },
}

/// A translatable paragraph and the address needed to find it again.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ParagraphInfo {
    pub slide_index: usize,
    pub shape_id: String,
    pub site: ParagraphSite,
    pub paragraph_index: usize,
    pub original_text: String,
    pub font: FontFingerprint,
}

/// Counters of [`apply_paragraphs`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ApplyReport {
    pub reinserted: usize,
    pub failed: usize,
    /// Paragraphs whose shape is absent from the target deck.
    pub unmatched: usize,
    /// Font properties that could not be restored.
    pub font_failures: usize,
}

/// Summary of a paragraph-level translation run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TranslationStats {
    pub slides: usize,
    pub paragraphs: usize,
    pub unique_texts: usize,
    pub batches: usize,
    /// Words in the translated text.
    pub word_count: usize,
    pub reinserted: usize,
    pub failed_paragraphs: usize,
    pub unmatched: usize,
}

/// Counters of [`reinsert_blocks`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BlockReinsertStats {
    pub shapes_updated: usize,
    pub notes_updated: usize,
    /// Lines rewritten by the rephraser.
    pub lines_shortened: usize,
    /// Lines cut at the character limit.
    pub truncated: usize,
    /// Shapes whose runs were shrunk.
    pub font_reductions: usize,
    pub unmatched_blocks: usize,
    pub failed_shapes: usize,
}

/// Leaf shapes of a slide as `(shape_id, index path)`, first id wins.
fn shape_paths(slide: &Slide) -> Result<HashMap<String, Vec<usize>>> {
    let mut paths = HashMap::new();
    if let Some(tree) = slide.shape_tree() {
        for walked in walk(top_level_shapes(tree))? {
            if let Some(id) = shape_id(walked.shape) {
                paths.entry(id.to_string()).or_insert(walked.path);
            }
        }
    }
    Ok(paths)
}

fn collect_body(
    body: &Element,
    slide_index: usize,
    shape_id: &str,
    site: ParagraphSite,
    out: &mut Vec<ParagraphInfo>,
) {
    for (paragraph_index, paragraph) in paragraphs(body).enumerate() {
        if !has_runs(paragraph) {
            continue;
        }
        let text = paragraph_text(paragraph);
        if text.trim().is_empty() {
            continue;
        }
        out.push(ParagraphInfo {
            slide_index,
            shape_id: shape_id.to_string(),
            site,
            paragraph_index,
            original_text: text,
            font: capture(paragraph),
        });
    }
}

/// Every non-blank paragraph of text bodies and table cells, in slide and
/// shape document order.
pub fn collect_paragraphs(deck: &Deck) -> Result<Vec<ParagraphInfo>> {
    let mut infos = Vec::new();
    for slide in deck.slides() {
        let Some(tree) = slide.shape_tree() else { continue };
        for walked in walk(top_level_shapes(tree))? {
            let shape = walked.shape;
            let Some(id) = shape_id(shape) else {
                log::debug!("Slide {}: skipping <{}> without id", slide.number(), shape.name);
                continue;
            };
            match kind(shape) {
                ShapeKind::Table => {
                    let Some(tbl) = table(shape) else { continue };
                    for (row, cells) in table_cells(tbl).into_iter().enumerate() {
                        for (column, cell) in cells.into_iter().enumerate() {
                            if let Some(body) = cell.child("txBody") {
                                let site = ParagraphSite::TableCell { row, column };
                                collect_body(body, slide.index, id, site, &mut infos);
                            }
                        }
                    }
                }
                ShapeKind::Text => {
                    if let Some(body) = text_body(shape) {
                        collect_body(body, slide.index, id, ParagraphSite::TextBody, &mut infos);
                    }
                }
                _ => {}
            }
        }
    }
    Ok(infos)
}

fn reinsertion_error(info: &ParagraphInfo, reason: impl Into<String>) -> Error {
    Error::Reinsertion {
        slide: info.slide_index + 1,
        shape_id: info.shape_id.clone(),
        paragraph: info.paragraph_index,
        reason: reason.into(),
    }
}

fn locate_paragraph<'a>(shape: &'a mut Element, info: &ParagraphInfo) -> Option<&'a mut Element> {
    let body = match info.site {
        ParagraphSite::TextBody => text_body_mut(shape)?,
        ParagraphSite::TableCell { row, column } => cell_body_mut(table_mut(shape)?, row, column)?,
    };
    paragraph_mut(body, info.paragraph_index)
}

/// Write `translations[i]` into the paragraph described by `infos[i]`.
///
/// An empty translation falls back to the original text. Each paragraph
/// gets exactly one run with the captured first-run formatting.
pub fn apply_paragraphs(
    deck: &mut Deck,
    infos: &[ParagraphInfo],
    translations: &[String],
) -> Result<ApplyReport> {
    if infos.len() != translations.len() {
        return Err(Error::TranslationLengthMismatch {
            batch: 0,
            expected: infos.len(),
            actual: translations.len(),
        });
    }

    let mut by_slide: HashMap<usize, Vec<(&ParagraphInfo, &str)>> = HashMap::new();
    for (info, text) in infos.iter().zip(translations) {
        by_slide
            .entry(info.slide_index)
            .or_default()
            .push((info, text.as_str()));
    }

    let mut report = ApplyReport::default();
    for slide in deck.slides_mut() {
        let Some(entries) = by_slide.get(&slide.index) else { continue };
        let paths = shape_paths(slide)?;
        let Some(tree) = slide.shape_tree_mut() else { continue };

        for (info, translated) in entries {
            let Some(path) = paths.get(&info.shape_id) else {
                log::debug!(
                    "Slide {}: shape {} not found, skipping",
                    info.slide_index + 1,
                    info.shape_id
                );
                report.unmatched += 1;
                continue;
            };
            let paragraph = shape_at_path_mut(tree, path).and_then(|shape| locate_paragraph(shape, info));
            let Some(paragraph) = paragraph else {
                log::warn!("{}", reinsertion_error(info, "paragraph not found"));
                report.failed += 1;
                continue;
            };

            let text = if translated.trim().is_empty() {
                info.original_text.as_str()
            } else {
                translated
            };
            let run = set_paragraph_text(paragraph, text);
            let restored = restore(run, &info.font);
            report.font_failures += restored.failed.len();
            report.reinserted += 1;
        }
    }

    log::info!(
        "Reinserted {} paragraphs ({} failed, {} unmatched)",
        report.reinserted,
        report.failed,
        report.unmatched
    );
    Ok(report)
}

/// Collect, translate and write back every paragraph of `deck`.
///
/// Progress: 0.05 after collection, 0.1 to 0.8 across batches, 0.9 before
/// writing, 1.0 when done. The caller saves the deck.
pub fn translate_presentation(
    deck: &mut Deck,
    batcher: &TranslationBatcher<'_>,
    config: &TranslationConfig,
    progress: &Progress<'_>,
) -> Result<TranslationStats> {
    let infos = collect_paragraphs(deck)?;
    let mut stats = TranslationStats {
        slides: deck.slide_count(),
        paragraphs: infos.len(),
        ..TranslationStats::default()
    };

    if infos.is_empty() {
        progress.emit(1.0, "No text to translate");
        return Ok(stats);
    }
    progress.emit(
        0.05,
        format!("Collected {} paragraphs from {} slides", infos.len(), stats.slides),
    );

    let texts: Vec<String> = infos.iter().map(|i| i.original_text.clone()).collect();
    let translated = batcher.run(&texts, config, progress, (0.1, 0.8))?;
    stats.unique_texts = translated.unique;
    stats.batches = translated.batches;
    stats.word_count = translated
        .translations
        .iter()
        .map(|t| t.split_whitespace().count())
        .sum();

    progress.emit(0.9, "Writing translations into the deck");
    let applied = apply_paragraphs(deck, &infos, &translated.translations)?;
    stats.reinserted = applied.reinserted;
    stats.failed_paragraphs = applied.failed;
    stats.unmatched = applied.unmatched;

    progress.emit(1.0, "Translation complete");
    Ok(stats)
}

/// Paragraph properties and first-run fingerprint of each paragraph.
type Template = (Option<Element>, FontFingerprint);

fn templates(body: &Element) -> Vec<Template> {
    paragraphs(body)
        .map(|p| (p.child("pPr").cloned(), capture(p)))
        .collect()
}

/// Replace the paragraphs of `body` with `lines`. Paragraph `i` reuses the
/// properties and formatting of template `i`, or of the last one. Returns the
/// number of font properties that could not be restored.
fn write_lines<S: AsRef<str>>(body: &mut Element, lines: &[S], templates: &[Template]) -> usize {
    let mut font_failures = 0;
    clear_text_body(body);
    for (i, line) in lines.iter().enumerate() {
        let template = templates.get(i).or_else(|| templates.last());
        if i > 0 {
            add_paragraph(body, template.and_then(|(ppr, _)| ppr.as_ref()));
        }
        let Some(paragraph) = paragraphs_mut(body).last() else { continue };
        let line = line.as_ref();
        if line.is_empty() {
            continue;
        }
        let run = add_run(paragraph, line);
        if let Some((_, font)) = template {
            font_failures += restore(run, font).failed.len();
        }
    }
    font_failures
}

/// Shrink every run of `body` by one step, never below the floor.
fn reduce_font_sizes(body: &mut Element, policy: &OverflowPolicy) {
    for paragraph in paragraphs_mut(body) {
        for run in paragraph.children_named_mut("r") {
            let current = run_size(run).unwrap_or(DEFAULT_RUN_SIZE_PT);
            let reduced = policy.reduced_size(current);
            if let Err(e) = set_run_size(run, reduced) {
                log::debug!("Could not shrink run: {}", e);
            }
        }
    }
}

fn write_text_shape(
    shape: &mut Element,
    lines: &[String],
    policy: &OverflowPolicy,
    rephraser: Option<&dyn Rephraser>,
    stats: &mut BlockReinsertStats,
) -> std::result::Result<(), String> {
    let body = text_body_mut(shape).ok_or("shape has no text body")?;
    let templates = templates(body);

    let mut adjusted = Vec::with_capacity(lines.len());
    for line in lines {
        let shortened = shorten_line(line, policy.max_chars_per_paragraph, rephraser);
        match shortened.kind {
            ShortenKind::Rephrased => stats.lines_shortened += 1,
            ShortenKind::Truncated => stats.truncated += 1,
            ShortenKind::Unchanged => {}
        }
        adjusted.push(shortened.text);
    }

    let failures = write_lines(body, &adjusted, &templates);
    if failures > 0 {
        log::debug!("{} font properties could not be restored", failures);
    }
    if adjusted.iter().any(|line| policy.exceeds(line)) {
        reduce_font_sizes(body, policy);
        stats.font_reductions += 1;
    }
    Ok(())
}

fn write_table_shape(shape: &mut Element, rows: &[Vec<String>]) -> std::result::Result<(), String> {
    let tbl = table_mut(shape).ok_or("shape has no table")?;
    for (r, row) in rows.iter().enumerate() {
        for (c, cell) in row.iter().enumerate() {
            let Some(body) = cell_body_mut(tbl, r, c) else {
                log::debug!("Table cell ({}, {}) not found, skipping", r, c);
                continue;
            };
            let templates = templates(body);
            let lines: Vec<&str> = cell.split('\n').collect();
            write_lines(body, &lines, &templates);
        }
    }
    Ok(())
}

/// Rebuild text shapes, tables and notes from translated documents.
///
/// Lines over `policy.max_chars_per_paragraph` go through `rephraser`
/// first and are truncated when it fails or is absent. When a shape still
/// has an overlong line afterwards, all of its runs shrink by one step.
pub fn reinsert_blocks(
    deck: &mut Deck,
    documents: &[SlideDocument],
    policy: &OverflowPolicy,
    rephraser: Option<&dyn Rephraser>,
) -> Result<BlockReinsertStats> {
    let by_slide: HashMap<usize, &SlideDocument> =
        documents.iter().map(|doc| (doc.slide_index, doc)).collect();

    let mut stats = BlockReinsertStats::default();
    for slide in deck.slides_mut() {
        let Some(doc) = by_slide.get(&slide.index) else { continue };
        let number = slide.number();
        let paths = shape_paths(slide)?;

        if let Some(tree) = slide.shape_tree_mut() {
            for block in &doc.blocks {
                if matches!(block, Block::Figure(_) | Block::Note(_)) {
                    continue;
                }
                let Some(shape_id) = block.shape_id() else { continue };
                let Some(shape) = paths.get(shape_id).and_then(|p| shape_at_path_mut(tree, p)) else {
                    log::debug!("Slide {}: no shape {} in target deck", number, shape_id);
                    stats.unmatched_blocks += 1;
                    continue;
                };
                let result = match block {
                    Block::Text(text) => write_text_shape(shape, &text.lines, policy, rephraser, &mut stats),
                    Block::Table(tbl) => write_table_shape(shape, &tbl.rows),
                    Block::Figure(_) | Block::Note(_) => Ok(()),
                };
                match result {
                    Ok(()) => stats.shapes_updated += 1,
                    Err(reason) => {
                        log::warn!("Slide {}: shape {}: {}", number, shape_id, reason);
                        stats.failed_shapes += 1;
                    }
                }
            }
        }

        let note = doc.blocks.iter().find_map(|b| match b {
            Block::Note(note) => Some(note),
            _ => None,
        });
        if let Some(note) = note {
            let body = slide
                .notes
                .as_mut()
                .and_then(|n| n.xml.root.path_mut(&["cSld", "spTree"]))
                .and_then(notes_body_mut);
            match body {
                Some(body) => {
                    let templates = templates(body);
                    let lines: Vec<&str> = note.text.split('\n').collect();
                    write_lines(body, &lines, &templates);
                    stats.notes_updated += 1;
                }
                None => log::debug!("Slide {}: no notes body to write", number),
            }
        }
    }

    log::info!(
        "Updated {} shapes ({} shortened, {} truncated, {} shrunk, {} unmatched)",
        stats.shapes_updated,
        stats.lines_shortened,
        stats.truncated,
        stats.font_reductions,
        stats.unmatched_blocks
    );
    Ok(stats)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extract::{extract, notes_text};
    use crate::fixture::*;
    use deck_core::progress::SinkError;
    use deck_core::translate::translate_documents;
    use deck_core::{BatchRequest, ExtractOptions, FontColor, TableBlock, TextBlock, Translator};

    struct Identity;

    impl Translator for Identity {
        fn translate_batch(&self, request: &BatchRequest<'_>) -> Result<String> {
            Ok(serde_json::json!({ "result": request.items }).to_string())
        }
    }

    struct Prefix(&'static str);

    impl Translator for Prefix {
        fn translate_batch(&self, request: &BatchRequest<'_>) -> Result<String> {
            let out: Vec<String> = request.items.iter().map(|s| format!("{}{}", self.0, s)).collect();
            Ok(serde_json::json!({ "result": out }).to_string())
        }
    }

    struct Fixed(String);

    impl Rephraser for Fixed {
        fn shorten(&self, _text: &str, _max_chars: usize) -> Result<String> {
            Ok(self.0.clone())
        }
    }

    struct Offline;

    impl Rephraser for Offline {
        fn shorten(&self, _text: &str, _max_chars: usize) -> Result<String> {
            Err(Error::Translator("connection refused".into()))
        }
    }

    fn styled_deck() -> Vec<u8> {
        let styled = concat!(
            r#"<a:p><a:r><a:rPr lang="en-US" sz="2800" b="1"><a:solidFill><a:srgbClr val="C00000"/></a:solidFill>"#,
            r#"<a:latin typeface="Georgia"/></a:rPr><a:t>Quarterly </a:t></a:r>"#,
            r#"<a:r><a:rPr lang="en-US" i="1"/><a:t>review</a:t></a:r></a:p>"#,
            r#"<a:p><a:pPr lvl="1"/><a:r><a:rPr lang="en-US" u="sng"><a:solidFill><a:schemeClr val="accent2"/></a:solidFill></a:rPr>"#,
            r#"<a:t>Hello</a:t></a:r></a:p><a:p><a:endParaRPr lang="en-US"/></a:p>"#
        );
        PptxBuilder::new()
            .slide(FixtureSlide::shapes(&[
                title_shape("2", "Hello"),
                rich_shape("3", "Body", styled),
                group("9", &[table_shape("10", &[&["Region", "Revenue"], &["APAC", "20%"]])]),
            ]))
            .slide(FixtureSlide::shapes(&[text_box("2", "Hello")]).with_notes("Speaker text"))
            .build()
    }

    #[test]
    fn test_identity_round_trip() {
        let bytes = styled_deck();
        let original = Deck::from_bytes(bytes.clone()).unwrap();
        let options = ExtractOptions::default().with_notes(true);
        let before_docs = extract(&original, &options).unwrap();
        let before_paragraphs = collect_paragraphs(&original).unwrap();

        let mut deck = Deck::from_bytes(bytes).unwrap();
        let stats = translate_presentation(
            &mut deck,
            &TranslationBatcher::new(&Identity),
            &TranslationConfig::default(),
            &Progress::none(),
        )
        .unwrap();
        assert_eq!(stats.slides, 2);
        assert_eq!(stats.paragraphs, 8);
        assert_eq!(stats.reinserted, 8);
        assert_eq!(stats.unique_texts, 6);
        assert_eq!(stats.failed_paragraphs, 0);

        let reloaded = Deck::from_bytes(deck.to_bytes().unwrap()).unwrap();
        assert_eq!(extract(&reloaded, &options).unwrap(), before_docs);
        let after_paragraphs = collect_paragraphs(&reloaded).unwrap();
        assert_eq!(after_paragraphs, before_paragraphs);
        assert_eq!(
            after_paragraphs[1].font.color,
            Some(FontColor::Rgb("C00000".into()))
        );
    }

    #[test]
    fn test_translation_and_fallback() {
        let mut deck = Deck::from_bytes(styled_deck()).unwrap();
        let infos = collect_paragraphs(&deck).unwrap();
        let mut translations: Vec<String> = infos.iter().map(|i| format!("T:{}", i.original_text)).collect();
        translations[0] = String::new();

        let report = apply_paragraphs(&mut deck, &infos, &translations).unwrap();
        assert_eq!(report.reinserted, infos.len());

        let docs = extract(&deck, &ExtractOptions::default()).unwrap();
        assert_eq!(docs[0].title, "Hello");
        assert_eq!(
            docs[0].blocks[1],
            Block::Text(
                TextBlock::new("3", vec!["T:Quarterly review".into(), "T:Hello".into(), "".into()])
                    .with_indent_levels(vec![0, 1, 0])
            )
        );
        assert_eq!(
            docs[0].blocks[2],
            Block::Table(TableBlock::new(
                "10",
                vec![
                    vec!["T:Region".into(), "T:Revenue".into()],
                    vec!["T:APAC".into(), "T:20%".into()]
                ],
                true
            ))
        );

        assert!(matches!(
            apply_paragraphs(&mut deck, &infos, &translations[1..]),
            Err(Error::TranslationLengthMismatch { .. })
        ));
    }

    #[test]
    fn test_unmatched_shapes_are_skipped() {
        let original = Deck::from_bytes(styled_deck()).unwrap();
        let mut infos = collect_paragraphs(&original).unwrap();
        infos[0].shape_id = "404".into();
        infos[1].paragraph_index = 42;
        let translations: Vec<String> = infos.iter().map(|i| i.original_text.clone()).collect();

        let mut target = Deck::from_bytes(styled_deck()).unwrap();
        let report = apply_paragraphs(&mut target, &infos, &translations).unwrap();
        assert_eq!(report.unmatched, 1);
        assert_eq!(report.failed, 1);
        assert_eq!(report.reinserted, infos.len() - 2);
    }

    #[test]
    fn test_progress_milestones() {
        let seen = std::cell::RefCell::new(Vec::new());
        let sink = |event: &deck_core::ProgressEvent| {
            seen.borrow_mut().push(event.ratio);
            Ok::<(), SinkError>(())
        };
        let mut deck = Deck::from_bytes(styled_deck()).unwrap();
        translate_presentation(
            &mut deck,
            &TranslationBatcher::new(&Identity),
            &TranslationConfig::default(),
            &Progress::new(&sink),
        )
        .unwrap();
        let seen = seen.into_inner();
        assert_eq!(seen.first(), Some(&0.05));
        assert!(seen.contains(&0.9));
        assert_eq!(seen.last(), Some(&1.0));
        assert!(seen.windows(2).all(|w| w[0] <= w[1]));
    }

    fn block_deck(line: &str) -> Deck {
        let body = concat!(
            r#"<a:p><a:pPr lvl="1"/><a:r><a:rPr lang="en-US" sz="2000"/><a:t>first</a:t></a:r></a:p>"#,
            r#"<a:p><a:r><a:rPr lang="en-US"/><a:t>second</a:t></a:r></a:p>"#
        );
        let bytes = PptxBuilder::new()
            .slide(
                FixtureSlide::shapes(&[
                    rich_shape("3", "Body", body),
                    table_shape("4", &[&["a", "b"]]),
                    text_box("5", line),
                ])
                .with_notes("Old notes"),
            )
            .build();
        Deck::from_bytes(bytes).unwrap()
    }

    fn sizes(deck: &Deck, shape: &str) -> Vec<Option<f32>> {
        let tree = deck.slides()[0].shape_tree().unwrap();
        let shape = top_level_shapes(tree)
            .into_iter()
            .find(|s| shape_id(s) == Some(shape))
            .unwrap();
        paragraphs(text_body(shape).unwrap())
            .flat_map(|p| p.children_named("r"))
            .map(run_size)
            .collect()
    }

    #[test]
    fn test_block_reinsertion_writes_lines_tables_and_notes() {
        let mut deck = block_deck("box");
        let mut docs = extract(&deck, &ExtractOptions::default().with_notes(true)).unwrap();
        docs = translate_documents(
            &docs,
            &TranslationBatcher::new(&Prefix("번역 ")),
            &TranslationConfig::new("en", "ko"),
            &Progress::none(),
        )
        .unwrap();
        if let Block::Text(text) = &mut docs[0].blocks[0] {
            text.lines.push("third".into());
        }
        docs[0].push(TextBlock::new("999", vec!["ghost".into()]));

        let stats = reinsert_blocks(&mut deck, &docs, &OverflowPolicy::default(), None).unwrap();
        assert_eq!(stats.shapes_updated, 3);
        assert_eq!(stats.unmatched_blocks, 1);
        assert_eq!(stats.notes_updated, 1);
        assert_eq!(stats.font_reductions, 0);

        let reloaded = Deck::from_bytes(deck.to_bytes().unwrap()).unwrap();
        let after = extract(&reloaded, &ExtractOptions::default().with_notes(true)).unwrap();
        assert_eq!(
            after[0].blocks[0],
            Block::Text(
                TextBlock::new("3", vec!["번역 first".into(), "번역 second".into(), "third".into()])
                    .with_indent_levels(vec![1, 0, 0])
            )
        );
        assert_eq!(
            after[0].blocks[1],
            Block::Table(TableBlock::new("4", vec![vec!["번역 a".into(), "번역 b".into()]], true))
        );
        assert_eq!(notes_text(&reloaded.slides()[0]).as_deref(), Some("번역 Old notes"));
        assert_eq!(sizes(&reloaded, "3"), [Some(20.0), None, None]);
    }

    fn long_line_doc(deck: &Deck, line: String) -> Vec<SlideDocument> {
        let mut docs = extract(deck, &ExtractOptions::default()).unwrap();
        docs[0].blocks.retain(|b| b.shape_id() == Some("3"));
        if let Block::Text(text) = &mut docs[0].blocks[0] {
            text.lines = vec![line, "short".into()];
        }
        docs
    }

    #[test]
    fn test_overflow_truncates_when_rephrasing_fails() {
        let mut deck = block_deck("box");
        let docs = long_line_doc(&deck, "x".repeat(200));
        let policy = OverflowPolicy::default();
        let stats = reinsert_blocks(&mut deck, &docs, &policy, Some(&Offline)).unwrap();
        assert_eq!(stats.truncated, 1);
        assert_eq!(stats.font_reductions, 0);

        let after = extract(&deck, &ExtractOptions::default()).unwrap();
        match &after[0].blocks[0] {
            Block::Text(text) => {
                assert_eq!(text.lines[0].chars().count(), policy.max_chars_per_paragraph);
                assert_eq!(text.lines[1], "short");
            }
            other => panic!("unexpected block {:?}", other),
        }
    }

    #[test]
    fn test_overflow_shrinks_fonts_when_still_long() {
        let mut deck = block_deck("box");
        let docs = long_line_doc(&deck, "y".repeat(200));
        let policy = OverflowPolicy::default();
        let rephraser = Fixed("z".repeat(190));
        let stats = reinsert_blocks(&mut deck, &docs, &policy, Some(&rephraser)).unwrap();
        assert_eq!(stats.lines_shortened, 1);
        assert_eq!(stats.font_reductions, 1);
        assert_eq!(sizes(&deck, "3"), [Some(19.0), Some(17.0)]);

        let policy = OverflowPolicy::default().with_min_font_size(19.5);
        let mut deck = block_deck("box");
        reinsert_blocks(&mut deck, &docs, &policy, Some(&rephraser)).unwrap();
        assert_eq!(sizes(&deck, "3"), [Some(19.5), Some(18.0)]);
    }

    #[test]
    fn test_rephrased_line_within_budget() {
        let mut deck = block_deck("box");
        let docs = long_line_doc(&deck, "w".repeat(200));
        let stats = reinsert_blocks(
            &mut deck,
            &docs,
            &OverflowPolicy::default(),
            Some(&Fixed("Revenue up 20% (see https://example.com)".into())),
        )
        .unwrap();
        assert_eq!(stats.font_reductions, 0);
        let after = extract(&deck, &ExtractOptions::default()).unwrap();
        match &after[0].blocks[0] {
            Block::Text(text) => assert_eq!(text.lines[0], "Revenue up 20% (see https://example.com)"),
            other => panic!("unexpected block {:?}", other),
        }
    }
}
