//! Translation of whole slide documents.

use super::{TranslationBatcher, TranslationConfig};
use crate::error::{Error, Result};
use crate::progress::Progress;
use crate::types::{Block, SlideDocument};

/// Visit every translatable string in document order: the title, text lines,
/// table cells and notes. Blank strings are skipped.
fn visit_texts(documents: &mut [SlideDocument], visit: &mut dyn FnMut(&mut String)) {
    let mut visit_non_blank = |text: &mut String| {
        if !text.trim().is_empty() {
            visit(text);
        }
    };
    for doc in documents.iter_mut() {
        visit_non_blank(&mut doc.title);
        for block in doc.blocks.iter_mut() {
            match block {
                Block::Text(text) => text.lines.iter_mut().for_each(&mut visit_non_blank),
                Block::Table(table) => table
                    .rows
                    .iter_mut()
                    .flatten()
                    .for_each(&mut visit_non_blank),
                Block::Note(note) => visit_non_blank(&mut note.text),
                Block::Figure(_) => {}
            }
        }
    }
}

/// All translatable strings of `documents`, in document order.
pub fn collect_document_texts(documents: &[SlideDocument]) -> Vec<String> {
    let mut copy = documents.to_vec();
    let mut texts = Vec::new();
    visit_texts(&mut copy, &mut |text| texts.push(text.clone()));
    texts
}

/// Translate titles, lines, cells and notes of `documents`.
///
/// The result has the same shape as the input: same slides, same blocks,
/// same shape ids, with only the strings replaced.
pub fn translate_documents(
    documents: &[SlideDocument],
    batcher: &TranslationBatcher<'_>,
    config: &TranslationConfig,
    progress: &Progress<'_>,
) -> Result<Vec<SlideDocument>> {
    let texts = collect_document_texts(documents);
    progress.emit(0.05, format!("Collected {} strings", texts.len()));

    let report = batcher.run(&texts, config, progress, (0.1, 0.8))?;
    if report.translations.len() != texts.len() {
        return Err(Error::TranslationLengthMismatch {
            batch: 0,
            expected: texts.len(),
            actual: report.translations.len(),
        });
    }

    let mut translated = documents.to_vec();
    let mut values = report.translations.into_iter();
    visit_texts(&mut translated, &mut |text| {
        if let Some(value) = values.next() {
            *text = value;
        }
    });
    Ok(translated)
}
