//! Paragraphs and runs of DrawingML text bodies.
//!
//! A text body (`p:txBody` or `a:txBody`) holds `a:p` paragraphs; each
//! paragraph holds `a:r` runs whose `a:t` children carry the text.

use crate::xml::{qualify, Element};

/// Paragraphs of a text body in order.
pub fn paragraphs(body: &Element) -> impl Iterator<Item = &Element> + '_ {
    body.children_named("p")
}

pub fn paragraphs_mut(body: &mut Element) -> impl Iterator<Item = &mut Element> + '_ {
    body.elements_mut().filter(|e| e.is("p"))
}

pub fn paragraph_mut(body: &mut Element, index: usize) -> Option<&mut Element> {
    paragraphs_mut(body).nth(index)
}

pub fn runs(paragraph: &Element) -> impl Iterator<Item = &Element> + '_ {
    paragraph.children_named("r")
}

pub fn has_runs(paragraph: &Element) -> bool {
    runs(paragraph).next().is_some()
}

/// Text of a run, from its `a:t`.
pub fn run_text(run: &Element) -> String {
    run.child("t").map(|t| t.text()).unwrap_or_default()
}

/// Runs concatenated; line breaks and fields are not part of the text.
pub fn paragraph_text(paragraph: &Element) -> String {
    runs(paragraph).map(run_text).collect()
}

/// Outline level from `a:pPr/@lvl`, 0 when unset or unreadable.
pub fn paragraph_level(paragraph: &Element) -> u32 {
    paragraph
        .child("pPr")
        .and_then(|p| p.attr("lvl"))
        .and_then(|lvl| lvl.parse().ok())
        .unwrap_or(0)
}

/// Trimmed paragraph texts and their levels.
pub fn body_lines(body: &Element) -> (Vec<String>, Vec<u32>) {
    paragraphs(body)
        .map(|p| (paragraph_text(p).trim().to_string(), paragraph_level(p)))
        .unzip()
}

/// Paragraph texts joined with newlines, trimmed.
pub fn body_text(body: &Element) -> String {
    paragraphs(body)
        .map(paragraph_text)
        .collect::<Vec<_>>()
        .join("\n")
        .trim()
        .to_string()
}

/// Remove runs, breaks and fields, keeping paragraph properties.
pub fn clear_paragraph(paragraph: &mut Element) {
    paragraph.retain_elements(|e| !matches!(e.local_name(), "r" | "br" | "fld"));
}

/// Append a run holding `text`, before `a:endParaRPr` when present.
pub fn add_run<'a>(paragraph: &'a mut Element, text: &str) -> &'a mut Element {
    let mut t = Element::new(qualify(&paragraph.name, "t"));
    t.set_text(text);
    let run = Element::new(qualify(&paragraph.name, "r"))
        .with_child(Element::new(qualify(&paragraph.name, "rPr")))
        .with_child(t);

    let index = paragraph
        .position("endParaRPr")
        .unwrap_or(paragraph.children.len());
    paragraph.insert(index, run)
}

/// Replace a paragraph's content with a single run.
pub fn set_paragraph_text<'a>(paragraph: &'a mut Element, text: &str) -> &'a mut Element {
    clear_paragraph(paragraph);
    add_run(paragraph, text)
}

/// Drop every paragraph but the first, and empty the first one.
pub fn clear_text_body(body: &mut Element) {
    let mut seen = false;
    body.retain_elements(|e| {
        if !e.is("p") {
            return true;
        }
        let keep = !seen;
        seen = true;
        keep
    });
    if !seen {
        let name = qualify(&body.name, "p");
        body.push(Element::new(name));
    }
    if let Some(first) = paragraphs_mut(body).next() {
        clear_paragraph(first);
    }
}

/// Append an empty paragraph, optionally with the given `a:pPr`.
pub fn add_paragraph<'a>(body: &'a mut Element, properties: Option<&Element>) -> &'a mut Element {
    let mut paragraph = Element::new(qualify(&body.name, "p"));
    if let Some(ppr) = properties {
        paragraph.push(ppr.clone());
    }
    body.push(paragraph)
}

/// Cells of a table as `rows[row][column]`.
pub fn table_cells(table: &Element) -> Vec<Vec<&Element>> {
    table
        .children_named("tr")
        .map(|tr| tr.children_named("tc").collect())
        .collect()
}

/// Text body of the cell at `(row, column)`.
pub fn cell_body_mut(table: &mut Element, row: usize, column: usize) -> Option<&mut Element> {
    table
        .children_named_mut("tr")
        .nth(row)?
        .children_named_mut("tc")
        .nth(column)?
        .child_mut("txBody")
}

/// Cell text: paragraphs joined with newlines, trimmed.
pub fn cell_text(cell: &Element) -> String {
    cell.child("txBody").map(body_text).unwrap_or_default()
}
