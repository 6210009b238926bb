//! Capture and restore of first-run formatting.
//!
//! Reading is best-effort: an unreadable property is logged and left out of
//! the fingerprint. Writing applies each property on its own, so one bad
//! value never blocks the others.

use crate::text::runs;
use crate::xml::{qualify, Element};
use deck_core::{Error, FontColor, FontFingerprint, Result};

/// Valid run sizes in points (`a:rPr/@sz` is in hundredths).
const MIN_SIZE_PT: f32 = 1.0;
const MAX_SIZE_PT: f32 = 4000.0;

const SCHEME_COLORS: &[&str] = &[
    "bg1", "tx1", "bg2", "tx2", "accent1", "accent2", "accent3", "accent4", "accent5", "accent6",
    "hlink", "folHlink", "dk1", "lt1", "dk2", "lt2", "phClr",
];

const FILLS: &[&str] = &["noFill", "solidFill", "gradFill", "blipFill", "pattFill", "grpFill"];

/// Children of `a:rPr` that must follow `a:latin`.
const AFTER_LATIN: &[&str] = &["ea", "cs", "sym", "hlinkClick", "hlinkMouseOver", "rtl", "extLst"];

/// Outcome of [`restore`].
#[derive(Debug, Default, Clone, PartialEq)]
pub struct RestoreReport {
    pub applied: usize,
    /// Properties that could not be written, with the reason.
    pub failed: Vec<(&'static str, String)>,
}

impl RestoreReport {
    pub fn is_clean(&self) -> bool {
        self.failed.is_empty()
    }

    fn record(&mut self, property: &'static str, result: Result<()>) {
        match result {
            Ok(()) => self.applied += 1,
            Err(e) => {
                log::debug!("{}", e);
                self.failed.push((property, e.to_string()));
            }
        }
    }
}

fn font_name(rpr: &Element) -> Option<String> {
    rpr.child("latin")?
        .attr("typeface")
        .filter(|t| !t.is_empty())
        .map(str::to_string)
}

fn font_size(rpr: &Element) -> Option<f32> {
    let raw = rpr.attr("sz")?;
    match raw.parse::<i32>() {
        Ok(hundredths) => Some(hundredths as f32 / 100.0),
        Err(e) => {
            log::debug!("Ignoring unreadable font size {:?}: {}", raw, e);
            None
        }
    }
}

fn flag(rpr: &Element, key: &str) -> Option<bool> {
    match rpr.attr(key)? {
        "1" | "true" => Some(true),
        "0" | "false" => Some(false),
        other => {
            log::debug!("Ignoring unreadable {} flag {:?}", key, other);
            None
        }
    }
}

fn underline(rpr: &Element) -> Option<bool> {
    rpr.attr("u").map(|u| u != "none")
}

fn font_color(rpr: &Element) -> Option<FontColor> {
    let fill = rpr.child("solidFill")?;
    if let Some(rgb) = fill.child("srgbClr").and_then(|c| c.attr("val")) {
        return Some(FontColor::Rgb(rgb.to_string()));
    }
    fill.child("schemeClr")
        .and_then(|c| c.attr("val"))
        .map(|val| FontColor::Theme(val.to_string()))
}

/// Fingerprint of a run's `a:rPr`.
pub fn capture_run(run: &Element) -> FontFingerprint {
    let Some(rpr) = run.child("rPr") else {
        return FontFingerprint::default();
    };
    FontFingerprint {
        name: font_name(rpr),
        size: font_size(rpr),
        bold: flag(rpr, "b"),
        italic: flag(rpr, "i"),
        underline: underline(rpr),
        color: font_color(rpr),
    }
}

/// Fingerprint of the first run of a paragraph; empty when it has no runs.
pub fn capture(paragraph: &Element) -> FontFingerprint {
    runs(paragraph).next().map(capture_run).unwrap_or_default()
}

/// The run's `a:rPr`, created as its first child when missing.
pub fn run_properties_mut(run: &mut Element) -> &mut Element {
    run.ensure_child("rPr", 0)
}

fn set_size(rpr: &mut Element, size: f32) -> Result<()> {
    if !size.is_finite() || !(MIN_SIZE_PT..=MAX_SIZE_PT).contains(&size) {
        return Err(Error::FontProperty {
            property: "size",
            reason: format!("{} pt is outside {}-{} pt", size, MIN_SIZE_PT, MAX_SIZE_PT),
        });
    }
    rpr.set_attr("sz", ((size * 100.0).round() as i32).to_string());
    Ok(())
}

fn set_flag(rpr: &mut Element, key: &str, value: bool) {
    rpr.set_attr(key, if value { "1" } else { "0" });
}

fn set_name(rpr: &mut Element, name: &str) -> Result<()> {
    if name.trim().is_empty() {
        return Err(Error::FontProperty {
            property: "name",
            reason: "typeface is empty".to_string(),
        });
    }
    let index = rpr
        .children
        .iter()
        .position(|n| matches!(n, crate::xml::Node::Element(e) if AFTER_LATIN.contains(&e.local_name())))
        .unwrap_or(rpr.children.len());
    rpr.ensure_child("latin", index).set_attr("typeface", name);
    Ok(())
}

fn set_color(rpr: &mut Element, color: &FontColor) -> Result<()> {
    let (local, value) = match color {
        FontColor::Rgb(hex) => {
            if hex.len() != 6 || !hex.chars().all(|c| c.is_ascii_hexdigit()) {
                return Err(Error::FontProperty {
                    property: "color",
                    reason: format!("{:?} is not a 6-digit hex value", hex),
                });
            }
            ("srgbClr", hex.to_ascii_uppercase())
        }
        FontColor::Theme(name) => {
            if !SCHEME_COLORS.contains(&name.as_str()) {
                return Err(Error::FontProperty {
                    property: "color",
                    reason: format!("unknown theme color {:?}", name),
                });
            }
            ("schemeClr", name.clone())
        }
    };

    rpr.retain_elements(|e| !FILLS.contains(&e.local_name()));
    let index = rpr.position("ln").map(|i| i + 1).unwrap_or(0);
    let color_el = Element::new(qualify(&rpr.name, local)).with_attr("val", value);
    let fill = Element::new(qualify(&rpr.name, "solidFill")).with_child(color_el);
    rpr.insert(index, fill);
    Ok(())
}

/// Apply every present property of `fingerprint` to `run`.
pub fn restore(run: &mut Element, fingerprint: &FontFingerprint) -> RestoreReport {
    let mut report = RestoreReport::default();
    let rpr = run_properties_mut(run);

    if let Some(size) = fingerprint.size {
        report.record("size", set_size(rpr, size));
    }
    if let Some(bold) = fingerprint.bold {
        set_flag(rpr, "b", bold);
        report.record("bold", Ok(()));
    }
    if let Some(italic) = fingerprint.italic {
        set_flag(rpr, "i", italic);
        report.record("italic", Ok(()));
    }
    if let Some(underline) = fingerprint.underline {
        rpr.set_attr("u", if underline { "sng" } else { "none" });
        report.record("underline", Ok(()));
    }
    // fill precedes latin inside a:rPr
    if let Some(color) = &fingerprint.color {
        report.record("color", set_color(rpr, color));
    }
    if let Some(name) = &fingerprint.name {
        report.record("name", set_name(rpr, name));
    }
    report
}

/// Current run size in points, if set.
pub fn run_size(run: &Element) -> Option<f32> {
    run.child("rPr").and_then(font_size)
}

/// Set the run size in points.
pub fn set_run_size(run: &mut Element, size: f32) -> Result<()> {
    set_size(run_properties_mut(run), size)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::text::add_run;
    use crate::xml::XmlDocument;

    fn paragraph(xml: &str) -> Element {
        XmlDocument::parse(&format!(r#"<a:p xmlns:a="urn:a">{}</a:p>"#, xml))
            .unwrap()
            .root
    }

    fn full() -> FontFingerprint {
        FontFingerprint {
            name: Some("Malgun Gothic".into()),
            size: Some(24.0),
            bold: Some(true),
            italic: Some(false),
            underline: Some(true),
            color: Some(FontColor::Rgb("1F4E79".into())),
        }
    }

    #[test]
    fn test_capture_first_run() {
        let p = paragraph(concat!(
            r#"<a:r><a:rPr sz="2400" b="1" i="0" u="sng">"#,
            r#"<a:solidFill><a:srgbClr val="1F4E79"/></a:solidFill><a:latin typeface="Malgun Gothic"/>"#,
            r#"</a:rPr><a:t>A</a:t></a:r>"#,
            r#"<a:r><a:rPr sz="1000"/><a:t>B</a:t></a:r>"#
        ));
        assert_eq!(capture(&p), full());
    }

    #[test]
    fn test_capture_theme_color_and_bad_values() {
        let p = paragraph(concat!(
            r#"<a:r><a:rPr sz="big" b="maybe" u="none"><a:solidFill><a:schemeClr val="accent1"/></a:solidFill></a:rPr><a:t>A</a:t></a:r>"#
        ));
        let fp = capture(&p);
        assert_eq!(fp.size, None);
        assert_eq!(fp.bold, None);
        assert_eq!(fp.underline, Some(false));
        assert_eq!(fp.color, Some(FontColor::Theme("accent1".into())));

        assert!(capture(&paragraph("")).is_empty());
    }

    #[test]
    fn test_restore_round_trip() {
        let mut p = paragraph("<a:endParaRPr/>");
        let run = add_run(&mut p, "text");
        let report = restore(run, &full());
        assert!(report.is_clean());
        assert_eq!(report.applied, 6);
        assert_eq!(capture(&p), full());

        let rpr = p.child("r").and_then(|r| r.child("rPr")).unwrap();
        let order: Vec<&str> = rpr.elements().map(|e| e.local_name()).collect();
        assert_eq!(order, ["solidFill", "latin"]);
    }

    #[test]
    fn test_restore_isolates_failures() {
        let mut p = paragraph("");
        let run = add_run(&mut p, "text");
        let fingerprint = FontFingerprint {
            size: Some(9000.0),
            color: Some(FontColor::Theme("sparkly".into())),
            bold: Some(true),
            name: Some("Arial".into()),
            ..FontFingerprint::default()
        };
        let report = restore(run, &fingerprint);
        assert_eq!(report.applied, 2);
        let failed: Vec<&str> = report.failed.iter().map(|(p, _)| *p).collect();
        assert_eq!(failed, ["size", "color"]);

        let captured = capture(&p);
        assert_eq!(captured.bold, Some(true));
        assert_eq!(captured.name.as_deref(), Some("Arial"));
        assert_eq!(captured.size, None);
    }

    #[test]
    fn test_run_size() {
        let mut p = paragraph("");
        let run = add_run(&mut p, "x");
        assert_eq!(run_size(run), None);
        set_run_size(run, 17.5).unwrap();
        assert_eq!(run_size(run), Some(17.5));
        assert!(set_run_size(run, 0.0).is_err());
    }
}
