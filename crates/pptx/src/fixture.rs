//! In-memory PPTX archives for tests.

use crate::xml::{Element, XmlDocument};
use std::io::{Cursor, Write};
use zip::write::FileOptions;
use zip::ZipWriter;

const NS: &str = concat!(
    r#"xmlns:a="http://schemas.openxmlformats.org/drawingml/2006/main" "#,
    r#"xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships" "#,
    r#"xmlns:p="http://schemas.openxmlformats.org/presentationml/2006/main""#
);
const REL_NS: &str = "http://schemas.openxmlformats.org/package/2006/relationships";
const REL_TYPE: &str = "http://schemas.openxmlformats.org/officeDocument/2006/relationships";
const TREE_HEAD: &str = concat!(
    r#"<p:nvGrpSpPr><p:cNvPr id="1" name=""/><p:cNvGrpSpPr/><p:nvPr/></p:nvGrpSpPr>"#,
    r#"<p:grpSpPr/>"#
);

pub(crate) fn escape(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

/// A paragraph with one plain run, or an empty paragraph for blank text.
pub(crate) fn paragraph(text: &str, level: u32) -> String {
    let ppr = if level > 0 {
        format!(r#"<a:pPr lvl="{}"/>"#, level)
    } else {
        String::new()
    };
    if text.is_empty() {
        return format!(r#"<a:p>{}<a:endParaRPr lang="en-US"/></a:p>"#, ppr);
    }
    format!(
        r#"<a:p>{}<a:r><a:rPr lang="en-US"/><a:t>{}</a:t></a:r></a:p>"#,
        ppr,
        escape(text)
    )
}

fn body(paragraphs: &str) -> String {
    format!(r#"<p:txBody><a:bodyPr/><a:lstStyle/>{}</p:txBody>"#, paragraphs)
}

/// Text shape whose body is given as raw `<a:p>` markup.
pub(crate) fn rich_shape(id: &str, name: &str, paragraphs: &str) -> String {
    format!(
        concat!(
            r#"<p:sp><p:nvSpPr><p:cNvPr id="{}" name="{}"/><p:cNvSpPr/><p:nvPr/></p:nvSpPr>"#,
            r#"<p:spPr/>{}</p:sp>"#
        ),
        id,
        escape(name),
        body(paragraphs)
    )
}

pub(crate) fn text_shape(id: &str, name: &str, lines: &[(&str, u32)]) -> String {
    let paragraphs: String = lines.iter().map(|(t, l)| paragraph(t, *l)).collect();
    rich_shape(id, name, &paragraphs)
}

pub(crate) fn title_shape(id: &str, text: &str) -> String {
    format!(
        concat!(
            r#"<p:sp><p:nvSpPr><p:cNvPr id="{}" name="Title 1"/>"#,
            r#"<p:cNvSpPr><a:spLocks noGrp="1"/></p:cNvSpPr><p:nvPr><p:ph type="title"/></p:nvPr></p:nvSpPr>"#,
            r#"<p:spPr/>{}</p:sp>"#
        ),
        id,
        body(&paragraph(text, 0))
    )
}

pub(crate) fn text_box(id: &str, text: &str) -> String {
    format!(
        concat!(
            r#"<p:sp><p:nvSpPr><p:cNvPr id="{}" name="TextBox {}"/><p:cNvSpPr txBox="1"/><p:nvPr/></p:nvSpPr>"#,
            r#"<p:spPr/>{}</p:sp>"#
        ),
        id,
        id,
        body(&paragraph(text, 0))
    )
}

pub(crate) fn table_shape(id: &str, rows: &[&[&str]]) -> String {
    let rows: String = rows
        .iter()
        .map(|row| {
            let cells: String = row
                .iter()
                .map(|cell| {
                    format!(
                        r#"<a:tc><a:txBody><a:bodyPr/><a:lstStyle/>{}</a:txBody><a:tcPr/></a:tc>"#,
                        paragraph(cell, 0)
                    )
                })
                .collect();
            format!(r#"<a:tr h="370840">{}</a:tr>"#, cells)
        })
        .collect();
    format!(
        concat!(
            r#"<p:graphicFrame><p:nvGraphicFramePr><p:cNvPr id="{}" name="Table {}"/>"#,
            r#"<p:cNvGraphicFramePr/><p:nvPr/></p:nvGraphicFramePr><p:xfrm/>"#,
            r#"<a:graphic><a:graphicData uri="http://schemas.openxmlformats.org/drawingml/2006/table">"#,
            r#"<a:tbl><a:tblPr firstRow="1"/><a:tblGrid/>{}</a:tbl></a:graphicData></a:graphic></p:graphicFrame>"#
        ),
        id, id, rows
    )
}

pub(crate) fn picture(id: &str, name: &str, rel_id: &str) -> String {
    format!(
        concat!(
            r#"<p:pic><p:nvPicPr><p:cNvPr id="{}" name="{}"/><p:cNvPicPr/><p:nvPr/></p:nvPicPr>"#,
            r#"<p:blipFill><a:blip r:embed="{}"/><a:stretch><a:fillRect/></a:stretch></p:blipFill>"#,
            r#"<p:spPr/></p:pic>"#
        ),
        id,
        escape(name),
        rel_id
    )
}

pub(crate) fn chart_frame(id: &str, rel_id: &str) -> String {
    format!(
        concat!(
            r#"<p:graphicFrame><p:nvGraphicFramePr><p:cNvPr id="{}" name="Chart {}"/>"#,
            r#"<p:cNvGraphicFramePr/><p:nvPr/></p:nvGraphicFramePr><p:xfrm/>"#,
            r#"<a:graphic><a:graphicData uri="http://schemas.openxmlformats.org/drawingml/2006/chart">"#,
            r#"<c:chart xmlns:c="http://schemas.openxmlformats.org/drawingml/2006/chart" r:id="{}"/>"#,
            r#"</a:graphicData></a:graphic></p:graphicFrame>"#
        ),
        id, id, rel_id
    )
}

pub(crate) fn chart_part(title: Option<&str>) -> String {
    let title = title
        .map(|t| {
            format!(
                r#"<c:title><c:tx><c:rich><a:bodyPr/><a:lstStyle/>{}</c:rich></c:tx><c:overlay val="0"/></c:title>"#,
                paragraph(t, 0)
            )
        })
        .unwrap_or_default();
    format!(
        concat!(
            r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>"#,
            r#"<c:chartSpace xmlns:c="http://schemas.openxmlformats.org/drawingml/2006/chart" "#,
            r#"xmlns:a="http://schemas.openxmlformats.org/drawingml/2006/main">"#,
            r#"<c:chart>{}<c:plotArea/></c:chart></c:chartSpace>"#
        ),
        title
    )
}

pub(crate) fn group(id: &str, children: &[String]) -> String {
    format!(
        concat!(
            r#"<p:grpSp><p:nvGrpSpPr><p:cNvPr id="{}" name="Group {}"/><p:cNvGrpSpPr/><p:nvPr/></p:nvGrpSpPr>"#,
            r#"<p:grpSpPr/>{}</p:grpSp>"#
        ),
        id,
        id,
        children.concat()
    )
}

pub(crate) fn slide_xml(shapes: &str) -> String {
    format!(
        concat!(
            r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>"#,
            r#"<p:sld {}><p:cSld><p:spTree>{}{}</p:spTree></p:cSld>"#,
            r#"<p:clrMapOvr><a:masterClrMapping/></p:clrMapOvr></p:sld>"#
        ),
        NS, TREE_HEAD, shapes
    )
}

fn notes_xml(text: &str) -> String {
    let paragraphs: String = text.lines().map(|l| paragraph(l, 0)).collect();
    format!(
        concat!(
            r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>"#,
            r#"<p:notes {}><p:cSld><p:spTree>{}"#,
            r#"<p:sp><p:nvSpPr><p:cNvPr id="2" name="Slide Image Placeholder 1"/><p:cNvSpPr/>"#,
            r#"<p:nvPr><p:ph type="sldImg"/></p:nvPr></p:nvSpPr><p:spPr/></p:sp>"#,
            r#"<p:sp><p:nvSpPr><p:cNvPr id="3" name="Notes Placeholder 2"/><p:cNvSpPr/>"#,
            r#"<p:nvPr><p:ph type="body" idx="1"/></p:nvPr></p:nvSpPr><p:spPr/>{}</p:sp>"#,
            r#"</p:spTree></p:cSld></p:notes>"#
        ),
        NS,
        TREE_HEAD,
        body(&paragraphs)
    )
}

/// The parsed `p:spTree` of a slide holding `shapes`.
pub(crate) fn slide_tree(shapes: &[String]) -> Element {
    XmlDocument::parse(&slide_xml(&shapes.concat()))
        .unwrap()
        .root
        .path(&["cSld", "spTree"])
        .cloned()
        .unwrap()
}

/// One slide of a fixture deck.
pub(crate) struct FixtureSlide {
    shapes: String,
    notes: Option<String>,
    rels: Vec<(String, String, String)>,
}

impl FixtureSlide {
    pub(crate) fn new(shapes: impl Into<String>) -> Self {
        Self {
            shapes: shapes.into(),
            notes: None,
            rels: Vec::new(),
        }
    }

    pub(crate) fn shapes(shapes: &[String]) -> Self {
        Self::new(shapes.concat())
    }

    pub(crate) fn with_notes(mut self, text: &str) -> Self {
        self.notes = Some(text.to_string());
        self
    }

    /// Add a relationship, e.g. `("rId2", "image", "../media/image1.png")`.
    pub(crate) fn with_rel(mut self, id: &str, kind: &str, target: &str) -> Self {
        self.rels.push((id.to_string(), kind.to_string(), target.to_string()));
        self
    }
}

/// Builds a minimal but well-formed presentation package.
#[derive(Default)]
pub(crate) struct PptxBuilder {
    slides: Vec<FixtureSlide>,
    order: Option<Vec<usize>>,
    rel_prefix: Option<String>,
    parts: Vec<(String, Vec<u8>)>,
}

impl PptxBuilder {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn slide(mut self, slide: FixtureSlide) -> Self {
        self.slides.push(slide);
        self
    }

    /// Presentation order as 1-based slide part numbers.
    pub(crate) fn order(mut self, order: &[usize]) -> Self {
        self.order = Some(order.to_vec());
        self
    }

    /// Bind the relationships namespace to `prefix` in `presentation.xml`.
    pub(crate) fn relationship_prefix(mut self, prefix: &str) -> Self {
        self.rel_prefix = Some(prefix.to_string());
        self
    }

    pub(crate) fn media(mut self, name: &str, bytes: Vec<u8>) -> Self {
        self.parts.push((format!("ppt/media/{}", name), bytes));
        self
    }

    pub(crate) fn chart(mut self, name: &str, xml: String) -> Self {
        self.parts.push((format!("ppt/charts/{}", name), xml.into_bytes()));
        self
    }

    pub(crate) fn build(self) -> Vec<u8> {
        let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
        let mut put = |name: &str, bytes: &[u8]| {
            zip.start_file(name, FileOptions::default()).unwrap();
            zip.write_all(bytes).unwrap();
        };

        let overrides: String = (1..=self.slides.len())
            .map(|n| {
                format!(
                    r#"<Override PartName="/ppt/slides/slide{}.xml" ContentType="application/vnd.openxmlformats-officedocument.presentationml.slide+xml"/>"#,
                    n
                )
            })
            .collect();
        put(
            "[Content_Types].xml",
            format!(
                concat!(
                    r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>"#,
                    r#"<Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types">"#,
                    r#"<Default Extension="rels" ContentType="application/vnd.openxmlformats-package.relationships+xml"/>"#,
                    r#"<Default Extension="xml" ContentType="application/xml"/>"#,
                    r#"<Default Extension="png" ContentType="image/png"/>"#,
                    r#"<Default Extension="jpeg" ContentType="image/jpeg"/>"#,
                    r#"<Override PartName="/ppt/presentation.xml" ContentType="application/vnd.openxmlformats-officedocument.presentationml.presentation.main+xml"/>"#,
                    r#"{}</Types>"#
                ),
                overrides
            )
            .as_bytes(),
        );
        put(
            "_rels/.rels",
            format!(
                r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?><Relationships xmlns="{}"><Relationship Id="rId1" Type="{}/officeDocument" Target="ppt/presentation.xml"/></Relationships>"#,
                REL_NS, REL_TYPE
            )
            .as_bytes(),
        );

        let order = self
            .order
            .clone()
            .unwrap_or_else(|| (1..=self.slides.len()).collect());
        let rel_prefix = self.rel_prefix.as_deref().unwrap_or("r");
        let ids: String = order
            .iter()
            .enumerate()
            .map(|(i, n)| format!(r#"<p:sldId id="{}" {}:id="rId{}"/>"#, 256 + i, rel_prefix, n + 1))
            .collect();
        let namespaces = match &self.rel_prefix {
            Some(prefix) => format!(r#"{} xmlns:{}="{}""#, NS, prefix, REL_TYPE),
            None => NS.to_string(),
        };
        put(
            "ppt/presentation.xml",
            format!(
                r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?><p:presentation {}><p:sldIdLst>{}</p:sldIdLst><p:sldSz cx="9144000" cy="6858000"/></p:presentation>"#,
                namespaces, ids
            )
            .as_bytes(),
        );
        let rels: String = (1..=self.slides.len())
            .map(|n| {
                format!(
                    r#"<Relationship Id="rId{}" Type="{}/slide" Target="slides/slide{}.xml"/>"#,
                    n + 1,
                    REL_TYPE,
                    n
                )
            })
            .collect();
        put(
            "ppt/_rels/presentation.xml.rels",
            format!(
                r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?><Relationships xmlns="{}">{}</Relationships>"#,
                REL_NS, rels
            )
            .as_bytes(),
        );

        for (i, slide) in self.slides.iter().enumerate() {
            let n = i + 1;
            put(&format!("ppt/slides/slide{}.xml", n), slide_xml(&slide.shapes).as_bytes());

            let mut rels: String = slide
                .rels
                .iter()
                .map(|(id, kind, target)| {
                    format!(
                        r#"<Relationship Id="{}" Type="{}/{}" Target="{}"/>"#,
                        id, REL_TYPE, kind, target
                    )
                })
                .collect();
            if let Some(notes) = &slide.notes {
                rels.push_str(&format!(
                    r#"<Relationship Id="rId99" Type="{}/notesSlide" Target="../notesSlides/notesSlide{}.xml"/>"#,
                    REL_TYPE, n
                ));
                put(&format!("ppt/notesSlides/notesSlide{}.xml", n), notes_xml(notes).as_bytes());
            }
            put(
                &format!("ppt/slides/_rels/slide{}.xml.rels", n),
                format!(
                    r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?><Relationships xmlns="{}">{}</Relationships>"#,
                    REL_NS, rels
                )
                .as_bytes(),
            );
        }

        for (name, bytes) in &self.parts {
            put(name, bytes);
        }
        drop(put);
        zip.finish().unwrap().into_inner()
    }
}
