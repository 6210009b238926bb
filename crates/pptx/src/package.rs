//! PPTX package: the ZIP container and the XML parts the pipeline edits.

use crate::xml::XmlDocument;
use deck_core::{Error, Result};
use quick_xml::events::Event;
use quick_xml::Reader;
use std::collections::{BTreeMap, HashMap};
use std::fs::File;
use std::io::{BufWriter, Cursor, Read, Seek, Write};
use std::path::Path;
use zip::write::FileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

const PRESENTATION_PART: &str = "ppt/presentation.xml";

/// One entry of a `.rels` part.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Relationship {
    pub id: String,
    pub rel_type: String,
    /// Package path of the target, or the raw target for external links.
    pub target: String,
    pub external: bool,
}

impl Relationship {
    /// Whether the relationship type ends in `/{kind}`, e.g. `slide`.
    pub fn is_kind(&self, kind: &str) -> bool {
        self.rel_type.rsplit('/').next() == Some(kind)
    }
}

/// The notes page attached to a slide.
#[derive(Debug, Clone)]
pub struct NotesSlide {
    pub part_name: String,
    pub xml: XmlDocument,
}

/// A slide part with its relationships and notes.
#[derive(Debug, Clone)]
pub struct Slide {
    /// 0-based position in presentation order.
    pub index: usize,
    pub part_name: String,
    pub xml: XmlDocument,
    pub rels: Vec<Relationship>,
    pub notes: Option<NotesSlide>,
}

impl Slide {
    pub fn number(&self) -> usize {
        self.index + 1
    }

    pub fn relationship(&self, id: &str) -> Option<&Relationship> {
        self.rels.iter().find(|r| r.id == id)
    }

    /// The `p:spTree` holding the slide's shapes.
    pub fn shape_tree(&self) -> Option<&crate::xml::Element> {
        self.xml.root.path(&["cSld", "spTree"])
    }

    pub fn shape_tree_mut(&mut self) -> Option<&mut crate::xml::Element> {
        self.xml.root.path_mut(&["cSld", "spTree"])
    }
}

/// A loaded presentation.
///
/// Slides, notes slides and charts are parsed eagerly; every other entry is
/// kept as raw bytes inside the source archive and copied verbatim on save.
#[derive(Debug, Clone)]
pub struct Deck {
    source: Vec<u8>,
    slides: Vec<Slide>,
    charts: HashMap<String, XmlDocument>,
    replaced: BTreeMap<String, Vec<u8>>,
}

impl Deck {
    /// Load a deck from a reader.
    pub fn open<R: Read>(mut reader: R) -> Result<Self> {
        let mut bytes = Vec::new();
        reader.read_to_end(&mut bytes)?;
        Self::from_bytes(bytes)
    }

    pub fn open_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        log::debug!("Opening deck {}", path.display());
        Self::open(File::open(path)?)
    }

    pub fn from_bytes(source: Vec<u8>) -> Result<Self> {
        let (slides, charts) = {
            let mut archive = open_archive(&source)?;
            if !has_entry(&archive, PRESENTATION_PART) {
                return Err(Error::UnsupportedFormat(format!(
                    "not a PowerPoint package: {} is missing",
                    PRESENTATION_PART
                )));
            }

            let slide_order = get_slide_order(&mut archive)?;
            let mut slides = Vec::with_capacity(slide_order.len());
            let mut charts = HashMap::new();
            for (index, part_name) in slide_order.into_iter().enumerate() {
                let slide = load_slide(&mut archive, index, part_name, &mut charts)?;
                slides.push(slide);
            }
            (slides, charts)
        };

        log::debug!("Loaded {} slides, {} charts", slides.len(), charts.len());
        Ok(Self {
            source,
            slides,
            charts,
            replaced: BTreeMap::new(),
        })
    }

    pub fn slides(&self) -> &[Slide] {
        &self.slides
    }

    pub fn slides_mut(&mut self) -> &mut [Slide] {
        &mut self.slides
    }

    pub fn slide_count(&self) -> usize {
        self.slides.len()
    }

    /// A chart part by package path.
    pub fn chart(&self, part_name: &str) -> Option<&XmlDocument> {
        self.charts.get(part_name)
    }

    /// Current bytes of an entry, including pending replacements.
    pub fn part_bytes(&self, part_name: &str) -> Result<Vec<u8>> {
        if let Some(bytes) = self.replaced.get(part_name) {
            return Ok(bytes.clone());
        }
        let mut archive = open_archive(&self.source)?;
        read_file_from_archive(&mut archive, part_name)
    }

    /// Replace the bytes of a binary entry such as `ppt/media/image1.png`.
    pub fn replace_part(&mut self, part_name: impl Into<String>, bytes: Vec<u8>) {
        self.replaced.insert(part_name.into(), bytes);
    }

    /// Names of all entries in the package.
    pub fn part_names(&self) -> Result<Vec<String>> {
        let archive = open_archive(&self.source)?;
        Ok(archive.file_names().map(str::to_string).collect())
    }

    /// Write the deck to a seekable writer.
    pub fn save<W: Write + Seek>(&self, writer: W) -> Result<W> {
        let mut replacements: HashMap<String, Vec<u8>> = HashMap::new();
        for slide in &self.slides {
            replacements.insert(slide.part_name.clone(), slide.xml.to_bytes()?);
            if let Some(notes) = &slide.notes {
                replacements.insert(notes.part_name.clone(), notes.xml.to_bytes()?);
            }
        }
        for (name, bytes) in &self.replaced {
            replacements.insert(name.clone(), bytes.clone());
        }
        rewrite_archive(&self.source, &replacements, writer)
    }

    pub fn save_path(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let file = File::create(path)?;
        let mut writer = self.save(BufWriter::new(file))?;
        writer.flush()?;
        log::debug!("Saved deck to {}", path.display());
        Ok(())
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        Ok(self.save(Cursor::new(Vec::new()))?.into_inner())
    }
}

fn zip_error(context: &str, e: impl std::fmt::Display) -> Error {
    Error::ZipError(format!("{}: {}", context, e))
}

pub(crate) fn open_archive(bytes: &[u8]) -> Result<ZipArchive<Cursor<&[u8]>>> {
    ZipArchive::new(Cursor::new(bytes)).map_err(|e| zip_error("Failed to open ZIP", e))
}

fn has_entry<R: Read + Seek>(archive: &ZipArchive<R>, name: &str) -> bool {
    archive.file_names().any(|n| n == name)
}

/// Copy `source` into `writer`, substituting the entries named in
/// `replacements`. Every other entry is copied without recompression.
pub(crate) fn rewrite_archive<W: Write + Seek>(
    source: &[u8],
    replacements: &HashMap<String, Vec<u8>>,
    writer: W,
) -> Result<W> {
    let mut archive = open_archive(source)?;
    let mut zip = ZipWriter::new(writer);

    for i in 0..archive.len() {
        let entry = archive
            .by_index_raw(i)
            .map_err(|e| zip_error("Failed to read entry", e))?;
        let name = entry.name().to_string();

        match replacements.get(&name) {
            Some(bytes) => {
                let method = if entry.compression() == CompressionMethod::Stored {
                    CompressionMethod::Stored
                } else {
                    CompressionMethod::Deflated
                };
                drop(entry);
                zip.start_file(name.as_str(), FileOptions::default().compression_method(method))
                    .map_err(|e| zip_error(&format!("Failed to start '{}'", name), e))?;
                zip.write_all(bytes)?;
            }
            None => {
                zip.raw_copy_file(entry)
                    .map_err(|e| zip_error(&format!("Failed to copy '{}'", name), e))?;
            }
        }
    }

    zip.finish().map_err(|e| zip_error("Failed to finish ZIP", e))
}

/// Read a file from the ZIP archive.
pub(crate) fn read_file_from_archive<R: Read + Seek>(
    archive: &mut ZipArchive<R>,
    path: &str,
) -> Result<Vec<u8>> {
    let mut file = archive
        .by_name(path)
        .map_err(|e| zip_error(&format!("File not found in archive '{}'", path), e))?;

    let mut content = Vec::with_capacity(file.size() as usize);
    file.read_to_end(&mut content)
        .map_err(|e| zip_error(&format!("Failed to read '{}'", path), e))?;

    Ok(content)
}

fn read_xml_part<R: Read + Seek>(archive: &mut ZipArchive<R>, path: &str) -> Result<XmlDocument> {
    let bytes = read_file_from_archive(archive, path)?;
    XmlDocument::from_bytes(&bytes).map_err(|e| Error::CorruptedFile(format!("{}: {}", path, e)))
}

fn load_slide<R: Read + Seek>(
    archive: &mut ZipArchive<R>,
    index: usize,
    part_name: String,
    charts: &mut HashMap<String, XmlDocument>,
) -> Result<Slide> {
    let xml = read_xml_part(archive, &part_name)?;
    let rels = read_relationships(archive, &part_name)?;

    let mut notes = None;
    if let Some(rel) = rels.iter().find(|r| r.is_kind("notesSlide") && !r.external) {
        match read_xml_part(archive, &rel.target) {
            Ok(xml) => {
                notes = Some(NotesSlide {
                    part_name: rel.target.clone(),
                    xml,
                })
            }
            Err(e) => log::warn!("Skipping notes of slide {}: {}", index + 1, e),
        }
    }

    for rel in rels.iter().filter(|r| r.is_kind("chart") && !r.external) {
        if charts.contains_key(&rel.target) {
            continue;
        }
        match read_xml_part(archive, &rel.target) {
            Ok(xml) => {
                charts.insert(rel.target.clone(), xml);
            }
            Err(e) => log::warn!("Skipping chart part {}: {}", rel.target, e),
        }
    }

    Ok(Slide {
        index,
        part_name,
        xml,
        rels,
        notes,
    })
}

/// Path of the relationships part belonging to `part`.
pub(crate) fn rels_path(part: &str) -> String {
    match part.rsplit_once('/') {
        Some((dir, file)) => format!("{}/_rels/{}.rels", dir, file),
        None => format!("_rels/{}.rels", part),
    }
}

/// Resolve a relationship target against the part that owns it.
pub(crate) fn resolve_target(base_part: &str, target: &str) -> String {
    if let Some(absolute) = target.strip_prefix('/') {
        return absolute.to_string();
    }
    let mut segments: Vec<&str> = base_part.split('/').collect();
    segments.pop();
    for segment in target.split('/') {
        match segment {
            ".." => {
                segments.pop();
            }
            "." | "" => {}
            s => segments.push(s),
        }
    }
    segments.join("/")
}

/// Parse the relationships of `part`. A part without a `.rels` entry has none.
fn read_relationships<R: Read + Seek>(
    archive: &mut ZipArchive<R>,
    part: &str,
) -> Result<Vec<Relationship>> {
    let rels_path = rels_path(part);
    if !has_entry(archive, &rels_path) {
        return Ok(Vec::new());
    }
    let bytes = read_file_from_archive(archive, &rels_path)?;
    let rels_content = String::from_utf8_lossy(&bytes);

    let mut rels = Vec::new();
    let mut reader = Reader::from_str(&rels_content);
    reader.trim_text(true);

    loop {
        match reader.read_event() {
            Ok(Event::Empty(ref e)) | Ok(Event::Start(ref e))
                if crate::xml::local_name(&String::from_utf8_lossy(e.name().as_ref()))
                    == "Relationship" =>
            {
                let mut rel_type = String::new();
                let mut target = String::new();
                let mut id = String::new();
                let mut external = false;

                for attr in e.attributes().flatten() {
                    let value = attr
                        .unescape_value()
                        .map(|v| v.into_owned())
                        .unwrap_or_else(|_| String::from_utf8_lossy(&attr.value).to_string());
                    match attr.key.as_ref() {
                        b"Type" => rel_type = value,
                        b"Target" => target = value,
                        b"Id" => id = value,
                        b"TargetMode" => external = value == "External",
                        _ => {}
                    }
                }

                let target = if external {
                    target
                } else {
                    resolve_target(part, &target)
                };
                rels.push(Relationship {
                    id,
                    rel_type,
                    target,
                    external,
                });
            }
            Ok(Event::Eof) => break,
            Err(e) => {
                return Err(Error::XmlError(format!(
                    "Error parsing relationships of {}: {}",
                    part, e
                )));
            }
            _ => {}
        }
    }

    Ok(rels)
}

/// Get the ordered list of slide paths.
///
/// `p:sldIdLst` in `presentation.xml` is authoritative; when it is missing
/// the slide relationships are sorted by the number in their id or target.
fn get_slide_order<R: Read + Seek>(archive: &mut ZipArchive<R>) -> Result<Vec<String>> {
    let rels = read_relationships(archive, PRESENTATION_PART)?;
    let slide_rels: Vec<&Relationship> = rels
        .iter()
        .filter(|r| r.is_kind("slide") && !r.external)
        .collect();

    let presentation = read_xml_part(archive, PRESENTATION_PART)?;
    if let Some(list) = presentation.root.child("sldIdLst") {
        let ordered: Vec<String> = list
            .children_named("sldId")
            .filter_map(|sld| sld.prefixed_attr("id"))
            .filter_map(|rid| slide_rels.iter().find(|r| r.id == rid))
            .map(|r| r.target.clone())
            .collect();
        if !ordered.is_empty() {
            return Ok(ordered);
        }
    }

    let mut slides: Vec<(String, Option<usize>)> = slide_rels
        .iter()
        .map(|r| {
            let order_num = extract_slide_number(&r.id).or_else(|| extract_slide_number(&r.target));
            (r.target.clone(), order_num)
        })
        .collect();

    // Sort slides by their number
    slides.sort_by(|a, b| match (a.1, b.1) {
        (Some(na), Some(nb)) => na.cmp(&nb),
        (Some(_), None) => std::cmp::Ordering::Less,
        (None, Some(_)) => std::cmp::Ordering::Greater,
        (None, None) => a.0.cmp(&b.0),
    });

    Ok(slides.into_iter().map(|(path, _)| path).collect())
}

/// Extract a slide number from a string like "rId2" or "slide3.xml".
fn extract_slide_number(s: &str) -> Option<usize> {
    // Remove common extensions first
    let s = s.trim_end_matches(".xml").trim_end_matches(".rels");

    // Try to find digits at the end
    let digits: String = s.chars().rev().take_while(|c| c.is_ascii_digit()).collect();
    if digits.is_empty() {
        return None;
    }
    let digits: String = digits.chars().rev().collect();
    digits.parse().ok()
}
