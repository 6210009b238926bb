//! Image recompression for embedded media.
//!
//! Payloads are keyed by their SHA-256 digest, so an image shared by several
//! shapes (or slides) is decoded and re-encoded once per run.

use crate::package::{open_archive, read_file_from_archive, rewrite_archive, Deck};
use deck_core::{Error, Result};
use image::codecs::jpeg::JpegEncoder;
use image::codecs::png::{CompressionType, FilterType as PngFilter, PngEncoder};
use image::imageops::FilterType;
use image::{DynamicImage, ImageDecoder, ImageFormat, ImageReader};
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::collections::{BTreeSet, HashMap};
use std::io::Cursor;

/// Archive prefix of embedded media parts.
pub const MEDIA_PREFIX: &str = "ppt/media/";

/// Default JPEG quality.
pub const DEFAULT_QUALITY: u8 = 80;

/// Default bound for the longer image edge, in pixels.
pub const DEFAULT_MAX_PX: u32 = 1920;

fn codec_error(e: impl std::fmt::Display) -> Error {
    Error::ImageRecompression(e.to_string())
}

fn decode(bytes: &[u8]) -> Result<DynamicImage> {
    let mut decoder = ImageReader::new(Cursor::new(bytes))
        .with_guessed_format()?
        .into_decoder()
        .map_err(codec_error)?;
    let orientation = decoder.orientation().map_err(codec_error)?;
    let mut img = DynamicImage::from_decoder(decoder).map_err(codec_error)?;
    img.apply_orientation(orientation);
    Ok(img)
}

fn encode_jpeg(img: &DynamicImage, quality: u8) -> Result<Vec<u8>> {
    let mut out = Vec::new();
    let encoder = JpegEncoder::new_with_quality(&mut out, quality.clamp(1, 100));
    let flattened = if img.color().has_color() {
        DynamicImage::ImageRgb8(img.to_rgb8())
    } else {
        DynamicImage::ImageLuma8(img.to_luma8())
    };
    flattened.write_with_encoder(encoder).map_err(codec_error)?;
    Ok(out)
}

fn encode_png(img: &DynamicImage) -> Result<Vec<u8>> {
    let mut out = Vec::new();
    let encoder = PngEncoder::new_with_quality(&mut out, CompressionType::Best, PngFilter::Adaptive);
    img.write_with_encoder(encoder).map_err(codec_error)?;
    Ok(out)
}

/// Re-encode a JPEG or PNG payload.
///
/// Orientation metadata is applied to the pixels, and the longer edge is
/// bounded by `max_px` (0 disables downsampling). Returns `Ok(None)` for other
/// formats and whenever the result would not be strictly smaller.
pub fn recompress(bytes: &[u8], quality: u8, max_px: u32) -> Result<Option<Vec<u8>>> {
    let format = match image::guess_format(bytes) {
        Ok(format @ (ImageFormat::Jpeg | ImageFormat::Png)) => format,
        Ok(other) => {
            log::debug!("Leaving {:?} image as is", other);
            return Ok(None);
        }
        Err(_) => return Ok(None),
    };

    let mut img = decode(bytes)?;
    if max_px > 0 && img.width().max(img.height()) > max_px {
        img = img.resize(max_px, max_px, FilterType::Lanczos3);
    }

    let encoded = match format {
        ImageFormat::Jpeg => encode_jpeg(&img, quality)?,
        _ => encode_png(&img)?,
    };
    Ok((encoded.len() < bytes.len()).then_some(encoded))
}

/// Byte counters of an optimization pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MediaStats {
    /// Distinct media parts examined.
    pub images: usize,
    pub optimized: usize,
    /// Supported or not, left as is because nothing smaller came out.
    pub unchanged: usize,
    pub failed: usize,
    pub bytes_before: u64,
    pub bytes_after: u64,
}

impl MediaStats {
    pub fn bytes_saved(&self) -> u64 {
        self.bytes_before.saturating_sub(self.bytes_after)
    }

    fn record(&mut self, before: usize, result: &Result<Option<Vec<u8>>>) {
        self.images += 1;
        self.bytes_before += before as u64;
        let after = match result {
            Ok(Some(smaller)) => {
                self.optimized += 1;
                smaller.len()
            }
            Ok(None) => {
                self.unchanged += 1;
                before
            }
            Err(_) => {
                self.failed += 1;
                before
            }
        };
        self.bytes_after += after as u64;
    }
}

enum Cached {
    Smaller(Vec<u8>),
    Unchanged,
    Failed(String),
}

impl Cached {
    fn to_result(&self) -> Result<Option<Vec<u8>>> {
        match self {
            Cached::Smaller(bytes) => Ok(Some(bytes.clone())),
            Cached::Unchanged => Ok(None),
            Cached::Failed(reason) => Err(Error::ImageRecompression(reason.clone())),
        }
    }
}

/// Recompression results keyed by the digest of the original bytes.
pub struct MediaCache {
    quality: u8,
    max_px: u32,
    entries: HashMap<[u8; 32], Cached>,
    hits: usize,
}

impl Default for MediaCache {
    fn default() -> Self {
        Self::new(DEFAULT_QUALITY, DEFAULT_MAX_PX)
    }
}

impl MediaCache {
    pub fn new(quality: u8, max_px: u32) -> Self {
        Self {
            quality,
            max_px,
            entries: HashMap::new(),
            hits: 0,
        }
    }

    /// Lookups answered without recompressing.
    pub fn hits(&self) -> usize {
        self.hits
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// The smaller encoding of `bytes`, if any.
    ///
    /// Failures are remembered too: a payload that failed once fails again on
    /// every lookup without being decoded a second time.
    pub fn get(&mut self, bytes: &[u8]) -> Result<Option<Vec<u8>>> {
        let key: [u8; 32] = Sha256::digest(bytes).into();
        if let Some(cached) = self.entries.get(&key) {
            self.hits += 1;
            return cached.to_result();
        }
        let cached = match recompress(bytes, self.quality, self.max_px) {
            Ok(Some(smaller)) => Cached::Smaller(smaller),
            Ok(None) => Cached::Unchanged,
            Err(e) => Cached::Failed(match e {
                Error::ImageRecompression(reason) => reason,
                other => other.to_string(),
            }),
        };
        let result = cached.to_result();
        self.entries.insert(key, cached);
        result
    }
}

impl Deck {
    /// Media parts referenced through `r:embed` from slide content and
    /// backgrounds.
    pub fn embedded_media(&self) -> BTreeSet<String> {
        let mut parts = BTreeSet::new();
        for slide in self.slides() {
            for el in slide.xml.root.descendants() {
                let Some(id) = el.prefixed_attr("embed") else { continue };
                match slide.relationship(id) {
                    Some(rel) if !rel.external => {
                        parts.insert(rel.target.clone());
                    }
                    _ => log::debug!("Slide {}: no internal target for {}", slide.number(), id),
                }
            }
        }
        parts
    }

    /// Replace every embedded image by its recompressed form when smaller.
    ///
    /// An image that fails to decode or encode keeps its original bytes and
    /// counts as failed.
    pub fn optimize_media(&mut self, cache: &mut MediaCache) -> Result<MediaStats> {
        let mut stats = MediaStats::default();
        for part in self.embedded_media() {
            let bytes = self.part_bytes(&part)?;
            let result = cache.get(&bytes);
            stats.record(bytes.len(), &result);
            match result {
                Ok(Some(smaller)) => {
                    log::debug!("{}: {} -> {} bytes", part, bytes.len(), smaller.len());
                    self.replace_part(part, smaller);
                }
                Ok(None) => {}
                Err(e) => log::warn!("{}: {}", part, e),
            }
        }
        log::info!(
            "Optimized {} of {} images, saved {} bytes",
            stats.optimized,
            stats.images,
            stats.bytes_saved()
        );
        Ok(stats)
    }
}

/// Rewrite the `ppt/media/*` entries of a package without parsing any XML.
/// Every other entry is copied verbatim.
pub fn optimize_archive(source: &[u8], cache: &mut MediaCache) -> Result<(Vec<u8>, MediaStats)> {
    let mut archive = open_archive(source)?;
    let names: Vec<String> = archive
        .file_names()
        .filter(|n| n.starts_with(MEDIA_PREFIX) && !n.ends_with('/'))
        .map(str::to_string)
        .collect();

    let mut stats = MediaStats::default();
    let mut replacements = HashMap::new();
    for name in names {
        let bytes = read_file_from_archive(&mut archive, &name)?;
        let result = cache.get(&bytes);
        stats.record(bytes.len(), &result);
        match result {
            Ok(Some(smaller)) => {
                replacements.insert(name, smaller);
            }
            Ok(None) => {}
            Err(e) => log::warn!("{}: {}", name, e),
        }
    }

    let rewritten = rewrite_archive(source, &replacements, Cursor::new(Vec::new()))?.into_inner();
    log::info!(
        "Rewrote {} of {} media entries, saved {} bytes",
        stats.optimized,
        stats.images,
        stats.bytes_saved()
    );
    Ok((rewritten, stats))
}
