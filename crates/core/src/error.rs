//! Error types for deck conversion, translation and reinsertion.

use thiserror::Error;

/// Result type alias using our Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while converting or translating a deck.
///
/// Variants that describe a single structural unit (a shape, a paragraph, an
/// image) are recovered where they occur and only show up in statistics and
/// logs. The others abort the whole operation.
#[derive(Error, Debug)]
pub enum Error {
    /// Failed to open or read the input file.
    #[error("Failed to read file: {0}")]
    IoError(#[from] std::io::Error),

    /// The file format is not supported or could not be detected.
    #[error("Unsupported or unrecognized file format: {0}")]
    UnsupportedFormat(String),

    /// Invalid or corrupted file.
    #[error("Invalid or corrupted file: {0}")]
    CorruptedFile(String),

    /// ZIP archive error.
    #[error("ZIP error: {0}")]
    ZipError(String),

    /// XML parsing or serialization error.
    #[error("XML error: {0}")]
    XmlError(String),

    /// A group shape nests too deeply or contains itself.
    #[error("Malformed shape tree: {0}")]
    MalformedShapeTree(String),

    /// A single shape could not be turned into a block.
    #[error("Failed to extract shape {shape_id}: {reason}")]
    StructuralExtraction { shape_id: String, reason: String },

    /// The translator answered a batch with the wrong number of items.
    #[error(
        "Translation batch {batch} returned {actual} items for {expected} inputs; \
         retry the translation or choose a different model"
    )]
    TranslationLengthMismatch {
        batch: usize,
        expected: usize,
        actual: usize,
    },

    /// The translator answered with something that is not the agreed JSON shape.
    #[error("Failed to parse translator response ({reason}): {snippet}")]
    TranslationParse { reason: String, snippet: String },

    /// Transport or API level failure of the external translator or rephraser.
    #[error("Translator error: {0}")]
    Translator(String),

    /// No credentials were supplied for the language model.
    #[error("Missing credentials: {0}")]
    MissingCredentials(String),

    /// A paragraph could not be written back.
    #[error("Failed to reinsert paragraph {paragraph} of shape {shape_id} on slide {slide}: {reason}")]
    Reinsertion {
        slide: usize,
        shape_id: String,
        paragraph: usize,
        reason: String,
    },

    /// One font property could not be written to a run.
    #[error("Cannot set font {property}: {reason}")]
    FontProperty {
        property: &'static str,
        reason: String,
    },

    /// An image could not be decoded or re-encoded.
    #[error("Image recompression failed: {0}")]
    ImageRecompression(String),

    /// An uploaded glossary breaks a size or format limit.
    #[error("Invalid glossary: {0}")]
    GlossaryValidation(String),

    /// An option value could not be parsed.
    #[error("Invalid option: {0}")]
    InvalidOption(String),
}
