//! Error types for the PDF watermarker library

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias using our Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Which of the two inputs a message refers to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputKind {
    /// The PDF being watermarked
    SourcePdf,
    /// The raster image stamped onto each page
    Watermark,
}

impl std::fmt::Display for InputKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            InputKind::SourcePdf => f.write_str("PDF"),
            InputKind::Watermark => f.write_str("watermark image"),
        }
    }
}

/// Main error type for the PDF watermarker library
///
/// Every variant is recoverable: report it and let the user retry with
/// different input.
#[derive(Error, Debug)]
pub enum Error {
    /// Source bytes do not decode as a usable PDF
    #[error("Invalid PDF: {0}")]
    InvalidPdf(String),

    /// Watermark bytes do not decode as the declared raster format
    #[error("Invalid watermark image: {0}")]
    InvalidImage(String),

    /// Watermarking was requested before both inputs were supplied
    #[error("Missing input: upload a {0} first")]
    MissingInput(InputKind),

    /// Settings that cannot produce a drawable watermark
    #[error("Invalid watermark settings: {0}")]
    InvalidSettings(String),

    /// A file was offered for the wrong input slot
    #[error("Unsupported file type for {kind}: {media_type}")]
    UnsupportedFileType {
        kind: InputKind,
        media_type: String,
    },

    /// PDF processing error while mutating or saving
    #[error("PDF error: {0}")]
    Pdf(#[from] lopdf::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// File not found
    #[error("File not found: {}", .0.display())]
    FileNotFound(PathBuf),
}
