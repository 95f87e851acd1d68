//! PDF Watermarker Library
//!
//! Stamps a translucent raster image onto every page of a PDF.
//! This library provides functionality to:
//! - Accept a source PDF and a watermark image from raw bytes or files
//! - Compute where the watermark lands on each page
//! - Embed the image once and overlay it on every page at a given opacity
//! - Keep an editing session with previews and a downloadable result
//!
//! # Example
//!
//! ```no_run
//! use pdf_watermarker::input::{read_source_pdf, read_watermark};
//! use pdf_watermarker::{Position, Session, Settings};
//! use std::path::Path;
//!
//! let mut session = Session::new();
//! session.set_source(read_source_pdf(Path::new("report.pdf")).unwrap());
//! session.set_watermark(read_watermark(Path::new("logo.png")).unwrap());
//! session.set_settings(Settings {
//!     opacity: 0.3,
//!     position: Position::Center,
//!     size: 60.0,
//! });
//!
//! session.apply().expect("Failed to watermark");
//! session.download().unwrap().save_in(Path::new(".")).unwrap();
//! ```

pub mod error;
pub mod input;
pub mod layout;
pub mod pdf;
pub mod session;
pub mod settings;

// Re-export commonly used items
pub use error::{Error, InputKind, Result};
pub use pdf::{composite, ImageFormat};
pub use session::{Download, Session, DOWNLOAD_FILE_NAME};
pub use settings::{Position, Settings};
