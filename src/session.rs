//! Editing session: the current inputs, settings and last result

use std::path::{Path, PathBuf};

use tracing::{info, warn};

use crate::error::{Error, InputKind, Result};
use crate::input::{Preview, UploadedFile, PDF_MEDIA_TYPE};
use crate::pdf::{composite, ImageFormat};
use crate::settings::Settings;

/// File name offered for the watermarked document
pub const DOWNLOAD_FILE_NAME: &str = "watermarked-document.pdf";

/// A finished document ready to be saved or sent
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Download {
    pub file_name: String,
    pub media_type: String,
    pub bytes: Vec<u8>,
}

impl Download {
    /// Write the document into `dir` under its download name
    pub fn save_in(&self, dir: &Path) -> Result<PathBuf> {
        let path = dir.join(&self.file_name);
        std::fs::write(&path, &self.bytes)?;
        Ok(path)
    }
}

/// State for one user working on one document
///
/// Each [`Session::apply`] runs the compositor on fresh copies of the
/// inputs. A failed run leaves the previous output in place.
#[derive(Debug, Default)]
pub struct Session {
    source: Option<UploadedFile>,
    watermark: Option<UploadedFile>,
    settings: Settings,
    output: Option<Vec<u8>>,
}

impl Session {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the source PDF; any previous result no longer applies
    pub fn set_source(&mut self, file: UploadedFile) {
        self.source = Some(file);
        self.output = None;
    }

    /// Replace the watermark image; any previous result no longer applies
    pub fn set_watermark(&mut self, file: UploadedFile) {
        self.watermark = Some(file);
        self.output = None;
    }

    pub fn source(&self) -> Option<&UploadedFile> {
        self.source.as_ref()
    }

    pub fn watermark(&self) -> Option<&UploadedFile> {
        self.watermark.as_ref()
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn set_settings(&mut self, settings: Settings) {
        self.settings = settings;
    }

    /// Both inputs are present
    pub fn is_ready(&self) -> bool {
        self.source.is_some() && self.watermark.is_some()
    }

    /// Stamp the watermark onto the source with the current settings
    pub fn apply(&mut self) -> Result<&[u8]> {
        let source = self
            .source
            .as_ref()
            .ok_or(Error::MissingInput(InputKind::SourcePdf))?;
        let watermark = self
            .watermark
            .as_ref()
            .ok_or(Error::MissingInput(InputKind::Watermark))?;

        let format = watermark_format(watermark)?;

        let bytes = match composite(&source.bytes, &watermark.bytes, format, &self.settings) {
            Ok(bytes) => bytes,
            Err(e) => {
                warn!(source = %source.name, watermark = %watermark.name, error = %e, "Watermarking failed");
                return Err(e);
            }
        };

        info!(source = %source.name, output_len = bytes.len(), "Watermark applied");

        Ok(self.output.insert(bytes).as_slice())
    }

    /// Bytes of the last successful run
    pub fn output(&self) -> Option<&[u8]> {
        self.output.as_deref()
    }

    /// The last result packaged for download
    pub fn download(&self) -> Option<Download> {
        self.output.as_ref().map(|bytes| Download {
            file_name: DOWNLOAD_FILE_NAME.to_string(),
            media_type: PDF_MEDIA_TYPE.to_string(),
            bytes: bytes.clone(),
        })
    }

    /// What to show: the watermarked result if there is one, else the source
    pub fn preview(&self) -> Option<Preview> {
        match (&self.output, &self.source) {
            (Some(bytes), _) => Some(Preview {
                media_type: PDF_MEDIA_TYPE.to_string(),
                bytes: bytes.clone(),
            }),
            (None, Some(source)) => Some(source.preview()),
            (None, None) => None,
        }
    }
}

/// Pick the embedding format from the image's magic bytes, falling back to
/// the media type it was uploaded as
fn watermark_format(file: &UploadedFile) -> Result<ImageFormat> {
    ImageFormat::detect(&file.bytes)
        .or_else(|| ImageFormat::from_media_type(&file.media_type))
        .ok_or_else(|| {
            Error::InvalidImage(format!(
                "{} images cannot be embedded, use PNG or JPEG",
                file.media_type
            ))
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::input::accept;

    fn corrupt_png() -> UploadedFile {
        accept(InputKind::Watermark, "logo.png", b"not really png".to_vec(), None).unwrap()
    }

    #[test]
    fn test_apply_requires_source() {
        let mut session = Session::new();
        session.set_watermark(corrupt_png());

        let result = session.apply();
        assert!(matches!(result, Err(Error::MissingInput(InputKind::SourcePdf))));
    }

    #[test]
    fn test_apply_requires_watermark() {
        let mut session = Session::new();
        session.set_source(accept(InputKind::SourcePdf, "a.pdf", b"%PDF-1.4".to_vec(), None).unwrap());

        assert!(!session.is_ready());
        let result = session.apply();
        assert!(matches!(result, Err(Error::MissingInput(InputKind::Watermark))));
    }

    #[test]
    fn test_watermark_format_detection() {
        let png = accept(InputKind::Watermark, "x", b"\x89PNG\r\n\x1a\n".to_vec(), None).unwrap();
        assert_eq!(watermark_format(&png).unwrap(), ImageFormat::Png);

        // Corrupt bytes fall back to the declared media type
        assert_eq!(watermark_format(&corrupt_png()).unwrap(), ImageFormat::Png);

        let gif = accept(InputKind::Watermark, "x.gif", b"GIF89a".to_vec(), None).unwrap();
        assert!(matches!(watermark_format(&gif), Err(Error::InvalidImage(_))));
    }

    #[test]
    fn test_nothing_to_download_before_apply() {
        let session = Session::new();
        assert!(session.download().is_none());
        assert!(session.preview().is_none());
        assert_eq!(session.settings(), &Settings::default());
    }

    #[test]
    fn test_preview_shows_source_before_apply() {
        let mut session = Session::new();
        let source = accept(InputKind::SourcePdf, "a.pdf", b"%PDF-1.4".to_vec(), None).unwrap();
        session.set_source(source.clone());

        assert_eq!(session.preview(), Some(source.preview()));
    }
}
