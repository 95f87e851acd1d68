//! Input acquisition
//!
//! Turns raw bytes from any source (file, drag-drop, HTTP body) into an
//! [`UploadedFile`] after checking that the media type fits the slot it was
//! offered for: `application/pdf` for the source, any `image/*` for the
//! watermark.

use std::path::Path;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;

use crate::error::{Error, InputKind, Result};

pub const PDF_MEDIA_TYPE: &str = "application/pdf";
const OCTET_STREAM: &str = "application/octet-stream";

/// Bytes accepted for one of the two input slots
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadedFile {
    /// Original file name, for display only
    pub name: String,
    /// Media type the file was accepted as
    pub media_type: String,
    pub bytes: Vec<u8>,
}

impl UploadedFile {
    pub fn preview(&self) -> Preview {
        Preview {
            media_type: self.media_type.clone(),
            bytes: self.bytes.clone(),
        }
    }
}

/// Something a front end can render directly
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Preview {
    pub media_type: String,
    pub bytes: Vec<u8>,
}

impl Preview {
    /// `data:` URL embedding the bytes as base64
    pub fn data_url(&self) -> String {
        format!("data:{};base64,{}", self.media_type, STANDARD.encode(&self.bytes))
    }
}

/// Guess a media type from magic bytes, then from the file extension
pub fn sniff_media_type(name: &str, bytes: &[u8]) -> &'static str {
    const SIGNATURES: &[(&[u8], &str)] = &[
        (b"%PDF-", PDF_MEDIA_TYPE),
        (b"\x89PNG\r\n\x1a\n", "image/png"),
        (&[0xFF, 0xD8, 0xFF], "image/jpeg"),
        (b"GIF87a", "image/gif"),
        (b"GIF89a", "image/gif"),
        (b"BM", "image/bmp"),
        (b"II*\0", "image/tiff"),
        (b"MM\0*", "image/tiff"),
    ];

    for &(magic, media_type) in SIGNATURES {
        if bytes.starts_with(magic) {
            return media_type;
        }
    }
    if bytes.len() >= 12 && &bytes[..4] == b"RIFF" && &bytes[8..12] == b"WEBP" {
        return "image/webp";
    }

    let extension = Path::new(name)
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.to_ascii_lowercase());

    match extension.as_deref() {
        Some("pdf") => PDF_MEDIA_TYPE,
        Some("png") => "image/png",
        Some("jpg") | Some("jpeg") => "image/jpeg",
        Some("gif") => "image/gif",
        Some("webp") => "image/webp",
        Some("bmp") => "image/bmp",
        Some("tif") | Some("tiff") => "image/tiff",
        _ => OCTET_STREAM,
    }
}

fn accepts(kind: InputKind, media_type: &str) -> bool {
    match kind {
        InputKind::SourcePdf => media_type == PDF_MEDIA_TYPE,
        InputKind::Watermark => media_type.starts_with("image/"),
    }
}

/// Accept bytes for an input slot
///
/// `declared_type` is the media type reported by the transport (a browser
/// file object, an HTTP header); when absent or generic the type is sniffed.
pub fn accept(
    kind: InputKind,
    name: impl Into<String>,
    bytes: Vec<u8>,
    declared_type: Option<&str>,
) -> Result<UploadedFile> {
    let name = name.into();

    let media_type = match declared_type.map(|t| t.trim().to_ascii_lowercase()) {
        Some(t) if !t.is_empty() && t != OCTET_STREAM => t,
        _ => sniff_media_type(&name, &bytes).to_string(),
    };

    if !accepts(kind, &media_type) {
        return Err(Error::UnsupportedFileType { kind, media_type });
    }

    tracing::debug!(%kind, name = %name, %media_type, len = bytes.len(), "Accepted input");

    Ok(UploadedFile {
        name,
        media_type,
        bytes,
    })
}

fn read_file(kind: InputKind, path: &Path) -> Result<UploadedFile> {
    if !path.exists() {
        return Err(Error::FileNotFound(path.to_path_buf()));
    }

    let bytes = std::fs::read(path)?;
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();

    accept(kind, name, bytes, None)
}

/// Read a source PDF from disk
pub fn read_source_pdf(path: &Path) -> Result<UploadedFile> {
    read_file(InputKind::SourcePdf, path)
}

/// Read a watermark image from disk
pub fn read_watermark(path: &Path) -> Result<UploadedFile> {
    read_file(InputKind::Watermark, path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_sniff_by_magic_bytes() {
        assert_eq!(sniff_media_type("x", b"%PDF-1.7\n"), PDF_MEDIA_TYPE);
        assert_eq!(sniff_media_type("x", b"\x89PNG\r\n\x1a\nrest"), "image/png");
        assert_eq!(sniff_media_type("x", &[0xFF, 0xD8, 0xFF, 0xE0]), "image/jpeg");
        assert_eq!(sniff_media_type("x", b"RIFF\0\0\0\0WEBPVP8 "), "image/webp");
    }

    #[test]
    fn test_sniff_falls_back_to_extension() {
        assert_eq!(sniff_media_type("scan.PDF", b""), PDF_MEDIA_TYPE);
        assert_eq!(sniff_media_type("logo.jpeg", b"??"), "image/jpeg");
        assert_eq!(sniff_media_type("notes.txt", b"hello"), OCTET_STREAM);
    }

    #[test]
    fn test_magic_bytes_win_over_extension() {
        assert_eq!(sniff_media_type("logo.pdf", b"\x89PNG\r\n\x1a\n"), "image/png");
    }

    #[test]
    fn test_accept_pdf() {
        let file = accept(InputKind::SourcePdf, "a.pdf", b"%PDF-1.4".to_vec(), None).unwrap();
        assert_eq!(file.media_type, PDF_MEDIA_TYPE);
        assert_eq!(file.name, "a.pdf");
    }

    #[test]
    fn test_accept_rejects_image_as_pdf() {
        let result = accept(InputKind::SourcePdf, "logo.png", b"\x89PNG\r\n\x1a\n".to_vec(), None);
        match result {
            Err(Error::UnsupportedFileType { kind, media_type }) => {
                assert_eq!(kind, InputKind::SourcePdf);
                assert_eq!(media_type, "image/png");
            }
            other => panic!("expected UnsupportedFileType, got {:?}", other),
        }
    }

    #[test]
    fn test_accept_any_image_for_watermark() {
        let file = accept(InputKind::Watermark, "anim.gif", b"GIF89a".to_vec(), None).unwrap();
        assert_eq!(file.media_type, "image/gif");

        let result = accept(InputKind::Watermark, "doc.pdf", b"%PDF-1.4".to_vec(), None);
        assert!(matches!(result, Err(Error::UnsupportedFileType { .. })));
    }

    #[test]
    fn test_declared_type_is_honoured() {
        let file = accept(InputKind::Watermark, "blob", vec![1, 2, 3], Some("Image/SVG+XML")).unwrap();
        assert_eq!(file.media_type, "image/svg+xml");

        let result = accept(InputKind::SourcePdf, "blob", b"%PDF-1.4".to_vec(), Some("text/plain"));
        assert!(result.is_err());
    }

    #[test]
    fn test_generic_declared_type_is_sniffed() {
        let file = accept(
            InputKind::SourcePdf,
            "upload",
            b"%PDF-1.4".to_vec(),
            Some("application/octet-stream"),
        )
        .unwrap();
        assert_eq!(file.media_type, PDF_MEDIA_TYPE);
    }

    #[test]
    fn test_preview_data_url() {
        let preview = Preview {
            media_type: "image/png".to_string(),
            bytes: b"abc".to_vec(),
        };
        assert_eq!(preview.data_url(), "data:image/png;base64,YWJj");
    }

    #[test]
    fn test_read_files() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let pdf_path = temp_dir.path().join("input.pdf");
        std::fs::write(&pdf_path, b"%PDF-1.4\n").unwrap();

        let file = read_source_pdf(&pdf_path).unwrap();
        assert_eq!(file.name, "input.pdf");

        // A PDF is not a watermark
        assert!(read_watermark(&pdf_path).is_err());

        let missing = read_source_pdf(&temp_dir.path().join("missing.pdf"));
        assert!(matches!(missing, Err(Error::FileNotFound(_))));
    }
}
