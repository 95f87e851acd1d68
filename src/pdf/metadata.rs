//! PDF metadata: page sizes, document info, and the info stamp written on save

use std::path::Path;

use chrono::{DateTime, FixedOffset, Local};
use lopdf::{Dictionary, Document, Object, ObjectId, StringFormat};

use crate::error::{Error, Result};
use crate::layout::PageDimensions;

/// Producer string written into every output document
pub const PRODUCER: &str = concat!("pdf-watermarker ", env!("CARGO_PKG_VERSION"));

/// A page's MediaBox: origin plus size, in points
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PageBox {
    pub llx: f64,
    pub lly: f64,
    pub width: f64,
    pub height: f64,
}

impl PageBox {
    pub fn dimensions(&self) -> PageDimensions {
        PageDimensions::new(self.width, self.height)
    }
}

/// PDF metadata
#[derive(Debug, Clone)]
pub struct PdfMetadata {
    /// Number of pages in the PDF
    pub page_count: usize,
    /// Size of each page, in page order
    pub page_sizes: Vec<PageDimensions>,
    /// Document title (if present)
    pub title: Option<String>,
    /// Document author (if present)
    pub author: Option<String>,
    /// Producer recorded in the document info (if present)
    pub producer: Option<String>,
}

/// Load a PDF from memory, mapping decode failures onto [`Error::InvalidPdf`]
pub(crate) fn load_document(bytes: &[u8]) -> Result<Document> {
    let doc = Document::load_mem(bytes).map_err(|e| Error::InvalidPdf(e.to_string()))?;

    if doc.get_pages().is_empty() {
        return Err(Error::InvalidPdf("document has no pages".to_string()));
    }

    Ok(doc)
}

/// Extract metadata from a PDF file
pub fn extract_metadata(path: &Path) -> Result<PdfMetadata> {
    if !path.exists() {
        return Err(Error::FileNotFound(path.to_path_buf()));
    }

    let bytes = std::fs::read(path)?;
    extract_metadata_from_bytes(&bytes)
}

/// Extract metadata from PDF bytes
pub fn extract_metadata_from_bytes(bytes: &[u8]) -> Result<PdfMetadata> {
    let doc = load_document(bytes)?;

    let page_sizes = doc
        .get_pages()
        .values()
        .map(|&page_id| page_box(&doc, page_id).map(|b| b.dimensions()))
        .collect::<Result<Vec<_>>>()?;

    let info = info_dictionary(&doc);
    let text = |key: &[u8]| info.and_then(|dict| dict.get(key).ok()).and_then(decode_text);

    Ok(PdfMetadata {
        page_count: page_sizes.len(),
        title: text(b"Title"),
        author: text(b"Author"),
        producer: text(b"Producer"),
        page_sizes,
    })
}

/// Count the number of pages in PDF bytes
pub fn count_pages(bytes: &[u8]) -> Result<usize> {
    Ok(load_document(bytes)?.get_pages().len())
}

/// Resolve the MediaBox for a page, walking up the page tree for inherited values
pub fn page_box(doc: &Document, page_id: ObjectId) -> Result<PageBox> {
    let mut current = Some(page_id);

    while let Some(id) = current {
        let dict = doc.get_dictionary(id)?;
        if let Some(page_box) = media_box(doc, dict) {
            return Ok(page_box);
        }
        current = dict.get(b"Parent").and_then(Object::as_reference).ok();
    }

    Err(Error::InvalidPdf(format!(
        "page {} {} has no MediaBox",
        page_id.0, page_id.1
    )))
}

fn media_box(doc: &Document, dict: &Dictionary) -> Option<PageBox> {
    let raw = dict.get(b"MediaBox").ok()?;
    let resolved = match raw {
        Object::Reference(id) => doc.get_object(*id).ok()?,
        other => other,
    };

    let coords = resolved
        .as_array()
        .ok()?
        .iter()
        .map(|obj| number(doc, obj))
        .collect::<Option<Vec<f64>>>()?;

    if let [x1, y1, x2, y2] = coords[..] {
        // Corners may be given in any order
        Some(PageBox {
            llx: x1.min(x2),
            lly: y1.min(y2),
            width: (x2 - x1).abs(),
            height: (y2 - y1).abs(),
        })
    } else {
        None
    }
}

fn number(doc: &Document, obj: &Object) -> Option<f64> {
    match obj {
        Object::Integer(i) => Some(*i as f64),
        Object::Real(f) => Some(*f as f64),
        Object::Reference(id) => doc.get_object(*id).ok().and_then(|o| number(doc, o)),
        _ => None,
    }
}

fn info_dictionary(doc: &Document) -> Option<&Dictionary> {
    match doc.trailer.get(b"Info").ok()? {
        Object::Reference(id) => doc.get_dictionary(*id).ok(),
        Object::Dictionary(dict) => Some(dict),
        _ => None,
    }
}

/// Decode a PDF text string (PDFDocEncoding/ASCII or UTF-16BE with BOM)
fn decode_text(obj: &Object) -> Option<String> {
    let bytes = obj.as_str().ok()?;

    if let Some(utf16) = bytes.strip_prefix(&[0xFE, 0xFF]) {
        let units: Vec<u16> = utf16
            .chunks_exact(2)
            .map(|pair| u16::from_be_bytes([pair[0], pair[1]]))
            .collect();
        return String::from_utf16(&units).ok();
    }

    String::from_utf8(bytes.to_vec()).ok()
}

/// Format a timestamp as a PDF date string, e.g. `D:20261015093000+02'00'`
pub fn format_pdf_date(date: &DateTime<FixedOffset>) -> String {
    let offset_secs = date.offset().local_minus_utc();
    let sign = if offset_secs < 0 { '-' } else { '+' };
    let offset_mins = offset_secs.abs() / 60;

    format!(
        "D:{}{}{:02}'{:02}'",
        date.format("%Y%m%d%H%M%S"),
        sign,
        offset_mins / 60,
        offset_mins % 60
    )
}

/// Record the producer and modification date in the document info dictionary
///
/// Existing info entries (title, author, ...) are kept.
pub(crate) fn stamp_document_info(doc: &mut Document) -> Result<()> {
    let now = Local::now().fixed_offset();
    let mod_date = Object::String(format_pdf_date(&now).into_bytes(), StringFormat::Literal);
    let producer = Object::String(PRODUCER.as_bytes().to_vec(), StringFormat::Literal);

    let existing = doc.trailer.get(b"Info").ok().cloned();
    match existing {
        Some(Object::Reference(info_id)) => {
            let info = doc.get_object_mut(info_id)?.as_dict_mut()?;
            info.set("Producer", producer);
            info.set("ModDate", mod_date);
        }
        Some(Object::Dictionary(mut info)) => {
            info.set("Producer", producer);
            info.set("ModDate", mod_date);
            doc.trailer.set("Info", Object::Dictionary(info));
        }
        _ => {
            let mut info = Dictionary::new();
            info.set("Producer", producer);
            info.set("ModDate", mod_date);
            let info_id = doc.add_object(Object::Dictionary(info));
            doc.trailer.set("Info", Object::Reference(info_id));
        }
    }

    Ok(())
}
