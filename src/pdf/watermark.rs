//! Stamping a watermark image onto every page of a PDF
//!
//! The whole run works on an in-memory copy of the document. The source is
//! decoded and the image embedded before any page is touched, so a failure
//! at any step returns an error without producing output.

use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Dictionary, Document, Object, ObjectId, Stream};
use tracing::{debug, info};

use crate::error::Result;
use crate::layout::{calculate_placement, Placement};
use crate::pdf::raster::{ImageFormat, WatermarkImage};
use crate::pdf::metadata::{load_document, page_box, stamp_document_info, PageBox};
use crate::settings::Settings;

const IMAGE_NAME_PREFIX: &str = "WmImg";
const GRAPHICS_STATE_PREFIX: &str = "WmGs";

/// Output of a compositing run
#[derive(Debug, Clone)]
pub struct Composited {
    /// The serialized watermarked PDF
    pub bytes: Vec<u8>,
    /// Where the watermark was drawn on each page, in page order
    pub placements: Vec<Placement>,
}

/// Stamp `watermark` onto every page of `source_pdf`
///
/// # Example
///
/// ```no_run
/// use pdf_watermarker::pdf::{composite, ImageFormat};
/// use pdf_watermarker::{Position, Settings};
///
/// let pdf = std::fs::read("input.pdf").unwrap();
/// let logo = std::fs::read("logo.png").unwrap();
/// let settings = Settings {
///     opacity: 0.3,
///     position: Position::Center,
///     size: 50.0,
/// };
///
/// let output = composite(&pdf, &logo, ImageFormat::Png, &settings)
///     .expect("Failed to watermark");
/// std::fs::write("watermarked-document.pdf", output).unwrap();
/// ```
pub fn composite(
    source_pdf: &[u8],
    watermark: &[u8],
    format: ImageFormat,
    settings: &Settings,
) -> Result<Vec<u8>> {
    composite_with_placements(source_pdf, watermark, format, settings).map(|c| c.bytes)
}

/// Like [`composite`], also returning the per-page placements
pub fn composite_with_placements(
    source_pdf: &[u8],
    watermark: &[u8],
    format: ImageFormat,
    settings: &Settings,
) -> Result<Composited> {
    let settings = settings.normalized()?;

    let mut doc = load_document(source_pdf)?;
    let image = WatermarkImage::decode(watermark, format)?;
    let image_size = image.dimensions();

    // Page boxes are resolved up front so a malformed page tree fails
    // before anything is added to the document
    let pages = doc
        .get_pages()
        .into_values()
        .map(|page_id| page_box(&doc, page_id).map(|b| (page_id, b)))
        .collect::<Result<Vec<(ObjectId, PageBox)>>>()?;

    info!(
        pages = pages.len(),
        format = %image.format(),
        image_width = image_size.width,
        image_height = image_size.height,
        opacity = settings.opacity,
        size = settings.size,
        position = %settings.position,
        "Stamping watermark"
    );

    let shared = SharedObjects::add_to(&mut doc, &image, settings.opacity)?;

    let mut placements = Vec::with_capacity(pages.len());
    for (i, (page_id, page_box)) in pages.into_iter().enumerate() {
        let page = page_box.dimensions();
        let placement = calculate_placement(&page, image_size, &settings);

        debug!(
            page = i + 1,
            width = page.width,
            height = page.height,
            x = placement.x,
            y = placement.y,
            overflow = placement.overflows(&page),
            "Placing watermark"
        );

        stamp_page(&mut doc, page_id, &page_box, &placement, &shared)?;
        placements.push(placement);
    }

    stamp_document_info(&mut doc)?;

    doc.compress();
    let mut bytes = Vec::new();
    doc.save_to(&mut bytes)?;

    Ok(Composited { bytes, placements })
}

/// Objects added once per run and referenced from every page
struct SharedObjects {
    image_id: ObjectId,
    graphics_state_id: ObjectId,
    save_state_id: ObjectId,
    restore_state_id: ObjectId,
}

impl SharedObjects {
    fn add_to(doc: &mut Document, image: &WatermarkImage<'_>, opacity: f64) -> Result<Self> {
        let image_id = image.embed(doc)?;

        let graphics_state_id = doc.add_object(dictionary! {
            "Type" => "ExtGState",
            "ca" => Object::Real(opacity as f32),
            "CA" => Object::Real(opacity as f32),
        });

        // Bracket the original content so its transformations and state
        // changes cannot leak into the watermark
        let save_state_id = doc.add_object(Stream::new(Dictionary::new(), b"q\n".to_vec()));
        let restore_state_id = doc.add_object(Stream::new(Dictionary::new(), b"Q\n".to_vec()));

        Ok(Self {
            image_id,
            graphics_state_id,
            save_state_id,
            restore_state_id,
        })
    }
}

/// Add the watermark overlay to one page
fn stamp_page(
    doc: &mut Document,
    page_id: ObjectId,
    page_box: &PageBox,
    placement: &Placement,
    shared: &SharedObjects,
) -> Result<()> {
    let mut resources = page_resources(doc, page_id)?;

    let mut xobjects = resource_category(doc, &resources, b"XObject");
    let image_name = unique_name(&xobjects, IMAGE_NAME_PREFIX);
    xobjects.set(image_name.as_str(), Object::Reference(shared.image_id));
    resources.set("XObject", Object::Dictionary(xobjects));

    let mut states = resource_category(doc, &resources, b"ExtGState");
    let state_name = unique_name(&states, GRAPHICS_STATE_PREFIX);
    states.set(state_name.as_str(), Object::Reference(shared.graphics_state_id));
    resources.set("ExtGState", Object::Dictionary(states));

    let content = Content {
        operations: vec![
            Operation::new("q", vec![]),
            Operation::new("gs", vec![Object::Name(state_name.into_bytes())]),
            Operation::new(
                "cm",
                vec![
                    real(placement.width),
                    real(0.0),
                    real(0.0),
                    real(placement.height),
                    real(page_box.llx + placement.x),
                    real(page_box.lly + placement.y),
                ],
            ),
            Operation::new("Do", vec![Object::Name(image_name.into_bytes())]),
            Operation::new("Q", vec![]),
        ],
    };
    let overlay_id = doc.add_object(Stream::new(Dictionary::new(), content.encode()?));

    let existing = content_stream_refs(doc, page_id)?;
    let contents = if existing.is_empty() {
        vec![Object::Reference(overlay_id)]
    } else {
        let mut contents = Vec::with_capacity(existing.len() + 3);
        contents.push(Object::Reference(shared.save_state_id));
        contents.extend(existing);
        contents.push(Object::Reference(shared.restore_state_id));
        contents.push(Object::Reference(overlay_id));
        contents
    };

    let page_dict = doc.get_object_mut(page_id)?.as_dict_mut()?;
    page_dict.set("Resources", Object::Dictionary(resources));
    page_dict.set("Contents", Object::Array(contents));

    Ok(())
}

/// Copy of the page's effective Resources dictionary, inherited if needed
fn page_resources(doc: &Document, page_id: ObjectId) -> Result<Dictionary> {
    let mut current = Some(page_id);

    while let Some(id) = current {
        let dict = doc.get_dictionary(id)?;
        if let Ok(resources) = dict.get(b"Resources") {
            return Ok(match resolve(doc, resources) {
                Object::Dictionary(resources) => resources.clone(),
                _ => Dictionary::new(),
            });
        }
        current = dict.get(b"Parent").and_then(Object::as_reference).ok();
    }

    Ok(Dictionary::new())
}

/// Copy of a resource sub-dictionary such as /XObject, dereferenced
fn resource_category(doc: &Document, resources: &Dictionary, key: &[u8]) -> Dictionary {
    match resources.get(key).map(|obj| resolve(doc, obj)) {
        Ok(Object::Dictionary(dict)) => dict.clone(),
        _ => Dictionary::new(),
    }
}

/// References to the page's existing content streams, in drawing order
fn content_stream_refs(doc: &Document, page_id: ObjectId) -> Result<Vec<Object>> {
    let page_dict = doc.get_dictionary(page_id)?;

    let refs = match page_dict.get(b"Contents") {
        Ok(Object::Reference(id)) => match doc.get_object(*id) {
            // An indirect array of streams
            Ok(Object::Array(items)) => items.clone(),
            _ => vec![Object::Reference(*id)],
        },
        Ok(Object::Array(items)) => items.clone(),
        _ => Vec::new(),
    };

    Ok(refs)
}

fn resolve<'a>(doc: &'a Document, obj: &'a Object) -> &'a Object {
    match obj {
        Object::Reference(id) => doc.get_object(*id).unwrap_or(obj),
        _ => obj,
    }
}

/// First `prefix<N>` name not already present in `dict`
fn unique_name(dict: &Dictionary, prefix: &str) -> String {
    let mut n = 1;
    loop {
        let name = format!("{}{}", prefix, n);
        if !dict.has(name.as_bytes()) {
            return name;
        }
        n += 1;
    }
}

fn real(value: f64) -> Object {
    Object::Real(value as f32)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::settings::Position;
    use image::{DynamicImage, Rgb, RgbImage};
    use std::io::Cursor;

    fn png(width: u32, height: u32) -> Vec<u8> {
        let img = DynamicImage::ImageRgb8(RgbImage::from_pixel(width, height, Rgb([0, 0, 0])));
        let mut bytes = Vec::new();
        img.write_to(&mut Cursor::new(&mut bytes), image::ImageFormat::Png).unwrap();
        bytes
    }

    /// One Letter page whose content is a single stream reference
    fn letter_pdf() -> Vec<u8> {
        let mut doc = Document::with_version("1.5");
        let pages_id = doc.new_object_id();
        let content_id = doc.add_object(Stream::new(Dictionary::new(), b"0 0 m 10 10 l S".to_vec()));
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "MediaBox" => vec![0.into(), 0.into(), 612.into(), 792.into()],
            "Contents" => content_id,
        });
        doc.objects.insert(
            pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => vec![page_id.into()],
                "Count" => 1,
            }),
        );
        let catalog_id = doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
        });
        doc.trailer.set("Root", catalog_id);

        let mut bytes = Vec::new();
        doc.save_to(&mut bytes).unwrap();
        bytes
    }

    #[test]
    fn test_unique_name_skips_taken() {
        let mut dict = Dictionary::new();
        assert_eq!(unique_name(&dict, "WmImg"), "WmImg1");

        dict.set("WmImg1", Object::Null);
        dict.set("WmImg2", Object::Null);
        assert_eq!(unique_name(&dict, "WmImg"), "WmImg3");
    }

    #[test]
    fn test_composite_reports_placements() {
        let settings = Settings {
            opacity: 0.5,
            position: Position::Center,
            size: 50.0,
        };
        let result =
            composite_with_placements(&letter_pdf(), &png(200, 100), ImageFormat::Png, &settings)
                .unwrap();

        assert_eq!(result.placements.len(), 1);
        let placement = result.placements[0];
        assert_eq!(placement.x, -90.0);
        assert_eq!(placement.y, 198.0);
        assert!(result.bytes.starts_with(b"%PDF-"));
    }

    #[test]
    fn test_original_stream_is_bracketed_and_kept() {
        let output = composite(&letter_pdf(), &png(10, 10), ImageFormat::Png, &Settings::default())
            .unwrap();
        let doc = Document::load_mem(&output).unwrap();
        let page_id = *doc.get_pages().values().next().unwrap();

        let contents = content_stream_refs(&doc, page_id).unwrap();
        assert_eq!(contents.len(), 4, "q, original, Q, overlay");

        let text = |obj: &Object| {
            let id = obj.as_reference().unwrap();
            let stream = doc.get_object(id).unwrap().as_stream().unwrap();
            let data = stream.decompressed_content().unwrap_or_else(|_| stream.content.clone());
            String::from_utf8_lossy(&data).trim().to_string()
        };

        assert_eq!(text(&contents[0]), "q");
        assert_eq!(text(&contents[1]), "0 0 m 10 10 l S");
        assert_eq!(text(&contents[2]), "Q");
        assert!(text(&contents[3]).contains("Do"));
    }

    #[test]
    fn test_invalid_settings_rejected_before_decoding() {
        let settings = Settings { size: 0.0, ..Default::default() };
        let result = composite(b"not a pdf", b"not an image", ImageFormat::Png, &settings);
        assert!(matches!(result, Err(Error::InvalidSettings(_))));
    }
}
