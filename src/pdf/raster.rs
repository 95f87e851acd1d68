//! Watermark image decoding and embedding as a PDF Image XObject

use image::{DynamicImage, GenericImageView};
use lopdf::{dictionary, Document, ObjectId, Stream};

use crate::error::{Error, Result};
use crate::layout::ImageDimensions;

/// Raster formats the compositor can embed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageFormat {
    Png,
    Jpeg,
}

const PNG_SIGNATURE: &[u8] = b"\x89PNG\r\n\x1a\n";
const JPEG_SIGNATURE: &[u8] = &[0xFF, 0xD8, 0xFF];

impl ImageFormat {
    /// Identify the format from the leading magic bytes
    pub fn detect(bytes: &[u8]) -> Option<Self> {
        if bytes.starts_with(PNG_SIGNATURE) {
            Some(ImageFormat::Png)
        } else if bytes.starts_with(JPEG_SIGNATURE) {
            Some(ImageFormat::Jpeg)
        } else {
            None
        }
    }

    /// Map a media type such as `image/png` onto a format
    pub fn from_media_type(media_type: &str) -> Option<Self> {
        match media_type.trim().to_ascii_lowercase().as_str() {
            "image/png" => Some(ImageFormat::Png),
            "image/jpeg" | "image/jpg" | "image/pjpeg" => Some(ImageFormat::Jpeg),
            _ => None,
        }
    }

    pub fn media_type(&self) -> &'static str {
        match self {
            ImageFormat::Png => "image/png",
            ImageFormat::Jpeg => "image/jpeg",
        }
    }

    fn as_image_format(&self) -> image::ImageFormat {
        match self {
            ImageFormat::Png => image::ImageFormat::Png,
            ImageFormat::Jpeg => image::ImageFormat::Jpeg,
        }
    }
}

impl std::fmt::Display for ImageFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ImageFormat::Png => f.write_str("PNG"),
            ImageFormat::Jpeg => f.write_str("JPEG"),
        }
    }
}

/// A decoded watermark, ready to be embedded into a document
pub struct WatermarkImage<'a> {
    raw: &'a [u8],
    format: ImageFormat,
    decoded: DynamicImage,
}

impl<'a> WatermarkImage<'a> {
    /// Decode `bytes` as `format`
    ///
    /// Fails with [`Error::InvalidImage`] when the bytes are not a valid image
    /// of the declared format or have a zero dimension.
    pub fn decode(bytes: &'a [u8], format: ImageFormat) -> Result<Self> {
        let decoded = image::load_from_memory_with_format(bytes, format.as_image_format())
            .map_err(|e| Error::InvalidImage(format!("not a valid {} image: {}", format, e)))?;

        let (width, height) = decoded.dimensions();
        if width == 0 || height == 0 {
            return Err(Error::InvalidImage(format!(
                "image has no pixels ({}x{})",
                width, height
            )));
        }

        Ok(Self {
            raw: bytes,
            format,
            decoded,
        })
    }

    /// Intrinsic pixel size
    pub fn dimensions(&self) -> ImageDimensions {
        let (width, height) = self.decoded.dimensions();
        ImageDimensions { width, height }
    }

    pub fn format(&self) -> ImageFormat {
        self.format
    }

    /// Add the image (and its soft mask, if any) to `doc` and return the
    /// Image XObject id
    pub fn embed(&self, doc: &mut Document) -> Result<ObjectId> {
        if let Some(color_space) = self.jpeg_passthrough_color_space() {
            return Ok(doc.add_object(self.dct_stream(color_space)));
        }

        let ImageDimensions { width, height } = self.dimensions();
        let rgba = self.decoded.to_rgba8();

        let mut rgb = Vec::with_capacity((width * height * 3) as usize);
        let mut alpha = Vec::with_capacity((width * height) as usize);
        for pixel in rgba.pixels() {
            rgb.extend_from_slice(&pixel.0[..3]);
            alpha.push(pixel.0[3]);
        }

        let mut image_dict = dictionary! {
            "Type" => "XObject",
            "Subtype" => "Image",
            "Width" => width as i64,
            "Height" => height as i64,
            "ColorSpace" => "DeviceRGB",
            "BitsPerComponent" => 8,
        };

        if alpha.iter().any(|&a| a != u8::MAX) {
            let smask = Stream::new(
                dictionary! {
                    "Type" => "XObject",
                    "Subtype" => "Image",
                    "Width" => width as i64,
                    "Height" => height as i64,
                    "ColorSpace" => "DeviceGray",
                    "BitsPerComponent" => 8,
                },
                alpha,
            );
            let smask_id = doc.add_object(smask);
            image_dict.set("SMask", smask_id);
        }

        Ok(doc.add_object(Stream::new(image_dict, rgb)))
    }

    /// JPEGs with 8-bit gray or RGB samples can be stored as-is with
    /// DCTDecode. The decoder converts CMYK and YCCK to RGB, so the frame
    /// header decides, and everything else goes through the raw-sample path.
    fn jpeg_passthrough_color_space(&self) -> Option<&'static str> {
        if self.format != ImageFormat::Jpeg {
            return None;
        }
        match jpeg_frame_header(self.raw)? {
            JpegFrame { precision: 8, components: 1 } => Some("DeviceGray"),
            JpegFrame { precision: 8, components: 3 } => Some("DeviceRGB"),
            _ => None,
        }
    }

    fn dct_stream(&self, color_space: &str) -> Stream {
        let ImageDimensions { width, height } = self.dimensions();
        let dict = dictionary! {
            "Type" => "XObject",
            "Subtype" => "Image",
            "Width" => width as i64,
            "Height" => height as i64,
            "ColorSpace" => color_space,
            "BitsPerComponent" => 8,
            "Filter" => "DCTDecode",
        };
        // Already compressed; leave it alone when the document is compressed
        Stream::new(dict, self.raw.to_vec()).with_compression(false)
    }
}

/// Sample layout read from a JPEG start-of-frame segment
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct JpegFrame {
    precision: u8,
    components: u8,
}

/// Walk the marker segments up to the first SOFn and read its header
fn jpeg_frame_header(bytes: &[u8]) -> Option<JpegFrame> {
    if !bytes.starts_with(&[0xFF, 0xD8]) {
        return None;
    }

    let mut pos = 2;
    loop {
        // Skip fill bytes in front of the marker code
        while *bytes.get(pos)? == 0xFF && *bytes.get(pos + 1)? == 0xFF {
            pos += 1;
        }
        if *bytes.get(pos)? != 0xFF {
            return None;
        }
        let marker = *bytes.get(pos + 1)?;
        pos += 2;

        match marker {
            // Standalone markers carry no length
            0x01 | 0xD0..=0xD7 => continue,
            0xD9 | 0xDA => return None,
            // SOF0..SOF15, minus DHT, JPG and DAC
            0xC0..=0xCF if !matches!(marker, 0xC4 | 0xC8 | 0xCC) => {
                return Some(JpegFrame {
                    precision: *bytes.get(pos + 2)?,
                    components: *bytes.get(pos + 7)?,
                });
            }
            _ => {
                let length = u16::from_be_bytes([*bytes.get(pos)?, *bytes.get(pos + 1)?]) as usize;
                if length < 2 {
                    return None;
                }
                pos += length;
            }
        }
    }
}
