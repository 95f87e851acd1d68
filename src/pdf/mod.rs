//! PDF manipulation module

pub mod metadata;
pub mod raster;
pub mod watermark;

// Re-export commonly used items
pub use metadata::{count_pages, extract_metadata, extract_metadata_from_bytes, PdfMetadata};
pub use raster::{ImageFormat, WatermarkImage};
pub use watermark::{composite, composite_with_placements, Composited};
