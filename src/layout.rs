//! Watermark placement calculations
//!
//! All values are PDF points (1/72 inch) in a coordinate system whose origin
//! is the bottom-left corner of the page box.

use crate::settings::{Position, Settings};

/// Page dimensions in points
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PageDimensions {
    pub width: f64,
    pub height: f64,
}

impl PageDimensions {
    pub fn new(width: f64, height: f64) -> Self {
        Self { width, height }
    }

    /// US Letter size (8.5" × 11")
    pub fn letter() -> Self {
        Self::new(612.0, 792.0)
    }

    /// A4 size (210mm × 297mm)
    pub fn a4() -> Self {
        Self::new(595.28, 841.89)
    }
}

/// Intrinsic pixel size of the watermark image
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImageDimensions {
    pub width: u32,
    pub height: u32,
}

impl ImageDimensions {
    pub fn aspect_ratio(&self) -> f64 {
        self.width as f64 / self.height as f64
    }
}

/// Where the watermark lands on one page
///
/// `x` may be negative and `x + width` may exceed the page width when the
/// scaled image is wider than the page. That overflow is drawn as-is and
/// clipped by the viewer.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Placement {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl Placement {
    /// Whether any part of the watermark falls outside the page
    pub fn overflows(&self, page: &PageDimensions) -> bool {
        self.x < 0.0
            || self.y < 0.0
            || self.x + self.width > page.width
            || self.y + self.height > page.height
    }
}

/// Calculate the watermark rectangle for a page
///
/// Height is `size` percent of the page height, width follows the image
/// aspect ratio, the horizontal offset follows `position` and the watermark
/// is always centered vertically.
pub fn calculate_placement(
    page: &PageDimensions,
    image: ImageDimensions,
    settings: &Settings,
) -> Placement {
    let height = page.height * (settings.size / 100.0);
    let width = height * image.aspect_ratio();

    let x = match settings.position {
        Position::Left => 0.0,
        Position::Center => (page.width - width) / 2.0,
        Position::Right => page.width - width,
    };
    let y = (page.height - height) / 2.0;

    Placement { x, y, width, height }
}
