//! Watermark settings
//!
//! Settings are a plain value copied into each run. The UI ranges below are
//! what sliders and the CLI accept; the compositor itself only needs a finite
//! positive size and an opacity it can clamp into `[0, 1]`.

use std::fmt;
use std::ops::RangeInclusive;
use std::str::FromStr;

use crate::error::{Error, Result};

/// Opacity range offered to users, in percent
pub const OPACITY_PERCENT_RANGE: RangeInclusive<i64> = 0..=100;
/// Size range offered to users, in percent of page height
pub const SIZE_PERCENT_RANGE: RangeInclusive<i64> = 10..=200;

/// Horizontal alignment of the watermark. Vertical alignment is always centered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Position {
    #[default]
    Left,
    Center,
    Right,
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Position::Left => f.write_str("left"),
            Position::Center => f.write_str("center"),
            Position::Right => f.write_str("right"),
        }
    }
}

impl FromStr for Position {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "left" | "l" => Ok(Position::Left),
            "center" | "centre" | "c" => Ok(Position::Center),
            "right" | "r" => Ok(Position::Right),
            other => Err(Error::InvalidSettings(format!(
                "unknown position '{}' (expected left, center or right)",
                other
            ))),
        }
    }
}

/// Watermark appearance applied uniformly to every page
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Settings {
    /// Alpha blending factor, 0.0 (invisible) to 1.0 (opaque)
    pub opacity: f64,
    /// Horizontal alignment
    pub position: Position,
    /// Watermark height as a percentage of page height
    pub size: f64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            opacity: 0.5,
            position: Position::Left,
            size: 100.0,
        }
    }
}

impl Settings {
    /// Build settings from the percentages shown on the sliders
    pub fn from_percentages(opacity_percent: f64, size_percent: f64, position: Position) -> Self {
        Self {
            opacity: opacity_percent / 100.0,
            position,
            size: size_percent,
        }
    }

    /// Opacity as a whole percentage, as displayed next to the slider
    pub fn opacity_percent(&self) -> u32 {
        (self.opacity * 100.0).round().max(0.0) as u32
    }

    /// Check the settings and return a copy safe to hand to the renderer
    ///
    /// Opacity is clamped into `[0, 1]`. Non-finite values and sizes that are
    /// not strictly positive are rejected.
    pub fn normalized(&self) -> Result<Self> {
        if !self.opacity.is_finite() {
            return Err(Error::InvalidSettings(format!(
                "opacity must be a finite number, got {}",
                self.opacity
            )));
        }
        if !self.size.is_finite() || self.size <= 0.0 {
            return Err(Error::InvalidSettings(format!(
                "size must be a positive percentage, got {}",
                self.size
            )));
        }

        let opacity = self.opacity.clamp(0.0, 1.0);
        if opacity != self.opacity {
            tracing::warn!(requested = self.opacity, clamped = opacity, "opacity out of range, clamping");
        }

        Ok(Self {
            opacity,
            position: self.position,
            size: self.size,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_ui() {
        let settings = Settings::default();
        assert_eq!(settings.opacity, 0.5);
        assert_eq!(settings.position, Position::Left);
        assert_eq!(settings.size, 100.0);
        assert_eq!(settings.opacity_percent(), 50);
    }

    #[test]
    fn test_position_parsing() {
        assert_eq!("left".parse::<Position>().unwrap(), Position::Left);
        assert_eq!("Center".parse::<Position>().unwrap(), Position::Center);
        assert_eq!(" RIGHT ".parse::<Position>().unwrap(), Position::Right);
        assert!("top".parse::<Position>().is_err());
    }

    #[test]
    fn test_position_display_roundtrips() {
        for position in [Position::Left, Position::Center, Position::Right] {
            assert_eq!(position.to_string().parse::<Position>().unwrap(), position);
        }
    }

    #[test]
    fn test_from_percentages() {
        let settings = Settings::from_percentages(30.0, 150.0, Position::Right);
        assert!((settings.opacity - 0.3).abs() < 1e-9);
        assert_eq!(settings.size, 150.0);
        assert_eq!(settings.position, Position::Right);
    }

    #[test]
    fn test_normalized_clamps_opacity() {
        let high = Settings { opacity: 1.7, ..Default::default() };
        assert_eq!(high.normalized().unwrap().opacity, 1.0);

        let low = Settings { opacity: -0.2, ..Default::default() };
        assert_eq!(low.normalized().unwrap().opacity, 0.0);
    }

    #[test]
    fn test_normalized_rejects_bad_size() {
        for size in [0.0, -10.0, f64::NAN, f64::INFINITY] {
            let settings = Settings { size, ..Default::default() };
            assert!(
                matches!(settings.normalized(), Err(Error::InvalidSettings(_))),
                "size {} should be rejected",
                size
            );
        }
    }

    #[test]
    fn test_normalized_rejects_nan_opacity() {
        let settings = Settings { opacity: f64::NAN, ..Default::default() };
        assert!(matches!(settings.normalized(), Err(Error::InvalidSettings(_))));
    }

    #[test]
    fn test_normalized_keeps_large_size() {
        // Sizes above the slider range are still drawable
        let settings = Settings { size: 500.0, ..Default::default() };
        assert_eq!(settings.normalized().unwrap().size, 500.0);
    }
}
