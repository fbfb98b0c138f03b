// THEORY:
// The `ColorSegmenter` is the entry point of the perception stack. It turns a raw
// RGB frame into a binary `Mask`: every pixel whose HSV encoding falls inside a
// configured `ColorRange` (inclusive on both ends, per channel) becomes foreground.
//
// Key architectural principles:
// 1.  **Pure Function**: No state, no history, no error path. An all-background
//     mask is a perfectly valid answer when nothing in view matches.
// 2.  **Mask Convention**: Foreground is 255 and background is 0, so a mask can be
//     handed straight to a display or PNG encoder without rescaling.
// 3.  **Same Geometry**: The mask always has the frame's dimensions. Everything
//     downstream (moments, contours, grid quantization) reasons in frame pixels.

use crate::capture::Frame;
use crate::core_modules::hsv_pixel::hsv_pixel::HsvPixel;
use image::{GrayImage, Luma};
use serde::Deserialize;

/// A binary image: 255 marks a pixel inside the color range, 0 everything else.
pub type Mask = GrayImage;

pub const FOREGROUND: u8 = 255;
pub const BACKGROUND: u8 = 0;

/// Inclusive lower/upper bounds in 8-bit HSV space.
///
/// Deserializes from the `[[Hmin, Smin, Vmin], [Hmax, Smax, Vmax]]` layout used
/// in the configuration file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(from = "[[u8; 3]; 2]")]
pub struct ColorRange {
    pub lower: [u8; 3],
    pub upper: [u8; 3],
}

impl ColorRange {
    pub fn new(lower: [u8; 3], upper: [u8; 3]) -> Self {
        Self { lower, upper }
    }

    /// Whether a single HSV pixel lies inside the range.
    pub fn contains(&self, pixel: &HsvPixel) -> bool {
        pixel
            .channels()
            .iter()
            .zip(self.lower.iter().zip(self.upper.iter()))
            .all(|(channel, (lower, upper))| lower <= channel && channel <= upper)
    }

    /// Returns a description of the first malformed bound, if any.
    pub fn validate(&self) -> Result<(), String> {
        for (index, name) in ["hue", "saturation", "value"].iter().enumerate() {
            if self.lower[index] > self.upper[index] {
                return Err(format!(
                    "{} lower bound {} exceeds upper bound {}",
                    name, self.lower[index], self.upper[index]
                ));
            }
        }
        if self.lower[0] > 180 || self.upper[0] > 180 {
            return Err("hue bounds must be within 0..=180".to_string());
        }
        Ok(())
    }
}

impl From<[[u8; 3]; 2]> for ColorRange {
    fn from(bounds: [[u8; 3]; 2]) -> Self {
        Self::new(bounds[0], bounds[1])
    }
}

/// Stateless frame-to-mask converter.
#[derive(Debug, Clone, Copy, Default)]
pub struct ColorSegmenter;

impl ColorSegmenter {
    pub fn new() -> Self {
        Self
    }

    /// Marks every pixel of `frame` whose HSV value lies inside `range`.
    pub fn segment(&self, frame: &Frame, range: &ColorRange) -> Mask {
        GrayImage::from_fn(frame.width(), frame.height(), |x, y| {
            let hsv = HsvPixel::from(frame.get_pixel(x, y));
            if range.contains(&hsv) {
                Luma([FOREGROUND])
            } else {
                Luma([BACKGROUND])
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, RgbImage};

    fn orange_range() -> ColorRange {
        ColorRange::new([0, 108, 255], [179, 255, 255])
    }

    #[test]
    fn marks_only_matching_pixels() {
        let mut frame = RgbImage::from_pixel(8, 6, Rgb([20, 20, 20]));
        frame.put_pixel(3, 2, Rgb([255, 128, 0]));
        frame.put_pixel(7, 5, Rgb([255, 60, 10]));

        let mask = ColorSegmenter::new().segment(&frame, &orange_range());

        assert_eq!(mask.dimensions(), (8, 6));
        assert_eq!(mask.get_pixel(3, 2).0[0], FOREGROUND);
        assert_eq!(mask.get_pixel(7, 5).0[0], FOREGROUND);
        let foreground = mask.pixels().filter(|p| p.0[0] == FOREGROUND).count();
        assert_eq!(foreground, 2);
    }

    #[test]
    fn empty_scene_gives_all_background() {
        let frame = RgbImage::from_pixel(4, 4, Rgb([0, 0, 200]));
        let mask = ColorSegmenter::new().segment(&frame, &orange_range());
        assert!(mask.pixels().all(|p| p.0[0] == BACKGROUND));
    }

    #[test]
    fn bounds_are_inclusive() {
        let pixel = HsvPixel::new(17, 191, 141);
        let range = ColorRange::new([0, 191, 141], [17, 255, 255]);
        assert!(range.contains(&pixel));
        assert!(!range.contains(&HsvPixel::new(18, 191, 141)));
        assert!(!range.contains(&HsvPixel::new(17, 190, 141)));
    }

    #[test]
    fn range_from_nested_array() {
        let range = ColorRange::from([[68, 91, 121], [111, 195, 212]]);
        assert_eq!(range.lower, [68, 91, 121]);
        assert_eq!(range.upper, [111, 195, 212]);
    }

    #[test]
    fn validate_rejects_inverted_and_out_of_band_hue() {
        assert!(orange_range().validate().is_ok());
        // Vmin > Vmax.
        assert!(ColorRange::new([95, 189, 183], [120, 255, 146]).validate().is_err());
        assert!(ColorRange::new([0, 0, 0], [200, 255, 255]).validate().is_err());
    }
}
