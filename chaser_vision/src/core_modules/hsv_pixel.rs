// THEORY (HSV Pixel):
// The `HsvPixel` module is the most fundamental unit of the vision system. It is a
// "dumb" data container for a single pixel expressed in the 8-bit HSV encoding used
// by the calibration tooling the color ranges come from: hue is halved so it fits a
// byte (0..180), saturation and value span 0..255.
//
// The thresholds in the configuration are tuned by eye against that exact encoding,
// so the conversion here is the integer fixed-point form rather than a float HSV
// transform. A float transform drifts by one step on many pixels, which is enough
// to move a pixel across a hand-tuned `Smin` or `Vmin` bound.
//
// Key principles:
// 1) Single-pixel scope: nothing here reads neighbors or history.
// 2) Lookup tables: the two per-pixel divisions are replaced by 256-entry `OnceLock`
//    tables; the hot path is a multiply, an add and a shift.

pub mod hsv_pixel {
    use std::sync::OnceLock;

    pub type Channel = u8;
    pub type Hue = u8;
    pub type Saturation = u8;
    pub type Value = u8;

    /// Largest hue produced by the 8-bit encoding (exclusive upper end is 180).
    pub const HUE_RANGE: i32 = 180;

    const FIXED_POINT_SHIFT: i32 = 12;
    const ROUNDING: i32 = 1 << (FIXED_POINT_SHIFT - 1);

    // (255 << 12) / v, rounded. Index 0 is unused and left at 0.
    static SATURATION_DIVISORS: OnceLock<[i32; 256]> = OnceLock::new();
    // (180 << 12) / (6 * chroma), rounded. Index 0 is unused and left at 0.
    static HUE_DIVISORS: OnceLock<[i32; 256]> = OnceLock::new();

    /// A single pixel in 8-bit HSV space.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct HsvPixel {
        /// Hue in half-degrees (0-179).
        pub hue: Hue,
        /// Saturation (0-255).
        pub saturation: Saturation,
        /// Value, the brightest RGB channel (0-255).
        pub value: Value,
    }

    impl HsvPixel {
        pub fn new(hue: Hue, saturation: Saturation, value: Value) -> Self {
            Self {
                hue,
                saturation,
                value,
            }
        }

        /// Converts one RGB pixel.
        pub fn from_rgb(red: Channel, green: Channel, blue: Channel) -> Self {
            let (r, g, b) = (red as i32, green as i32, blue as i32);
            let value = r.max(g).max(b);
            let minimum = r.min(g).min(b);
            let chroma = value - minimum;

            let saturation =
                (chroma * saturation_divisors()[value as usize] + ROUNDING) >> FIXED_POINT_SHIFT;

            let sector = if value == r {
                g - b
            } else if value == g {
                b - r + 2 * chroma
            } else {
                r - g + 4 * chroma
            };
            let mut hue =
                (sector * hue_divisors()[chroma as usize] + ROUNDING) >> FIXED_POINT_SHIFT;
            if hue < 0 {
                hue += HUE_RANGE;
            }

            Self {
                hue: hue as Hue,
                saturation: saturation as Saturation,
                value: value as Value,
            }
        }

        /// The three channels in `[h, s, v]` order, matching the configuration layout.
        pub fn channels(&self) -> [u8; 3] {
            [self.hue, self.saturation, self.value]
        }
    }

    impl From<&image::Rgb<u8>> for HsvPixel {
        fn from(pixel: &image::Rgb<u8>) -> Self {
            let [r, g, b] = pixel.0;
            HsvPixel::from_rgb(r, g, b)
        }
    }

    fn saturation_divisors() -> &'static [i32; 256] {
        SATURATION_DIVISORS.get_or_init(|| {
            let mut table = [0i32; 256];
            for (i, entry) in table.iter_mut().enumerate().skip(1) {
                *entry = ((255 << FIXED_POINT_SHIFT) as f64 / i as f64).round() as i32;
            }
            table
        })
    }

    fn hue_divisors() -> &'static [i32; 256] {
        HUE_DIVISORS.get_or_init(|| {
            let mut table = [0i32; 256];
            for (i, entry) in table.iter_mut().enumerate().skip(1) {
                let scaled = (HUE_RANGE << FIXED_POINT_SHIFT) as f64;
                *entry = (scaled / (6.0 * i as f64)).round() as i32;
            }
            table
        })
    }
}

#[cfg(test)]
mod tests {
    use super::hsv_pixel::*;

    #[test]
    fn pure_primaries() {
        assert_eq!(HsvPixel::from_rgb(255, 0, 0), HsvPixel::new(0, 255, 255));
        assert_eq!(HsvPixel::from_rgb(0, 255, 0), HsvPixel::new(60, 255, 255));
        assert_eq!(HsvPixel::from_rgb(0, 0, 255), HsvPixel::new(120, 255, 255));
    }

    #[test]
    fn grays_have_no_hue_or_saturation() {
        for level in [0u8, 1, 77, 128, 255] {
            let hsv = HsvPixel::from_rgb(level, level, level);
            assert_eq!(hsv.hue, 0);
            assert_eq!(hsv.saturation, 0);
            assert_eq!(hsv.value, level);
        }
    }

    #[test]
    fn orange_sits_in_the_low_hue_band() {
        // A typical ball orange.
        let hsv = HsvPixel::from_rgb(255, 128, 0);
        assert_eq!(hsv.value, 255);
        assert_eq!(hsv.saturation, 255);
        assert_eq!(hsv.hue, 15);
    }

    #[test]
    fn magenta_wraps_below_180() {
        let hsv = HsvPixel::from_rgb(255, 0, 128);
        assert!(hsv.hue > 150 && hsv.hue < 180, "hue was {}", hsv.hue);
    }

    #[test]
    fn hue_never_reaches_range_end() {
        for r in (0..=255u16).step_by(15) {
            for g in (0..=255u16).step_by(15) {
                for b in (0..=255u16).step_by(15) {
                    let hsv = HsvPixel::from_rgb(r as u8, g as u8, b as u8);
                    assert!((hsv.hue as i32) < HUE_RANGE);
                }
            }
        }
    }
}
