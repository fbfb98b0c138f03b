pub mod image_helper {
    use crate::core_modules::color_segmenter::Mask;
    use image::ImageEncoder;
    use std::path::{Path, PathBuf};

    /// Writes a mask as an 8-bit grayscale PNG.
    pub fn save_mask(path: &Path, mask: &Mask) -> Result<(), image::error::ImageError> {
        let output = std::fs::File::create(path)?;
        let encoder = image::codecs::png::PngEncoder::new(output);

        encoder.write_image(
            mask.as_raw(),
            mask.width(),
            mask.height(),
            image::ExtendedColorType::L8,
        )?;

        Ok(())
    }

    /// `<dir>/<cycle>_<label>.png`, with spaces in the label replaced by underscores.
    pub fn mask_file_name(dir: &Path, cycle: u64, label: &str) -> PathBuf {
        dir.join(format!("{:06}_{}.png", cycle, label.replace(' ', "_")))
    }
}

#[cfg(test)]
mod tests {
    use super::image_helper::*;
    use crate::core_modules::color_segmenter::{BACKGROUND, FOREGROUND};
    use image::{GrayImage, Luma};
    use std::path::Path;

    #[test]
    fn save_mask_round_trips_through_png() {
        let dir = tempfile::tempdir().expect("temp dir");
        let mask = GrayImage::from_fn(64, 32, |x, _| {
            if x < 16 { Luma([FOREGROUND]) } else { Luma([BACKGROUND]) }
        });
        let path = dir.path().join("front_orange.png");

        save_mask(&path, &mask).expect("Error Saving File.");

        let loaded = image::open(&path).expect("readable png").to_luma8();
        assert_eq!(loaded.dimensions(), (64, 32));
        assert_eq!(loaded.get_pixel(3, 3).0[0], FOREGROUND);
        assert_eq!(loaded.get_pixel(40, 3).0[0], BACKGROUND);
    }

    #[test]
    fn save_into_missing_directory_fails() {
        let dir = tempfile::tempdir().expect("temp dir");
        let path = dir.path().join("missing").join("mask.png");
        assert!(save_mask(&path, &GrayImage::new(4, 4)).is_err());
    }

    #[test]
    fn file_names_are_ordered_and_space_free() {
        let name = mask_file_name(Path::new("/tmp/masks"), 42, "front orange");
        assert_eq!(name, Path::new("/tmp/masks/000042_front_orange.png"));
    }
}
