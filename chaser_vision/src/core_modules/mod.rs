pub mod blob_locator;
pub mod camera_unit;
pub mod color_segmenter;
pub mod command;
pub mod grid_mapper;
pub mod hsv_pixel;
pub mod utils;
