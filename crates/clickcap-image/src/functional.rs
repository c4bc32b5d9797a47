use std::path::Path;

use crate::error::IoError;
use crate::image::{Image, ImageSize};

/// Reads an image from the given file path and converts it to RGB8.
///
/// Supports any format the `image` crate can decode (PNG, JPEG, WebP, ...).
///
/// # Arguments
///
/// * `file_path` - The path to the image file.
///
/// # Returns
///
/// An RGB image with three channels (rgb8).
pub fn read_image_any_rgb8(file_path: impl AsRef<Path>) -> Result<Image<u8, 3>, IoError> {
    let file_path = file_path.as_ref();
    if !file_path.exists() {
        return Err(IoError::FileDoesNotExist(file_path.to_path_buf()));
    }

    let img = image::ImageReader::open(file_path)?.decode()?;
    let rgb = img.to_rgb8();

    let size = ImageSize {
        width: rgb.width() as usize,
        height: rgb.height() as usize,
    };

    Ok(Image::new(size, rgb.into_raw())?)
}
