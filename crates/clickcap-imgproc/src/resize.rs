use clickcap_image::{Image, ImageError};
use fast_image_resize as fr;
use fast_image_resize::images::{Image as FrImage, ImageRef};

/// Interpolation mode for resizing.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum InterpolationMode {
    /// Bilinear interpolation.
    Bilinear,
    /// Nearest neighbor interpolation.
    Nearest,
}

impl InterpolationMode {
    fn resize_alg(self) -> fr::ResizeAlg {
        match self {
            InterpolationMode::Bilinear => fr::ResizeAlg::Convolution(fr::FilterType::Bilinear),
            InterpolationMode::Nearest => fr::ResizeAlg::Nearest,
        }
    }
}

/// Resize an RGB image to the size of the destination image using the
/// [fast_image_resize](https://crates.io/crates/fast_image_resize) crate.
///
/// # Arguments
///
/// * `src` - The source image.
/// * `dst` - The destination image (its size selects the output size).
/// * `interpolation` - The interpolation mode to use.
pub fn resize_fast(
    src: &Image<u8, 3>,
    dst: &mut Image<u8, 3>,
    interpolation: InterpolationMode,
) -> Result<(), ImageError> {
    resize_impl(
        src.width(),
        src.height(),
        src.as_slice(),
        dst.width(),
        dst.height(),
        dst.as_slice_mut(),
        fr::PixelType::U8x3,
        interpolation,
    )
}

/// Resize a single channel mask with nearest neighbor interpolation.
///
/// Nearest neighbor keeps the mask binary (no interpolated gray values).
pub fn resize_mask_nearest(
    src: &Image<u8, 1>,
    dst: &mut Image<u8, 1>,
) -> Result<(), ImageError> {
    resize_impl(
        src.width(),
        src.height(),
        src.as_slice(),
        dst.width(),
        dst.height(),
        dst.as_slice_mut(),
        fr::PixelType::U8,
        InterpolationMode::Nearest,
    )
}

#[allow(clippy::too_many_arguments)]
fn resize_impl(
    src_width: usize,
    src_height: usize,
    src_data: &[u8],
    dst_width: usize,
    dst_height: usize,
    dst_data: &mut [u8],
    pixel_type: fr::PixelType,
    interpolation: InterpolationMode,
) -> Result<(), ImageError> {
    let src_image = ImageRef::new(
        src_width as u32,
        src_height as u32,
        src_data,
        pixel_type,
    )
    .map_err(|_| ImageError::IncompatiblePixelTypes)?;

    let mut dst_image = FrImage::from_slice_u8(
        dst_width as u32,
        dst_height as u32,
        dst_data,
        pixel_type,
    )
    .map_err(|_| ImageError::IncompatiblePixelTypes)?;

    let mut resizer = fr::Resizer::new();
    resizer
        .resize(
            &src_image,
            &mut dst_image,
            &fr::ResizeOptions::new().resize_alg(interpolation.resize_alg()),
        )
        .map_err(|_| ImageError::IncompatiblePixelTypes)?;

    Ok(())
}
