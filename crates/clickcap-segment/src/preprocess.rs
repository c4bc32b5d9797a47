use clickcap_image::{Image, ImageSize};
use clickcap_imgproc::resize::{resize_fast, InterpolationMode};

use crate::error::SegmentError;

/// Side length of the square SAM encoder input.
pub const SAM_INPUT_SIZE: usize = 1024;

/// Per channel pixel mean the encoder was trained with.
pub const SAM_PIXEL_MEAN: [f32; 3] = [123.675, 116.28, 103.53];

/// Per channel pixel std the encoder was trained with.
pub const SAM_PIXEL_STD: [f32; 3] = [58.395, 57.12, 57.375];

/// The size the image is resized to before padding: the longest side
/// becomes [`SAM_INPUT_SIZE`], the aspect ratio is preserved.
pub fn scaled_input_size(original_size: ImageSize) -> ImageSize {
    let long_side = original_size.width.max(original_size.height) as f64;
    let scale = SAM_INPUT_SIZE as f64 / long_side;
    ImageSize {
        width: (original_size.width as f64 * scale + 0.5) as usize,
        height: (original_size.height as f64 * scale + 0.5) as usize,
    }
}

/// Map a coordinate from original image space into encoder input space.
pub fn transform_coords(
    x: f32,
    y: f32,
    original_size: ImageSize,
    input_size: ImageSize,
) -> (f32, f32) {
    (
        x * input_size.width as f32 / original_size.width as f32,
        y * input_size.height as f32 / original_size.height as f32,
    )
}

/// Build the `[1, 3, 1024, 1024]` encoder input tensor data.
///
/// The image is resized so its longest side is 1024, normalized with the
/// SAM pixel statistics and zero padded bottom/right to the square canvas.
///
/// Returns the flat CHW tensor data and the pre-padding input size.
pub fn encoder_input(image: &Image<u8, 3>) -> Result<(Vec<f32>, ImageSize), SegmentError> {
    let input_size = scaled_input_size(image.size());

    let mut resized = Image::<u8, 3>::from_size_val(input_size, 0u8)?;
    resize_fast(image, &mut resized, InterpolationMode::Bilinear)?;

    // normalized pixels land in the top-left corner, padding stays zero
    let mut data = vec![0.0f32; 3 * SAM_INPUT_SIZE * SAM_INPUT_SIZE];
    let resized_slice = resized.as_slice();
    for y in 0..input_size.height {
        for x in 0..input_size.width {
            let src_idx = (y * input_size.width + x) * 3;
            for c in 0..3 {
                let v = resized_slice[src_idx + c] as f32;
                data[c * SAM_INPUT_SIZE * SAM_INPUT_SIZE + y * SAM_INPUT_SIZE + x] =
                    (v - SAM_PIXEL_MEAN[c]) / SAM_PIXEL_STD[c];
            }
        }
    }

    Ok((data, input_size))
}

/// Threshold mask logits into a 0/255 mask image.
pub fn threshold_logits(
    logits: &[f32],
    size: ImageSize,
    threshold: f32,
) -> Result<Image<u8, 1>, SegmentError> {
    let data = logits
        .iter()
        .map(|&v| if v > threshold { 255u8 } else { 0u8 })
        .collect();
    Ok(Image::new(size, data)?)
}
