use super::kernel::Kernel;
use clickcap_image::{Image, ImageError};
use rayon::{
    iter::{IndexedParallelIterator, ParallelIterator},
    slice::ParallelSliceMut,
};

/// Dilate a binary mask using a [`Kernel`].
///
/// Dilation expands white regions. Each pixel is replaced by the maximum
/// value in the neighborhood defined by the kernel; neighbors outside the
/// image are ignored.
///
/// # Arguments
///
/// * `src` - The source mask.
/// * `dst` - The destination mask (will be overwritten).
/// * `kernel` - The morphological structuring element.
///
/// # Returns
///
/// Ok(()) on success, or [`ImageError`] if shapes don't match.
pub fn dilate(
    src: &Image<u8, 1>,
    dst: &mut Image<u8, 1>,
    kernel: &Kernel,
) -> Result<(), ImageError> {
    morphology_impl(src, dst, kernel, |acc, v| acc.max(v))
}

/// Erode a binary mask using a [`Kernel`].
///
/// Erosion shrinks white regions. Each pixel is replaced by the minimum
/// value in the neighborhood defined by the kernel; neighbors outside the
/// image are ignored.
///
/// # Arguments
///
/// * `src` - The source mask.
/// * `dst` - The destination mask (will be overwritten).
/// * `kernel` - The morphological structuring element.
///
/// # Returns
///
/// Ok(()) on success, or [`ImageError`] if shapes don't match.
pub fn erode(
    src: &Image<u8, 1>,
    dst: &mut Image<u8, 1>,
    kernel: &Kernel,
) -> Result<(), ImageError> {
    morphology_impl(src, dst, kernel, |acc, v| acc.min(v))
}

/// Opening: erosion followed by dilation.
///
/// Removes small objects and smooths object boundaries.
pub fn open(
    src: &Image<u8, 1>,
    dst: &mut Image<u8, 1>,
    kernel: &Kernel,
) -> Result<(), ImageError> {
    let mut temp = src.clone();
    erode(src, &mut temp, kernel)?;
    dilate(&temp, dst, kernel)?;
    Ok(())
}

/// Closing: dilation followed by erosion.
///
/// Fills small holes and smooths object boundaries.
pub fn close(
    src: &Image<u8, 1>,
    dst: &mut Image<u8, 1>,
    kernel: &Kernel,
) -> Result<(), ImageError> {
    let mut temp = src.clone();
    dilate(src, &mut temp, kernel)?;
    erode(&temp, dst, kernel)?;
    Ok(())
}

// shared scan loop: fold the kernel neighborhood of every pixel with `select`,
// skipping neighbors that fall outside the image
fn morphology_impl(
    src: &Image<u8, 1>,
    dst: &mut Image<u8, 1>,
    kernel: &Kernel,
    select: impl Fn(u8, u8) -> u8 + Send + Sync,
) -> Result<(), ImageError> {
    if src.size() != dst.size() {
        return Err(ImageError::InvalidImageSize(
            dst.width(),
            dst.height(),
            src.width(),
            src.height(),
        ));
    }

    let width = src.width();
    let height = src.height();
    let (pad_h, pad_w) = kernel.pad();
    let k_height = kernel.height();
    let k_width = kernel.width();
    let k_data = kernel.data();
    let src_slice = src.as_slice();

    dst.as_slice_mut()
        .par_chunks_exact_mut(width)
        .enumerate()
        .for_each(|(h, row_chunk)| {
            for (w, out) in row_chunk.iter_mut().enumerate() {
                let mut acc: Option<u8> = None;

                for kh in 0..k_height {
                    let py = h + kh;
                    if py < pad_h || py - pad_h >= height {
                        continue;
                    }
                    for kw in 0..k_width {
                        let px = w + kw;
                        if px < pad_w || px - pad_w >= width {
                            continue;
                        }
                        if k_data[kh * k_width + kw] == 1 {
                            let pixel = src_slice[(py - pad_h) * width + (px - pad_w)];
                            acc = Some(match acc {
                                None => pixel,
                                Some(v) => select(v, pixel),
                            });
                        }
                    }
                }

                *out = acc.unwrap_or_default();
            }
        });

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::morphology::kernel::KernelShape;
    use clickcap_image::ImageSize;

    fn mask_from(rows: &[&[u8]]) -> Image<u8, 1> {
        let height = rows.len();
        let width = rows[0].len();
        let data = rows.iter().flat_map(|r| r.iter().copied()).collect();
        Image::new(ImageSize { width, height }, data).unwrap()
    }

    #[test]
    fn open_removes_specks() -> Result<(), ImageError> {
        let src = mask_from(&[
            &[0, 0, 0, 0, 0, 0],
            &[0, 255, 0, 0, 0, 0],
            &[0, 0, 0, 255, 255, 255],
            &[0, 0, 0, 255, 255, 255],
            &[0, 0, 0, 255, 255, 255],
            &[0, 0, 0, 255, 255, 255],
        ]);
        let mut dst = Image::from_size_val(src.size(), 0u8)?;
        open(&src, &mut dst, &Kernel::new(KernelShape::Box { size: 3 }))?;

        // the isolated speck is gone
        assert_eq!(dst.get_pixel(1, 1, 0)?, 0);
        // the solid block survives
        assert_eq!(dst.get_pixel(4, 4, 0)?, 255);
        Ok(())
    }

    #[test]
    fn close_fills_holes() -> Result<(), ImageError> {
        let src = mask_from(&[
            &[255, 255, 255, 255, 255],
            &[255, 255, 255, 255, 255],
            &[255, 255, 0, 255, 255],
            &[255, 255, 255, 255, 255],
            &[255, 255, 255, 255, 255],
        ]);
        let mut dst = Image::from_size_val(src.size(), 0u8)?;
        close(&src, &mut dst, &Kernel::new(KernelShape::Box { size: 3 }))?;

        // the pinhole is filled
        assert_eq!(dst.get_pixel(2, 2, 0)?, 255);
        Ok(())
    }

    #[test]
    fn erode_shrinks_block() -> Result<(), ImageError> {
        let src = mask_from(&[
            &[0, 0, 0, 0, 0],
            &[0, 255, 255, 255, 0],
            &[0, 255, 255, 255, 0],
            &[0, 255, 255, 255, 0],
            &[0, 0, 0, 0, 0],
        ]);
        let mut dst = Image::from_size_val(src.size(), 0u8)?;
        erode(&src, &mut dst, &Kernel::new(KernelShape::Box { size: 3 }))?;

        assert_eq!(dst.get_pixel(2, 2, 0)?, 255);
        assert_eq!(dst.get_pixel(1, 1, 0)?, 0);
        Ok(())
    }

    #[test]
    fn size_mismatch_is_an_error() -> Result<(), ImageError> {
        let src = Image::<u8, 1>::from_size_val(
            ImageSize {
                width: 4,
                height: 4,
            },
            0u8,
        )?;
        let mut dst = Image::<u8, 1>::from_size_val(
            ImageSize {
                width: 5,
                height: 4,
            },
            0u8,
        )?;
        let res = dilate(&src, &mut dst, &Kernel::new(KernelShape::Box { size: 3 }));
        assert!(res.is_err());
        Ok(())
    }
}
