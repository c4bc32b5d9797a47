use clickcap_image::{Image, ImageError, ImageSize};

/// An axis aligned rectangle in pixel coordinates.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Rect {
    /// The x-coordinate of the top-left corner.
    pub x: usize,
    /// The y-coordinate of the top-left corner.
    pub y: usize,
    /// The width of the rectangle.
    pub width: usize,
    /// The height of the rectangle.
    pub height: usize,
}

/// The tight bounding box of the nonzero region of a mask.
///
/// Returns `None` when the mask has no nonzero pixel.
pub fn mask_bbox(mask: &Image<u8, 1>) -> Option<Rect> {
    let width = mask.width();
    let mut min_x = usize::MAX;
    let mut min_y = usize::MAX;
    let mut max_x = 0usize;
    let mut max_y = 0usize;
    let mut any = false;

    for (i, &v) in mask.as_slice().iter().enumerate() {
        if v != 0 {
            let x = i % width;
            let y = i / width;
            min_x = min_x.min(x);
            min_y = min_y.min(y);
            max_x = max_x.max(x);
            max_y = max_y.max(y);
            any = true;
        }
    }

    if !any {
        return None;
    }

    Some(Rect {
        x: min_x,
        y: min_y,
        width: max_x - min_x + 1,
        height: max_y - min_y + 1,
    })
}

/// Expand a tight box into a regular crop box.
///
/// The box grows by `margin` of its larger side on every edge and is then
/// squared up to its larger side, clamped to the image bounds. Captioning
/// models see enough context this way even for thin masks.
///
/// # Arguments
///
/// * `bbox` - The tight bounding box to expand.
/// * `image_size` - The bounds to clamp against.
/// * `margin` - Fraction of the larger side to add on each edge.
pub fn regular_box(bbox: Rect, image_size: ImageSize, margin: f32) -> Rect {
    let long_side = bbox.width.max(bbox.height) as f32;
    let pad = (long_side * margin).round() as usize;

    let side = bbox.width.max(bbox.height) + 2 * pad;

    // center the square on the tight box center
    let cx = bbox.x + bbox.width / 2;
    let cy = bbox.y + bbox.height / 2;

    let half = side / 2;
    let x0 = cx.saturating_sub(half);
    let y0 = cy.saturating_sub(half);
    let x1 = (cx + side - half).min(image_size.width);
    let y1 = (cy + side - half).min(image_size.height);

    Rect {
        x: x0,
        y: y0,
        width: x1 - x0,
        height: y1 - y0,
    }
}

/// Paint the pixels outside the mask with a fill color.
///
/// Returns a new image; the source is untouched. The fill is what the
/// captioner sees in place of the background in the `wo_bg` crop mode.
pub fn apply_mask(
    image: &Image<u8, 3>,
    mask: &Image<u8, 1>,
    fill: [u8; 3],
) -> Result<Image<u8, 3>, ImageError> {
    if image.size() != mask.size() {
        return Err(ImageError::InvalidImageSize(
            mask.width(),
            mask.height(),
            image.width(),
            image.height(),
        ));
    }

    let mut out = image.clone();
    let mask_slice = mask.as_slice();
    for (pixel, &m) in out.as_slice_mut().chunks_exact_mut(3).zip(mask_slice) {
        if m == 0 {
            pixel.copy_from_slice(&fill);
        }
    }
    Ok(out)
}

/// Convert a single channel 0/255 mask into an RGB image.
///
/// Mask artifacts are saved as RGB PNGs so any viewer renders them.
pub fn mask_to_rgb(mask: &Image<u8, 1>) -> Result<Image<u8, 3>, ImageError> {
    let mut data = Vec::with_capacity(mask.as_slice().len() * 3);
    for &v in mask.as_slice() {
        data.extend_from_slice(&[v, v, v]);
    }
    Image::new(mask.size(), data)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mask_with_block(size: ImageSize, rect: Rect) -> Image<u8, 1> {
        let mut mask = Image::from_size_val(size, 0u8).unwrap();
        for y in rect.y..rect.y + rect.height {
            for x in rect.x..rect.x + rect.width {
                mask.set_pixel(x, y, 0, 255).unwrap();
            }
        }
        mask
    }

    #[test]
    fn bbox_of_block() {
        let rect = Rect {
            x: 2,
            y: 3,
            width: 4,
            height: 2,
        };
        let mask = mask_with_block(
            ImageSize {
                width: 10,
                height: 10,
            },
            rect,
        );
        assert_eq!(mask_bbox(&mask), Some(rect));
    }

    #[test]
    fn bbox_of_empty_mask() {
        let mask = Image::<u8, 1>::from_size_val(
            ImageSize {
                width: 4,
                height: 4,
            },
            0u8,
        )
        .unwrap();
        assert_eq!(mask_bbox(&mask), None);
    }

    #[test]
    fn regular_box_clamps_to_bounds() {
        let bbox = Rect {
            x: 0,
            y: 0,
            width: 4,
            height: 4,
        };
        let out = regular_box(
            bbox,
            ImageSize {
                width: 8,
                height: 8,
            },
            0.5,
        );
        assert!(out.x + out.width <= 8);
        assert!(out.y + out.height <= 8);
        // the expanded box contains the tight box
        assert!(out.x <= bbox.x && out.y <= bbox.y);
        assert!(out.x + out.width >= bbox.x + bbox.width);
    }

    #[test]
    fn apply_mask_fills_background() -> Result<(), ImageError> {
        let size = ImageSize {
            width: 2,
            height: 1,
        };
        let image = Image::<u8, 3>::new(size, vec![10, 20, 30, 40, 50, 60])?;
        let mask = Image::<u8, 1>::new(size, vec![255, 0])?;

        let out = apply_mask(&image, &mask, [255, 255, 255])?;
        assert_eq!(out.as_slice(), &[10, 20, 30, 255, 255, 255]);
        Ok(())
    }

    #[test]
    fn mask_to_rgb_triples_channels() -> Result<(), ImageError> {
        let mask = Image::<u8, 1>::new(
            ImageSize {
                width: 2,
                height: 1,
            },
            vec![0, 255],
        )?;
        let rgb = mask_to_rgb(&mask)?;
        assert_eq!(rgb.as_slice(), &[0, 0, 0, 255, 255, 255]);
        Ok(())
    }
}
