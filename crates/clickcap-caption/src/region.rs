use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use clickcap_image::png::write_image_png_rgb8;
use clickcap_image::{Image, ImageSize};
use clickcap_imgproc::crop::crop_image;
use clickcap_imgproc::mask::{apply_mask, mask_bbox, regular_box, Rect};
use serde::{Deserialize, Serialize};

use crate::blip::BlipCaptioner;
use crate::error::CaptionError;

/// Whether the crop handed to the captioner keeps the image background.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CropMode {
    /// Background pixels are painted white before cropping.
    #[default]
    WithoutBackground,
    /// The crop keeps the surrounding background.
    WithBackground,
}

/// Options for captioning a masked region.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RegionOptions {
    /// Crop mode.
    pub crop_mode: CropMode,
    /// Expand the tight mask box into a regular crop box.
    pub regular_box: bool,
    /// Margin of the regular box as a fraction of the longer side.
    pub box_margin: f32,
    /// Caption at reduced resolution (fewer vision tokens).
    pub reduce_tokens: bool,
    /// Directory to save the crop into; the crop is not saved when `None`.
    pub crop_dir: Option<PathBuf>,
}

impl Default for RegionOptions {
    fn default() -> Self {
        Self {
            crop_mode: CropMode::WithoutBackground,
            regular_box: true,
            box_margin: 0.15,
            reduce_tokens: false,
            crop_dir: None,
        }
    }
}

/// A caption generated for a masked region.
#[derive(Clone, Debug)]
pub struct RegionCaption {
    /// The generated caption.
    pub caption: String,
    /// Where the crop was saved, when saving was requested.
    pub crop_path: Option<PathBuf>,
    /// Set when a caption filter scored the caption under its threshold.
    pub filtered: bool,
}

/// Cut the region selected by the mask out of the image.
///
/// The crop box is the tight bounding box of the mask, optionally expanded
/// into a regular box. In [`CropMode::WithoutBackground`] all pixels outside
/// the mask are painted white first, so the captioner only sees the object.
///
/// Returns the crop and the crop box in original image coordinates.
pub fn region_crop(
    image: &Image<u8, 3>,
    mask: &Image<u8, 1>,
    opts: &RegionOptions,
) -> Result<(Image<u8, 3>, Rect), CaptionError> {
    let bbox = mask_bbox(mask).ok_or(CaptionError::EmptyMask)?;
    let crop_box = if opts.regular_box {
        regular_box(bbox, image.size(), opts.box_margin)
    } else {
        bbox
    };

    let source = match opts.crop_mode {
        CropMode::WithoutBackground => apply_mask(image, mask, [255, 255, 255])?,
        CropMode::WithBackground => image.clone(),
    };

    let mut crop = Image::from_size_val(
        ImageSize {
            width: crop_box.width,
            height: crop_box.height,
        },
        0u8,
    )?;
    crop_image(&source, &mut crop, crop_box.x, crop_box.y)?;

    Ok((crop, crop_box))
}

impl BlipCaptioner {
    /// Caption the region of the image selected by the mask.
    ///
    /// Crops/masks the region per the options, optionally saves the crop
    /// under `crop_dir`, and generates a caption for the crop.
    pub fn caption_region(
        &mut self,
        image: &Image<u8, 3>,
        mask: &Image<u8, 1>,
        opts: &RegionOptions,
    ) -> Result<RegionCaption, CaptionError> {
        let (crop, crop_box) = region_crop(image, mask, opts)?;
        log::debug!(
            "captioning region ({}, {}) {}x{}",
            crop_box.x,
            crop_box.y,
            crop_box.width,
            crop_box.height
        );

        let crop_path = match &opts.crop_dir {
            Some(dir) => Some(save_crop(dir, &crop)?),
            None => None,
        };

        let caption = if opts.reduce_tokens {
            self.caption_reduced(&crop)?
        } else {
            self.caption(&crop)?
        };

        let mut filtered = false;
        if let Some(filter) = self.filter() {
            if !filter.passes(&crop, &caption)? {
                log::warn!("caption scored under the similarity threshold: {caption:?}");
                filtered = true;
            }
        }

        Ok(RegionCaption {
            caption,
            crop_path,
            filtered,
        })
    }
}

fn save_crop(dir: &Path, crop: &Image<u8, 3>) -> Result<PathBuf, CaptionError> {
    std::fs::create_dir_all(dir)?;
    let millis = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis();
    let path = dir.join(format!("crop_{millis}.png"));
    write_image_png_rgb8(&path, crop)?;
    log::info!("crop saved to {}", path.display());
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn image_and_mask() -> (Image<u8, 3>, Image<u8, 1>) {
        let size = ImageSize {
            width: 8,
            height: 8,
        };
        let mut image = Image::from_size_val(size, 0u8).unwrap();
        for i in 0..image.as_slice().len() {
            image.as_slice_mut()[i] = (i % 251) as u8;
        }
        let mut mask = Image::from_size_val(size, 0u8).unwrap();
        for y in 2..5 {
            for x in 3..6 {
                mask.set_pixel(x, y, 0, 255).unwrap();
            }
        }
        (image, mask)
    }

    #[test]
    fn tight_crop_matches_mask_bbox() -> Result<(), CaptionError> {
        let (image, mask) = image_and_mask();
        let opts = RegionOptions {
            regular_box: false,
            crop_mode: CropMode::WithBackground,
            ..Default::default()
        };
        let (crop, crop_box) = region_crop(&image, &mask, &opts)?;
        assert_eq!(
            crop_box,
            Rect {
                x: 3,
                y: 2,
                width: 3,
                height: 3
            }
        );
        assert_eq!(crop.width(), 3);
        assert_eq!(crop.height(), 3);
        // background kept: top-left crop pixel equals the source pixel
        assert_eq!(
            crop.get_pixel(0, 0, 0)?,
            image.get_pixel(3, 2, 0)?
        );
        Ok(())
    }

    #[test]
    fn without_background_paints_white() -> Result<(), CaptionError> {
        let (image, mask) = image_and_mask();
        let opts = RegionOptions {
            regular_box: true,
            box_margin: 0.4,
            crop_mode: CropMode::WithoutBackground,
            ..Default::default()
        };
        let (crop, crop_box) = region_crop(&image, &mask, &opts)?;
        // the expanded box includes background, which must be white now
        assert!(crop_box.width > 3 || crop_box.height > 3);
        assert_eq!(crop.get_pixel(0, 0, 0)?, 255);
        Ok(())
    }

    #[test]
    fn empty_mask_is_an_error() {
        let (image, _) = image_and_mask();
        let mask = Image::from_size_val(image.size(), 0u8).unwrap();
        let res = region_crop(&image, &mask, &RegionOptions::default());
        assert!(matches!(res, Err(CaptionError::EmptyMask)));
    }
}
