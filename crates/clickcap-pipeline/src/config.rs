use std::path::PathBuf;

use clickcap_caption::{CropMode, RegionOptions};
use serde::{Deserialize, Serialize};

/// Configuration of the caption pipeline.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Whether region crops keep the image background.
    pub crop_mode: CropMode,
    /// Expand the tight mask box into a regular crop box.
    pub regular_box: bool,
    /// Margin of the regular box as a fraction of the longer side.
    pub box_margin: f32,
    /// Caption regions at reduced resolution (fewer vision tokens).
    pub enable_reduce_tokens: bool,
    /// Smooth masks with a morphological open/close before captioning.
    pub enable_morphology: bool,
    /// Also caption the whole image as context for the refiner.
    pub context_captions: bool,
    /// Save region crops next to the masks.
    pub save_crops: bool,
    /// Directory mask and crop artifacts are written to.
    pub result_dir: PathBuf,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            crop_mode: CropMode::WithoutBackground,
            regular_box: true,
            box_margin: 0.15,
            enable_reduce_tokens: false,
            enable_morphology: false,
            context_captions: false,
            save_crops: false,
            result_dir: PathBuf::from("result"),
        }
    }
}

impl PipelineConfig {
    /// The region captioning options this configuration implies.
    pub fn region_options(&self) -> RegionOptions {
        RegionOptions {
            crop_mode: self.crop_mode,
            regular_box: self.regular_box,
            box_margin: self.box_margin,
            reduce_tokens: self.enable_reduce_tokens,
            crop_dir: self.save_crops.then(|| self.result_dir.clone()),
        }
    }
}

/// Per-call switches of [`crate::CaptionPipeline::inference`].
#[derive(Clone, Copy, Debug, Default)]
pub struct InferenceOptions {
    /// Skip refinement even when a refiner is available.
    pub disable_refine: bool,
    /// Enrich refinement with a knowledge lookup.
    pub enable_wiki: bool,
}
