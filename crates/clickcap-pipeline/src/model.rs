//! Adapter traits the pipeline orchestrates.
//!
//! The pipeline is generic over these seams so orchestration logic can be
//! exercised without model weights or network access.

use clickcap_caption::{BlipCaptioner, RegionCaption, RegionOptions};
use clickcap_image::Image;
use clickcap_refine::{Controls, RefinedCaption, TextRefiner};
use clickcap_segment::{ImageEmbeddingState, MaskCandidate, SamSegmenter, SpatialPrompt};

use crate::error::PipelineError;

/// A model that converts a spatial prompt into mask candidates.
pub trait SegmentModel {
    /// Compute and cache the embedding of an image.
    fn set_image(&mut self, image: &Image<u8, 3>) -> Result<(), PipelineError>;

    /// Whether an image embedding is currently cached.
    fn is_image_set(&self) -> bool;

    /// The cached embedding state, if any.
    fn embedding_state(&self) -> Option<&ImageEmbeddingState>;

    /// Inject a precomputed embedding state.
    fn set_embedding_state(&mut self, state: ImageEmbeddingState);

    /// Drop the cached embedding.
    fn clear_image(&mut self);

    /// Segment the cached image with the given prompt.
    fn segment(&mut self, prompt: &SpatialPrompt) -> Result<Vec<MaskCandidate>, PipelineError>;
}

impl SegmentModel for SamSegmenter {
    fn set_image(&mut self, image: &Image<u8, 3>) -> Result<(), PipelineError> {
        Ok(SamSegmenter::set_image(self, image)?)
    }

    fn is_image_set(&self) -> bool {
        SamSegmenter::is_image_set(self)
    }

    fn embedding_state(&self) -> Option<&ImageEmbeddingState> {
        SamSegmenter::embedding_state(self)
    }

    fn set_embedding_state(&mut self, state: ImageEmbeddingState) {
        SamSegmenter::set_embedding_state(self, state)
    }

    fn clear_image(&mut self) {
        SamSegmenter::clear_image(self)
    }

    fn segment(&mut self, prompt: &SpatialPrompt) -> Result<Vec<MaskCandidate>, PipelineError> {
        Ok(SamSegmenter::segment(self, prompt)?)
    }
}

/// A model that converts an image region into natural language.
pub trait CaptionModel {
    /// Caption the whole image.
    fn caption(&mut self, image: &Image<u8, 3>) -> Result<String, PipelineError>;

    /// Caption the region of the image selected by the mask.
    fn caption_region(
        &mut self,
        image: &Image<u8, 3>,
        mask: &Image<u8, 1>,
        opts: &RegionOptions,
    ) -> Result<RegionCaption, PipelineError>;
}

impl CaptionModel for BlipCaptioner {
    fn caption(&mut self, image: &Image<u8, 3>) -> Result<String, PipelineError> {
        Ok(BlipCaptioner::caption(self, image)?)
    }

    fn caption_region(
        &mut self,
        image: &Image<u8, 3>,
        mask: &Image<u8, 1>,
        opts: &RegionOptions,
    ) -> Result<RegionCaption, PipelineError> {
        Ok(BlipCaptioner::caption_region(self, image, mask, opts)?)
    }
}

/// A model that rewrites a caption according to style controls.
pub trait RefineModel {
    /// Connectivity test; an error means refinement is unavailable.
    fn probe(&self) -> Result<(), PipelineError>;

    /// Rewrite the caption.
    fn refine(
        &self,
        caption: &str,
        controls: &Controls,
        context: &[String],
        enable_wiki: bool,
    ) -> Result<RefinedCaption, PipelineError>;
}

impl RefineModel for TextRefiner {
    fn probe(&self) -> Result<(), PipelineError> {
        Ok(TextRefiner::probe(self)?)
    }

    fn refine(
        &self,
        caption: &str,
        controls: &Controls,
        context: &[String],
        enable_wiki: bool,
    ) -> Result<RefinedCaption, PipelineError> {
        Ok(TextRefiner::refine(self, caption, controls, context, enable_wiki)?)
    }
}
