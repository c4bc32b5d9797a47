//! The caption pipeline: segment, post-filter, caption, refine.

use std::path::PathBuf;
use std::time::{SystemTime, UNIX_EPOCH};

use clickcap_image::png::write_image_png_rgb8;
use clickcap_image::Image;
use clickcap_imgproc::mask::mask_to_rgb;
use clickcap_imgproc::morphology::{self, Kernel, KernelShape};
use clickcap_refine::{Controls, RefinedCaption};
use clickcap_segment::{ImageEmbeddingState, SpatialPrompt};

use crate::config::{InferenceOptions, PipelineConfig};
use crate::error::PipelineError;
use crate::model::{CaptionModel, RefineModel, SegmentModel};

// structuring element side of the mask open/close post-filter
const MORPHOLOGY_KERNEL_SIZE: usize = 6;

/// The result of one inference round trip.
#[derive(Clone, Debug)]
pub struct InferenceOutput {
    /// Raw and refined caption of the region.
    pub captions: RefinedCaption,
    /// Where the region crop was saved, when crop saving is on.
    pub crop_path: Option<PathBuf>,
    /// Where the mask image was saved.
    pub mask_path: PathBuf,
    /// The mask used for captioning, after post-filtering.
    pub mask: Image<u8, 1>,
    /// Whole-image captions, when context captions are on.
    pub context_captions: Vec<String>,
}

/// Sequences the segmenter, the captioner and the refiner for one image.
///
/// The pipeline is strictly linear per call: segment with the prompt,
/// optionally smooth the mask, persist it, caption the region, optionally
/// refine the caption. The image embedding is computed once and reused
/// across prompts on the same image.
pub struct CaptionPipeline<S, C, R> {
    segmenter: S,
    captioner: C,
    refiner: Option<R>,
    config: PipelineConfig,
}

impl<S, C, R> CaptionPipeline<S, C, R>
where
    S: SegmentModel,
    C: CaptionModel,
    R: RefineModel,
{
    /// Create a new pipeline from its adapters.
    ///
    /// Pass `None` as refiner to always fall back to raw captions.
    pub fn new(segmenter: S, captioner: C, refiner: Option<R>, config: PipelineConfig) -> Self {
        Self {
            segmenter,
            captioner,
            refiner,
            config,
        }
    }

    /// Create a new pipeline, probing the refiner first.
    ///
    /// When the remote model does not answer the probe the pipeline runs
    /// without refinement instead of failing.
    pub fn with_probed_refiner(
        segmenter: S,
        captioner: C,
        refiner: R,
        config: PipelineConfig,
    ) -> Self {
        let refiner = match refiner.probe() {
            Ok(()) => Some(refiner),
            Err(e) => {
                log::warn!("text refiner is not available, captions stay raw: {e}");
                None
            }
        };
        Self::new(segmenter, captioner, refiner, config)
    }

    /// The pipeline configuration.
    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Whether a refiner is attached and answered its probe.
    pub fn has_refiner(&self) -> bool {
        self.refiner.is_some()
    }

    /// Inject a precomputed image embedding, skipping the encoder on the
    /// next [`inference`](Self::inference) call.
    pub fn setup(&mut self, state: ImageEmbeddingState) {
        self.segmenter.set_embedding_state(state);
    }

    /// The cached embedding state, if any.
    pub fn embedding_state(&self) -> Option<&ImageEmbeddingState> {
        self.segmenter.embedding_state()
    }

    /// Drop the cached embedding between images.
    pub fn clear_image(&mut self) {
        self.segmenter.clear_image();
    }

    /// Run one full segment, caption, refine round trip.
    ///
    /// # Arguments
    ///
    /// * `image` - The image the prompt refers to.
    /// * `prompt` - Click points and/or a box in image coordinates.
    /// * `controls` - Style controls for the refiner.
    /// * `opts` - Per-call switches.
    pub fn inference(
        &mut self,
        image: &Image<u8, 3>,
        prompt: &SpatialPrompt,
        controls: &Controls,
        opts: &InferenceOptions,
    ) -> Result<InferenceOutput, PipelineError> {
        log::debug!("pipeline prompt: {prompt:?}, controls: {controls:?}");

        // the encoder runs once per image; later prompts reuse the embedding
        if !self.segmenter.is_image_set() {
            self.segmenter.set_image(image)?;
        }

        let candidates = self.segmenter.segment(prompt)?;
        let best = candidates
            .into_iter()
            .max_by(|a, b| a.score.total_cmp(&b.score))
            .ok_or(PipelineError::NoMask)?;
        log::debug!("best mask candidate score: {:.3}", best.score);

        let mask = if self.config.enable_morphology {
            smooth_mask(&best.mask)?
        } else {
            best.mask
        };

        let mask_path = self.save_mask(&mask)?;

        let region = self
            .captioner
            .caption_region(image, &mask, &self.config.region_options())?;

        let mut context_captions = Vec::new();
        if self.config.context_captions {
            context_captions.push(self.captioner.caption(image)?);
        }

        let captions = match (&self.refiner, opts.disable_refine) {
            (Some(refiner), false) => refiner.refine(
                &region.caption,
                controls,
                &context_captions,
                opts.enable_wiki,
            )?,
            _ => RefinedCaption::passthrough(region.caption),
        };

        Ok(InferenceOutput {
            captions,
            crop_path: region.crop_path,
            mask_path,
            mask,
            context_captions,
        })
    }

    fn save_mask(&self, mask: &Image<u8, 1>) -> Result<PathBuf, PipelineError> {
        std::fs::create_dir_all(&self.config.result_dir)?;

        let millis = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_millis();
        let path = self.config.result_dir.join(format!("mask_{millis}.png"));

        // saved as RGB so any viewer renders it
        write_image_png_rgb8(&path, &mask_to_rgb(mask)?)?;
        log::info!("mask saved to {}", path.display());

        Ok(path)
    }
}

// open then close: drop speckles first, then fill pinholes
fn smooth_mask(mask: &Image<u8, 1>) -> Result<Image<u8, 1>, PipelineError> {
    let kernel = Kernel::new(KernelShape::Box {
        size: MORPHOLOGY_KERNEL_SIZE,
    });

    let mut opened = Image::from_size_val(mask.size(), 0u8)?;
    morphology::open(mask, &mut opened, &kernel)?;

    let mut closed = Image::from_size_val(mask.size(), 0u8)?;
    morphology::close(&opened, &mut closed, &kernel)?;

    Ok(closed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use clickcap_caption::{RegionCaption, RegionOptions};
    use clickcap_image::ImageSize;
    use clickcap_refine::RefineError;
    use clickcap_segment::MaskCandidate;

    const SIZE: ImageSize = ImageSize {
        width: 16,
        height: 16,
    };

    fn test_state() -> ImageEmbeddingState {
        ImageEmbeddingState {
            embedding: vec![0.0; 16],
            shape: [1, 1, 4, 4],
            original_size: SIZE,
            input_size: ImageSize {
                width: 1024,
                height: 1024,
            },
        }
    }

    fn block_mask(value_region: std::ops::Range<usize>) -> Image<u8, 1> {
        let mut mask = Image::from_size_val(SIZE, 0u8).unwrap();
        for y in value_region.clone() {
            for x in value_region.clone() {
                mask.set_pixel(x, y, 0, 255).unwrap();
            }
        }
        mask
    }

    struct StubSegmenter {
        state: Option<ImageEmbeddingState>,
        candidates: Vec<MaskCandidate>,
        set_image_calls: usize,
    }

    impl StubSegmenter {
        fn new(candidates: Vec<MaskCandidate>) -> Self {
            Self {
                state: None,
                candidates,
                set_image_calls: 0,
            }
        }
    }

    impl SegmentModel for StubSegmenter {
        fn set_image(&mut self, _image: &Image<u8, 3>) -> Result<(), PipelineError> {
            self.set_image_calls += 1;
            self.state = Some(test_state());
            Ok(())
        }

        fn is_image_set(&self) -> bool {
            self.state.is_some()
        }

        fn embedding_state(&self) -> Option<&ImageEmbeddingState> {
            self.state.as_ref()
        }

        fn set_embedding_state(&mut self, state: ImageEmbeddingState) {
            self.state = Some(state);
        }

        fn clear_image(&mut self) {
            self.state = None;
        }

        fn segment(
            &mut self,
            _prompt: &SpatialPrompt,
        ) -> Result<Vec<MaskCandidate>, PipelineError> {
            assert!(self.state.is_some(), "segment called without an image");
            Ok(self.candidates.clone())
        }
    }

    #[derive(Default)]
    struct StubCaptioner {
        seen_mask: Option<Image<u8, 1>>,
    }

    impl CaptionModel for StubCaptioner {
        fn caption(&mut self, _image: &Image<u8, 3>) -> Result<String, PipelineError> {
            Ok("a cluttered desk".to_string())
        }

        fn caption_region(
            &mut self,
            _image: &Image<u8, 3>,
            mask: &Image<u8, 1>,
            _opts: &RegionOptions,
        ) -> Result<RegionCaption, PipelineError> {
            self.seen_mask = Some(mask.clone());
            Ok(RegionCaption {
                caption: "a red mug".to_string(),
                crop_path: None,
                filtered: false,
            })
        }
    }

    struct EchoRefiner;

    impl RefineModel for EchoRefiner {
        fn probe(&self) -> Result<(), PipelineError> {
            Ok(())
        }

        fn refine(
            &self,
            caption: &str,
            _controls: &Controls,
            context: &[String],
            _enable_wiki: bool,
        ) -> Result<RefinedCaption, PipelineError> {
            Ok(RefinedCaption {
                raw: caption.to_string(),
                refined: format!("refined: {caption} ({} context)", context.len()),
                wiki: None,
            })
        }
    }

    struct DeadRefiner;

    impl RefineModel for DeadRefiner {
        fn probe(&self) -> Result<(), PipelineError> {
            Err(RefineError::EmptyResponse.into())
        }

        fn refine(
            &self,
            _caption: &str,
            _controls: &Controls,
            _context: &[String],
            _enable_wiki: bool,
        ) -> Result<RefinedCaption, PipelineError> {
            panic!("refine must not be called on a dead refiner");
        }
    }

    fn test_config(dir: &std::path::Path) -> PipelineConfig {
        PipelineConfig {
            result_dir: dir.to_path_buf(),
            ..Default::default()
        }
    }

    fn test_image() -> Image<u8, 3> {
        Image::from_size_val(SIZE, 100u8).unwrap()
    }

    #[test]
    fn inference_runs_the_full_sequence() -> Result<(), PipelineError> {
        let dir = tempfile::tempdir()?;
        let candidates = vec![MaskCandidate {
            mask: block_mask(4..10),
            score: 0.8,
        }];
        let mut pipeline = CaptionPipeline::new(
            StubSegmenter::new(candidates),
            StubCaptioner::default(),
            Some(EchoRefiner),
            test_config(dir.path()),
        );

        let prompt = SpatialPrompt::from_points(vec![
            clickcap_segment::PromptPoint::foreground(8.0, 8.0),
        ]);
        let out = pipeline.inference(
            &test_image(),
            &prompt,
            &Controls::default(),
            &InferenceOptions::default(),
        )?;

        assert_eq!(out.captions.raw, "a red mug");
        assert_eq!(out.captions.refined, "refined: a red mug (0 context)");
        assert!(out.mask_path.exists());
        assert!(out.context_captions.is_empty());
        Ok(())
    }

    #[test]
    fn best_candidate_wins_by_score() -> Result<(), PipelineError> {
        let dir = tempfile::tempdir()?;
        let better = block_mask(2..6);
        let candidates = vec![
            MaskCandidate {
                mask: block_mask(8..12),
                score: 0.4,
            },
            MaskCandidate {
                mask: better.clone(),
                score: 0.9,
            },
        ];
        let mut pipeline = CaptionPipeline::<_, _, EchoRefiner>::new(
            StubSegmenter::new(candidates),
            StubCaptioner::default(),
            None,
            test_config(dir.path()),
        );

        let out = pipeline.inference(
            &test_image(),
            &SpatialPrompt::from_points(vec![clickcap_segment::PromptPoint::foreground(4.0, 4.0)]),
            &Controls::default(),
            &InferenceOptions::default(),
        )?;

        assert_eq!(out.mask, better);
        Ok(())
    }

    #[test]
    fn missing_refiner_passes_the_raw_caption_through() -> Result<(), PipelineError> {
        let dir = tempfile::tempdir()?;
        let mut pipeline = CaptionPipeline::with_probed_refiner(
            StubSegmenter::new(vec![MaskCandidate {
                mask: block_mask(4..10),
                score: 0.8,
            }]),
            StubCaptioner::default(),
            DeadRefiner,
            test_config(dir.path()),
        );
        assert!(!pipeline.has_refiner());

        let out = pipeline.inference(
            &test_image(),
            &SpatialPrompt::from_points(vec![clickcap_segment::PromptPoint::foreground(8.0, 8.0)]),
            &Controls::default(),
            &InferenceOptions::default(),
        )?;

        assert_eq!(out.captions.raw, out.captions.refined);
        assert_eq!(out.captions.raw, "a red mug");
        Ok(())
    }

    #[test]
    fn disable_refine_skips_an_available_refiner() -> Result<(), PipelineError> {
        let dir = tempfile::tempdir()?;
        let mut pipeline = CaptionPipeline::new(
            StubSegmenter::new(vec![MaskCandidate {
                mask: block_mask(4..10),
                score: 0.8,
            }]),
            StubCaptioner::default(),
            Some(EchoRefiner),
            test_config(dir.path()),
        );

        let out = pipeline.inference(
            &test_image(),
            &SpatialPrompt::from_points(vec![clickcap_segment::PromptPoint::foreground(8.0, 8.0)]),
            &Controls::default(),
            &InferenceOptions {
                disable_refine: true,
                ..Default::default()
            },
        )?;

        assert_eq!(out.captions.refined, "a red mug");
        Ok(())
    }

    #[test]
    fn setup_injects_the_embedding_and_skips_the_encoder() -> Result<(), PipelineError> {
        let dir = tempfile::tempdir()?;
        let mut pipeline = CaptionPipeline::<_, _, EchoRefiner>::new(
            StubSegmenter::new(vec![MaskCandidate {
                mask: block_mask(4..10),
                score: 0.8,
            }]),
            StubCaptioner::default(),
            None,
            test_config(dir.path()),
        );

        pipeline.setup(test_state());
        assert!(pipeline.embedding_state().is_some());

        pipeline.inference(
            &test_image(),
            &SpatialPrompt::from_points(vec![clickcap_segment::PromptPoint::foreground(8.0, 8.0)]),
            &Controls::default(),
            &InferenceOptions::default(),
        )?;

        assert_eq!(pipeline.segmenter.set_image_calls, 0);

        pipeline.clear_image();
        assert!(pipeline.embedding_state().is_none());
        Ok(())
    }

    #[test]
    fn morphology_cleans_the_winning_mask() -> Result<(), PipelineError> {
        let dir = tempfile::tempdir()?;
        // a solid block plus an isolated speck
        let mut speckled = block_mask(4..12);
        speckled.set_pixel(0, 0, 0, 255).unwrap();

        let mut pipeline = CaptionPipeline::<_, _, EchoRefiner>::new(
            StubSegmenter::new(vec![MaskCandidate {
                mask: speckled,
                score: 0.8,
            }]),
            StubCaptioner::default(),
            None,
            PipelineConfig {
                enable_morphology: true,
                result_dir: dir.path().to_path_buf(),
                ..Default::default()
            },
        );

        let out = pipeline.inference(
            &test_image(),
            &SpatialPrompt::from_points(vec![clickcap_segment::PromptPoint::foreground(8.0, 8.0)]),
            &Controls::default(),
            &InferenceOptions::default(),
        )?;

        // the speck is gone, the block survives
        assert_eq!(out.mask.get_pixel(0, 0, 0)?, 0);
        assert_eq!(out.mask.get_pixel(8, 8, 0)?, 255);
        Ok(())
    }

    #[test]
    fn context_captions_reach_the_refiner() -> Result<(), PipelineError> {
        let dir = tempfile::tempdir()?;
        let mut pipeline = CaptionPipeline::new(
            StubSegmenter::new(vec![MaskCandidate {
                mask: block_mask(4..10),
                score: 0.8,
            }]),
            StubCaptioner::default(),
            Some(EchoRefiner),
            PipelineConfig {
                context_captions: true,
                result_dir: dir.path().to_path_buf(),
                ..Default::default()
            },
        );

        let out = pipeline.inference(
            &test_image(),
            &SpatialPrompt::from_points(vec![clickcap_segment::PromptPoint::foreground(8.0, 8.0)]),
            &Controls::default(),
            &InferenceOptions::default(),
        )?;

        assert_eq!(out.context_captions, vec!["a cluttered desk".to_string()]);
        assert_eq!(out.captions.refined, "refined: a red mug (1 context)");
        Ok(())
    }
}
