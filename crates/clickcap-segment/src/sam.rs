//! # Segment Anything adapter
//!
//! Wraps the two-session ONNX export of the Segment Anything model: the
//! image encoder runs once per image and its embedding is cached, the
//! prompt decoder runs once per prompt against the cached embedding.

use std::path::PathBuf;

use clickcap_image::{Image, ImageSize};
use ort::session::{builder::GraphOptimizationLevel, Session};

use crate::error::SegmentError;
use crate::preprocess::{encoder_input, threshold_logits, SAM_INPUT_SIZE};
use crate::prompt::SpatialPrompt;

// tensor names of the reference encoder/decoder export
const ENCODER_INPUT: &str = "image";
const ENCODER_OUTPUT: &str = "image_embeddings";
const DECODER_MASKS: &str = "masks";
const DECODER_IOU: &str = "iou_predictions";

/// The cached output of the image encoder plus the geometry needed to map
/// prompts into it.
///
/// The state can be taken out of one segmenter and injected into another
/// (or kept by a host application) so several prompts on the same image
/// pay for the encoder exactly once.
#[derive(Clone, Debug)]
pub struct ImageEmbeddingState {
    /// Flat encoder output tensor data.
    pub embedding: Vec<f32>,
    /// Shape of the embedding tensor, `[1, C, H, W]`.
    pub shape: [usize; 4],
    /// Size of the image the embedding was computed from.
    pub original_size: ImageSize,
    /// Pre-padding size of the encoder input.
    pub input_size: ImageSize,
}

/// One decoded mask candidate with its predicted IoU score.
#[derive(Clone, Debug)]
pub struct MaskCandidate {
    /// The mask at original image resolution, 0 or 255 per pixel.
    pub mask: Image<u8, 1>,
    /// The decoder's IoU prediction for this mask.
    pub score: f32,
}

/// Builder for the SAM segmenter.
///
/// This struct provides a convenient way to configure and create a
/// [`SamSegmenter`] instance.
pub struct SamSegmenterBuilder {
    /// Path to the encoder ONNX model file.
    pub encoder_path: PathBuf,
    /// Path to the decoder ONNX model file.
    pub decoder_path: PathBuf,
    /// Number of threads to use for inference.
    pub num_threads: usize,
}

impl SamSegmenterBuilder {
    /// Creates a new `SamSegmenterBuilder` with default settings.
    pub fn new(encoder_path: PathBuf, decoder_path: PathBuf) -> Self {
        Self {
            encoder_path,
            decoder_path,
            num_threads: 4,
        }
    }

    /// Sets the number of threads to use for inference.
    pub fn with_num_threads(mut self, num_threads: usize) -> Self {
        self.num_threads = num_threads;
        self
    }

    /// Builds and returns a [`SamSegmenter`] instance.
    pub fn build(self) -> Result<SamSegmenter, SegmentError> {
        SamSegmenter::new(self.encoder_path, self.decoder_path, self.num_threads)
    }
}

/// Segment Anything segmenter.
///
/// Holds the encoder and decoder sessions and the cached embedding of the
/// current image.
pub struct SamSegmenter {
    encoder: Session,
    decoder: Session,
    state: Option<ImageEmbeddingState>,
}

impl SamSegmenter {
    /// Creates a new `SamSegmenter` instance.
    ///
    /// # Arguments
    ///
    /// * `encoder_path` - Path to the encoder ONNX model file.
    /// * `decoder_path` - Path to the decoder ONNX model file.
    /// * `num_threads` - Number of threads to use for inference.
    ///
    /// Pre-requisites:
    /// - ORT_DYLIB_PATH environment variable must be set to the path of the ORT dylib.
    pub fn new(
        encoder_path: PathBuf,
        decoder_path: PathBuf,
        num_threads: usize,
    ) -> Result<Self, SegmentError> {
        // get the ort dylib path from the environment variable
        let dylib_path = std::env::var("ORT_DYLIB_PATH")
            .map_err(|e| SegmentError::OrtDylibError(e.to_string()))?;

        // set the ort dylib path
        ort::init_from(dylib_path).commit()?;

        let encoder = Session::builder()?
            .with_optimization_level(GraphOptimizationLevel::Level3)?
            .with_intra_threads(num_threads)?
            .commit_from_file(encoder_path)?;

        let decoder = Session::builder()?
            .with_optimization_level(GraphOptimizationLevel::Level3)?
            .with_intra_threads(num_threads)?
            .commit_from_file(decoder_path)?;

        Ok(Self {
            encoder,
            decoder,
            state: None,
        })
    }

    /// Runs the encoder on the given image and caches the embedding.
    ///
    /// # Arguments
    ///
    /// * `image` - The input image as an `Image<u8, 3>`.
    pub fn set_image(&mut self, image: &Image<u8, 3>) -> Result<(), SegmentError> {
        let (input, input_size) = encoder_input(image)?;

        let ort_tensor =
            ort::value::Tensor::from_array(([1usize, 3, SAM_INPUT_SIZE, SAM_INPUT_SIZE], input))?;

        let outputs = self.encoder.run(ort::inputs![ENCODER_INPUT => ort_tensor])?;

        let (emb_shape, emb_data) = outputs
            .get(ENCODER_OUTPUT)
            .ok_or_else(|| {
                SegmentError::UnexpectedOutput(format!("missing tensor {ENCODER_OUTPUT:?}"))
            })?
            .try_extract_tensor::<f32>()?;
        if emb_shape.len() != 4 {
            return Err(SegmentError::UnexpectedOutput(format!(
                "embedding has {} dims, expected 4",
                emb_shape.len()
            )));
        }

        log::debug!(
            "image embedding computed: shape {:?} for image {}",
            emb_shape,
            image.size()
        );

        self.state = Some(ImageEmbeddingState {
            embedding: emb_data.to_vec(),
            shape: [
                emb_shape[0] as usize,
                emb_shape[1] as usize,
                emb_shape[2] as usize,
                emb_shape[3] as usize,
            ],
            original_size: image.size(),
            input_size,
        });

        Ok(())
    }

    /// Whether an image embedding is currently cached.
    pub fn is_image_set(&self) -> bool {
        self.state.is_some()
    }

    /// The cached embedding state, if any.
    pub fn embedding_state(&self) -> Option<&ImageEmbeddingState> {
        self.state.as_ref()
    }

    /// Inject a precomputed embedding state, skipping the encoder.
    pub fn set_embedding_state(&mut self, state: ImageEmbeddingState) {
        self.state = Some(state);
    }

    /// Take the cached embedding state out of the segmenter.
    pub fn take_embedding_state(&mut self) -> Option<ImageEmbeddingState> {
        self.state.take()
    }

    /// Drop the cached embedding.
    pub fn clear_image(&mut self) {
        self.state = None;
    }

    /// Runs the decoder for one prompt against the cached embedding.
    ///
    /// # Arguments
    ///
    /// * `prompt` - The spatial prompt in original image coordinates.
    ///
    /// # Returns
    ///
    /// Mask candidates at original image resolution, sorted by descending
    /// IoU score. With `multimask` off only the best candidate is kept.
    pub fn segment(&mut self, prompt: &SpatialPrompt) -> Result<Vec<MaskCandidate>, SegmentError> {
        let state = self.state.as_ref().ok_or(SegmentError::NoImageSet)?;

        let (coords, labels) = prompt.encode(state.original_size, state.input_size)?;
        let num_points = labels.len();

        let embedding_tensor =
            ort::value::Tensor::from_array((state.shape, state.embedding.clone()))?;
        let coords_tensor = ort::value::Tensor::from_array(([1usize, num_points, 2], coords))?;
        let labels_tensor = ort::value::Tensor::from_array(([1usize, num_points], labels))?;
        let mask_input_tensor =
            ort::value::Tensor::from_array(([1usize, 1, 256, 256], vec![0.0f32; 256 * 256]))?;
        let has_mask_tensor = ort::value::Tensor::from_array(([1usize], vec![0.0f32]))?;
        let orig_size_tensor = ort::value::Tensor::from_array((
            [2usize],
            vec![
                state.original_size.height as f32,
                state.original_size.width as f32,
            ],
        ))?;

        let outputs = self.decoder.run(ort::inputs![
            "image_embeddings" => embedding_tensor,
            "point_coords" => coords_tensor,
            "point_labels" => labels_tensor,
            "mask_input" => mask_input_tensor,
            "has_mask_input" => has_mask_tensor,
            "orig_im_size" => orig_size_tensor,
        ])?;

        let (mask_shape, mask_data) = outputs
            .get(DECODER_MASKS)
            .ok_or_else(|| {
                SegmentError::UnexpectedOutput(format!("missing tensor {DECODER_MASKS:?}"))
            })?
            .try_extract_tensor::<f32>()?;
        let (_, iou_data) = outputs
            .get(DECODER_IOU)
            .ok_or_else(|| {
                SegmentError::UnexpectedOutput(format!("missing tensor {DECODER_IOU:?}"))
            })?
            .try_extract_tensor::<f32>()?;

        // we expect the masks tensor to have shape [1, M, H, W]
        if mask_shape.len() != 4 {
            return Err(SegmentError::UnexpectedOutput(format!(
                "masks have {} dims, expected 4",
                mask_shape.len()
            )));
        }
        let num_masks = mask_shape[1] as usize;
        let mask_height = mask_shape[2] as usize;
        let mask_width = mask_shape[3] as usize;
        if mask_height != state.original_size.height || mask_width != state.original_size.width {
            return Err(SegmentError::UnexpectedOutput(format!(
                "mask size ({mask_width}, {mask_height}) does not match the original image {}",
                state.original_size
            )));
        }

        let mask_size = ImageSize {
            width: mask_width,
            height: mask_height,
        };
        let mut candidates = Vec::with_capacity(num_masks);
        for (m, logits) in mask_data.chunks_exact(mask_height * mask_width).enumerate() {
            candidates.push(MaskCandidate {
                mask: threshold_logits(logits, mask_size, 0.0)?,
                score: iou_data.get(m).copied().unwrap_or(0.0),
            });
        }

        candidates.sort_by(|a, b| b.score.total_cmp(&a.score));
        if !prompt.multimask {
            candidates.truncate(1);
        }

        log::debug!(
            "decoded {} mask candidate(s), best score {:.3}",
            candidates.len(),
            candidates.first().map(|c| c.score).unwrap_or(0.0)
        );

        Ok(candidates)
    }
}
