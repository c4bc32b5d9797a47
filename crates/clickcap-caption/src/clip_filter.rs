use candle_core::{DType, Device, Tensor, D};
use candle_nn::VarBuilder;
use candle_transformers::models::clip::{self, ClipModel};
use clickcap_image::{Image, ImageSize};
use clickcap_imgproc::resize::{resize_fast, InterpolationMode};
use hf_hub::{api::sync::Api, Repo, RepoType};
use tokenizers::Tokenizer;

use crate::error::CaptionError;

const MODEL_ID: &str = "openai/clip-vit-base-patch32";
// the safetensors conversion lives on this revision
const MODEL_REVISION: &str = "refs/pr/15";

/// Scores captions against the crop they describe with CLIP.
///
/// A low image/text similarity flags a caption the captioning model most
/// likely hallucinated for the region.
pub struct ClipFilter {
    model: ClipModel,
    tokenizer: Tokenizer,
    device: Device,
    image_size: usize,
    threshold: f32,
}

impl ClipFilter {
    /// Create a new CLIP filter.
    ///
    /// # Arguments
    ///
    /// * `threshold` - Similarity under this value flags the caption.
    pub fn new(threshold: f32) -> Result<Self, CaptionError> {
        #[cfg(feature = "cuda")]
        let device = match Device::cuda_if_available(0) {
            Ok(device) => device,
            Err(e) => {
                log::warn!("CUDA not available, defaulting to CPU: {e}");
                Device::Cpu
            }
        };

        #[cfg(not(feature = "cuda"))]
        let device = Device::Cpu;

        let api = Api::new()?;
        let repo = api.repo(Repo::with_revision(
            MODEL_ID.to_string(),
            RepoType::Model,
            MODEL_REVISION.to_string(),
        ));

        let tokenizer_filename = repo.get("tokenizer.json")?;
        let weights = repo.get("model.safetensors")?;

        let tokenizer = Tokenizer::from_file(tokenizer_filename)?;

        let config = clip::ClipConfig::vit_base_patch32();
        let image_size = config.image_size;
        let vb =
            unsafe { VarBuilder::from_mmaped_safetensors(&[weights], DType::F32, &device)? };
        let model = ClipModel::new(vb, &config)?;

        Ok(Self {
            model,
            tokenizer,
            device,
            image_size,
            threshold,
        })
    }

    /// The similarity threshold under which a caption is flagged.
    pub fn threshold(&self) -> f32 {
        self.threshold
    }

    /// Cosine similarity between the image and the text in CLIP space.
    pub fn score(&self, image: &Image<u8, 3>, text: &str) -> Result<f32, CaptionError> {
        let mut img_buf = Image::from_size_val(
            ImageSize {
                width: self.image_size,
                height: self.image_size,
            },
            0u8,
        )?;
        resize_fast(image, &mut img_buf, InterpolationMode::Bilinear)?;

        let pixel_values = Tensor::from_slice(
            img_buf.as_slice(),
            (self.image_size, self.image_size, 3),
            &self.device,
        )?
        .permute((2, 0, 1))?
        .to_dtype(DType::F32)?
        .affine(2.0 / 255.0, -1.0)?
        .unsqueeze(0)?;

        let encoding = self.tokenizer.encode(text, true)?;
        let input_ids =
            Tensor::new(encoding.get_ids(), &self.device)?.unsqueeze(0)?;

        let image_features = div_l2_norm(&self.model.get_image_features(&pixel_values)?)?;
        let text_features = div_l2_norm(&self.model.get_text_features(&input_ids)?)?;

        let similarity = (image_features * text_features)?
            .sum_all()?
            .to_scalar::<f32>()?;
        Ok(similarity)
    }

    /// Whether the caption clears the similarity threshold for the image.
    pub fn passes(&self, image: &Image<u8, 3>, text: &str) -> Result<bool, CaptionError> {
        let score = self.score(image, text)?;
        log::debug!("clip similarity {score:.3} for caption {text:?}");
        Ok(score >= self.threshold)
    }
}

fn div_l2_norm(v: &Tensor) -> Result<Tensor, candle_core::Error> {
    let l2_norm = v.sqr()?.sum_keepdim(D::Minus1)?.sqrt()?;
    v.broadcast_div(&l2_norm)
}
