use candle_core::{DType, Device, Tensor};
use candle_nn::VarBuilder;
use candle_transformers::generation::{LogitsProcessor, Sampling};
use candle_transformers::models::blip::{BlipForConditionalGeneration, Config};
use clickcap_image::{Image, ImageSize};
use clickcap_imgproc::resize::{resize_fast, InterpolationMode};
use hf_hub::{api::sync::Api, Repo, RepoType};
use tokenizers::Tokenizer;

use crate::clip_filter::ClipFilter;
use crate::error::CaptionError;

const MODEL_ID: &str = "Salesforce/blip-image-captioning-large";
// the safetensors conversion lives on this revision
const MODEL_REVISION: &str = "refs/pr/18";

const BOS_TOKEN_ID: u32 = 30522;
const SEP_TOKEN_ID: u32 = 102;

const IMAGE_MEAN: [f32; 3] = [0.48145466, 0.4578275, 0.40821073];
const IMAGE_STD: [f32; 3] = [0.26862954, 0.26130258, 0.27577711];

/// Configuration for the BLIP captioner.
#[derive(Clone, Copy, Debug)]
pub struct BlipConfig {
    /// Seed for the sampling of the generated caption.
    pub seed: u64,
    /// Sampling temperature; argmax decoding when `None` or zero.
    pub temp: Option<f64>,
    /// Nucleus sampling probability cutoff.
    pub top_p: Option<f64>,
    /// Maximum number of generated tokens per caption.
    pub sample_len: usize,
    /// Side length of the square model input.
    pub input_size: usize,
}

impl Default for BlipConfig {
    fn default() -> Self {
        Self {
            seed: 299792458,
            temp: None,
            top_p: None,
            sample_len: 60,
            input_size: 384,
        }
    }
}

/// The BLIP captioning model.
///
/// This struct contains the Salesforce BLIP model for caption generation
/// from an image.
///
/// NOTE: to run the model with Cuda, you need to pass the `--features cuda` flag to the `cargo run` command.
pub struct BlipCaptioner {
    model: BlipForConditionalGeneration,
    tokenizer: Tokenizer,
    logits_processor: LogitsProcessor,
    device: Device,
    config: BlipConfig,
    img_buf: Image<u8, 3>,
    filter: Option<ClipFilter>,
}

impl BlipCaptioner {
    /// Create a new BLIP captioner.
    ///
    /// # Arguments
    ///
    /// * `config` - The configuration for the captioner.
    pub fn new(config: BlipConfig) -> Result<Self, CaptionError> {
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

        let (model, tokenizer) = Self::load_model(&device)?;
        let img_buf = Image::from_size_val(
            ImageSize {
                width: config.input_size,
                height: config.input_size,
            },
            0u8,
        )?;

        Ok(Self {
            model,
            tokenizer,
            logits_processor: match config.temp {
                Some(temp) if temp > 0.0 => {
                    LogitsProcessor::new(config.seed, Some(temp), config.top_p)
                }
                _ => LogitsProcessor::from_sampling(config.seed, Sampling::ArgMax),
            },
            device,
            config,
            img_buf,
            filter: None,
        })
    }

    /// Attach a CLIP filter that flags captions scoring under its threshold.
    pub fn with_clip_filter(mut self, filter: ClipFilter) -> Self {
        self.filter = Some(filter);
        self
    }

    pub(crate) fn filter(&self) -> Option<&ClipFilter> {
        self.filter.as_ref()
    }

    /// Generate a caption for the whole image.
    ///
    /// # Arguments
    ///
    /// * `image` - The rgb8 image to generate a caption for with shape [H, W, 3]
    ///
    /// # Returns
    ///
    /// * `caption` - The generated caption
    pub fn caption(&mut self, image: &Image<u8, 3>) -> Result<String, CaptionError> {
        let input_size = self.config.input_size;
        self.caption_with_size(image, input_size)
    }

    /// Generate a caption from the image at half the model resolution.
    ///
    /// Half the side length means a quarter of the vision tokens, which
    /// trades caption detail for speed on large batches of prompts.
    pub fn caption_reduced(&mut self, image: &Image<u8, 3>) -> Result<String, CaptionError> {
        let input_size = self.config.input_size / 2;
        self.caption_with_size(image, input_size)
    }

    fn caption_with_size(
        &mut self,
        image: &Image<u8, 3>,
        input_size: usize,
    ) -> Result<String, CaptionError> {
        let pixel_values = self.preprocess(image, input_size)?;

        self.model.reset_kv_cache();
        let image_embeds = pixel_values.unsqueeze(0)?.apply(self.model.vision_model())?;

        let mut token_ids = vec![BOS_TOKEN_ID];
        for index in 0..self.config.sample_len {
            let context_size = if index > 0 { 1 } else { token_ids.len() };
            let start_pos = token_ids.len().saturating_sub(context_size);
            let input_ids =
                Tensor::new(&token_ids[start_pos..], &self.device)?.unsqueeze(0)?;

            let logits = self.model.text_decoder().forward(&input_ids, &image_embeds)?;
            let logits = logits.squeeze(0)?;
            let logits = logits.get(logits.dim(0)? - 1)?;

            let token = self.logits_processor.sample(&logits)?;
            if token == SEP_TOKEN_ID {
                break;
            }
            token_ids.push(token);
        }

        let caption = self.tokenizer.decode(&token_ids[1..], true)?;
        Ok(caption.trim().to_string())
    }

    // resize and normalize the image into a [3, S, S] tensor
    fn preprocess(&mut self, image: &Image<u8, 3>, input_size: usize) -> Result<Tensor, CaptionError> {
        let size = ImageSize {
            width: input_size,
            height: input_size,
        };
        if self.img_buf.size() != size {
            self.img_buf = Image::from_size_val(size, 0u8)?;
        }
        resize_fast(image, &mut self.img_buf, InterpolationMode::Bilinear)?;

        let data = Tensor::from_slice(
            self.img_buf.as_slice(),
            (input_size, input_size, 3),
            &self.device,
        )?
        .permute((2, 0, 1))?
        .to_dtype(DType::F32)?;

        let mean = Tensor::new(&IMAGE_MEAN, &self.device)?.reshape((3, 1, 1))?;
        let std = Tensor::new(&IMAGE_STD, &self.device)?.reshape((3, 1, 1))?;

        let pixel_values = (data / 255.0)?
            .broadcast_sub(&mean)?
            .broadcast_div(&std)?;

        Ok(pixel_values)
    }

    // utility function to load the model
    fn load_model(device: &Device) -> Result<(BlipForConditionalGeneration, Tokenizer), CaptionError> {
        let api = Api::new()?;
        let repo = api.repo(Repo::with_revision(
            MODEL_ID.to_string(),
            RepoType::Model,
            MODEL_REVISION.to_string(),
        ));

        let tokenizer_filename = repo.get("tokenizer.json")?;
        let weights = repo.get("model.safetensors")?;

        let tokenizer = Tokenizer::from_file(tokenizer_filename)?;

        let config = Config::image_captioning_large();
        let vb =
            unsafe { VarBuilder::from_mmaped_safetensors(&[weights], DType::F32, device)? };
        let model = BlipForConditionalGeneration::new(&config, vb)?;

        Ok((model, tokenizer))
    }
}
