/// An error type for the captioner module.
#[derive(thiserror::Error, Debug)]
pub enum CaptionError {
    #[error(transparent)]
    FailedToLoadModel(#[from] hf_hub::api::sync::ApiError),

    #[error(transparent)]
    CandleError(#[from] candle_core::Error),

    #[error(transparent)]
    ImageError(#[from] clickcap_image::ImageError),

    #[error(transparent)]
    ImageIoError(#[from] clickcap_image::IoError),

    #[error(transparent)]
    TokenizerError(#[from] tokenizers::Error),

    #[error(transparent)]
    IoError(#[from] std::io::Error),

    #[error("Mask has no foreground pixels")]
    EmptyMask,
}
