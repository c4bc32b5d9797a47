/// An error type for the pipeline module.
#[derive(thiserror::Error, Debug)]
pub enum PipelineError {
    /// Error from the segmenter.
    #[error(transparent)]
    SegmentError(#[from] clickcap_segment::SegmentError),

    /// Error from the captioner.
    #[error(transparent)]
    CaptionError(#[from] clickcap_caption::CaptionError),

    /// Error from the refiner.
    #[error(transparent)]
    RefineError(#[from] clickcap_refine::RefineError),

    /// Error from the image module.
    #[error(transparent)]
    ImageError(#[from] clickcap_image::ImageError),

    /// Error from the image io modules.
    #[error(transparent)]
    ImageIoError(#[from] clickcap_image::IoError),

    /// Error manipulating result files.
    #[error(transparent)]
    FileError(#[from] std::io::Error),

    /// Error when the segmenter returns no mask candidate.
    #[error("Segmenter returned no mask candidates")]
    NoMask,
}
