/// An error type for the segmenter module.
#[derive(thiserror::Error, Debug)]
pub enum SegmentError {
    /// Error when the ORT dylib path is not set.
    #[error("ORT_DYLIB_PATH is not set: {0}")]
    OrtDylibError(String),

    /// Error from the ONNX runtime.
    #[error(transparent)]
    OrtError(#[from] ort::Error),

    /// Error from the image module.
    #[error(transparent)]
    ImageError(#[from] clickcap_image::ImageError),

    /// Error when segmenting without a cached image embedding.
    #[error("No image is set; call set_image or inject an embedding state first")]
    NoImageSet,

    /// Error when the prompt carries neither points nor a box.
    #[error("Spatial prompt is empty")]
    EmptyPrompt,

    /// Error when the model returns a tensor of unexpected shape.
    #[error("Unexpected model output: {0}")]
    UnexpectedOutput(String),
}
