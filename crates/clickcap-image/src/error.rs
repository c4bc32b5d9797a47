/// An error type for the image module.
#[derive(thiserror::Error, Debug)]
pub enum ImageError {
    /// Error when channel and shape are not valid.
    #[error("Data length ({0}) does not match the image size ({1})")]
    InvalidChannelShape(usize, usize),

    /// Error when the image size is not valid.
    #[error("Image size ({0}, {1}) does not match the expected size ({2}, {3})")]
    InvalidImageSize(usize, usize, usize, usize),

    /// Error when accessing a pixel out of bounds.
    #[error("Pixel ({0}, {1}, {2}) is out of bounds for image of size ({3}, {4})")]
    PixelIndexOutOfBounds(usize, usize, usize, usize, usize),

    /// Error when the requested crop region does not fit in the image.
    #[error("Crop region ({0}, {1}, {2}, {3}) exceeds the image bounds")]
    InvalidCropRegion(usize, usize, usize, usize),

    /// Error when casting the image data.
    #[error("Failed to cast the image data")]
    CastError,

    /// Error when the pixel types are incompatible for the operation.
    #[error("Incompatible pixel types for the operation")]
    IncompatiblePixelTypes,
}

/// An error type for the io modules.
#[derive(thiserror::Error, Debug)]
pub enum IoError {
    /// Error when the file does not exist.
    #[error("File does not exist: {0}")]
    FileDoesNotExist(std::path::PathBuf),

    /// Error to open the file.
    #[error("Failed to manipulate the file. {0}")]
    FileError(#[from] std::io::Error),

    /// Error to create the image.
    #[error("Failed to create image. {0}")]
    ImageCreationError(#[from] ImageError),

    /// Error to decode the image.
    #[error("Failed to decode the image. {0}")]
    ImageDecodeError(#[from] image::ImageError),

    /// Error to encode the PNG image.
    #[error("Failed to encode the png image. {0}")]
    PngEncodingError(String),

    /// Error to decode the PNG image.
    #[error("Failed to decode the png image. {0}")]
    PngDecodeError(String),

    /// Error when the decoded data does not match the expected channel count.
    #[error("Decoded image has {0} channels, expected {1}")]
    PngChannelMismatch(usize, usize),
}
