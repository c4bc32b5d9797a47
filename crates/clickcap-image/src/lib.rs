#![doc = env!("CARGO_PKG_DESCRIPTION")]

/// image container types.
pub mod image;

/// error types for the image module.
pub mod error;

/// functions to read and write PNG images.
pub mod png;

/// functions to read images of any supported format.
pub mod functional;

pub use crate::error::{ImageError, IoError};
pub use crate::image::{Image, ImageSize};
