//! Morphological operations on binary masks.
//!
//! Segmentation masks come back from the model with speckles and pinholes;
//! an open followed by a close with a small box kernel removes both.

/// Kernel (structuring element) utilities.
pub mod kernel;

/// Dilation, erosion, opening and closing.
pub mod ops;

pub use kernel::{Kernel, KernelShape};
pub use ops::{close, dilate, erode, open};
