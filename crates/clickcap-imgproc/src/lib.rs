#![deny(missing_docs)]
#![doc = env!("CARGO_PKG_DESCRIPTION")]

/// image cropping module.
pub mod crop;

/// binary mask geometry utilities.
pub mod mask;

/// morphological operations on binary masks.
pub mod morphology;

/// utility functions for resizing images.
pub mod resize;
