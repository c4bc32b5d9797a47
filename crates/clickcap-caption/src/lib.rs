#![doc = env!("CARGO_PKG_DESCRIPTION")]

/// error types for the captioner.
pub mod error;

/// the BLIP captioning model.
pub mod blip;

/// region cropping and masking ahead of captioning.
pub mod region;

/// CLIP based caption filtering.
pub mod clip_filter;

pub use crate::blip::{BlipCaptioner, BlipConfig};
pub use crate::clip_filter::ClipFilter;
pub use crate::error::CaptionError;
pub use crate::region::{CropMode, RegionCaption, RegionOptions};
