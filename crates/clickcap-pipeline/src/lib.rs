#![doc = env!("CARGO_PKG_DESCRIPTION")]

/// error types for the pipeline.
pub mod error;

/// adapter traits the pipeline orchestrates.
pub mod model;

/// pipeline configuration.
pub mod config;

/// the caption pipeline itself.
pub mod pipeline;

pub use crate::config::{InferenceOptions, PipelineConfig};
pub use crate::error::PipelineError;
pub use crate::model::{CaptionModel, RefineModel, SegmentModel};
pub use crate::pipeline::{CaptionPipeline, InferenceOutput};
