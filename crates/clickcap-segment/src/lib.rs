#![doc = env!("CARGO_PKG_DESCRIPTION")]

/// error types for the segmenter.
pub mod error;

/// spatial prompt types and decoder encoding.
pub mod prompt;

/// image preprocessing for the SAM encoder.
pub mod preprocess;

/// the SAM segmenter sessions and embedding state.
pub mod sam;

pub use crate::error::SegmentError;
pub use crate::prompt::{BoxPrompt, PointLabel, PromptPoint, SpatialPrompt};
pub use crate::sam::{ImageEmbeddingState, MaskCandidate, SamSegmenter, SamSegmenterBuilder};
