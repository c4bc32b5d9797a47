#![doc = env!("CARGO_PKG_DESCRIPTION")]

/// error types for the refiner.
pub mod error;

/// style controls for caption rewriting.
pub mod controls;

/// the blocking chat completion client.
pub mod refiner;

/// Wikipedia knowledge lookup.
pub mod wiki;

pub use crate::controls::{Controls, Sentiment};
pub use crate::error::RefineError;
pub use crate::refiner::{RefinedCaption, RefinerConfig, TextRefiner};
