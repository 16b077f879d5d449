//! Error handling for the answer-sheet pipeline.

mod types;

pub use types::{OMRError, OmrResult, ProcessingStage};
