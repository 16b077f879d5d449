//! Configuration management for the answer-sheet pipeline.
//!
//! This module provides the configuration types, validation trait, and
//! defaults for the inference pipeline.

pub mod errors;
pub mod inference;

pub use errors::{ConfigError, ConfigValidator};
pub use inference::{
    GapFillingPolicy, InferenceConfig, MarkPolicy, MatcherPolicy, REFERENCE_FALLBACK_PATTERN,
    SheetLayout, StrategyPolicy,
};
