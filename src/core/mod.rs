//! The core module of the answer-sheet pipeline.
//!
//! This module contains the fundamental components shared by every stage:
//! - Configuration management
//! - Constants describing the fixed question domain
//! - Error handling for the fallible edges around the inference core

pub mod config;
pub mod constants;
pub mod errors;

pub use config::{
    ConfigError, ConfigValidator, GapFillingPolicy, InferenceConfig, MarkPolicy, MatcherPolicy,
    SheetLayout, StrategyPolicy,
};
pub use constants::*;
pub use errors::{OMRError, OmrResult, ProcessingStage};
