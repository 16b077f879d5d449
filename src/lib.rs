//! # omr-answers
//!
//! Infers the answers of a 40-question, A-D multiple-choice answer sheet from
//! the output of a document-analysis service (text lines, tables and selection
//! marks with their polygons).
//!
//! The library performs no image processing. It reasons over the recognized
//! geometry only:
//!
//! - [`processors`]: polygon normalization and axis-aligned geometry
//! - [`domain`]: the sheet data model, the input contract and scoring
//! - [`omr`]: orientation classification, candidate mapping, mark localization,
//!   mark-to-cell matching, the four answer strategies, fusion and gap-filling
//! - [`core`]: configuration, constants and errors
//!
//! Inference never fails. Missing geometry, ambiguous structure and
//! under-detection all degrade gracefully, and every run yields exactly 40
//! answer slots.
//!
//! ## Example
//!
//! ```rust,no_run
//! use omr_answers::domain::{AnalyzeResult, score};
//! use omr_answers::omr::AnswerSheetInferencer;
//! use omr_answers::core::InferenceConfig;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let result = AnalyzeResult::from_json_file("sheet.ocr.json")?;
//! let inferencer = AnswerSheetInferencer::new(InferenceConfig::default())?;
//! let inference = inferencer.infer_result(&result);
//!
//! println!("{}", inference.answers().concat());
//! let key = vec!["C"; 40];
//! println!("{}", score(&inference.answers(), &key));
//! # Ok(())
//! # }
//! ```

pub mod core;
pub mod domain;
pub mod omr;
pub mod processors;
pub mod utils;

pub use crate::core::{InferenceConfig, OMRError, OmrResult};
pub use crate::domain::{AnalyzeResult, Choice, SheetSnapshot};
pub use crate::omr::{AnswerSheetInferencer, AnswerSheetInferencerBuilder, SheetInference};
