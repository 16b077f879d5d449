//! Answer inference over document-analysis output.
//!
//! The pipeline runs these phases in order:
//!
//! 1. [`candidate_map`]: pick the answer table, classify its [`orientation`], map cells to questions
//! 2. [`marks`]: collect candidate marks from three channels
//! 3. [`strategies`]: four independent strategies, scoring marks with the [`matcher`]
//! 4. [`fusion`]: pick one candidate per question, then fill gaps
//!
//! [`AnswerSheetInferencer`] ties them together and returns a [`SheetInference`].

pub mod candidate_map;
pub mod fusion;
pub mod marks;
pub mod matcher;
pub mod orientation;
pub mod pipeline;
pub mod result;
pub mod strategies;

pub use candidate_map::{CandidateMap, QuestionCells, question_for, select_answer_table};
pub use fusion::{FusionResult, GapFiller, GapFillingOutcome, fuse, select_winner};
pub use marks::{MarkCounts, MarkSet};
pub use matcher::{MarkMatcher, MatchOutcome};
pub use orientation::{Orientation, TableClassification, classify};
pub use pipeline::{AnswerSheetInferencer, AnswerSheetInferencerBuilder};
pub use result::{ConfidenceHistogram, InferenceSummary, QuestionTrace, SheetInference};
pub use strategies::{StrategyEngine, StrategyResult};
