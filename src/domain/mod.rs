//! Domain types for answer-sheet inference.
//!
//! - [`sheet`]: the data model exchanged between pipeline stages
//! - [`analyze_result`]: the document-analysis input contract
//! - [`scoring`]: comparison of inferred answers with a key

pub mod analyze_result;
pub mod scoring;
pub mod sheet;

pub use analyze_result::{
    AnalyzeResult, PageSnapshot, RawBoundingRegion, RawCell, RawLine, RawPage, RawSelectionMark,
    RawTable, SelectionMark, SheetSnapshot,
};
pub use scoring::{AnswerDistribution, ScoreReport, parse_answer_key, score};
pub use sheet::{
    AnswerCandidate, AnswerSlot, Cell, Choice, ChoiceSet, Line, Mark, MarkSource, Method,
    QuestionIndex, Strategy, Table,
};
