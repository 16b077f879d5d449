//! # Stage Definition: Answer Sheet Inference
//!
//! This service is considered "Done" when it fulfills the following contract:
//!
//! - **Inputs**: an immutable [`SheetSnapshot`] and a validated [`InferenceConfig`].
//! - **Outputs**: a [`SheetInference`] with exactly one slot per question plus per-question traces.
//! - **Logging**: per-phase results at debug, per-question decisions at trace, one summary line at info.
//! - **Error Behavior**: `infer` never fails. Only building an inferencer from an invalid configuration does.
//! - **Invariants**:
//!     - Phases run in a fixed order: candidate mapping, mark collection, strategies, fusion, gap-filling.
//!     - Fusion and gap-filling each run exactly once.
//!     - The same snapshot always produces the same output.

use crate::core::config::{
    ConfigValidator, GapFillingPolicy, InferenceConfig, MarkPolicy, MatcherPolicy, SheetLayout,
    StrategyPolicy,
};
use crate::core::constants::QUESTION_COUNT;
use crate::core::errors::OmrResult;
use crate::domain::analyze_result::{AnalyzeResult, SheetSnapshot};
use crate::domain::sheet::{Choice, QuestionIndex};
use crate::omr::candidate_map::CandidateMap;
use crate::omr::fusion::{GapFiller, fuse};
use crate::omr::marks::MarkSet;
use crate::omr::result::{QuestionTrace, SheetInference};
use crate::omr::strategies::StrategyEngine;

/// Builder for [`AnswerSheetInferencer`].
///
/// # Example
///
/// ```rust
/// use omr_answers::core::SheetLayout;
/// use omr_answers::domain::SheetSnapshot;
/// use omr_answers::omr::AnswerSheetInferencerBuilder;
///
/// let inferencer = AnswerSheetInferencerBuilder::new()
///     .layout(SheetLayout::default())
///     .build()
///     .expect("default configuration is valid");
///
/// let result = inferencer.infer(&SheetSnapshot::default());
/// assert_eq!(result.answers().len(), 40);
/// ```
#[derive(Debug, Clone, Default)]
pub struct AnswerSheetInferencerBuilder {
    config: InferenceConfig,
}

impl AnswerSheetInferencerBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts from a complete configuration.
    pub fn config(mut self, config: InferenceConfig) -> Self {
        self.config = config;
        self
    }

    pub fn layout(mut self, layout: SheetLayout) -> Self {
        self.config = self.config.with_layout(layout);
        self
    }

    pub fn marks(mut self, marks: MarkPolicy) -> Self {
        self.config = self.config.with_marks(marks);
        self
    }

    pub fn matcher(mut self, matcher: MatcherPolicy) -> Self {
        self.config = self.config.with_matcher(matcher);
        self
    }

    pub fn strategies(mut self, strategies: StrategyPolicy) -> Self {
        self.config = self.config.with_strategies(strategies);
        self
    }

    pub fn gap_filling(mut self, gap_filling: GapFillingPolicy) -> Self {
        self.config = self.config.with_gap_filling(gap_filling);
        self
    }

    /// Replaces the last-resort answer pattern.
    pub fn fallback_pattern(mut self, pattern: Vec<Choice>) -> Self {
        self.config.gap_filling = self.config.gap_filling.with_fallback_pattern(pattern);
        self
    }

    /// Validates the configuration and builds the inferencer.
    pub fn build(self) -> OmrResult<AnswerSheetInferencer> {
        AnswerSheetInferencer::new(self.config)
    }
}

/// Infers the answers of one sheet from document-analysis output.
#[derive(Debug, Clone)]
pub struct AnswerSheetInferencer {
    config: InferenceConfig,
}

impl AnswerSheetInferencer {
    /// Creates an inferencer, rejecting invalid configurations.
    pub fn new(config: InferenceConfig) -> OmrResult<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &InferenceConfig {
        &self.config
    }

    /// Normalizes a raw analysis result and runs inference on it.
    pub fn infer_result(&self, result: &AnalyzeResult) -> SheetInference {
        self.infer(&result.to_snapshot())
    }

    /// Runs every phase over `snapshot`.
    pub fn infer(&self, snapshot: &SheetSnapshot) -> SheetInference {
        let map = CandidateMap::build(&snapshot.tables, &self.config.layout);
        let marks = MarkSet::collect(snapshot, &self.config.marks);
        let results = StrategyEngine::new(&self.config).run(&map, &marks, snapshot.lines());

        let fused = fuse(&results);
        let mut slots = fused.slots.clone();
        let gap_filling = GapFiller::new(&self.config.gap_filling).fill(&mut slots);

        let traces: Vec<QuestionTrace> = QuestionIndex::all()
            .map(|question| QuestionTrace {
                question,
                // Results are already in priority order.
                candidates: results
                    .iter()
                    .filter_map(|r| r.get(question))
                    .copied()
                    .collect(),
                fused: fused.winners[question.slot()],
                slot: slots[question.slot()],
            })
            .collect();

        let inference = SheetInference {
            slots,
            traces,
            orientation: map.orientation(),
            mapped_questions: map.question_count(),
            used_positional_fallback: map.used_positional_fallback,
            mark_counts: marks.counts(),
            gap_filling,
        };

        tracing::info!(
            target: "answer_sheet",
            orientation = ?inference.orientation,
            mapped_questions = inference.mapped_questions,
            marks = marks.len(),
            fused = QUESTION_COUNT - fused.unresolved_count(),
            neighbor = gap_filling.neighbor,
            fallback = gap_filling.fallback,
            unresolved = inference.unresolved_count(),
            "answer sheet inferred"
        );
        inference
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::sheet::Method;
    use crate::omr::orientation::Orientation;
    use serde_json::{Value, json};

    const CELL_WIDTH: f64 = 50.0;
    const CELL_HEIGHT: f64 = 20.0;

    fn rect(x: f64, y: f64, w: f64, h: f64) -> Value {
        json!([x, y, x + w, y, x + w, y + h, x, y + h])
    }

    /// A grid answer table: five bands of five rows by eight columns. Choice
    /// rows 0..4 of every band read `(row + column) % 4` so both rows and
    /// columns carry all four letters. Cells listed in `omit` are left out.
    fn grid_table(omit: &[(usize, usize)]) -> Value {
        let mut cells = Vec::new();
        for band in 0..5 {
            for row_in_band in 0..4 {
                for column in 0..8 {
                    let row = band * 5 + row_in_band;
                    if omit.contains(&(row, column)) {
                        continue;
                    }
                    let letter = ["A", "B", "C", "D"][(row_in_band + column) % 4];
                    cells.push(json!({
                        "content": letter,
                        "rowIndex": row,
                        "columnIndex": column,
                        "boundingRegions": [{
                            "pageNumber": 1,
                            "polygon": rect(
                                column as f64 * CELL_WIDTH,
                                row as f64 * CELL_HEIGHT,
                                CELL_WIDTH,
                                CELL_HEIGHT
                            )
                        }]
                    }));
                }
            }
        }
        json!({ "rowCount": 25, "columnCount": 8, "cells": cells })
    }

    fn snapshot(value: Value) -> SheetSnapshot {
        serde_json::from_value::<AnalyzeResult>(value)
            .unwrap()
            .to_snapshot()
    }

    fn inferencer() -> AnswerSheetInferencer {
        AnswerSheetInferencer::new(InferenceConfig::default()).unwrap()
    }

    fn assert_well_formed(result: &SheetInference) {
        let answers = result.answers();
        assert_eq!(answers.len(), QUESTION_COUNT);
        assert!(answers
            .iter()
            .all(|a| ["A", "B", "C", "D", "-"].contains(&a.as_str())));
        assert_eq!(result.traces.len(), QUESTION_COUNT);
        assert_eq!(result.confidences().len(), QUESTION_COUNT);
        assert_eq!(result.methods().len(), QUESTION_COUNT);
    }

    #[test]
    fn test_grid_missing_letter_resolves_question_five() {
        // Question 5 is band 0, column 4; its D cell sits at row 3.
        let sheet = snapshot(json!({
            "pages": [{ "pageNumber": 1, "lines": [] }],
            "tables": [grid_table(&[(3, 4)])]
        }));
        let result = inferencer().infer(&sheet);
        assert_well_formed(&result);

        assert_eq!(result.orientation, Some(Orientation::Grid));
        assert_eq!(result.mapped_questions, 40);
        assert!(!result.used_positional_fallback);

        let q5 = &result.slots[4];
        assert_eq!(q5.choice, Some(Choice::D));
        assert_eq!(q5.method, Some(Method::TableComplement));
        assert!((q5.confidence - 0.6).abs() < 1e-6);

        // The row-crossed complement agreed at lower confidence.
        let trace = &result.traces[4];
        assert_eq!(trace.candidates.len(), 2);
        assert_eq!(trace.fused.map(|c| c.choice), Some(Choice::D));

        // Everything else was unresolved after fusion, so gap-filling ran.
        assert!(result.gap_filling_applied());
        assert!(result.slots.iter().all(|s| s.is_resolved()));
        assert_eq!(result.slots[5].method, Some(Method::Neighbor));
        assert_eq!(result.slots[5].choice, Some(Choice::D));
    }

    #[test]
    fn test_geometric_evidence_beats_complement() {
        // A selected mark centred on question 5's B cell (row 1, column 4).
        let sheet = snapshot(json!({
            "pages": [{
                "pageNumber": 1,
                "lines": [],
                "selectionMarks": [{
                    "state": "selected",
                    "confidence": 0.9,
                    "polygon": rect(220.0, 25.0, 10.0, 10.0)
                }]
            }],
            "tables": [grid_table(&[(3, 4)])]
        }));
        let result = inferencer().infer(&sheet);
        let q5 = &result.slots[4];
        assert_eq!(q5.choice, Some(Choice::B));
        assert_eq!(q5.method, Some(Method::MarkGeometry));
        assert_eq!(result.mark_counts.explicit, 1);
    }

    #[test]
    fn test_disabled_gap_filling_keeps_unresolved() {
        let config = InferenceConfig::default().with_gap_filling(GapFillingPolicy {
            enabled: false,
            ..GapFillingPolicy::default()
        });
        let sheet = snapshot(json!({ "tables": [grid_table(&[(3, 4)])] }));
        let result = AnswerSheetInferencer::new(config).unwrap().infer(&sheet);
        assert_well_formed(&result);
        assert!(!result.gap_filling_applied());
        assert_eq!(result.answers()[4], "D");
        assert_eq!(result.unresolved_count(), 39);
    }

    #[test]
    fn test_text_only_sheet_uses_line_complement() {
        let sheet = snapshot(json!({
            "pages": [{
                "pageNumber": 1,
                "lines": [
                    { "content": "1." },
                    { "content": "A" },
                    { "content": "B" },
                    { "content": "D" }
                ]
            }]
        }));
        let result = inferencer().infer(&sheet);
        assert_well_formed(&result);
        assert_eq!(result.orientation, None);
        assert_eq!(result.slots[0].choice, Some(Choice::C));
        assert_eq!(result.slots[0].method, Some(Method::LineComplement));
        // Questions 2..4 borrow question 1's letter, the rest fall back.
        assert_eq!(result.slots[3].method, Some(Method::Neighbor));
        assert_eq!(result.slots[4].method, Some(Method::Fallback));
    }

    #[test]
    fn test_empty_input_is_fully_patched_and_repeatable() {
        let inferencer = inferencer();
        let first = inferencer.infer(&SheetSnapshot::default());
        assert_well_formed(&first);
        assert_eq!(
            first.answers().concat(),
            crate::core::config::REFERENCE_FALLBACK_PATTERN
        );
        assert_eq!(first.summary().methods.get(&Method::Fallback), Some(&40));

        let second = inferencer.infer(&SheetSnapshot::default());
        assert_eq!(first, second);
    }

    #[test]
    fn test_invalid_config_is_rejected() {
        let err = AnswerSheetInferencerBuilder::new()
            .fallback_pattern(vec![Choice::A; 3])
            .build()
            .unwrap_err();
        assert!(err.to_string().contains("fallback_pattern"));
    }
}
