//! # Stage Definition: Answer Strategies
//!
//! - **Inputs**: the [`CandidateMap`], the [`MarkSet`], the sheet's text lines and the [`InferenceConfig`].
//! - **Outputs**: one [`StrategyResult`] per [`Strategy`], in tie-break priority order.
//! - **Logging**: candidate counts per strategy at debug, individual candidates at trace.
//! - **Error Behavior**: infallible. A question without qualifying evidence gets no candidate.
//! - **Invariants**:
//!     - Each result holds at most one candidate per question.
//!     - Strategies never read each other's output.
//!
//! The four strategies:
//!
//! - **table complement**: exactly three letters recognized among a question's cells
//!   means the fourth was marked over.
//! - **line complement**: the same rule over free text, where a bare number opens a
//!   question and the following letters are its visible choices.
//! - **mark geometry**: the strongest mark matched inside one of the question's cells.
//! - **row crossed**: the question's cells by choice row, taken from their position in
//!   the block rather than their text; a crossed row wins, otherwise the missing-letter
//!   rule applies at a lower confidence.

use crate::core::config::{InferenceConfig, StrategyPolicy};
use crate::domain::sheet::{
    AnswerCandidate, Cell, Choice, ChoiceSet, Line, QuestionIndex, Strategy,
};
use crate::omr::candidate_map::{CandidateMap, QuestionCells};
use crate::omr::marks::MarkSet;
use crate::omr::matcher::MarkMatcher;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use std::collections::BTreeMap;

/// A bare question number, optionally followed by "." or ")".
static QUESTION_NUMBER_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(\d+)[.)]?$").expect("Invalid question number regex"));

/// Candidates produced by one strategy, keyed by question.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StrategyResult {
    pub strategy: Strategy,
    candidates: BTreeMap<QuestionIndex, AnswerCandidate>,
}

impl StrategyResult {
    pub fn new(strategy: Strategy) -> Self {
        Self {
            strategy,
            candidates: BTreeMap::new(),
        }
    }

    /// Records a candidate for `question`, replacing any previous one.
    pub fn insert(&mut self, question: QuestionIndex, choice: Choice, confidence: f32) {
        self.candidates.insert(
            question,
            AnswerCandidate::new(question, choice, confidence, self.strategy),
        );
    }

    pub fn get(&self, question: QuestionIndex) -> Option<&AnswerCandidate> {
        self.candidates.get(&question)
    }

    pub fn len(&self) -> usize {
        self.candidates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.candidates.is_empty()
    }

    /// Candidates in ascending question order.
    pub fn iter(&self) -> impl Iterator<Item = &AnswerCandidate> + '_ {
        self.candidates.values()
    }
}

/// Runs the four strategies over one sheet.
#[derive(Debug, Clone, Copy)]
pub struct StrategyEngine<'a> {
    config: &'a InferenceConfig,
}

impl<'a> StrategyEngine<'a> {
    pub fn new(config: &'a InferenceConfig) -> Self {
        Self { config }
    }

    fn policy(&self) -> &StrategyPolicy {
        &self.config.strategies
    }

    fn matcher(&self) -> MarkMatcher<'a> {
        MarkMatcher::new(&self.config.matcher)
    }

    /// Runs every strategy; results come back in [`Strategy::BY_PRIORITY`] order.
    pub fn run<'l, L>(&self, map: &CandidateMap, marks: &MarkSet, lines: L) -> Vec<StrategyResult>
    where
        L: IntoIterator<Item = &'l Line>,
    {
        let results = vec![
            self.mark_geometry(map, marks),
            self.table_complement(map),
            self.row_crossed(map, marks),
            self.line_complement(lines),
        ];

        for result in &results {
            tracing::debug!(
                target: "answer_sheet",
                strategy = ?result.strategy,
                candidates = result.len(),
                "strategy finished"
            );
        }
        results
    }

    /// Missing-letter rule over each question's mapped cells.
    pub fn table_complement(&self, map: &CandidateMap) -> StrategyResult {
        let mut result = StrategyResult::new(Strategy::TableComplement);
        for (question, _) in map.iter() {
            let letters = map.letters(question);
            if let Some(choice) = letters.single_missing() {
                tracing::trace!(
                    target: "answer_sheet",
                    question = question.get(),
                    visible = %letters,
                    %choice,
                    "table complement"
                );
                result.insert(question, choice, self.policy().table_complement_confidence);
            }
        }
        result
    }

    /// Missing-letter rule over free text lines.
    ///
    /// Only lines reading as a question number or a single choice letter take
    /// part; everything else on the sheet is skipped.
    pub fn line_complement<'l, L>(&self, lines: L) -> StrategyResult
    where
        L: IntoIterator<Item = &'l Line>,
    {
        let tokens: Vec<LineToken> = lines
            .into_iter()
            .filter_map(|line| LineToken::parse(&line.text))
            .collect();

        let mut result = StrategyResult::new(Strategy::LineComplement);
        let window = self.policy().line_choice_window;
        let mut i = 0;
        while i < tokens.len() {
            let LineToken::Number(number) = tokens[i] else {
                i += 1;
                continue;
            };

            let mut visible = ChoiceSet::new();
            let mut j = i + 1;
            while j < tokens.len() && j - i <= window {
                match tokens[j] {
                    LineToken::Letter(choice) => visible.insert(choice),
                    LineToken::Number(_) => break,
                }
                j += 1;
            }

            if let (Some(question), Some(choice)) =
                (QuestionIndex::new(number), visible.single_missing())
            {
                tracing::trace!(
                    target: "answer_sheet",
                    question = question.get(),
                    visible = %visible,
                    %choice,
                    "line complement"
                );
                result.insert(question, choice, self.policy().line_complement_confidence);
            }
            i = j;
        }
        result
    }

    /// Strongest mark matched inside any of a question's cells.
    ///
    /// Choices are visited A to D and marks in collection order; only a
    /// strictly stronger match replaces the current best.
    pub fn mark_geometry(&self, map: &CandidateMap, marks: &MarkSet) -> StrategyResult {
        let mut result = StrategyResult::new(Strategy::MarkGeometry);
        if marks.is_empty() {
            return result;
        }
        for (question, cells) in map.iter() {
            if let Some((choice, confidence)) = self.strongest_match(cells, marks) {
                tracing::trace!(
                    target: "answer_sheet",
                    question = question.get(),
                    %choice,
                    confidence,
                    "mark geometry"
                );
                result.insert(question, choice, confidence);
            }
        }
        result
    }

    /// Rows of a question are its choices A..D by position, so a misread
    /// letter does not move a cell to another choice. A crossed row wins
    /// outright, the strongest one when several are crossed and the earlier
    /// row on ties; otherwise three or more letters read across the rows fall
    /// back to the missing-letter rule.
    pub fn row_crossed(&self, map: &CandidateMap, marks: &MarkSet) -> StrategyResult {
        let mut result = StrategyResult::new(Strategy::RowCrossed);
        for (question, rows) in map.iter_rows() {
            if let Some((choice, confidence)) = self.strongest_match(rows, marks) {
                tracing::trace!(
                    target: "answer_sheet",
                    question = question.get(),
                    %choice,
                    confidence,
                    "crossed row"
                );
                result.insert(question, choice, confidence);
                continue;
            }

            let letters: ChoiceSet = rows.values().filter_map(Cell::choice).collect();
            if letters.len() >= 3 {
                if let Some(choice) = letters.single_missing() {
                    result.insert(
                        question,
                        choice,
                        self.policy().row_crossed_complement_confidence,
                    );
                }
            }
        }
        result
    }

    fn strongest_match(&self, cells: &QuestionCells, marks: &MarkSet) -> Option<(Choice, f32)> {
        let matcher = self.matcher();
        let mut best: Option<(Choice, f32)> = None;
        for choice in Choice::ALL {
            let Some(cell) = cells.get(&choice) else {
                continue;
            };
            for mark in marks.iter() {
                let outcome = matcher.match_mark(mark, &cell.polygon);
                if !outcome.is_inside {
                    continue;
                }
                if best.is_none_or(|(_, confidence)| outcome.confidence > confidence) {
                    best = Some((choice, outcome.confidence));
                }
            }
        }
        best
    }
}

/// A text line that matters to the line complement strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LineToken {
    Number(usize),
    Letter(Choice),
}

impl LineToken {
    fn parse(text: &str) -> Option<Self> {
        let text = text.trim();
        if let Some(captures) = QUESTION_NUMBER_REGEX.captures(text) {
            return captures
                .get(1)
                .and_then(|m| m.as_str().parse().ok())
                .map(LineToken::Number);
        }
        Choice::from_label(text).map(LineToken::Letter)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::config::SheetLayout;
    use crate::domain::sheet::{Mark, MarkSource, Table};
    use crate::omr::fusion::fuse;
    use crate::processors::Polygon;

    fn q(n: usize) -> QuestionIndex {
        QuestionIndex::new(n).unwrap()
    }

    fn line(text: &str) -> Line {
        Line::new(text, Polygon::empty())
    }

    /// Horizontal layout, one question per row, each cell 10 units wide.
    /// Enough rows are emitted to avoid positional grouping.
    fn horizontal_map(rows: &[&[&str]]) -> CandidateMap {
        let mut cells = Vec::new();
        for (r, letters) in rows.iter().enumerate() {
            for (c, letter) in letters.iter().enumerate() {
                let x = c as f32 * 10.0;
                let y = r as f32 * 10.0;
                cells.push(Cell::new(
                    *letter,
                    r,
                    c,
                    Polygon::from_coords(x, y, x + 10.0, y + 10.0),
                ));
            }
        }
        let table = Table {
            row_count: rows.len(),
            column_count: 4,
            cells,
        };
        let layout = SheetLayout {
            min_mapped_questions: 1,
            ..SheetLayout::default()
        };
        CandidateMap::build(&[table], &layout)
    }

    fn explicit_mark(x: f32, y: f32, confidence: f32) -> Mark {
        Mark::new(
            Polygon::from_coords(x - 1.0, y - 1.0, x + 1.0, y + 1.0),
            1,
            confidence,
            MarkSource::Explicit,
        )
    }

    #[test]
    fn test_table_complement() {
        let map = horizontal_map(&[&["A", "B", "C", "D"], &["A", "B", "D"], &["A", "B", "C"]]);
        let config = InferenceConfig::default();
        let result = StrategyEngine::new(&config).table_complement(&map);
        assert!(result.get(q(1)).is_none());
        assert_eq!(result.get(q(2)).map(|c| c.choice), Some(Choice::C));
        assert_eq!(result.get(q(3)).map(|c| c.choice), Some(Choice::D));
        assert_eq!(result.get(q(2)).map(|c| c.confidence), Some(0.6));
    }

    #[test]
    fn test_line_complement() {
        let lines = vec![
            line("Answer sheet"),
            line("1."),
            line("A"),
            line("B"),
            line("D"),
            line("2)"),
            line("A"),
            line("B"),
            line("3"),
            line("b"),
            line("noise"),
            line("c"),
            line("d"),
            line("41"),
            line("A"),
            line("B"),
            line("C"),
        ];
        let config = InferenceConfig::default();
        let result = StrategyEngine::new(&config).line_complement(&lines);
        assert_eq!(result.get(q(1)).map(|c| c.choice), Some(Choice::C));
        // Only two letters before the next number.
        assert!(result.get(q(2)).is_none());
        // Non-letter lines are skipped, not counted against the window.
        assert_eq!(result.get(q(3)).map(|c| c.choice), Some(Choice::A));
        assert_eq!(result.len(), 2);
    }

    #[test]
    fn test_line_choice_window_is_bounded() {
        let lines = vec![line("5"), line("A"), line("B"), line("C"), line("D")];
        let config = InferenceConfig::default();
        let result = StrategyEngine::new(&config).line_complement(&lines);
        // The window stops after three letters, so D is never seen.
        assert_eq!(result.get(q(5)).map(|c| c.choice), Some(Choice::D));
    }

    #[test]
    fn test_mark_geometry_picks_strongest_match() {
        let map = horizontal_map(&[&["A", "B", "C", "D"], &["A", "B", "C", "D"]]);
        let marks = MarkSet::new(vec![
            // Weak mark on q1 B, strong mark on q1 D.
            explicit_mark(15.0, 5.0, 0.4),
            explicit_mark(35.0, 5.0, 0.9),
            // Nothing lands on question 2.
            explicit_mark(500.0, 500.0, 1.0),
        ]);
        let config = InferenceConfig::default();
        let result = StrategyEngine::new(&config).mark_geometry(&map, &marks);
        let q1 = result.get(q(1)).unwrap();
        assert_eq!(q1.choice, Choice::D);
        // 0.2 explicit + 0.2 * 0.9 + 0.4 centrality
        assert!((q1.confidence - 0.78).abs() < 1e-5);
        assert!(result.get(q(2)).is_none());
    }

    #[test]
    fn test_mark_geometry_tie_prefers_earlier_choice() {
        let map = horizontal_map(&[&["A", "B", "C", "D"]]);
        let marks = MarkSet::new(vec![
            explicit_mark(25.0, 5.0, 0.5),
            explicit_mark(5.0, 5.0, 0.5),
        ]);
        let config = InferenceConfig::default();
        let result = StrategyEngine::new(&config).mark_geometry(&map, &marks);
        assert_eq!(result.get(q(1)).map(|c| c.choice), Some(Choice::A));
    }

    #[test]
    fn test_row_crossed_prefers_crossed_row_then_complement() {
        let map = horizontal_map(&[&["A", "B", "C", "D"], &["A", "C", "D"], &["A", "B"]]);
        let marks = MarkSet::new(vec![explicit_mark(25.0, 5.0, 0.5)]);
        let config = InferenceConfig::default();
        let result = StrategyEngine::new(&config).row_crossed(&map, &marks);
        assert_eq!(result.get(q(1)).map(|c| c.choice), Some(Choice::C));
        let q2 = result.get(q(2)).unwrap();
        assert_eq!(q2.choice, Choice::B);
        assert_eq!(q2.confidence, 0.5);
        assert!(result.get(q(3)).is_none());
    }

    #[test]
    fn test_row_crossed_reads_choice_from_position() {
        // Question 2's B cell was read as "A", so its A cell is shadowed in
        // the letter map and the mark on it is invisible to mark geometry.
        let map = horizontal_map(&[&["A", "B", "C", "D"], &["A", "A", "C", "D"]]);
        let marks = MarkSet::new(vec![explicit_mark(5.0, 15.0, 0.9)]);
        let config = InferenceConfig::default();
        let engine = StrategyEngine::new(&config);

        assert!(engine.mark_geometry(&map, &marks).get(q(2)).is_none());
        assert_eq!(
            engine.table_complement(&map).get(q(2)).map(|c| c.choice),
            Some(Choice::B)
        );
        let crossed = engine.row_crossed(&map, &marks);
        let q2 = crossed.get(q(2)).unwrap();
        assert_eq!(q2.choice, Choice::A);
        assert!((q2.confidence - 0.78).abs() < 1e-5);

        let lines: Vec<Line> = Vec::new();
        let all = engine.run(&map, &marks, &lines);
        let without_rows: Vec<StrategyResult> = all
            .iter()
            .filter(|r| r.strategy != Strategy::RowCrossed)
            .cloned()
            .collect();
        assert_eq!(fuse(&all).slots[1].choice, Some(Choice::A));
        assert_eq!(fuse(&without_rows).slots[1].choice, Some(Choice::B));
    }

    #[test]
    fn test_row_crossed_complement_uses_row_letters() {
        // A stray "D" sits in a fifth column, outside the choice rows. The
        // letter map sees all four letters; the rows only see {A, B, C}.
        let map = horizontal_map(&[&["A", "B", "C", "A", "D"]]);
        let config = InferenceConfig::default();
        let engine = StrategyEngine::new(&config);
        assert!(engine.table_complement(&map).is_empty());
        let result = engine.row_crossed(&map, &MarkSet::default());
        let q1 = result.get(q(1)).unwrap();
        assert_eq!(q1.choice, Choice::D);
        assert_eq!(q1.confidence, 0.5);
    }

    #[test]
    fn test_run_returns_priority_order() {
        let map = CandidateMap::empty();
        let config = InferenceConfig::default();
        let lines = vec![line("7"), line("A"), line("C"), line("D")];
        let results = StrategyEngine::new(&config).run(&map, &MarkSet::default(), &lines);
        let order: Vec<Strategy> = results.iter().map(|r| r.strategy).collect();
        assert_eq!(order, Strategy::BY_PRIORITY.to_vec());
        assert_eq!(results[3].get(q(7)).map(|c| c.choice), Some(Choice::B));
        assert!(results[..3].iter().all(StrategyResult::is_empty));
    }
}
