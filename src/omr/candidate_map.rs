//! # Stage Definition: Candidate Mapping
//!
//! - **Inputs**: the tables of a [`SheetSnapshot`](crate::domain::SheetSnapshot) and the [`SheetLayout`].
//! - **Outputs**: a [`CandidateMap`] from question to `{choice -> cell}`, keyed both by the
//!   letter a cell shows and by the choice row its position implies.
//! - **Logging**: the selected table, its orientation, and whether positional grouping replaced the structural mapping.
//! - **Error Behavior**: infallible. No usable table yields an empty map.
//! - **Invariants**:
//!     - Only questions in `1..=40` are ever stored.
//!     - Cells are applied in row-major order, so a later duplicate for the same
//!       `(question, choice)` deterministically replaces an earlier one.

use crate::core::config::SheetLayout;
use crate::core::constants::CHOICE_COUNT;
use crate::domain::sheet::{Cell, Choice, ChoiceSet, QuestionIndex, Table};
use crate::omr::orientation::{Orientation, TableClassification, classify};
use serde::Serialize;
use std::collections::BTreeMap;

/// Cells of one question keyed by a choice: the letter they show, or the
/// choice row they occupy.
pub type QuestionCells = BTreeMap<Choice, Cell>;

/// Mapping from question to the choice-letter cells recognized for it.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CandidateMap {
    entries: BTreeMap<QuestionIndex, QuestionCells>,
    rows: BTreeMap<QuestionIndex, QuestionCells>,
    /// Index of the table the map was built from.
    pub table_index: Option<usize>,
    pub classification: Option<TableClassification>,
    pub used_positional_fallback: bool,
}

impl CandidateMap {
    /// An empty map, used when no answer table exists.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Selects the answer table and maps its cells to questions.
    pub fn build(tables: &[Table], layout: &SheetLayout) -> Self {
        let Some((table_index, table)) = select_answer_table(tables, layout) else {
            tracing::warn!(
                target: "answer_sheet",
                tables = tables.len(),
                "no table contains choice letters; table-based strategies will abstain"
            );
            return Self::empty();
        };

        let cells = sorted_choice_cells(table);
        let classification = classify(cells.iter().copied());
        let orientation = classification.orientation;

        let mut entries: BTreeMap<QuestionIndex, QuestionCells> = BTreeMap::new();
        let mut rows: BTreeMap<QuestionIndex, QuestionCells> = BTreeMap::new();
        for cell in &cells {
            let (Some(choice), Some(question)) = (
                cell.choice(),
                question_for(orientation, cell.row_index, cell.column_index, layout),
            ) else {
                continue;
            };
            entries
                .entry(question)
                .or_default()
                .insert(choice, (*cell).clone());
            if let Some(row) = choice_row(orientation, cell.row_index, cell.column_index, layout) {
                rows.entry(question)
                    .or_default()
                    .insert(row, (*cell).clone());
            }
        }

        let mut used_positional_fallback = false;
        if entries.len() < layout.min_mapped_questions {
            tracing::warn!(
                target: "answer_sheet",
                %orientation,
                mapped = entries.len(),
                required = layout.min_mapped_questions,
                "structural mapping too sparse; grouping cells positionally"
            );
            (entries, rows) = positional_grouping(&cells);
            used_positional_fallback = true;
        }

        tracing::debug!(
            target: "answer_sheet",
            table_index,
            rows = table.row_count,
            columns = table.column_count,
            choice_cells = cells.len(),
            %orientation,
            mapped_questions = entries.len(),
            used_positional_fallback,
            "built candidate map"
        );

        Self {
            entries,
            rows,
            table_index: Some(table_index),
            classification: Some(classification),
            used_positional_fallback,
        }
    }

    pub fn orientation(&self) -> Option<Orientation> {
        self.classification.as_ref().map(|c| c.orientation)
    }

    /// Number of questions with at least one mapped cell.
    pub fn question_count(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn cells(&self, question: QuestionIndex) -> Option<&QuestionCells> {
        self.entries.get(&question)
    }

    /// Distinct letters recognized for `question`.
    pub fn letters(&self, question: QuestionIndex) -> ChoiceSet {
        self.entries
            .get(&question)
            .map(|cells| cells.keys().copied().collect())
            .unwrap_or_default()
    }

    /// Questions in ascending order with their cells.
    pub fn iter(&self) -> impl Iterator<Item = (QuestionIndex, &QuestionCells)> + '_ {
        self.entries.iter().map(|(q, cells)| (*q, cells))
    }

    /// Cells of `question` keyed by the choice row they sit in, whatever letter
    /// was recognized in them.
    pub fn rows(&self, question: QuestionIndex) -> Option<&QuestionCells> {
        self.rows.get(&question)
    }

    /// Questions in ascending order with their choice rows.
    pub fn iter_rows(&self) -> impl Iterator<Item = (QuestionIndex, &QuestionCells)> + '_ {
        self.rows.iter().map(|(q, cells)| (*q, cells))
    }
}

/// Picks the table holding the answer grid.
///
/// Among tables with at least one choice-letter cell, the first one with the
/// preferred column count wins; otherwise the one with the most slots, the
/// earliest on ties.
pub fn select_answer_table<'a>(
    tables: &'a [Table],
    layout: &SheetLayout,
) -> Option<(usize, &'a Table)> {
    let candidates: Vec<(usize, &Table)> = tables
        .iter()
        .enumerate()
        .filter(|(_, t)| t.choice_cell_count() > 0)
        .collect();

    if let Some(preferred) = candidates
        .iter()
        .find(|(_, t)| t.column_count == layout.preferred_table_columns)
    {
        return Some(*preferred);
    }

    candidates
        .into_iter()
        .rev()
        .max_by_key(|(_, t)| t.row_count.saturating_mul(t.column_count))
}

/// Question shown by the cell at `(row, column)` under `orientation`.
///
/// Returns `None` when the formula lands outside the question domain.
pub fn question_for(
    orientation: Orientation,
    row: usize,
    column: usize,
    layout: &SheetLayout,
) -> Option<QuestionIndex> {
    let number = match orientation {
        Orientation::Vertical => (row / layout.rows_per_block.max(1))
            .checked_add(1)?
            .checked_add(column.checked_mul(layout.questions_per_column)?)?,
        Orientation::Horizontal => row.checked_add(1)?,
        Orientation::Grid => (row / layout.grid_row_band.max(1))
            .checked_mul(layout.grid_columns)?
            .checked_add(column)?
            .checked_add(1)?,
    };
    QuestionIndex::new(number)
}

/// Choice row of the cell at `(row, column)` within its question block.
///
/// Vertical blocks stack choices down `rows_per_block` rows, horizontal rows
/// spread them across columns and grid bands stack them down `grid_row_band`
/// rows. Positions past D yield `None`.
pub fn choice_row(
    orientation: Orientation,
    row: usize,
    column: usize,
    layout: &SheetLayout,
) -> Option<Choice> {
    let position = match orientation {
        Orientation::Vertical => row % layout.rows_per_block.max(1),
        Orientation::Horizontal => column,
        Orientation::Grid => row % layout.grid_row_band.max(1),
    };
    Choice::from_index(position)
}

/// Choice-letter cells in row-major order.
fn sorted_choice_cells(table: &Table) -> Vec<&Cell> {
    let mut cells: Vec<&Cell> = table
        .cells
        .iter()
        .filter(|c| c.choice().is_some())
        .collect();
    cells.sort_by_key(|c| (c.row_index, c.column_index));
    cells
}

type QuestionMaps = (
    BTreeMap<QuestionIndex, QuestionCells>,
    BTreeMap<QuestionIndex, QuestionCells>,
);

/// Consecutive runs of four cells become questions 1, 2, ...; a trailing
/// partial run is dropped. The letter comes from each cell's content and the
/// choice row from its place in the run.
fn positional_grouping(cells: &[&Cell]) -> QuestionMaps {
    let mut entries = BTreeMap::new();
    let mut rows = BTreeMap::new();
    for (k, group) in cells.chunks_exact(CHOICE_COUNT).enumerate() {
        let Some(question) = QuestionIndex::from_slot(k) else {
            break;
        };
        let mut by_letter = QuestionCells::new();
        let mut by_row = QuestionCells::new();
        for (choice, cell) in Choice::ALL.into_iter().zip(group) {
            if let Some(letter) = cell.choice() {
                by_letter.insert(letter, (*cell).clone());
            }
            by_row.insert(choice, (*cell).clone());
        }
        entries.insert(question, by_letter);
        rows.insert(question, by_row);
    }
    (entries, rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::processors::Polygon;

    fn cell(content: &str, row: usize, column: usize) -> Cell {
        Cell::new(content, row, column, Polygon::empty())
    }

    fn q(n: usize) -> QuestionIndex {
        QuestionIndex::new(n).unwrap()
    }

    /// Vertical sheet: four columns of ten questions, four rows per question.
    fn vertical_table() -> Table {
        let mut cells = Vec::new();
        for column in 0..4 {
            for row in 0..40 {
                cells.push(cell(["A", "B", "C", "D"][row % 4], row, column));
            }
        }
        Table {
            row_count: 40,
            column_count: 4,
            cells,
        }
    }

    #[test]
    fn test_question_formulas() {
        let layout = SheetLayout::default();
        assert_eq!(question_for(Orientation::Vertical, 5, 2, &layout), Some(q(22)));
        assert_eq!(question_for(Orientation::Horizontal, 7, 3, &layout), Some(q(8)));
        assert_eq!(question_for(Orientation::Grid, 6, 4, &layout), Some(q(13)));
        assert_eq!(question_for(Orientation::Horizontal, 40, 0, &layout), None);
        assert_eq!(question_for(Orientation::Vertical, 0, 4, &layout), None);
    }

    #[test]
    fn test_choice_row_follows_orientation() {
        let layout = SheetLayout::default();
        assert_eq!(choice_row(Orientation::Vertical, 6, 1, &layout), Some(Choice::C));
        assert_eq!(choice_row(Orientation::Horizontal, 9, 3, &layout), Some(Choice::D));
        assert_eq!(choice_row(Orientation::Grid, 7, 5, &layout), Some(Choice::C));
        // The fifth row of a grid band holds no choice.
        assert_eq!(choice_row(Orientation::Grid, 9, 0, &layout), None);
        assert_eq!(choice_row(Orientation::Horizontal, 0, 4, &layout), None);
    }

    #[test]
    fn test_rows_keep_position_when_letter_is_misread() {
        let mut table = vertical_table();
        // Question 1's B cell (row 1, column 0) read as "D".
        table
            .cells
            .iter_mut()
            .find(|c| c.row_index == 1 && c.column_index == 0)
            .unwrap()
            .content = "D".to_string();
        let map = CandidateMap::build(&[table], &SheetLayout::default());
        assert!(map.cells(q(1)).unwrap().get(&Choice::B).is_none());
        let rows = map.rows(q(1)).unwrap();
        assert_eq!(rows.len(), 4);
        assert_eq!(rows[&Choice::B].row_index, 1);
        assert_eq!(rows[&Choice::B].choice(), Some(Choice::D));
    }

    #[test]
    fn test_vertical_table_maps_every_question() {
        let map = CandidateMap::build(&[vertical_table()], &SheetLayout::default());
        assert_eq!(map.orientation(), Some(Orientation::Vertical));
        assert!(!map.used_positional_fallback);
        assert_eq!(map.question_count(), 40);
        assert_eq!(map.letters(q(1)).len(), 4);
        let q12 = map.cells(q(12)).unwrap();
        assert_eq!(q12[&Choice::C].row_index, 6);
        assert_eq!(q12[&Choice::C].column_index, 1);
    }

    #[test]
    fn test_later_duplicate_overwrites() {
        let mut table = vertical_table();
        // Same question and letter as (row 0, column 0) but later in row-major order.
        table.cells.push(cell("A", 3, 0));
        let map = CandidateMap::build(&[table], &SheetLayout::default());
        assert_eq!(map.cells(q(1)).unwrap()[&Choice::A].row_index, 3);
    }

    #[test]
    fn test_positional_fallback_groups_by_four() {
        // A single horizontal-looking strip maps to only a few questions,
        // which triggers positional grouping.
        let cells = vec![
            cell("A", 0, 0),
            cell("B", 0, 1),
            cell("C", 0, 2),
            cell("D", 0, 3),
            cell("A", 1, 0),
            cell("C", 1, 1),
            cell("D", 1, 2),
            cell("B", 1, 3),
            cell("A", 2, 0),
        ];
        let table = Table {
            row_count: 3,
            column_count: 4,
            cells,
        };
        let map = CandidateMap::build(&[table], &SheetLayout::default());
        assert!(map.used_positional_fallback);
        assert_eq!(map.question_count(), 2);
        let q2 = map.cells(q(2)).unwrap();
        assert_eq!(q2[&Choice::B].column_index, 3);
        assert!(map.cells(q(3)).is_none());
        // The fourth cell of the run is row D even though it reads "B".
        assert_eq!(map.rows(q(2)).unwrap()[&Choice::D].column_index, 3);
    }

    #[test]
    fn test_select_answer_table_prefers_column_count() {
        let layout = SheetLayout::default();
        let names = Table {
            row_count: 2,
            column_count: 2,
            cells: vec![cell("Name", 0, 0)],
        };
        let big = Table {
            row_count: 50,
            column_count: 4,
            cells: vec![cell("A", 0, 0)],
        };
        let preferred = Table {
            row_count: 20,
            column_count: 8,
            cells: vec![cell("B", 0, 0)],
        };
        let tables = vec![names.clone(), big.clone(), preferred];
        assert_eq!(select_answer_table(&tables, &layout).map(|(i, _)| i), Some(2));

        let small = Table {
            row_count: 10,
            column_count: 5,
            cells: vec![cell("C", 0, 0)],
        };
        let tables = vec![small, big.clone(), big];
        assert_eq!(select_answer_table(&tables, &layout).map(|(i, _)| i), Some(1));

        assert!(select_answer_table(&[names], &layout).is_none());
    }

    #[test]
    fn test_no_table_yields_empty_map() {
        let map = CandidateMap::build(&[], &SheetLayout::default());
        assert!(map.is_empty());
        assert_eq!(map.orientation(), None);
        assert_eq!(map.letters(q(1)), ChoiceSet::new());
    }
}
