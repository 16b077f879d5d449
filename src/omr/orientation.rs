//! Table orientation classification.
//!
//! A row whose choice-letter cells show at least three distinct letters is a
//! horizontal signal; a column doing the same is a vertical signal. Exactly one
//! kind of signal decides the orientation; both or neither mean grid.

use crate::domain::sheet::{Cell, ChoiceSet};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Minimum cells and distinct letters that make a row or column a signal.
const SIGNAL_MIN_LETTERS: usize = 3;

/// How choice letters are laid out relative to question numbering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Orientation {
    /// Choices run down a column; questions stack in blocks of rows.
    Vertical,
    /// Each row holds one question's choices.
    Horizontal,
    /// Bands of rows by fixed question columns. Also the ambiguous default.
    Grid,
}

impl Orientation {
    pub fn as_str(self) -> &'static str {
        match self {
            Orientation::Vertical => "vertical",
            Orientation::Horizontal => "horizontal",
            Orientation::Grid => "grid",
        }
    }
}

impl fmt::Display for Orientation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of classifying one table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableClassification {
    pub orientation: Orientation,
    /// Row indices that qualified as horizontal signals, ascending.
    pub signal_rows: Vec<usize>,
    /// Column indices that qualified as vertical signals, ascending.
    pub signal_columns: Vec<usize>,
}

#[derive(Default)]
struct LetterGroup {
    cells: usize,
    letters: ChoiceSet,
}

impl LetterGroup {
    fn is_signal(&self) -> bool {
        self.cells >= SIGNAL_MIN_LETTERS && self.letters.len() >= SIGNAL_MIN_LETTERS
    }
}

/// Classifies a table from its cells. Cells that are not choice letters are ignored.
pub fn classify<'a, I>(cells: I) -> TableClassification
where
    I: IntoIterator<Item = &'a Cell>,
{
    let mut rows: BTreeMap<usize, LetterGroup> = BTreeMap::new();
    let mut columns: BTreeMap<usize, LetterGroup> = BTreeMap::new();

    for cell in cells {
        let Some(choice) = cell.choice() else {
            continue;
        };
        let row = rows.entry(cell.row_index).or_default();
        row.cells += 1;
        row.letters.insert(choice);
        let column = columns.entry(cell.column_index).or_default();
        column.cells += 1;
        column.letters.insert(choice);
    }

    let signal_rows: Vec<usize> = rows
        .iter()
        .filter(|(_, g)| g.is_signal())
        .map(|(i, _)| *i)
        .collect();
    let signal_columns: Vec<usize> = columns
        .iter()
        .filter(|(_, g)| g.is_signal())
        .map(|(i, _)| *i)
        .collect();

    let orientation = match (signal_columns.is_empty(), signal_rows.is_empty()) {
        (false, true) => Orientation::Vertical,
        (true, false) => Orientation::Horizontal,
        _ => Orientation::Grid,
    };

    tracing::trace!(
        target: "answer_sheet",
        %orientation,
        signal_rows = signal_rows.len(),
        signal_columns = signal_columns.len(),
        "classified table orientation"
    );

    TableClassification {
        orientation,
        signal_rows,
        signal_columns,
    }
}
