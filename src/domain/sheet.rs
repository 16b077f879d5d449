//! Answer-sheet data model.
//!
//! These are the immutable values every stage exchanges: choices and question
//! indices with their domain invariants enforced at construction, the text
//! lines, cells and tables recognized on the sheet, candidate marks, and the
//! per-question answer candidates and slots.

use crate::core::constants::{CHOICE_COUNT, QUESTION_COUNT, contains_cross};
use crate::processors::Polygon;
use serde::{Deserialize, Serialize};
use std::fmt;

/// One of the four answer choices.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Choice {
    A,
    B,
    C,
    D,
}

impl Choice {
    /// All choices in sheet order.
    pub const ALL: [Choice; CHOICE_COUNT] = [Choice::A, Choice::B, Choice::C, Choice::D];

    /// Zero-based position (A=0 .. D=3).
    pub fn index(self) -> usize {
        self as usize
    }

    pub fn from_index(index: usize) -> Option<Self> {
        Self::ALL.get(index).copied()
    }

    /// Parses a single letter, case-insensitively.
    pub fn from_char(c: char) -> Option<Self> {
        match c.to_ascii_uppercase() {
            'A' => Some(Choice::A),
            'B' => Some(Choice::B),
            'C' => Some(Choice::C),
            'D' => Some(Choice::D),
            _ => None,
        }
    }

    /// Parses recognized text whose trimmed, uppercased content is exactly one letter A-D.
    pub fn from_label(text: &str) -> Option<Self> {
        let mut chars = text.trim().chars();
        match (chars.next(), chars.next()) {
            (Some(c), None) => Self::from_char(c),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Choice::A => "A",
            Choice::B => "B",
            Choice::C => "C",
            Choice::D => "D",
        }
    }
}

impl fmt::Display for Choice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A set of choices stored as a bitmask.
///
/// Iteration and display always follow A→D order, so anything derived from a
/// set is independent of the order in which letters were observed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct ChoiceSet(u8);

impl ChoiceSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, choice: Choice) {
        self.0 |= 1 << choice.index();
    }

    pub fn contains(&self, choice: Choice) -> bool {
        self.0 & (1 << choice.index()) != 0
    }

    pub fn len(&self) -> usize {
        self.0.count_ones() as usize
    }

    pub fn is_empty(&self) -> bool {
        self.0 == 0
    }

    pub fn iter(&self) -> impl Iterator<Item = Choice> + '_ {
        Choice::ALL.into_iter().filter(|c| self.contains(*c))
    }

    /// The missing-letter rule: when exactly three letters are present, the
    /// absent one is the selected choice. Any other count is ambiguous.
    pub fn single_missing(&self) -> Option<Choice> {
        if self.len() != CHOICE_COUNT - 1 {
            return None;
        }
        Choice::ALL.into_iter().find(|c| !self.contains(*c))
    }
}

impl FromIterator<Choice> for ChoiceSet {
    fn from_iter<I: IntoIterator<Item = Choice>>(iter: I) -> Self {
        let mut set = ChoiceSet::new();
        for choice in iter {
            set.insert(choice);
        }
        set
    }
}

impl fmt::Display for ChoiceSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{")?;
        for (i, choice) in self.iter().enumerate() {
            if i > 0 {
                write!(f, ",")?;
            }
            write!(f, "{choice}")?;
        }
        write!(f, "}}")
    }
}

/// A question number in `1..=QUESTION_COUNT`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct QuestionIndex(u8);

impl QuestionIndex {
    /// Returns `None` for numbers outside the question domain.
    pub fn new(number: usize) -> Option<Self> {
        if (1..=QUESTION_COUNT).contains(&number) {
            u8::try_from(number).ok().map(Self)
        } else {
            None
        }
    }

    /// Question for a zero-based output slot.
    pub fn from_slot(slot: usize) -> Option<Self> {
        Self::new(slot + 1)
    }

    /// The 1-based question number.
    pub fn get(self) -> usize {
        usize::from(self.0)
    }

    /// The zero-based output slot.
    pub fn slot(self) -> usize {
        self.get() - 1
    }

    /// Every question in ascending order.
    pub fn all() -> impl Iterator<Item = QuestionIndex> {
        (1..=QUESTION_COUNT).filter_map(Self::new)
    }
}

impl fmt::Display for QuestionIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A recognized text line.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Line {
    pub text: String,
    pub polygon: Polygon,
}

impl Line {
    pub fn new(text: impl Into<String>, polygon: Polygon) -> Self {
        Self {
            text: text.into(),
            polygon,
        }
    }

    /// Trimmed, uppercased text.
    pub fn normalized_text(&self) -> String {
        self.text.trim().to_uppercase()
    }
}

/// A recognized table cell.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Cell {
    pub content: String,
    pub row_index: usize,
    pub column_index: usize,
    pub polygon: Polygon,
}

impl Cell {
    pub fn new(
        content: impl Into<String>,
        row_index: usize,
        column_index: usize,
        polygon: Polygon,
    ) -> Self {
        Self {
            content: content.into(),
            row_index,
            column_index,
            polygon,
        }
    }

    /// The choice letter this cell shows, if its content is exactly one of A-D.
    pub fn choice(&self) -> Option<Choice> {
        Choice::from_label(&self.content)
    }
}

/// A recognized table.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Table {
    pub row_count: usize,
    pub column_count: usize,
    pub cells: Vec<Cell>,
}

impl Table {
    /// Number of cells whose content is a choice letter.
    pub fn choice_cell_count(&self) -> usize {
        self.cells.iter().filter(|c| c.choice().is_some()).count()
    }
}

/// Where a candidate mark came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MarkSource {
    /// Reported by the document analysis service as a selection mark.
    Explicit,
    /// A text line reading "X" or a cross glyph.
    Text,
    /// Two short strokes whose centroids nearly coincide.
    IntersectingLines,
}

impl MarkSource {
    pub fn as_str(self) -> &'static str {
        match self {
            MarkSource::Explicit => "explicit",
            MarkSource::Text => "text",
            MarkSource::IntersectingLines => "intersecting_lines",
        }
    }
}

impl fmt::Display for MarkSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A candidate "this choice was selected" signal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Mark {
    pub polygon: Polygon,
    pub page: u32,
    /// Always within [0, 1].
    pub confidence: f32,
    pub source: MarkSource,
    /// Original text for marks read from text lines.
    pub raw_text: Option<String>,
}

impl Mark {
    /// Creates a mark, clamping `confidence` into [0, 1].
    pub fn new(polygon: Polygon, page: u32, confidence: f32, source: MarkSource) -> Self {
        Self {
            polygon,
            page,
            confidence: clamp_confidence(confidence),
            source,
            raw_text: None,
        }
    }

    pub fn with_raw_text(mut self, text: impl Into<String>) -> Self {
        self.raw_text = Some(text.into());
        self
    }

    /// True when the mark carries text reading "X" or a cross glyph.
    pub fn has_cross_text(&self) -> bool {
        self.raw_text.as_deref().is_some_and(contains_cross)
    }
}

/// The four inference strategies, in fusion tie-break priority order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Strategy {
    MarkGeometry,
    TableComplement,
    RowCrossed,
    LineComplement,
}

impl Strategy {
    /// Strategies from highest to lowest tie-break priority.
    pub const BY_PRIORITY: [Strategy; 4] = [
        Strategy::MarkGeometry,
        Strategy::TableComplement,
        Strategy::RowCrossed,
        Strategy::LineComplement,
    ];

    /// Lower rank wins confidence ties.
    pub fn priority_rank(self) -> usize {
        self as usize
    }
}

/// How an answer slot was resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Method {
    MarkGeometry,
    TableComplement,
    RowCrossed,
    LineComplement,
    Neighbor,
    Fallback,
}

impl Method {
    pub fn as_str(self) -> &'static str {
        match self {
            Method::MarkGeometry => "mark_geometry",
            Method::TableComplement => "table_complement",
            Method::RowCrossed => "row_crossed",
            Method::LineComplement => "line_complement",
            Method::Neighbor => "neighbor",
            Method::Fallback => "fallback",
        }
    }
}

impl From<Strategy> for Method {
    fn from(strategy: Strategy) -> Self {
        match strategy {
            Strategy::MarkGeometry => Method::MarkGeometry,
            Strategy::TableComplement => Method::TableComplement,
            Strategy::RowCrossed => Method::RowCrossed,
            Strategy::LineComplement => Method::LineComplement,
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One strategy's opinion about one question.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AnswerCandidate {
    pub question: QuestionIndex,
    pub choice: Choice,
    /// Always within [0, 1].
    pub confidence: f32,
    pub strategy: Strategy,
}

impl AnswerCandidate {
    /// Creates a candidate, clamping `confidence` into [0, 1].
    pub fn new(
        question: QuestionIndex,
        choice: Choice,
        confidence: f32,
        strategy: Strategy,
    ) -> Self {
        Self {
            question,
            choice,
            confidence: clamp_confidence(confidence),
            strategy,
        }
    }
}

/// Final state of one question.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct AnswerSlot {
    /// `None` is rendered as "-".
    pub choice: Option<Choice>,
    pub method: Option<Method>,
    pub confidence: f32,
}

impl AnswerSlot {
    /// Letter used for unresolved slots.
    pub const UNRESOLVED: &'static str = "-";

    pub fn unresolved() -> Self {
        Self::default()
    }

    pub fn resolved(choice: Choice, method: Method, confidence: f32) -> Self {
        Self {
            choice: Some(choice),
            method: Some(method),
            confidence: clamp_confidence(confidence),
        }
    }

    pub fn is_resolved(&self) -> bool {
        self.choice.is_some()
    }

    /// "A".."D" or "-".
    pub fn letter(&self) -> &'static str {
        self.choice.map_or(Self::UNRESOLVED, Choice::as_str)
    }
}

impl fmt::Display for AnswerSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.letter())
    }
}

/// Clamps a confidence into [0, 1]; NaN becomes 0.
pub fn clamp_confidence(value: f32) -> f32 {
    if value.is_nan() {
        0.0
    } else {
        value.clamp(0.0, 1.0)
    }
}
