//! Results of an answer-sheet inference run.

use crate::domain::scoring::AnswerDistribution;
use crate::domain::sheet::{AnswerCandidate, AnswerSlot, Method, QuestionIndex};
use crate::omr::fusion::GapFillingOutcome;
use crate::omr::marks::MarkCounts;
use crate::omr::orientation::Orientation;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;

/// Everything considered for one question.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QuestionTrace {
    pub question: QuestionIndex,
    /// Candidates from every strategy, highest priority first.
    pub candidates: Vec<AnswerCandidate>,
    /// The candidate fusion picked, if any.
    pub fused: Option<AnswerCandidate>,
    /// Final state after gap-filling.
    pub slot: AnswerSlot,
}

/// Outcome of one inference run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SheetInference {
    /// Exactly one slot per question; index 0 is question 1.
    pub slots: Vec<AnswerSlot>,
    pub traces: Vec<QuestionTrace>,
    /// Orientation of the answer table, `None` when no table was usable.
    pub orientation: Option<Orientation>,
    pub mapped_questions: usize,
    pub used_positional_fallback: bool,
    pub mark_counts: MarkCounts,
    pub gap_filling: GapFillingOutcome,
}

impl SheetInference {
    /// Letters "A".."D", or "-" for unresolved slots.
    pub fn answers(&self) -> Vec<String> {
        self.slots.iter().map(|s| s.letter().to_string()).collect()
    }

    pub fn confidences(&self) -> Vec<f32> {
        self.slots.iter().map(|s| s.confidence).collect()
    }

    /// Method tags; unresolved slots report "-".
    pub fn methods(&self) -> Vec<String> {
        self.slots
            .iter()
            .map(|s| {
                s.method
                    .map_or(AnswerSlot::UNRESOLVED, Method::as_str)
                    .to_string()
            })
            .collect()
    }

    pub fn gap_filling_applied(&self) -> bool {
        self.gap_filling.applied
    }

    pub fn unresolved_count(&self) -> usize {
        self.slots.iter().filter(|s| !s.is_resolved()).count()
    }

    pub fn summary(&self) -> InferenceSummary {
        let mut methods = BTreeMap::new();
        let mut histogram = ConfidenceHistogram::default();
        for slot in self.slots.iter().filter(|s| s.is_resolved()) {
            if let Some(method) = slot.method {
                *methods.entry(method).or_insert(0) += 1;
            }
            histogram.record(slot.confidence);
        }

        let unresolved = self.unresolved_count();
        InferenceSummary {
            resolved: self.slots.len() - unresolved,
            unresolved,
            methods,
            confidence: histogram,
            distribution: AnswerDistribution::from_slots(&self.slots),
        }
    }
}

impl fmt::Display for SheetInference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.orientation {
            Some(orientation) => writeln!(f, "Orientation: {orientation}")?,
            None => writeln!(f, "Orientation: no answer table")?,
        }
        writeln!(
            f,
            "Mapped questions: {}{}",
            self.mapped_questions,
            if self.used_positional_fallback {
                " (positional grouping)"
            } else {
                ""
            }
        )?;
        writeln!(f, "Marks: {}", self.mark_counts)?;
        if self.gap_filling.applied {
            writeln!(
                f,
                "Gap filling: {} neighbor, {} fallback",
                self.gap_filling.neighbor, self.gap_filling.fallback
            )?;
        }

        writeln!(f, "Answers:")?;
        for (index, slot) in self.slots.iter().enumerate() {
            match slot.method {
                Some(method) => writeln!(
                    f,
                    "  {:>2}: {} ({method}, {:.2})",
                    index + 1,
                    slot.letter(),
                    slot.confidence
                )?,
                None => writeln!(f, "  {:>2}: {}", index + 1, slot.letter())?,
            }
        }

        write!(f, "{}", self.summary())
    }
}

/// Counts of resolved slots per confidence range.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ConfidenceHistogram {
    pub bins: [usize; 5],
}

impl ConfidenceHistogram {
    /// Lower edges of the bins; the last bin is closed at 1.0.
    pub const EDGES: [f32; 5] = [0.0, 0.3, 0.5, 0.7, 0.9];
    pub const LABELS: [&'static str; 5] =
        ["[0.0,0.3)", "[0.3,0.5)", "[0.5,0.7)", "[0.7,0.9)", "[0.9,1.0]"];

    pub fn record(&mut self, confidence: f32) {
        let bin = Self::EDGES
            .iter()
            .rposition(|edge| confidence >= *edge)
            .unwrap_or(0);
        self.bins[bin] += 1;
    }

    pub fn total(&self) -> usize {
        self.bins.iter().sum()
    }
}

impl fmt::Display for ConfidenceHistogram {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, (label, count)) in Self::LABELS.iter().zip(self.bins).enumerate() {
            if i > 0 {
                write!(f, " ")?;
            }
            write!(f, "{label}={count}")?;
        }
        Ok(())
    }
}

/// Aggregate view of a [`SheetInference`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InferenceSummary {
    pub resolved: usize,
    pub unresolved: usize,
    /// Resolved slots per method, in method order.
    pub methods: BTreeMap<Method, usize>,
    pub confidence: ConfidenceHistogram,
    pub distribution: AnswerDistribution,
}

impl fmt::Display for InferenceSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "Resolved: {}/{}",
            self.resolved,
            self.resolved + self.unresolved
        )?;
        write!(f, "Methods:")?;
        for (method, count) in &self.methods {
            write!(f, " {method}={count}")?;
        }
        writeln!(f)?;
        writeln!(f, "Confidence: {}", self.confidence)?;
        writeln!(f, "Distribution: {}", self.distribution)
    }
}
