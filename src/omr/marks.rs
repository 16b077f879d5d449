//! Mark localization.
//!
//! Three channels contribute candidate marks independently: selection marks
//! reported by the analysis service, text lines reading as a cross, and pairs
//! of short strokes whose centroids nearly coincide. Their outputs are simply
//! concatenated; the same physical mark may appear once per channel.

use crate::core::config::MarkPolicy;
use crate::core::constants::contains_cross;
use crate::domain::analyze_result::{PageSnapshot, SheetSnapshot};
use crate::domain::sheet::{Mark, MarkSource};
use itertools::Itertools;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Number of marks contributed by each channel.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MarkCounts {
    pub explicit: usize,
    pub text: usize,
    pub intersecting_lines: usize,
}

impl MarkCounts {
    pub fn total(&self) -> usize {
        self.explicit + self.text + self.intersecting_lines
    }
}

impl fmt::Display for MarkCounts {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "explicit={} text={} intersecting_lines={}",
            self.explicit, self.text, self.intersecting_lines
        )
    }
}

/// All candidate marks of one sheet, in channel order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MarkSet {
    marks: Vec<Mark>,
}

impl MarkSet {
    pub fn new(marks: Vec<Mark>) -> Self {
        Self { marks }
    }

    /// Runs all three channels over every page.
    pub fn collect(snapshot: &SheetSnapshot, policy: &MarkPolicy) -> Self {
        let mut marks = Vec::new();
        for page in &snapshot.pages {
            marks.extend(explicit_marks(page, policy));
        }
        for page in &snapshot.pages {
            marks.extend(cross_text_marks(page, policy));
        }
        for page in &snapshot.pages {
            marks.extend(stroke_pair_marks(page, policy));
        }

        let set = Self { marks };
        let counts = set.counts();
        tracing::debug!(
            target: "answer_sheet",
            explicit = counts.explicit,
            text = counts.text,
            intersecting_lines = counts.intersecting_lines,
            "collected candidate marks"
        );
        set
    }

    pub fn iter(&self) -> impl Iterator<Item = &Mark> + '_ {
        self.marks.iter()
    }

    pub fn len(&self) -> usize {
        self.marks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.marks.is_empty()
    }

    pub fn counts(&self) -> MarkCounts {
        let mut counts = MarkCounts::default();
        for mark in &self.marks {
            match mark.source {
                MarkSource::Explicit => counts.explicit += 1,
                MarkSource::Text => counts.text += 1,
                MarkSource::IntersectingLines => counts.intersecting_lines += 1,
            }
        }
        counts
    }
}

/// Selection marks that are "selected" or reported above the confidence floor.
fn explicit_marks<'a>(
    page: &'a PageSnapshot,
    policy: &'a MarkPolicy,
) -> impl Iterator<Item = Mark> + 'a {
    page.selection_marks
        .iter()
        .filter(|m| m.is_selected() || m.confidence > policy.explicit_min_confidence)
        .map(|m| {
            Mark::new(
                m.polygon.clone(),
                page.page_number,
                m.confidence,
                MarkSource::Explicit,
            )
        })
}

fn cross_text_marks<'a>(
    page: &'a PageSnapshot,
    policy: &'a MarkPolicy,
) -> impl Iterator<Item = Mark> + 'a {
    page.lines
        .iter()
        .filter(|line| contains_cross(&line.normalized_text()))
        .map(|line| {
            Mark::new(
                line.polygon.clone(),
                page.page_number,
                policy.text_mark_confidence,
                MarkSource::Text,
            )
            .with_raw_text(line.text.clone())
        })
}

/// Two strokes of a hand-drawn cross often come back as two short lines.
fn stroke_pair_marks(page: &PageSnapshot, policy: &MarkPolicy) -> Vec<Mark> {
    let centroids: Vec<_> = page
        .lines
        .iter()
        .filter_map(|line| line.polygon.centroid().map(|c| (line, c)))
        .collect();

    centroids
        .iter()
        .tuple_combinations()
        .filter(|((_, a), (_, b))| a.distance(b) < policy.stroke_pair_max_distance)
        .map(|((first, _), (second, _))| {
            tracing::trace!(
                target: "answer_sheet",
                page = page.page_number,
                first = %first.text,
                second = %second.text,
                "stroke pair forms a mark"
            );
            Mark::new(
                first.polygon.concat(&second.polygon),
                page.page_number,
                policy.stroke_pair_confidence,
                MarkSource::IntersectingLines,
            )
        })
        .collect()
}
