//! Mark-to-cell matching.
//!
//! A mark matches a cell when its centroid falls inside the cell's bounding box
//! grown by a margin. The match confidence is a weighted sum of the mark's
//! provenance, its reported confidence and, for contained marks, how close it
//! sits to the cell centre. Marks carrying explicit cross text near the cell
//! count as inside and earn an extra bonus, contained or not.

use crate::core::config::MatcherPolicy;
use crate::domain::sheet::{Mark, MarkSource, clamp_confidence};
use crate::processors::Polygon;

/// Result of testing one mark against one cell.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MatchOutcome {
    pub is_inside: bool,
    /// Composite score in [0, 1].
    pub confidence: f32,
}

impl MatchOutcome {
    /// The outcome for marks or cells without usable geometry.
    pub const NO_MATCH: MatchOutcome = MatchOutcome {
        is_inside: false,
        confidence: 0.0,
    };
}

/// Scores marks against cells using a [`MatcherPolicy`].
#[derive(Debug, Clone, Copy)]
pub struct MarkMatcher<'a> {
    policy: &'a MatcherPolicy,
}

impl<'a> MarkMatcher<'a> {
    pub fn new(policy: &'a MatcherPolicy) -> Self {
        Self { policy }
    }

    fn source_weight(&self, source: MarkSource) -> f32 {
        match source {
            MarkSource::Text => self.policy.text_source_weight,
            MarkSource::Explicit => self.policy.explicit_source_weight,
            MarkSource::IntersectingLines => self.policy.stroke_source_weight,
        }
    }

    /// Tests `mark` against the cell outlined by `cell`.
    ///
    /// Never fails: an empty polygon on either side, or a cell with no area,
    /// yields [`MatchOutcome::NO_MATCH`].
    pub fn match_mark(&self, mark: &Mark, cell: &Polygon) -> MatchOutcome {
        let (Some(centroid), Some(bounds)) = (mark.polygon.centroid(), cell.bounds()) else {
            return MatchOutcome::NO_MATCH;
        };
        let (width, height) = (bounds.width(), bounds.height());
        if width <= 0.0 || height <= 0.0 {
            return MatchOutcome::NO_MATCH;
        }

        let center = bounds.center();
        let mut is_inside = bounds.expand(self.policy.margin_ratio).contains(&centroid);
        let has_cross = mark.has_cross_text();

        let mut score = self.source_weight(mark.source)
            + self.policy.reported_confidence_weight * mark.confidence;
        if has_cross {
            score += self.policy.cross_text_bonus;
        }

        if is_inside {
            let dx = (centroid.x - center.x) / width;
            let dy = (centroid.y - center.y) / height;
            let distance = (dx * dx + dy * dy).sqrt();
            score += self.policy.centrality_weight * (1.0 - distance.min(1.0));
        }

        if has_cross
            && (centroid.x - center.x).abs() <= self.policy.relaxed_extent * width
            && (centroid.y - center.y).abs() <= self.policy.relaxed_extent * height
        {
            is_inside = true;
            score += self.policy.relaxed_bonus;
        }

        MatchOutcome {
            is_inside,
            confidence: clamp_confidence(score),
        }
    }
}
