//! Candidate fusion and gap-filling.
//!
//! Fusion runs once and keeps, per question, the candidate with the strictly
//! highest confidence, breaking ties by strategy priority. Gap-filling runs
//! once afterwards and only when too many questions are still unresolved:
//! each gap copies the nearest fusion-resolved neighbor within reach, and
//! whatever remains takes the configured fallback pattern.

use crate::core::config::GapFillingPolicy;
use crate::core::constants::QUESTION_COUNT;
use crate::domain::sheet::{AnswerCandidate, AnswerSlot, Method, QuestionIndex};
use crate::omr::strategies::StrategyResult;
use serde::Serialize;

/// Output of the fusion phase.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FusionResult {
    /// One slot per question, index 0 is question 1.
    pub slots: Vec<AnswerSlot>,
    /// The candidate each slot was resolved from.
    pub winners: Vec<Option<AnswerCandidate>>,
}

impl FusionResult {
    pub fn unresolved_count(&self) -> usize {
        self.slots.iter().filter(|s| !s.is_resolved()).count()
    }
}

/// Picks the winning candidate among `candidates`.
///
/// Order-independent: candidates are ranked by confidence, then by strategy
/// priority.
pub fn select_winner<'a, I>(candidates: I) -> Option<AnswerCandidate>
where
    I: IntoIterator<Item = &'a AnswerCandidate>,
{
    let mut ranked: Vec<&AnswerCandidate> = candidates.into_iter().collect();
    ranked.sort_by_key(|c| c.strategy.priority_rank());

    let mut best: Option<AnswerCandidate> = None;
    for candidate in ranked {
        if best.is_none_or(|b| candidate.confidence > b.confidence) {
            best = Some(*candidate);
        }
    }
    best
}

/// Fuses the strategies' candidates into one slot per question.
pub fn fuse(results: &[StrategyResult]) -> FusionResult {
    let mut slots = vec![AnswerSlot::unresolved(); QUESTION_COUNT];
    let mut winners = vec![None; QUESTION_COUNT];

    for question in QuestionIndex::all() {
        let winner = select_winner(results.iter().filter_map(|r| r.get(question)));
        if let Some(candidate) = winner {
            slots[question.slot()] = AnswerSlot::resolved(
                candidate.choice,
                candidate.strategy.into(),
                candidate.confidence,
            );
            tracing::trace!(
                target: "answer_sheet",
                question = question.get(),
                choice = %candidate.choice,
                strategy = ?candidate.strategy,
                confidence = candidate.confidence,
                "fused"
            );
        }
        winners[question.slot()] = winner;
    }

    let fused = FusionResult { slots, winners };
    tracing::debug!(
        target: "answer_sheet",
        resolved = QUESTION_COUNT - fused.unresolved_count(),
        unresolved = fused.unresolved_count(),
        "fusion finished"
    );
    fused
}

/// What gap-filling did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct GapFillingOutcome {
    pub applied: bool,
    pub neighbor: usize,
    pub fallback: usize,
}

/// Patches unresolved slots according to a [`GapFillingPolicy`].
#[derive(Debug, Clone, Copy)]
pub struct GapFiller<'a> {
    policy: &'a GapFillingPolicy,
}

impl<'a> GapFiller<'a> {
    pub fn new(policy: &'a GapFillingPolicy) -> Self {
        Self { policy }
    }

    /// True when `unresolved` gaps call for patching.
    pub fn should_fill(&self, unresolved: usize) -> bool {
        self.policy.enabled && unresolved > self.policy.unresolved_threshold
    }

    /// Patches `slots` in place.
    ///
    /// Neighbors are taken from the slots as they were on entry, so patched
    /// letters never propagate further.
    pub fn fill(&self, slots: &mut [AnswerSlot]) -> GapFillingOutcome {
        let unresolved = slots.iter().filter(|s| !s.is_resolved()).count();
        if !self.should_fill(unresolved) {
            return GapFillingOutcome::default();
        }

        tracing::warn!(
            target: "answer_sheet",
            unresolved,
            threshold = self.policy.unresolved_threshold,
            "too many unresolved questions; filling gaps"
        );

        let resolved: Vec<(usize, AnswerSlot)> = slots
            .iter()
            .enumerate()
            .filter(|(_, s)| s.is_resolved())
            .map(|(i, s)| (i, *s))
            .collect();

        let mut outcome = GapFillingOutcome {
            applied: true,
            ..GapFillingOutcome::default()
        };

        for (index, slot) in slots.iter_mut().enumerate() {
            if slot.is_resolved() {
                continue;
            }

            let nearest = resolved
                .iter()
                .map(|(i, s)| (i.abs_diff(index), *i, s))
                .filter(|(distance, _, _)| *distance <= self.policy.neighbor_max_distance)
                .min_by_key(|(distance, i, _)| (*distance, *i));

            if let Some((distance, from, neighbor)) = nearest {
                if let Some(choice) = neighbor.choice {
                    *slot = AnswerSlot::resolved(choice, Method::Neighbor, 0.0);
                    outcome.neighbor += 1;
                    tracing::trace!(
                        target: "answer_sheet",
                        question = index + 1,
                        from = from + 1,
                        distance,
                        %choice,
                        "neighbor fill"
                    );
                    continue;
                }
            }

            if let Some(choice) = self.policy.fallback_pattern.get(index).copied() {
                *slot = AnswerSlot::resolved(choice, Method::Fallback, 0.0);
                outcome.fallback += 1;
            }
        }

        tracing::debug!(
            target: "answer_sheet",
            neighbor = outcome.neighbor,
            fallback = outcome.fallback,
            "gap filling finished"
        );
        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::sheet::{Choice, Strategy};

    fn q(n: usize) -> QuestionIndex {
        QuestionIndex::new(n).unwrap()
    }

    #[test]
    fn test_tie_prefers_mark_geometry_over_table_complement() {
        let mut table = StrategyResult::new(Strategy::TableComplement);
        table.insert(q(4), Choice::B, 0.6);
        let mut geometry = StrategyResult::new(Strategy::MarkGeometry);
        geometry.insert(q(4), Choice::C, 0.6);

        // Input order must not matter.
        for results in [
            vec![table.clone(), geometry.clone()],
            vec![geometry.clone(), table.clone()],
        ] {
            let fused = fuse(&results);
            let slot = fused.slots[3];
            assert_eq!(slot.choice, Some(Choice::C));
            assert_eq!(slot.method, Some(Method::MarkGeometry));
        }
    }

    #[test]
    fn test_higher_confidence_wins_regardless_of_priority() {
        let mut line = StrategyResult::new(Strategy::LineComplement);
        line.insert(q(1), Choice::A, 0.6);
        let mut geometry = StrategyResult::new(Strategy::MarkGeometry);
        geometry.insert(q(1), Choice::D, 0.45);

        let fused = fuse(&[geometry, line]);
        assert_eq!(fused.slots[0].choice, Some(Choice::A));
        assert_eq!(fused.slots[0].method, Some(Method::LineComplement));
        assert_eq!(fused.unresolved_count(), QUESTION_COUNT - 1);
        assert!(fused.winners[1].is_none());
    }

    fn slots_with(resolved: &[(usize, Choice)]) -> Vec<AnswerSlot> {
        let mut slots = vec![AnswerSlot::unresolved(); QUESTION_COUNT];
        for (question, choice) in resolved {
            slots[question - 1] = AnswerSlot::resolved(*choice, Method::TableComplement, 0.6);
        }
        slots
    }

    #[test]
    fn test_neighbor_propagation() {
        let mut slots = slots_with(&[(9, Choice::A), (13, Choice::D)]);
        let policy = GapFillingPolicy::default();
        let outcome = GapFiller::new(&policy).fill(&mut slots);
        assert!(outcome.applied);

        assert_eq!(slots[9].choice, Some(Choice::A));
        assert_eq!(slots[9].method, Some(Method::Neighbor));
        // Equidistant from 9 and 13: the lower question wins.
        assert_eq!(slots[10].choice, Some(Choice::A));
        assert_eq!(slots[11].choice, Some(Choice::D));
        assert_eq!(slots[15].choice, Some(Choice::D));
        assert_eq!(slots[5].method, Some(Method::Neighbor));

        // Beyond reach: fallback pattern.
        assert_eq!(slots[16].choice, Some(Choice::D));
        assert_eq!(slots[16].method, Some(Method::Fallback));
        assert_eq!(slots[0].choice, Some(Choice::C));
        assert_eq!(slots[4].method, Some(Method::Fallback));

        assert!(slots.iter().all(AnswerSlot::is_resolved));
        assert_eq!(outcome.neighbor + outcome.fallback, QUESTION_COUNT - 2);
    }

    #[test]
    fn test_below_threshold_leaves_gaps() {
        let resolved: Vec<(usize, Choice)> = (1..=30).map(|n| (n, Choice::B)).collect();
        let mut slots = slots_with(&resolved);
        let policy = GapFillingPolicy::default();
        let outcome = GapFiller::new(&policy).fill(&mut slots);
        assert!(!outcome.applied);
        assert_eq!(slots.iter().filter(|s| !s.is_resolved()).count(), 10);
    }

    #[test]
    fn test_disabled_gap_filling() {
        let mut slots = slots_with(&[]);
        let policy = GapFillingPolicy {
            enabled: false,
            ..GapFillingPolicy::default()
        };
        assert!(!GapFiller::new(&policy).fill(&mut slots).applied);
        assert!(slots.iter().all(|s| s.letter() == "-"));
    }

    #[test]
    fn test_empty_sheet_takes_fallback_pattern() {
        let mut slots = slots_with(&[]);
        let policy = GapFillingPolicy::default();
        let outcome = GapFiller::new(&policy).fill(&mut slots);
        assert_eq!(outcome.fallback, QUESTION_COUNT);
        let letters: String = slots.iter().map(AnswerSlot::letter).collect();
        assert_eq!(letters, crate::core::config::REFERENCE_FALLBACK_PATTERN);
    }
}
