//! Scoring of inferred answers against an answer key.

use crate::core::errors::{OMRError, OmrResult};
use crate::domain::sheet::{AnswerSlot, Choice};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Outcome of comparing answers with a key.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ScoreReport {
    pub correct: usize,
    pub incorrect: usize,
    pub unresolved: usize,
    /// `correct / key.len() * 100`, or 0 for an empty key.
    pub percentage: f32,
    /// 1-based question numbers answered correctly.
    pub correct_questions: Vec<usize>,
    pub incorrect_questions: Vec<usize>,
    pub unresolved_questions: Vec<usize>,
}

impl ScoreReport {
    pub fn total(&self) -> usize {
        self.correct + self.incorrect + self.unresolved
    }
}

impl fmt::Display for ScoreReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}/{} correct ({:.1}%), {} incorrect, {} unresolved",
            self.correct,
            self.total(),
            self.percentage,
            self.incorrect,
            self.unresolved
        )
    }
}

/// Classifies every key position as correct, incorrect or unresolved.
///
/// Letters compare case-insensitively. `"-"`, anything that is not a single
/// choice letter, and answers missing past the end of `answers` are all
/// unresolved.
pub fn score<A, K>(answers: &[A], key: &[K]) -> ScoreReport
where
    A: AsRef<str>,
    K: AsRef<str>,
{
    let mut report = ScoreReport::default();

    for (index, expected) in key.iter().enumerate() {
        let question = index + 1;
        let given = answers.get(index).and_then(|a| Choice::from_label(a.as_ref()));
        match given {
            None => {
                report.unresolved += 1;
                report.unresolved_questions.push(question);
            }
            Some(choice) if Choice::from_label(expected.as_ref()) == Some(choice) => {
                report.correct += 1;
                report.correct_questions.push(question);
            }
            Some(_) => {
                report.incorrect += 1;
                report.incorrect_questions.push(question);
            }
        }
    }

    if !key.is_empty() {
        report.percentage = report.correct as f32 / key.len() as f32 * 100.0;
    }
    report
}

/// Parses an answer key such as `"CAAD..."` or `"C, A, A, D"`.
///
/// Commas and whitespace are ignored; every other character must be a
/// choice letter.
pub fn parse_answer_key(text: &str) -> OmrResult<Vec<Choice>> {
    text.chars()
        .filter(|c| *c != ',' && !c.is_whitespace())
        .map(|c| {
            Choice::from_char(c)
                .ok_or_else(|| OMRError::invalid_input(format!("'{c}' is not a choice letter")))
        })
        .collect()
}

/// How often each letter (and "-") occurs in a set of answers.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnswerDistribution {
    pub a: usize,
    pub b: usize,
    pub c: usize,
    pub d: usize,
    pub unresolved: usize,
}

impl AnswerDistribution {
    pub fn from_slots(slots: &[AnswerSlot]) -> Self {
        let mut dist = Self::default();
        for slot in slots {
            match slot.choice {
                Some(Choice::A) => dist.a += 1,
                Some(Choice::B) => dist.b += 1,
                Some(Choice::C) => dist.c += 1,
                Some(Choice::D) => dist.d += 1,
                None => dist.unresolved += 1,
            }
        }
        dist
    }
}

impl fmt::Display for AnswerDistribution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "A={} B={} C={} D={} -={}",
            self.a, self.b, self.c, self.d, self.unresolved
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::sheet::Method;

    #[test]
    fn test_score_classifies_each_position() {
        let answers = ["A", "b", "-", "D"];
        let key = ["A", "B", "C", "C"];
        let report = score(&answers, &key);
        assert_eq!(report.correct, 2);
        assert_eq!(report.incorrect, 1);
        assert_eq!(report.unresolved, 1);
        assert_eq!(report.correct_questions, vec![1, 2]);
        assert_eq!(report.incorrect_questions, vec![4]);
        assert_eq!(report.unresolved_questions, vec![3]);
        assert!((report.percentage - 50.0).abs() < 1e-4);
    }

    #[test]
    fn test_short_answers_count_as_unresolved() {
        let answers = ["A"];
        let key = ["A", "B"];
        let report = score(&answers, &key);
        assert_eq!(report.correct, 1);
        assert_eq!(report.unresolved, 1);
        assert_eq!(report.total(), 2);
    }

    #[test]
    fn test_empty_key_scores_zero() {
        let answers: [&str; 0] = [];
        let key: [&str; 0] = [];
        assert_eq!(score(&answers, &key).percentage, 0.0);
    }

    #[test]
    fn test_parse_answer_key() {
        let key = parse_answer_key("c, a a\nD").unwrap();
        assert_eq!(key, vec![Choice::C, Choice::A, Choice::A, Choice::D]);
        assert!(parse_answer_key("AB-C").is_err());
    }

    #[test]
    fn test_distribution() {
        let slots = [
            AnswerSlot::resolved(Choice::A, Method::Fallback, 0.0),
            AnswerSlot::resolved(Choice::A, Method::Neighbor, 0.0),
            AnswerSlot::resolved(Choice::D, Method::MarkGeometry, 0.9),
            AnswerSlot::unresolved(),
        ];
        let dist = AnswerDistribution::from_slots(&slots);
        assert_eq!((dist.a, dist.d), (2, 1));
        assert_eq!(dist.unresolved, 1);
        assert_eq!(dist.to_string(), "A=2 B=0 C=0 D=1 -=1");
    }
}
