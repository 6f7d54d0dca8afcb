use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use utoipa::ToSchema;

use crate::grading::is_passing;

use super::Student;

/// Outcome of one graded quiz attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct QuizResult {
    pub quiz_id: i64,
    pub score: u32,
    pub total: u32,
    pub passed: bool,
    #[serde(with = "time::serde::rfc3339")]
    #[schema(value_type = String)]
    pub completed_at: OffsetDateTime,
}

impl QuizResult {
    /// `passed` is derived from the score, never supplied.
    pub fn new(quiz_id: i64, score: u32, total: u32, completed_at: OffsetDateTime) -> Self {
        debug_assert!(total > 0 && score <= total);
        Self {
            quiz_id,
            score,
            total,
            passed: is_passing(score, total),
            completed_at,
        }
    }
}

/// The result in effect after merging an attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Merged {
    pub effective: QuizResult,
    /// Whether the new attempt replaced (or created) the stored result.
    pub improved: bool,
}

impl Student {
    /// Best attempt wins: a stored result is replaced only by a strictly
    /// higher score. Ties keep the earlier record untouched.
    pub fn upsert_result(&mut self, attempt: QuizResult) -> Merged {
        match self.quiz_results.get(&attempt.quiz_id) {
            Some(prior) if attempt.score <= prior.score => Merged {
                effective: prior.clone(),
                improved: false,
            },
            _ => {
                self.quiz_results.insert(attempt.quiz_id, attempt.clone());
                Merged {
                    effective: attempt,
                    improved: true,
                }
            }
        }
    }
}

/// Reduce an attempt history (oldest first) to the effective result.
/// Agrees with folding the same attempts through [`Student::upsert_result`].
pub fn effective_result<'a>(
    attempts: impl IntoIterator<Item = &'a QuizResult>,
) -> Option<&'a QuizResult> {
    attempts.into_iter().fold(None, |best, a| match best {
        Some(b) if a.score <= b.score => Some(b),
        _ => Some(a),
    })
}

#[cfg(test)]
mod tests {
    use std::collections::{BTreeMap, BTreeSet};

    use pretty_assertions::assert_eq;
    use time::Duration;

    use super::*;
    use crate::{student::Role, utils::now};

    fn student() -> Student {
        Student {
            id: 1,
            name: "Ada".to_string(),
            email: "ada@example.com".to_string(),
            role: Role::Student,
            completed_lessons: BTreeSet::new(),
            quiz_results: BTreeMap::new(),
            version: 0,
        }
    }

    #[test]
    fn test_first_attempt_stored() {
        let mut s = student();
        let r = QuizResult::new(3, 4, 10, now());
        let merged = s.upsert_result(r.clone());
        assert!(merged.improved);
        assert_eq!(merged.effective, r);
        assert_eq!(s.quiz_results.get(&3), Some(&r));
    }

    #[test]
    fn test_best_score_retained() {
        let mut s = student();
        let t0 = now();
        let five = QuizResult::new(3, 5, 10, t0);
        s.upsert_result(five.clone());

        let merged = s.upsert_result(QuizResult::new(3, 3, 10, t0 + Duration::minutes(1)));
        assert!(!merged.improved);
        assert_eq!(merged.effective, five);
        assert_eq!(s.quiz_results[&3].score, 5);

        let eight = QuizResult::new(3, 8, 10, t0 + Duration::minutes(2));
        let merged = s.upsert_result(eight.clone());
        assert!(merged.improved);
        assert!(merged.effective.passed);
        assert_eq!(s.quiz_results[&3], eight);
    }

    #[test]
    fn test_tie_keeps_existing_record() {
        let mut s = student();
        let t0 = now();
        let first = QuizResult::new(3, 7, 10, t0);
        s.upsert_result(first.clone());
        let merged = s.upsert_result(QuizResult::new(3, 7, 10, t0 + Duration::hours(1)));
        assert!(!merged.improved);
        assert_eq!(s.quiz_results[&3].completed_at, first.completed_at);
    }

    #[test]
    fn test_effective_result_matches_upsert() {
        let t0 = now();
        let scores = [4, 6, 6, 2, 9, 9, 1];
        let attempts: Vec<_> = scores
            .iter()
            .enumerate()
            .map(|(i, &score)| QuizResult::new(3, score, 10, t0 + Duration::seconds(i as i64)))
            .collect();
        let mut s = student();
        for a in &attempts {
            s.upsert_result(a.clone());
        }
        assert_eq!(effective_result(&attempts), s.quiz_results.get(&3));
        assert_eq!(effective_result(&attempts).unwrap().completed_at, attempts[4].completed_at);
        assert_eq!(effective_result(std::iter::empty()), None);
    }
}
