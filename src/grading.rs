use serde::Serialize;
use time::OffsetDateTime;
use utoipa::ToSchema;

use crate::{
    course::Quiz,
    error::{Error, Result},
    student::results::QuizResult,
};

/// Minimum percentage of correct answers for a pass.
pub const PASS_PERCENTAGE: u32 = 70;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, ToSchema)]
pub struct Grade {
    pub score: u32,
    pub total: u32,
    pub percentage: f64,
    pub passed: bool,
}

impl Grade {
    pub fn into_result(self, quiz_id: i64, completed_at: OffsetDateTime) -> QuizResult {
        QuizResult::new(quiz_id, self.score, self.total, completed_at)
    }
}

/// Integer comparison, so 7/10 is exactly on the threshold.
pub fn is_passing(score: u32, total: u32) -> bool {
    total > 0 && u64::from(score) * 100 >= u64::from(total) * u64::from(PASS_PERCENTAGE)
}

/// Score `answers` against the quiz's answer key.
///
/// `answers[i]` is the chosen option index for question `i`. Extra answers
/// are ignored; missing or `None` answers count as wrong.
pub fn grade(quiz: &Quiz, answers: &[Option<usize>]) -> Result<Grade> {
    let total = quiz.questions.len();
    if total == 0 {
        return Err(Error::Validation(format!(
            "quiz {} has no questions",
            quiz.id
        )));
    }
    let score = quiz
        .questions
        .iter()
        .zip(answers.iter().map(Some).chain(std::iter::repeat(None)))
        .filter(|(q, a)| matches!(a, Some(Some(idx)) if *idx == q.correct_answer_index))
        .count();
    let (score, total) = (score as u32, total as u32);
    Ok(Grade {
        score,
        total,
        percentage: 100.0 * f64::from(score) / f64::from(total),
        passed: is_passing(score, total),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::course::Question;

    fn quiz(answers: &[usize]) -> Quiz {
        Quiz {
            id: 1,
            course_id: 1,
            title: "Borrowing".to_string(),
            questions: answers
                .iter()
                .map(|&a| Question {
                    question: "?".to_string(),
                    options: vec!["a".into(), "b".into(), "c".into(), "d".into()],
                    correct_answer_index: a,
                })
                .collect(),
        }
    }

    #[test]
    fn test_all_correct_and_all_wrong() {
        for n in 1..=12 {
            let key: Vec<usize> = (0..n).map(|i| i % 4).collect();
            let q = quiz(&key);
            let right: Vec<_> = key.iter().map(|&k| Some(k)).collect();
            let g = grade(&q, &right).unwrap();
            assert_eq!((g.score, g.total, g.percentage, g.passed), (n as u32, n as u32, 100.0, true));

            let wrong: Vec<_> = key.iter().map(|&k| Some((k + 1) % 4)).collect();
            let g = grade(&q, &wrong).unwrap();
            assert_eq!((g.score, g.passed), (0, false));
        }
    }

    #[test]
    fn test_pass_boundary() {
        let q = quiz(&[0; 10]);
        let mut answers = vec![Some(1); 10];
        for a in answers.iter_mut().take(6) {
            *a = Some(0);
        }
        let g = grade(&q, &answers).unwrap();
        assert_eq!(g.score, 6);
        assert!(!g.passed);

        answers[6] = Some(0);
        let g = grade(&q, &answers).unwrap();
        assert_eq!(g.score, 7);
        assert_eq!(g.percentage, 70.0);
        assert!(g.passed);
    }

    #[test]
    fn test_short_and_long_answer_lists() {
        let q = quiz(&[2, 1, 0]);
        let g = grade(&q, &[Some(2)]).unwrap();
        assert_eq!((g.score, g.total), (1, 3));

        let g = grade(&q, &[Some(2), None, Some(0), Some(3), Some(3)]).unwrap();
        assert_eq!((g.score, g.total), (2, 3));

        let g = grade(&q, &[]).unwrap();
        assert_eq!(g.score, 0);
    }

    #[test]
    fn test_empty_quiz_rejected() {
        let q = quiz(&[]);
        assert!(matches!(grade(&q, &[Some(0)]), Err(Error::Validation(_))));
    }

    #[test]
    fn test_is_passing() {
        assert!(is_passing(7, 10));
        assert!(!is_passing(6, 10));
        assert!(is_passing(3, 3));
        assert!(!is_passing(2, 3));
        assert!(!is_passing(0, 0));
    }
}
