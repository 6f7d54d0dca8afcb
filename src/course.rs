use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use utoipa::ToSchema;

use crate::error::{Error, Result};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub enum Level {
    #[default]
    Beginner,
    Intermediate,
    Advanced,
}

impl Level {
    pub fn as_str(&self) -> &'static str {
        match self {
            Level::Beginner => "Beginner",
            Level::Intermediate => "Intermediate",
            Level::Advanced => "Advanced",
        }
    }
}

impl std::str::FromStr for Level {
    type Err = Error;
    fn from_str(s: &str) -> Result<Self> {
        match s {
            "Beginner" => Ok(Level::Beginner),
            "Intermediate" => Ok(Level::Intermediate),
            "Advanced" => Ok(Level::Advanced),
            other => Err(Error::Validation(format!("unknown level '{other}'"))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Course {
    pub id: i64,
    pub title: String,
    pub description: String,
    pub category: String,
    pub level: Level,
    pub instructor_id: i64,
    /// Lessons in teaching order.
    pub lesson_ids: Vec<i64>,
    pub quiz_ids: BTreeSet<i64>,
    /// Enrolled students.
    #[serde(skip_serializing, default)]
    #[schema(ignore)]
    pub students: BTreeSet<i64>,
    #[serde(with = "time::serde::rfc3339")]
    #[schema(value_type = String)]
    pub created_at: OffsetDateTime,
}

impl Course {
    pub fn is_enrolled(&self, student_id: i64) -> bool {
        self.students.contains(&student_id)
    }
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct NewCourse {
    pub title: String,
    pub description: String,
    pub category: Option<String>,
    pub level: Option<Level>,
}

impl NewCourse {
    pub fn validate(&self) -> Result<()> {
        if self.title.trim().is_empty() || self.description.trim().is_empty() {
            return Err(Error::Validation(
                "title and description required".to_string(),
            ));
        }
        Ok(())
    }

    pub fn category(&self) -> String {
        match &self.category {
            Some(c) if !c.trim().is_empty() => c.trim().to_string(),
            _ => "General".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Lesson {
    pub id: i64,
    pub course_id: i64,
    pub title: String,
    pub content: Option<String>,
    pub video_url: Option<String>,
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct NewLesson {
    pub course_id: i64,
    pub title: String,
    pub content: Option<String>,
    pub video_url: Option<String>,
}

impl NewLesson {
    pub fn validate(&self) -> Result<()> {
        if self.title.trim().is_empty() {
            return Err(Error::Validation("lesson title required".to_string()));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Question {
    pub question: String,
    pub options: Vec<String>,
    pub correct_answer_index: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Quiz {
    pub id: i64,
    pub course_id: i64,
    pub title: String,
    pub questions: Vec<Question>,
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct NewQuiz {
    pub course_id: i64,
    pub title: String,
    pub questions: Vec<Question>,
}

impl NewQuiz {
    /// Every question needs at least two options and an answer key that
    /// points at one of them.
    pub fn validate(&self) -> Result<()> {
        if self.title.trim().is_empty() {
            return Err(Error::Validation("quiz title required".to_string()));
        }
        if self.questions.is_empty() {
            return Err(Error::Validation(
                "quiz must have at least one question".to_string(),
            ));
        }
        for (idx, q) in self.questions.iter().enumerate() {
            if q.options.len() < 2 {
                return Err(Error::Validation(format!(
                    "question {} needs at least two options",
                    idx + 1
                )));
            }
            if q.correct_answer_index >= q.options.len() {
                return Err(Error::Validation(format!(
                    "question {} answer index {} out of range",
                    idx + 1,
                    q.correct_answer_index
                )));
            }
        }
        Ok(())
    }
}

/// A question as shown to students, without its answer key.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct QuestionView {
    pub question: String,
    pub options: Vec<String>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct QuizView {
    pub id: i64,
    pub course_id: i64,
    pub title: String,
    pub questions: Vec<QuestionView>,
}

impl From<&Quiz> for QuizView {
    fn from(quiz: &Quiz) -> Self {
        Self {
            id: quiz.id,
            course_id: quiz.course_id,
            title: quiz.title.clone(),
            questions: quiz
                .questions
                .iter()
                .map(|q| QuestionView {
                    question: q.question.clone(),
                    options: q.options.clone(),
                })
                .collect(),
        }
    }
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct CourseDetail {
    #[serde(flatten)]
    pub course: Course,
    pub lessons: Vec<Lesson>,
}
