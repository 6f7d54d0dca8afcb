use std::{
    collections::{BTreeMap, BTreeSet},
    sync::atomic::{AtomicI64, Ordering},
};

use dashmap::DashMap;
use futures::{FutureExt, future::BoxFuture};

use super::Store;
use crate::{
    certificate::CertificateRecord,
    course::{Course, Lesson, NewCourse, NewLesson, NewQuiz, Quiz},
    error::{Error, Result},
    student::{NewUser, Role, Student, results::QuizResult},
    utils::now,
};

/// Volatile store for tests and throwaway servers. Writes to one record
/// happen under its shard lock, so the version check and the write are a
/// single step.
#[derive(Debug, Default)]
pub struct MemoryStore {
    next_id: AtomicI64,
    users: DashMap<i64, (Student, String)>,
    courses: DashMap<i64, Course>,
    lessons: DashMap<i64, Lesson>,
    quizzes: DashMap<i64, Quiz>,
    attempts: DashMap<(i64, i64), Vec<QuizResult>>,
    certificates: DashMap<String, CertificateRecord>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn next_id(&self) -> i64 {
        self.next_id.fetch_add(1, Ordering::Relaxed) + 1
    }
}

impl Store for MemoryStore {
    fn create_user<'a>(
        &'a self,
        user: &'a NewUser,
        password_hash: String,
        role: Role,
    ) -> BoxFuture<'a, Result<Student>> {
        async move {
            if self.users.iter().any(|e| e.value().0.email == user.email) {
                return Err(Error::Validation(format!(
                    "email {} already registered",
                    user.email
                )));
            }
            let student = Student {
                id: self.next_id(),
                name: user.name.clone(),
                email: user.email.clone(),
                role,
                completed_lessons: BTreeSet::new(),
                quiz_results: BTreeMap::new(),
                version: 0,
            };
            self.users
                .insert(student.id, (student.clone(), password_hash));
            Ok(student)
        }
        .boxed()
    }

    fn find_user_by_email<'a>(&'a self, email: &'a str) -> BoxFuture<'a, Result<(Student, String)>> {
        async move {
            self.users
                .iter()
                .find(|e| e.value().0.email == email)
                .map(|e| e.value().clone())
                .ok_or_else(|| Error::NotFound(format!("user {email}")))
        }
        .boxed()
    }

    fn get_student(&self, id: i64) -> BoxFuture<'_, Result<Student>> {
        async move {
            self.users
                .get(&id)
                .map(|e| e.value().0.clone())
                .ok_or_else(|| Error::not_found("student", id))
        }
        .boxed()
    }

    fn save_student<'a>(&'a self, student: &'a Student) -> BoxFuture<'a, Result<Student>> {
        async move {
            let mut entry = self
                .users
                .get_mut(&student.id)
                .ok_or_else(|| Error::not_found("student", student.id))?;
            let stored = &mut entry.value_mut().0;
            if stored.version != student.version {
                return Err(Error::Conflict(student.id));
            }
            stored.completed_lessons = student.completed_lessons.clone();
            stored.quiz_results = student.quiz_results.clone();
            stored.version += 1;
            Ok(stored.clone())
        }
        .boxed()
    }

    fn set_role(&self, id: i64, role: Role) -> BoxFuture<'_, Result<()>> {
        async move {
            let mut entry = self
                .users
                .get_mut(&id)
                .ok_or_else(|| Error::not_found("user", id))?;
            entry.value_mut().0.role = role;
            Ok(())
        }
        .boxed()
    }

    fn create_course<'a>(
        &'a self,
        course: &'a NewCourse,
        instructor_id: i64,
    ) -> BoxFuture<'a, Result<Course>> {
        async move {
            let course = Course {
                id: self.next_id(),
                title: course.title.trim().to_string(),
                description: course.description.trim().to_string(),
                category: course.category(),
                level: course.level.unwrap_or_default(),
                instructor_id,
                lesson_ids: Vec::new(),
                quiz_ids: BTreeSet::new(),
                students: BTreeSet::new(),
                created_at: now(),
            };
            self.courses.insert(course.id, course.clone());
            Ok(course)
        }
        .boxed()
    }

    fn get_course(&self, id: i64) -> BoxFuture<'_, Result<Course>> {
        async move {
            self.courses
                .get(&id)
                .map(|c| c.value().clone())
                .ok_or_else(|| Error::not_found("course", id))
        }
        .boxed()
    }

    fn list_courses(&self) -> BoxFuture<'_, Result<Vec<Course>>> {
        async move {
            let mut courses: Vec<Course> = self.courses.iter().map(|c| c.value().clone()).collect();
            courses.sort_by_key(|c| c.id);
            Ok(courses)
        }
        .boxed()
    }

    fn add_lesson<'a>(&'a self, lesson: &'a NewLesson) -> BoxFuture<'a, Result<Lesson>> {
        async move {
            let mut course = self
                .courses
                .get_mut(&lesson.course_id)
                .ok_or_else(|| Error::not_found("course", lesson.course_id))?;
            let lesson = Lesson {
                id: self.next_id(),
                course_id: lesson.course_id,
                title: lesson.title.clone(),
                content: lesson.content.clone(),
                video_url: lesson.video_url.clone(),
            };
            course.lesson_ids.push(lesson.id);
            self.lessons.insert(lesson.id, lesson.clone());
            Ok(lesson)
        }
        .boxed()
    }

    fn get_lesson(&self, id: i64) -> BoxFuture<'_, Result<Lesson>> {
        async move {
            self.lessons
                .get(&id)
                .map(|l| l.value().clone())
                .ok_or_else(|| Error::not_found("lesson", id))
        }
        .boxed()
    }

    fn list_lessons(&self, course_id: i64) -> BoxFuture<'_, Result<Vec<Lesson>>> {
        async move {
            let course = self.get_course(course_id).await?;
            Ok(course
                .lesson_ids
                .iter()
                .filter_map(|id| self.lessons.get(id).map(|l| l.value().clone()))
                .collect())
        }
        .boxed()
    }

    fn add_quiz<'a>(&'a self, quiz: &'a NewQuiz) -> BoxFuture<'a, Result<Quiz>> {
        async move {
            let mut course = self
                .courses
                .get_mut(&quiz.course_id)
                .ok_or_else(|| Error::not_found("course", quiz.course_id))?;
            let quiz = Quiz {
                id: self.next_id(),
                course_id: quiz.course_id,
                title: quiz.title.clone(),
                questions: quiz.questions.clone(),
            };
            course.quiz_ids.insert(quiz.id);
            self.quizzes.insert(quiz.id, quiz.clone());
            Ok(quiz)
        }
        .boxed()
    }

    fn get_quiz(&self, id: i64) -> BoxFuture<'_, Result<Quiz>> {
        async move {
            self.quizzes
                .get(&id)
                .map(|q| q.value().clone())
                .ok_or_else(|| Error::not_found("quiz", id))
        }
        .boxed()
    }

    fn list_quizzes(&self, course_id: i64) -> BoxFuture<'_, Result<Vec<Quiz>>> {
        async move {
            let mut quizzes: Vec<Quiz> = self
                .quizzes
                .iter()
                .filter(|q| q.value().course_id == course_id)
                .map(|q| q.value().clone())
                .collect();
            quizzes.sort_by_key(|q| q.id);
            Ok(quizzes)
        }
        .boxed()
    }

    fn enroll(&self, course_id: i64, student_id: i64) -> BoxFuture<'_, Result<bool>> {
        async move {
            let mut course = self
                .courses
                .get_mut(&course_id)
                .ok_or_else(|| Error::not_found("course", course_id))?;
            Ok(course.students.insert(student_id))
        }
        .boxed()
    }

    fn record_attempt<'a>(
        &'a self,
        student_id: i64,
        attempt: &'a QuizResult,
    ) -> BoxFuture<'a, Result<()>> {
        async move {
            self.attempts
                .entry((student_id, attempt.quiz_id))
                .or_default()
                .push(attempt.clone());
            Ok(())
        }
        .boxed()
    }

    fn list_attempts(
        &self,
        student_id: i64,
        quiz_id: i64,
    ) -> BoxFuture<'_, Result<Vec<QuizResult>>> {
        async move {
            Ok(self
                .attempts
                .get(&(student_id, quiz_id))
                .map(|a| a.value().clone())
                .unwrap_or_default())
        }
        .boxed()
    }

    fn save_certificate<'a>(&'a self, record: &'a CertificateRecord) -> BoxFuture<'a, Result<()>> {
        async move {
            self.certificates.insert(record.name.clone(), record.clone());
            Ok(())
        }
        .boxed()
    }

    fn get_certificate<'a>(&'a self, name: &'a str) -> BoxFuture<'a, Result<CertificateRecord>> {
        async move {
            self.certificates
                .get(name)
                .map(|c| c.value().clone())
                .ok_or_else(|| Error::NotFound(format!("certificate {name}")))
        }
        .boxed()
    }

    fn list_certificates(&self, student_id: i64) -> BoxFuture<'_, Result<Vec<CertificateRecord>>> {
        async move {
            let mut records: Vec<CertificateRecord> = self
                .certificates
                .iter()
                .filter(|c| c.value().student_id == student_id)
                .map(|c| c.value().clone())
                .collect();
            records.sort_by(|a, b| b.issued_at.cmp(&a.issued_at));
            Ok(records)
        }
        .boxed()
    }
}
