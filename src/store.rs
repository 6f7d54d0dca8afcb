pub mod memory;
pub mod sqlite;

use futures::future::BoxFuture;

use crate::{
    certificate::CertificateRecord,
    course::{Course, Lesson, NewCourse, NewLesson, NewQuiz, Quiz},
    error::Result,
    student::{NewUser, Role, Student, results::QuizResult},
};

pub use memory::MemoryStore;
pub use sqlite::SqliteStore;

/// Durable storage for users, courses and issued certificates.
///
/// Lookups by id fail with `Error::NotFound` when nothing matches.
/// `save_student` is a compare-and-swap on `Student::version`: it writes
/// only if the stored version still equals the one passed in, and fails
/// with `Error::Conflict` otherwise.
pub trait Store: Send + Sync {
    fn create_user<'a>(
        &'a self,
        user: &'a NewUser,
        password_hash: String,
        role: Role,
    ) -> BoxFuture<'a, Result<Student>>;

    /// Returns the user and its password hash.
    fn find_user_by_email<'a>(&'a self, email: &'a str) -> BoxFuture<'a, Result<(Student, String)>>;

    fn get_student(&self, id: i64) -> BoxFuture<'_, Result<Student>>;

    /// Returns the stored record with its new version.
    fn save_student<'a>(&'a self, student: &'a Student) -> BoxFuture<'a, Result<Student>>;

    fn set_role(&self, id: i64, role: Role) -> BoxFuture<'_, Result<()>>;

    fn create_course<'a>(
        &'a self,
        course: &'a NewCourse,
        instructor_id: i64,
    ) -> BoxFuture<'a, Result<Course>>;

    fn get_course(&self, id: i64) -> BoxFuture<'_, Result<Course>>;

    fn list_courses(&self) -> BoxFuture<'_, Result<Vec<Course>>>;

    /// Appends the lesson to its course's lesson order.
    fn add_lesson<'a>(&'a self, lesson: &'a NewLesson) -> BoxFuture<'a, Result<Lesson>>;

    fn get_lesson(&self, id: i64) -> BoxFuture<'_, Result<Lesson>>;

    fn list_lessons(&self, course_id: i64) -> BoxFuture<'_, Result<Vec<Lesson>>>;

    fn add_quiz<'a>(&'a self, quiz: &'a NewQuiz) -> BoxFuture<'a, Result<Quiz>>;

    fn get_quiz(&self, id: i64) -> BoxFuture<'_, Result<Quiz>>;

    fn list_quizzes(&self, course_id: i64) -> BoxFuture<'_, Result<Vec<Quiz>>>;

    /// Returns false if the student was already enrolled.
    fn enroll(&self, course_id: i64, student_id: i64) -> BoxFuture<'_, Result<bool>>;

    /// Append a graded attempt to the student's history.
    fn record_attempt<'a>(
        &'a self,
        student_id: i64,
        attempt: &'a QuizResult,
    ) -> BoxFuture<'a, Result<()>>;

    /// Attempts for one quiz, oldest first.
    fn list_attempts(&self, student_id: i64, quiz_id: i64)
    -> BoxFuture<'_, Result<Vec<QuizResult>>>;

    /// Insert or replace by name.
    fn save_certificate<'a>(&'a self, record: &'a CertificateRecord) -> BoxFuture<'a, Result<()>>;

    fn get_certificate<'a>(&'a self, name: &'a str) -> BoxFuture<'a, Result<CertificateRecord>>;

    fn list_certificates(&self, student_id: i64) -> BoxFuture<'_, Result<Vec<CertificateRecord>>>;
}
