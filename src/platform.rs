use std::sync::Arc;

use serde::Serialize;
use tracing::{info, warn};
use utoipa::ToSchema;

use crate::{
    certificate::{CertificateRecord, CertificationService, render::Renderer},
    config::Config,
    course::{Course, CourseDetail, Lesson, NewCourse, NewLesson, NewQuiz, Quiz, QuizView},
    error::{Error, Result},
    grading,
    policy::{authorize, ensure_enrolled, ensure_instructor_of},
    store::Store,
    student::{
        self, Identity, NewUser, Role, Student, progress::is_course_complete, results::QuizResult,
    },
    utils::now,
};

/// What a quiz submission reports back.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct SubmissionOutcome {
    pub quiz_id: i64,
    pub score: u32,
    pub total: u32,
    pub percentage: f64,
    pub passed: bool,
    /// Whether this attempt became the stored result.
    pub improved: bool,
    /// The stored result after merging.
    pub effective: QuizResult,
    /// Artifact name, present when a certificate was issued.
    pub certificate: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct ProgressReport {
    pub course_id: i64,
    pub lesson_id: i64,
    pub completed: usize,
    pub total: usize,
    pub course_complete: bool,
}

/// Entry point for every operation; each takes the caller's identity and
/// checks its own permissions.
pub struct Platform {
    pub store: Arc<dyn Store>,
    pub certificates: CertificationService,
    max_save_retries: usize,
    admin_emails: Vec<String>,
}

impl Platform {
    pub fn new(store: Arc<dyn Store>, renderer: Arc<dyn Renderer>, config: &Config) -> Self {
        let certificates =
            CertificationService::new(store.clone(), renderer, &config.certificate_dir);
        Self {
            store,
            certificates,
            max_save_retries: config.max_save_retries,
            admin_emails: config.admin_emails.clone(),
        }
    }

    /// Read, transform, and conditionally write a student record.
    ///
    /// `change` must be a pure function of the record it is given since it
    /// runs again on every lost race. Unchanged records are not written.
    pub async fn mutate_student<T, F>(&self, id: i64, mut change: F) -> Result<(Student, T)>
    where
        T: Send,
        F: FnMut(&mut Student) -> T + Send,
    {
        let mut retries = 0;
        loop {
            let current = self.store.get_student(id).await?;
            let mut next = current.clone();
            let out = change(&mut next);
            if next == current {
                return Ok((current, out));
            }
            match self.store.save_student(&next).await {
                Ok(saved) => return Ok((saved, out)),
                Err(Error::Conflict(_)) if retries < self.max_save_retries => {
                    retries += 1;
                    warn!("student {} changed concurrently, retry {}", id, retries);
                    tokio::task::yield_now().await;
                }
                Err(e) => return Err(e),
            }
        }
    }

    pub async fn register(&self, user: NewUser) -> Result<Student> {
        user.validate()?;
        let password = user.password.clone();
        let hash = tokio::task::spawn_blocking(move || student::hash_password(&password))
            .await
            .map_err(|e| Error::Fatal(e.into()))??;
        let role = if self.admin_emails.contains(&user.email) {
            Role::Admin
        } else {
            Role::Student
        };
        let student = self.store.create_user(&user, hash, role).await?;
        info!("registered user {} <{}>", student.id, student.email);
        Ok(student)
    }

    pub async fn login(&self, email: &str, password: &str) -> Result<Student> {
        let (student, hash) = match self.store.find_user_by_email(email).await {
            Ok(found) => found,
            Err(Error::NotFound(_)) => return Err(Error::Unauthorized),
            Err(e) => return Err(e),
        };
        let password = password.to_string();
        tokio::task::spawn_blocking(move || student::verify_password(&password, &hash))
            .await
            .map_err(|e| Error::Fatal(e.into()))??;
        Ok(student)
    }

    pub async fn identity(&self, user_id: i64) -> Result<Identity> {
        Ok(self.store.get_student(user_id).await?.identity())
    }

    pub async fn set_role(&self, identity: &Identity, user_id: i64, role: Role) -> Result<()> {
        authorize(identity, &[Role::Admin])?;
        self.store.set_role(user_id, role).await?;
        info!("user {} is now {}", user_id, role.as_str());
        Ok(())
    }

    pub async fn create_course(&self, identity: &Identity, course: NewCourse) -> Result<Course> {
        authorize(identity, &[Role::Instructor])?;
        course.validate()?;
        let course = self.store.create_course(&course, identity.id).await?;
        info!("instructor {} created course {}", identity.id, course.id);
        Ok(course)
    }

    pub async fn add_lesson(&self, identity: &Identity, lesson: NewLesson) -> Result<Lesson> {
        lesson.validate()?;
        let course = self.store.get_course(lesson.course_id).await?;
        ensure_instructor_of(identity, &course)?;
        self.store.add_lesson(&lesson).await
    }

    pub async fn add_quiz(&self, identity: &Identity, quiz: NewQuiz) -> Result<Quiz> {
        quiz.validate()?;
        let course = self.store.get_course(quiz.course_id).await?;
        ensure_instructor_of(identity, &course)?;
        self.store.add_quiz(&quiz).await
    }

    pub async fn instructor_courses(&self, identity: &Identity) -> Result<Vec<Course>> {
        authorize(identity, &[Role::Instructor])?;
        let courses = self.store.list_courses().await?;
        Ok(courses
            .into_iter()
            .filter(|c| c.instructor_id == identity.id)
            .collect())
    }

    pub async fn list_courses(&self) -> Result<Vec<Course>> {
        self.store.list_courses().await
    }

    pub async fn course_detail(&self, course_id: i64) -> Result<CourseDetail> {
        let course = self.store.get_course(course_id).await?;
        let lessons = self.store.list_lessons(course_id).await?;
        Ok(CourseDetail { course, lessons })
    }

    pub async fn enroll(&self, identity: &Identity, course_id: i64) -> Result<Course> {
        authorize(identity, &[Role::Student])?;
        if !self.store.enroll(course_id, identity.id).await? {
            return Err(Error::Validation("Already enrolled".to_string()));
        }
        info!("student {} enrolled in course {}", identity.id, course_id);
        self.store.get_course(course_id).await
    }

    pub async fn enrolled_courses(&self, identity: &Identity) -> Result<Vec<Course>> {
        authorize(identity, &[Role::Student])?;
        let courses = self.store.list_courses().await?;
        Ok(courses
            .into_iter()
            .filter(|c| c.is_enrolled(identity.id))
            .collect())
    }

    /// Quizzes of a course with answer keys removed.
    pub async fn course_quizzes(&self, identity: &Identity, course_id: i64) -> Result<Vec<QuizView>> {
        let course = self.store.get_course(course_id).await?;
        if course.instructor_id != identity.id {
            ensure_enrolled(identity, &course)?;
        }
        let quizzes = self.store.list_quizzes(course_id).await?;
        Ok(quizzes.iter().map(QuizView::from).collect())
    }

    pub async fn complete_lesson(&self, identity: &Identity, lesson_id: i64) -> Result<ProgressReport> {
        authorize(identity, &[Role::Student])?;
        let lesson = self.store.get_lesson(lesson_id).await?;
        let course = self.store.get_course(lesson.course_id).await?;
        ensure_enrolled(identity, &course)?;
        let (student, newly) = self
            .mutate_student(identity.id, |s| s.mark_lesson_complete(lesson_id))
            .await?;
        if newly {
            info!("student {} completed lesson {}", identity.id, lesson_id);
        }
        Ok(ProgressReport {
            course_id: course.id,
            lesson_id,
            completed: student.completed_in(&course).count(),
            total: course.lesson_ids.len(),
            course_complete: is_course_complete(&student, &course),
        })
    }

    /// Grade, merge into the stored best result, and issue a certificate if
    /// the effective result is a pass.
    pub async fn submit_quiz(
        &self,
        identity: &Identity,
        quiz_id: i64,
        answers: &[Option<usize>],
    ) -> Result<SubmissionOutcome> {
        authorize(identity, &[Role::Student])?;
        let quiz = self.store.get_quiz(quiz_id).await?;
        let course = self.store.get_course(quiz.course_id).await?;
        ensure_enrolled(identity, &course)?;
        let grade = grading::grade(&quiz, answers)?;
        let attempt = grade.into_result(quiz.id, now());
        let (student, merged) = self
            .mutate_student(identity.id, |s| s.upsert_result(attempt.clone()))
            .await?;
        // history only holds attempts that were merged
        self.store.record_attempt(identity.id, &attempt).await?;
        let certificate = self
            .certificates
            .on_quiz_result(&student, &course, &merged.effective)
            .await
            .map(|record| record.name);
        Ok(SubmissionOutcome {
            quiz_id,
            score: grade.score,
            total: grade.total,
            percentage: grade.percentage,
            passed: grade.passed,
            improved: merged.improved,
            effective: merged.effective,
            certificate,
        })
    }

    /// Every graded attempt at a quiz, oldest first.
    pub async fn quiz_attempts(&self, identity: &Identity, quiz_id: i64) -> Result<Vec<QuizResult>> {
        authorize(identity, &[Role::Student])?;
        self.store.get_quiz(quiz_id).await?;
        self.store.list_attempts(identity.id, quiz_id).await
    }

    pub async fn request_certificate(
        &self,
        identity: &Identity,
        course_id: i64,
    ) -> Result<CertificateRecord> {
        authorize(identity, &[Role::Student])?;
        let course = self.store.get_course(course_id).await?;
        ensure_enrolled(identity, &course)?;
        let student = self.store.get_student(identity.id).await?;
        self.certificates.request(&student, &course).await
    }

    pub async fn student_certificates(&self, identity: &Identity) -> Result<Vec<CertificateRecord>> {
        self.certificates.list(identity.id).await
    }

    pub async fn open_certificate(
        &self,
        identity: &Identity,
        name: &str,
    ) -> Result<(CertificateRecord, Vec<u8>)> {
        let (record, path) = self.certificates.open(identity, name).await?;
        let content = match tokio::fs::read(&path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                warn!("certificate file {} is missing", path.display());
                return Err(Error::NotFound(format!("certificate {name}")));
            }
            Err(e) => return Err(Error::RenderFailure(e)),
        };
        Ok((record, content))
    }
}

#[cfg(test)]
mod tests {
    use futures::future::BoxFuture;

    use super::*;
    use crate::{certificate::render::HtmlRenderer, course::Question, store::MemoryStore};

    /// Every student write loses the version race.
    struct ContendedStore(MemoryStore);

    impl Store for ContendedStore {
        fn create_user<'a>(
            &'a self,
            user: &'a NewUser,
            password_hash: String,
            role: Role,
        ) -> BoxFuture<'a, Result<Student>> {
            self.0.create_user(user, password_hash, role)
        }
        fn find_user_by_email<'a>(&'a self, email: &'a str) -> BoxFuture<'a, Result<(Student, String)>> {
            self.0.find_user_by_email(email)
        }
        fn get_student(&self, id: i64) -> BoxFuture<'_, Result<Student>> {
            self.0.get_student(id)
        }
        fn save_student<'a>(&'a self, student: &'a Student) -> BoxFuture<'a, Result<Student>> {
            Box::pin(async move { Err(Error::Conflict(student.id)) })
        }
        fn set_role(&self, id: i64, role: Role) -> BoxFuture<'_, Result<()>> {
            self.0.set_role(id, role)
        }
        fn create_course<'a>(
            &'a self,
            course: &'a NewCourse,
            instructor_id: i64,
        ) -> BoxFuture<'a, Result<Course>> {
            self.0.create_course(course, instructor_id)
        }
        fn get_course(&self, id: i64) -> BoxFuture<'_, Result<Course>> {
            self.0.get_course(id)
        }
        fn list_courses(&self) -> BoxFuture<'_, Result<Vec<Course>>> {
            self.0.list_courses()
        }
        fn add_lesson<'a>(&'a self, lesson: &'a NewLesson) -> BoxFuture<'a, Result<Lesson>> {
            self.0.add_lesson(lesson)
        }
        fn get_lesson(&self, id: i64) -> BoxFuture<'_, Result<Lesson>> {
            self.0.get_lesson(id)
        }
        fn list_lessons(&self, course_id: i64) -> BoxFuture<'_, Result<Vec<Lesson>>> {
            self.0.list_lessons(course_id)
        }
        fn add_quiz<'a>(&'a self, quiz: &'a NewQuiz) -> BoxFuture<'a, Result<Quiz>> {
            self.0.add_quiz(quiz)
        }
        fn get_quiz(&self, id: i64) -> BoxFuture<'_, Result<Quiz>> {
            self.0.get_quiz(id)
        }
        fn list_quizzes(&self, course_id: i64) -> BoxFuture<'_, Result<Vec<Quiz>>> {
            self.0.list_quizzes(course_id)
        }
        fn enroll(&self, course_id: i64, student_id: i64) -> BoxFuture<'_, Result<bool>> {
            self.0.enroll(course_id, student_id)
        }
        fn record_attempt<'a>(
            &'a self,
            student_id: i64,
            attempt: &'a QuizResult,
        ) -> BoxFuture<'a, Result<()>> {
            self.0.record_attempt(student_id, attempt)
        }
        fn list_attempts(&self, student_id: i64, quiz_id: i64) -> BoxFuture<'_, Result<Vec<QuizResult>>> {
            self.0.list_attempts(student_id, quiz_id)
        }
        fn save_certificate<'a>(&'a self, record: &'a CertificateRecord) -> BoxFuture<'a, Result<()>> {
            self.0.save_certificate(record)
        }
        fn get_certificate<'a>(&'a self, name: &'a str) -> BoxFuture<'a, Result<CertificateRecord>> {
            self.0.get_certificate(name)
        }
        fn list_certificates(&self, student_id: i64) -> BoxFuture<'_, Result<Vec<CertificateRecord>>> {
            self.0.list_certificates(student_id)
        }
    }

    #[tokio::test]
    async fn test_lost_merge_leaves_history_unchanged() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config {
            certificate_dir: dir.path().to_path_buf(),
            max_save_retries: 2,
            ..Config::default()
        };
        let store = Arc::new(ContendedStore(MemoryStore::new()));
        let platform = Platform::new(store.clone(), Arc::new(HtmlRenderer), &config);
        let user = |email: &str| NewUser {
            name: "Ada".into(),
            email: email.into(),
            password: "secret1".into(),
        };
        let instructor = store
            .create_user(&user("grace@example.com"), "h".into(), Role::Instructor)
            .await
            .unwrap();
        let student = store
            .create_user(&user("ada@example.com"), "h".into(), Role::Student)
            .await
            .unwrap();
        let course = NewCourse {
            title: "Rust".into(),
            description: "Basics".into(),
            category: None,
            level: None,
        };
        let course = store.create_course(&course, instructor.id).await.unwrap();
        let quiz = NewQuiz {
            course_id: course.id,
            title: "Check".into(),
            questions: vec![Question {
                question: "1+1".into(),
                options: vec!["1".into(), "2".into()],
                correct_answer_index: 1,
            }],
        };
        let quiz = store.add_quiz(&quiz).await.unwrap();
        store.enroll(course.id, student.id).await.unwrap();

        let outcome = platform
            .submit_quiz(&student.identity(), quiz.id, &[Some(1)])
            .await;
        assert!(matches!(outcome, Err(Error::Conflict(_))));
        assert!(store.list_attempts(student.id, quiz.id).await.unwrap().is_empty());
        let stored = store.get_student(student.id).await.unwrap();
        assert!(stored.quiz_results.is_empty());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_lesson_completions_all_land() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config {
            certificate_dir: dir.path().to_path_buf(),
            max_save_retries: 64,
            ..Config::default()
        };
        let platform = Arc::new(Platform::new(
            Arc::new(MemoryStore::new()),
            Arc::new(HtmlRenderer),
            &config,
        ));
        let student = platform
            .register(NewUser {
                name: "Ada".into(),
                email: "ada@example.com".into(),
                password: "secret1".into(),
            })
            .await
            .unwrap();

        let id = student.id;
        let mut handles = vec![];
        for lesson in 0..16 {
            let platform = platform.clone();
            handles.push(tokio::spawn(async move {
                platform
                    .mutate_student(id, |s| s.mark_lesson_complete(lesson))
                    .await
                    .unwrap();
            }));
        }
        for h in handles {
            h.await.unwrap();
        }
        let stored = platform.store.get_student(student.id).await.unwrap();
        assert_eq!(stored.completed_lessons.len(), 16);
        assert_eq!(stored.version, 16);
    }

    #[tokio::test]
    async fn test_unchanged_record_is_not_written() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config {
            certificate_dir: dir.path().to_path_buf(),
            ..Config::default()
        };
        let platform = Platform::new(Arc::new(MemoryStore::new()), Arc::new(HtmlRenderer), &config);
        let student = platform
            .register(NewUser {
                name: "Ada".into(),
                email: "ada@example.com".into(),
                password: "secret1".into(),
            })
            .await
            .unwrap();
        let (s, first) = platform
            .mutate_student(student.id, |s| s.mark_lesson_complete(1))
            .await
            .unwrap();
        let (again, second) = platform
            .mutate_student(student.id, |s| s.mark_lesson_complete(1))
            .await
            .unwrap();
        assert!(first);
        assert!(!second);
        assert_eq!(s.version, again.version);
    }
}
