use std::str::FromStr;

use futures::{FutureExt, future::BoxFuture};
use sqlx::{
    FromRow, SqlitePool,
    sqlite::{SqliteConnectOptions, SqlitePoolOptions},
};
use time::OffsetDateTime;
use tracing::info;

use super::Store;
use crate::{
    certificate::CertificateRecord,
    course::{Course, Lesson, NewCourse, NewLesson, NewQuiz, Quiz},
    error::{Error, Result},
    student::{NewUser, Role, Student, results::QuizResult},
    utils::now,
};

const SCHEMA: &[&str] = &[
    r#"create table if not exists student (
        id integer primary key autoincrement,
        name text not null,
        email text not null unique,
        password text not null,
        role text not null default 'student',
        completed_lessons text not null default '[]',
        quiz_results text not null default '{}',
        version integer not null default 0
    )"#,
    r#"create table if not exists course (
        id integer primary key autoincrement,
        title text not null,
        description text not null,
        category text not null,
        level text not null,
        instructor_id integer not null references student(id),
        created_at text not null
    )"#,
    r#"create table if not exists lesson (
        id integer primary key autoincrement,
        course_id integer not null references course(id),
        title text not null,
        content text,
        video_url text,
        position integer not null
    )"#,
    r#"create table if not exists quiz (
        id integer primary key autoincrement,
        course_id integer not null references course(id),
        title text not null,
        questions text not null
    )"#,
    r#"create table if not exists enrollment (
        course_id integer not null references course(id),
        student_id integer not null references student(id),
        primary key (course_id, student_id)
    )"#,
    r#"create table if not exists quiz_attempt (
        id integer primary key autoincrement,
        student_id integer not null references student(id),
        quiz_id integer not null references quiz(id),
        score integer not null,
        total integer not null,
        passed integer not null,
        completed_at text not null
    )"#,
    r#"create table if not exists certificate (
        name text primary key,
        student_id integer not null references student(id),
        course_id integer not null references course(id),
        student_name text not null,
        course_title text not null,
        issued_at text not null
    )"#,
];

#[derive(Debug, Clone)]
pub struct SqliteStore {
    pub database: SqlitePool,
}

#[derive(FromRow)]
struct StudentRow {
    id: i64,
    name: String,
    email: String,
    password: String,
    role: String,
    completed_lessons: String,
    quiz_results: String,
    version: i64,
}

impl StudentRow {
    fn into_student(self) -> Result<(Student, String)> {
        let student = Student {
            id: self.id,
            name: self.name,
            email: self.email,
            role: self.role.parse()?,
            completed_lessons: serde_json::from_str(&self.completed_lessons)?,
            quiz_results: serde_json::from_str(&self.quiz_results)?,
            version: self.version,
        };
        Ok((student, self.password))
    }
}

#[derive(FromRow)]
struct CourseRow {
    id: i64,
    title: String,
    description: String,
    category: String,
    level: String,
    instructor_id: i64,
    created_at: OffsetDateTime,
}

#[derive(FromRow)]
struct QuizRow {
    id: i64,
    course_id: i64,
    title: String,
    questions: String,
}

impl QuizRow {
    fn into_quiz(self) -> Result<Quiz> {
        Ok(Quiz {
            id: self.id,
            course_id: self.course_id,
            title: self.title,
            questions: serde_json::from_str(&self.questions)?,
        })
    }
}

#[derive(FromRow)]
struct AttemptRow {
    quiz_id: i64,
    score: i64,
    total: i64,
    passed: bool,
    completed_at: OffsetDateTime,
}

impl From<AttemptRow> for QuizResult {
    fn from(row: AttemptRow) -> Self {
        QuizResult {
            quiz_id: row.quiz_id,
            score: row.score as u32,
            total: row.total as u32,
            passed: row.passed,
            completed_at: row.completed_at,
        }
    }
}

const STUDENT_COLUMNS: &str =
    "select id, name, email, password, role, completed_lessons, quiz_results, version from student";

impl SqliteStore {
    pub fn new(database: SqlitePool) -> Self {
        Self { database }
    }

    /// Open (creating if needed) the database at `url` and apply the schema.
    pub async fn connect(url: &str) -> anyhow::Result<Self> {
        let options = SqliteConnectOptions::from_str(url)?
            .create_if_missing(true)
            .foreign_keys(true);
        // every connection to an in-memory url gets its own database
        let max_connections = if url.contains(":memory:") { 1 } else { 8 };
        let database = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .connect_with(options)
            .await?;
        let store = Self::new(database);
        store.migrate().await?;
        Ok(store)
    }

    pub async fn migrate(&self) -> anyhow::Result<()> {
        for statement in SCHEMA {
            sqlx::query(statement).execute(&self.database).await?;
        }
        info!("database schema ready");
        Ok(())
    }

    async fn load_course(&self, row: CourseRow) -> Result<Course> {
        let lesson_ids = sqlx::query_scalar::<_, i64>(
            "select id from lesson where course_id = ? order by position, id",
        )
        .bind(row.id)
        .fetch_all(&self.database)
        .await?;
        let quiz_ids = sqlx::query_scalar::<_, i64>("select id from quiz where course_id = ?")
            .bind(row.id)
            .fetch_all(&self.database)
            .await?;
        let students =
            sqlx::query_scalar::<_, i64>("select student_id from enrollment where course_id = ?")
                .bind(row.id)
                .fetch_all(&self.database)
                .await?;
        Ok(Course {
            id: row.id,
            title: row.title,
            description: row.description,
            category: row.category,
            level: row.level.parse()?,
            instructor_id: row.instructor_id,
            lesson_ids,
            quiz_ids: quiz_ids.into_iter().collect(),
            students: students.into_iter().collect(),
            created_at: row.created_at,
        })
    }

    async fn course_exists(&self, id: i64) -> Result<()> {
        sqlx::query_scalar::<_, i64>("select id from course where id = ?")
            .bind(id)
            .fetch_optional(&self.database)
            .await?
            .map(|_| ())
            .ok_or_else(|| Error::not_found("course", id))
    }
}

impl Store for SqliteStore {
    fn create_user<'a>(
        &'a self,
        user: &'a NewUser,
        password_hash: String,
        role: Role,
    ) -> BoxFuture<'a, Result<Student>> {
        async move {
            let result = sqlx::query(
                "insert or ignore into student (name, email, password, role) values (?, ?, ?, ?)",
            )
            .bind(&user.name)
            .bind(&user.email)
            .bind(&password_hash)
            .bind(role.as_str())
            .execute(&self.database)
            .await?;
            if result.rows_affected() == 0 {
                return Err(Error::Validation(format!(
                    "email {} already registered",
                    user.email
                )));
            }
            self.get_student(result.last_insert_rowid()).await
        }
        .boxed()
    }

    fn find_user_by_email<'a>(&'a self, email: &'a str) -> BoxFuture<'a, Result<(Student, String)>> {
        async move {
            sqlx::query_as::<_, StudentRow>(&format!("{STUDENT_COLUMNS} where email = ?"))
                .bind(email)
                .fetch_optional(&self.database)
                .await?
                .ok_or_else(|| Error::NotFound(format!("user {email}")))?
                .into_student()
        }
        .boxed()
    }

    fn get_student(&self, id: i64) -> BoxFuture<'_, Result<Student>> {
        async move {
            let row = sqlx::query_as::<_, StudentRow>(&format!("{STUDENT_COLUMNS} where id = ?"))
                .bind(id)
                .fetch_optional(&self.database)
                .await?
                .ok_or_else(|| Error::not_found("student", id))?;
            Ok(row.into_student()?.0)
        }
        .boxed()
    }

    fn save_student<'a>(&'a self, student: &'a Student) -> BoxFuture<'a, Result<Student>> {
        async move {
            let completed_lessons = serde_json::to_string(&student.completed_lessons)?;
            let quiz_results = serde_json::to_string(&student.quiz_results)?;
            let result = sqlx::query(
                "update student set completed_lessons = ?, quiz_results = ?, version = version + 1 \
                 where id = ? and version = ?",
            )
            .bind(completed_lessons)
            .bind(quiz_results)
            .bind(student.id)
            .bind(student.version)
            .execute(&self.database)
            .await?;
            if result.rows_affected() == 0 {
                // distinguish a missing record from a lost race
                self.get_student(student.id).await?;
                return Err(Error::Conflict(student.id));
            }
            Ok(Student {
                version: student.version + 1,
                ..student.clone()
            })
        }
        .boxed()
    }

    fn set_role(&self, id: i64, role: Role) -> BoxFuture<'_, Result<()>> {
        async move {
            let result = sqlx::query("update student set role = ? where id = ?")
                .bind(role.as_str())
                .bind(id)
                .execute(&self.database)
                .await?;
            if result.rows_affected() == 0 {
                return Err(Error::not_found("user", id));
            }
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
            let id = sqlx::query(
                "insert into course (title, description, category, level, instructor_id, created_at) \
                 values (?, ?, ?, ?, ?, ?)",
            )
            .bind(course.title.trim())
            .bind(course.description.trim())
            .bind(course.category())
            .bind(course.level.unwrap_or_default().as_str())
            .bind(instructor_id)
            .bind(now())
            .execute(&self.database)
            .await?
            .last_insert_rowid();
            self.get_course(id).await
        }
        .boxed()
    }

    fn get_course(&self, id: i64) -> BoxFuture<'_, Result<Course>> {
        async move {
            let row = sqlx::query_as::<_, CourseRow>("select * from course where id = ?")
                .bind(id)
                .fetch_optional(&self.database)
                .await?
                .ok_or_else(|| Error::not_found("course", id))?;
            self.load_course(row).await
        }
        .boxed()
    }

    fn list_courses(&self) -> BoxFuture<'_, Result<Vec<Course>>> {
        async move {
            let rows = sqlx::query_as::<_, CourseRow>("select * from course order by id")
                .fetch_all(&self.database)
                .await?;
            let mut courses = Vec::with_capacity(rows.len());
            for row in rows {
                courses.push(self.load_course(row).await?);
            }
            Ok(courses)
        }
        .boxed()
    }

    fn add_lesson<'a>(&'a self, lesson: &'a NewLesson) -> BoxFuture<'a, Result<Lesson>> {
        async move {
            self.course_exists(lesson.course_id).await?;
            let id = sqlx::query(
                "insert into lesson (course_id, title, content, video_url, position) \
                 select ?, ?, ?, ?, coalesce(max(position), 0) + 1 from lesson where course_id = ?",
            )
            .bind(lesson.course_id)
            .bind(&lesson.title)
            .bind(&lesson.content)
            .bind(&lesson.video_url)
            .bind(lesson.course_id)
            .execute(&self.database)
            .await?
            .last_insert_rowid();
            self.get_lesson(id).await
        }
        .boxed()
    }

    fn get_lesson(&self, id: i64) -> BoxFuture<'_, Result<Lesson>> {
        async move {
            sqlx::query_as::<_, (i64, i64, String, Option<String>, Option<String>)>(
                "select id, course_id, title, content, video_url from lesson where id = ?",
            )
            .bind(id)
            .fetch_optional(&self.database)
            .await?
            .map(|(id, course_id, title, content, video_url)| Lesson {
                id,
                course_id,
                title,
                content,
                video_url,
            })
            .ok_or_else(|| Error::not_found("lesson", id))
        }
        .boxed()
    }

    fn list_lessons(&self, course_id: i64) -> BoxFuture<'_, Result<Vec<Lesson>>> {
        async move {
            self.course_exists(course_id).await?;
            let rows = sqlx::query_as::<_, (i64, i64, String, Option<String>, Option<String>)>(
                "select id, course_id, title, content, video_url from lesson \
                 where course_id = ? order by position, id",
            )
            .bind(course_id)
            .fetch_all(&self.database)
            .await?;
            Ok(rows
                .into_iter()
                .map(|(id, course_id, title, content, video_url)| Lesson {
                    id,
                    course_id,
                    title,
                    content,
                    video_url,
                })
                .collect())
        }
        .boxed()
    }

    fn add_quiz<'a>(&'a self, quiz: &'a NewQuiz) -> BoxFuture<'a, Result<Quiz>> {
        async move {
            self.course_exists(quiz.course_id).await?;
            let questions = serde_json::to_string(&quiz.questions)?;
            let id = sqlx::query("insert into quiz (course_id, title, questions) values (?, ?, ?)")
                .bind(quiz.course_id)
                .bind(&quiz.title)
                .bind(questions)
                .execute(&self.database)
                .await?
                .last_insert_rowid();
            self.get_quiz(id).await
        }
        .boxed()
    }

    fn get_quiz(&self, id: i64) -> BoxFuture<'_, Result<Quiz>> {
        async move {
            sqlx::query_as::<_, QuizRow>("select id, course_id, title, questions from quiz where id = ?")
                .bind(id)
                .fetch_optional(&self.database)
                .await?
                .ok_or_else(|| Error::not_found("quiz", id))?
                .into_quiz()
        }
        .boxed()
    }

    fn list_quizzes(&self, course_id: i64) -> BoxFuture<'_, Result<Vec<Quiz>>> {
        async move {
            sqlx::query_as::<_, QuizRow>(
                "select id, course_id, title, questions from quiz where course_id = ? order by id",
            )
            .bind(course_id)
            .fetch_all(&self.database)
            .await?
            .into_iter()
            .map(QuizRow::into_quiz)
            .collect()
        }
        .boxed()
    }

    fn enroll(&self, course_id: i64, student_id: i64) -> BoxFuture<'_, Result<bool>> {
        async move {
            self.course_exists(course_id).await?;
            let result =
                sqlx::query("insert or ignore into enrollment (course_id, student_id) values (?, ?)")
                    .bind(course_id)
                    .bind(student_id)
                    .execute(&self.database)
                    .await?;
            Ok(result.rows_affected() == 1)
        }
        .boxed()
    }

    fn record_attempt<'a>(
        &'a self,
        student_id: i64,
        attempt: &'a QuizResult,
    ) -> BoxFuture<'a, Result<()>> {
        async move {
            sqlx::query(
                "insert into quiz_attempt (student_id, quiz_id, score, total, passed, completed_at) \
                 values (?, ?, ?, ?, ?, ?)",
            )
            .bind(student_id)
            .bind(attempt.quiz_id)
            .bind(attempt.score as i64)
            .bind(attempt.total as i64)
            .bind(attempt.passed)
            .bind(attempt.completed_at)
            .execute(&self.database)
            .await?;
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
            let rows = sqlx::query_as::<_, AttemptRow>(
                "select quiz_id, score, total, passed, completed_at from quiz_attempt \
                 where student_id = ? and quiz_id = ? order by id",
            )
            .bind(student_id)
            .bind(quiz_id)
            .fetch_all(&self.database)
            .await?;
            Ok(rows.into_iter().map(QuizResult::from).collect())
        }
        .boxed()
    }

    fn save_certificate<'a>(&'a self, record: &'a CertificateRecord) -> BoxFuture<'a, Result<()>> {
        async move {
            sqlx::query(
                "replace into certificate (name, student_id, course_id, student_name, course_title, issued_at) \
                 values (?, ?, ?, ?, ?, ?)",
            )
            .bind(&record.name)
            .bind(record.student_id)
            .bind(record.course_id)
            .bind(&record.student_name)
            .bind(&record.course_title)
            .bind(record.issued_at)
            .execute(&self.database)
            .await?;
            Ok(())
        }
        .boxed()
    }

    fn get_certificate<'a>(&'a self, name: &'a str) -> BoxFuture<'a, Result<CertificateRecord>> {
        async move {
            sqlx::query_as::<_, CertificateRecord>("select * from certificate where name = ?")
                .bind(name)
                .fetch_optional(&self.database)
                .await?
                .ok_or_else(|| Error::NotFound(format!("certificate {name}")))
        }
        .boxed()
    }

    fn list_certificates(&self, student_id: i64) -> BoxFuture<'_, Result<Vec<CertificateRecord>>> {
        async move {
            let records = sqlx::query_as::<_, CertificateRecord>(
                "select * from certificate where student_id = ? order by issued_at desc",
            )
            .bind(student_id)
            .fetch_all(&self.database)
            .await?;
            Ok(records)
        }
        .boxed()
    }
}
