pub mod render;

use std::{
    path::{Path, PathBuf},
    sync::{Arc, LazyLock},
};

use regex::Regex;
use serde::Serialize;
use sha2::{Digest, Sha256};
use time::OffsetDateTime;
use tracing::{error, info, warn};
use utoipa::ToSchema;

use crate::{
    course::Course,
    error::{Error, Result},
    student::{Identity, Role, Student, progress::is_course_complete, results::QuizResult},
    store::Store,
    utils::now,
};
use render::Renderer;

/// Which event unlocked a certificate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum EligibilityPath {
    LessonCompletion,
    QuizPass,
}

/// An issued artifact and the student it belongs to.
#[derive(Debug, Clone, PartialEq, Serialize, sqlx::FromRow, ToSchema)]
pub struct CertificateRecord {
    pub name: String,
    pub student_id: i64,
    pub course_id: i64,
    pub student_name: String,
    pub course_title: String,
    #[serde(with = "time::serde::rfc3339")]
    #[schema(value_type = String)]
    pub issued_at: OffsetDateTime,
}

static NON_SLUG: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[^a-z0-9]+").expect("valid regex"));

fn slug(text: &str) -> String {
    let lower = text.to_lowercase();
    let slug = NON_SLUG.replace_all(&lower, "-");
    let slug: String = slug.trim_matches('-').chars().take(40).collect();
    if slug.is_empty() {
        "x".to_string()
    } else {
        slug.trim_end_matches('-').to_string()
    }
}

/// Deterministic artifact name for a (student, course) pair.
///
/// Readable parts come from the display names, the hash from the ids, so
/// two students with the same name never share a file and the name never
/// contains a path separator.
pub fn artifact_name(student: &Student, course: &Course) -> String {
    let digest = Sha256::new()
        .chain_update(student.id.to_be_bytes())
        .chain_update(course.id.to_be_bytes())
        .finalize();
    format!(
        "{}-{}-{}.html",
        slug(&student.name),
        slug(&course.title),
        &hex::encode(digest)[..16]
    )
}

pub struct CertificationService {
    store: Arc<dyn Store>,
    renderer: Arc<dyn Renderer>,
    output_dir: PathBuf,
}

impl CertificationService {
    pub fn new(
        store: Arc<dyn Store>,
        renderer: Arc<dyn Renderer>,
        output_dir: impl AsRef<Path>,
    ) -> Self {
        Self {
            store,
            renderer,
            output_dir: output_dir.as_ref().to_path_buf(),
        }
    }

    /// Render (or re-render) the certificate and record its owner.
    ///
    /// Issuing twice for the same pair overwrites the same file.
    pub async fn issue(
        &self,
        student: &Student,
        course: &Course,
        path: EligibilityPath,
    ) -> Result<CertificateRecord> {
        let record = CertificateRecord {
            name: artifact_name(student, course),
            student_id: student.id,
            course_id: course.id,
            student_name: student.name.clone(),
            course_title: course.title.clone(),
            issued_at: now(),
        };
        let renderer = self.renderer.clone();
        let output_dir = self.output_dir.clone();
        let job = record.clone();
        tokio::task::spawn_blocking(move || {
            renderer.render(
                &job.student_name,
                &job.course_title,
                job.issued_at,
                &output_dir,
                &job.name,
            )
        })
        .await
        .map_err(|e| Error::RenderFailure(std::io::Error::other(e)))?
        .map_err(Error::RenderFailure)?;
        self.store.save_certificate(&record).await?;
        info!(
            "issued certificate {} to student {} for course {} via {:?}",
            record.name, student.id, course.id, path
        );
        Ok(record)
    }

    /// Lesson-completion path: every lesson of the course must be finished.
    pub async fn request(&self, student: &Student, course: &Course) -> Result<CertificateRecord> {
        if course.lesson_ids.is_empty() {
            warn!(
                "certificate requested for course {} which has no lessons",
                course.id
            );
            return Err(Error::Validation(format!(
                "course {} has no lessons to complete",
                course.id
            )));
        }
        if !is_course_complete(student, course) {
            let done = student.completed_in(course).count();
            return Err(Error::NotEligible(format!(
                "completed {} of {} lessons",
                done,
                course.lesson_ids.len()
            )));
        }
        self.issue(student, course, EligibilityPath::LessonCompletion)
            .await
    }

    /// Quiz-pass path, run after a submission. Failures are logged and
    /// reported as no certificate so the grading result is never lost.
    pub async fn on_quiz_result(
        &self,
        student: &Student,
        course: &Course,
        effective: &QuizResult,
    ) -> Option<CertificateRecord> {
        if !effective.passed {
            return None;
        }
        match self.issue(student, course, EligibilityPath::QuizPass).await {
            Ok(record) => Some(record),
            Err(e) => {
                error!(
                    "certificate for student {} course {} failed: {}",
                    student.id, course.id, e
                );
                None
            }
        }
    }

    /// Resolve a certificate for download. Only its owner, the course's
    /// instructor, or an admin may fetch it.
    pub async fn open(
        &self,
        identity: &Identity,
        name: &str,
    ) -> Result<(CertificateRecord, PathBuf)> {
        let record = self.store.get_certificate(name).await?;
        if identity.role != Role::Admin && record.student_id != identity.id {
            let instructs = match self.store.get_course(record.course_id).await {
                Ok(course) => course.instructor_id == identity.id,
                Err(Error::NotFound(_)) => false,
                Err(e) => return Err(e),
            };
            if !instructs {
                return Err(Error::Forbidden(format!("certificate {name}")));
            }
        }
        // the stored name was generated by `artifact_name`, never taken from input
        let path = self.output_dir.join(&record.name);
        Ok((record, path))
    }

    pub async fn list(&self, student_id: i64) -> Result<Vec<CertificateRecord>> {
        self.store.list_certificates(student_id).await
    }
}
