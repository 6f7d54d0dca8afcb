use std::sync::Arc;

use axum::{
    Router,
    extract::{Json, Path, State},
    routing::{get, post},
};
use serde::Deserialize;
use tower_sessions::Session;
use utoipa::ToSchema;

use super::current_identity;
use crate::{
    certificate::CertificateRecord,
    course::{Course, QuizView},
    error::Result,
    platform::{Platform, ProgressReport, SubmissionOutcome},
    student::results::QuizResult,
};

#[utoipa::path(
    context_path = "/api/student",
    path = "/enroll/{course_id}",
    method(post),
    params(("course_id" = i64, Path, description = "Course to enroll in")),
    responses(
        (status = 200, description = "Enrolled successfully", body = Course),
        (status = 400, description = "Already enrolled"),
        (status = 404, description = "Course not found")
    )
)]
pub async fn enroll(
    State(platform): State<Arc<Platform>>,
    session: Session,
    Path(course_id): Path<i64>,
) -> Result<Json<Course>> {
    let identity = current_identity(&session, &platform).await?;
    Ok(Json(platform.enroll(&identity, course_id).await?))
}

#[utoipa::path(
    context_path = "/api/student",
    path = "/my_courses",
    method(get),
    responses(
        (status = 200, description = "Courses the student is enrolled in", body = Vec<Course>),
        (status = 401, description = "Unauthorized")
    )
)]
pub async fn my_courses(
    State(platform): State<Arc<Platform>>,
    session: Session,
) -> Result<Json<Vec<Course>>> {
    let identity = current_identity(&session, &platform).await?;
    Ok(Json(platform.enrolled_courses(&identity).await?))
}

#[utoipa::path(
    context_path = "/api/student",
    path = "/courses/{course_id}/quizzes",
    method(get),
    params(("course_id" = i64, Path, description = "Course id")),
    responses(
        (status = 200, description = "Quizzes without answer keys", body = Vec<QuizView>),
        (status = 403, description = "Not enrolled")
    )
)]
pub async fn course_quizzes(
    State(platform): State<Arc<Platform>>,
    session: Session,
    Path(course_id): Path<i64>,
) -> Result<Json<Vec<QuizView>>> {
    let identity = current_identity(&session, &platform).await?;
    Ok(Json(platform.course_quizzes(&identity, course_id).await?))
}

#[utoipa::path(
    context_path = "/api/student",
    path = "/lessons/{lesson_id}/complete",
    method(post),
    params(("lesson_id" = i64, Path, description = "Lesson id")),
    responses(
        (status = 200, description = "Lesson marked as completed", body = ProgressReport),
        (status = 403, description = "Not enrolled"),
        (status = 404, description = "Lesson not found")
    )
)]
pub async fn complete_lesson(
    State(platform): State<Arc<Platform>>,
    session: Session,
    Path(lesson_id): Path<i64>,
) -> Result<Json<ProgressReport>> {
    let identity = current_identity(&session, &platform).await?;
    Ok(Json(platform.complete_lesson(&identity, lesson_id).await?))
}

#[derive(Deserialize, ToSchema)]
pub struct SubmitQuizRequest {
    /// Chosen option index per question, in question order.
    pub answers: Vec<Option<usize>>,
}

#[utoipa::path(
    context_path = "/api/student",
    path = "/quizzes/{quiz_id}/submit",
    method(post),
    params(("quiz_id" = i64, Path, description = "Quiz id")),
    request_body = SubmitQuizRequest,
    responses(
        (status = 200, description = "Quiz graded", body = SubmissionOutcome),
        (status = 400, description = "Malformed quiz or submission"),
        (status = 404, description = "Quiz not found")
    )
)]
pub async fn submit_quiz(
    State(platform): State<Arc<Platform>>,
    session: Session,
    Path(quiz_id): Path<i64>,
    Json(req): Json<SubmitQuizRequest>,
) -> Result<Json<SubmissionOutcome>> {
    let identity = current_identity(&session, &platform).await?;
    Ok(Json(
        platform.submit_quiz(&identity, quiz_id, &req.answers).await?,
    ))
}

#[utoipa::path(
    context_path = "/api/student",
    path = "/quizzes/{quiz_id}/attempts",
    method(get),
    params(("quiz_id" = i64, Path, description = "Quiz id")),
    responses(
        (status = 200, description = "Every attempt, oldest first", body = Vec<QuizResult>)
    )
)]
pub async fn quiz_attempts(
    State(platform): State<Arc<Platform>>,
    session: Session,
    Path(quiz_id): Path<i64>,
) -> Result<Json<Vec<QuizResult>>> {
    let identity = current_identity(&session, &platform).await?;
    Ok(Json(platform.quiz_attempts(&identity, quiz_id).await?))
}

#[utoipa::path(
    context_path = "/api/student",
    path = "/certificates/{course_id}",
    method(post),
    params(("course_id" = i64, Path, description = "Course id")),
    responses(
        (status = 200, description = "Certificate issued", body = CertificateRecord),
        (status = 400, description = "Not all lessons completed"),
        (status = 500, description = "Rendering failed")
    )
)]
pub async fn request_certificate(
    State(platform): State<Arc<Platform>>,
    session: Session,
    Path(course_id): Path<i64>,
) -> Result<Json<CertificateRecord>> {
    let identity = current_identity(&session, &platform).await?;
    Ok(Json(
        platform.request_certificate(&identity, course_id).await?,
    ))
}

#[utoipa::path(
    context_path = "/api/student",
    path = "/certificates",
    method(get),
    responses(
        (status = 200, description = "Certificates issued to the caller", body = Vec<CertificateRecord>)
    )
)]
pub async fn list_certificates(
    State(platform): State<Arc<Platform>>,
    session: Session,
) -> Result<Json<Vec<CertificateRecord>>> {
    let identity = current_identity(&session, &platform).await?;
    Ok(Json(platform.student_certificates(&identity).await?))
}

pub fn get_student_scope() -> Router<Arc<Platform>> {
    Router::new().nest(
        "/student",
        Router::new()
            .route("/enroll/{course_id}", post(enroll))
            .route("/my_courses", get(my_courses))
            .route("/courses/{course_id}/quizzes", get(course_quizzes))
            .route("/lessons/{lesson_id}/complete", post(complete_lesson))
            .route("/quizzes/{quiz_id}/submit", post(submit_quiz))
            .route("/quizzes/{quiz_id}/attempts", get(quiz_attempts))
            .route("/certificates", get(list_certificates))
            .route("/certificates/{course_id}", post(request_certificate)),
    )
}
