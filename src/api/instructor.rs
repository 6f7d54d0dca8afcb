use std::sync::Arc;

use axum::{
    Router,
    extract::{Json, State},
    routing::{get, post},
};
use tower_sessions::Session;

use super::current_identity;
use crate::{
    course::{Course, Lesson, NewCourse, NewLesson, NewQuiz, Quiz},
    error::Result,
    platform::Platform,
};

#[utoipa::path(
    context_path = "/api/instructor",
    path = "/create_course",
    method(post),
    request_body = NewCourse,
    responses(
        (status = 200, description = "Course created", body = Course),
        (status = 400, description = "Title and description required"),
        (status = 403, description = "Instructors only")
    )
)]
pub async fn create_course(
    State(platform): State<Arc<Platform>>,
    session: Session,
    Json(req): Json<NewCourse>,
) -> Result<Json<Course>> {
    let identity = current_identity(&session, &platform).await?;
    Ok(Json(platform.create_course(&identity, req).await?))
}

#[utoipa::path(
    context_path = "/api/instructor",
    path = "/my_courses",
    method(get),
    responses(
        (status = 200, description = "Courses taught by the caller", body = Vec<Course>),
        (status = 403, description = "Instructors only")
    )
)]
pub async fn my_courses(
    State(platform): State<Arc<Platform>>,
    session: Session,
) -> Result<Json<Vec<Course>>> {
    let identity = current_identity(&session, &platform).await?;
    Ok(Json(platform.instructor_courses(&identity).await?))
}

#[utoipa::path(
    context_path = "/api/instructor",
    path = "/add_lesson",
    method(post),
    request_body = NewLesson,
    responses(
        (status = 200, description = "Lesson created", body = Lesson),
        (status = 403, description = "Not the course's instructor"),
        (status = 404, description = "Course not found")
    )
)]
pub async fn add_lesson(
    State(platform): State<Arc<Platform>>,
    session: Session,
    Json(req): Json<NewLesson>,
) -> Result<Json<Lesson>> {
    let identity = current_identity(&session, &platform).await?;
    Ok(Json(platform.add_lesson(&identity, req).await?))
}

#[utoipa::path(
    context_path = "/api/instructor",
    path = "/add_quiz",
    method(post),
    request_body = NewQuiz,
    responses(
        (status = 200, description = "Quiz created", body = Quiz),
        (status = 400, description = "Malformed quiz"),
        (status = 403, description = "Not the course's instructor"),
        (status = 404, description = "Course not found")
    )
)]
pub async fn add_quiz(
    State(platform): State<Arc<Platform>>,
    session: Session,
    Json(req): Json<NewQuiz>,
) -> Result<Json<Quiz>> {
    let identity = current_identity(&session, &platform).await?;
    Ok(Json(platform.add_quiz(&identity, req).await?))
}

pub fn get_instructor_scope() -> Router<Arc<Platform>> {
    Router::new().nest(
        "/instructor",
        Router::new()
            .route("/create_course", post(create_course))
            .route("/my_courses", get(my_courses))
            .route("/add_lesson", post(add_lesson))
            .route("/add_quiz", post(add_quiz)),
    )
}
