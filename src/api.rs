pub mod instructor;
pub mod public;
pub mod student;
pub mod user;

use std::sync::Arc;

use axum::Router;
use tower_sessions::Session;
use utoipa::OpenApi;

use crate::{
    error::{Error, Result},
    platform::Platform,
    student::Identity,
};

pub const USER_ID_KEY: &str = "user_id";

/// Resolve the logged-in caller from the session.
pub async fn current_identity(session: &Session, platform: &Platform) -> Result<Identity> {
    let Ok(Some(user_id)) = session.get::<i64>(USER_ID_KEY).await else {
        return Err(Error::Unauthorized);
    };
    match platform.identity(user_id).await {
        Err(Error::NotFound(_)) => Err(Error::Unauthorized),
        other => other,
    }
}

#[derive(OpenApi)]
#[openapi(paths(
    user::register,
    user::login,
    user::logout,
    user::me,
    user::set_role,
    user::download_certificate,
    student::enroll,
    student::my_courses,
    student::course_quizzes,
    student::complete_lesson,
    student::submit_quiz,
    student::quiz_attempts,
    student::request_certificate,
    student::list_certificates,
    instructor::create_course,
    instructor::my_courses,
    instructor::add_lesson,
    instructor::add_quiz,
    public::list_courses,
    public::get_course,
))]
pub struct ApiDoc;

/// All API routes under `/api`. Expects a session layer around it.
pub fn router(platform: Arc<Platform>) -> Router {
    Router::new()
        .nest(
            "/api",
            Router::new()
                .merge(user::get_user_scope())
                .merge(student::get_student_scope())
                .merge(instructor::get_instructor_scope())
                .merge(public::get_public_scope()),
        )
        .with_state(platform)
}
