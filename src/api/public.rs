use std::sync::Arc;

use axum::{
    Router,
    extract::{Json, Path, State},
    routing::get,
};

use crate::{
    course::{Course, CourseDetail},
    error::Result,
    platform::Platform,
};

#[utoipa::path(
    context_path = "/api/public",
    path = "/courses",
    method(get),
    responses(
        (status = 200, description = "All courses", body = Vec<Course>)
    )
)]
pub async fn list_courses(State(platform): State<Arc<Platform>>) -> Result<Json<Vec<Course>>> {
    Ok(Json(platform.list_courses().await?))
}

#[utoipa::path(
    context_path = "/api/public",
    path = "/courses/{course_id}",
    method(get),
    params(("course_id" = i64, Path, description = "Course id")),
    responses(
        (status = 200, description = "Course with its lessons", body = CourseDetail),
        (status = 404, description = "Course not found")
    )
)]
pub async fn get_course(
    State(platform): State<Arc<Platform>>,
    Path(course_id): Path<i64>,
) -> Result<Json<CourseDetail>> {
    Ok(Json(platform.course_detail(course_id).await?))
}

pub fn get_public_scope() -> Router<Arc<Platform>> {
    Router::new().nest(
        "/public",
        Router::new()
            .route("/courses", get(list_courses))
            .route("/courses/{course_id}", get(get_course)),
    )
}
