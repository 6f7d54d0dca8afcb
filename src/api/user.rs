use std::sync::Arc;

use axum::{
    Router,
    extract::{Json, Path, State},
    http::header,
    response::IntoResponse,
    routing::{get, post},
};
use serde::Deserialize;
use tower_sessions::Session;
use utoipa::ToSchema;

use super::{USER_ID_KEY, current_identity};
use crate::{
    error::{Error, Result},
    platform::Platform,
    student::{NewUser, Role, Student},
};

#[utoipa::path(
    context_path = "/api/user",
    path = "/register",
    method(post),
    request_body = NewUser,
    responses(
        (status = 200, description = "User created", body = Student),
        (status = 400, description = "Invalid or duplicate user")
    )
)]
pub async fn register(
    State(platform): State<Arc<Platform>>,
    Json(req): Json<NewUser>,
) -> Result<Json<Student>> {
    Ok(Json(platform.register(req).await?))
}

#[derive(Deserialize, ToSchema)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[utoipa::path(
    context_path = "/api/user",
    path = "/login",
    method(post),
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Login successful"),
        (status = 401, description = "Invalid credentials")
    )
)]
#[axum::debug_handler]
pub async fn login(
    State(platform): State<Arc<Platform>>,
    session: Session,
    Json(req): Json<LoginRequest>,
) -> Result<impl IntoResponse> {
    let LoginRequest { email, password } = req;
    let student = platform.login(&email, &password).await?;
    session
        .cycle_id()
        .await
        .map_err(|e| Error::Fatal(e.into()))?;
    session
        .insert(USER_ID_KEY, student.id)
        .await
        .map_err(|e| Error::Fatal(e.into()))?;
    Ok("Login successful")
}

#[utoipa::path(
    context_path = "/api/user",
    path = "/logout",
    method(post),
    responses(
        (status = 200, description = "Logout successful")
    )
)]
pub async fn logout(session: Session) -> impl IntoResponse {
    let _ = session.delete().await;
    "Logout successful"
}

#[utoipa::path(
    context_path = "/api/user",
    path = "/me",
    method(get),
    responses(
        (status = 200, description = "Current user with progress", body = Student),
        (status = 401, description = "Unauthorized")
    )
)]
pub async fn me(State(platform): State<Arc<Platform>>, session: Session) -> Result<Json<Student>> {
    let identity = current_identity(&session, &platform).await?;
    Ok(Json(platform.store.get_student(identity.id).await?))
}

#[derive(Deserialize, ToSchema)]
pub struct SetRoleRequest {
    pub user_id: i64,
    pub role: Role,
}

#[utoipa::path(
    context_path = "/api/user",
    path = "/set_role",
    method(post),
    request_body = SetRoleRequest,
    responses(
        (status = 200, description = "Role updated"),
        (status = 403, description = "Admin only"),
        (status = 404, description = "No such user")
    )
)]
pub async fn set_role(
    State(platform): State<Arc<Platform>>,
    session: Session,
    Json(req): Json<SetRoleRequest>,
) -> Result<impl IntoResponse> {
    let identity = current_identity(&session, &platform).await?;
    platform.set_role(&identity, req.user_id, req.role).await?;
    Ok("Role updated")
}

#[utoipa::path(
    context_path = "/api/user",
    path = "/certificate/{name}",
    method(get),
    params(
        ("name" = String, Path, description = "Artifact name of an issued certificate")
    ),
    responses(
        (status = 200, description = "Certificate document", content_type = "text/html"),
        (status = 403, description = "Not the owner"),
        (status = 404, description = "No such certificate")
    )
)]
pub async fn download_certificate(
    State(platform): State<Arc<Platform>>,
    session: Session,
    Path(name): Path<String>,
) -> Result<impl IntoResponse> {
    let identity = current_identity(&session, &platform).await?;
    let (record, content) = platform.open_certificate(&identity, &name).await?;
    let headers = [
        (header::CONTENT_TYPE, "text/html; charset=utf-8".to_string()),
        (
            header::CONTENT_DISPOSITION,
            format!("attachment; filename=\"{}\"", record.name),
        ),
    ];
    Ok((headers, content))
}

pub fn get_user_scope() -> Router<Arc<Platform>> {
    Router::new().nest(
        "/user",
        Router::new()
            .route("/register", post(register))
            .route("/login", post(login))
            .route("/logout", post(logout))
            .route("/me", get(me))
            .route("/set_role", post(set_role))
            .route("/certificate/{name}", get(download_certificate)),
    )
}
