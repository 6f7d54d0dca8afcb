use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("{0} not found")]
    NotFound(String),
    #[error("Not authenticated")]
    Unauthorized,
    #[error("Access denied: {0}")]
    Forbidden(String),
    #[error("Invalid request: {0}")]
    Validation(String),
    #[error("Not eligible for a certificate: {0}")]
    NotEligible(String),
    /// The student record changed between read and write.
    #[error("Concurrent update on student {0}")]
    Conflict(i64),
    #[error("Certificate rendering failed: {0}")]
    RenderFailure(#[source] std::io::Error),
    #[error("Fatal error: {0}")]
    Fatal(anyhow::Error),
}

impl Error {
    pub fn not_found(what: impl std::fmt::Display, id: i64) -> Self {
        Error::NotFound(format!("{what} {id}"))
    }

    pub fn status(&self) -> StatusCode {
        match self {
            Error::NotFound(_) => StatusCode::NOT_FOUND,
            Error::Unauthorized => StatusCode::UNAUTHORIZED,
            Error::Forbidden(_) => StatusCode::FORBIDDEN,
            Error::Validation(_) | Error::NotEligible(_) => StatusCode::BAD_REQUEST,
            Error::Conflict(_) => StatusCode::CONFLICT,
            Error::RenderFailure(_) | Error::Fatal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<sqlx::Error> for Error {
    fn from(e: sqlx::Error) -> Self {
        match e {
            sqlx::Error::RowNotFound => Error::NotFound("record".to_string()),
            e => Error::Fatal(e.into()),
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Fatal(e.into())
    }
}

impl From<anyhow::Error> for Error {
    fn from(e: anyhow::Error) -> Self {
        Error::Fatal(e)
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        (self.status(), self.to_string()).into_response()
    }
}
