use axum::{
    Json,
    http::{StatusCode, header},
    response::{IntoResponse, Response},
};
use thiserror::Error;
use tracing::error;

/// Every failure the REST surface can report. Authentication failures share
/// one variant and one detail string so a caller cannot probe which usernames
/// exist.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Username already registered")]
    UsernameTaken,

    #[error("Email already registered")]
    EmailTaken,

    #[error("Incorrect username or password.")]
    Unauthorized,

    #[error("The provided username was not found.")]
    UnknownUsername,

    #[error("The provided email was not found.")]
    UnknownEmail,

    #[error("Invalid user query.")]
    InvalidUserQuery,

    #[error("Not yet implemented.")]
    NotYetImplemented,

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match self {
            Self::UsernameTaken | Self::EmailTaken => StatusCode::BAD_REQUEST,
            Self::Unauthorized => StatusCode::UNAUTHORIZED,
            Self::UnknownUsername | Self::UnknownEmail | Self::InvalidUserQuery => {
                StatusCode::UNPROCESSABLE_ENTITY
            }
            Self::NotYetImplemented => StatusCode::NOT_IMPLEMENTED,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let detail = match &self {
            Self::Internal(e) => {
                error!("Internal error: {:#}", e);
                "Internal server error.".to_string()
            }
            other => other.to_string(),
        };

        let status = self.status();
        let body = Json(serde_json::json!({ "detail": detail }));

        if status == StatusCode::UNAUTHORIZED {
            (status, [(header::WWW_AUTHENTICATE, "Bearer")], body).into_response()
        } else {
            (status, body).into_response()
        }
    }
}
