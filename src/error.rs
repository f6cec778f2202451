use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use tracing::error;

/// Failure raised by a user or session store.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// A uniqueness constraint rejected the write.
    #[error("unique constraint violated")]
    Conflict,
    #[error("store operation timed out")]
    Timeout,
    #[error("database error: {0}")]
    Database(#[source] sqlx::Error),
}

impl From<sqlx::Error> for StoreError {
    fn from(e: sqlx::Error) -> Self {
        match &e {
            sqlx::Error::Database(db) if db.is_unique_violation() => StoreError::Conflict,
            sqlx::Error::PoolTimedOut => StoreError::Timeout,
            _ => StoreError::Database(e),
        }
    }
}

/// The random source could not produce a full session token.
#[derive(Debug, thiserror::Error)]
#[error("entropy source failed: {0}")]
pub struct EntropyError(pub String);

/// Password hashing failed for an environmental reason.
#[derive(Debug, thiserror::Error)]
#[error("password hashing failed: {0}")]
pub struct HashingError(pub String);

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("invalid credentials")]
    InvalidCredentials,
    #[error("user not found")]
    UserNotFound,
    #[error("session not found")]
    SessionNotFound,
    #[error("session expired")]
    SessionExpired,
    #[error("unauthorized")]
    Unauthorized,
    #[error("email already registered")]
    DuplicateEmail,
    #[error("conflicting write")]
    Conflict,
    #[error("passwords did not match")]
    PasswordMismatch,
    #[error("{0}")]
    Validation(String),
    #[error("store operation timed out")]
    Timeout,
    #[error("store unavailable")]
    StoreUnavailable(#[source] sqlx::Error),
    #[error(transparent)]
    Entropy(#[from] EntropyError),
    #[error(transparent)]
    Hashing(#[from] HashingError),
}

pub type AppResult<T> = Result<T, AppError>;

impl From<StoreError> for AppError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::Conflict => AppError::Conflict,
            StoreError::Timeout => AppError::Timeout,
            StoreError::Database(e) => AppError::StoreUnavailable(e),
        }
    }
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::UserNotFound | AppError::SessionNotFound => StatusCode::NOT_FOUND,
            AppError::InvalidCredentials | AppError::SessionExpired | AppError::Unauthorized => {
                StatusCode::UNAUTHORIZED
            }
            AppError::DuplicateEmail | AppError::Conflict => StatusCode::CONFLICT,
            AppError::PasswordMismatch | AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::Timeout => StatusCode::GATEWAY_TIMEOUT,
            AppError::StoreUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            AppError::Entropy(_) | AppError::Hashing(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Message safe to hand to a client. Server-side failures get a generic text.
    fn public_message(&self) -> String {
        match self {
            AppError::Timeout | AppError::StoreUnavailable(_) => "service unavailable".into(),
            AppError::Entropy(_) | AppError::Hashing(_) => "internal server error".into(),
            other => other.to_string(),
        }
    }
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            error!(error = ?self, %status, "request failed");
        }
        let body = ErrorBody {
            message: self.public_message(),
        };
        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn store_errors_map_to_app_errors() {
        assert!(matches!(AppError::from(StoreError::Conflict), AppError::Conflict));
        assert!(matches!(AppError::from(StoreError::Timeout), AppError::Timeout));
        assert!(matches!(
            AppError::from(StoreError::Database(sqlx::Error::RowNotFound)),
            AppError::StoreUnavailable(_)
        ));
    }

    #[test]
    fn status_codes_follow_error_kind() {
        assert_eq!(AppError::InvalidCredentials.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(AppError::SessionExpired.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(AppError::UserNotFound.status(), StatusCode::NOT_FOUND);
        assert_eq!(AppError::DuplicateEmail.status(), StatusCode::CONFLICT);
        assert_eq!(AppError::PasswordMismatch.status(), StatusCode::BAD_REQUEST);
        assert_eq!(AppError::Timeout.status(), StatusCode::GATEWAY_TIMEOUT);
        assert_eq!(
            AppError::Hashing(HashingError("oom".into())).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn internal_details_are_not_exposed() {
        let err = AppError::StoreUnavailable(sqlx::Error::Protocol("relation users is broken".into()));
        assert_eq!(err.public_message(), "service unavailable");

        let err = AppError::Entropy(EntropyError("getrandom: EAGAIN".into()));
        assert_eq!(err.public_message(), "internal server error");
    }
}
