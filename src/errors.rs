use axum::http::StatusCode;
use thiserror::Error;

/// Failures surfaced by the remote store and the client-side stores.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    /// Bad caller input. Never sent to the remote.
    #[error("invalid input: {0}")]
    Validation(String),
    /// Network, transport or decoding failure. Not retried automatically.
    #[error("request failed: {0}")]
    Fetch(String),
    /// The entity no longer exists remotely.
    #[error("not found: {0}")]
    NotFound(String),
    /// Owner mismatch. Fatal to the session.
    #[error("not authorized: {0}")]
    Authorization(String),
    /// Another mutation against the same entity has not settled yet.
    #[error("an operation is already pending for {0}")]
    Busy(String),
    #[error("failed to reorder habit {id}: {source}")]
    Reorder { id: String, source: Box<StoreError> },
}

impl StoreError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound(message.into())
    }

    /// True when the affected collection should be reloaded from the remote.
    pub fn is_not_found(&self) -> bool {
        match self {
            Self::NotFound(_) => true,
            Self::Reorder { source, .. } => source.is_not_found(),
            _ => false,
        }
    }
}

impl From<reqwest::Error> for StoreError {
    fn from(err: reqwest::Error) -> Self {
        Self::Fetch(err.to_string())
    }
}

#[derive(Debug)]
pub struct AppError {
    pub status: StatusCode,
    pub message: String,
}

impl AppError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: message.into(),
        }
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::UNAUTHORIZED,
            message: message.into(),
        }
    }

    pub fn internal(err: impl std::error::Error) -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            message: err.to_string(),
        }
    }
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        Self::internal(err)
    }
}

impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self {
        let status = match &err {
            StoreError::Validation(_) => StatusCode::BAD_REQUEST,
            StoreError::NotFound(_) => StatusCode::NOT_FOUND,
            StoreError::Authorization(_) => StatusCode::FORBIDDEN,
            StoreError::Busy(_) => StatusCode::CONFLICT,
            StoreError::Fetch(_) | StoreError::Reorder { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        };
        Self {
            status,
            message: err.to_string(),
        }
    }
}

impl axum::response::IntoResponse for AppError {
    fn into_response(self) -> axum::response::Response {
        (self.status, self.message).into_response()
    }
}
