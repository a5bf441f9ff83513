use axum::{Json, http::StatusCode, response::IntoResponse};
use serde::Serialize;
use thiserror::Error;
use validator::ValidationErrors;

use crate::state::game::MoveError;

/// Errors that can occur in service layer operations.
///
/// The display text is what a player sees in an `ERROR` message.
#[derive(Debug, Error)]
pub enum ServiceError {
    /// Missing or malformed fields, unknown message kinds.
    #[error("{0}")]
    InvalidInput(String),
    /// The move broke a game rule; the game was left untouched.
    #[error(transparent)]
    Rule(#[from] MoveError),
    /// Requested game was not found.
    #[error("{0}")]
    NotFound(String),
    /// The session's display name plays neither seat.
    #[error("you are not a player in this game")]
    NotParticipant,
}

impl From<ValidationErrors> for ServiceError {
    fn from(err: ValidationErrors) -> Self {
        let message = err
            .field_errors()
            .values()
            .flat_map(|errors| errors.iter())
            .find_map(|error| error.message.as_ref().map(|message| message.to_string()))
            .unwrap_or_else(|| format!("validation failed: {err}"));
        ServiceError::InvalidInput(message)
    }
}

/// Application-level errors that are converted to HTTP responses.
#[derive(Debug, Error)]
pub enum AppError {
    /// Requested resource not found.
    #[error("not found: {0}")]
    NotFound(String),
}

#[derive(Serialize)]
struct ErrorBody {
    message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> axum::response::Response {
        let status = match &self {
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
        };

        let payload = Json(ErrorBody {
            message: self.to_string(),
        });

        (status, payload).into_response()
    }
}
