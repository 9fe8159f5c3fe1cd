use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

use crate::models::ItemId;

/// Application-level errors
#[derive(thiserror::Error, Debug)]
pub enum AppError {
    #[error("Model not trained: {0} must be fitted or loaded first")]
    NotTrained(&'static str),

    #[error("Artifact not found: {0}")]
    ArtifactNotFound(String),

    #[error("Unknown item: {0}")]
    UnknownItem(ItemId),

    #[error("Training diverged: {0}")]
    Diverged(String),

    #[error("Schema error: {0}")]
    Schema(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Internal server error: {0}")]
    Internal(String),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = match self {
            AppError::InvalidInput(_) => StatusCode::BAD_REQUEST,
            AppError::UnknownItem(_) | AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Schema(_) => StatusCode::UNPROCESSABLE_ENTITY,
            AppError::NotTrained(_)
            | AppError::Diverged(_)
            | AppError::ArtifactNotFound(_)
            | AppError::Io(_)
            | AppError::Csv(_)
            | AppError::Serialization(_)
            | AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        let body = Json(json!({
            "error": self.to_string()
        }));

        (status, body).into_response()
    }
}

pub type AppResult<T> = Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_codes() {
        let cases = [
            (AppError::InvalidInput("n".into()), StatusCode::BAD_REQUEST),
            (AppError::UnknownItem(7), StatusCode::NOT_FOUND),
            (AppError::Schema("genres".into()), StatusCode::UNPROCESSABLE_ENTITY),
            (AppError::NotTrained("collaborative"), StatusCode::INTERNAL_SERVER_ERROR),
            (AppError::Diverged("epoch 3".into()), StatusCode::INTERNAL_SERVER_ERROR),
        ];

        for (error, expected) in cases {
            assert_eq!(error.into_response().status(), expected);
        }
    }

    #[test]
    fn test_unknown_item_message() {
        assert_eq!(AppError::UnknownItem(42).to_string(), "Unknown item: 42");
    }
}
