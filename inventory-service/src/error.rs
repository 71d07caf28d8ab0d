use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use diesel_async::pooled_connection::PoolError;
use serde::Serialize;
use shared::AvailabilityError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum InventoryError {
    #[error(transparent)]
    InvalidInput(#[from] AvailabilityError),

    #[error("{0} not found")]
    NotFound(String),

    #[error("database error: {0}")]
    Database(#[from] diesel::result::Error),

    #[error("connection pool error: {0}")]
    Pool(#[from] bb8::RunError<PoolError>),
}

impl InventoryError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::InvalidInput(_) => StatusCode::BAD_REQUEST,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Database(_) | Self::Pool(_) => StatusCode::SERVICE_UNAVAILABLE,
        }
    }

    /// Persistence failures are transient from the caller's point of view.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Database(_) | Self::Pool(_))
    }
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub retryable: bool,
}

impl IntoResponse for InventoryError {
    fn into_response(self) -> Response {
        let retryable = self.is_retryable();
        let error = if retryable {
            tracing::error!("Inventory store unavailable: {}", self);
            "Inventory is temporarily unavailable, please retry".to_string()
        } else {
            tracing::warn!("Rejected inventory request: {}", self);
            self.to_string()
        };
        (self.status_code(), Json(ErrorResponse { error, retryable })).into_response()
    }
}
