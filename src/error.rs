use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;

use crate::{catalog::CatalogError, models::ValidationError};

/// Request-level failure. Each variant maps to one HTTP status, rendered as
/// `{"detail": "..."}`.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Conflict(String),

    #[error("{0}")]
    InvalidInput(String),

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Database(#[from] sea_orm::DbErr),

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl AppError {
    pub fn movie_not_found() -> Self {
        Self::NotFound("Movie with the given ID was not found.".to_string())
    }

    fn status(&self) -> StatusCode {
        match self {
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Conflict(_) => StatusCode::CONFLICT,
            Self::InvalidInput(_) => StatusCode::BAD_REQUEST,
            Self::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            Self::Database(_) | Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<CatalogError> for AppError {
    fn from(err: CatalogError) -> Self {
        match err {
            CatalogError::EmptyPage => Self::NotFound(err.to_string()),
            CatalogError::Conflict { .. } => Self::Conflict(err.to_string()),
            CatalogError::InvalidInput(ref source) => {
                tracing::debug!(error = %source, "patch rejected by the store");
                Self::InvalidInput(err.to_string())
            }
            CatalogError::Corrupt { .. } => Self::Internal(anyhow::Error::new(err)),
            CatalogError::Db(e) => Self::Database(e),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let detail = match &self {
            Self::Database(e) => {
                tracing::error!(error = %e, "database error");
                "Internal server error.".to_string()
            }
            Self::Internal(e) => {
                tracing::error!(error = ?e, "internal error");
                "Internal server error.".to_string()
            }
            other => other.to_string(),
        };

        (status, Json(json!({ "detail": detail }))).into_response()
    }
}

pub type AppResult<T> = Result<T, AppError>;
