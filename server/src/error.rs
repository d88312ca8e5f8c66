use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use gigpal_api::ErrorResp;
use gigpal_core::{Conflict, Error as CoreError};
use thiserror::Error;
use tracing::error;

use crate::catalog::CatalogError;

/// Everything a handler can fail with.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error(transparent)]
    Core(#[from] CoreError),
    #[error("{0}")]
    Unauthorized(&'static str),
    #[error("too many login attempts, try again later")]
    RateLimited,
    #[error("event catalog unavailable")]
    Upstream(#[from] CatalogError),
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl From<r2d2::Error> for ApiError {
    fn from(e: r2d2::Error) -> Self {
        ApiError::Internal(e.into())
    }
}

impl From<tokio::task::JoinError> for ApiError {
    fn from(e: tokio::task::JoinError) -> Self {
        ApiError::Internal(e.into())
    }
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Core(e) => match e {
                CoreError::Validation(_) => StatusCode::BAD_REQUEST,
                CoreError::NotFound(_) => StatusCode::NOT_FOUND,
                CoreError::Forbidden(_) => StatusCode::FORBIDDEN,
                // joining twice is reported as a bad request to existing clients
                CoreError::Conflict(Conflict::AlreadyInPool) => StatusCode::BAD_REQUEST,
                CoreError::Conflict(_) => StatusCode::CONFLICT,
                CoreError::Persistence(_) => StatusCode::INTERNAL_SERVER_ERROR,
            },
            ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ApiError::RateLimited => StatusCode::TOO_MANY_REQUESTS,
            ApiError::Upstream(_) => StatusCode::BAD_GATEWAY,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = match &self {
            ApiError::Core(CoreError::Persistence(e)) => {
                error!(error = %e, "storage failure");
                "internal server error".to_string()
            }
            ApiError::Internal(e) => {
                error!(error = ?e, "internal failure");
                "internal server error".to_string()
            }
            ApiError::Upstream(e) => {
                error!(error = %e, "catalog failure");
                self.to_string()
            }
            other => other.to_string(),
        };
        (status, Json(ErrorResp { error: message })).into_response()
    }
}

pub type ApiResult<T> = Result<T, ApiError>;
