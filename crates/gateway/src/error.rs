//! JSON error responses for requests rejected before a loop starts.

use alin_core::{ProviderError, WorkspaceError};
use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use thiserror::Error;
use tracing::warn;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),

    #[error(transparent)]
    Workspace(#[from] WorkspaceError),

    #[error(transparent)]
    Provider(#[from] ProviderError),
}

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: String,
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Workspace(WorkspaceError::InvalidId(_)) => StatusCode::BAD_REQUEST,
            Self::Workspace(WorkspaceError::OwnerMismatch { .. }) => StatusCode::FORBIDDEN,
            Self::Workspace(WorkspaceError::NotFound(_)) => StatusCode::NOT_FOUND,
            Self::Workspace(WorkspaceError::Io(_)) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Provider(ProviderError::NotConfigured(_)) => StatusCode::BAD_REQUEST,
            Self::Provider(_) => StatusCode::BAD_GATEWAY,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            warn!(error = %self, "Request failed");
        }
        (status, Json(ErrorBody { error: self.to_string() })).into_response()
    }
}
