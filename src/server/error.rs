use axum::{
    extract::multipart::MultipartError,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;
use tracing::{error, warn};

use crate::catalog::CatalogError;
use crate::upload::{Rejection, UploadError};

#[derive(Error, Debug)]
pub enum AppError {
    #[error(transparent)]
    Catalog(#[from] CatalogError),

    #[error(transparent)]
    Upload(#[from] UploadError),

    #[error("session error: {0}")]
    Session(#[from] tower_sessions::session::Error),

    #[error("malformed upload: {0}")]
    Multipart(#[from] MultipartError),

    #[error("page not found: {0}")]
    PageNotFound(String),

    #[error("failed to read page: {0}")]
    Page(#[source] std::io::Error),
}

impl AppError {
    /// Multipart bodies over the request limit count as oversized uploads.
    pub fn from_multipart(e: MultipartError) -> Self {
        if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
            AppError::Upload(UploadError::Rejected(Rejection::TooLarge))
        } else {
            AppError::Multipart(e)
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            AppError::Catalog(e) => catalog_status(e),
            AppError::Upload(UploadError::Rejected(_)) => StatusCode::BAD_REQUEST,
            AppError::Upload(UploadError::StorageFailure(_)) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::Upload(UploadError::Catalog(e)) => catalog_status(e),
            AppError::Session(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::Multipart(_) => StatusCode::BAD_REQUEST,
            AppError::PageNotFound(_) => StatusCode::NOT_FOUND,
            AppError::Page(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn client_message(&self, status: StatusCode) -> String {
        match self {
            AppError::Upload(UploadError::Rejected(rejection)) => rejection.reason().to_string(),
            AppError::Catalog(CatalogError::InvalidInput(message))
            | AppError::Upload(UploadError::Catalog(CatalogError::InvalidInput(message))) => {
                message.clone()
            }
            _ if status.is_server_error() => "internal server error".to_string(),
            _ => self.to_string(),
        }
    }
}

fn catalog_status(e: &CatalogError) -> StatusCode {
    match e {
        CatalogError::InvalidInput(_) => StatusCode::BAD_REQUEST,
        CatalogError::NotFound(_) => StatusCode::NOT_FOUND,
        CatalogError::StoreUnavailable(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();

        if status.is_server_error() {
            error!(status = status.as_u16(), error = %self, "Request failed");
        } else {
            warn!(status = status.as_u16(), error = %self, "Request rejected");
        }

        let body = Json(json!({ "error": self.client_message(status) }));
        (status, body).into_response()
    }
}
