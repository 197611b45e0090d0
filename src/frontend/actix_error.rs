//! Actix Web error adapters for supervisor errors.

use crate::error::Error;
use actix_web::{HttpResponse, ResponseError, http::StatusCode};
use serde_json::json;

impl ResponseError for Error {
    fn error_response(&self) -> HttpResponse {
        let status_code = self.status_code();

        HttpResponse::build(status_code)
            .content_type("application/json")
            .json(json!({
                "error": self.to_string(),
                "code": status_code.as_u16()
            }))
    }

    fn status_code(&self) -> StatusCode {
        match self {
            Error::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Error::ConfigInvalid(_) | Error::ConfigParse(_) => StatusCode::BAD_REQUEST,
            Error::NotRunning => StatusCode::SERVICE_UNAVAILABLE,
            Error::Backend(_) => StatusCode::BAD_GATEWAY,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// Errors produced by the HTTP handlers themselves
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Internal server error: {0}")]
    Internal(#[from] Error),
}

impl ResponseError for ApiError {
    fn error_response(&self) -> HttpResponse {
        let status_code = self.status_code();

        HttpResponse::build(status_code)
            .content_type("application/json")
            .json(json!({
                "error": self.to_string(),
                "code": status_code.as_u16()
            }))
    }

    fn status_code(&self) -> StatusCode {
        match self {
            ApiError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Internal(e) => e.status_code(),
        }
    }
}
