//! Turns an `Error` into an HTTP response.

use crate::{Error, ErrorType};
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use tracing::{error, warn};

/// Error response body
#[derive(Debug, Serialize, Deserialize)]
pub(crate) struct ErrorResponse {
    pub(crate) error: String,
    pub(crate) code: ErrorType,
}

fn status_of(error_type: ErrorType) -> StatusCode {
    match error_type {
        ErrorType::NotFound => StatusCode::NOT_FOUND,
        ErrorType::Request => StatusCode::BAD_REQUEST,
        ErrorType::Sync => StatusCode::BAD_GATEWAY,
        ErrorType::Config
        | ErrorType::Storage
        | ErrorType::Service
        | ErrorType::Internal => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let status = status_of(self.error_type());
        if status.is_server_error() {
            error!("Request failed: {self:?}");
        } else {
            warn!("Request rejected: {self}");
        }

        let body = ErrorResponse {
            error: self.to_string(),
            code: self.error_type(),
        };

        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_of() {
        assert_eq!(status_of(ErrorType::NotFound), StatusCode::NOT_FOUND);
        assert_eq!(status_of(ErrorType::Request), StatusCode::BAD_REQUEST);
        assert_eq!(status_of(ErrorType::Sync), StatusCode::BAD_GATEWAY);
        assert_eq!(
            status_of(ErrorType::Storage),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_error_body() {
        let response = Error::not_found("Transaction 4 not found").into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
