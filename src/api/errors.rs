use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use tracing::{error, warn};

use super::dto::ErrorResponse;
use crate::{error::Error, ingest::AdapterError};

#[derive(Debug)]
pub struct AppError(pub Error);

impl AppError {
    fn status(&self) -> StatusCode {
        match &self.0 {
            Error::Validation { .. } => StatusCode::BAD_REQUEST,
            Error::NotFound { .. } => StatusCode::NOT_FOUND,
            Error::Cancelled { .. } => StatusCode::GATEWAY_TIMEOUT,
            Error::DataAccess { .. } => StatusCode::INTERNAL_SERVER_ERROR,
            Error::Adapter(AdapterError::UnknownAdapter { .. }) => StatusCode::NOT_FOUND,
            Error::Adapter(AdapterError::Payload(_) | AdapterError::Config(_)) => {
                StatusCode::BAD_REQUEST
            }
            Error::Adapter(AdapterError::Fetch(_)) => StatusCode::BAD_GATEWAY,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            error!(error = %self.0, "Request failed");
        } else {
            warn!(error = %self.0, "Request rejected");
        }

        let body = match &self.0 {
            Error::Validation { field, .. } => ErrorResponse::for_field(field, self.0.to_string()),
            other => ErrorResponse::new(other.to_string()),
        };
        (status, Json(body)).into_response()
    }
}

impl<E: Into<Error>> From<E> for AppError {
    fn from(e: E) -> Self {
        Self(e.into())
    }
}
