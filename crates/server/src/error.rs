//! Application error handling

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use fhir_proxy_core::{IssueType, OperationOutcome, ProxyError, RejectReason};

/// Application error type
#[derive(Debug)]
pub enum AppError {
    BadRequest(String),
    Unprocessable(String),
    BadGateway(String),
    Internal(String),
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::Unprocessable(_) => StatusCode::UNPROCESSABLE_ENTITY,
            AppError::BadGateway(_) => StatusCode::BAD_GATEWAY,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let outcome = match self {
            AppError::BadRequest(msg) => OperationOutcome::invalid(&msg),
            AppError::Unprocessable(msg) => OperationOutcome::not_supported(&msg),
            AppError::BadGateway(msg) => OperationOutcome::error(IssueType::Transient, &msg),
            AppError::Internal(msg) => OperationOutcome::error(IssueType::Exception, &msg),
        };

        (status, Json(outcome)).into_response()
    }
}

impl From<RejectReason> for AppError {
    fn from(reason: RejectReason) -> Self {
        match reason {
            RejectReason::MalformedInput => {
                AppError::BadRequest("Request body is not a valid FHIR resource".to_string())
            }
            RejectReason::UnrecognizedType => AppError::Unprocessable(
                "Resource type is not supported by this proxy".to_string(),
            ),
        }
    }
}

impl From<ProxyError> for AppError {
    fn from(err: ProxyError) -> Self {
        match err {
            ProxyError::Envelope(_) => AppError::Internal(err.to_string()),
            ProxyError::StoreUnavailable(_) | ProxyError::Credential(_) => {
                AppError::BadGateway(err.to_string())
            }
        }
    }
}
