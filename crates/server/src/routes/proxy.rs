//! Proxy endpoint handler

use axum::{
    Extension, Json,
    body::Bytes,
    extract::State,
    http::{HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
};
use fhir_proxy_core::{ProxyError, ProxyResult};

use crate::AppState;
use crate::config::ResponseMode;
use crate::error::AppError;
use crate::middleware::RequestId;

/// POST /fhir-proxy - Normalize a FHIR resource and create it in the store
///
/// Answers with a status line or the transaction Bundle depending on the
/// configured response mode. Store and credential failures become 502.
pub async fn submit(
    State(state): State<AppState>,
    Extension(request_id): Extension<RequestId>,
    body: Bytes,
) -> Result<Response, AppError> {
    let result = state.proxy.process(&body).await.inspect_err(|e| {
        let outcome = error_label(e);
        record_outcome(outcome);
        tracing::error!(
            target: "audit",
            request_id = %request_id.0,
            outcome = outcome,
            error = %e,
            "Proxy submission failed"
        );
    })?;

    let outcome = outcome_label(&result);
    record_outcome(outcome);
    tracing::info!(
        target: "audit",
        request_id = %request_id.0,
        outcome = outcome,
        "Proxy submission"
    );

    let response = match state.response_mode {
        ResponseMode::Status => (status_code(&result), result.message()).into_response(),
        ResponseMode::Envelope => match &result {
            ProxyResult::Rejected { reason } => return Err(AppError::from(*reason)),
            ProxyResult::Submitted { envelope, .. } => {
                (status_code(&result), Json(envelope)).into_response()
            }
        },
    };

    Ok(with_location(response, &result))
}

fn status_code(result: &ProxyResult) -> StatusCode {
    match result {
        ProxyResult::Submitted { outcome, .. } if outcome.created => StatusCode::CREATED,
        ProxyResult::Submitted { .. } => StatusCode::OK,
        ProxyResult::Rejected { reason } => AppError::from(*reason).status(),
    }
}

/// `Location: <Type>/<id>` for resources the store created
fn with_location(mut response: Response, result: &ProxyResult) -> Response {
    let ProxyResult::Submitted { outcome, envelope } = result else {
        return response;
    };
    let (Some(id), Some(resource)) = (&outcome.assigned_id, envelope.resource()) else {
        return response;
    };
    if !outcome.created {
        return response;
    }

    if let Ok(value) = HeaderValue::from_str(&format!("{}/{}", resource.resource_type(), id)) {
        response.headers_mut().insert(header::LOCATION, value);
    }
    response
}

fn outcome_label(result: &ProxyResult) -> &'static str {
    match result {
        ProxyResult::Submitted { outcome, .. } if outcome.created => "created",
        ProxyResult::Submitted { .. } => "not-created",
        ProxyResult::Rejected { reason } => reason.as_str(),
    }
}

fn error_label(err: &ProxyError) -> &'static str {
    match err {
        ProxyError::StoreUnavailable(_) => "store-unavailable",
        ProxyError::Credential(_) => "credential-error",
        ProxyError::Envelope(_) => "envelope-error",
    }
}

fn record_outcome(outcome: &'static str) {
    metrics::counter!("fhir_proxy_submissions_total", "outcome" => outcome).increment(1);
}
