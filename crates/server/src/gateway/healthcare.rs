//! Store gateway for a Cloud Healthcare API FHIR store

use std::time::Duration;

use async_trait::async_trait;
use fhir_proxy_core::{ClinicalResource, CreateOutcome, OperationOutcome, Store, StoreError, StoreLocation};
use reqwest::StatusCode;
use reqwest::header::{ACCEPT, CONTENT_TYPE, LOCATION};
use serde_json::Value as JsonValue;

const FHIR_JSON: &str = "application/fhir+json;charset=utf-8";

/// `POST {base}/{resourceType}` against the FHIR store
#[derive(Clone)]
pub struct HealthcareStore {
    http: reqwest::Client,
    base_url: String,
}

impl HealthcareStore {
    /// Client for an arbitrary FHIR base URL
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, StoreError> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| StoreError::Transport(format!("Failed to build HTTP client: {}", e)))?;
        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn for_location(location: &StoreLocation, timeout: Duration) -> Result<Self, StoreError> {
        Self::new(&location.base_url(), timeout)
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

#[async_trait]
impl Store for HealthcareStore {
    async fn create(
        &self,
        resource: &ClinicalResource,
        bearer_token: &str,
    ) -> Result<CreateOutcome, StoreError> {
        let resource_type = resource.resource_type();
        let url = format!("{}/{}", self.base_url, resource_type);
        let body = serde_json::to_vec(resource).map_err(|e| StoreError::Encode(e.to_string()))?;

        tracing::debug!(url = %url, "Creating resource in FHIR store");

        let response = self
            .http
            .post(&url)
            .bearer_auth(bearer_token)
            .header(CONTENT_TYPE, FHIR_JSON)
            .header(ACCEPT, FHIR_JSON)
            .body(body)
            .send()
            .await
            .map_err(|e| StoreError::Transport(e.to_string()))?;

        let status = response.status();
        let location = response
            .headers()
            .get(LOCATION)
            .and_then(|v| v.to_str().ok())
            .map(str::to_owned);
        let text = response
            .text()
            .await
            .map_err(|e| StoreError::Transport(format!("Failed to read store response: {}", e)))?;

        if !status.is_success() {
            return Err(StoreError::Rejected {
                status: status.as_u16(),
                detail: error_detail(&text).unwrap_or_else(|| status.to_string()),
            });
        }

        let assigned_id = id_from_body(&text)
            .or_else(|| location.as_deref().and_then(|l| id_from_location(l, resource_type)));

        if status == StatusCode::CREATED {
            Ok(CreateOutcome {
                created: true,
                assigned_id,
                error_detail: None,
            })
        } else {
            Ok(CreateOutcome {
                created: false,
                assigned_id,
                error_detail: outcome_diagnostics(&text),
            })
        }
    }
}

/// `id` of the resource echoed back by the store
fn id_from_body(body: &str) -> Option<String> {
    let value: JsonValue = serde_json::from_str(body).ok()?;
    value.get("id")?.as_str().map(str::to_owned)
}

/// Id segment following the resource type, e.g. `.../fhir/Patient/123/_history/1`
fn id_from_location(location: &str, resource_type: &str) -> Option<String> {
    let mut segments = location.split('/');
    segments.find(|s| *s == resource_type)?;
    segments.next().filter(|id| !id.is_empty()).map(str::to_owned)
}

/// Diagnostics of an OperationOutcome body
fn outcome_diagnostics(body: &str) -> Option<String> {
    let outcome: OperationOutcome = serde_json::from_str(body).ok()?;
    if outcome.resource_type != "OperationOutcome" {
        return None;
    }
    outcome.diagnostics()
}

/// Error text for a failed call: OperationOutcome diagnostics, else the raw body
fn error_detail(body: &str) -> Option<String> {
    outcome_diagnostics(body).or_else(|| {
        let trimmed = body.trim();
        (!trimmed.is_empty()).then(|| trimmed.to_string())
    })
}
