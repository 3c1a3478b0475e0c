//! Capabilities the proxy consumes: the remote store and a token source

use async_trait::async_trait;
use serde::Serialize;

use crate::error::{CredentialError, StoreError};
use crate::resource::ClinicalResource;

/// Result of a create call against the remote store
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateOutcome {
    pub created: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub assigned_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_detail: Option<String>,
}

/// Authenticated create operation against the clinical data store.
///
/// Implementations own transport concerns (timeouts, retries); the proxy
/// calls `create` at most once per request.
#[async_trait]
pub trait Store: Send + Sync {
    async fn create(
        &self,
        resource: &ClinicalResource,
        bearer_token: &str,
    ) -> Result<CreateOutcome, StoreError>;
}

/// Supplies a bearer token for the store on demand
#[async_trait]
pub trait TokenProvider: Send + Sync {
    async fn bearer_token(&self) -> Result<String, CredentialError>;
}
