//! Decode, enrich, wrap and submit a single clinical resource

use std::fmt;
use std::sync::Arc;

use serde::Serialize;

use crate::bundle::{Bundle, wrap};
use crate::decode::decode;
use crate::enrich::{IdentityTag, enrich};
use crate::error::ProxyError;
use crate::gateway::{CreateOutcome, Store, TokenProvider};

/// Why a request was turned away before reaching the store
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum RejectReason {
    UnrecognizedType,
    MalformedInput,
}

impl RejectReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            RejectReason::UnrecognizedType => "unrecognized-type",
            RejectReason::MalformedInput => "malformed-input",
        }
    }
}

impl fmt::Display for RejectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of one pass through the proxy
#[derive(Debug, Clone, PartialEq)]
pub enum ProxyResult {
    Rejected {
        reason: RejectReason,
    },
    Submitted {
        outcome: CreateOutcome,
        envelope: Bundle,
    },
}

impl ProxyResult {
    /// Terse status line for plain-text responses
    pub fn message(&self) -> &'static str {
        match self {
            ProxyResult::Submitted { outcome, .. } if outcome.created => "Resource Created",
            ProxyResult::Submitted { .. } => "Resource Not Created",
            ProxyResult::Rejected {
                reason: RejectReason::UnrecognizedType,
            } => "Resource Not Allowed",
            ProxyResult::Rejected {
                reason: RejectReason::MalformedInput,
            } => "Malformed Resource",
        }
    }
}

/// The proxy pipeline.
///
/// Cheap to clone; holds no per-request state.
#[derive(Clone)]
pub struct FhirProxy {
    store: Arc<dyn Store>,
    tokens: Arc<dyn TokenProvider>,
    identity: IdentityTag,
}

impl FhirProxy {
    pub fn new(
        store: Arc<dyn Store>,
        tokens: Arc<dyn TokenProvider>,
        identity: IdentityTag,
    ) -> Self {
        Self {
            store,
            tokens,
            identity,
        }
    }

    pub fn identity(&self) -> &IdentityTag {
        &self.identity
    }

    /// Run one request body through the pipeline.
    ///
    /// Malformed and unrecognized input is rejected without touching the
    /// token provider or the store. Otherwise the enriched resource is sent
    /// to the store exactly once; store and credential failures come back as
    /// [`ProxyError`] and are never retried here.
    pub async fn process(&self, raw: &[u8]) -> Result<ProxyResult, ProxyError> {
        let resource = match decode(raw) {
            Ok(resource) => resource,
            Err(e) => {
                tracing::warn!(error = %e, "Rejecting malformed resource");
                return Ok(ProxyResult::Rejected {
                    reason: RejectReason::MalformedInput,
                });
            }
        };

        if !resource.is_recognized() {
            tracing::warn!(
                resource_type = resource.resource_type(),
                "Rejecting unrecognized resource type"
            );
            return Ok(ProxyResult::Rejected {
                reason: RejectReason::UnrecognizedType,
            });
        }

        let enriched = enrich(resource, &self.identity);
        let envelope = wrap(&enriched).inspect_err(|e| {
            tracing::error!(error = %e, "Failed to build transaction envelope");
        })?;

        let token = self.tokens.bearer_token().await.inspect_err(|e| {
            tracing::warn!(error = %e, "Failed to obtain bearer token");
        })?;

        let outcome = self
            .store
            .create(&enriched, &token)
            .await
            .inspect_err(|e| {
                tracing::warn!(
                    error = %e,
                    resource_type = enriched.resource_type(),
                    "Store create failed"
                );
            })?;

        tracing::info!(
            resource_type = enriched.resource_type(),
            created = outcome.created,
            assigned_id = outcome.assigned_id.as_deref().unwrap_or("-"),
            "Resource submitted to store"
        );

        Ok(ProxyResult::Submitted { outcome, envelope })
    }
}
