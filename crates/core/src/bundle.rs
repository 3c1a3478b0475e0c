use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::EnvelopeError;
use crate::resource::ClinicalResource;

/// FHIR Bundle types produced by the proxy
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum BundleType {
    Transaction,
}

/// HTTP verb of a transaction entry
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "UPPERCASE")]
pub enum HttpVerb {
    Post,
}

/// FHIR Bundle resource (simplified to the single-entry transaction the proxy echoes)
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Bundle {
    pub resource_type: String,

    #[serde(rename = "type")]
    pub bundle_type: BundleType,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub entry: Vec<BundleEntry>,
}

/// Entry in a Bundle
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct BundleEntry {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub full_url: Option<String>,

    pub resource: ClinicalResource,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub request: Option<BundleEntryRequest>,
}

/// Transaction instruction of an entry
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct BundleEntryRequest {
    pub method: HttpVerb,
    pub url: String,
}

impl Bundle {
    /// Transaction bundle with one `POST` entry creating `resource`
    pub fn transaction_create(resource: ClinicalResource) -> Result<Self, EnvelopeError> {
        let full_url = entry_full_url(&resource)?;
        let request = BundleEntryRequest {
            method: HttpVerb::Post,
            url: resource.resource_type().to_string(),
        };
        Ok(Self {
            resource_type: "Bundle".to_string(),
            bundle_type: BundleType::Transaction,
            entry: vec![BundleEntry {
                full_url: Some(full_url),
                resource,
                request: Some(request),
            }],
        })
    }

    /// Resource of the first entry
    pub fn resource(&self) -> Option<&ClinicalResource> {
        self.entry.first().map(|entry| &entry.resource)
    }
}

/// Wrap a resource in a single-entry transaction bundle.
///
/// Same resource in, same bytes out: the entry's `fullUrl` is a name-based
/// UUID of the serialized resource rather than a random one.
pub fn wrap(resource: &ClinicalResource) -> Result<Bundle, EnvelopeError> {
    Bundle::transaction_create(resource.clone())
}

fn entry_full_url(resource: &ClinicalResource) -> Result<String, EnvelopeError> {
    let serialized = serde_json::to_vec(resource).map_err(|e| EnvelopeError(e.to_string()))?;
    Ok(format!(
        "urn:uuid:{}",
        Uuid::new_v5(&Uuid::NAMESPACE_URL, &serialized)
    ))
}
