//! Outbound side of the proxy: the FHIR store and its credentials

pub mod credentials;
pub mod healthcare;

use std::sync::Arc;

use fhir_proxy_core::{CredentialError, FhirProxy, StoreError, TokenProvider};
use thiserror::Error;

pub use credentials::{
    CLOUD_PLATFORM_SCOPE, MetadataTokenProvider, ServiceAccountTokenProvider, StaticTokenProvider,
};
pub use healthcare::HealthcareStore;

use crate::config::Config;

/// The store client or token source could not be set up
#[derive(Debug, Error)]
pub enum GatewayError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Credential(#[from] CredentialError),
}

/// Wire the proxy pipeline to the store and token source named by `config`.
///
/// Token source precedence: static token, service account key file,
/// metadata server.
pub fn proxy_from_config(config: &Config) -> Result<FhirProxy, GatewayError> {
    let store = HealthcareStore::for_location(&config.store, config.store_timeout)?;

    let tokens: Arc<dyn TokenProvider> = match (&config.access_token, &config.credentials_file) {
        (Some(token), _) => Arc::new(StaticTokenProvider::new(token.clone())),
        (None, Some(path)) => Arc::new(ServiceAccountTokenProvider::from_file(
            path,
            config.store_timeout,
        )?),
        (None, None) => Arc::new(MetadataTokenProvider::for_host(
            &config.metadata_host,
            config.store_timeout,
        )?),
    };

    Ok(FhirProxy::new(Arc::new(store), tokens, config.identity.clone()))
}
