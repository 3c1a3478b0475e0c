//! Server configuration

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use fhir_proxy_core::{IdentityTag, LocationError, StoreLocation};
use thiserror::Error;

/// How `POST /fhir-proxy` answers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ResponseMode {
    /// Plain-text status line ("Resource Created", ...)
    #[default]
    Status,
    /// The enriched resource as a transaction Bundle
    Envelope,
}

impl FromStr for ResponseMode {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "status" => Ok(ResponseMode::Status),
            "envelope" => Ok(ResponseMode::Envelope),
            _ => Err(ConfigError::Invalid {
                name: "RESPONSE_MODE",
                value: s.to_string(),
            }),
        }
    }
}

/// Cosmetic deployment details shown on the landing page
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceInfo {
    pub service: String,
    pub revision: String,
}

impl Default for ServiceInfo {
    fn default() -> Self {
        Self {
            service: "???".into(),
            revision: "???".into(),
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing required environment variable {0}")]
    Missing(&'static str),

    #[error("Invalid value for {name}: {value}")]
    Invalid { name: &'static str, value: String },

    #[error(transparent)]
    Location(#[from] LocationError),
}

/// Server configuration loaded from environment variables
pub struct Config {
    pub bind_address: String,
    pub api_key: Option<String>,
    pub cors_origins: Vec<String>,
    pub rate_limit_rps: u32,
    /// Largest accepted request body; `None` accepts any size
    pub body_limit_bytes: Option<usize>,
    pub store: StoreLocation,
    pub store_timeout: Duration,
    pub identity: IdentityTag,
    pub response_mode: ResponseMode,
    /// Fixed bearer token; takes precedence over every other credential source
    pub access_token: Option<String>,
    /// Service account key file; when unset tokens come from the metadata server
    pub credentials_file: Option<PathBuf>,
    pub metadata_host: String,
    pub service: ServiceInfo,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Load configuration through `lookup`, which returns a variable's value if set
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        // Empty values count as unset
        let var = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());
        let required = |name: &'static str| var(name).ok_or(ConfigError::Missing(name));

        let mut store = StoreLocation::new(
            required("PROJECT_ID")?,
            required("DATASET_LOCATION")?,
            required("DATASET_ID")?,
            required("FHIR_STORE_ID")?,
        )?;
        if let Some(host) = var("HEALTHCARE_HOST") {
            store = store.with_host(host)?;
        }

        let default_identity = IdentityTag::default();
        let identity = IdentityTag::new(
            var("PROXY_IDENTITY_SYSTEM").unwrap_or(default_identity.system),
            var("PROXY_IDENTITY_VALUE").unwrap_or(default_identity.value),
        );

        let response_mode = match var("RESPONSE_MODE") {
            Some(mode) => mode.parse()?,
            None => ResponseMode::default(),
        };

        let rate_limit_rps = parse_or("RATE_LIMIT_RPS", var("RATE_LIMIT_RPS"), 100u32)?;
        if rate_limit_rps == 0 {
            return Err(ConfigError::Invalid {
                name: "RATE_LIMIT_RPS",
                value: "0".into(),
            });
        }
        let store_timeout_secs = parse_or("STORE_TIMEOUT_SECS", var("STORE_TIMEOUT_SECS"), 30u64)?;
        let body_limit_bytes = var("BODY_LIMIT_BYTES")
            .map(|raw| parse_or("BODY_LIMIT_BYTES", Some(raw), 0usize))
            .transpose()?;

        let defaults = ServiceInfo::default();

        Ok(Self {
            bind_address: var("BIND_ADDRESS").unwrap_or_else(|| "0.0.0.0:8080".into()),
            api_key: var("API_KEY"),
            cors_origins: var("CORS_ORIGINS")
                .map(|origins| {
                    origins
                        .split(',')
                        .map(|o| o.trim().to_string())
                        .filter(|o| !o.is_empty())
                        .collect()
                })
                .unwrap_or_else(|| vec!["*".to_string()]),
            rate_limit_rps,
            body_limit_bytes,
            store,
            store_timeout: Duration::from_secs(store_timeout_secs),
            identity,
            response_mode,
            access_token: var("FHIR_PROXY_ACCESS_TOKEN"),
            credentials_file: var("GOOGLE_APPLICATION_CREDENTIALS").map(PathBuf::from),
            metadata_host: var("GCE_METADATA_HOST")
                .unwrap_or_else(|| "metadata.google.internal".into()),
            service: ServiceInfo {
                service: var("K_SERVICE").unwrap_or(defaults.service),
                revision: var("K_REVISION").unwrap_or(defaults.revision),
            },
        })
    }
}

fn parse_or<T: FromStr>(name: &'static str, raw: Option<String>, default: T) -> Result<T, ConfigError> {
    match raw {
        Some(value) => value.trim().parse().map_err(|_| ConfigError::Invalid { name, value }),
        None => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn load(vars: &[(&str, &str)]) -> Result<Config, ConfigError> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|name| vars.get(name).cloned())
    }

    const STORE_VARS: [(&str, &str); 4] = [
        ("PROJECT_ID", "hader-poc-001"),
        ("DATASET_LOCATION", "us-central1"),
        ("DATASET_ID", "test-dataset"),
        ("FHIR_STORE_ID", "test-fhir-store"),
    ];

    #[test]
    fn test_defaults() {
        let config = load(&STORE_VARS).unwrap();

        assert_eq!(config.bind_address, "0.0.0.0:8080");
        assert_eq!(config.api_key, None);
        assert_eq!(config.cors_origins, vec!["*"]);
        assert_eq!(config.rate_limit_rps, 100);
        assert_eq!(config.store_timeout, Duration::from_secs(30));
        assert_eq!(config.identity, IdentityTag::default());
        assert_eq!(config.response_mode, ResponseMode::Status);
        assert_eq!(config.body_limit_bytes, None);
        assert_eq!(config.access_token, None);
        assert_eq!(config.credentials_file, None);
        assert_eq!(config.metadata_host, "metadata.google.internal");
        assert_eq!(config.service, ServiceInfo::default());
        assert_eq!(
            config.store.base_url(),
            "https://healthcare.googleapis.com/v1beta1/projects/hader-poc-001/locations/us-central1/datasets/test-dataset/fhirStores/test-fhir-store/fhir"
        );
    }

    #[test]
    fn test_overrides() {
        let mut vars = STORE_VARS.to_vec();
        vars.extend([
            ("RESPONSE_MODE", "Envelope"),
            ("PROXY_IDENTITY_SYSTEM", "http://demo-fhir"),
            ("PROXY_IDENTITY_VALUE", "demo-test"),
            ("CORS_ORIGINS", "https://a.example, https://b.example"),
            ("RATE_LIMIT_RPS", "5"),
            ("API_KEY", "secret"),
            ("K_SERVICE", "fhir-proxy"),
            ("K_REVISION", "fhir-proxy-00002"),
            ("BODY_LIMIT_BYTES", "10485760"),
            ("GOOGLE_APPLICATION_CREDENTIALS", "/secrets/sa.json"),
        ]);
        let config = load(&vars).unwrap();

        assert_eq!(config.response_mode, ResponseMode::Envelope);
        assert_eq!(config.identity, IdentityTag::new("http://demo-fhir", "demo-test"));
        assert_eq!(
            config.cors_origins,
            vec!["https://a.example", "https://b.example"]
        );
        assert_eq!(config.rate_limit_rps, 5);
        assert_eq!(config.api_key.as_deref(), Some("secret"));
        assert_eq!(config.service.service, "fhir-proxy");
        assert_eq!(config.service.revision, "fhir-proxy-00002");
        assert_eq!(config.body_limit_bytes, Some(10 * 1024 * 1024));
        assert_eq!(
            config.credentials_file,
            Some(PathBuf::from("/secrets/sa.json"))
        );
    }

    #[test]
    fn test_missing_store_coordinate() {
        let err = load(&STORE_VARS[..3]).err().unwrap();
        assert!(matches!(err, ConfigError::Missing("FHIR_STORE_ID")));
    }

    #[test]
    fn test_invalid_values() {
        let mut vars = STORE_VARS.to_vec();
        vars.push(("RESPONSE_MODE", "verbose"));
        assert!(matches!(
            load(&vars).err().unwrap(),
            ConfigError::Invalid { name: "RESPONSE_MODE", .. }
        ));

        let mut vars = STORE_VARS.to_vec();
        vars.push(("RATE_LIMIT_RPS", "0"));
        assert!(matches!(
            load(&vars).err().unwrap(),
            ConfigError::Invalid { name: "RATE_LIMIT_RPS", .. }
        ));

        let mut vars = STORE_VARS.to_vec();
        vars.push(("BODY_LIMIT_BYTES", "2MB"));
        assert!(matches!(
            load(&vars).err().unwrap(),
            ConfigError::Invalid { name: "BODY_LIMIT_BYTES", .. }
        ));
    }
}
