//! Bearer token sources for the store gateway

use std::path::Path;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use fhir_proxy_core::{CredentialError, TokenProvider};
use jsonwebtoken::{Algorithm, EncodingKey, Header};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

/// OAuth scope covering the Cloud Healthcare API
pub const CLOUD_PLATFORM_SCOPE: &str = "https://www.googleapis.com/auth/cloud-platform";

const TOKEN_PATH: &str = "/computeMetadata/v1/instance/service-accounts/default/token";

const JWT_BEARER_GRANT: &str = "urn:ietf:params:oauth:grant-type:jwt-bearer";

/// Lifetime requested for a signed assertion (the maximum Google accepts)
const ASSERTION_LIFETIME_SECS: u64 = 3600;

/// Cached tokens are refreshed this long before they expire
const REFRESH_MARGIN: Duration = Duration::from_secs(60);

/// Hands out the same token on every call
pub struct StaticTokenProvider {
    token: String,
}

impl StaticTokenProvider {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
        }
    }
}

#[async_trait]
impl TokenProvider for StaticTokenProvider {
    async fn bearer_token(&self) -> Result<String, CredentialError> {
        Ok(self.token.clone())
    }
}

/// OAuth token response (metadata server and token endpoint share the shape)
#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    expires_in: Option<u64>,
}

fn http_client(timeout: Duration) -> Result<reqwest::Client, CredentialError> {
    reqwest::Client::builder()
        .timeout(timeout)
        .build()
        .map_err(|e| CredentialError(format!("Failed to build HTTP client: {}", e)))
}

/// Send a token request and read the access token out of the reply
async fn fetch_token(
    request: reqwest::RequestBuilder,
    source: &str,
) -> Result<TokenResponse, CredentialError> {
    let response = request
        .send()
        .await
        .map_err(|e| CredentialError(format!("{} request failed: {}", source, e)))?;

    if !response.status().is_success() {
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        return Err(CredentialError(format!(
            "{} error ({}): {}",
            source,
            status,
            body.trim()
        )));
    }

    let token = response
        .json::<TokenResponse>()
        .await
        .map_err(|e| CredentialError(format!("Failed to parse token response: {}", e)))?;

    if token.access_token.is_empty() {
        return Err(CredentialError(format!("{} returned an empty token", source)));
    }

    Ok(token)
}

/// Token of the runtime's default service account, fetched from the GCE
/// metadata server (Cloud Run, GKE, Compute Engine).
///
/// A fresh token is requested per call; the metadata server caches on its side.
pub struct MetadataTokenProvider {
    http: reqwest::Client,
    token_url: String,
}

impl MetadataTokenProvider {
    /// `base_url` is the metadata server root, e.g. `http://metadata.google.internal`
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, CredentialError> {
        Ok(Self {
            http: http_client(timeout)?,
            token_url: format!("{}{}", base_url.trim_end_matches('/'), TOKEN_PATH),
        })
    }

    /// Provider for a bare metadata host name (as in `GCE_METADATA_HOST`)
    pub fn for_host(host: &str, timeout: Duration) -> Result<Self, CredentialError> {
        Self::new(&format!("http://{}", host), timeout)
    }
}

#[async_trait]
impl TokenProvider for MetadataTokenProvider {
    async fn bearer_token(&self) -> Result<String, CredentialError> {
        let request = self
            .http
            .get(&self.token_url)
            .query(&[("scopes", CLOUD_PLATFORM_SCOPE)])
            .header("Metadata-Flavor", "Google");

        Ok(fetch_token(request, "Metadata server").await?.access_token)
    }
}

/// Fields of a service account key file the token exchange needs
#[derive(Deserialize)]
struct ServiceAccountKey {
    client_email: String,
    private_key: String,
    token_uri: String,
}

#[derive(Serialize)]
struct AssertionClaims<'a> {
    iss: &'a str,
    scope: &'a str,
    aud: &'a str,
    iat: u64,
    exp: u64,
}

struct CachedToken {
    token: String,
    refresh_at: Instant,
}

/// Tokens minted from a service account key file (`GOOGLE_APPLICATION_CREDENTIALS`).
///
/// Signs an RS256 assertion and exchanges it at the key's `token_uri`
/// (OAuth 2.0 JWT bearer grant). The access token is reused until shortly
/// before it expires.
pub struct ServiceAccountTokenProvider {
    http: reqwest::Client,
    client_email: String,
    token_uri: String,
    signing_key: EncodingKey,
    cached: Mutex<Option<CachedToken>>,
}

impl ServiceAccountTokenProvider {
    /// Provider for the contents of a service account key file
    pub fn from_json(key_json: &str, timeout: Duration) -> Result<Self, CredentialError> {
        let key: ServiceAccountKey = serde_json::from_str(key_json)
            .map_err(|e| CredentialError(format!("Invalid service account key: {}", e)))?;
        let signing_key = EncodingKey::from_rsa_pem(key.private_key.as_bytes())
            .map_err(|e| CredentialError(format!("Invalid service account private key: {}", e)))?;

        Ok(Self {
            http: http_client(timeout)?,
            client_email: key.client_email,
            token_uri: key.token_uri,
            signing_key,
            cached: Mutex::new(None),
        })
    }

    pub fn from_file(path: &Path, timeout: Duration) -> Result<Self, CredentialError> {
        let key_json = std::fs::read_to_string(path).map_err(|e| {
            CredentialError(format!(
                "Failed to read service account key {}: {}",
                path.display(),
                e
            ))
        })?;
        Self::from_json(&key_json, timeout)
    }

    pub fn client_email(&self) -> &str {
        &self.client_email
    }

    fn sign_assertion(&self) -> Result<String, CredentialError> {
        let iat = jsonwebtoken::get_current_timestamp();
        let claims = AssertionClaims {
            iss: &self.client_email,
            scope: CLOUD_PLATFORM_SCOPE,
            aud: &self.token_uri,
            iat,
            exp: iat + ASSERTION_LIFETIME_SECS,
        };

        jsonwebtoken::encode(&Header::new(Algorithm::RS256), &claims, &self.signing_key)
            .map_err(|e| CredentialError(format!("Failed to sign token assertion: {}", e)))
    }
}

#[async_trait]
impl TokenProvider for ServiceAccountTokenProvider {
    async fn bearer_token(&self) -> Result<String, CredentialError> {
        // Held across the exchange so concurrent requests share one refresh
        let mut cached = self.cached.lock().await;
        if let Some(token) = cached.as_ref().filter(|t| Instant::now() < t.refresh_at) {
            return Ok(token.token.clone());
        }

        let assertion = self.sign_assertion()?;
        let request = self
            .http
            .post(&self.token_uri)
            .form(&[("grant_type", JWT_BEARER_GRANT), ("assertion", assertion.as_str())]);
        let response = fetch_token(request, "Token endpoint").await?;

        tracing::debug!(
            client_email = %self.client_email,
            expires_in = response.expires_in,
            "Obtained service account token"
        );

        let lifetime = Duration::from_secs(response.expires_in.unwrap_or(ASSERTION_LIFETIME_SECS));
        *cached = Some(CachedToken {
            token: response.access_token.clone(),
            refresh_at: Instant::now() + lifetime.saturating_sub(REFRESH_MARGIN),
        });

        Ok(response.access_token)
    }
}
