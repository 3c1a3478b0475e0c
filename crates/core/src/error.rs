use thiserror::Error;

/// Request body could not be turned into a clinical resource
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    #[error("Malformed input: {0}")]
    MalformedInput(String),
}

/// Store gateway failures
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Store request failed: {0}")]
    Transport(String),

    #[error("Store rejected the request ({status}): {detail}")]
    Rejected { status: u16, detail: String },

    #[error("Could not encode resource: {0}")]
    Encode(String),
}

/// Resource could not be serialized into the transaction envelope
#[derive(Debug, Error)]
#[error("Could not serialize envelope entry: {0}")]
pub struct EnvelopeError(pub String);

/// Bearer token could not be obtained
#[derive(Debug, Error)]
#[error("Credential error: {0}")]
pub struct CredentialError(pub String);

/// Invalid store coordinates
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LocationError {
    #[error("Store coordinate '{0}' cannot be empty")]
    Empty(&'static str),

    #[error("Store coordinate '{name}' contains a '/': {value}")]
    Separator { name: &'static str, value: String },
}

/// Failures that stop the proxy from completing a submission.
///
/// Rejections of the input are not errors; see [`crate::ProxyResult`].
#[derive(Debug, Error)]
pub enum ProxyError {
    #[error("Store unavailable: {0}")]
    StoreUnavailable(String),

    #[error("Credential error: {0}")]
    Credential(String),

    #[error("Envelope error: {0}")]
    Envelope(String),
}

impl From<StoreError> for ProxyError {
    fn from(err: StoreError) -> Self {
        ProxyError::StoreUnavailable(err.to_string())
    }
}

impl From<CredentialError> for ProxyError {
    fn from(err: CredentialError) -> Self {
        ProxyError::Credential(err.0)
    }
}

impl From<EnvelopeError> for ProxyError {
    fn from(err: EnvelopeError) -> Self {
        ProxyError::Envelope(err.0)
    }
}
