//! fhir-proxy-core: the resource pipeline behind the FHIR proxy
//!
//! Decodes an incoming FHIR resource into a closed set of variants,
//! enriches it with this instance's identity tag, wraps it in a
//! single-entry transaction Bundle and submits it through the `Store`
//! capability. No HTTP server code lives here.

pub mod bundle;
pub mod decode;
pub mod enrich;
pub mod error;
pub mod gateway;
pub mod location;
pub mod outcome;
pub mod proxy;
pub mod resource;

pub use bundle::{Bundle, BundleEntry, BundleEntryRequest, BundleType, HttpVerb, wrap};
pub use decode::{decode, decode_str};
pub use enrich::{IdentityTag, enrich};
pub use error::{
    CredentialError, DecodeError, EnvelopeError, LocationError, ProxyError, StoreError,
};
pub use gateway::{CreateOutcome, Store, TokenProvider};
pub use location::StoreLocation;
pub use outcome::{IssueSeverity, IssueType, OperationOutcome, OperationOutcomeIssue};
pub use proxy::{FhirProxy, ProxyResult, RejectReason};
pub use resource::{ClinicalResource, Identifier, Observation, Patient, Quantity};
