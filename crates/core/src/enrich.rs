//! Per-variant enrichment rules

use serde::{Deserialize, Serialize};

use crate::resource::{ClinicalResource, Identifier};

const DEFAULT_IDENTITY_SYSTEM: &str = "http://simple-fhir-proxy";
const DEFAULT_IDENTITY_VALUE: &str = "simple-fhir-proxy";

/// Identifier stamped on every resource this proxy instance forwards.
///
/// Constant for the lifetime of a running instance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdentityTag {
    pub system: String,
    pub value: String,
}

impl IdentityTag {
    pub fn new(system: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            system: system.into(),
            value: value.into(),
        }
    }

    pub fn to_identifier(&self) -> Identifier {
        Identifier::new(self.system.clone(), self.value.clone())
    }
}

impl Default for IdentityTag {
    fn default() -> Self {
        Self::new(DEFAULT_IDENTITY_SYSTEM, DEFAULT_IDENTITY_VALUE)
    }
}

/// Apply the enrichment rule for the resource's variant.
///
/// Never changes the variant and never deduplicates: every call appends
/// one identifier to a Patient or Observation.
pub fn enrich(resource: ClinicalResource, identity: &IdentityTag) -> ClinicalResource {
    match resource {
        ClinicalResource::Patient(mut patient) => {
            patient.active = true;
            patient.identifiers.push(identity.to_identifier());
            ClinicalResource::Patient(patient)
        }
        ClinicalResource::Observation(mut observation) => {
            observation.identifiers.push(identity.to_identifier());
            ClinicalResource::Observation(observation)
        }
        unrecognized @ ClinicalResource::Unrecognized { .. } => unrecognized,
    }
}
