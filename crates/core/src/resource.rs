use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Number, Value as JsonValue};

/// Clinical resources this proxy knows how to normalize.
///
/// The variant set is closed: a new clinically supported type is one more
/// variant here plus one arm in [`crate::enrich`]. Anything else decodes to
/// [`ClinicalResource::Unrecognized`] and is never forwarded.
#[derive(Debug, Clone, PartialEq)]
pub enum ClinicalResource {
    Patient(Patient),
    Observation(Observation),
    Unrecognized { raw_type: String },
}

impl ClinicalResource {
    /// The FHIR `resourceType` this value was decoded from
    pub fn resource_type(&self) -> &str {
        match self {
            ClinicalResource::Patient(_) => "Patient",
            ClinicalResource::Observation(_) => "Observation",
            ClinicalResource::Unrecognized { raw_type } => raw_type,
        }
    }

    pub fn is_recognized(&self) -> bool {
        !matches!(self, ClinicalResource::Unrecognized { .. })
    }

    /// Identifiers in insertion order (empty for unrecognized resources)
    pub fn identifiers(&self) -> &[Identifier] {
        match self {
            ClinicalResource::Patient(patient) => &patient.identifiers,
            ClinicalResource::Observation(observation) => &observation.identifiers,
            ClinicalResource::Unrecognized { .. } => &[],
        }
    }
}

/// FHIR Patient (the members the proxy touches, everything else kept verbatim)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Patient {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    #[serde(default)]
    pub active: bool,

    #[serde(rename = "identifier", default, skip_serializing_if = "Vec::is_empty")]
    pub identifiers: Vec<Identifier>,

    #[serde(flatten)]
    pub extra: Map<String, JsonValue>,
}

/// FHIR Observation (the members the proxy touches, everything else kept verbatim)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Observation {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    #[serde(rename = "identifier", default, skip_serializing_if = "Vec::is_empty")]
    pub identifiers: Vec<Identifier>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value_quantity: Option<Quantity>,

    #[serde(flatten)]
    pub extra: Map<String, JsonValue>,
}

/// FHIR Quantity; only `value` is typed.
///
/// `value` is a FHIR decimal and keeps its exact textual form (`98.60` stays
/// `98.60`), so it is a JSON number rather than a float.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Quantity {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<Number>,

    #[serde(flatten)]
    pub extra: Map<String, JsonValue>,
}

/// FHIR Identifier: a (system, value) pair
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Identifier {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,

    #[serde(flatten)]
    pub extra: Map<String, JsonValue>,
}

impl Identifier {
    pub fn new(system: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            system: Some(system.into()),
            value: Some(value.into()),
            extra: Map::new(),
        }
    }
}

/// `resourceType` first, then the variant's own members.
impl Serialize for ClinicalResource {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        #[derive(Serialize)]
        struct Tagged<'a, T> {
            #[serde(rename = "resourceType")]
            resource_type: &'a str,
            #[serde(flatten)]
            body: &'a T,
        }

        match self {
            ClinicalResource::Patient(patient) => Tagged {
                resource_type: self.resource_type(),
                body: patient,
            }
            .serialize(serializer),
            ClinicalResource::Observation(observation) => Tagged {
                resource_type: self.resource_type(),
                body: observation,
            }
            .serialize(serializer),
            ClinicalResource::Unrecognized { raw_type } => {
                let mut map = serializer.serialize_map(Some(1))?;
                map.serialize_entry("resourceType", raw_type)?;
                map.end()
            }
        }
    }
}

impl<'de> Deserialize<'de> for ClinicalResource {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = JsonValue::deserialize(deserializer)?;
        crate::decode::from_value(value).map_err(serde::de::Error::custom)
    }
}
