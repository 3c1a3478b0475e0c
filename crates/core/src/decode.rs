//! Raw JSON to [`ClinicalResource`]

use serde_json::Value as JsonValue;

use crate::error::DecodeError;
use crate::resource::ClinicalResource;

/// Member naming the resource variant
pub const DISCRIMINATOR: &str = "resourceType";

/// Decode a request body into a clinical resource.
///
/// Unknown resource types are not an error: they come back as
/// [`ClinicalResource::Unrecognized`] so the caller can reject them. Anything
/// that is not a JSON object with a string `resourceType` is malformed.
pub fn decode(raw: &[u8]) -> Result<ClinicalResource, DecodeError> {
    let value: JsonValue = serde_json::from_slice(raw)
        .map_err(|e| DecodeError::MalformedInput(format!("Invalid JSON: {}", e)))?;
    from_value(value)
}

pub fn decode_str(raw: &str) -> Result<ClinicalResource, DecodeError> {
    decode(raw.as_bytes())
}

/// Classify an already parsed JSON document
pub fn from_value(value: JsonValue) -> Result<ClinicalResource, DecodeError> {
    let JsonValue::Object(mut members) = value else {
        return Err(DecodeError::MalformedInput(
            "Expected a JSON object".to_string(),
        ));
    };

    let resource_type = match members.remove(DISCRIMINATOR) {
        Some(JsonValue::String(name)) if !name.is_empty() => name,
        Some(_) => {
            return Err(DecodeError::MalformedInput(
                "resourceType must be a non-empty string".to_string(),
            ));
        }
        None => {
            return Err(DecodeError::MalformedInput(
                "Missing required field: resourceType".to_string(),
            ));
        }
    };

    tracing::debug!(resource_type = %resource_type, "Decoding clinical resource");

    let body = JsonValue::Object(members);
    match resource_type.as_str() {
        "Patient" => serde_json::from_value(body)
            .map(ClinicalResource::Patient)
            .map_err(|e| shape_error("Patient", e)),
        "Observation" => serde_json::from_value(body)
            .map(ClinicalResource::Observation)
            .map_err(|e| shape_error("Observation", e)),
        _ => Ok(ClinicalResource::Unrecognized {
            raw_type: resource_type,
        }),
    }
}

fn shape_error(resource_type: &str, err: serde_json::Error) -> DecodeError {
    DecodeError::MalformedInput(format!("Invalid {} resource: {}", resource_type, err))
}
