//! Coordinates of the remote FHIR store

use crate::error::LocationError;

pub const DEFAULT_HEALTHCARE_HOST: &str = "healthcare.googleapis.com";

/// Where the Cloud Healthcare FHIR store lives.
///
/// Built once at startup and handed to the store gateway; nothing in the
/// request path reads the environment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreLocation {
    host: String,
    project: String,
    location: String,
    dataset: String,
    store: String,
}

impl StoreLocation {
    pub fn new(
        project: impl Into<String>,
        location: impl Into<String>,
        dataset: impl Into<String>,
        store: impl Into<String>,
    ) -> Result<Self, LocationError> {
        let location = Self {
            host: DEFAULT_HEALTHCARE_HOST.to_string(),
            project: project.into(),
            location: location.into(),
            dataset: dataset.into(),
            store: store.into(),
        };
        location.validate()?;
        Ok(location)
    }

    /// Override the API host (regional endpoints, emulators)
    pub fn with_host(mut self, host: impl Into<String>) -> Result<Self, LocationError> {
        self.host = host.into().trim_end_matches('/').to_string();
        self.validate()?;
        Ok(self)
    }

    /// FHIR base URL of the store, e.g.
    /// `https://healthcare.googleapis.com/v1beta1/projects/p/locations/l/datasets/d/fhirStores/s/fhir`
    pub fn base_url(&self) -> String {
        format!(
            "https://{}/v1beta1/projects/{}/locations/{}/datasets/{}/fhirStores/{}/fhir",
            self.host, self.project, self.location, self.dataset, self.store
        )
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn project(&self) -> &str {
        &self.project
    }

    pub fn store(&self) -> &str {
        &self.store
    }

    fn validate(&self) -> Result<(), LocationError> {
        let fields = [
            ("host", &self.host),
            ("project", &self.project),
            ("location", &self.location),
            ("dataset", &self.dataset),
            ("store", &self.store),
        ];
        for (name, value) in fields {
            if value.trim().is_empty() {
                return Err(LocationError::Empty(name));
            }
            if name != "host" && value.contains('/') {
                return Err(LocationError::Separator {
                    name,
                    value: value.clone(),
                });
            }
        }
        Ok(())
    }
}
