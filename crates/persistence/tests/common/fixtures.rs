//! Resource fixtures for testing.
//!
//! Builders produce resources shaped the way the default index definitions
//! expect, so every fixture yields a predictable set of index entries.

use helios_resource_store::types::Resource;
use serde_json::{Value, json};

/// A patient fixture for testing.
#[derive(Debug, Clone)]
pub struct PatientFixture {
    /// Patient ID.
    pub id: String,
    /// Family name.
    pub family: String,
    /// Given names.
    pub given: Vec<String>,
    /// Birth date (YYYY-MM-DD).
    pub birth_date: Option<String>,
    /// Gender code.
    pub gender: Option<String>,
    /// Identifiers as (system, value).
    pub identifiers: Vec<(String, String)>,
    /// Managing organization reference.
    pub organization: Option<String>,
    /// Active flag.
    pub active: Option<bool>,
}

impl PatientFixture {
    /// Creates a new patient fixture.
    pub fn new(id: impl Into<String>, family: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            family: family.into(),
            given: Vec::new(),
            birth_date: None,
            gender: None,
            identifiers: Vec::new(),
            organization: None,
            active: None,
        }
    }

    /// Adds a given name.
    pub fn with_given(mut self, given: impl Into<String>) -> Self {
        self.given.push(given.into());
        self
    }

    /// Sets the birth date.
    pub fn with_birth_date(mut self, date: impl Into<String>) -> Self {
        self.birth_date = Some(date.into());
        self
    }

    /// Sets the gender.
    pub fn with_gender(mut self, gender: impl Into<String>) -> Self {
        self.gender = Some(gender.into());
        self
    }

    /// Adds an identifier.
    pub fn with_identifier(mut self, system: impl Into<String>, value: impl Into<String>) -> Self {
        self.identifiers.push((system.into(), value.into()));
        self
    }

    /// Sets the managing organization, e.g. `Organization/o1`.
    pub fn with_organization(mut self, reference: impl Into<String>) -> Self {
        self.organization = Some(reference.into());
        self
    }

    /// Sets the active flag.
    pub fn with_active(mut self, active: bool) -> Self {
        self.active = Some(active);
        self
    }

    /// Converts to JSON content.
    pub fn to_json(&self) -> Value {
        let mut patient = json!({
            "name": [{
                "family": self.family,
                "given": self.given,
            }],
        });

        if let Some(birth_date) = &self.birth_date {
            patient["birthDate"] = json!(birth_date);
        }
        if let Some(gender) = &self.gender {
            patient["gender"] = json!(gender);
        }
        if !self.identifiers.is_empty() {
            patient["identifier"] = self
                .identifiers
                .iter()
                .map(|(system, value)| {
                    if system.is_empty() {
                        json!({"value": value})
                    } else {
                        json!({"system": system, "value": value})
                    }
                })
                .collect();
        }
        if let Some(organization) = &self.organization {
            patient["managingOrganization"] = json!({"reference": organization});
        }
        if let Some(active) = self.active {
            patient["active"] = json!(active);
        }

        patient
    }

    /// Converts to a resource.
    pub fn to_resource(&self) -> Resource {
        Resource::new("Patient", &self.id, self.to_json())
    }
}

/// An observation fixture for testing.
#[derive(Debug, Clone)]
pub struct ObservationFixture {
    /// Observation ID.
    pub id: String,
    /// Observation status.
    pub status: String,
    /// LOINC code.
    pub code: String,
    /// Subject reference.
    pub subject: String,
    /// Quantity value.
    pub value: Option<f64>,
    /// Quantity unit.
    pub unit: Option<String>,
}

impl ObservationFixture {
    /// Creates a new observation fixture.
    pub fn new(id: impl Into<String>, code: impl Into<String>, subject: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            status: "final".to_string(),
            code: code.into(),
            subject: subject.into(),
            value: None,
            unit: None,
        }
    }

    /// Sets the observation status.
    pub fn with_status(mut self, status: impl Into<String>) -> Self {
        self.status = status.into();
        self
    }

    /// Sets a quantity value.
    pub fn with_value(mut self, value: f64, unit: impl Into<String>) -> Self {
        self.value = Some(value);
        self.unit = Some(unit.into());
        self
    }

    /// Converts to JSON content.
    pub fn to_json(&self) -> Value {
        let mut obs = json!({
            "status": self.status,
            "code": {
                "coding": [{
                    "system": "http://loinc.org",
                    "code": self.code,
                }],
            },
            "subject": {
                "reference": self.subject,
            },
        });

        if let (Some(value), Some(unit)) = (&self.value, &self.unit) {
            obs["valueQuantity"] = json!({
                "value": value,
                "unit": unit,
                "system": "http://unitsofmeasure.org",
            });
        }

        obs
    }

    /// Converts to a resource.
    pub fn to_resource(&self) -> Resource {
        Resource::new("Observation", &self.id, self.to_json())
    }
}

/// An organization fixture for testing.
#[derive(Debug, Clone)]
pub struct OrganizationFixture {
    /// Organization ID.
    pub id: String,
    /// Organization name.
    pub name: String,
}

impl OrganizationFixture {
    /// Creates a new organization fixture.
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
        }
    }

    /// Converts to a resource.
    pub fn to_resource(&self) -> Resource {
        Resource::new("Organization", &self.id, json!({"name": self.name}))
    }
}
