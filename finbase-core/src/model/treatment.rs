use garde::Validate;
use serde::{Deserialize, Serialize};

use super::{Endpoint, RowId, Selection, feature::Feature};

const ENDPOINT: &str = "treatments";

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
pub struct Treatment {
    pub id: RowId,
    pub name: Option<String>,
    #[serde(rename = "type")]
    pub treatment_type: Option<String>,
    pub description: Option<String>,
}
impl Endpoint for Treatment {
    fn endpoint() -> String {
        ENDPOINT.to_string()
    }
}
impl Selection for Treatment {
    fn selection() -> String {
        "id,name,type,description".to_string()
    }
}

impl From<Treatment> for Feature {
    fn from(treatment: Treatment) -> Self {
        let Treatment {
            id,
            name,
            treatment_type,
            description,
        } = treatment;

        Self {
            id,
            name,
            feature_type: treatment_type,
            description,
            ..Default::default()
        }
    }
}

#[derive(Deserialize, Serialize, Validate, Debug, Clone, PartialEq)]
#[garde(allow_unvalidated)]
pub struct NewTreatment {
    #[garde(length(min = 1))]
    pub name: String,
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub treatment_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}
impl Endpoint for NewTreatment {
    fn endpoint() -> String {
        ENDPOINT.to_string()
    }
}

impl NewTreatment {
    /// Trims every field and drops the optional ones left blank.
    #[must_use]
    pub fn new(name: &str, treatment_type: Option<&str>, description: Option<&str>) -> Self {
        let optional = |value: Option<&str>| {
            value
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
        };

        Self {
            name: name.trim().to_string(),
            treatment_type: optional(treatment_type),
            description: optional(description),
        }
    }
}
