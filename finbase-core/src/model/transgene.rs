use chrono::{DateTime, Utc};
use garde::Validate;
use serde::{Deserialize, Serialize};

use super::{Endpoint, RowId, Selection};

const ENDPOINT: &str = "transgenes";

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
pub struct Transgene {
    pub id: RowId,
    pub name: Option<String>,
    #[serde(rename = "type")]
    pub transgene_type: Option<String>,
    pub plasmid_id: Option<RowId>,
    pub description: Option<String>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}
impl Endpoint for Transgene {
    fn endpoint() -> String {
        ENDPOINT.to_string()
    }
}
impl Selection for Transgene {
    fn selection() -> String {
        "id,name,type,plasmid_id,description,created_at".to_string()
    }
}

#[derive(Deserialize, Serialize, Validate, Debug, Clone, PartialEq)]
#[garde(allow_unvalidated)]
pub struct NewTransgene {
    #[garde(length(min = 1))]
    pub name: String,
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub transgene_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub plasmid_id: Option<RowId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}
impl Endpoint for NewTransgene {
    fn endpoint() -> String {
        ENDPOINT.to_string()
    }
}
