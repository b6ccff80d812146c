use garde::Validate;
use serde::{Deserialize, Serialize};

use super::{Endpoint, RowId, Selection};

const ENDPOINT: &str = "strains";

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
pub struct Strain {
    pub id: RowId,
    pub name: Option<String>,
    pub description: Option<String>,
}
impl Endpoint for Strain {
    fn endpoint() -> String {
        ENDPOINT.to_string()
    }
}
impl Selection for Strain {
    fn selection() -> String {
        "id,name,description".to_string()
    }
}

#[derive(Deserialize, Serialize, Validate, Debug, Clone, PartialEq)]
#[garde(allow_unvalidated)]
pub struct NewStrain {
    #[garde(length(min = 1))]
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}
impl Endpoint for NewStrain {
    fn endpoint() -> String {
        ENDPOINT.to_string()
    }
}
