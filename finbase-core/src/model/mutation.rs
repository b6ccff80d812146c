use garde::Validate;
use serde::{Deserialize, Serialize};

use super::{Endpoint, RowId, Selection};

const ENDPOINT: &str = "mutations";

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
pub struct Mutation {
    pub id: RowId,
    pub name: Option<String>,
    pub gene: Option<String>,
    pub notes: Option<String>,
}
impl Endpoint for Mutation {
    fn endpoint() -> String {
        ENDPOINT.to_string()
    }
}
impl Selection for Mutation {
    fn selection() -> String {
        "id,name,gene,notes".to_string()
    }
}

#[derive(Deserialize, Serialize, Validate, Debug, Clone, PartialEq)]
#[garde(allow_unvalidated)]
pub struct NewMutation {
    #[garde(length(min = 1))]
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gene: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}
impl Endpoint for NewMutation {
    fn endpoint() -> String {
        ENDPOINT.to_string()
    }
}
