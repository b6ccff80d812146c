use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use valuable::Valuable;

use super::{Endpoint, RowId, Selection};

const ENDPOINT: &str = "plasmids";
const ELEMENT_LINK_ENDPOINT: &str = "plasmids_plasmid_elements";

/// A plasmid with every column the table happens to have.
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
pub struct Plasmid {
    pub id: RowId,
    pub name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub resistance: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(flatten)]
    pub other: BTreeMap<String, serde_json::Value>,
}
impl Endpoint for Plasmid {
    fn endpoint() -> String {
        ENDPOINT.to_string()
    }
}
impl Selection for Plasmid {
    fn selection() -> String {
        "*".to_string()
    }
}

/// A plasmid as one flat record. Columns outside the known ones are joined into `other`.
#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct PlasmidRow {
    pub id: RowId,
    pub name: Option<String>,
    pub description: Option<String>,
    pub resistance: Option<String>,
    pub notes: Option<String>,
    pub other: String,
}

impl From<Plasmid> for PlasmidRow {
    fn from(plasmid: Plasmid) -> Self {
        let Plasmid {
            id,
            name,
            description,
            resistance,
            notes,
            other,
        } = plasmid;

        let other = other
            .into_iter()
            .filter(|(_, v)| !v.is_null())
            .map(|(k, v)| match v {
                serde_json::Value::String(s) => format!("{k}={s}"),
                v => format!("{k}={v}"),
            })
            .collect::<Vec<_>>()
            .join("; ");

        Self {
            id,
            name,
            description,
            resistance,
            notes,
            other,
        }
    }
}

#[derive(Deserialize, Serialize, Valuable, Debug, Clone, Default, PartialEq)]
#[serde(default)]
pub struct PlasmidQuery {
    pub name: Option<String>,
    pub notes: Option<String>,
    pub id: Option<RowId>,
}

impl PlasmidQuery {
    /// Sets the exact-id filter from user text. Text that is not an integer is ignored.
    #[must_use]
    pub fn with_id_text(mut self, id: Option<&str>) -> Self {
        self.id = id.and_then(|s| s.trim().parse().ok());
        self
    }
}

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq, Default)]
pub struct PlasmidElement {
    pub id: Option<RowId>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub element_type: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub value: Option<String>,
}

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
pub struct PlasmidReference {
    pub id: RowId,
    pub name: Option<String>,
}

/// A `plasmids_plasmid_elements` row with both sides embedded.
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
pub struct PlasmidElementLink {
    pub plasmid_id: RowId,
    pub element_id: RowId,
    pub position: Option<i32>,
    pub notes: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
    pub created_by: Option<String>,
    pub element: Option<PlasmidElement>,
    pub plasmid: Option<PlasmidReference>,
}
impl Endpoint for PlasmidElementLink {
    fn endpoint() -> String {
        ELEMENT_LINK_ENDPOINT.to_string()
    }
}
impl Selection for PlasmidElementLink {
    fn selection() -> String {
        "plasmid_id,element_id,position,notes,created_at,created_by,element:plasmid_elements(*),plasmid:plasmids(id,name)"
            .to_string()
    }
}

/// Flattened element row, in display column order.
#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct PlasmidElementRow {
    pub position: Option<i32>,
    pub element_name: Option<String>,
    pub element_type: Option<String>,
    pub element_meta: Option<String>,
    pub join_notes: Option<String>,
    pub element_id: RowId,
    pub plasmid_id: RowId,
    pub plasmid_name: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
    pub created_by: Option<String>,
}

impl From<PlasmidElementLink> for PlasmidElementRow {
    fn from(link: PlasmidElementLink) -> Self {
        let PlasmidElementLink {
            plasmid_id,
            element_id,
            position,
            notes,
            created_at,
            created_by,
            element,
            plasmid,
        } = link;

        let element = element.unwrap_or_default();

        Self {
            position,
            element_name: element.name,
            element_type: element.element_type,
            element_meta: element.notes.or(element.value),
            join_notes: notes,
            element_id,
            plasmid_id,
            plasmid_name: plasmid.and_then(|p| p.name),
            created_at,
            created_by,
        }
    }
}
