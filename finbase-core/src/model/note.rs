use chrono::{DateTime, Utc};
use garde::Validate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{Endpoint, Pagination, RowId, Selection};

const ENDPOINT: &str = "notes";

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
pub struct Note {
    pub id: RowId,
    pub user_id: Uuid,
    pub title: Option<String>,
    pub body: Option<String>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}
impl Endpoint for Note {
    fn endpoint() -> String {
        ENDPOINT.to_string()
    }
}
impl Selection for Note {
    fn selection() -> String {
        "*".to_string()
    }
}

impl Note {
    #[must_use]
    pub fn title_or_placeholder(&self) -> &str {
        self.title
            .as_deref()
            .filter(|t| !t.trim().is_empty())
            .unwrap_or("(untitled)")
    }
}

/// Notes are listed newest first.
#[derive(Deserialize, Serialize, Debug, Clone, Default, PartialEq)]
#[serde(default)]
pub struct NoteQuery {
    pub user_id: Option<Uuid>,
    pub pagination: Pagination,
}

#[derive(Deserialize, Serialize, Validate, Debug, Clone, PartialEq)]
#[garde(allow_unvalidated)]
pub struct NewNote {
    pub user_id: Uuid,
    #[garde(length(min = 1))]
    pub title: String,
    pub body: String,
}
impl Endpoint for NewNote {
    fn endpoint() -> String {
        ENDPOINT.to_string()
    }
}

impl NewNote {
    #[must_use]
    pub fn new(user_id: Uuid, title: &str, body: Option<&str>) -> Self {
        Self {
            user_id,
            title: title.trim().to_string(),
            body: body.unwrap_or_default().trim().to_string(),
        }
    }
}
