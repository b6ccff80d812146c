use chrono::{DateTime, NaiveDate, Utc};
use garde::Validate;
use serde::{Deserialize, Serialize};
use strum::{EnumString, IntoStaticStr};
use uuid::Uuid;
use valuable::Valuable;

use super::{Endpoint, Pagination, RowId, Selection};

const ENDPOINT: &str = "fish";

/// Name of the server-side function that deletes a fish and its links in one transaction.
pub const DELETE_FISH_WITH_LINKS: &str = "delete_fish_with_links";

/// Text columns searched by the free-text fish filter.
pub const SEARCH_COLUMNS: [&str; 4] = ["name", "notes", "fish_code", "line_building_stage"];

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
pub struct Fish {
    pub id: RowId,
    pub name: Option<String>,
    pub date_birth: Option<NaiveDate>,
    pub notes: Option<String>,
    pub mother_fish_id: Option<RowId>,
    pub father_fish_id: Option<RowId>,
    pub line_building_stage: Option<String>,
    pub fish_code: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
    pub created_by: Option<Uuid>,
}
impl Endpoint for Fish {
    fn endpoint() -> String {
        ENDPOINT.to_string()
    }
}
impl Selection for Fish {
    fn selection() -> String {
        "id,name,date_birth,notes,mother_fish_id,father_fish_id,line_building_stage,fish_code,created_at,created_by"
            .to_string()
    }
}

#[derive(Deserialize, Serialize, Validate, Debug, Clone, Default, PartialEq)]
#[garde(allow_unvalidated)]
pub struct NewFish {
    #[serde(skip_serializing_if = "Option::is_none")]
    #[garde(length(min = 1))]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date_birth: Option<NaiveDate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub line_building_stage: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    #[garde(length(min = 1))]
    pub fish_code: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mother_fish_id: Option<RowId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    #[garde(custom(distinct_parents(self.mother_fish_id)))]
    pub father_fish_id: Option<RowId>,
}
impl Endpoint for NewFish {
    fn endpoint() -> String {
        ENDPOINT.to_string()
    }
}

fn distinct_parents(mother: Option<RowId>) -> impl FnOnce(&Option<RowId>, &()) -> garde::Result {
    move |father, ()| {
        if mother.is_some() && mother == *father {
            return Err(garde::Error::new("mother and father must be different fish"));
        }

        Ok(())
    }
}

impl NewFish {
    /// Drops blank text fields so they are left to the database defaults.
    #[must_use]
    pub fn normalized(self) -> Self {
        fn clean(value: Option<String>) -> Option<String> {
            value
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
        }

        Self {
            name: clean(self.name),
            notes: clean(self.notes),
            line_building_stage: clean(self.line_building_stage),
            fish_code: clean(self.fish_code),
            ..self
        }
    }
}

/// Changed fields of an existing fish. Unset fields are left untouched.
#[derive(Deserialize, Serialize, Validate, Debug, Clone, Default, PartialEq)]
#[garde(allow_unvalidated)]
pub struct FishUpdate {
    #[serde(skip)]
    pub id: RowId,
    #[serde(skip_serializing_if = "Option::is_none")]
    #[garde(length(min = 1))]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date_birth: Option<NaiveDate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub line_building_stage: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    #[garde(length(min = 1))]
    pub fish_code: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mother_fish_id: Option<RowId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub father_fish_id: Option<RowId>,
}

impl FishUpdate {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        let Self {
            id: _,
            name,
            date_birth,
            notes,
            line_building_stage,
            fish_code,
            mother_fish_id,
            father_fish_id,
        } = self;

        name.is_none()
            && date_birth.is_none()
            && notes.is_none()
            && line_building_stage.is_none()
            && fish_code.is_none()
            && mother_fish_id.is_none()
            && father_fish_id.is_none()
    }

    /// Keeps only the fields whose value differs from `current`.
    #[must_use]
    pub fn diff(self, current: &Fish) -> Self {
        fn changed<T: PartialEq>(new: Option<T>, old: Option<&T>) -> Option<T> {
            new.filter(|n| Some(n) != old)
        }

        Self {
            id: current.id,
            name: changed(self.name, current.name.as_ref()),
            date_birth: changed(self.date_birth, current.date_birth.as_ref()),
            notes: changed(self.notes, current.notes.as_ref()),
            line_building_stage: changed(
                self.line_building_stage,
                current.line_building_stage.as_ref(),
            ),
            fish_code: changed(self.fish_code, current.fish_code.as_ref()),
            mother_fish_id: changed(self.mother_fish_id, current.mother_fish_id.as_ref()),
            father_fish_id: changed(self.father_fish_id, current.father_fish_id.as_ref()),
        }
    }
}

#[derive(
    Deserialize,
    Serialize,
    Valuable,
    EnumString,
    IntoStaticStr,
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Default,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum FishOrdinalColumn {
    #[default]
    CreatedAt,
    Id,
    Name,
    FishCode,
    DateBirth,
}

#[derive(Deserialize, Serialize, Valuable, Debug, Clone, Copy, PartialEq, Eq)]
pub struct FishOrdering {
    pub column: FishOrdinalColumn,
    pub descending: bool,
}

impl Default for FishOrdering {
    fn default() -> Self {
        Self {
            column: FishOrdinalColumn::CreatedAt,
            descending: true,
        }
    }
}

#[derive(Deserialize, Serialize, Valuable, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct FishQuery {
    pub ids: Vec<RowId>,
    pub search: Option<String>,
    pub order_by: Vec<FishOrdering>,
    pub pagination: Pagination,
}

impl Default for FishQuery {
    fn default() -> Self {
        Self {
            ids: Vec::new(),
            search: None,
            order_by: vec![FishOrdering::default()],
            pagination: Pagination::default(),
        }
    }
}
