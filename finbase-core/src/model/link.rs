use serde::{Serialize, ser::SerializeMap};

use super::{RowId, feature::FeatureKind};

/// A row of one of the `fish_<feature>` link tables.
#[derive(Debug, Clone, PartialEq)]
pub struct NewFishLink {
    pub kind: FeatureKind,
    pub fish_id: RowId,
    pub feature_id: RowId,
    pub notes: Option<String>,
}

impl NewFishLink {
    #[must_use]
    pub fn new(kind: FeatureKind, fish_id: RowId, feature_id: RowId) -> Self {
        Self {
            kind,
            fish_id,
            feature_id,
            notes: None,
        }
    }

    #[must_use]
    pub fn with_notes(mut self, notes: impl Into<String>) -> Self {
        self.notes = Some(notes.into());
        self
    }

    #[must_use]
    pub fn endpoint(&self) -> &'static str {
        self.kind.link_table()
    }
}

// The foreign key column depends on the kind, so the row is written as a map.
impl Serialize for NewFishLink {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        let Self {
            kind,
            fish_id,
            feature_id,
            notes,
        } = self;

        let mut map = serializer.serialize_map(Some(if notes.is_some() { 3 } else { 2 }))?;
        map.serialize_entry("fish_id", fish_id)?;
        map.serialize_entry(kind.foreign_key(), feature_id)?;
        if let Some(notes) = notes {
            map.serialize_entry("notes", notes)?;
        }
        map.end()
    }
}
