//! Catalog entries that can be attached to a fish through a link table.

use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString, IntoStaticStr};
use valuable::Valuable;

use super::{Pagination, RowId};

#[derive(
    Deserialize,
    Serialize,
    Valuable,
    Display,
    EnumString,
    EnumIter,
    IntoStaticStr,
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum FeatureKind {
    Transgene,
    Mutation,
    Treatment,
    Strain,
}

impl FeatureKind {
    /// Kinds that a newly bred fish inherits from its parents.
    pub const INHERITABLE: [Self; 3] = [Self::Transgene, Self::Mutation, Self::Treatment];

    #[must_use]
    pub fn table(self) -> &'static str {
        match self {
            Self::Transgene => "transgenes",
            Self::Mutation => "mutations",
            Self::Treatment => "treatments",
            Self::Strain => "strains",
        }
    }

    #[must_use]
    pub fn link_table(self) -> &'static str {
        match self {
            Self::Transgene => "fish_transgenes",
            Self::Mutation => "fish_mutations",
            Self::Treatment => "fish_treatments",
            Self::Strain => "fish_strains",
        }
    }

    /// Column of the link table that references the catalog.
    #[must_use]
    pub fn foreign_key(self) -> &'static str {
        match self {
            Self::Transgene => "transgene_id",
            Self::Mutation => "mutation_id",
            Self::Treatment => "treatment_id",
            Self::Strain => "strain_id",
        }
    }

    /// Catalog columns read when a feature is embedded in a link row.
    #[must_use]
    pub fn columns(self) -> &'static str {
        match self {
            Self::Transgene | Self::Treatment => "id,name,type,description",
            Self::Mutation => "id,name,gene,notes",
            Self::Strain => "id,name,description",
        }
    }
}

/// The common shape of every catalog row, as read through a link table.
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq, Default)]
pub struct Feature {
    pub id: RowId,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default, rename = "type")]
    pub feature_type: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub gene: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
}

impl Feature {
    /// Name, else type, else the id.
    #[must_use]
    pub fn label(&self) -> String {
        non_blank(self.name.as_deref())
            .or_else(|| non_blank(self.feature_type.as_deref()))
            .map_or_else(|| self.id.to_string(), str::to_string)
    }
}

pub(crate) fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|s| !s.is_empty())
}

/// A link row with its catalog entry embedded under the `feature` alias.
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
pub struct LinkedFeature {
    pub fish_id: RowId,
    #[serde(default)]
    pub notes: Option<String>,
    pub feature: Option<Feature>,
}

impl LinkedFeature {
    #[must_use]
    pub fn selection(kind: FeatureKind) -> String {
        format!(
            "fish_id,notes,feature:{}({})",
            kind.table(),
            kind.columns()
        )
    }
}

/// Filter for listing any of the catalogs, ordered by name.
#[derive(Deserialize, Serialize, Valuable, Debug, Clone, Default, PartialEq)]
#[serde(default)]
pub struct CatalogQuery {
    pub ids: Vec<RowId>,
    pub name: Option<String>,
    pub pagination: Pagination,
}

/// Every feature attached to one fish, grouped by kind.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FeatureSet {
    pub transgenes: Vec<Feature>,
    pub mutations: Vec<Feature>,
    pub treatments: Vec<Feature>,
    pub strains: Vec<Feature>,
}

impl FeatureSet {
    #[must_use]
    pub fn get(&self, kind: FeatureKind) -> &[Feature] {
        match kind {
            FeatureKind::Transgene => &self.transgenes,
            FeatureKind::Mutation => &self.mutations,
            FeatureKind::Treatment => &self.treatments,
            FeatureKind::Strain => &self.strains,
        }
    }

    pub fn get_mut(&mut self, kind: FeatureKind) -> &mut Vec<Feature> {
        match kind {
            FeatureKind::Transgene => &mut self.transgenes,
            FeatureKind::Mutation => &mut self.mutations,
            FeatureKind::Treatment => &mut self.treatments,
            FeatureKind::Strain => &mut self.strains,
        }
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use serde_json::json;

    use super::*;

    #[test]
    fn label_prefers_name_then_type_then_id() {
        let mut feature = Feature {
            id: 7,
            name: Some("Tg(kdrl:GFP)".to_string()),
            feature_type: Some("reporter".to_string()),
            ..Default::default()
        };
        assert_eq!(feature.label(), "Tg(kdrl:GFP)");

        feature.name = Some("  ".to_string());
        assert_eq!(feature.label(), "reporter");

        feature.feature_type = None;
        assert_eq!(feature.label(), "7");
    }

    #[test]
    fn linked_feature_reads_aliased_embed() {
        let row = json!({
            "fish_id": 3,
            "notes": null,
            "feature": {"id": 11, "name": "casper", "gene": "mitfa", "notes": "het"}
        });
        let linked: LinkedFeature = serde_json::from_value(row).unwrap();
        let feature = linked.feature.unwrap();

        assert_eq!(feature.gene.as_deref(), Some("mitfa"));
        assert_eq!(feature.description, None);
    }

    #[test]
    fn selection_embeds_catalog_columns() {
        assert_eq!(
            LinkedFeature::selection(FeatureKind::Strain),
            "fish_id,notes,feature:strains(id,name,description)"
        );
    }

    #[test]
    fn kind_round_trips_through_strum() {
        assert_eq!(FeatureKind::Treatment.to_string(), "treatment");
        assert_eq!("mutation".parse::<FeatureKind>().unwrap(), FeatureKind::Mutation);
    }
}
