//! Planning a new fish from two parents.
//!
//! The offspring inherits the union of both parents' transgenes, mutations and
//! treatments. Each feature can be excluded before the fish is created, and
//! treatments created on the spot are appended to the plan.

use std::collections::HashSet;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};
use valuable::Valuable;

use crate::{
    model::{
        RowId,
        feature::{Feature, FeatureKind, FeatureSet},
        fish::{Fish, NewFish},
        link::NewFishLink,
        treatment::Treatment,
    },
    summary::{ListSummary, ParentSummary},
};

/// Name of the server-side function that inserts a fish and its links in one transaction.
pub const CREATE_FISH_WITH_LINKS: &str = "create_fish_with_links";

#[derive(thiserror::Error, Serialize, Valuable, Debug, Clone, PartialEq)]
#[serde(rename_all = "snake_case", tag = "type")]
pub enum BreedingError {
    #[error("select exactly two parents, got {count}")]
    WrongParentCount { count: usize },
    #[error("fish {id} cannot be both mother and father")]
    SameParent { id: RowId },
    #[error("{kind} {id} is not part of this offspring")]
    UnknownFeature { kind: FeatureKind, id: RowId },
}

#[derive(Debug, Clone, PartialEq)]
pub struct ParentPair {
    pub mother: Fish,
    pub father: Fish,
}

impl ParentPair {
    /// The first selected fish is the mother.
    ///
    /// # Errors
    /// Fails unless exactly two distinct fish are selected.
    pub fn from_selection(selection: Vec<Fish>) -> Result<Self, BreedingError> {
        let [mother, father] = <[Fish; 2]>::try_from(selection)
            .map_err(|rest| BreedingError::WrongParentCount { count: rest.len() })?;

        Self::new(mother, father)
    }

    /// # Errors
    /// Fails when both parents are the same fish.
    pub fn new(mother: Fish, father: Fish) -> Result<Self, BreedingError> {
        if mother.id == father.id {
            return Err(BreedingError::SameParent { id: mother.id });
        }

        Ok(Self { mother, father })
    }

    #[must_use]
    pub fn swap(self) -> Self {
        Self {
            mother: self.father,
            father: self.mother,
        }
    }
}

#[derive(
    Deserialize, Serialize, Valuable, Display, EnumString, Debug, Clone, Copy, PartialEq, Eq,
)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum FeatureSource {
    Parent,
    AddedNew,
}

#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct UnifiedFeature {
    pub kind: FeatureKind,
    pub id: RowId,
    pub name: Option<String>,
    #[serde(rename = "type")]
    pub feature_type: Option<String>,
    pub description: Option<String>,
    pub source: FeatureSource,
    pub inherit: bool,
}

impl UnifiedFeature {
    fn new(kind: FeatureKind, feature: &Feature, source: FeatureSource) -> Self {
        Self {
            kind,
            id: feature.id,
            name: feature.name.clone(),
            feature_type: feature.feature_type.clone(),
            description: feature.description.clone(),
            source,
            inherit: true,
        }
    }

    #[must_use]
    pub fn label(&self) -> String {
        Feature {
            id: self.id,
            name: self.name.clone(),
            feature_type: self.feature_type.clone(),
            ..Default::default()
        }
        .label()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct OffspringPlan {
    mother_id: RowId,
    father_id: RowId,
    features: Vec<UnifiedFeature>,
    pub details: NewFish,
}

impl OffspringPlan {
    /// Unions both parents' inheritable features, keeping the first occurrence of each.
    #[must_use]
    pub fn new(
        parents: &ParentPair,
        mother_features: &FeatureSet,
        father_features: &FeatureSet,
        today: NaiveDate,
    ) -> Self {
        let mut seen = HashSet::new();
        let mut features = Vec::new();

        for kind in FeatureKind::INHERITABLE {
            for feature in mother_features
                .get(kind)
                .iter()
                .chain(father_features.get(kind))
            {
                if seen.insert((kind, feature.id)) {
                    features.push(UnifiedFeature::new(kind, feature, FeatureSource::Parent));
                }
            }
        }

        let details = NewFish {
            date_birth: Some(today),
            mother_fish_id: Some(parents.mother.id),
            father_fish_id: Some(parents.father.id),
            ..Default::default()
        };

        Self {
            mother_id: parents.mother.id,
            father_id: parents.father.id,
            features,
            details,
        }
    }

    #[must_use]
    pub fn features(&self) -> &[UnifiedFeature] {
        &self.features
    }

    pub fn inherited(&self, kind: FeatureKind) -> impl Iterator<Item = &UnifiedFeature> {
        self.features
            .iter()
            .filter(move |f| f.inherit && f.kind == kind)
    }

    fn set_inherit(
        &mut self,
        kind: FeatureKind,
        id: RowId,
        inherit: bool,
    ) -> Result<(), BreedingError> {
        let feature = self
            .features
            .iter_mut()
            .find(|f| f.kind == kind && f.id == id)
            .ok_or(BreedingError::UnknownFeature { kind, id })?;
        feature.inherit = inherit;

        Ok(())
    }

    /// # Errors
    /// Fails when the feature is not in the plan.
    pub fn exclude(&mut self, kind: FeatureKind, id: RowId) -> Result<(), BreedingError> {
        self.set_inherit(kind, id, false)
    }

    /// # Errors
    /// Fails when the feature is not in the plan.
    pub fn include(&mut self, kind: FeatureKind, id: RowId) -> Result<(), BreedingError> {
        self.set_inherit(kind, id, true)
    }

    /// Appends a freshly created treatment. A treatment already in the plan is re-included instead.
    pub fn add_treatment(&mut self, treatment: Treatment) {
        let kind = FeatureKind::Treatment;
        if self.set_inherit(kind, treatment.id, true).is_ok() {
            return;
        }

        self.features.push(UnifiedFeature::new(
            kind,
            &treatment.into(),
            FeatureSource::AddedNew,
        ));
    }

    fn inherited_ids(&self, kind: FeatureKind) -> Vec<RowId> {
        self.inherited(kind).map(|f| f.id).collect()
    }

    /// The insert payload. Parentage always comes from the selected parents.
    #[must_use]
    pub fn build(&self) -> NewOffspring {
        let fish = NewFish {
            mother_fish_id: Some(self.mother_id),
            father_fish_id: Some(self.father_id),
            ..self.details.clone()
        }
        .normalized();

        NewOffspring {
            fish,
            transgene_ids: self.inherited_ids(FeatureKind::Transgene),
            mutation_ids: self.inherited_ids(FeatureKind::Mutation),
            treatment_ids: self.inherited_ids(FeatureKind::Treatment),
            strain_ids: Vec::new(),
        }
    }

    /// The same field/value rows a parent summary shows. Offspring start without strains.
    #[must_use]
    pub fn preview(&self) -> ParentSummary {
        let labels = |kind| ListSummary::of(self.inherited(kind).map(UnifiedFeature::label));
        let fish = self.build().fish;

        ParentSummary {
            fish_id: None,
            name: fish.name,
            fish_code: fish.fish_code,
            date_birth: fish.date_birth,
            line_building_stage: fish.line_building_stage,
            transgenes: labels(FeatureKind::Transgene),
            transgene_descriptions: ListSummary::of(
                self.inherited(FeatureKind::Transgene)
                    .filter_map(|f| f.description.as_deref()),
            ),
            transgene_name_descriptions: ListSummary::pairs(
                self.inherited(FeatureKind::Transgene)
                    .map(|f| (f.name.as_deref().unwrap_or_default(), f.description.as_deref())),
            ),
            strains: ListSummary::default(),
            mutations: labels(FeatureKind::Mutation),
            treatments: labels(FeatureKind::Treatment),
        }
    }
}

/// A fish to insert together with the catalog rows it links to.
///
/// Serializes to the argument object of [`CREATE_FISH_WITH_LINKS`]. Bred offspring never carry
/// strains, so `strain_ids` is only sent when there are some.
#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct NewOffspring {
    pub fish: NewFish,
    pub transgene_ids: Vec<RowId>,
    pub mutation_ids: Vec<RowId>,
    pub treatment_ids: Vec<RowId>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub strain_ids: Vec<RowId>,
}

impl NewOffspring {
    /// Link rows for a fish that has been inserted as `fish_id`.
    #[must_use]
    pub fn links(&self, fish_id: RowId) -> Vec<NewFishLink> {
        [
            (FeatureKind::Transgene, &self.transgene_ids),
            (FeatureKind::Mutation, &self.mutation_ids),
            (FeatureKind::Treatment, &self.treatment_ids),
            (FeatureKind::Strain, &self.strain_ids),
        ]
        .into_iter()
        .flat_map(|(kind, ids)| {
            ids.iter()
                .map(move |id| NewFishLink::new(kind, fish_id, *id))
        })
        .collect()
    }
}
