//! Compact, human-readable summaries of a fish and the features linked to it.

use chrono::NaiveDate;
use itertools::Itertools;
use serde::Serialize;

use crate::model::{
    RowId,
    feature::{Feature, FeatureKind, FeatureSet, non_blank},
    fish::Fish,
};

/// Items shown before the remainder is collapsed into `…(+N)`.
pub const MAX_ITEMS: usize = 10;

const PAIR_SEPARATOR: &str = " — ";

#[derive(Serialize, Debug, Clone, Default, PartialEq, Eq)]
pub struct ListSummary {
    pub count: usize,
    pub items: String,
}

impl ListSummary {
    /// Summarizes the non-blank values, in order.
    pub fn of<I, S>(values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let values: Vec<String> = values
            .into_iter()
            .filter_map(|v| non_blank(Some(v.as_ref())).map(str::to_string))
            .collect();

        Self::from_items(values)
    }

    /// Summarizes `a — b` pairs. A pair with a blank second half is shown as `a` alone.
    pub fn pairs<I, A, B>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (A, Option<B>)>,
        A: AsRef<str>,
        B: AsRef<str>,
    {
        let items = pairs
            .into_iter()
            .filter_map(|(a, b)| {
                let a = a.as_ref().trim();
                let b = b.as_ref().map_or("", |b| b.as_ref().trim());
                match (a.is_empty(), b.is_empty()) {
                    (true, true) => None,
                    (_, true) => Some(a.to_string()),
                    _ => Some(format!("{a}{PAIR_SEPARATOR}{b}")),
                }
            })
            .collect();

        Self::from_items(items)
    }

    fn from_items(items: Vec<String>) -> Self {
        let count = items.len();
        let mut head = items.iter().take(MAX_ITEMS).join(", ");
        if count > MAX_ITEMS {
            head = format!("{head} …(+{})", count - MAX_ITEMS);
        }

        Self { count, items: head }
    }
}

/// The field/value table shown for a parent and for a planned offspring.
#[derive(Serialize, Debug, Clone, Default, PartialEq)]
pub struct ParentSummary {
    pub fish_id: Option<RowId>,
    pub name: Option<String>,
    pub fish_code: Option<String>,
    pub date_birth: Option<NaiveDate>,
    pub line_building_stage: Option<String>,
    pub transgenes: ListSummary,
    pub transgene_descriptions: ListSummary,
    pub transgene_name_descriptions: ListSummary,
    pub strains: ListSummary,
    pub mutations: ListSummary,
    pub treatments: ListSummary,
}

impl ParentSummary {
    #[must_use]
    pub fn new(fish: &Fish, features: &FeatureSet) -> Self {
        let labels = |kind| ListSummary::of(features.get(kind).iter().map(Feature::label));

        Self {
            fish_id: Some(fish.id),
            name: fish.name.clone(),
            fish_code: fish.fish_code.clone(),
            date_birth: fish.date_birth,
            line_building_stage: fish.line_building_stage.clone(),
            transgenes: labels(FeatureKind::Transgene),
            transgene_descriptions: ListSummary::of(
                features
                    .transgenes
                    .iter()
                    .filter_map(|f| f.description.as_deref()),
            ),
            transgene_name_descriptions: name_descriptions(&features.transgenes),
            strains: labels(FeatureKind::Strain),
            mutations: labels(FeatureKind::Mutation),
            treatments: labels(FeatureKind::Treatment),
        }
    }

    /// Field/value rows in display order.
    #[must_use]
    pub fn rows(&self) -> Vec<(&'static str, String)> {
        fn text(value: Option<&str>) -> String {
            value.unwrap_or_default().to_string()
        }

        vec![
            ("fish_id", self.fish_id.map(|id| id.to_string()).unwrap_or_default()),
            ("name", text(self.name.as_deref())),
            ("fish_code", text(self.fish_code.as_deref())),
            (
                "date_birth",
                self.date_birth.map(|d| d.to_string()).unwrap_or_default(),
            ),
            ("line_building_stage", text(self.line_building_stage.as_deref())),
            ("transgenes_count", self.transgenes.count.to_string()),
            ("transgenes_items", self.transgenes.items.clone()),
            (
                "transgenes_descriptions",
                self.transgene_descriptions.items.clone(),
            ),
            (
                "transgenes_name_description",
                self.transgene_name_descriptions.items.clone(),
            ),
            ("strains_count", self.strains.count.to_string()),
            ("strains_items", self.strains.items.clone()),
            ("mutations_count", self.mutations.count.to_string()),
            ("mutations_items", self.mutations.items.clone()),
            ("treatments_count", self.treatments.count.to_string()),
            ("treatments_items", self.treatments.items.clone()),
        ]
    }
}

/// `name — description` for each feature.
#[must_use]
pub fn name_descriptions(features: &[Feature]) -> ListSummary {
    ListSummary::pairs(features.iter().map(|f| {
        (
            f.name.as_deref().unwrap_or_default(),
            f.description.as_deref(),
        )
    }))
}

/// One fish with each feature kind collapsed into a single cell.
#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct FeatureRow {
    pub id: RowId,
    pub name: Option<String>,
    pub date_birth: Option<NaiveDate>,
    pub line_building_stage: Option<String>,
    pub transgene_notes: String,
    pub mutations: String,
    pub treatments: String,
    pub strains: String,
}

impl FeatureRow {
    #[must_use]
    pub fn new(fish: &Fish, features: &FeatureSet) -> Self {
        Self {
            id: fish.id,
            name: fish.name.clone(),
            date_birth: fish.date_birth,
            line_building_stage: fish.line_building_stage.clone(),
            transgene_notes: transgene_notes(&features.transgenes),
            mutations: mutations(&features.mutations),
            treatments: treatments(&features.treatments),
            strains: strains(&features.strains),
        }
    }
}

fn join_unique(parts: impl Iterator<Item = String>) -> String {
    parts.unique().join("; ")
}

/// `name: note` for every transgene carrying a note.
#[must_use]
pub fn transgene_notes(features: &[Feature]) -> String {
    join_unique(features.iter().filter_map(|f| {
        let note = non_blank(f.notes.as_deref()).or_else(|| non_blank(f.description.as_deref()))?;
        Some(match non_blank(f.name.as_deref()) {
            Some(name) => format!("{name}: {note}"),
            None => note.to_string(),
        })
    }))
}

/// `name (gene)`, or just the name when the gene is unknown.
#[must_use]
pub fn mutations(features: &[Feature]) -> String {
    join_unique(features.iter().filter_map(|f| {
        let name = non_blank(f.name.as_deref());
        match (name, non_blank(f.gene.as_deref())) {
            (Some(name), Some(gene)) => Some(format!("{name} ({gene})")),
            (Some(name), None) => Some(name.to_string()),
            (None, gene) => gene.map(|g| format!("({g})")),
        }
    }))
}

/// `type: name`, falling back to whichever half is present.
#[must_use]
pub fn treatments(features: &[Feature]) -> String {
    join_unique(features.iter().filter_map(|f| {
        match (
            non_blank(f.feature_type.as_deref()),
            non_blank(f.name.as_deref()),
        ) {
            (Some(t), Some(n)) => Some(format!("{t}: {n}")),
            (None, Some(s)) | (Some(s), None) => Some(s.to_string()),
            (None, None) => None,
        }
    }))
}

#[must_use]
pub fn strains(features: &[Feature]) -> String {
    join_unique(
        features
            .iter()
            .filter_map(|f| non_blank(f.name.as_deref()).map(str::to_string)),
    )
}
