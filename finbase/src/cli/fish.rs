use chrono::{Local, NaiveDate};
use clap::{Args, Subcommand};
use dialoguer::Confirm;
use finbase_core::{
    breeding::{NewOffspring, OffspringPlan, ParentPair, UnifiedFeature},
    model::{
        RowId,
        feature::FeatureKind,
        fish::{Fish, FishOrdering, FishOrdinalColumn, FishQuery, FishUpdate, NewFish},
        treatment::NewTreatment,
    },
    summary::{FeatureRow, ListSummary, ParentSummary},
};
use futures::future::try_join_all;
use serde::Serialize;

use super::{PageArgs, non_blank, print_rows};
use crate::{
    auth::Authenticator,
    db::model::{Delete, FetchById, FetchByQuery, FetchRelatives, Update, Write, breeding},
    export::Format,
};

#[derive(Subcommand, Debug)]
pub enum FishCommand {
    /// Search fish
    List(ListArgs),
    Show {
        id: RowId,
    },
    /// Add a fish, optionally linked to catalog entries
    Create(CreateArgs),
    /// Change the given fields of a fish
    Update(UpdateArgs),
    /// Delete a fish and its links
    Delete {
        id: RowId,
        /// Skip the confirmation prompt
        #[arg(long)]
        yes: bool,
    },
    /// Field/value summary of fish and their features
    Summary {
        #[arg(required = true)]
        ids: Vec<RowId>,
    },
    /// Offspring of a fish
    Children {
        id: RowId,
    },
    /// Create a fish from two parents, inheriting their features
    Breed(BreedArgs),
}

#[derive(Args, Debug)]
pub struct ListArgs {
    /// Words matched against name, notes, fish code and line-building stage
    #[arg(long)]
    search: Option<String>,
    #[arg(long = "id", value_delimiter = ',')]
    ids: Vec<RowId>,
    /// One of created_at, id, name, fish_code, date_birth
    #[arg(long, default_value = "created_at")]
    order_by: FishOrdinalColumn,
    #[arg(long)]
    ascending: bool,
    /// Add transgene notes, mutations, treatments and strains as columns
    #[arg(long)]
    features: bool,
    #[command(flatten)]
    page: PageArgs,
}

#[derive(Args, Debug, Clone, Default)]
pub struct FishFields {
    #[arg(long)]
    name: Option<String>,
    /// YYYY-MM-DD
    #[arg(long)]
    date_birth: Option<NaiveDate>,
    #[arg(long)]
    notes: Option<String>,
    #[arg(long = "stage")]
    line_building_stage: Option<String>,
    #[arg(long = "code")]
    fish_code: Option<String>,
}

#[derive(Args, Debug)]
pub struct CreateArgs {
    #[command(flatten)]
    fields: FishFields,
    #[arg(long)]
    mother: Option<RowId>,
    #[arg(long)]
    father: Option<RowId>,
    #[arg(long = "transgene", value_delimiter = ',')]
    transgenes: Vec<RowId>,
    #[arg(long = "mutation", value_delimiter = ',')]
    mutations: Vec<RowId>,
    #[arg(long = "treatment", value_delimiter = ',')]
    treatments: Vec<RowId>,
    #[arg(long = "strain", value_delimiter = ',')]
    strains: Vec<RowId>,
}

#[derive(Args, Debug)]
pub struct UpdateArgs {
    id: RowId,
    #[command(flatten)]
    fields: FishFields,
    #[arg(long)]
    mother: Option<RowId>,
    #[arg(long)]
    father: Option<RowId>,
}

#[derive(Args, Debug)]
pub struct BreedArgs {
    mother: RowId,
    father: RowId,
    /// Use the second fish as the mother
    #[arg(long)]
    swap: bool,
    /// Leave out a parent feature, as `<kind>:<id>` (for example `transgene:4`)
    #[arg(long, value_parser = parse_exclusion)]
    pub(super) exclude: Vec<(FeatureKind, RowId)>,
    /// Create a treatment with this name and give it to the offspring
    #[arg(long = "new-treatment")]
    pub(super) new_treatments: Vec<String>,
    #[command(flatten)]
    details: FishFields,
    /// Print the plan without creating anything
    #[arg(long)]
    dry_run: bool,
    /// Skip the confirmation prompt
    #[arg(long)]
    yes: bool,
}

fn parse_exclusion(value: &str) -> Result<(FeatureKind, RowId), String> {
    let (kind, id) = value
        .split_once(':')
        .ok_or_else(|| format!("expected <kind>:<id>, got {value}"))?;

    let kind: FeatureKind = kind
        .trim()
        .parse()
        .map_err(|_| format!("unknown feature kind {kind}"))?;
    if !FeatureKind::INHERITABLE.contains(&kind) {
        return Err(format!("{kind}s are not inherited"));
    }
    let id = id.trim().parse().map_err(|_| format!("invalid id {id}"))?;

    Ok((kind, id))
}

#[derive(Serialize)]
struct FieldValue {
    field: &'static str,
    value: String,
}

fn print_summaries(summaries: &[ParentSummary], format: Format) -> anyhow::Result<()> {
    if format == Format::Json {
        return print_rows(summaries, format);
    }

    for (i, summary) in summaries.iter().enumerate() {
        if i > 0 {
            println!();
        }
        let rows: Vec<_> = summary
            .rows()
            .into_iter()
            .map(|(field, value)| FieldValue { field, value })
            .collect();
        print_rows(&rows, format)?;
    }

    Ok(())
}

pub(super) async fn run(
    command: FishCommand,
    auth: &Authenticator,
    format: Format,
) -> anyhow::Result<()> {
    match command {
        FishCommand::List(args) => list(args, auth, format).await,
        FishCommand::Show { id } => {
            let fish = auth
                .with_retry(|client| async move { Fish::fetch_by_id(&id, &client).await })
                .await?;
            print_rows(&[fish], format)
        }
        FishCommand::Create(args) => create(args, auth, format).await,
        FishCommand::Update(args) => update(args, auth, format).await,
        FishCommand::Delete { id, yes } => delete(id, yes, auth).await,
        FishCommand::Summary { ids } => {
            let ids = &ids;
            let summaries = auth
                .with_retry(|client| async move {
                    try_join_all(ids.iter().map(|id| ParentSummary::fetch_by_id(id, &client)))
                        .await
                })
                .await?;
            print_summaries(&summaries, format)
        }
        FishCommand::Children { id } => {
            let children = auth
                .with_retry(|client| async move {
                    <Fish as FetchRelatives<Fish>>::fetch_relatives(&id, &client).await
                })
                .await?;
            print_rows(&children, format)
        }
        FishCommand::Breed(args) => breed(args, auth, format).await,
    }
}

async fn list(args: ListArgs, auth: &Authenticator, format: Format) -> anyhow::Result<()> {
    let ListArgs {
        search,
        ids,
        order_by,
        ascending,
        features,
        page,
    } = args;

    let query = &FishQuery {
        ids,
        search: non_blank(search),
        order_by: vec![FishOrdering {
            column: order_by,
            descending: !ascending,
        }],
        pagination: page.into(),
    };

    if features {
        let rows = auth
            .with_retry(|client| async move { FeatureRow::fetch_by_query(query, &client).await })
            .await?;
        return print_rows(&rows, format);
    }

    let fish = auth
        .with_retry(|client| async move { Fish::fetch_by_query(query, &client).await })
        .await?;
    print_rows(&fish, format)
}

async fn create(args: CreateArgs, auth: &Authenticator, format: Format) -> anyhow::Result<()> {
    let CreateArgs {
        fields:
            FishFields {
                name,
                date_birth,
                notes,
                line_building_stage,
                fish_code,
            },
        mother,
        father,
        transgenes,
        mutations,
        treatments,
        strains,
    } = args;

    // Same transactional path as breeding, strains included.
    let new_fish = NewOffspring {
        fish: NewFish {
            name,
            date_birth,
            notes,
            line_building_stage,
            fish_code,
            mother_fish_id: mother,
            father_fish_id: father,
        }
        .normalized(),
        transgene_ids: transgenes,
        mutation_ids: mutations,
        treatment_ids: treatments,
        strain_ids: strains,
    };

    let fish = auth
        .with_session(|client| async move { new_fish.write(&client).await })
        .await?;

    print_rows(&[fish], format)
}

async fn update(args: UpdateArgs, auth: &Authenticator, format: Format) -> anyhow::Result<()> {
    let UpdateArgs {
        id,
        fields:
            FishFields {
                name,
                date_birth,
                notes,
                line_building_stage,
                fish_code,
            },
        mother,
        father,
    } = args;

    let changes = &FishUpdate {
        id,
        name: non_blank(name),
        date_birth,
        notes,
        line_building_stage,
        fish_code: non_blank(fish_code),
        mother_fish_id: mother,
        father_fish_id: father,
    };

    let fish = auth
        .with_retry(|client| async move {
            let current = Fish::fetch_by_id(&id, &client).await?;
            changes.clone().diff(&current).update(&client).await
        })
        .await?;

    print_rows(&[fish], format)
}

async fn delete(id: RowId, yes: bool, auth: &Authenticator) -> anyhow::Result<()> {
    let confirmed = yes
        || Confirm::new()
            .with_prompt(format!("Delete fish {id} and all of its links?"))
            .default(false)
            .interact()?;
    if !confirmed {
        println!("Nothing deleted");
        return Ok(());
    }

    auth.with_retry(|client| async move { Fish::delete(&id, &client).await })
        .await?;
    println!("Deleted fish {id}");

    Ok(())
}

async fn breed(args: BreedArgs, auth: &Authenticator, format: Format) -> anyhow::Result<()> {
    let BreedArgs {
        mother,
        father,
        swap,
        exclude,
        new_treatments,
        details,
        dry_run,
        yes,
    } = args;

    let (mother, father) = auth
        .with_retry(|client| async move {
            futures::try_join!(
                Fish::fetch_by_id(&mother, &client),
                Fish::fetch_by_id(&father, &client)
            )
        })
        .await?;

    let mut parents = ParentPair::new(mother, father)?;
    if swap {
        parents = parents.swap();
    }
    let parents = &parents;

    let (mother_features, father_features) = auth
        .with_retry(|client| async move { breeding::parent_features(parents, &client).await })
        .await?;

    let mut plan = OffspringPlan::new(
        parents,
        &mother_features,
        &father_features,
        Local::now().date_naive(),
    );
    for (kind, id) in exclude {
        plan.exclude(kind, id)?;
    }
    apply_details(&mut plan.details, details);

    let mut preview = plan.preview();
    if !new_treatments.is_empty() {
        preview.treatments = ListSummary::of(
            plan.inherited(FeatureKind::Treatment)
                .map(UnifiedFeature::label)
                .chain(new_treatments.iter().cloned()),
        );
    }
    eprintln!(
        "Mother: {}, father: {}",
        label(&parents.mother),
        label(&parents.father)
    );
    print_summaries(&[preview], format)?;

    if dry_run {
        return Ok(());
    }
    let confirmed = yes
        || Confirm::new()
            .with_prompt("Create this fish?")
            .default(false)
            .interact()?;
    if !confirmed {
        println!("Nothing created");
        return Ok(());
    }

    for name in &new_treatments {
        let new_treatment = NewTreatment::new(name, None, None);
        let treatment = auth
            .with_session(|client| async move { new_treatment.write(&client).await })
            .await?;
        plan.add_treatment(treatment);
    }

    let offspring = plan.build();
    let fish = auth
        .with_session(|client| async move { offspring.write(&client).await })
        .await?;

    print_rows(&[fish], format)
}

fn apply_details(details: &mut NewFish, fields: FishFields) {
    let FishFields {
        name,
        date_birth,
        notes,
        line_building_stage,
        fish_code,
    } = fields;

    details.name = name;
    details.notes = notes;
    details.fish_code = fish_code;
    details.line_building_stage = line_building_stage;
    if date_birth.is_some() {
        details.date_birth = date_birth;
    }
}

fn label(fish: &Fish) -> String {
    match fish.name.as_deref() {
        Some(name) => format!("{name} (#{})", fish.id),
        None => format!("#{}", fish.id),
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn details_keep_plan_defaults() {
        let mut details = NewFish {
            date_birth: NaiveDate::from_ymd_opt(2024, 6, 1),
            mother_fish_id: Some(1),
            father_fish_id: Some(2),
            ..Default::default()
        };

        apply_details(
            &mut details,
            FishFields {
                name: Some("pup".to_string()),
                line_building_stage: Some("F1".to_string()),
                ..Default::default()
            },
        );

        assert_eq!(details.name.as_deref(), Some("pup"));
        assert_eq!(details.line_building_stage.as_deref(), Some("F1"));
        assert_eq!(details.date_birth, NaiveDate::from_ymd_opt(2024, 6, 1));
        assert_eq!(details.mother_fish_id, Some(1));
    }

    #[test]
    fn parses_exclusions() {
        assert_eq!(
            parse_exclusion(" treatment : 12"),
            Ok((FeatureKind::Treatment, 12))
        );
        assert_eq!(
            parse_exclusion("strain:1"),
            Err("strains are not inherited".to_string())
        );
    }
}
