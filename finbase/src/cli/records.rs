use clap::{Args, Subcommand};
use finbase_core::model::{
    RowId,
    feature::CatalogQuery,
    mutation::{Mutation, NewMutation},
    note::{NewNote, Note, NoteQuery},
    plasmid::{Plasmid, PlasmidElementRow, PlasmidQuery, PlasmidRow},
    strain::{NewStrain, Strain},
    transgene::{NewTransgene, Transgene},
    treatment::{NewTreatment, Treatment},
};
use serde::Serialize;

use super::{PageArgs, non_blank, print_rows};
use crate::{
    auth::Authenticator,
    db::model::{FetchByQuery, FetchRelatives, Write},
    export::Format,
};

#[derive(Args, Debug)]
pub struct CatalogFilter {
    /// Part of the name, ignoring case
    #[arg(long)]
    name: Option<String>,
    #[arg(long = "id", value_delimiter = ',')]
    ids: Vec<RowId>,
    #[command(flatten)]
    page: PageArgs,
}

impl From<CatalogFilter> for CatalogQuery {
    fn from(CatalogFilter { name, ids, page }: CatalogFilter) -> Self {
        Self {
            ids,
            name: non_blank(name),
            pagination: page.into(),
        }
    }
}

#[derive(Subcommand, Debug)]
pub enum CatalogCommand {
    #[command(subcommand)]
    Transgenes(TransgeneCommand),
    #[command(subcommand)]
    Mutations(MutationCommand),
    #[command(subcommand)]
    Treatments(TreatmentCommand),
    #[command(subcommand)]
    Strains(StrainCommand),
}

#[derive(Subcommand, Debug)]
pub enum TransgeneCommand {
    List(CatalogFilter),
    Create {
        #[arg(long)]
        name: String,
        #[arg(long = "type")]
        transgene_type: Option<String>,
        #[arg(long)]
        plasmid_id: Option<RowId>,
        #[arg(long)]
        description: Option<String>,
    },
}

#[derive(Subcommand, Debug)]
pub enum MutationCommand {
    List(CatalogFilter),
    Create {
        #[arg(long)]
        name: String,
        #[arg(long)]
        gene: Option<String>,
        #[arg(long)]
        notes: Option<String>,
    },
}

#[derive(Subcommand, Debug)]
pub enum TreatmentCommand {
    List(CatalogFilter),
    Create {
        #[arg(long)]
        name: String,
        #[arg(long = "type")]
        treatment_type: Option<String>,
        #[arg(long)]
        description: Option<String>,
    },
}

#[derive(Subcommand, Debug)]
pub enum StrainCommand {
    List(CatalogFilter),
    Create {
        #[arg(long)]
        name: String,
        #[arg(long)]
        description: Option<String>,
    },
}

async fn list<T>(
    filter: CatalogFilter,
    auth: &Authenticator,
    format: Format,
) -> anyhow::Result<()>
where
    T: FetchByQuery<QueryParams = CatalogQuery> + Serialize,
{
    let query = &CatalogQuery::from(filter);
    let rows = auth
        .with_retry(|client| async move { T::fetch_by_query(query, &client).await })
        .await?;

    print_rows(&rows, format)
}

async fn create<N>(new_row: N, auth: &Authenticator, format: Format) -> anyhow::Result<()>
where
    N: Write,
    N::Returns: Serialize,
{
    let row = auth
        .with_session(|client| async move { new_row.write(&client).await })
        .await?;

    print_rows(&[row], format)
}

pub(super) async fn catalog(
    command: CatalogCommand,
    auth: &Authenticator,
    format: Format,
) -> anyhow::Result<()> {
    match command {
        CatalogCommand::Transgenes(TransgeneCommand::List(filter)) => {
            list::<Transgene>(filter, auth, format).await
        }
        CatalogCommand::Transgenes(TransgeneCommand::Create {
            name,
            transgene_type,
            plasmid_id,
            description,
        }) => {
            let new_row = NewTransgene {
                name: name.trim().to_string(),
                transgene_type: non_blank(transgene_type),
                plasmid_id,
                description: non_blank(description),
            };
            create(new_row, auth, format).await
        }
        CatalogCommand::Mutations(MutationCommand::List(filter)) => {
            list::<Mutation>(filter, auth, format).await
        }
        CatalogCommand::Mutations(MutationCommand::Create { name, gene, notes }) => {
            let new_row = NewMutation {
                name: name.trim().to_string(),
                gene: non_blank(gene),
                notes: non_blank(notes),
            };
            create(new_row, auth, format).await
        }
        CatalogCommand::Treatments(TreatmentCommand::List(filter)) => {
            list::<Treatment>(filter, auth, format).await
        }
        CatalogCommand::Treatments(TreatmentCommand::Create {
            name,
            treatment_type,
            description,
        }) => {
            let new_row =
                NewTreatment::new(&name, treatment_type.as_deref(), description.as_deref());
            create(new_row, auth, format).await
        }
        CatalogCommand::Strains(StrainCommand::List(filter)) => {
            list::<Strain>(filter, auth, format).await
        }
        CatalogCommand::Strains(StrainCommand::Create { name, description }) => {
            let new_row = NewStrain {
                name: name.trim().to_string(),
                description: non_blank(description),
            };
            create(new_row, auth, format).await
        }
    }
}

#[derive(Subcommand, Debug)]
pub enum PlasmidCommand {
    /// Search plasmids by name, notes or exact id
    List {
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        notes: Option<String>,
        /// Ignored unless it is a whole number
        #[arg(long)]
        id: Option<String>,
    },
    /// The elements of a plasmid in position order
    Elements { id: RowId },
}

pub(super) async fn plasmid(
    command: PlasmidCommand,
    auth: &Authenticator,
    format: Format,
) -> anyhow::Result<()> {
    match command {
        PlasmidCommand::List { name, notes, id } => {
            let query = &PlasmidQuery {
                name: non_blank(name),
                notes: non_blank(notes),
                id: None,
            }
            .with_id_text(id.as_deref());

            let plasmids = auth
                .with_retry(|client| async move { Plasmid::fetch_by_query(query, &client).await })
                .await?;

            // Tables and CSV need flat rows; JSON keeps every column as it came.
            if format == Format::Json {
                return print_rows(&plasmids, format);
            }
            let rows: Vec<PlasmidRow> = plasmids.into_iter().map(PlasmidRow::from).collect();
            print_rows(&rows, format)
        }
        PlasmidCommand::Elements { id } => {
            let rows = auth
                .with_retry(|client| async move {
                    <Plasmid as FetchRelatives<PlasmidElementRow>>::fetch_relatives(&id, &client)
                        .await
                })
                .await?;
            print_rows(&rows, format)
        }
    }
}

#[derive(Subcommand, Debug)]
pub enum NoteCommand {
    /// Your notes, newest first
    List {
        #[command(flatten)]
        page: PageArgs,
    },
    Add {
        #[arg(long)]
        title: String,
        #[arg(long)]
        body: Option<String>,
    },
}

pub(super) async fn note(
    command: NoteCommand,
    auth: &Authenticator,
    format: Format,
) -> anyhow::Result<()> {
    // Notes belong to the signed-in user, so the session is validated up front.
    let (client, user) = auth.authenticate().await?;

    match command {
        NoteCommand::List { page } => {
            let query = NoteQuery {
                user_id: Some(user.id),
                pagination: page.into(),
            };
            let notes = Note::fetch_by_query(&query, &client).await?;
            print_rows(&notes, format)
        }
        NoteCommand::Add { title, body } => {
            let note = NewNote::new(user.id, &title, body.as_deref())
                .write(&client)
                .await?;
            print_rows(&[note], format)
        }
    }
}
