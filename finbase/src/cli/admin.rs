use std::fs;

use anyhow::Context;
use camino::Utf8PathBuf;
use clap::Subcommand;
use dialoguer::Password;
use finbase_core::schema_diagram::render_mermaid;

use super::print_rows;
use crate::{
    admin::{
        AdminClient, PasswordChange,
        introspect::{self, DEFAULT_SCHEMA},
    },
    auth::{Authenticator, Credentials},
    config::Config,
    export::Format,
};

#[derive(Subcommand, Debug)]
pub enum AdminCommand {
    /// Set a user's password, creating the user if there is none with that email
    SetPassword {
        #[arg(long)]
        email: String,
    },
    /// Print a mermaid ER diagram of a schema
    Schema {
        #[arg(long, default_value = DEFAULT_SCHEMA)]
        schema: String,
        /// Write the diagram here instead of stdout
        #[arg(short, long)]
        output: Option<Utf8PathBuf>,
    },
    ForeignKeys {
        #[arg(long, default_value = DEFAULT_SCHEMA)]
        schema: String,
    },
    /// Number of registered users
    CountUsers,
    /// Apply pending database migrations
    Migrate,
}

/// Runs an admin command once the signed-in user is on the admin allowlist.
pub(super) async fn run(
    command: AdminCommand,
    config: &Config,
    format: Format,
) -> anyhow::Result<()> {
    let auth = Authenticator::from_config(config)?;
    let (_, user) = auth.authenticate().await?;
    auth.require_admin(&user)?;

    match command {
        AdminCommand::SetPassword { email } => {
            let password = Password::new()
                .with_prompt(format!("New password for {email}"))
                .with_confirmation("Repeat password", "Passwords do not match")
                .interact()?;

            let admin = AdminClient::new(
                reqwest::Client::new(),
                config.api_url(),
                config.service_role_key()?,
            )?;
            match admin
                .set_password(&Credentials::new(&email, &password))
                .await?
            {
                PasswordChange::Updated(user) => {
                    println!("Password updated for {}", user.email_or_id());
                }
                PasswordChange::Created(user) => {
                    println!("Created {} with the given password", user.email_or_id());
                }
            }
        }
        AdminCommand::Schema { schema, output } => {
            let db_conn = &mut introspect::connect(config.database_url()?).await?;
            let columns = introspect::columns(&schema, db_conn).await?;
            let primary_keys = introspect::primary_keys(&schema, db_conn).await?;
            let foreign_keys = introspect::foreign_keys(&schema, db_conn).await?;

            let diagram = render_mermaid(&columns, &primary_keys, &foreign_keys);
            match output {
                Some(path) => {
                    fs::write(&path, diagram).context(format!("failed to write {path}"))?;
                    eprintln!("wrote {path}");
                }
                None => println!("{diagram}"),
            }
        }
        AdminCommand::ForeignKeys { schema } => {
            let db_conn = &mut introspect::connect(config.database_url()?).await?;
            let foreign_keys = introspect::foreign_keys(&schema, db_conn).await?;
            print_rows(&foreign_keys, format)?;
        }
        AdminCommand::CountUsers => {
            let db_conn = &mut introspect::connect(config.database_url()?).await?;
            println!("{}", introspect::count_users(db_conn).await?);
        }
        AdminCommand::Migrate => {
            let db_conn = introspect::connect(config.database_url()?).await?;
            let versions = introspect::run_migrations(db_conn).await?;
            if versions.is_empty() {
                println!("Database is up to date");
            }
            for version in versions {
                println!("applied {version}");
            }
        }
    }

    Ok(())
}
