//! The `finbase` command line. Pages of the lab dashboard map to subcommands.

use camino::Utf8PathBuf;
use clap::{Args, Parser, Subcommand};
use finbase_core::model::Pagination;
use serde::Serialize;

use crate::{
    auth::Authenticator,
    config::Config,
    export::{self, Format},
};

mod account;
mod admin;
mod fish;
mod records;

pub use account::LoginCommand;
pub use admin::AdminCommand;
pub use fish::FishCommand;
pub use records::{CatalogCommand, NoteCommand, PlasmidCommand};

#[derive(Parser, Debug)]
#[command(version, about = "Client for the lab's fish-breeding database")]
pub struct Cli {
    #[command(flatten)]
    pub config: Config,
    /// Write JSON logs to a daily file in this directory instead of stderr
    #[arg(long, env = "FINBASE_LOG_DIR", global = true)]
    pub log_dir: Option<Utf8PathBuf>,
    #[arg(short, long, global = true)]
    pub verbose: bool,
    /// Output format of listing commands
    #[arg(long, value_enum, default_value_t, global = true)]
    pub format: Format,
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Sign in and store the session
    #[command(subcommand)]
    Login(LoginCommand),
    /// Sign out and remove the stored session
    Logout,
    /// Show the signed-in user
    Whoami,
    /// Email a password-reset link
    ResetPassword {
        #[arg(long)]
        email: String,
    },
    /// Set a new password for the signed-in user
    ChangePassword,
    #[command(subcommand)]
    Fish(FishCommand),
    /// Transgenes, mutations, treatments and strains
    #[command(subcommand)]
    Catalog(CatalogCommand),
    #[command(subcommand)]
    Plasmid(PlasmidCommand),
    #[command(subcommand)]
    Note(NoteCommand),
    /// Maintenance for administrators
    #[command(subcommand)]
    Admin(AdminCommand),
    /// Check configuration, keys and connectivity
    Doctor,
}

#[derive(Args, Debug, Clone, Copy)]
pub struct PageArgs {
    #[arg(long, default_value_t = Pagination::default().limit)]
    limit: i64,
    #[arg(long, default_value_t = 0)]
    offset: i64,
}

impl From<PageArgs> for Pagination {
    fn from(PageArgs { limit, offset }: PageArgs) -> Self {
        Self { limit, offset }
    }
}

fn print_rows<T: Serialize>(rows: &[T], format: Format) -> anyhow::Result<()> {
    println!("{}", export::render(rows, format)?);

    Ok(())
}

/// Trimmed text, or `None` when blank.
fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

/// # Errors
/// Any failure of the command, ready to be reported to the user.
pub async fn run(cli: Cli) -> anyhow::Result<()> {
    let Cli {
        config,
        format,
        command,
        ..
    } = cli;

    // `doctor` must work without an anon key, so the gate is built per command.
    let auth = || Authenticator::from_config(&config);
    let redirect_url = config.redirect_url();

    match command {
        Command::Doctor => account::doctor(&config).await,
        Command::Admin(command) => admin::run(command, &config, format).await,
        Command::Login(login) => account::login(login, &auth()?, redirect_url).await,
        Command::Logout => account::logout(&auth()?).await,
        Command::Whoami => account::whoami(&auth()?, format).await,
        Command::ResetPassword { email } => {
            account::reset_password(&auth()?, &email, redirect_url).await
        }
        Command::ChangePassword => account::change_password(&auth()?).await,
        Command::Fish(command) => fish::run(command, &auth()?, format).await,
        Command::Catalog(command) => records::catalog(command, &auth()?, format).await,
        Command::Plasmid(command) => records::plasmid(command, &auth()?, format).await,
        Command::Note(command) => records::note(command, &auth()?, format).await,
    }
}
