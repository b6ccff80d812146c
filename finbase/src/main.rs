use clap::Parser;
use finbase::{
    cli::{self, Cli},
    logging::initialize_logging,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().unwrap_or_default();
    let mut cli = Cli::parse();

    cli.config.read_secrets()?;
    initialize_logging(cli.log_dir.clone(), cli.verbose);

    cli::run(cli).await
}
