use camino::Utf8PathBuf;
use tracing::Level;
use tracing_subscriber::{filter::Targets, prelude::*};

/// Installs the global subscriber. Pretty output goes to stderr unless a log directory is given,
/// in which case JSON lines are written to a daily rolling file.
pub fn initialize_logging(log_dir: Option<Utf8PathBuf>, verbose: bool) {
    let log_layer = tracing_subscriber::fmt::layer();
    let crate_level = if verbose { Level::DEBUG } else { Level::INFO };

    match log_dir {
        None => {
            let filter = Targets::new()
                .with_target("finbase", crate_level)
                .with_target("finbase_core", crate_level)
                .with_target("tower_http", if verbose { Level::TRACE } else { Level::WARN });
            let log_layer = log_layer
                .pretty()
                .with_writer(std::io::stderr)
                .with_filter(filter);

            tracing_subscriber::registry().with(log_layer).init();
        }
        Some(path) => {
            let log_writer = tracing_appender::rolling::daily(path, "finbase.log");
            let filter = Targets::new()
                .with_target("finbase", crate_level)
                .with_target("finbase_core", crate_level);
            let log_layer = log_layer
                .json()
                .with_writer(log_writer)
                .with_filter(filter);

            tracing_subscriber::registry().with(log_layer).init();
        }
    }
}
