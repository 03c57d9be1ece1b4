// Main entry point - Dependency injection and command dispatch
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;

use dashboard_migrator::application::migration_service::{MigrationOptions, MigrationService};
use dashboard_migrator::infrastructure::config::{load_migration_config, write_template};
use dashboard_migrator::infrastructure::logging::{init_logging, log_file_path, LOG_DIR};
use dashboard_migrator::infrastructure::metabase_client::MetabaseClient;
use dashboard_migrator::presentation::console::{Console, ConsoleIo};

/// Copy Metabase dashboards, with their cards, collections and tabs,
/// from a source instance to a target instance.
#[derive(Debug, Parser)]
#[command(name = "dashboard-migrator", version, about)]
struct Cli {
    /// Configuration file (defaults to config/migrator.*)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Also write logs to logs/migration_<timestamp>.log
    #[arg(long)]
    log_file: bool,

    /// Test the connection to both instances and exit
    #[arg(long)]
    test: bool,

    /// Write a configuration template to the given path and exit
    #[arg(long, value_name = "PATH")]
    template: Option<PathBuf>,

    /// Migrate one source dashboard without starting the console
    #[arg(long, value_name = "ID")]
    dashboard: Option<i64>,

    /// With --dashboard: only preview the migration
    #[arg(long, requires = "dashboard")]
    dry_run: bool,

    /// With --dashboard: skip the confirmation step
    #[arg(long, requires = "dashboard")]
    yes: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    if let Some(path) = &cli.template {
        write_template(path).with_context(|| format!("writing template to {}", path.display()))?;
        println!("Configuration template written to {}", path.display());
        return Ok(());
    }

    // Load configuration
    let config = load_migration_config(cli.config.as_deref()).context("loading configuration")?;

    // Initialize tracing
    let log_path = cli
        .log_file
        .then(|| log_file_path(Path::new(LOG_DIR), chrono::Local::now().naive_local()));
    init_logging(&config.log_directive(), log_path.as_deref())?;

    // Create gateways (infrastructure layer)
    let source = Arc::new(MetabaseClient::from_config(&config.source, &config).context("creating source client")?);
    let target = Arc::new(MetabaseClient::from_config(&config.target, &config).context("creating target client")?);

    // Create service (application layer)
    let options = MigrationOptions {
        collection_match: config.collection_match,
    };
    let service = MigrationService::new(source, target, options);

    // Run console (presentation layer)
    let io = ConsoleIo::new(io::stdin().lock(), io::stdout());
    let mut console = Console::new(service, io, config.conflict_policy);

    let succeeded = if cli.test {
        console.test_connections().await?
    } else if let Some(dashboard_id) = cli.dashboard {
        console.migrate_one(dashboard_id, cli.dry_run, cli.yes).await?
    } else {
        console.run().await?;
        true
    };

    if !succeeded {
        std::process::exit(1);
    }
    Ok(())
}
