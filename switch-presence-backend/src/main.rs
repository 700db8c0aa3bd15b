use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

use switch_presence::config::{self, AppConfig, DEFAULT_CONFIG_PATH};
use switch_presence::module::catalog::{Catalog, CatalogBuilder};
use switch_presence::module::dispatch::QueryDispatcher;
use switch_presence::module::gametdb::GameTdbClient;
use switch_presence::module::handler::{Selection, format_entries, format_game, format_not_found};
use switch_presence::module::presence::{DiscordIpcClient, PresenceUpdater};
use switch_presence::module::resolver::{QueryResolver, Resolver};
use switch_presence::service::{ConsoleService, publish_once};
use switch_presence_common::{QueryMode, ResolutionQuery};

#[derive(Parser)]
#[command(name = "switch-presence")]
#[command(about = "Nintendo Switch rich presence backed by GameTDB", long_about = None)]
struct Cli {
    #[arg(short, long, default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Interactive console (default)
    Console,
    /// Build the catalog file from the GameTDB XML dump
    BuildCatalog {
        #[arg(short, long)]
        dump: Option<PathBuf>,
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    Resolve {
        query: String,
        #[arg(short, long, default_value = "name")]
        mode: QueryMode,
    },
    Search {
        text: String,
        #[arg(short, long)]
        limit: Option<usize>,
    },
    /// Resolve a game and publish presence for it once
    Set {
        query: String,
        #[arg(short, long)]
        state: Option<String>,
    },
}

/// Load the catalog, tolerating a missing file
async fn open_catalog(config: &AppConfig) -> Arc<Catalog> {
    let catalog = Arc::new(Catalog::new(&config.catalog.catalog_path));
    if let Err(e) = catalog.load().await {
        if e.is_not_found() {
            tracing::warn!(
                "{} not found; run build-catalog or /build to create it",
                config.catalog.catalog_path
            );
        }
    }
    catalog
}

async fn build_resolver(config: &AppConfig) -> Result<Resolver> {
    let catalog = open_catalog(config).await;
    let client = GameTdbClient::new(&config.gametdb).context("Failed to create GameTDB client")?;
    Ok(Resolver::new(catalog, client))
}

fn presence_updater(config: &AppConfig) -> Option<PresenceUpdater<DiscordIpcClient>> {
    config
        .presence
        .enabled
        .then(|| PresenceUpdater::new(DiscordIpcClient::new(&config.presence.client_id)))
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Load configuration
    let config = config::read_config(&cli.config)
        .with_context(|| format!("Failed to load configuration from {:?}", cli.config))?;

    // Initialize logging
    let _logging_guard = switch_presence::logging::init_logging(&config.log_dir, "switch-presence", &config.log_level)?;

    tracing::info!("Switch Presence starting...");

    match cli.command.unwrap_or(Commands::Console) {
        Commands::Console => {
            let resolver = build_resolver(config).await?;
            let catalog = resolver.catalog().clone();
            let (dispatcher, inbox) = QueryDispatcher::channel(Arc::new(resolver));

            let service = ConsoleService::new(
                catalog,
                CatalogBuilder::from_config(&config.catalog),
                dispatcher,
                presence_updater(config),
                config.catalog.search_limit,
            );
            service.run(inbox).await?;
        }
        Commands::BuildCatalog { dump, output } => {
            let dump = dump.unwrap_or_else(|| PathBuf::from(&config.catalog.dump_path));
            let output = output.unwrap_or_else(|| PathBuf::from(&config.catalog.catalog_path));

            let report = CatalogBuilder::new(&dump, &output)
                .build()
                .await
                .with_context(|| format!("Failed to build catalog from {:?}", dump))?;
            println!("{}", report);
        }
        Commands::Resolve { query, mode } => {
            let resolver = build_resolver(config).await?;
            let query = ResolutionQuery::new(query, mode);
            match resolver.resolve(&query).await {
                Some(game) => println!("{}", format_game(&game)),
                None => println!("{}", format_not_found(&query, &[])),
            }
        }
        Commands::Search { text, limit } => {
            let catalog = open_catalog(config).await;
            let limit = limit.unwrap_or(config.catalog.search_limit);
            let results = catalog.search_titles(&text, limit).await;
            println!("{}", format_entries(&results));
        }
        Commands::Set { query, state } => {
            let presence = presence_updater(config).context("Presence is disabled in the configuration")?;
            let resolver = build_resolver(config).await?;

            let query = ResolutionQuery::by_name(query);
            let result = resolver.resolve(&query).await;
            if let Some(game) = &result {
                println!("{}", format_game(game));
            }

            let mut selection = Selection::default();
            selection.apply(query, result);
            if !publish_once(&presence, &selection, state.as_deref()).await {
                anyhow::bail!("Presence update failed");
            }

            println!("Presence set. Press Ctrl+C to clear it and exit.");
            tokio::signal::ctrl_c().await?;
            presence.shutdown().await;
        }
    }

    Ok(())
}
