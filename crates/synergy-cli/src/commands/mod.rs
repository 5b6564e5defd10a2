//! CLI command definitions and handlers.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

use synergy_core::config::AppConfig;
use synergy_db::PgCardStore;
use synergy_graph::GraphClient;

pub mod cards;
pub mod graph;
pub mod prime;
pub mod search;

/// Card synergy graph - recommendations and fuzzy search over a card catalogue
#[derive(Parser)]
#[command(name = "synergy")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// TOML config file; environment variables override it
    #[arg(short, long, global = true, env = "SYNERGY_CONFIG")]
    pub config: Option<PathBuf>,

    /// Also write logs to this file
    #[arg(long, global = true)]
    pub log_file: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the startup sequence and wait for any resync it starts
    Start,

    /// Apply graph constraints and indexes
    Schema,

    /// Compare canonical and graph card counts
    Parity,

    /// Rebuild the graph from the canonical store
    Resync,

    /// Recommend cards sharing attributes with a card
    Recommend(graph::RecommendArgs),

    /// Find cards with similar rules text
    Similar(search::SimilarArgs),

    /// Find cards by approximate name
    Fuzzy(search::FuzzyArgs),

    /// Show one printing by id
    Card(cards::CardArgs),

    /// List other printings of a card
    Variants(cards::VariantsArgs),

    /// Show a random card
    Random,

    /// Load a Scryfall bulk JSON export into the canonical store
    Prime(prime::PrimeArgs),
}

impl Cli {
    pub async fn execute(self) -> Result<()> {
        let config =
            AppConfig::load(self.config.as_deref()).context("Failed to load configuration")?;

        match self.command {
            Commands::Start => graph::cmd_start(&config).await,
            Commands::Schema => graph::cmd_schema(&config).await,
            Commands::Parity => graph::cmd_parity(&config).await,
            Commands::Resync => graph::cmd_resync(&config).await,
            Commands::Recommend(args) => graph::cmd_recommend(&config, args).await,
            Commands::Similar(args) => search::cmd_similar(&config, args).await,
            Commands::Fuzzy(args) => search::cmd_fuzzy(&config, args).await,
            Commands::Card(args) => cards::cmd_card(&config, args).await,
            Commands::Variants(args) => cards::cmd_variants(&config, args).await,
            Commands::Random => cards::cmd_random(&config).await,
            Commands::Prime(args) => prime::cmd_prime(&config, args).await,
        }
    }
}

/// Connect to the canonical store. Failure is fatal for every command.
pub(crate) async fn connect_cards(config: &AppConfig) -> Result<Arc<PgCardStore>> {
    let pool = synergy_db::init_pool(&config.database)
        .await
        .context("Canonical store is unreachable")?;
    Ok(Arc::new(PgCardStore::new(pool)))
}

/// Connect to the graph store. Failure is fatal for every command.
pub(crate) async fn connect_graph(config: &AppConfig) -> Result<Arc<GraphClient>> {
    let client = GraphClient::connect(&config.graph)
        .await
        .context("Graph store is unreachable")?;
    Ok(Arc::new(client))
}
