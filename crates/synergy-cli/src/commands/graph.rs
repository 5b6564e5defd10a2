//! Graph store commands: startup, schema, parity, resync, recommendations.

use anyhow::Result;
use clap::Args;
use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};

use synergy_core::config::AppConfig;
use synergy_graph::queries::RecommendationEngine;
use synergy_graph::sync::{ResyncHandle, ResyncOrchestrator, ResyncReport};
use synergy_graph::{check_parity, ensure_schema, startup};

use super::{connect_cards, connect_graph};
use crate::output;

const PROGRESS_TEMPLATE: &str =
    "{spinner:.green} [{bar:40.cyan/blue}] {pos}/{len} cards ({per_sec})";

#[derive(Args)]
pub struct RecommendArgs {
    /// Logical card id (Scryfall oracle id)
    pub logical_id: String,

    /// Maximum number of recommendations
    #[arg(short, long)]
    pub limit: Option<usize>,
}

pub async fn cmd_start(config: &AppConfig) -> Result<()> {
    let cards = connect_cards(config).await?;
    let graph = connect_graph(config).await?;
    let orchestrator = ResyncOrchestrator::new(cards.clone(), graph.clone(), &config.resync);

    let report =
        startup(cards.as_ref(), graph.as_ref(), config.graph.dialect, &orchestrator).await?;
    output::print_schema_report(&report.schema);
    output::print_parity(&report.parity);

    match report.resync {
        Some(handle) => {
            println!("{}", "Graph out of sync; resyncing...".yellow().bold());
            let resync = wait_with_progress(handle).await?;
            output::print_resync_report(&resync);
        }
        None => println!("{}", "Graph is in sync.".green()),
    }
    Ok(())
}

pub async fn cmd_schema(config: &AppConfig) -> Result<()> {
    let graph = connect_graph(config).await?;
    let report = ensure_schema(graph.as_ref(), config.graph.dialect).await;
    output::print_schema_report(&report);
    Ok(())
}

pub async fn cmd_parity(config: &AppConfig) -> Result<()> {
    let cards = connect_cards(config).await?;
    let graph = connect_graph(config).await?;

    let report = check_parity(cards.as_ref(), graph.as_ref()).await?;
    output::print_parity(&report);

    let counts = graph.get_counts().await?;
    println!("  Nodes:         {}", counts.nodes.to_string().cyan());
    println!("  Relationships: {}", counts.relationships.to_string().cyan());
    Ok(())
}

pub async fn cmd_resync(config: &AppConfig) -> Result<()> {
    let cards = connect_cards(config).await?;
    let graph = connect_graph(config).await?;
    let orchestrator = ResyncOrchestrator::new(cards, graph, &config.resync);

    println!("{}", "Resyncing graph from canonical store...".bold());
    let report = wait_with_progress(orchestrator.spawn()?).await?;
    output::print_resync_report(&report);
    Ok(())
}

pub async fn cmd_recommend(config: &AppConfig, args: RecommendArgs) -> Result<()> {
    let cards = connect_cards(config).await?;
    let graph = connect_graph(config).await?;

    let mut recommend = config.recommend.clone();
    if let Some(limit) = args.limit {
        recommend.limit = limit;
    }
    let engine = RecommendationEngine::new(graph, cards, &recommend);

    let found = engine.recommend(&args.logical_id).await?;
    println!("{} {}", "Recommendations for".bold(), args.logical_id.yellow());
    output::print_cards_table(&found);
    Ok(())
}

/// Drive a progress bar from the resync's watch channel until it finishes.
async fn wait_with_progress(handle: ResyncHandle) -> Result<ResyncReport> {
    let mut progress = handle.subscribe();
    let bar = ProgressBar::new(0);
    let style = ProgressStyle::with_template(PROGRESS_TEMPLATE)
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("=> ");
    bar.set_style(style);

    let join = handle.join();
    tokio::pin!(join);

    let result = loop {
        tokio::select! {
            result = &mut join => break result,
            changed = progress.changed() => {
                if changed.is_err() {
                    break (&mut join).await;
                }
                let snapshot = *progress.borrow_and_update();
                bar.set_length(snapshot.total);
                bar.set_position(snapshot.synced);
            }
        }
    };

    bar.finish_and_clear();
    Ok(result?)
}
