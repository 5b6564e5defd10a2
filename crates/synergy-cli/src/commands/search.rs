//! Fuzzy search commands.

use anyhow::{bail, Result};
use clap::Args;
use colored::Colorize;

use synergy_core::config::AppConfig;
use synergy_db::FuzzySearch;

use super::connect_cards;
use crate::output;

#[derive(Args)]
pub struct SimilarArgs {
    /// Card name to leave out of the results
    #[arg(long)]
    pub exclude_name: String,

    /// Rules text to match; repeat for several queries
    #[arg(long = "text", required = true)]
    pub texts: Vec<String>,
}

#[derive(Args)]
pub struct FuzzyArgs {
    /// Approximate card name
    pub name: String,
}

pub async fn cmd_similar(config: &AppConfig, args: SimilarArgs) -> Result<()> {
    if args.texts.iter().all(|t| t.trim().is_empty()) {
        bail!("at least one non-empty --text is required");
    }
    let search = FuzzySearch::new(connect_cards(config).await?, config.search.clone());

    let found = search.search(&args.exclude_name, &args.texts).await?;
    println!(
        "{} ({} quer{})",
        "Cards with similar rules text".bold(),
        args.texts.len(),
        if args.texts.len() == 1 { "y" } else { "ies" }
    );
    output::print_cards_table(&found);
    Ok(())
}

pub async fn cmd_fuzzy(config: &AppConfig, args: FuzzyArgs) -> Result<()> {
    let search = FuzzySearch::new(connect_cards(config).await?, config.search.clone());

    let found = search.search_names(&args.name).await?;
    println!("{} {}", "Names like".bold(), args.name.yellow());
    output::print_cards_table(&found);
    Ok(())
}
