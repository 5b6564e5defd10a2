//! Single-card lookups against the canonical store.

use anyhow::Result;
use clap::Args;
use colored::Colorize;

use synergy_core::config::AppConfig;
use synergy_core::store::CardStore;

use super::connect_cards;
use crate::output;

#[derive(Args)]
pub struct CardArgs {
    /// Printing id
    pub id: String,

    /// Print the raw record as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Args)]
pub struct VariantsArgs {
    /// Logical card id (Scryfall oracle id)
    pub logical_id: String,

    /// Printing id to leave out
    pub exclude_id: String,
}

pub async fn cmd_card(config: &AppConfig, args: CardArgs) -> Result<()> {
    let store = connect_cards(config).await?;

    match store.card_by_id(&args.id).await? {
        Some(card) if args.json => println!("{}", serde_json::to_string_pretty(&card)?),
        Some(card) => output::print_card(&card),
        None => println!("{} {}", "No card with id".dimmed(), args.id.yellow()),
    }
    Ok(())
}

pub async fn cmd_variants(config: &AppConfig, args: VariantsArgs) -> Result<()> {
    let store = connect_cards(config).await?;

    let variants = store
        .variants(&args.logical_id, &args.exclude_id, &config.search.language)
        .await?;
    output::print_cards_table(&variants);
    Ok(())
}

pub async fn cmd_random(config: &AppConfig) -> Result<()> {
    let store = connect_cards(config).await?;

    match store.random_card(&config.search.language).await? {
        Some(card) => output::print_card(&card),
        None => println!("{}", "The canonical store has no cards.".dimmed()),
    }
    Ok(())
}
