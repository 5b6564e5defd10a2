//! Bulk load of a Scryfall export.

use std::fs::File;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;

use synergy_core::config::AppConfig;
use synergy_db::prime::prime_from_reader;

use super::connect_cards;

#[derive(Args)]
pub struct PrimeArgs {
    /// Path to a Scryfall bulk-data JSON file
    pub file: PathBuf,
}

pub async fn cmd_prime(config: &AppConfig, args: PrimeArgs) -> Result<()> {
    let file = File::open(&args.file)
        .with_context(|| format!("Failed to open {}", args.file.display()))?;
    let store = connect_cards(config).await?;

    println!("{} {}", "Priming from".bold(), args.file.display().to_string().cyan());
    let report = prime_from_reader(store.as_ref(), file).await?;

    println!("\n{}", "Priming complete:".green().bold());
    println!("  Parsed:   {}", report.parsed);
    println!("  Upserted: {}", report.upserted);
    println!("  Batches:  {}", report.batches);
    println!("  Elapsed:  {:.1}s", report.elapsed_secs);
    Ok(())
}
