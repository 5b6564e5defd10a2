//! Terminal output formatting.

use colored::{ColoredString, Colorize};
use unicode_width::UnicodeWidthStr;

use synergy_core::{classify, Card};
use synergy_graph::{ParityReport, SchemaReport};
use synergy_graph::sync::ResyncReport;

/// Print a single card.
pub fn print_card(card: &Card) {
    let cost = card.mana_cost.as_deref().unwrap_or("");
    println!("{} {}", card.name.cyan().bold(), cost.yellow());
    println!("{}", card.type_line);

    if let Some(text) = &card.oracle_text {
        println!();
        println!("{}", text);
    }
    match (&card.power, &card.toughness, &card.loyalty) {
        (Some(p), Some(t), _) => println!("{}", format!("{}/{}", p, t).bold()),
        (_, _, Some(l)) => println!("{}: {}", "Loyalty".bold(), l),
        _ => {}
    }

    println!();
    let set_name = card.set_name.as_deref().unwrap_or(&card.set_code);
    println!("{}: {} ({})", "Set".bold(), set_name, card.set_code);
    println!("{}: {}", "Rarity".bold(), rarity_colored(&card.rarity));
    if !card.keywords.is_empty() {
        println!("{}: {}", "Keywords".bold(), card.keywords.join(", "));
    }
    let mechanics = classify(card.oracle_text.as_deref());
    if !mechanics.is_empty() {
        let tags: Vec<&str> = mechanics.iter().map(|m| m.as_str()).collect();
        println!("{}: {}", "Mechanics".bold(), tags.join(", ").magenta());
    }
    println!("{}: {}", "Printing".bold(), card.id.dimmed());
    if let Some(oracle) = &card.oracle_id {
        println!("{}: {}", "Oracle".bold(), oracle.dimmed());
    }
}

/// Print cards as a table.
pub fn print_cards_table(cards: &[Card]) {
    if cards.is_empty() {
        println!("{}", "No cards found.".dimmed());
        return;
    }

    // Name column takes whatever the fixed columns leave.
    let fixed = 2 + 1 + 24 + 1 + 6 + 1 + 10 + 1 + 8;
    let name_width = term_width().saturating_sub(fixed).clamp(16, 40);

    println!(
        "{:>2} {} {} {} {} {}",
        "#",
        pad_right("Name", name_width),
        pad_right("Type", 24),
        pad_right("Set", 6),
        pad_right("Rarity", 10),
        "Printing"
    );
    println!("{}", "─".repeat(fixed + name_width));

    for (i, card) in cards.iter().enumerate() {
        let rarity = pad_right(&card.rarity, 10);
        println!(
            "{:>2} {} {} {} {} {}",
            i + 1,
            pad_right(&truncate_visual(&card.name, name_width), name_width).cyan(),
            pad_right(&truncate_visual(&card.type_line, 24), 24),
            pad_right(&card.set_code, 6).dimmed(),
            rarity_colored(&rarity),
            short_id(&card.id).dimmed()
        );
    }

    println!();
    println!("{} card(s)", cards.len());
}

pub fn print_schema_report(report: &SchemaReport) {
    let failed = if report.failed > 0 {
        report.failed.to_string().yellow()
    } else {
        report.failed.to_string().normal()
    };
    println!(
        "{} {} applied, {} failed",
        "Graph schema:".bold(),
        report.applied.to_string().green(),
        failed
    );
}

pub fn print_parity(report: &ParityReport) {
    println!("{}", "Graph Parity".bold());
    println!("{}", "─".repeat(40));
    println!("  Canonical cards: {}", report.relational_count.to_string().cyan());
    println!("  Graph cards:     {}", report.graph_count.to_string().cyan());
    let status = if report.in_sync { "in sync".green() } else { "out of sync".red() };
    println!("  Status:          {}", status);
}

pub fn print_resync_report(report: &ResyncReport) {
    println!("\n{}", "Resync complete:".green().bold());
    println!("  Cards synced:    {}/{}", report.synced, report.total);
    println!("  Batches:         {}", report.batches);
    println!("  Attribute links: {}", report.result.attribute_links_merged);
    println!("  Elapsed:         {:.1}s", report.elapsed.as_secs_f64());
}

fn rarity_colored(rarity: &str) -> ColoredString {
    match rarity.trim_end() {
        "mythic" => rarity.red().bold(),
        "rare" => rarity.yellow(),
        "uncommon" => rarity.white(),
        "special" | "bonus" => rarity.magenta(),
        _ => rarity.dimmed(),
    }
}

fn short_id(id: &str) -> &str {
    id.get(..8).unwrap_or(id)
}

/// Get terminal width, defaulting to 80.
fn term_width() -> usize {
    terminal_size::terminal_size()
        .map(|(w, _)| w.0 as usize)
        .unwrap_or(80)
}

/// Pad a plain string to a given visual width (right-padded).
fn pad_right(s: &str, width: usize) -> String {
    let visual = UnicodeWidthStr::width(s);
    if visual >= width {
        s.to_string()
    } else {
        format!("{}{}", s, " ".repeat(width - visual))
    }
}

/// Truncate a string respecting visual width.
fn truncate_visual(s: &str, max_width: usize) -> String {
    if UnicodeWidthStr::width(s) <= max_width {
        return s.to_string();
    }
    if max_width <= 2 {
        return ".".repeat(max_width);
    }
    let mut result = String::new();
    let mut current_width = 0;
    for ch in s.chars() {
        let ch_width = unicode_width::UnicodeWidthChar::width(ch).unwrap_or(0);
        if current_width + ch_width > max_width - 2 {
            break;
        }
        result.push(ch);
        current_width += ch_width;
    }
    result.push_str("..");
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate_visual() {
        assert_eq!(truncate_visual("Shock", 10), "Shock");
        assert_eq!(truncate_visual("Lightning Bolt", 8), "Lightn..");
        assert_eq!(truncate_visual("Æther Vial", 6), "Æthe..");
    }

    #[test]
    fn test_pad_right_uses_visual_width() {
        assert_eq!(pad_right("ab", 4), "ab  ");
        assert_eq!(pad_right("abcdef", 4), "abcdef");
    }

    #[test]
    fn test_short_id() {
        assert_eq!(short_id("e3285e6b-1234"), "e3285e6b");
        assert_eq!(short_id("abc"), "abc");
    }
}
