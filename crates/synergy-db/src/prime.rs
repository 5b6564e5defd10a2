//! Bulk priming of the canonical store from a Scryfall bulk-data export.
//!
//! The export is one JSON array of card objects, several gigabytes for the
//! "all cards" file. It is parsed element by element on a blocking thread and
//! handed to the async writer in batches over a bounded channel.

use std::fmt;
use std::io::{BufReader, Read};
use std::time::Instant;

use chrono::{NaiveDate, Utc};
use serde::de::{self, DeserializeSeed, SeqAccess, Visitor};
use serde_json::Value;
use tokio::sync::mpsc;
use tracing::{debug, info};

use synergy_core::{Card, SynergyError, SynergyResult};

use crate::queries::cards::PgCardStore;

/// Rows per upsert statement.
pub const PRIME_BATCH_SIZE: usize = 1000;

/// Log progress every this many batches.
const PROGRESS_EVERY_BATCHES: u64 = 10;

/// Outcome of a priming run.
#[derive(Debug, Clone, Default)]
pub struct PrimeReport {
    pub parsed: u64,
    pub upserted: u64,
    pub batches: u64,
    pub elapsed_secs: f64,
}

fn str_field(data: &Value, key: &str) -> Option<String> {
    data.get(key).and_then(Value::as_str).map(str::to_string)
}

fn str_list(data: &Value, key: &str) -> Vec<String> {
    data.get(key)
        .and_then(Value::as_array)
        .map(|items| items.iter().filter_map(Value::as_str).map(str::to_string).collect())
        .unwrap_or_default()
}

fn json_field(data: &Value, key: &str) -> Option<Value> {
    data.get(key).filter(|v| v.is_object() || v.is_array()).cloned()
}

/// Map one Scryfall card object onto a canonical card.
///
/// Missing optional fields become `None`, missing arrays become empty.
pub fn card_from_scryfall(data: &Value) -> Card {
    Card {
        id: str_field(data, "id").unwrap_or_default(),
        oracle_id: str_field(data, "oracle_id"),
        name: str_field(data, "name").unwrap_or_default(),
        mana_cost: str_field(data, "mana_cost"),
        cmc: data.get("cmc").and_then(Value::as_f64),
        type_line: str_field(data, "type_line").unwrap_or_default(),
        oracle_text: str_field(data, "oracle_text"),
        power: str_field(data, "power"),
        toughness: str_field(data, "toughness"),
        loyalty: str_field(data, "loyalty"),
        colors: str_list(data, "colors"),
        color_identity: str_list(data, "color_identity"),
        keywords: str_list(data, "keywords"),
        image_uris: json_field(data, "image_uris"),
        card_faces: json_field(data, "card_faces"),
        set_code: str_field(data, "set").unwrap_or_default(),
        set_name: str_field(data, "set_name"),
        rarity: str_field(data, "rarity").unwrap_or_default(),
        lang: str_field(data, "lang").unwrap_or_default(),
        released_at: str_field(data, "released_at")
            .and_then(|d| NaiveDate::parse_from_str(&d, "%Y-%m-%d").ok()),
        deleted_at: None,
        cached_at: Utc::now().timestamp(),
    }
}

/// Streams array elements into fixed-size batches.
struct BatchSink {
    tx: mpsc::Sender<Vec<Card>>,
    batch_size: usize,
}

impl BatchSink {
    fn flush<E: de::Error>(&self, batch: Vec<Card>) -> Result<(), E> {
        self.tx
            .blocking_send(batch)
            .map_err(|_| E::custom("card writer stopped"))
    }
}

impl<'de> DeserializeSeed<'de> for BatchSink {
    type Value = u64;

    fn deserialize<D: de::Deserializer<'de>>(self, deserializer: D) -> Result<u64, D::Error> {
        deserializer.deserialize_seq(self)
    }
}

impl<'de> Visitor<'de> for BatchSink {
    type Value = u64;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a JSON array of card objects")
    }

    fn visit_seq<A: SeqAccess<'de>>(self, mut seq: A) -> Result<u64, A::Error> {
        let mut batch = Vec::with_capacity(self.batch_size);
        let mut parsed = 0u64;

        while let Some(value) = seq.next_element::<Value>()? {
            let card = card_from_scryfall(&value);
            parsed += 1;
            if card.id.is_empty() {
                debug!(index = parsed, "Skipping card object without an id");
                continue;
            }
            batch.push(card);
            if batch.len() >= self.batch_size {
                let full = std::mem::replace(&mut batch, Vec::with_capacity(self.batch_size));
                self.flush(full)?;
            }
        }
        if !batch.is_empty() {
            self.flush(batch)?;
        }
        Ok(parsed)
    }
}

fn parse_batches<R: Read>(
    reader: R,
    tx: mpsc::Sender<Vec<Card>>,
    batch_size: usize,
) -> SynergyResult<u64> {
    let mut deserializer = serde_json::Deserializer::from_reader(BufReader::new(reader));
    let parsed = BatchSink { tx, batch_size }.deserialize(&mut deserializer)?;
    deserializer.end()?;
    Ok(parsed)
}

/// Stream a Scryfall bulk export into the canonical store.
pub async fn prime_from_reader<R>(store: &PgCardStore, reader: R) -> SynergyResult<PrimeReport>
where
    R: Read + Send + 'static,
{
    let started = Instant::now();
    let (tx, mut rx) = mpsc::channel::<Vec<Card>>(4);
    let parser = tokio::task::spawn_blocking(move || parse_batches(reader, tx, PRIME_BATCH_SIZE));

    info!("Starting database priming");
    let mut report = PrimeReport::default();
    while let Some(batch) = rx.recv().await {
        report.upserted += store.upsert_cards(&batch).await?;
        report.batches += 1;

        if report.batches % PROGRESS_EVERY_BATCHES == 0 {
            let rate = report.upserted as f64 / started.elapsed().as_secs_f64().max(f64::EPSILON);
            info!(upserted = report.upserted, cards_per_sec = rate as u64, "Priming progress");
        }
    }

    report.parsed = parser
        .await
        .map_err(|e| SynergyError::Task(format!("bulk parser: {}", e)))??;
    report.elapsed_secs = started.elapsed().as_secs_f64();

    info!(
        parsed = report.parsed,
        upserted = report.upserted,
        batches = report.batches,
        elapsed_secs = report.elapsed_secs,
        "Priming complete"
    );
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_card_from_scryfall_full() {
        let data = json!({
            "id": "e3285e6b",
            "oracle_id": "4457ed35",
            "name": "Lightning Bolt",
            "mana_cost": "{R}",
            "cmc": 1.0,
            "type_line": "Instant",
            "oracle_text": "Lightning Bolt deals 3 damage to any target.",
            "colors": ["R"],
            "color_identity": ["R"],
            "keywords": [],
            "image_uris": {"normal": "https://img/bolt.jpg"},
            "set": "m10",
            "set_name": "Magic 2010",
            "rarity": "common",
            "lang": "en",
            "released_at": "2009-07-17"
        });

        let card = card_from_scryfall(&data);
        assert_eq!(card.id, "e3285e6b");
        assert_eq!(card.logical_id(), Some("4457ed35"));
        assert_eq!(card.cmc, Some(1.0));
        assert_eq!(card.colors, vec!["R"]);
        assert_eq!(card.set_code, "m10");
        assert_eq!(card.released_at, NaiveDate::from_ymd_opt(2009, 7, 17));
        assert!(card.image_uris.is_some());
        assert!(card.card_faces.is_none());
        assert!(card.cached_at > 0);
    }

    #[test]
    fn test_card_from_scryfall_sparse() {
        let raw = json!({"id": "x", "name": "Plains", "released_at": "not a date"});
        let card = card_from_scryfall(&raw);
        assert_eq!(card.name, "Plains");
        assert!(card.oracle_id.is_none());
        assert!(card.keywords.is_empty());
        assert!(card.released_at.is_none());
        assert_eq!(card.type_line, "");
    }

    #[test]
    fn test_parse_batches_splits_and_skips() {
        let input = json!([
            {"id": "1", "name": "A"},
            {"name": "no id"},
            {"id": "2", "name": "B"},
            {"id": "3", "name": "C"}
        ])
        .to_string();
        let (tx, mut rx) = mpsc::channel(8);

        let parsed = parse_batches(input.as_bytes(), tx, 2).unwrap();
        assert_eq!(parsed, 4);

        let first = rx.try_recv().unwrap();
        let second = rx.try_recv().unwrap();
        assert_eq!(first.iter().map(|c| c.id.as_str()).collect::<Vec<_>>(), vec!["1", "2"]);
        assert_eq!(second.iter().map(|c| c.id.as_str()).collect::<Vec<_>>(), vec!["3"]);
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_parse_rejects_non_array() {
        let (tx, _rx) = mpsc::channel(1);
        assert!(parse_batches(&b"{\"id\": \"1\"}"[..], tx, 10).is_err());
    }
}
