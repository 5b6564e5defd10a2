//! Canonical card domain model.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// A canonical card record: one row per printing in the relational store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Card {
    /// Printing identity, globally unique and immutable.
    pub id: String,
    /// Logical identity shared by every reprint of the same functional card.
    pub oracle_id: Option<String>,
    pub name: String,
    pub mana_cost: Option<String>,
    pub cmc: Option<f64>,
    pub type_line: String,
    pub oracle_text: Option<String>,
    pub power: Option<String>,
    pub toughness: Option<String>,
    pub loyalty: Option<String>,
    #[serde(default)]
    pub colors: Vec<String>,
    #[serde(default)]
    pub color_identity: Vec<String>,
    #[serde(default)]
    pub keywords: Vec<String>,
    pub image_uris: Option<serde_json::Value>,
    pub card_faces: Option<serde_json::Value>,
    pub set_code: String,
    pub set_name: Option<String>,
    pub rarity: String,
    pub lang: String,
    pub released_at: Option<NaiveDate>,
    pub deleted_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub cached_at: i64,
}

impl Card {
    /// Create a minimal card with the required fields set and everything else empty.
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        type_line: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            oracle_id: None,
            name: name.into(),
            mana_cost: None,
            cmc: None,
            type_line: type_line.into(),
            oracle_text: None,
            power: None,
            toughness: None,
            loyalty: None,
            colors: Vec::new(),
            color_identity: Vec::new(),
            keywords: Vec::new(),
            image_uris: None,
            card_faces: None,
            set_code: String::new(),
            set_name: None,
            rarity: String::new(),
            lang: "en".to_string(),
            released_at: None,
            deleted_at: None,
            cached_at: 0,
        }
    }

    /// The logical identity, if this printing has one.
    pub fn logical_id(&self) -> Option<&str> {
        self.oracle_id.as_deref()
    }

    pub fn is_deleted(&self) -> bool {
        self.deleted_at.is_some()
    }

    /// Tokens, emblems and basic lands are not gameplay cards for search purposes.
    pub fn is_gameplay_card(&self) -> bool {
        let type_line = self.type_line.to_lowercase();
        !(type_line.contains("token")
            || type_line.contains("emblem")
            || type_line.starts_with("basic land"))
    }
}
