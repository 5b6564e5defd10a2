//! Projection of canonical cards into the reduced graph representation.

use serde::{Deserialize, Serialize};

use crate::card::model::Card;
use crate::mechanics;

/// Separator between supertypes/types and subtypes in a type line.
const TYPE_LINE_SEPARATOR: char = '—';
/// Separates the faces of a double-faced or split card.
const FACE_SEPARATOR: &str = "//";

/// The minimal attribute set ingested into the graph store for one logical card.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CardProjection {
    /// Logical identity; the Card node key.
    pub id: String,
    /// Printing the projection was taken from.
    pub printing_id: String,
    pub name: String,
    pub cmc: f64,
    pub types: Vec<String>,
    pub keywords: Vec<String>,
    pub mechanics: Vec<String>,
}

/// Kinds of attribute node a Card node links to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum AttributeKind {
    Type,
    Keyword,
    Mechanic,
}

impl AttributeKind {
    pub const ALL: [AttributeKind; 3] = [Self::Type, Self::Keyword, Self::Mechanic];

    /// Node label in the graph store.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Type => "Type",
            Self::Keyword => "Keyword",
            Self::Mechanic => "Mechanic",
        }
    }

    /// Relationship type of the Card → attribute edge.
    pub fn relationship(&self) -> &'static str {
        match self {
            Self::Type => "IS_TYPE",
            Self::Keyword => "HAS_KEYWORD",
            Self::Mechanic => "PRODUCES",
        }
    }
}

impl CardProjection {
    /// Number of attribute edges this projection fans out to.
    pub fn attribute_count(&self) -> usize {
        self.types.len() + self.keywords.len() + self.mechanics.len()
    }

    /// Values for one attribute kind.
    pub fn values(&self, kind: AttributeKind) -> &[String] {
        match kind {
            AttributeKind::Type => &self.types,
            AttributeKind::Keyword => &self.keywords,
            AttributeKind::Mechanic => &self.mechanics,
        }
    }

    /// Every (kind, value) attribute of this projection.
    pub fn attributes(&self) -> impl Iterator<Item = (AttributeKind, &str)> + '_ {
        AttributeKind::ALL
            .into_iter()
            .flat_map(move |kind| self.values(kind).iter().map(move |v| (kind, v.as_str())))
    }
}

/// Tokenize a type line into its structural types.
///
/// `"Legendary Creature — Elf Shaman"` becomes
/// `["Legendary", "Creature", "Elf", "Shaman"]`. Both faces of a
/// double-faced card contribute, each type once, in first-seen order.
pub fn split_type_line(type_line: &str) -> Vec<String> {
    let mut types: Vec<String> = Vec::new();
    for token in type_line.split(|c: char| c.is_whitespace() || c == TYPE_LINE_SEPARATOR) {
        if token.is_empty() || token == FACE_SEPARATOR || types.iter().any(|t| t == token) {
            continue;
        }
        types.push(token.to_string());
    }
    types
}

/// Project a canonical card. Never fails: absent fields degrade to zero values.
///
/// Cards without a logical identity are keyed by their printing id.
pub fn project(card: &Card) -> CardProjection {
    CardProjection {
        id: card.logical_id().unwrap_or(&card.id).to_string(),
        printing_id: card.id.clone(),
        name: card.name.clone(),
        cmc: card.cmc.unwrap_or(0.0),
        types: split_type_line(&card.type_line),
        keywords: card.keywords.clone(),
        mechanics: mechanics::classify(card.oracle_text.as_deref())
            .iter()
            .map(|m| m.as_str().to_string())
            .collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_type_line() {
        assert_eq!(
            split_type_line("Legendary Creature — Elf Shaman"),
            vec!["Legendary", "Creature", "Elf", "Shaman"]
        );
        assert_eq!(split_type_line("Instant"), vec!["Instant"]);
        assert_eq!(split_type_line("Artifact—Equipment"), vec!["Artifact", "Equipment"]);
        assert!(split_type_line("").is_empty());
    }

    #[test]
    fn test_split_double_faced_type_line() {
        assert_eq!(
            split_type_line("Creature — Human Werewolf // Creature — Werewolf"),
            vec!["Creature", "Human", "Werewolf"]
        );
        assert_eq!(split_type_line("Instant // Sorcery"), vec!["Instant", "Sorcery"]);
    }

    #[test]
    fn test_project_full_card() {
        let mut card = Card::new("p-2", "Llanowar Elves", "Creature — Elf Druid");
        card.oracle_id = Some("oracle-elves".to_string());
        card.cmc = Some(1.0);
        card.keywords = vec!["Haste".to_string()];
        card.oracle_text = Some("{T}: Add {G}.".to_string());

        let projection = project(&card);
        assert_eq!(projection.id, "oracle-elves");
        assert_eq!(projection.printing_id, "p-2");
        assert_eq!(projection.cmc, 1.0);
        assert_eq!(projection.types, vec!["Creature", "Elf", "Druid"]);
        assert_eq!(projection.keywords, vec!["Haste"]);
        assert_eq!(projection.mechanics, vec!["ramp"]);
        assert_eq!(projection.attribute_count(), 5);
    }

    #[test]
    fn test_project_sparse_card_degrades_to_zero_values() {
        let card = Card::new("p-1", "Mystery", "");
        let projection = project(&card);
        assert_eq!(projection.id, "p-1");
        assert_eq!(projection.cmc, 0.0);
        assert!(projection.types.is_empty());
        assert!(projection.keywords.is_empty());
        assert!(projection.mechanics.is_empty());
    }
}
