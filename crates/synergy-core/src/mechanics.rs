//! Mechanic classification from rules text.
//!
//! A fixed vocabulary of synergy tags, each matched by case-insensitive
//! regular expressions against the card's rules text. Bump
//! [`MECHANIC_VOCABULARY_VERSION`] whenever the table changes so that a full
//! resync can be scheduled.

use std::collections::BTreeSet;
use std::fmt;
use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

/// Version of the tag vocabulary and its pattern table.
pub const MECHANIC_VOCABULARY_VERSION: u32 = 3;

/// A derived synergy label.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Mechanic {
    Draw,
    Ramp,
    Token,
    Lifegain,
    GraveyardRecursion,
    Removal,
    Counterspell,
}

impl Mechanic {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Draw => "draw",
            Self::Ramp => "ramp",
            Self::Token => "token",
            Self::Lifegain => "lifegain",
            Self::GraveyardRecursion => "graveyard-recursion",
            Self::Removal => "removal",
            Self::Counterspell => "counterspell",
        }
    }
}

impl fmt::Display for Mechanic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Tag → rule fragments, matched case-insensitively.
///
/// Counts are matched as any number word, digit run, or `X` so that
/// "gains 10 life" and "draws three cards" tag the same as their smaller
/// variants.
const MECHANIC_RULES: &[(Mechanic, &[&str])] = &[
    (
        Mechanic::Draw,
        &[
            concat!(
                r"\bdraws? (?:a|an|one|two|three|four|five|six|seven|x|\d+|that many)",
                r" (?:additional )?cards?\b",
            ),
            r"\bdraws? cards\b",
        ],
    ),
    (
        Mechanic::Ramp,
        &[
            r"search your library for (?:a|an|up to \w+) (?:basic )?(?:\w+ )?lands?",
            r"\badd \{[wubrgc]\}",
            r"\badd (?:one|two|three|x) mana\b",
        ],
    ),
    (Mechanic::Token, &[r"\btokens?\b"]),
    (
        Mechanic::Lifegain,
        &[
            r"\bgains? (?:\d+|x|that much) life\b",
            r"\bgains? life\b",
            r"\blifelink\b",
        ],
    ),
    (
        Mechanic::GraveyardRecursion,
        &[
            r"from (?:your|a) graveyard (?:to|onto) (?:your hand|the battlefield)",
            r"\bcast (?:it|this card|that card) from your graveyard",
            r"\bflashback\b",
        ],
    ),
    (
        Mechanic::Removal,
        &[
            r"\bdestroy (?:target|all|each)\b",
            r"\bexile target\b",
            r"damage to (?:any target|target creature)",
        ],
    ),
    (Mechanic::Counterspell, &[r"\bcounter target\b"]),
];

fn compiled_rules() -> &'static [(Mechanic, Regex)] {
    static RULES: OnceLock<Vec<(Mechanic, Regex)>> = OnceLock::new();
    RULES.get_or_init(|| {
        MECHANIC_RULES
            .iter()
            .filter_map(|(mechanic, fragments)| {
                let source = format!("(?i)(?:{})", fragments.join("|"));
                Regex::new(&source).ok().map(|re| (*mechanic, re))
            })
            .collect()
    })
}

/// Derive the mechanic tags for a piece of rules text.
///
/// Absent or empty text yields an empty set. A tag appears at most once no
/// matter how many of its rules match.
pub fn classify(rules_text: Option<&str>) -> BTreeSet<Mechanic> {
    let Some(text) = rules_text.filter(|t| !t.trim().is_empty()) else {
        return BTreeSet::new();
    };

    compiled_rules()
        .iter()
        .filter(|(_, rule)| rule.is_match(text))
        .map(|(mechanic, _)| *mechanic)
        .collect()
}
