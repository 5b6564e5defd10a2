//! Canonical cards and printing selection.

pub mod model;

use std::cmp::Ordering;
use std::collections::BTreeMap;

use model::Card;

/// Order two printings of the same logical card: the one that should win sorts first.
///
/// Latest `released_at` wins, a missing release date loses to any date, and
/// ties go to the lexicographically greatest printing id.
pub fn printing_precedence(a: &Card, b: &Card) -> Ordering {
    match (a.released_at, b.released_at) {
        (Some(x), Some(y)) => y.cmp(&x),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
    .then_with(|| b.id.cmp(&a.id))
}

/// Collapse printings to one row per logical identity.
///
/// Deleted rows and rows without a logical identity are dropped. The result is
/// ordered by logical identity, which is also the pagination order of the
/// relational store.
pub fn latest_printings<'a>(cards: impl IntoIterator<Item = &'a Card>) -> Vec<Card> {
    let mut winners: BTreeMap<&str, &Card> = BTreeMap::new();

    for card in cards {
        if card.is_deleted() {
            continue;
        }
        let Some(logical_id) = card.logical_id() else {
            continue;
        };
        winners
            .entry(logical_id)
            .and_modify(|current| {
                if printing_precedence(card, current) == Ordering::Less {
                    *current = card;
                }
            })
            .or_insert(card);
    }

    winners.into_values().cloned().collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, Utc};

    fn printing(id: &str, oracle: &str, released: Option<(i32, u32, u32)>) -> Card {
        let mut card = Card::new(id, "Bolt", "Instant");
        card.oracle_id = Some(oracle.to_string());
        card.released_at = released.and_then(|(y, m, d)| NaiveDate::from_ymd_opt(y, m, d));
        card
    }

    #[test]
    fn test_latest_release_wins() {
        let cards = vec![
            printing("1", "X", Some((2020, 1, 1))),
            printing("2", "X", Some((2023, 1, 1))),
        ];
        let winners = latest_printings(&cards);
        assert_eq!(winners.len(), 1);
        assert_eq!(winners[0].id, "2");
    }

    #[test]
    fn test_missing_release_date_loses() {
        let cards = vec![printing("9", "X", None), printing("1", "X", Some((1993, 8, 5)))];
        assert_eq!(latest_printings(&cards)[0].id, "1");
    }

    #[test]
    fn test_same_release_date_breaks_tie_by_id() {
        let cards = vec![
            printing("a", "X", Some((2021, 6, 1))),
            printing("c", "X", Some((2021, 6, 1))),
            printing("b", "X", Some((2021, 6, 1))),
        ];
        assert_eq!(latest_printings(&cards)[0].id, "c");
    }

    #[test]
    fn test_deleted_and_orphan_rows_are_skipped() {
        let mut deleted = printing("2", "X", Some((2024, 1, 1)));
        deleted.deleted_at = Some(Utc::now());
        let mut no_oracle = printing("3", "Y", None);
        no_oracle.oracle_id = None;

        let cards = vec![printing("1", "X", Some((2020, 1, 1))), deleted, no_oracle];
        let winners = latest_printings(&cards);
        assert_eq!(winners.len(), 1);
        assert_eq!(winners[0].id, "1");
    }

    #[test]
    fn test_output_is_ordered_by_logical_id() {
        let cards = vec![
            printing("1", "Z", None),
            printing("2", "A", None),
            printing("3", "M", None),
        ];
        let ids: Vec<_> = latest_printings(&cards)
            .into_iter()
            .filter_map(|c| c.oracle_id)
            .collect();
        assert_eq!(ids, vec!["A", "M", "Z"]);
    }
}
