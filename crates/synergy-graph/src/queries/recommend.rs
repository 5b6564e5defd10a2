//! Shared-attribute recommendations.
//!
//! Candidates are ranked in the graph by how many distinct Type, Keyword and
//! Mechanic nodes they share with the source card, then hydrated from the
//! canonical store and put back into rank order.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::debug;

use synergy_core::config::RecommendConfig;
use synergy_core::store::{CardStore, GraphStore};
use synergy_core::{Card, SynergyResult};

/// Recommends cards that share attributes with a given card.
#[derive(Clone)]
pub struct RecommendationEngine {
    graph: Arc<dyn GraphStore>,
    cards: Arc<dyn CardStore>,
    limit: usize,
}

impl RecommendationEngine {
    pub fn new(
        graph: Arc<dyn GraphStore>,
        cards: Arc<dyn CardStore>,
        config: &RecommendConfig,
    ) -> Self {
        Self {
            graph,
            cards,
            limit: config.limit,
        }
    }

    /// Up to `limit` cards ranked by shared attribute count, descending.
    ///
    /// A source card missing from the graph yields an empty list. Candidates
    /// the canonical store no longer has are dropped.
    pub async fn recommend(&self, logical_id: &str) -> SynergyResult<Vec<Card>> {
        let ranked = self.graph.shared_attribute_candidates(logical_id, self.limit).await?;
        if ranked.is_empty() {
            debug!(logical_id, "No shared-attribute candidates");
            return Ok(Vec::new());
        }

        let ids: Vec<String> = ranked.into_iter().map(|c| c.id).collect();
        let hydrated = self.cards.cards_by_logical_ids(&ids).await?;
        debug!(
            logical_id,
            ranked = ids.len(),
            hydrated = hydrated.len(),
            "Hydrated recommendations"
        );
        Ok(order_by_rank(&ids, hydrated))
    }
}

/// Reorder hydrated cards to follow `ranked_ids`.
///
/// Cards whose logical identity is not ranked are discarded.
pub fn order_by_rank(ranked_ids: &[String], cards: Vec<Card>) -> Vec<Card> {
    let mut by_id: HashMap<String, Card> = cards
        .into_iter()
        .filter_map(|card| card.oracle_id.clone().map(|id| (id, card)))
        .collect();
    ranked_ids.iter().filter_map(|id| by_id.remove(id)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use synergy_core::memory::{InMemoryCardStore, InMemoryGraph};
    use synergy_core::CardProjection;

    fn card(oracle: &str) -> Card {
        let mut card = Card::new(format!("p-{}", oracle), oracle, "Creature");
        card.oracle_id = Some(oracle.to_string());
        card
    }

    fn node(id: &str, types: &[&str], keywords: &[&str], mechanics: &[&str]) -> CardProjection {
        let owned = |items: &[&str]| items.iter().map(|s| s.to_string()).collect::<Vec<_>>();
        CardProjection {
            id: id.to_string(),
            printing_id: format!("p-{}", id),
            name: id.to_string(),
            cmc: 1.0,
            types: owned(types),
            keywords: owned(keywords),
            mechanics: owned(mechanics),
        }
    }

    async fn engine(limit: usize) -> RecommendationEngine {
        // S shares 1 attribute with A, 3 with B, 2 with C.
        let graph = Arc::new(InMemoryGraph::new());
        graph
            .merge_batch(&[
                node("S", &["Creature", "Elf"], &["Flying"], &["draw"]),
                node("A", &["Creature"], &[], &[]),
                node("B", &["Creature", "Elf"], &["Flying"], &[]),
                node("C", &["Elf"], &[], &["draw"]),
                node("D", &["Sorcery"], &[], &[]),
            ])
            .await
            .unwrap();
        let cards = Arc::new(InMemoryCardStore::new(
            ["S", "A", "B", "C", "D"].into_iter().map(card).collect(),
        ));
        RecommendationEngine::new(graph, cards, &RecommendConfig { limit })
    }

    fn ids(cards: &[Card]) -> Vec<&str> {
        cards.iter().filter_map(Card::logical_id).collect()
    }

    #[tokio::test]
    async fn test_rank_order_survives_hydration() {
        let found = engine(10).await.recommend("S").await.unwrap();
        assert_eq!(ids(&found), vec!["B", "C", "A"]);
    }

    #[tokio::test]
    async fn test_limit_applies_before_hydration() {
        let found = engine(2).await.recommend("S").await.unwrap();
        assert_eq!(ids(&found), vec!["B", "C"]);
    }

    #[tokio::test]
    async fn test_unknown_source_is_empty() {
        assert!(engine(10).await.recommend("missing").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_isolated_card_is_empty() {
        assert!(engine(10).await.recommend("D").await.unwrap().is_empty());
    }

    #[test]
    fn test_order_by_rank_drops_unranked_and_missing() {
        let ranked = vec!["B".to_string(), "gone".to_string(), "A".to_string()];
        let ordered = order_by_rank(&ranked, vec![card("A"), card("Z"), card("B")]);
        assert_eq!(ids(&ordered), vec!["B", "A"]);
    }
}
