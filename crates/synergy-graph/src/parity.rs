//! Count parity between the canonical store and the graph store.

use serde::Serialize;
use tracing::{info, warn};

use synergy_core::store::{CardStore, GraphStore};
use synergy_core::SynergyResult;

/// Logical card count on each side.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ParityReport {
    pub relational_count: u64,
    pub graph_count: u64,
    pub in_sync: bool,
}

impl ParityReport {
    /// An empty graph is never in sync, even against an empty canonical store.
    pub fn new(relational_count: u64, graph_count: u64) -> Self {
        Self {
            relational_count,
            graph_count,
            in_sync: relational_count == graph_count && graph_count != 0,
        }
    }
}

/// Compare distinct live logical cards against Card nodes.
///
/// Only counts are compared; content drift is not detected.
pub async fn check_parity(
    cards: &dyn CardStore,
    graph: &dyn GraphStore,
) -> SynergyResult<ParityReport> {
    let (relational_count, graph_count) =
        tokio::try_join!(cards.count_logical_cards(), graph.card_node_count())?;
    let report = ParityReport::new(relational_count, graph_count);

    if report.in_sync {
        info!(cards = relational_count, "Graph store is in sync with canonical store");
    } else {
        warn!(relational_count, graph_count, "Graph store is out of sync with canonical store");
    }
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use synergy_core::memory::{InMemoryCardStore, InMemoryGraph};
    use synergy_core::{project, Card, SynergyError};

    fn card(id: &str, oracle: &str) -> Card {
        let mut card = Card::new(id, id, "Instant");
        card.oracle_id = Some(oracle.to_string());
        card
    }

    #[test]
    fn test_in_sync_rule() {
        assert!(ParityReport::new(3, 3).in_sync);
        assert!(!ParityReport::new(0, 0).in_sync);
        assert!(!ParityReport::new(3, 2).in_sync);
        assert!(!ParityReport::new(2, 3).in_sync);
    }

    #[tokio::test]
    async fn test_matching_counts() {
        let printings = vec![card("1", "X"), card("2", "X"), card("3", "Z")];
        let store = InMemoryCardStore::new(printings.clone());
        let graph = InMemoryGraph::new();
        graph
            .merge_batch(&[project(&printings[1]), project(&printings[2])])
            .await
            .unwrap();

        let report = check_parity(&store, &graph).await.unwrap();
        assert_eq!(report, ParityReport { relational_count: 2, graph_count: 2, in_sync: true });
    }

    #[tokio::test]
    async fn test_empty_graph_needs_resync() {
        let store = InMemoryCardStore::new(vec![card("1", "X")]);
        let report = check_parity(&store, &InMemoryGraph::new()).await.unwrap();
        assert_eq!(report.relational_count, 1);
        assert!(!report.in_sync);
    }

    #[tokio::test]
    async fn test_unreachable_store_is_an_error() {
        let store = InMemoryCardStore::new(Vec::new());
        store.set_unavailable(true);
        let err = check_parity(&store, &InMemoryGraph::new()).await.unwrap_err();
        assert!(matches!(err, SynergyError::Connection(_)));
    }
}
