//! Service start sequence: schema, parity, and a background resync when needed.

use tracing::{info, warn};

use synergy_core::config::GraphDialect;
use synergy_core::store::{CardStore, GraphStore};
use synergy_core::SynergyResult;

use crate::parity::{check_parity, ParityReport};
use crate::schema::{ensure_schema, SchemaReport};
use crate::sync::{ResyncHandle, ResyncOrchestrator};

/// What happened during startup.
pub struct StartupReport {
    pub schema: SchemaReport,
    pub parity: ParityReport,
    /// Set when parity failed and a background resync was started.
    pub resync: Option<ResyncHandle>,
}

/// Bring the graph store up to date with the canonical store.
///
/// Schema failures are tolerated. A parity check that cannot reach either
/// store fails startup. When counts disagree a resync is spawned and startup
/// returns without waiting for it.
pub async fn startup(
    cards: &dyn CardStore,
    graph: &dyn GraphStore,
    dialect: GraphDialect,
    orchestrator: &ResyncOrchestrator,
) -> SynergyResult<StartupReport> {
    let schema = ensure_schema(graph, dialect).await;
    let parity = check_parity(cards, graph).await?;

    let resync = if parity.in_sync {
        None
    } else {
        warn!(
            relational_count = parity.relational_count,
            graph_count = parity.graph_count,
            "Starting background graph resync"
        );
        Some(orchestrator.spawn()?)
    };

    info!(resync_started = resync.is_some(), "Startup sequence complete");
    Ok(StartupReport { schema, parity, resync })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use synergy_core::config::ResyncConfig;
    use synergy_core::memory::{InMemoryCardStore, InMemoryGraph};
    use synergy_core::{Card, SynergyError};

    fn store(n: usize) -> Arc<InMemoryCardStore> {
        Arc::new(InMemoryCardStore::new(
            (0..n)
                .map(|i| {
                    let mut card = Card::new(format!("p{}", i), format!("Card {}", i), "Artifact");
                    card.oracle_id = Some(format!("o{}", i));
                    card
                })
                .collect(),
        ))
    }

    #[tokio::test]
    async fn test_empty_graph_triggers_resync() {
        let cards = store(3);
        let graph = Arc::new(InMemoryGraph::new());
        let orchestrator =
            ResyncOrchestrator::new(cards.clone(), graph.clone(), &ResyncConfig::default());

        let report = startup(cards.as_ref(), graph.as_ref(), GraphDialect::Memgraph, &orchestrator)
            .await
            .unwrap();
        assert_eq!(report.schema.failed, 0);
        assert!(!report.parity.in_sync);

        let handle = report.resync.expect("resync should start");
        assert_eq!(handle.join().await.unwrap().synced, 3);
        assert!(check_parity(cards.as_ref(), graph.as_ref()).await.unwrap().in_sync);
    }

    #[tokio::test]
    async fn test_in_sync_skips_resync() {
        let cards = store(2);
        let graph = Arc::new(InMemoryGraph::new());
        let orchestrator =
            ResyncOrchestrator::new(cards.clone(), graph.clone(), &ResyncConfig::default());
        orchestrator.resync().await.unwrap();
        let merges = graph.merge_calls();

        let report = startup(cards.as_ref(), graph.as_ref(), GraphDialect::Neo4j, &orchestrator)
            .await
            .unwrap();
        assert!(report.parity.in_sync);
        assert!(report.resync.is_none());
        assert_eq!(graph.merge_calls(), merges);
    }

    #[tokio::test]
    async fn test_schema_failure_does_not_block_startup() {
        let cards = store(1);
        let graph = Arc::new(InMemoryGraph::new());
        graph.fail_statements_containing("CONSTRAINT");
        let orchestrator =
            ResyncOrchestrator::new(cards.clone(), graph.clone(), &ResyncConfig::default());

        let report = startup(cards.as_ref(), graph.as_ref(), GraphDialect::Memgraph, &orchestrator)
            .await
            .unwrap();
        assert_eq!(report.schema.failed, 1);
        if let Some(handle) = report.resync {
            handle.join().await.unwrap();
        }
    }

    #[tokio::test]
    async fn test_unreachable_store_fails_startup() {
        let cards = store(1);
        cards.set_unavailable(true);
        let graph = Arc::new(InMemoryGraph::new());
        let orchestrator =
            ResyncOrchestrator::new(cards.clone(), graph.clone(), &ResyncConfig::default());

        let err = startup(cards.as_ref(), graph.as_ref(), GraphDialect::Memgraph, &orchestrator)
            .await
            .err()
            .expect("startup should fail");
        assert!(matches!(err, SynergyError::Connection(_)));
    }
}
