//! Canonical store to graph store synchronization.
//!
//! [`GraphSyncWriter`] merges one batch of projections idempotently;
//! [`resync::ResyncOrchestrator`] pages the whole canonical store through it.

pub mod resync;

use std::sync::Arc;

use serde::Serialize;
use tracing::debug;

use synergy_core::store::GraphStore;
use synergy_core::{project, Card, CardProjection, SynergyResult};

pub use resync::{ResyncHandle, ResyncOrchestrator, ResyncProgress, ResyncReport};

/// Result of a sync operation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SyncResult {
    pub cards_merged: usize,
    pub attribute_links_merged: usize,
}

impl SyncResult {
    pub fn merge(&mut self, other: &SyncResult) {
        self.cards_merged += other.cards_merged;
        self.attribute_links_merged += other.attribute_links_merged;
    }
}

/// Project a page of canonical cards.
pub fn project_batch(cards: &[Card]) -> Vec<CardProjection> {
    cards.iter().map(project).collect()
}

/// Writes card projections into the graph store.
#[derive(Clone)]
pub struct GraphSyncWriter {
    graph: Arc<dyn GraphStore>,
}

impl GraphSyncWriter {
    pub fn new(graph: Arc<dyn GraphStore>) -> Self {
        Self { graph }
    }

    /// Merge a batch in one graph transaction.
    ///
    /// Card nodes are upserted by logical identity and their scalar
    /// properties overwritten; attribute nodes and edges are merged, never
    /// duplicated. Re-writing a batch leaves the graph unchanged. Edges a card
    /// no longer has are not removed.
    pub async fn write_batch(&self, batch: &[CardProjection]) -> SynergyResult<SyncResult> {
        if batch.is_empty() {
            return Ok(SyncResult::default());
        }

        self.graph.merge_batch(batch).await?;

        let result = SyncResult {
            cards_merged: batch.len(),
            attribute_links_merged: batch.iter().map(CardProjection::attribute_count).sum(),
        };
        debug!(
            cards = result.cards_merged,
            links = result.attribute_links_merged,
            "Batch merged into graph"
        );
        Ok(result)
    }
}
