//! Full resync of the graph store from the canonical store.
//!
//! Pages through one representative printing per logical card, projects each
//! page, and merges it as a single graph transaction. Batches run strictly in
//! sequence; only one resync may run per orchestrator at a time.

use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::Serialize;
use tokio::sync::{watch, Mutex, OwnedMutexGuard};
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use synergy_core::config::ResyncConfig;
use synergy_core::store::{CardStore, GraphStore};
use synergy_core::{SynergyError, SynergyResult};

use super::{project_batch, GraphSyncWriter, SyncResult};

/// Snapshot of a running resync.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ResyncProgress {
    pub synced: u64,
    pub total: u64,
    pub batches: u64,
}

/// Outcome of a completed resync.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ResyncReport {
    pub total: u64,
    pub synced: u64,
    pub batches: u64,
    pub result: SyncResult,
    pub elapsed: Duration,
}

/// Drives a full canonical-to-graph resync.
#[derive(Clone)]
pub struct ResyncOrchestrator {
    cards: Arc<dyn CardStore>,
    writer: GraphSyncWriter,
    batch_size: u64,
    batch_timeout: Duration,
    in_flight: Arc<Mutex<()>>,
}

impl ResyncOrchestrator {
    pub fn new(
        cards: Arc<dyn CardStore>,
        graph: Arc<dyn GraphStore>,
        config: &ResyncConfig,
    ) -> Self {
        Self {
            cards,
            writer: GraphSyncWriter::new(graph),
            batch_size: config.batch_size.max(1),
            batch_timeout: config.batch_timeout(),
            in_flight: Arc::new(Mutex::new(())),
        }
    }

    /// Override the deadline applied to each canonical read and batch write.
    pub fn with_batch_timeout(mut self, timeout: Duration) -> Self {
        self.batch_timeout = timeout;
        self
    }

    /// Whether a resync is currently running.
    pub fn is_running(&self) -> bool {
        self.in_flight.try_lock().is_err()
    }

    fn acquire(&self) -> SynergyResult<OwnedMutexGuard<()>> {
        Arc::clone(&self.in_flight)
            .try_lock_owned()
            .map_err(|_| SynergyError::ResyncInProgress)
    }

    /// Run a full resync to completion.
    ///
    /// Fails with [`SynergyError::ResyncInProgress`] if another resync holds
    /// this orchestrator. The first failing batch aborts the run; batches
    /// already committed stay in the graph.
    pub async fn resync(&self) -> SynergyResult<ResyncReport> {
        let _guard = self.acquire()?;
        let (progress, _) = watch::channel(ResyncProgress::default());
        self.run(&progress).await
    }

    /// Start a resync on a background task.
    ///
    /// The single-flight guard is taken before this returns, so a second call
    /// while the first is running fails immediately. Must be called from
    /// within a Tokio runtime.
    pub fn spawn(&self) -> SynergyResult<ResyncHandle> {
        let guard = self.acquire()?;
        let (progress_tx, progress_rx) = watch::channel(ResyncProgress::default());
        let this = self.clone();

        let task = tokio::spawn(async move {
            let _guard = guard;
            let result = this.run(&progress_tx).await;
            if let Err(e) = &result {
                error!(error = %e, "Background graph resync failed");
            }
            result
        });

        Ok(ResyncHandle {
            task,
            progress: progress_rx,
        })
    }

    async fn run(&self, progress: &watch::Sender<ResyncProgress>) -> SynergyResult<ResyncReport> {
        let started = Instant::now();
        let total = self.within_deadline(0, self.cards.count_logical_cards()).await?;
        info!(total, batch_size = self.batch_size, "Starting graph resync");
        progress.send_replace(ResyncProgress { synced: 0, total, batches: 0 });

        let mut report = ResyncReport {
            total,
            ..Default::default()
        };
        let mut offset = 0u64;

        while offset < total {
            let page = self
                .within_deadline(offset, self.cards.canonical_page(offset, self.batch_size))
                .await
                .map_err(|e| batch_failed(offset, e))?;

            if page.is_empty() {
                warn!(offset, total, "Canonical store ran out of cards before the counted total");
                break;
            }

            let projections = project_batch(&page);
            let written = self
                .within_deadline(offset, self.writer.write_batch(&projections))
                .await
                .map_err(|e| batch_failed(offset, e))?;

            report.result.merge(&written);
            report.synced += page.len() as u64;
            report.batches += 1;
            offset += self.batch_size;

            progress.send_replace(ResyncProgress {
                synced: report.synced,
                total,
                batches: report.batches,
            });
            info!("Synced {}/{} unique cards to graph", report.synced, total);
        }

        report.elapsed = started.elapsed();
        info!(
            synced = report.synced,
            batches = report.batches,
            links = report.result.attribute_links_merged,
            elapsed_ms = report.elapsed.as_millis() as u64,
            "Graph resync complete"
        );
        Ok(report)
    }

    /// Bound one store round trip by the batch deadline.
    async fn within_deadline<T>(
        &self,
        offset: u64,
        call: impl Future<Output = SynergyResult<T>>,
    ) -> SynergyResult<T> {
        tokio::time::timeout(self.batch_timeout, call)
            .await
            .map_err(|_| SynergyError::BatchTimedOut {
                offset,
                timeout: self.batch_timeout,
            })?
    }
}

fn batch_failed(offset: u64, source: SynergyError) -> SynergyError {
    if matches!(source, SynergyError::BatchTimedOut { .. }) {
        return source;
    }
    SynergyError::BatchFailed {
        offset,
        source: Box::new(source),
    }
}

/// Handle to a resync running on a background task.
pub struct ResyncHandle {
    task: JoinHandle<SynergyResult<ResyncReport>>,
    progress: watch::Receiver<ResyncProgress>,
}

impl ResyncHandle {
    /// Latest progress snapshot.
    pub fn progress(&self) -> ResyncProgress {
        *self.progress.borrow()
    }

    /// A receiver that is notified on every committed batch.
    pub fn subscribe(&self) -> watch::Receiver<ResyncProgress> {
        self.progress.clone()
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Cancel the resync. Batches already committed stay in the graph.
    pub fn abort(&self) {
        self.task.abort();
    }

    /// Wait for the resync to finish.
    pub async fn join(self) -> SynergyResult<ResyncReport> {
        match self.task.await {
            Ok(result) => result,
            Err(e) if e.is_cancelled() => {
                Err(SynergyError::Task("resync was cancelled".to_string()))
            }
            Err(e) => Err(SynergyError::Task(format!("resync panicked: {}", e))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use synergy_core::memory::{InMemoryCardStore, InMemoryGraph};
    use synergy_core::Card;

    fn printing(id: &str, oracle: &str, name: &str, released: (i32, u32, u32)) -> Card {
        let mut card = Card::new(id, name, "Instant");
        card.oracle_id = Some(oracle.to_string());
        card.released_at = NaiveDate::from_ymd_opt(released.0, released.1, released.2);
        card.oracle_text = Some("Draw a card.".to_string());
        card
    }

    fn distinct_cards(n: usize) -> Vec<Card> {
        (1..=n)
            .map(|i| {
                let (id, oracle) = (format!("p{}", i), format!("o{}", i));
                printing(&id, &oracle, &format!("Card {}", i), (2020, 1, 1))
            })
            .collect()
    }

    fn orchestrator(cards: Vec<Card>, batch_size: u64) -> (Arc<InMemoryGraph>, ResyncOrchestrator) {
        let store = Arc::new(InMemoryCardStore::new(cards));
        let graph = Arc::new(InMemoryGraph::new());
        let config = ResyncConfig {
            batch_size,
            ..ResyncConfig::default()
        };
        (graph.clone(), ResyncOrchestrator::new(store, graph, &config))
    }

    #[tokio::test]
    async fn test_latest_printing_wins() {
        let mut deleted = printing("p9", "Y", "Gone", (2021, 1, 1));
        deleted.deleted_at = Some(chrono::Utc::now());
        let (graph, orchestrator) = orchestrator(
            vec![
                printing("1", "X", "Bolt", (2010, 1, 1)),
                printing("2", "X", "Bolt", (2020, 1, 1)),
                deleted,
            ],
            1000,
        );

        let report = orchestrator.resync().await.unwrap();
        assert_eq!(report.total, 1);
        assert_eq!(report.synced, 1);
        assert_eq!(graph.card_node_count().await.unwrap(), 1);
        assert_eq!(graph.printing_of("X").as_deref(), Some("2"));
        assert!(graph.printing_of("Y").is_none());
    }

    #[tokio::test]
    async fn test_pages_through_every_card() {
        let (graph, orchestrator) = orchestrator(distinct_cards(5), 2);
        let report = orchestrator.resync().await.unwrap();
        assert_eq!(report.batches, 3);
        assert_eq!(report.synced, 5);
        assert_eq!(report.result.cards_merged, 5);
        assert_eq!(graph.merge_calls(), 3);
        assert_eq!(graph.card_node_count().await.unwrap(), 5);
    }

    #[tokio::test]
    async fn test_resync_twice_is_stable() {
        let (graph, orchestrator) = orchestrator(distinct_cards(4), 3);
        orchestrator.resync().await.unwrap();
        let nodes = graph.node_count();
        let edges = graph.edge_count();
        orchestrator.resync().await.unwrap();
        assert_eq!(graph.node_count(), nodes);
        assert_eq!(graph.edge_count(), edges);
    }

    #[tokio::test]
    async fn test_empty_store_is_noop() {
        let (graph, orchestrator) = orchestrator(Vec::new(), 10);
        let report = orchestrator.resync().await.unwrap();
        assert_eq!(report.batches, 0);
        assert_eq!(graph.merge_calls(), 0);
    }

    #[tokio::test]
    async fn test_failing_batch_aborts_run() {
        let (graph, orchestrator) = orchestrator(distinct_cards(5), 2);
        graph.fail_batches_containing("o3");

        let err = orchestrator.resync().await.unwrap_err();
        match err {
            SynergyError::BatchFailed { offset, source } => {
                assert_eq!(offset, 2);
                assert!(matches!(*source, SynergyError::Graph { .. }));
            }
            other => panic!("unexpected error: {:?}", other),
        }
        // First batch stays committed; nothing after the failure runs.
        assert_eq!(graph.card_node_count().await.unwrap(), 2);
        assert_eq!(graph.merge_calls(), 2);
    }

    #[tokio::test]
    async fn test_unreachable_canonical_store() {
        let store = Arc::new(InMemoryCardStore::new(distinct_cards(2)));
        store.set_unavailable(true);
        let graph = Arc::new(InMemoryGraph::new());
        let orchestrator = ResyncOrchestrator::new(store, graph, &ResyncConfig::default());
        assert!(matches!(orchestrator.resync().await, Err(SynergyError::Connection(_))));
    }

    #[tokio::test]
    async fn test_slow_batch_times_out() {
        let (graph, orchestrator) = orchestrator(distinct_cards(3), 10);
        graph.set_merge_delay(Duration::from_secs(5));
        let orchestrator = orchestrator.with_batch_timeout(Duration::from_millis(50));

        let err = orchestrator.resync().await.unwrap_err();
        assert!(matches!(err, SynergyError::BatchTimedOut { offset: 0, .. }));
        assert_eq!(graph.card_node_count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_slow_page_fetch_times_out() {
        let store = Arc::new(InMemoryCardStore::new(distinct_cards(3)));
        store.set_page_delay(Duration::from_secs(5));
        let graph = Arc::new(InMemoryGraph::new());
        let orchestrator = ResyncOrchestrator::new(store, graph.clone(), &ResyncConfig::default())
            .with_batch_timeout(Duration::from_millis(50));

        let err = orchestrator.resync().await.unwrap_err();
        assert!(matches!(err, SynergyError::BatchTimedOut { offset: 0, .. }));
        assert_eq!(graph.merge_calls(), 0);
        assert!(!orchestrator.is_running());
    }

    #[tokio::test]
    async fn test_overlapping_resync_is_rejected() {
        let (graph, orchestrator) = orchestrator(distinct_cards(3), 1);
        graph.set_merge_delay(Duration::from_millis(100));

        let handle = orchestrator.spawn().unwrap();
        assert!(orchestrator.is_running());
        assert!(matches!(orchestrator.resync().await, Err(SynergyError::ResyncInProgress)));
        assert!(matches!(orchestrator.spawn(), Err(SynergyError::ResyncInProgress)));

        let report = handle.join().await.unwrap();
        assert_eq!(report.synced, 3);
        assert!(!orchestrator.is_running());
        assert!(orchestrator.resync().await.is_ok());
    }

    #[tokio::test]
    async fn test_spawned_resync_reports_progress() {
        let (_graph, orchestrator) = orchestrator(distinct_cards(4), 3);
        let handle = orchestrator.spawn().unwrap();
        let progress = handle.subscribe();

        handle.join().await.unwrap();
        assert_eq!(*progress.borrow(), ResyncProgress { synced: 4, total: 4, batches: 2 });
    }

    #[tokio::test]
    async fn test_abort_releases_guard() {
        let (graph, orchestrator) = orchestrator(distinct_cards(2), 1);
        graph.set_merge_delay(Duration::from_secs(5));

        let handle = orchestrator.spawn().unwrap();
        handle.abort();
        assert!(matches!(handle.join().await, Err(SynergyError::Task(_))));
        assert!(!orchestrator.is_running());
    }
}
