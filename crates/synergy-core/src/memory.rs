//! In-memory implementations of the store traits.
//!
//! These mirror the semantics of the Postgres and Bolt stores closely enough
//! to exercise every component without a running database: dedup by logical
//! identity, idempotent merges, shared-attribute ranking. Trigram similarity
//! is approximated by case-insensitive substring containment. Failures and
//! latency can be injected per call.

use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;

use crate::card::latest_printings;
use crate::card::model::Card;
use crate::error::{SynergyError, SynergyResult};
use crate::projection::{AttributeKind, CardProjection};
use crate::store::{CardStore, GraphStore, NameQuery, RankedCandidate, RulesTextQuery};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// In-memory canonical store.
#[derive(Default)]
pub struct InMemoryCardStore {
    cards: Mutex<Vec<Card>>,
    failing_texts: Mutex<HashSet<String>>,
    page_delay: Mutex<Option<Duration>>,
    unavailable: AtomicBool,
}

impl InMemoryCardStore {
    pub fn new(cards: Vec<Card>) -> Self {
        Self {
            cards: Mutex::new(cards),
            ..Default::default()
        }
    }

    /// Make every rules-text search for `text` fail.
    pub fn fail_rules_text(&self, text: impl Into<String>) {
        lock(&self.failing_texts).insert(text.into());
    }

    /// Sleep this long inside every canonical page read.
    pub fn set_page_delay(&self, delay: Duration) {
        *lock(&self.page_delay) = Some(delay);
    }

    /// Make every call fail as if the store were unreachable.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    fn check_available(&self) -> SynergyResult<()> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(SynergyError::Connection(
                "in-memory card store marked unavailable".to_string(),
            ));
        }
        Ok(())
    }

    fn live(&self) -> Vec<Card> {
        lock(&self.cards).iter().filter(|c| !c.is_deleted()).cloned().collect()
    }
}

fn contains_ci(haystack: &str, needle: &str) -> bool {
    haystack.to_lowercase().contains(&needle.to_lowercase())
}

#[async_trait]
impl CardStore for InMemoryCardStore {
    async fn count_logical_cards(&self) -> SynergyResult<u64> {
        self.check_available()?;
        let cards = lock(&self.cards);
        let distinct: BTreeSet<&str> = cards
            .iter()
            .filter(|c| !c.is_deleted())
            .filter_map(Card::logical_id)
            .collect();
        Ok(distinct.len() as u64)
    }

    async fn canonical_page(&self, offset: u64, limit: u64) -> SynergyResult<Vec<Card>> {
        self.check_available()?;
        let delay = *lock(&self.page_delay);
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        let cards = lock(&self.cards);
        Ok(latest_printings(cards.iter())
            .into_iter()
            .skip(offset as usize)
            .take(limit as usize)
            .collect())
    }

    async fn cards_by_logical_ids(&self, ids: &[String]) -> SynergyResult<Vec<Card>> {
        self.check_available()?;
        let wanted: HashSet<&str> = ids.iter().map(String::as_str).collect();
        let cards = lock(&self.cards);
        let matching = cards
            .iter()
            .filter(|c| c.logical_id().is_some_and(|id| wanted.contains(id)));
        // Reverse so callers cannot rely on the request order surviving.
        let mut winners = latest_printings(matching);
        winners.reverse();
        Ok(winners)
    }

    async fn similar_rules_text(&self, query: &RulesTextQuery) -> SynergyResult<Vec<Card>> {
        self.check_available()?;
        if lock(&self.failing_texts).contains(&query.text) {
            return Err(SynergyError::relational(
                "similar rules text",
                format!("injected failure for {:?}", query.text),
            ));
        }
        let mut seen = HashSet::new();
        Ok(self
            .live()
            .into_iter()
            .filter(|c| c.name != query.exclude_name && c.lang == query.language)
            .filter(Card::is_gameplay_card)
            .filter(|c| c.oracle_text.as_deref().is_some_and(|t| contains_ci(t, &query.text)))
            .filter(|c| seen.insert(c.name.clone()))
            .take(query.limit)
            .collect())
    }

    async fn fuzzy_name_search(&self, query: &NameQuery) -> SynergyResult<Vec<Card>> {
        self.check_available()?;
        let mut seen = HashSet::new();
        Ok(self
            .live()
            .into_iter()
            .filter(|c| c.lang == query.language && contains_ci(&c.name, &query.name))
            .filter(|c| seen.insert(c.name.clone()))
            .take(query.limit)
            .collect())
    }

    async fn card_by_id(&self, id: &str) -> SynergyResult<Option<Card>> {
        self.check_available()?;
        Ok(self.live().into_iter().find(|c| c.id == id))
    }

    async fn card_by_name(&self, name: &str) -> SynergyResult<Option<Card>> {
        self.check_available()?;
        Ok(self.live().into_iter().find(|c| c.name == name))
    }

    async fn variants(
        &self,
        oracle_id: &str,
        exclude_id: &str,
        language: &str,
    ) -> SynergyResult<Vec<Card>> {
        self.check_available()?;
        Ok(self
            .live()
            .into_iter()
            .filter(|c| c.logical_id() == Some(oracle_id) && c.id != exclude_id)
            .filter(|c| c.lang == language)
            .collect())
    }

    async fn random_card(&self, language: &str) -> SynergyResult<Option<Card>> {
        self.check_available()?;
        Ok(self.live().into_iter().find(|c| c.lang == language))
    }
}

#[derive(Debug, Clone, PartialEq)]
struct CardNode {
    printing_id: String,
    name: String,
    cmc: f64,
}

#[derive(Default)]
struct GraphState {
    cards: BTreeMap<String, CardNode>,
    attributes: BTreeSet<(AttributeKind, String)>,
    edges: BTreeSet<(String, AttributeKind, String)>,
    schema: Vec<String>,
}

/// In-memory synergy graph.
#[derive(Default)]
pub struct InMemoryGraph {
    state: Mutex<GraphState>,
    failing_ids: Mutex<HashSet<String>>,
    failing_statements: Mutex<Vec<String>>,
    merge_delay: Mutex<Option<Duration>>,
    merge_calls: AtomicUsize,
}

impl InMemoryGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail any batch that contains a projection with this logical identity.
    pub fn fail_batches_containing(&self, id: impl Into<String>) {
        lock(&self.failing_ids).insert(id.into());
    }

    /// Fail any schema statement containing this fragment.
    pub fn fail_statements_containing(&self, fragment: impl Into<String>) {
        lock(&self.failing_statements).push(fragment.into());
    }

    /// Sleep this long inside every merge before applying it.
    pub fn set_merge_delay(&self, delay: Duration) {
        *lock(&self.merge_delay) = Some(delay);
    }

    pub fn merge_calls(&self) -> usize {
        self.merge_calls.load(Ordering::SeqCst)
    }

    /// Card plus attribute nodes.
    pub fn node_count(&self) -> usize {
        let state = lock(&self.state);
        state.cards.len() + state.attributes.len()
    }

    pub fn edge_count(&self) -> usize {
        lock(&self.state).edges.len()
    }

    /// Printing id stored on a Card node.
    pub fn printing_of(&self, id: &str) -> Option<String> {
        lock(&self.state).cards.get(id).map(|n| n.printing_id.clone())
    }

    pub fn card_name(&self, id: &str) -> Option<String> {
        lock(&self.state).cards.get(id).map(|n| n.name.clone())
    }

    pub fn card_cmc(&self, id: &str) -> Option<f64> {
        lock(&self.state).cards.get(id).map(|n| n.cmc)
    }

    pub fn applied_statements(&self) -> Vec<String> {
        lock(&self.state).schema.clone()
    }
}

#[async_trait]
impl GraphStore for InMemoryGraph {
    async fn run_schema_statement(&self, statement: &str) -> SynergyResult<()> {
        if lock(&self.failing_statements).iter().any(|f| statement.contains(f.as_str())) {
            return Err(SynergyError::graph("schema statement", "injected failure"));
        }
        let mut state = lock(&self.state);
        if !state.schema.iter().any(|s| s == statement) {
            state.schema.push(statement.to_string());
        }
        Ok(())
    }

    async fn merge_batch(&self, batch: &[CardProjection]) -> SynergyResult<()> {
        self.merge_calls.fetch_add(1, Ordering::SeqCst);

        let delay = *lock(&self.merge_delay);
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        {
            let failing = lock(&self.failing_ids);
            if let Some(bad) = batch.iter().find(|p| failing.contains(&p.id)) {
                let message = format!("injected failure for {}", bad.id);
                return Err(SynergyError::graph("merge batch", message));
            }
        }

        // Nothing is applied until the whole batch is known to succeed.
        let mut state = lock(&self.state);
        for projection in batch {
            state.cards.insert(
                projection.id.clone(),
                CardNode {
                    printing_id: projection.printing_id.clone(),
                    name: projection.name.clone(),
                    cmc: projection.cmc,
                },
            );
            for (kind, value) in projection.attributes() {
                state.attributes.insert((kind, value.to_string()));
                state.edges.insert((projection.id.clone(), kind, value.to_string()));
            }
        }
        Ok(())
    }

    async fn card_node_count(&self) -> SynergyResult<u64> {
        Ok(lock(&self.state).cards.len() as u64)
    }

    async fn shared_attribute_candidates(
        &self,
        id: &str,
        limit: usize,
    ) -> SynergyResult<Vec<RankedCandidate>> {
        let state = lock(&self.state);
        let source: BTreeSet<(AttributeKind, &str)> = state
            .edges
            .iter()
            .filter(|(card, _, _)| card == id)
            .map(|(_, kind, value)| (*kind, value.as_str()))
            .collect();

        let mut shared: BTreeMap<&str, u64> = BTreeMap::new();
        for (card, kind, value) in &state.edges {
            if card != id && source.contains(&(*kind, value.as_str())) {
                *shared.entry(card.as_str()).or_default() += 1;
            }
        }

        let mut ranked: Vec<RankedCandidate> = shared
            .into_iter()
            .map(|(id, shared)| RankedCandidate { id: id.to_string(), shared })
            .collect();
        ranked.sort_by(|a, b| b.shared.cmp(&a.shared).then_with(|| a.id.cmp(&b.id)));
        ranked.truncate(limit);
        Ok(ranked)
    }
}
