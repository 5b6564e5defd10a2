//! Concurrent fuzzy search over the canonical store.
//!
//! One task per query string, bounded by a semaphore, each recording into a
//! shared accumulator. All tasks are joined before the merged result is
//! returned; there is no early exit on first success.

use std::sync::Arc;

use tokio::sync::{Mutex, Semaphore};
use tokio::task::JoinSet;
use tracing::{debug, warn};

use synergy_core::config::SearchConfig;
use synergy_core::store::{CardStore, NameQuery, RulesTextQuery};
use synergy_core::{Card, SynergyError, SynergyResult};

/// Results gathered from the fan-out tasks.
#[derive(Default)]
struct Accumulator {
    cards: Vec<Card>,
    succeeded: usize,
    failed: usize,
    last_error: Option<SynergyError>,
}

impl Accumulator {
    fn record(&mut self, text: &str, result: SynergyResult<Vec<Card>>) {
        match result {
            Ok(cards) => {
                debug!(query = text, hits = cards.len(), "Fuzzy query finished");
                self.succeeded += 1;
                self.cards.extend(cards);
            }
            Err(e) => self.record_error(e),
        }
    }

    fn record_error(&mut self, error: SynergyError) {
        self.failed += 1;
        self.last_error = Some(error);
    }

    fn into_result(self, attempted: usize) -> SynergyResult<Vec<Card>> {
        match self.last_error {
            Some(last) if self.succeeded == 0 => Err(SynergyError::AllQueriesFailed {
                attempted,
                last: Box::new(last),
            }),
            Some(last) => {
                warn!(
                    failed = self.failed,
                    succeeded = self.succeeded,
                    error = %last,
                    "Some fuzzy queries failed"
                );
                Ok(self.cards)
            }
            None => Ok(self.cards),
        }
    }
}

/// Fuzzy card search over a [`CardStore`].
#[derive(Clone)]
pub struct FuzzySearch {
    store: Arc<dyn CardStore>,
    config: SearchConfig,
}

impl FuzzySearch {
    pub fn new(store: Arc<dyn CardStore>, config: SearchConfig) -> Self {
        Self { store, config }
    }

    /// Find cards whose rules text resembles any of `query_texts`.
    ///
    /// Cards named `exclude_name` are skipped. Results are the unordered
    /// union of every successful query; the same card may appear once per
    /// query that matched it. Fails only when every query failed.
    pub async fn search(
        &self,
        exclude_name: &str,
        query_texts: &[String],
    ) -> SynergyResult<Vec<Card>> {
        if query_texts.is_empty() {
            return Ok(Vec::new());
        }

        let accumulator = Arc::new(Mutex::new(Accumulator::default()));
        let permits = Arc::new(Semaphore::new(self.config.max_concurrent_queries.max(1)));
        let mut tasks = JoinSet::new();

        for text in query_texts {
            let store = Arc::clone(&self.store);
            let accumulator = Arc::clone(&accumulator);
            let permits = Arc::clone(&permits);
            let query = RulesTextQuery {
                exclude_name: exclude_name.to_string(),
                text: text.clone(),
                threshold: self.config.rules_similarity,
                limit: self.config.per_query_limit,
                language: self.config.language.clone(),
            };

            tasks.spawn(async move {
                let Ok(_permit) = permits.acquire_owned().await else {
                    accumulator
                        .lock()
                        .await
                        .record_error(SynergyError::Task("search semaphore closed".to_string()));
                    return;
                };
                let result = store.similar_rules_text(&query).await;
                accumulator.lock().await.record(&query.text, result);
            });
        }

        while let Some(joined) = tasks.join_next().await {
            if let Err(e) = joined {
                accumulator.lock().await.record_error(SynergyError::Task(e.to_string()));
            }
        }

        let gathered = std::mem::take(&mut *accumulator.lock().await);
        gathered.into_result(query_texts.len())
    }

    /// Cards with names similar to `name`, best match first.
    pub async fn search_names(&self, name: &str) -> SynergyResult<Vec<Card>> {
        let query = NameQuery {
            name: name.to_string(),
            threshold: self.config.name_similarity,
            limit: self.config.name_limit,
            language: self.config.language.clone(),
        };
        self.store.fuzzy_name_search(&query).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use synergy_core::memory::InMemoryCardStore;

    fn card(id: &str, name: &str, text: &str) -> Card {
        let mut card = Card::new(id, name, "Instant");
        card.oracle_id = Some(format!("o-{}", id));
        card.oracle_text = Some(text.to_string());
        card
    }

    fn store() -> Arc<InMemoryCardStore> {
        Arc::new(InMemoryCardStore::new(vec![
            card("1", "Lightning Bolt", "Lightning Bolt deals 3 damage to any target."),
            card("2", "Shock", "Shock deals 2 damage to any target."),
            card("3", "Divination", "Draw two cards."),
            card("4", "Healing Salve", "You gain 3 life."),
        ]))
    }

    fn search(store: Arc<InMemoryCardStore>) -> FuzzySearch {
        FuzzySearch::new(store, SearchConfig::default())
    }

    fn texts(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    fn names(mut cards: Vec<Card>) -> Vec<String> {
        cards.sort_by(|a, b| a.name.cmp(&b.name));
        cards.into_iter().map(|c| c.name).collect()
    }

    #[tokio::test]
    async fn test_union_of_all_queries() {
        let found = search(store())
            .search("Nothing", &texts(&["damage to any target", "draw two"]))
            .await
            .unwrap();
        assert_eq!(names(found), vec!["Divination", "Lightning Bolt", "Shock"]);
    }

    #[tokio::test]
    async fn test_excludes_named_card() {
        let found = search(store())
            .search("Lightning Bolt", &texts(&["damage to any target"]))
            .await
            .unwrap();
        assert_eq!(names(found), vec!["Shock"]);
    }

    #[tokio::test]
    async fn test_one_failure_is_tolerated() {
        let store = store();
        store.fail_rules_text("draw two");
        let found = search(store)
            .search("Nothing", &texts(&["damage to any target", "draw two", "gain 3 life"]))
            .await
            .unwrap();
        assert_eq!(names(found), vec!["Healing Salve", "Lightning Bolt", "Shock"]);
    }

    #[tokio::test]
    async fn test_all_failures_return_error() {
        let store = store();
        for text in ["a", "b", "c"] {
            store.fail_rules_text(text);
        }
        let err = search(store)
            .search("Nothing", &texts(&["a", "b", "c"]))
            .await
            .unwrap_err();
        assert!(matches!(err, SynergyError::AllQueriesFailed { attempted: 3, .. }));
    }

    #[tokio::test]
    async fn test_duplicates_across_queries_are_kept() {
        let found = search(store())
            .search("Nothing", &texts(&["damage", "any target"]))
            .await
            .unwrap();
        assert_eq!(found.len(), 4);
    }

    #[tokio::test]
    async fn test_no_queries_no_results() {
        assert!(search(store()).search("Nothing", &[]).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_concurrency_of_one_still_runs_every_query() {
        let config = SearchConfig {
            max_concurrent_queries: 1,
            ..SearchConfig::default()
        };
        let found = FuzzySearch::new(store(), config)
            .search("Nothing", &texts(&["damage", "draw", "life"]))
            .await
            .unwrap();
        assert_eq!(found.len(), 4);
    }

    #[tokio::test]
    async fn test_search_names() {
        let found = search(store()).search_names("bolt").await.unwrap();
        assert_eq!(names(found), vec!["Lightning Bolt"]);
    }
}
