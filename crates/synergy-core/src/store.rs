//! Store seams.
//!
//! Every component receives its stores as `Arc<dyn CardStore>` /
//! `Arc<dyn GraphStore>` at construction time. Production implementations
//! live in `synergy-db` (Postgres) and `synergy-graph` (Bolt); in-memory
//! implementations live in [`crate::memory`] behind the `testing` feature.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::card::model::Card;
use crate::error::SynergyResult;
use crate::projection::CardProjection;

/// A trigram-similarity search over rules text.
#[derive(Debug, Clone, PartialEq)]
pub struct RulesTextQuery {
    /// Cards with exactly this name are excluded (usually the card being matched).
    pub exclude_name: String,
    pub text: String,
    /// Trigram similarity threshold for the `%` operator.
    pub threshold: f64,
    pub limit: usize,
    pub language: String,
}

/// A trigram-similarity search over card names.
#[derive(Debug, Clone, PartialEq)]
pub struct NameQuery {
    pub name: String,
    pub threshold: f64,
    pub limit: usize,
    pub language: String,
}

/// A recommendation candidate as ranked by the graph store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RankedCandidate {
    /// Logical identity of the candidate card.
    pub id: String,
    /// Number of distinct attributes shared with the source card.
    pub shared: u64,
}

/// The canonical relational store.
#[async_trait]
pub trait CardStore: Send + Sync {
    /// Count distinct logical identities across non-deleted rows.
    async fn count_logical_cards(&self) -> SynergyResult<u64>;

    /// One page of canonical cards, one row per logical identity.
    ///
    /// Only non-deleted rows with a logical identity are considered; the row
    /// with the latest release date wins (ties: greatest printing id). Pages
    /// are ordered by logical identity.
    async fn canonical_page(&self, offset: u64, limit: u64) -> SynergyResult<Vec<Card>>;

    /// One representative printing per requested logical identity, in no
    /// particular order. Unknown identities are silently absent.
    async fn cards_by_logical_ids(&self, ids: &[String]) -> SynergyResult<Vec<Card>>;

    /// Gameplay cards whose rules text is similar to `query.text`, best first.
    async fn similar_rules_text(&self, query: &RulesTextQuery) -> SynergyResult<Vec<Card>>;

    /// Cards whose name is similar to `query.name`, one per name, best first.
    async fn fuzzy_name_search(&self, query: &NameQuery) -> SynergyResult<Vec<Card>>;

    async fn card_by_id(&self, id: &str) -> SynergyResult<Option<Card>>;

    async fn card_by_name(&self, name: &str) -> SynergyResult<Option<Card>>;

    /// Other printings of the same logical card in the given language.
    async fn variants(
        &self,
        oracle_id: &str,
        exclude_id: &str,
        language: &str,
    ) -> SynergyResult<Vec<Card>>;

    async fn random_card(&self, language: &str) -> SynergyResult<Option<Card>>;
}

/// The derived synergy graph store.
#[async_trait]
pub trait GraphStore: Send + Sync {
    /// Run one schema (constraint/index) statement.
    async fn run_schema_statement(&self, statement: &str) -> SynergyResult<()>;

    /// Merge a batch of projections in a single write transaction.
    ///
    /// Must be idempotent: merging the same batch twice leaves the same nodes
    /// and edges as merging it once.
    async fn merge_batch(&self, batch: &[CardProjection]) -> SynergyResult<()>;

    /// Number of Card nodes.
    async fn card_node_count(&self) -> SynergyResult<u64>;

    /// Cards sharing at least one attribute with `id`, most shared first.
    async fn shared_attribute_candidates(
        &self,
        id: &str,
        limit: usize,
    ) -> SynergyResult<Vec<RankedCandidate>>;
}
