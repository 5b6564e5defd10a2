//! Bolt connection client for the synergy graph (Memgraph or Neo4j).

use anyhow::{Context, Result};
use async_trait::async_trait;
use neo4rs::{ConfigBuilder, Graph, Query};
use serde::de::DeserializeOwned;
use tracing::debug;

use synergy_core::config::GraphConfig;
use synergy_core::store::{GraphStore, RankedCandidate};
use synergy_core::{CardProjection, SynergyError, SynergyResult};

/// Upsert one Card node, overwrite its scalars, and merge every attribute edge.
///
/// `FOREACH` keeps the row alive when a list is empty, unlike `UNWIND`.
const MERGE_CARD: &str = "MERGE (c:Card {id: $id})
     SET c.name = $name,
         c.cmc = $cmc,
         c.printing_id = $printing_id
     FOREACH (t IN $types |
         MERGE (a:Type {name: t})
         MERGE (c)-[:IS_TYPE]->(a))
     FOREACH (k IN $keywords |
         MERGE (a:Keyword {name: k})
         MERGE (c)-[:HAS_KEYWORD]->(a))
     FOREACH (m IN $mechanics |
         MERGE (a:Mechanic {name: m})
         MERGE (c)-[:PRODUCES]->(a))";

/// Other cards ranked by the number of distinct attributes they share with `$id`.
const SHARED_ATTRIBUTE_CANDIDATES: &str = "MATCH (source:Card {id: $id})
     MATCH (source)-[:IS_TYPE|HAS_KEYWORD|PRODUCES]->(attr)
     MATCH (rec:Card)-[:IS_TYPE|HAS_KEYWORD|PRODUCES]->(attr)
     WHERE rec.id <> source.id
     WITH rec, count(DISTINCT attr) AS shared
     ORDER BY shared DESC, rec.id ASC
     LIMIT $limit
     RETURN rec.id AS id, shared";

/// Client for graph store operations.
#[derive(Clone)]
pub struct GraphClient {
    graph: Graph,
}

impl GraphClient {
    /// Create a new GraphClient from config.
    ///
    /// neo4rs builds its pool lazily, so a `RETURN 1` ping runs immediately to
    /// fail fast when the store is unreachable.
    pub async fn connect(config: &GraphConfig) -> Result<Self> {
        let mut builder = ConfigBuilder::default()
            .uri(&config.uri)
            .user(&config.user)
            .password(&config.password)
            .max_connections(config.max_connections)
            .fetch_size(config.fetch_size);
        if let Some(db) = &config.database {
            builder = builder.db(db.as_str());
        }
        let bolt_config = builder.build().context("Failed to build graph store config")?;

        let graph = Graph::connect(bolt_config)
            .await
            .context("Failed to create graph store connection pool")?;

        graph
            .run(Query::new("RETURN 1".to_string()))
            .await
            .with_context(|| {
                format!("Graph store at {} is not responding to queries", config.uri)
            })?;

        Ok(Self { graph })
    }

    /// Execute a Cypher query that returns no results.
    pub async fn execute(&self, query: Query) -> Result<()> {
        self.graph.run(query).await.context("Graph query execution failed")?;
        Ok(())
    }

    /// Execute a Cypher query and return results as rows.
    pub async fn query(&self, query: Query) -> Result<Vec<neo4rs::Row>> {
        let mut result = self.graph.execute(query).await.context("Graph query failed")?;

        let mut rows = Vec::new();
        while let Some(row) = result.next().await.context("Failed to read graph result row")? {
            rows.push(row);
        }
        Ok(rows)
    }

    /// Execute a Cypher query and return a single scalar value.
    pub async fn query_scalar<T: DeserializeOwned>(
        &self,
        query: Query,
        field: &str,
    ) -> Result<Option<T>> {
        let rows = self.query(query).await?;
        if let Some(row) = rows.into_iter().next() {
            let val: T = row
                .get(field)
                .map_err(|e| anyhow::anyhow!("Failed to get field '{}': {:?}", field, e))?;
            Ok(Some(val))
        } else {
            Ok(None)
        }
    }

    /// Run several statements in one explicit write transaction.
    ///
    /// Any failure rolls the whole transaction back.
    pub async fn execute_in_transaction(&self, queries: Vec<Query>) -> Result<()> {
        let mut txn = self
            .graph
            .start_txn()
            .await
            .context("Failed to open write transaction")?;

        if let Err(e) = txn.run_queries(queries).await {
            if let Err(rollback) = txn.rollback().await {
                debug!(error = %rollback, "Rollback after failed write transaction also failed");
            }
            return Err(e).context("Write transaction failed");
        }

        txn.commit().await.context("Failed to commit write transaction")?;
        Ok(())
    }

    /// Get node and relationship counts for status display.
    pub async fn get_counts(&self) -> Result<GraphCounts> {
        let node_query = Query::new("MATCH (n) RETURN count(n) as count".to_string());
        let rel_query = Query::new("MATCH ()-[r]->() RETURN count(r) as count".to_string());

        let nodes: i64 = self.query_scalar(node_query, "count").await?.unwrap_or(0);
        let relationships: i64 = self.query_scalar(rel_query, "count").await?.unwrap_or(0);

        Ok(GraphCounts {
            nodes: nodes.max(0) as usize,
            relationships: relationships.max(0) as usize,
        })
    }
}

fn merge_card_query(projection: &CardProjection) -> Query {
    Query::new(MERGE_CARD.to_string())
        .param("id", projection.id.as_str())
        .param("name", projection.name.as_str())
        .param("cmc", projection.cmc)
        .param("printing_id", projection.printing_id.as_str())
        .param("types", projection.types.clone())
        .param("keywords", projection.keywords.clone())
        .param("mechanics", projection.mechanics.clone())
}

#[async_trait]
impl GraphStore for GraphClient {
    async fn run_schema_statement(&self, statement: &str) -> SynergyResult<()> {
        self.execute(Query::new(statement.to_string()))
            .await
            .map_err(|e| SynergyError::graph("schema statement", format!("{:#}", e)))
    }

    async fn merge_batch(&self, batch: &[CardProjection]) -> SynergyResult<()> {
        let queries: Vec<Query> = batch.iter().map(merge_card_query).collect();
        self.execute_in_transaction(queries)
            .await
            .map_err(|e| SynergyError::graph("merge batch", format!("{:#}", e)))
    }

    async fn card_node_count(&self) -> SynergyResult<u64> {
        let query = Query::new("MATCH (c:Card) RETURN count(c) AS count".to_string());
        let count: i64 = self
            .query_scalar(query, "count")
            .await
            .map_err(|e| SynergyError::graph("count card nodes", format!("{:#}", e)))?
            .unwrap_or(0);
        Ok(count.max(0) as u64)
    }

    async fn shared_attribute_candidates(
        &self,
        id: &str,
        limit: usize,
    ) -> SynergyResult<Vec<RankedCandidate>> {
        let query = Query::new(SHARED_ATTRIBUTE_CANDIDATES.to_string())
            .param("id", id)
            .param("limit", limit as i64);

        let rows = self
            .query(query)
            .await
            .map_err(|e| SynergyError::graph("shared attribute candidates", format!("{:#}", e)))?;

        let mut candidates = Vec::with_capacity(rows.len());
        for row in rows {
            let id: String = row
                .get("id")
                .map_err(|e| SynergyError::graph("read candidate id", e))?;
            let shared: i64 = row
                .get("shared")
                .map_err(|e| SynergyError::graph("read candidate score", e))?;
            candidates.push(RankedCandidate {
                id,
                shared: shared.max(0) as u64,
            });
        }
        Ok(candidates)
    }
}

/// Node and relationship counts.
#[derive(Debug, Clone)]
pub struct GraphCounts {
    pub nodes: usize,
    pub relationships: usize,
}
