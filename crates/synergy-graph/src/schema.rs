//! Graph schema initialization (constraints and indexes).

use serde::Serialize;
use tracing::{info, warn};

use synergy_core::config::GraphDialect;
use synergy_core::store::GraphStore;

/// Memgraph has no `IF NOT EXISTS`; re-running reports "already exists" errors.
const MEMGRAPH_STATEMENTS: &[&str] = &[
    "CREATE CONSTRAINT ON (c:Card) ASSERT c.id IS UNIQUE",
    "CREATE INDEX ON :Card(id)",
    "CREATE INDEX ON :Type(name)",
    "CREATE INDEX ON :Keyword(name)",
    "CREATE INDEX ON :Mechanic(name)",
];

const NEO4J_STATEMENTS: &[&str] = &[
    "CREATE CONSTRAINT card_id IF NOT EXISTS FOR (c:Card) REQUIRE c.id IS UNIQUE",
    "CREATE INDEX type_name IF NOT EXISTS FOR (t:Type) ON (t.name)",
    "CREATE INDEX keyword_name IF NOT EXISTS FOR (k:Keyword) ON (k.name)",
    "CREATE INDEX mechanic_name IF NOT EXISTS FOR (m:Mechanic) ON (m.name)",
];

/// Schema statements for a graph store dialect.
pub fn schema_statements(dialect: GraphDialect) -> &'static [&'static str] {
    match dialect {
        GraphDialect::Memgraph => MEMGRAPH_STATEMENTS,
        GraphDialect::Neo4j => NEO4J_STATEMENTS,
    }
}

/// Outcome of a schema pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SchemaReport {
    pub applied: usize,
    pub failed: usize,
}

/// Apply the uniqueness constraint and attribute indexes.
///
/// Never fails: each statement's error is logged and the pass continues,
/// since "already exists" is the normal outcome on every start after the first.
pub async fn ensure_schema(graph: &dyn GraphStore, dialect: GraphDialect) -> SchemaReport {
    let statements = schema_statements(dialect);
    info!(%dialect, statements = statements.len(), "Initializing graph schema");

    let mut report = SchemaReport::default();
    for statement in statements {
        match graph.run_schema_statement(statement).await {
            Ok(()) => report.applied += 1,
            Err(e) => {
                warn!(statement, error = %e, "Schema statement failed; continuing");
                report.failed += 1;
            }
        }
    }

    info!(applied = report.applied, failed = report.failed, "Graph schema pass finished");
    report
}
