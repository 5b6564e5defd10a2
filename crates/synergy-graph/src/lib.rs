//! # Synergy Graph
//!
//! Graph store side of synergy: Bolt client, schema management, idempotent
//! projection sync, full resync, count parity, and shared-attribute
//! recommendations.

pub mod bootstrap;
pub mod client;
pub mod parity;
pub mod queries;
pub mod schema;
pub mod sync;

pub use bootstrap::{startup, StartupReport};
pub use client::{GraphClient, GraphCounts};
pub use parity::{check_parity, ParityReport};
pub use queries::RecommendationEngine;
pub use schema::{ensure_schema, SchemaReport};
pub use sync::{GraphSyncWriter, ResyncHandle, ResyncOrchestrator, ResyncProgress, SyncResult};
