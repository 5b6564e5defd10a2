//! # Synergy Core
//!
//! Domain model and pure logic for keeping a card synergy graph in step with
//! the canonical relational card store.
//!
//! Provides the canonical card model, mechanic classification, graph
//! projection, the store traits every component is built on, and
//! configuration.

pub mod card;
pub mod config;
pub mod error;
pub mod mechanics;
pub mod projection;
pub mod store;

#[cfg(any(test, feature = "testing"))]
pub mod memory;

pub use card::model::Card;
pub use error::{SynergyError, SynergyResult};
pub use mechanics::{classify, Mechanic};
pub use projection::{project, AttributeKind, CardProjection};
pub use store::{CardStore, GraphStore, NameQuery, RankedCandidate, RulesTextQuery};
