//! # Synergy DB
//!
//! The canonical relational store: Postgres access for card records,
//! trigram fuzzy search with concurrent fan-out, and bulk priming from
//! Scryfall exports.

pub mod pool;
pub mod prime;
pub mod queries;
pub mod search;

pub use pool::{init_pool, DbPool};
pub use queries::cards::PgCardStore;
pub use search::FuzzySearch;
