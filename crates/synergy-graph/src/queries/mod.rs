//! Read-side graph queries.

pub mod recommend;

pub use recommend::{order_by_rank, RecommendationEngine};
