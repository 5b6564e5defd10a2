//! Database query modules.

pub mod cards;
