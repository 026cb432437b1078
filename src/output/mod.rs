//! Report sinks
//!
//! - `csv`: the per-rank timing table
//! - `json`: the same rows plus run totals, for tooling
//! - `text`: console summary printed by the leader

pub mod csv;
pub mod json;
pub mod text;
