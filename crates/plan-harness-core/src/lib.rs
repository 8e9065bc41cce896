//! # Plan Harness Core
//!
//! Pure logic for Plan Harness: data models, text normalization, the
//! structural analyzer and its rule list, pattern hints, plan assembly,
//! the coaching knowledge tables, rule-based session enrichment, and the
//! key-value store abstraction.
//!
//! This crate contains no tokio, sqlx, network, or filesystem code. The
//! `plan-harness` application crate supplies extraction, persistence and
//! the enhancement tiers that talk to inference engines.

pub mod analyze;
pub mod assemble;
pub mod enrich;
pub mod knowledge;
pub mod models;
pub mod normalize;
pub mod patterns;
pub mod store;
