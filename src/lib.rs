//! # Plan Harness
//!
//! Turns coaching documents (Word, Excel, PowerPoint, PDF, CSV, text) into
//! structured, versioned training plans, and enriches individual sessions
//! with objectives, drills and coaching points.
//!
//! The pure stages (normalization, structural analysis, plan assembly,
//! rule-based enrichment) live in `plan-harness-core`. This crate adds the
//! decoders, the SQLite-backed repository, the integrity checker, the
//! enhancement tiers and the `plan` CLI.
//!
//! ## Architecture
//!
//! ```text
//! ┌────────────┐   ┌────────────┐   ┌──────────┐   ┌──────────┐
//! │  Extract   │──▶│ Normalize  │──▶│ Analyze  │──▶│ Assemble │
//! │ docx/xlsx… │   │  + hints   │   │ weeks,   │   │ versioned│
//! └────────────┘   └─────┬──────┘   │ sessions │   │   plan   │
//!                        │          └──────────┘   └────┬─────┘
//!                  ┌─────▼──────┐                  ┌────▼─────┐
//!                  │  Patterns  │◀─────────────────│  SQLite  │
//!                  │ per format │                  │ kv store │
//!                  └────────────┘                  └────┬─────┘
//!                                                       │
//!                        ┌──────────────────────────────┤
//!                        ▼                              ▼
//!                 ┌────────────┐                 ┌────────────┐
//!                 │  Enhance   │                 │ Integrity  │
//!                 │ local /    │                 │ check and  │
//!                 │ remote /   │                 │ repair     │
//!                 │ rules      │                 └────────────┘
//!                 └────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! plan init                          # create database
//! plan ingest ./season.docx          # store + assemble a plan
//! plan plans                         # list plans
//! plan show <plan-id>                # print the latest version
//! plan enhance <plan-id> --week 1    # enrich week 1's sessions
//! plan check <document-id> --repair  # verify and repair a document
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`error`] | Error taxonomy |
//! | [`extract`] | Format decoders with fallback |
//! | [`ingest`] | Document pipeline |
//! | [`repository`] | Documents, payloads and plan versions |
//! | [`patterns`] | Per-format fingerprint library |
//! | [`integrity`] | Storage integrity checker |
//! | [`enhance`] | Enhancement orchestrator and tiers |
//! | [`plans`] | Plan listing and rendering |
//! | [`db`] | Database connection |
//! | [`migrate`] | Schema migrations |

pub mod config;
pub mod db;
pub mod enhance;
pub mod enhance_cmd;
pub mod error;
pub mod extract;
pub mod ingest;
pub mod integrity;
pub mod logging;
pub mod migrate;
pub mod patterns;
pub mod plans;
pub mod repository;
pub mod sqlite_store;
