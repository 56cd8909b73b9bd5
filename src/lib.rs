//! # Corpus Unify
//!
//! Combines bibliographic corpora from several upstream providers into one
//! deduplicated dataset of authors, works, and passages.
//!
//! Each provider ships its own author, work, and passage files in one of two
//! layouts (a *standard* schema with id-referenced authors, or an *inline*
//! schema with author names embedded in each record). The pipeline
//! normalizes author names, merges authors across providers, assembles works,
//! and streams every passage to a single `chunks.json` without ever holding
//! the full passage set in memory.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐   ┌──────────────┐   ┌──────────────┐   ┌─────────────┐
//! │  Sources    │──▶│  Registries  │──▶│   Combiner   │──▶│   Outputs   │
//! │ authors/    │   │ authors +    │   │ reader task  │   │ authors.json│
//! │ works/chunks│   │ works        │   │ ─▶ channel   │   │ works.json  │
//! └─────────────┘   └──────────────┘   │ ─▶ writer    │   │ chunks.json │
//!                                      └──────────────┘   │ stats.json  │
//!                                                         └─────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! unify sources                 # check configured inputs
//! unify combine                 # build the unified corpus
//! unify stats                   # summarize the last run
//! unify verify                  # check outputs for dangling references
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`models`] | Raw and unified record types |
//! | [`normalize`] | Author name normalization and slugs |
//! | [`decode`] | Field-level decoding of raw JSON records |
//! | [`authors`] | Author registry and cross-source merging |
//! | [`works`] | Work assembly |
//! | [`context`] | Passage attribution |
//! | [`stream`] | Incremental JSON array reader |
//! | [`writer`] | Incremental `chunks.json` writer |
//! | [`combine`] | Streaming passage combination |
//! | [`reconcile`] | Count reconciliation, stats, completion marker |
//! | [`pipeline`] | End-to-end combine run |
//! | [`progress`] | Progress reporting on stderr |
//! | [`verify`] | Output verification |

pub mod authors;
pub mod combine;
pub mod config;
pub mod context;
pub mod decode;
pub mod models;
pub mod normalize;
pub mod pipeline;
pub mod progress;
pub mod reconcile;
pub mod sources;
pub mod stats;
pub mod stream;
pub mod verify;
pub mod works;
pub mod writer;
