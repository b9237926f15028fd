//! # StashKV - A Multi-Tenant Persistent Key-Value Store
//!
//! StashKV is a small key-value store with pluggable persistence, TTL
//! support, and two thin front-ends (HTTP and tool-call dispatch) over a
//! single operation engine.
//!
//! ## Features
//!
//! - **Pluggable persistence**: memory, file, hybrid (memory + periodic
//!   disk sync), or an external RESP server
//! - **TTL support**: lazy expiry on every read path plus a background
//!   sweeper that reclaims untouched keys
//! - **Tenant namespacing**: optional per-username key prefixing applied at
//!   the front-ends, invisible to the engine
//! - **Point-in-time backups**: timestamped full snapshots on demand or on
//!   a timer
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                          StashKV                            │
//! │                                                             │
//! │  ┌─────────────┐      ┌─────────────┐                       │
//! │  │ HTTP routes │      │  tool calls │                       │
//! │  │   (axum)    │      │  (kv_* )    │                       │
//! │  └──────┬──────┘      └──────┬──────┘                       │
//! │         │   tenant prefixing │                              │
//! │         └──────────┬─────────┘                              │
//! │                    ▼                                        │
//! │           ┌─────────────────┐        ┌──────────────────┐   │
//! │           │    KvEngine     │◄───────│ Sweeper / Syncer │   │
//! │           │ (validation,    │        │ (background      │   │
//! │           │  write lock,    │        │  tokio tasks)    │   │
//! │           │  stats, backup) │        └──────────────────┘   │
//! │           └────────┬────────┘                               │
//! │                    │ Arc<dyn Backend>                       │
//! │     ┌────────┬─────┴─────┬──────────┐                       │
//! │     ▼        ▼           ▼          ▼                       │
//! │  Memory    File       Hybrid     Remote                     │
//! │  (map)   (sync wr.) (map+timer) (RESP client)               │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Overview
//!
//! - [`codec`]: key/value validation and value classification
//! - [`storage`]: entries, expiry policy, and the backend variants
//! - [`engine`]: the operation engine every front-end calls into
//! - [`tenant`]: optional username-based key namespacing
//! - [`tools`]: tool-call front-end (`kv_get`, `kv_set`, ...)
//! - [`api`]: HTTP front-end (axum routes)
//! - [`config`]: JSON config file with created-on-first-run defaults
//!
//! ## Design Highlights
//!
//! ### Lazy + Active Expiry
//!
//! Keys with TTL are expired in two ways:
//! 1. **Lazy**: every read path treats an expired entry as absent
//! 2. **Active**: a background task periodically sweeps expired keys
//!
//! This ensures memory is reclaimed even for keys that are never accessed
//! again, while reads stay correct between sweeps.
//!
//! ### One Writer at a Time
//!
//! All mutations go through a single engine-level lock, which makes the
//! read-modify-write operations (`incr`, `decr`, `append`, `expire`)
//! deterministic under concurrent callers: N concurrent increments always
//! land as exactly +N.

pub mod api;
pub mod codec;
pub mod config;
pub mod engine;
pub mod error;
pub mod storage;
pub mod tenant;
pub mod tools;

pub use config::{Config, StorageMode};
pub use engine::KvEngine;
pub use error::{StoreError, StoreResult};

/// Crate version from Cargo.toml.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
