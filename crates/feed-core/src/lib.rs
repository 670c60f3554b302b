//! # Feed Core
//!
//! Reconciliation core for a hierarchical block feed. Blocks, uncles and workshares arrive
//! out of order and duplicated from a node; this crate folds them into one bounded,
//! deduplicated, height-ordered item collection per network.
//!
//! - **[`item`]**: wire parsing and expansion of a block into its Prime, Region and Zone
//!   representations.
//!
//! - **[`store`]**: the deduplicated collection, the missing-parent ledger and recency-based
//!   eviction.
//!
//! - **[`engine`]**: serialized mutation path, snapshot publication and generation-based
//!   cancellation.
//!
//! - **[`resolver`]**: one-hop parent backfill with an in-flight set.
//!
//! - **[`source`]**: the [`source::EventSource`] seam and its JSON-RPC implementation.
//!
//! - **[`session`]**: connection lifecycle (polling, push with fixed-delay reconnect,
//!   enable and disable) and the multi-network registry.
//!
//! ## Data Flow
//!
//! ```text
//!  poll / push                      backfill fetch
//!      │                                  ▲
//!      ▼                                  │
//! ┌──────────┐  candidates  ┌──────────────────────┐  gaps  ┌─────────────────┐
//! │  source  │ ───────────► │ ReconciliationEngine │ ─────► │ backfill worker │
//! └──────────┘              └──────────┬───────────┘        └─────────────────┘
//!                                      │ snapshot
//!                                      ▼
//!                                   readers
//! ```

pub mod config;
pub mod engine;
pub mod item;
pub mod resolver;
pub mod session;
pub mod source;
pub mod store;
pub mod types;
pub mod utils;

#[cfg(test)]
pub(crate) mod testing;

pub use engine::{EngineConfig, EngineStats, ReconciliationEngine};
pub use session::{ConnectionStatus, FeedRegistry, FeedSession, SessionConfig};
pub use types::{BlockHash, Item, ItemKey, ItemType};
