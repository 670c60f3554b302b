//! Integration tests for the block feed pipeline
//!
//! Every suite drives real [`feed_core::FeedSession`]s against local mocks, so no node is
//! needed:
//!
//! - `pipeline_tests`: poll ingestion, expansion, idempotence and malformed responses
//! - `backfill_tests`: one-hop parent backfill, the ledger and the at-most-one-fetch guard
//! - `lifecycle_tests`: enable/disable resets, eviction ranking and runtime retention changes
//! - `websocket_tests`: workshare push subscription and fixed-delay reconnect
//! - `mock_infrastructure`: reusable mocks (JSON-RPC node, WebSocket push server)
//!
//! ## Running Tests
//!
//! ```bash
//! cargo test --package tests
//! ```

#[cfg(test)]
mod pipeline_tests;

#[cfg(test)]
mod backfill_tests;

#[cfg(test)]
mod lifecycle_tests;


/// Mock infrastructure for testing
pub mod mock_infrastructure;
