//! Missing-parent resolver: one-hop backfill behind a bounded queue.
//!
//! Gap detection and ledgering happen inside the store's critical section. This module owns
//! the asynchronous half: the in-flight set and the worker that performs the fetches.

pub mod inflight;
pub mod worker;

pub use inflight::{InflightFetch, InflightFetches, InflightGuard};
pub use worker::{
    fetch_and_insert_parent, run_backfill_worker, BackfillRequest, BackfillWorkerConfig,
};
