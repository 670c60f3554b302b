//! Backfill worker: drains the bounded backfill queue and commits fetched parents.
//!
//! A request leaves the bounded queue only when one of the semaphore's permits is free, and
//! then runs as its own task holding that permit. A task claims the hash in the in-flight
//! set, performs one point lookup under a timeout and hands the result to
//! [`ReconciliationEngine::complete_backfill`]. Failures are logged and never retried; the
//! ledger entry written at detection time stays, so the gap is permanent for the session.

use std::{sync::Arc, time::Duration};
use tokio::{
    sync::{broadcast, mpsc, OwnedSemaphorePermit, Semaphore},
    task::{JoinError, JoinSet},
};
use tracing::{debug, info, warn};

use crate::{engine::ReconciliationEngine, source::EventSource, types::BlockHash};

/// One queued parent fetch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BackfillRequest {
    pub hash: BlockHash,
    /// Engine generation at the time the gap was detected.
    pub generation: u64,
    /// Hop count from the live item that triggered it, starting at 1.
    pub depth: u32,
}

#[derive(Debug, Clone)]
pub struct BackfillWorkerConfig {
    pub request_timeout: Duration,
    pub max_concurrent: usize,
}

impl Default for BackfillWorkerConfig {
    fn default() -> Self {
        Self { request_timeout: Duration::from_secs(10), max_concurrent: 8 }
    }
}

/// Runs until shutdown or until every sender of `backfill_rx` is gone.
///
/// A request is only taken off the queue once a concurrency permit is free, so the bounded
/// channel is the only place pending work waits and a full channel is reported to the
/// sender. Outstanding fetches are aborted on exit; their in-flight entries are released by
/// the guards' `Drop`.
pub async fn run_backfill_worker(
    engine: Arc<ReconciliationEngine>,
    source: Arc<dyn EventSource>,
    mut backfill_rx: mpsc::Receiver<BackfillRequest>,
    config: BackfillWorkerConfig,
    mut shutdown_rx: broadcast::Receiver<()>,
) {
    let permits = Arc::new(Semaphore::new(config.max_concurrent.max(1)));
    let mut tasks = JoinSet::new();

    loop {
        let permit = tokio::select! {
            biased;

            _ = shutdown_rx.recv() => {
                debug!(network = %engine.network(), "backfill worker received shutdown signal");
                break;
            }

            Some(joined) = tasks.join_next(), if !tasks.is_empty() => {
                log_join_error(&engine, joined);
                continue;
            }

            permit = Arc::clone(&permits).acquire_owned() => {
                let Ok(permit) = permit else { break };
                permit
            }
        };

        let request = tokio::select! {
            biased;

            _ = shutdown_rx.recv() => {
                debug!(network = %engine.network(), "backfill worker received shutdown signal");
                break;
            }

            Some(joined) = tasks.join_next(), if !tasks.is_empty() => {
                log_join_error(&engine, joined);
                continue;
            }

            maybe_request = backfill_rx.recv() => {
                let Some(request) = maybe_request else {
                    debug!(network = %engine.network(), "backfill queue closed, worker exiting");
                    break;
                };
                request
            }
        };

        if is_stale(&engine, &request) {
            debug!(
                network = %engine.network(),
                hash = %request.hash,
                "dropping queued request from stale session"
            );
            continue;
        }

        tasks.spawn(fetch_and_insert_parent(
            Arc::clone(&engine),
            Arc::clone(&source),
            permit,
            request,
            config.request_timeout,
        ));
    }

    tasks.abort_all();
    while tasks.join_next().await.is_some() {}
    info!(network = %engine.network(), "backfill worker shutdown complete");
}

fn log_join_error(engine: &ReconciliationEngine, joined: Result<bool, JoinError>) {
    if let Err(e) = joined {
        if e.is_panic() {
            warn!(network = %engine.network(), error = %e, "backfill task panicked");
        }
    }
}

fn is_stale(engine: &ReconciliationEngine, request: &BackfillRequest) -> bool {
    !engine.is_enabled() || engine.generation() != request.generation
}

/// Fetches one missing parent and commits it.
///
/// `permit` is the concurrency slot the fetch runs under. The in-flight entry is claimed
/// only after the request's generation is confirmed current, so a request queued before a
/// reset can never hold a hash in the next session's in-flight set.
///
/// Returns `true` if the fetched block was committed.
pub async fn fetch_and_insert_parent(
    engine: Arc<ReconciliationEngine>,
    source: Arc<dyn EventSource>,
    permit: OwnedSemaphorePermit,
    request: BackfillRequest,
    timeout: Duration,
) -> bool {
    let _permit = permit;
    let network = Arc::clone(engine.network());

    if is_stale(&engine, &request) {
        debug!(network = %network, hash = %request.hash, "skipping fetch from stale session");
        return false;
    }

    let Some(guard) = engine.inflight().try_begin(request.hash) else {
        debug!(network = %network, hash = %request.hash, "parent fetch already in flight");
        return false;
    };

    // A reset between the check above and the claim must not leave the claim behind.
    if is_stale(&engine, &request) {
        drop(guard);
        debug!(network = %network, hash = %request.hash, "skipping fetch from stale session");
        return false;
    }

    let block = match tokio::time::timeout(timeout, source.fetch_by_hash(&request.hash)).await {
        Ok(Ok(Some(block))) => block,
        Ok(Ok(None)) => {
            warn!(network = %network, hash = %request.hash, "parent not found on node");
            return false;
        }
        Ok(Err(e)) => {
            warn!(
                network = %network,
                hash = %request.hash,
                error = %e,
                transient = e.is_transient(),
                "parent fetch failed"
            );
            return false;
        }
        Err(_) => {
            warn!(
                network = %network,
                hash = %request.hash,
                timeout_ms = timeout.as_millis(),
                "parent fetch timed out"
            );
            return false;
        }
    };

    if block.hash != request.hash {
        warn!(
            network = %network,
            requested = %request.hash,
            received = %block.hash,
            "node returned a different block"
        );
        return false;
    }

    match engine.complete_backfill(&request, &block) {
        Some(outcome) => {
            debug!(
                network = %network,
                hash = %request.hash,
                appended = outcome.appended,
                depth = request.depth,
                "parent backfilled"
            );
            true
        }
        None => {
            debug!(
                network = %network,
                hash = %request.hash,
                "discarded parent fetched after disable"
            );
            false
        }
    }
}
