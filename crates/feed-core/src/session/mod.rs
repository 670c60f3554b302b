//! Connection lifecycle manager for one logical network.
//!
//! A [`FeedSession`] owns an engine, the event source feeding it, and the tasks that drive
//! both. Two tasks live for the whole session: the backfill worker and the eviction timer.
//! Enabling starts a *cycle* of two more: the poll loop (immediate first poll, then a
//! fixed interval) and, when the source supports it, the push loop with a fixed reconnect
//! delay. Disabling stops the cycle and performs the full reset.

pub mod registry;
pub mod status;

use parking_lot::Mutex;
use std::{sync::Arc, time::Duration};
use tokio::{
    sync::{broadcast, mpsc},
    task::JoinHandle,
    time::MissedTickBehavior,
};
use tracing::{debug, info, warn};

pub use registry::FeedRegistry;
pub use status::{ConnectionStatus, LifecycleState, StatusCell};

use crate::{
    engine::{EngineConfig, EngineStats, ReconciliationEngine},
    resolver::{run_backfill_worker, BackfillWorkerConfig},
    source::{EventSource, PushEvent, SourceError},
};

/// Buffered push events between the socket reader and the engine.
const PUSH_BUFFER: usize = 256;

/// Timing for one session's tasks.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub poll_interval: Duration,
    pub request_timeout: Duration,
    /// Constant delay between a push subscription ending and the next attempt.
    pub reconnect_delay: Duration,
    pub eviction_interval: Duration,
    pub backfill: BackfillWorkerConfig,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(2),
            request_timeout: Duration::from_secs(10),
            reconnect_delay: Duration::from_secs(3),
            eviction_interval: Duration::from_secs(30),
            backfill: BackfillWorkerConfig::default(),
        }
    }
}

/// Tasks of one enabled period.
struct ActiveCycle {
    stop_tx: broadcast::Sender<()>,
    tasks: Vec<JoinHandle<()>>,
}

impl ActiveCycle {
    fn stop(self) {
        let _ = self.stop_tx.send(());
        for task in self.tasks {
            task.abort();
        }
    }
}

pub struct FeedSession {
    name: Arc<str>,
    engine: Arc<ReconciliationEngine>,
    source: Arc<dyn EventSource>,
    status: Arc<StatusCell>,
    config: SessionConfig,
    cycle: Mutex<Option<ActiveCycle>>,
    shutdown_tx: broadcast::Sender<()>,
    background: Mutex<Vec<JoinHandle<()>>>,
}

impl FeedSession {
    /// Builds the session and starts its backfill worker and eviction timer. The session
    /// starts disabled.
    ///
    /// Must be called from within a Tokio runtime.
    #[must_use]
    pub fn spawn(
        name: impl Into<Arc<str>>,
        source: Arc<dyn EventSource>,
        engine_config: &EngineConfig,
        config: SessionConfig,
    ) -> Arc<Self> {
        let name = name.into();
        let (engine, backfill_rx) = ReconciliationEngine::new(Arc::clone(&name), engine_config);
        let (shutdown_tx, _) = broadcast::channel(1);

        let worker = tokio::spawn(run_backfill_worker(
            Arc::clone(&engine),
            Arc::clone(&source),
            backfill_rx,
            config.backfill.clone(),
            shutdown_tx.subscribe(),
        ));
        let eviction = tokio::spawn(run_eviction_timer(
            Arc::clone(&engine),
            config.eviction_interval,
            config.request_timeout.saturating_mul(3),
            shutdown_tx.subscribe(),
        ));

        info!(network = %name, push = source.supports_push(), "feed session created");

        Arc::new(Self {
            name,
            engine,
            source,
            status: Arc::new(StatusCell::new()),
            config,
            cycle: Mutex::new(None),
            shutdown_tx,
            background: Mutex::new(vec![worker, eviction]),
        })
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn engine(&self) -> &Arc<ReconciliationEngine> {
        &self.engine
    }

    #[must_use]
    pub fn status(&self) -> ConnectionStatus {
        self.status.status()
    }

    /// Message of the last failed connection attempt, cleared on success.
    #[must_use]
    pub fn last_error(&self) -> Option<String> {
        self.status.last_error()
    }

    #[must_use]
    pub fn lifecycle_state(&self) -> LifecycleState {
        self.status.state()
    }

    #[must_use]
    pub fn is_enabled(&self) -> bool {
        self.cycle.lock().is_some()
    }

    #[must_use]
    pub fn stats(&self) -> EngineStats {
        self.engine.stats()
    }

    /// `true` connects and polls immediately; `false` stops every loop and clears the
    /// store, ledger, in-flight set and height counter.
    pub fn set_enabled(&self, enabled: bool) {
        let mut cycle = self.cycle.lock();

        if enabled {
            if cycle.is_some() {
                debug!(network = %self.name, "already enabled");
                return;
            }
            let generation = self.engine.enable();
            self.status.mark_connecting();
            *cycle = Some(self.start_cycle(generation));
            info!(network = %self.name, generation, "feed enabled");
        } else {
            if let Some(active) = cycle.take() {
                active.stop();
            }
            self.engine.reset();
            self.status.mark_disabled();
            info!(network = %self.name, "feed disabled");
        }
    }

    fn start_cycle(&self, generation: u64) -> ActiveCycle {
        let (stop_tx, _) = broadcast::channel(1);
        let mut tasks = vec![tokio::spawn(run_poll_loop(
            Arc::clone(&self.engine),
            Arc::clone(&self.source),
            Arc::clone(&self.status),
            generation,
            self.config.poll_interval,
            self.config.request_timeout,
            stop_tx.subscribe(),
        ))];

        if self.source.supports_push() {
            tasks.push(tokio::spawn(run_push_loop(
                Arc::clone(&self.engine),
                Arc::clone(&self.source),
                Arc::clone(&self.status),
                generation,
                self.config.reconnect_delay,
                stop_tx.subscribe(),
            )));
        }

        ActiveCycle { stop_tx, tasks }
    }

    /// Disables the session and stops its background tasks.
    pub async fn shutdown(&self) {
        self.set_enabled(false);
        let _ = self.shutdown_tx.send(());

        let handles: Vec<_> = std::mem::take(&mut *self.background.lock());
        for handle in handles {
            if let Err(e) = handle.await {
                if !e.is_cancelled() {
                    warn!(network = %self.name, error = %e, "session task failed");
                }
            }
        }
        info!(network = %self.name, "feed session shutdown complete");
    }
}

/// Polls immediately, then every `poll_interval`, until stopped.
async fn run_poll_loop(
    engine: Arc<ReconciliationEngine>,
    source: Arc<dyn EventSource>,
    status: Arc<StatusCell>,
    generation: u64,
    poll_interval: Duration,
    request_timeout: Duration,
    mut stop_rx: broadcast::Receiver<()>,
) {
    let mut interval = tokio::time::interval(poll_interval);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            biased;

            _ = stop_rx.recv() => {
                debug!(network = %engine.network(), "poll loop stopped");
                break;
            }

            _ = interval.tick() => {
                poll_once(&engine, source.as_ref(), &status, generation, request_timeout).await;
            }
        }
    }
}

/// One poll cycle. Every failure is logged and treated as "no data this cycle".
async fn poll_once(
    engine: &ReconciliationEngine,
    source: &dyn EventSource,
    status: &StatusCell,
    generation: u64,
    request_timeout: Duration,
) {
    let network = engine.network();

    match tokio::time::timeout(request_timeout, source.poll_latest()).await {
        Ok(Ok(Some(polled))) => {
            status.mark_connected();
            if let Some(outcome) = engine.ingest_polled(generation, &polled) {
                if outcome.changed() {
                    debug!(
                        network = %network,
                        hash = %polled.block.hash,
                        number = ?polled.block.number,
                        appended = outcome.appended,
                        "poll ingested"
                    );
                }
            }
        }
        Ok(Ok(None)) => {
            status.mark_connected();
            debug!(network = %network, "poll returned no data");
        }
        Ok(Err(SourceError::Parse(e))) => {
            status.mark_connected();
            warn!(network = %network, error = %e, "malformed poll response");
        }
        Ok(Err(e)) => {
            warn!(network = %network, error = %e, transient = e.is_transient(), "poll failed");
            status.mark_failed(e.to_string());
        }
        Err(_) => {
            warn!(network = %network, timeout_ms = request_timeout.as_millis(), "poll timed out");
            status.mark_failed(SourceError::Timeout.to_string());
        }
    }
}

/// Keeps a push subscription alive, reconnecting after a fixed delay until stopped.
async fn run_push_loop(
    engine: Arc<ReconciliationEngine>,
    source: Arc<dyn EventSource>,
    status: Arc<StatusCell>,
    generation: u64,
    reconnect_delay: Duration,
    mut stop_rx: broadcast::Receiver<()>,
) {
    let network = Arc::clone(engine.network());

    loop {
        let (push_tx, mut push_rx) = mpsc::channel(PUSH_BUFFER);
        let subscription = source.subscribe(push_tx);
        tokio::pin!(subscription);

        let result = loop {
            tokio::select! {
                biased;

                _ = stop_rx.recv() => {
                    debug!(network = %network, "push loop stopped");
                    return;
                }

                Some(event) = push_rx.recv() => {
                    handle_push_event(&engine, &status, generation, event);
                }

                result = &mut subscription => break result,
            }
        };

        while let Ok(event) = push_rx.try_recv() {
            handle_push_event(&engine, &status, generation, event);
        }

        match result {
            Ok(()) => {
                warn!(network = %network, "push subscription closed");
                status.mark_closed();
            }
            Err(e) => {
                warn!(network = %network, error = %e, "push subscription failed");
                status.mark_failed(e.to_string());
            }
        }

        info!(
            network = %network,
            delay_ms = reconnect_delay.as_millis(),
            "reconnecting push subscription"
        );
        tokio::select! {
            biased;

            _ = stop_rx.recv() => {
                debug!(network = %network, "reconnect suppressed by disable");
                return;
            }

            () = tokio::time::sleep(reconnect_delay) => {}
        }
        status.mark_connecting();
    }
}

fn handle_push_event(
    engine: &ReconciliationEngine,
    status: &StatusCell,
    generation: u64,
    event: PushEvent,
) {
    match event {
        PushEvent::Connected => status.mark_connected(),
        PushEvent::Workshare(workshare) => {
            engine.ingest_workshare(generation, &workshare);
        }
    }
}

/// Safety-net eviction pass on a fixed timer, plus stale in-flight cleanup.
async fn run_eviction_timer(
    engine: Arc<ReconciliationEngine>,
    eviction_interval: Duration,
    stale_after: Duration,
    mut shutdown_rx: broadcast::Receiver<()>,
) {
    let mut interval = tokio::time::interval(eviction_interval);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
    interval.tick().await;

    loop {
        tokio::select! {
            _ = shutdown_rx.recv() => {
                debug!(network = %engine.network(), "eviction timer received shutdown signal");
                break;
            }

            _ = interval.tick() => {
                let evicted = engine.evict_now();
                let pruned = engine.inflight().prune_stale(stale_after);
                if evicted > 0 || pruned > 0 {
                    debug!(network = %engine.network(), evicted, pruned, "periodic eviction");
                }
            }
        }
    }
}
