//! Polling state machine that owns the canonical monitor list.
//!
//! A background task refreshes the list on a fixed interval; readers only
//! ever take a cloned snapshot. Every state write is guarded by an epoch
//! check, so results from a cycle that was in flight when the manager was
//! stopped or restarted are discarded instead of applied.

use std::sync::{
    Arc, Mutex,
    atomic::{AtomicU64, Ordering},
};

use chrono::{DateTime, Utc};
use client::{HttpMetricsClient, MetricsProvider, StatusPageClient, build_sections};
use config::PollerConfig;
use primitives::{AggregateStatus, Monitor, StatusPageSection};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Read-only view of the poller's state. Readers always observe a fully
/// formed snapshot; the backing list is replaced, never mutated in place.
#[derive(Debug, Clone, Default)]
pub struct PollerSnapshot {
    /// Current monitor list, sorted by ID.
    pub monitors: Vec<Monitor>,
    /// Grouped view; empty when grouping is disabled.
    pub sections: Vec<StatusPageSection>,
    /// Completion time of the last refresh cycle that ran a fetch.
    pub last_updated: Option<DateTime<Utc>>,
    /// Whether a refresh cycle is currently running.
    pub refreshing: bool,
    /// User-facing message for the last failed refresh, if any.
    pub error: Option<String>,
    /// Whether the endpoint is missing and the agent needs configuring.
    pub needs_setup: bool,
}

impl PollerSnapshot {
    /// Aggregate health signal, recomputed from the current list.
    pub fn aggregate_status(&self) -> AggregateStatus {
        AggregateStatus::from_monitors(&self.monitors)
    }

    /// Number of monitors whose status is not up.
    pub fn unhealthy_count(&self) -> usize {
        self.monitors.iter().filter(|m| !m.is_up()).count()
    }
}

/// Builds a metrics provider for a configuration snapshot. Production wires
/// the live HTTP client; tests substitute fixture or failing doubles.
pub type ProviderFactory = dyn Fn(&PollerConfig) -> Arc<dyn MetricsProvider> + Send + Sync;

#[derive(Debug, Default)]
struct Shared {
    state: Mutex<PollerSnapshot>,
    /// Bumped on every restart/stop. Cycles may only write state while the
    /// epoch they were started under is still current.
    epoch: AtomicU64,
}

impl Shared {
    /// Runs `mutate` on the state if `epoch` is still current. A cycle from
    /// a cancelled session silently loses its write.
    fn with_live_state<T>(
        &self,
        epoch: u64,
        mutate: impl FnOnce(&mut PollerSnapshot) -> T,
    ) -> Option<T> {
        let mut state = self.state.lock().expect("state lock poisoned");
        (self.epoch.load(Ordering::SeqCst) == epoch).then(|| mutate(&mut state))
    }
}

/// Everything one polling session needs, captured at (re)start time.
/// Configuration changes only take effect through a restart.
struct PollSession {
    config: PollerConfig,
    provider: Arc<dyn MetricsProvider>,
    status_pages: Option<StatusPageClient>,
    epoch: u64,
}

impl std::fmt::Debug for PollSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PollSession")
            .field("config", &self.config)
            .field("epoch", &self.epoch)
            .finish_non_exhaustive()
    }
}

/// Owns the authoritative monitor list and the refresh loop.
pub struct PollingManager {
    shared: Arc<Shared>,
    factory: Arc<ProviderFactory>,
    session: Mutex<Arc<PollSession>>,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl PollingManager {
    /// Creates a manager and immediately starts polling with `config`.
    /// Must be called from within a tokio runtime.
    pub fn new<F>(config: PollerConfig, factory: F) -> Self
    where
        F: Fn(&PollerConfig) -> Arc<dyn MetricsProvider> + Send + Sync + 'static,
    {
        let factory: Arc<ProviderFactory> = Arc::new(factory);
        let session = Arc::new(Self::build_session(&*factory, config, 0));
        let manager = Self {
            shared: Arc::new(Shared::default()),
            factory,
            session: Mutex::new(Arc::clone(&session)),
            task: Mutex::new(None),
        };
        manager.spawn_loop(session);
        manager
    }

    /// Creates a manager backed by the live HTTP client.
    pub fn with_http(config: PollerConfig) -> Self {
        Self::new(config, |config: &PollerConfig| {
            Arc::new(HttpMetricsClient::new(
                config.metrics_url.clone(),
                config.username.clone(),
                config.password.clone(),
            )) as Arc<dyn MetricsProvider>
        })
    }

    /// Clones the current snapshot.
    pub fn snapshot(&self) -> PollerSnapshot {
        self.shared.state.lock().expect("state lock poisoned").clone()
    }

    /// Aggregate health signal for the current snapshot.
    pub fn aggregate_status(&self) -> AggregateStatus {
        self.snapshot().aggregate_status()
    }

    /// Runs one refresh cycle immediately, without resetting the interval
    /// timer.
    pub async fn refresh(&self) {
        let session = Arc::clone(&self.session.lock().expect("session lock poisoned"));
        run_cycle(&self.shared, &session).await;
    }

    /// Cancels the current loop and starts a fresh polling session with
    /// `config`. The last good monitor list is kept; an in-flight cycle
    /// from the old session cannot write into the new state.
    pub fn restart(&self, config: PollerConfig) {
        let epoch = self.bump_epoch();
        info!(interval = ?config.refresh_interval, "restarting poller");
        let session = Arc::new(Self::build_session(&*self.factory, config, epoch));
        *self.session.lock().expect("session lock poisoned") = Arc::clone(&session);
        self.shared.state.lock().expect("state lock poisoned").refreshing = false;
        self.spawn_loop(session);
    }

    /// Stops the loop deterministically. No state mutation can happen once
    /// this returns, including from fetches still outstanding.
    pub fn stop(&self) {
        self.bump_epoch();
        if let Some(task) = self.task.lock().expect("task lock poisoned").take() {
            task.abort();
        }
    }

    /// Bumps the epoch while holding the state lock, so no cycle can pass
    /// its liveness check and still write after the bump.
    fn bump_epoch(&self) -> u64 {
        let _state = self.shared.state.lock().expect("state lock poisoned");
        self.shared.epoch.fetch_add(1, Ordering::SeqCst) + 1
    }

    fn build_session(factory: &ProviderFactory, config: PollerConfig, epoch: u64) -> PollSession {
        let status_pages = (config.grouping_enabled && !config.status_pages.is_empty())
            .then(|| config.status_page_base().map(StatusPageClient::new))
            .flatten();
        PollSession { provider: factory(&config), status_pages, config, epoch }
    }

    fn spawn_loop(&self, session: Arc<PollSession>) {
        let shared = Arc::clone(&self.shared);
        let handle = tokio::spawn(async move {
            let mut interval = tokio::time::interval(session.config.refresh_interval);
            loop {
                // First tick completes immediately: the first fetch runs on
                // construction, not one interval later.
                interval.tick().await;
                if shared.epoch.load(Ordering::SeqCst) != session.epoch {
                    break;
                }
                run_cycle(&shared, &session).await;
            }
        });
        if let Some(old) = self.task.lock().expect("task lock poisoned").replace(handle) {
            old.abort();
        }
    }
}

impl std::fmt::Debug for PollingManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PollingManager").finish_non_exhaustive()
    }
}

impl Drop for PollingManager {
    fn drop(&mut self) {
        self.stop();
    }
}

/// One refresh cycle: fetch, apply, optionally resolve groupings.
async fn run_cycle(shared: &Shared, session: &PollSession) {
    if !session.config.is_configured() {
        // Re-checked every interval in case configuration becomes valid;
        // `last_updated` is not advanced.
        shared.with_live_state(session.epoch, |state| state.needs_setup = true);
        debug!("no endpoint configured, skipping refresh");
        return;
    }

    if shared
        .with_live_state(session.epoch, |state| {
            state.needs_setup = false;
            state.refreshing = true;
        })
        .is_none()
    {
        return;
    }

    let fetched = match session.provider.monitors().await {
        Ok(monitors) => {
            debug!(count = monitors.len(), "refresh fetched monitors");
            let applied = shared.with_live_state(session.epoch, |state| {
                state.monitors = monitors.clone();
                state.error = None;
            });
            if applied.is_none() {
                return;
            }
            Some(monitors)
        }
        Err(err) => {
            warn!(error = %err, "refresh failed, keeping previous monitor list");
            if shared
                .with_live_state(session.epoch, |state| state.error = Some(err.user_message()))
                .is_none()
            {
                return;
            }
            None
        }
    };

    // Groups are resolved against the list fetched in this same cycle,
    // never a stale one; on a failed fetch the previous grouped view is
    // kept alongside the previous list.
    if let Some(monitors) = fetched {
        if let Some(status_pages) = &session.status_pages {
            let summaries = status_pages.fetch_status_pages(&session.config.status_pages).await;
            let sections = build_sections(&summaries, &monitors);
            if shared
                .with_live_state(session.epoch, |state| state.sections = sections)
                .is_none()
            {
                return;
            }
        } else if shared
            .with_live_state(session.epoch, |state| state.sections.clear())
            .is_none()
        {
            return;
        }
    }

    shared.with_live_state(session.epoch, |state| {
        state.last_updated = Some(Utc::now());
        state.refreshing = false;
    });
}
