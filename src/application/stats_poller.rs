use crate::application::endpoint_resolver::{EndpointResolver, NowProvider};
use crate::domain::models::SystemStats;
use crate::infrastructure::agent_client::AgentClient;
use crate::infrastructure::config::DEFAULT_STATS_POLL_INTERVAL_MS;
use crate::infrastructure::error::InfraError;
use chrono::{DateTime, Utc};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::task::JoinHandle;

#[derive(Debug, Clone, PartialEq)]
pub struct StatsSnapshot {
    pub stats: SystemStats,
    pub fetched_at: DateTime<Utc>,
}

struct PollerInner<C: AgentClient> {
    resolver: Arc<EndpointResolver<C>>,
    snapshot: Mutex<Option<StatsSnapshot>>,
    epoch: AtomicU64,
}

/// Background loop that refreshes the stats snapshot once per interval.
/// `start` runs the first cycle immediately; `stop` aborts the task and bumps
/// the epoch so an in-flight fetch cannot write a stale snapshot afterwards.
/// The last snapshot survives a stop.
pub struct StatsPoller<C: AgentClient> {
    inner: Arc<PollerInner<C>>,
    interval: Duration,
    now: NowProvider,
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl<C: AgentClient + 'static> StatsPoller<C> {
    pub fn new(resolver: Arc<EndpointResolver<C>>) -> Self {
        Self {
            inner: Arc::new(PollerInner {
                resolver,
                snapshot: Mutex::new(None),
                epoch: AtomicU64::new(0),
            }),
            interval: Duration::from_millis(DEFAULT_STATS_POLL_INTERVAL_MS),
            now: Arc::new(Utc::now),
            handle: Mutex::new(None),
        }
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    pub fn with_now_provider(mut self, provider: NowProvider) -> Self {
        self.now = provider;
        self
    }

    /// Spawns the polling task. A second start while the loop is alive is a
    /// no-op.
    pub fn start(&self) -> Result<(), InfraError> {
        let mut handle = self.lock_handle()?;
        if handle.as_ref().is_some_and(|task| !task.is_finished()) {
            return Ok(());
        }

        let epoch = self.inner.epoch.fetch_add(1, Ordering::SeqCst) + 1;
        let inner = self.inner.clone();
        let interval = self.interval;
        let now = self.now.clone();
        *handle = Some(tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            loop {
                ticker.tick().await;
                let result = inner.resolver.resolve().await;
                if let Ok(stats) = result {
                    store_snapshot(&inner, epoch, stats, &now);
                }
            }
        }));
        Ok(())
    }

    pub fn stop(&self) -> Result<(), InfraError> {
        let mut handle = self.lock_handle()?;
        self.inner.epoch.fetch_add(1, Ordering::SeqCst);
        if let Some(task) = handle.take() {
            task.abort();
        }
        Ok(())
    }

    pub fn is_running(&self) -> Result<bool, InfraError> {
        let handle = self.lock_handle()?;
        Ok(handle.as_ref().is_some_and(|task| !task.is_finished()))
    }

    pub fn snapshot(&self) -> Result<Option<StatsSnapshot>, InfraError> {
        self.inner
            .snapshot
            .lock()
            .map(|slot| slot.clone())
            .map_err(|_| InfraError::InvalidConfig("stats snapshot lock poisoned".to_string()))
    }

    fn lock_handle(&self) -> Result<MutexGuard<'_, Option<JoinHandle<()>>>, InfraError> {
        self.handle
            .lock()
            .map_err(|_| InfraError::InvalidConfig("stats poller lock poisoned".to_string()))
    }
}

/// Writes one cycle's result unless the poller was stopped or restarted while
/// the fetch was in flight.
fn store_snapshot<C: AgentClient>(
    inner: &PollerInner<C>,
    epoch: u64,
    stats: SystemStats,
    now: &NowProvider,
) {
    if inner.epoch.load(Ordering::SeqCst) != epoch {
        return;
    }
    let snapshot = StatsSnapshot {
        stats,
        fetched_at: now(),
    };
    if let Ok(mut slot) = inner.snapshot.lock() {
        *slot = Some(snapshot);
    }
}
