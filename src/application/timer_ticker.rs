use crate::infrastructure::error::InfraError;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::task::JoinHandle;

pub type TickFn = Arc<dyn Fn() + Send + Sync>;

pub const TICK_INTERVAL: Duration = Duration::from_secs(1);

/// Drives the countdown clock. The callback is invoked once per interval
/// while started; the timer engine itself decides whether a tick does
/// anything.
pub struct TimerTicker {
    tick: TickFn,
    interval: Duration,
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl TimerTicker {
    pub fn new(tick: TickFn) -> Self {
        Self {
            tick,
            interval: TICK_INTERVAL,
            handle: Mutex::new(None),
        }
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    /// Spawns the ticking task. The first callback fires one interval after
    /// the start, not immediately. A second start while the task is alive is
    /// a no-op.
    pub fn start(&self) -> Result<(), InfraError> {
        let mut handle = self.lock_handle()?;
        if handle.as_ref().is_some_and(|task| !task.is_finished()) {
            return Ok(());
        }

        let tick = self.tick.clone();
        let interval = self.interval;
        *handle = Some(tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.tick().await;
            loop {
                ticker.tick().await;
                tick();
            }
        }));
        Ok(())
    }

    pub fn stop(&self) -> Result<(), InfraError> {
        let mut handle = self.lock_handle()?;
        if let Some(task) = handle.take() {
            task.abort();
        }
        Ok(())
    }

    pub fn is_running(&self) -> Result<bool, InfraError> {
        let handle = self.lock_handle()?;
        Ok(handle.as_ref().is_some_and(|task| !task.is_finished()))
    }

    fn lock_handle(&self) -> Result<MutexGuard<'_, Option<JoinHandle<()>>>, InfraError> {
        self.handle
            .lock()
            .map_err(|_| InfraError::InvalidConfig("timer ticker lock poisoned".to_string()))
    }
}
