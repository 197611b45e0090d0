use std::future::Future;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{self, Instant, MissedTickBehavior};

/// Recurring poll driver.
///
/// After an initial warm-up delay, calls the tick function once per
/// interval until stopped or until the tick function returns `false`.
/// Ticks that cannot be delivered on time are skipped rather than bunched.
pub struct PollTicker {
    /// Ticker task
    task: Option<JoinHandle<()>>,
}

impl PollTicker {
    /// Create a stopped ticker
    pub fn new() -> Self {
        Self { task: None }
    }

    /// Start ticking, replacing any previous schedule.
    ///
    /// The first tick fires `warmup` after this call, then every `interval`.
    pub fn start<F, Fut>(&mut self, warmup: Duration, interval: Duration, mut on_tick: F)
    where
        F: FnMut() -> Fut + Send + 'static,
        Fut: Future<Output = bool> + Send + 'static,
    {
        self.stop();

        let task = tokio::spawn(async move {
            let mut ticks = time::interval_at(Instant::now() + warmup, interval);
            ticks.set_missed_tick_behavior(MissedTickBehavior::Skip);

            loop {
                ticks.tick().await;
                if !on_tick().await {
                    tracing::debug!("Tick receiver gone, stopping poll ticker");
                    break;
                }
            }
        });

        tracing::debug!(?warmup, ?interval, "Poll ticker started");
        self.task = Some(task);
    }

    /// Stop ticking. Idempotent.
    pub fn stop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
            tracing::debug!("Poll ticker stopped");
        }
    }

    /// Whether the ticker is scheduled
    pub fn is_running(&self) -> bool {
        self.task.as_ref().is_some_and(|task| !task.is_finished())
    }
}

impl Default for PollTicker {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for PollTicker {
    fn drop(&mut self) {
        self.stop();
    }
}
