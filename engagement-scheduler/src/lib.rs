mod cycle;
mod pacing;


pub use pacing::{Clock, FastrandSource, RandomSource, SystemClock};

use banter_core::{ActivityLog, ConfigStore, SocialClient};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

/// Fixed scheduler defaults. Pacing bounds are policy-driven; everything
/// here is deliberately not exposed through the settings store.
#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    /// Interval between polling cycles.
    pub poll_interval: Duration,
    /// Maximum post age that still qualifies for a reply.
    pub freshness_window: Duration,
    /// Chance that an otherwise-eligible post actually gets a reply.
    pub engagement_probability: f64,
    /// Chance of appending an emoji to the chosen template text.
    pub emoji_probability: f64,
    /// Page size for recent-post fetches.
    pub fetch_page_size: u32,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(5 * 60),
            freshness_window: Duration::from_secs(60 * 60),
            engagement_probability: 0.3,
            emoji_probability: 0.3,
            fetch_page_size: 10,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerState {
    Stopped,
    Running,
}

impl fmt::Display for SchedulerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SchedulerState::Stopped => f.write_str("stopped"),
            SchedulerState::Running => f.write_str("running"),
        }
    }
}

struct RunHandle {
    shutdown: watch::Sender<bool>,
    task: JoinHandle<()>,
}

/// Drives the poll-and-reply loop: one task, one cycle at a time, accounts
/// processed sequentially so pacing delays actually bound the outbound rate.
pub struct EngagementScheduler {
    store: Arc<dyn ConfigStore>,
    client: Arc<dyn SocialClient>,
    activity_log: Arc<dyn ActivityLog>,
    rng: Arc<dyn RandomSource>,
    clock: Arc<dyn Clock>,
    config: SchedulerConfig,
    run: Mutex<Option<RunHandle>>,
}

impl EngagementScheduler {
    pub fn new(
        store: Arc<dyn ConfigStore>,
        client: Arc<dyn SocialClient>,
        activity_log: Arc<dyn ActivityLog>,
    ) -> Self {
        Self {
            store,
            client,
            activity_log,
            rng: Arc::new(FastrandSource),
            clock: Arc::new(SystemClock),
            config: SchedulerConfig::default(),
            run: Mutex::new(None),
        }
    }

    pub fn with_config(mut self, config: SchedulerConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_random_source(mut self, rng: Arc<dyn RandomSource>) -> Self {
        self.rng = rng;
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Start the polling loop. A no-op when already running.
    pub async fn start(self: Arc<Self>) -> SchedulerState {
        let mut run = self.run.lock().await;
        if let Some(handle) = run.as_ref() {
            if !handle.task.is_finished() {
                info!("Scheduler start requested while already running");
                return SchedulerState::Running;
            }
        }

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let scheduler = Arc::clone(&self);
        let task = tokio::spawn(async move {
            scheduler.run_loop(shutdown_rx).await;
        });
        *run = Some(RunHandle {
            shutdown: shutdown_tx,
            task,
        });
        info!("Engagement scheduler started");
        SchedulerState::Running
    }

    /// Stop the polling loop. An in-flight cycle observes the shutdown at
    /// its next suspension point and abandons the rest without publishing
    /// further replies. A no-op when already stopped.
    pub async fn stop(&self) -> SchedulerState {
        let handle = self.run.lock().await.take();
        match handle {
            None => {
                info!("Scheduler stop requested while already stopped");
            }
            Some(handle) => {
                let _ = handle.shutdown.send(true);
                if let Err(e) = handle.task.await {
                    error!("Scheduler task ended abnormally: {}", e);
                }
                info!("Engagement scheduler stopped");
            }
        }
        SchedulerState::Stopped
    }

    pub async fn state(&self) -> SchedulerState {
        match self.run.lock().await.as_ref() {
            Some(handle) if !handle.task.is_finished() => SchedulerState::Running,
            _ => SchedulerState::Stopped,
        }
    }

    pub async fn is_running(&self) -> bool {
        self.state().await == SchedulerState::Running
    }

    async fn run_loop(&self, mut shutdown: watch::Receiver<bool>) {
        loop {
            if self
                .wait_or_cancel(self.config.poll_interval, &mut shutdown)
                .await
            {
                break;
            }
            self.run_cycle(&mut shutdown).await;
        }
        debug!("Scheduler loop exited");
    }

    /// Sleep for `duration` unless shutdown is signalled first. Returns true
    /// when the wait was cancelled.
    pub(crate) async fn wait_or_cancel(
        &self,
        duration: Duration,
        shutdown: &mut watch::Receiver<bool>,
    ) -> bool {
        if *shutdown.borrow() {
            return true;
        }
        tokio::select! {
            _ = self.clock.sleep(duration) => false,
            _ = shutdown.wait_for(|stop| *stop) => true,
        }
    }
}
