//! Heartbeat scheduler.
//!
//! A single repeating timer whose cadence follows registry emptiness:
//!
//! ```text
//!            size 0 -> >=1
//!   ┌──────┐ ────────────────▶ ┌────────┐
//!   │ Idle │                   │ Active │
//!   └──────┘ ◀──────────────── └────────┘
//!            size >=1 -> 0
//! ```
//!
//! - Idle: short period, logs locally (nobody to talk to)
//! - Active: long period, broadcasts a keepalive line to every client
//!
//! The scheduler owns exactly one `Interval`. A mode change replaces it, so
//! the previous timer is dropped before the new one can fire.

use std::sync::Arc;
use std::time::Duration;

use relay_core::HeartbeatMode;
use relay_protocol::RelayMessage;
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, Interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::registry::{fan_out, Line, RegistryHandle};

/// Default idle tick period.
pub const DEFAULT_IDLE_INTERVAL: Duration = Duration::from_secs(5);

/// Default active tick period.
pub const DEFAULT_ACTIVE_INTERVAL: Duration = Duration::from_secs(100);

/// Tick periods for each mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HeartbeatConfig {
    pub idle_interval: Duration,
    pub active_interval: Duration,
}

impl Default for HeartbeatConfig {
    fn default() -> Self {
        Self {
            idle_interval: DEFAULT_IDLE_INTERVAL,
            active_interval: DEFAULT_ACTIVE_INTERVAL,
        }
    }
}

impl HeartbeatConfig {
    /// Tick period for a mode.
    pub fn period(&self, mode: HeartbeatMode) -> Duration {
        match mode {
            HeartbeatMode::Idle => self.idle_interval,
            HeartbeatMode::Active => self.active_interval,
        }
    }
}

// ============================================================================
// State Machine
// ============================================================================

/// Two-state machine driven solely by registry emptiness.
#[derive(Debug, Default)]
pub struct HeartbeatState {
    mode: Option<HeartbeatMode>,
    restarts: u64,
}

impl HeartbeatState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feeds the latest registry size.
    ///
    /// Returns the new mode when the timer must be restarted: on the first
    /// evaluation, and whenever the size crosses between zero and non-zero.
    /// Any other change returns `None` and leaves the running timer alone.
    pub fn notify_count_changed(&mut self, new_count: usize) -> Option<HeartbeatMode> {
        let next = HeartbeatMode::for_count(new_count);
        if self.mode == Some(next) {
            return None;
        }

        self.mode = Some(next);
        self.restarts += 1;
        Some(next)
    }

    /// Current mode, if evaluated at least once.
    pub fn mode(&self) -> Option<HeartbeatMode> {
        self.mode
    }

    /// How many timers have been started so far.
    pub fn restarts(&self) -> u64 {
        self.restarts
    }
}

/// Observable scheduler status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct HeartbeatStatus {
    /// Mode of the running timer
    pub mode: HeartbeatMode,
    /// Ticks fired since the current timer started
    pub ticks: u64,
    /// Timers started since the scheduler began
    pub restarts: u64,
}

// ============================================================================
// Scheduler
// ============================================================================

/// Runs the heartbeat timer against a registry.
pub struct HeartbeatScheduler {
    registry: RegistryHandle,
    config: HeartbeatConfig,
    cancel_token: CancellationToken,
    status_tx: watch::Sender<HeartbeatStatus>,
    heartbeat_line: Line,
}

impl HeartbeatScheduler {
    /// Creates a scheduler and the receiver side of its status channel.
    pub fn new(
        registry: RegistryHandle,
        config: HeartbeatConfig,
        cancel_token: CancellationToken,
    ) -> (Self, watch::Receiver<HeartbeatStatus>) {
        let (status_tx, status_rx) = watch::channel(HeartbeatStatus::default());
        let scheduler = Self {
            registry,
            config,
            cancel_token,
            status_tx,
            heartbeat_line: Arc::from(RelayMessage::heartbeat().to_wire()),
        };
        (scheduler, status_rx)
    }

    /// Runs until cancelled or the registry goes away.
    pub async fn run(self) {
        // Subscribe before reading the size so no transition is missed
        let mut events = self.registry.subscribe();
        let mut state = HeartbeatState::new();

        let initial = self.registry.size().await;
        let mut mode = state
            .notify_count_changed(initial)
            .unwrap_or_else(|| HeartbeatMode::for_count(initial));
        let mut ticker = self.start_timer(mode, &state);

        loop {
            tokio::select! {
                _ = self.cancel_token.cancelled() => {
                    debug!("Heartbeat scheduler shutting down");
                    break;
                }

                _ = ticker.tick() => {
                    self.on_tick(mode).await;
                }

                result = events.recv() => {
                    let count = match result {
                        Ok(event) => event.count(),
                        Err(broadcast::error::RecvError::Lagged(n)) => {
                            warn!(skipped = n, "Heartbeat lagged behind registry events");
                            self.registry.size().await
                        }
                        Err(broadcast::error::RecvError::Closed) => {
                            debug!("Registry event channel closed");
                            break;
                        }
                    };

                    if let Some(next) = state.notify_count_changed(count) {
                        mode = next;
                        // Replacing the interval drops the old timer
                        ticker = self.start_timer(mode, &state);
                    }
                }
            }
        }
    }

    /// Starts a fresh timer for `mode`; first tick is one full period away.
    fn start_timer(&self, mode: HeartbeatMode, state: &HeartbeatState) -> Interval {
        let period = self.config.period(mode);
        info!(mode = %mode, period_secs = period.as_secs_f64(), "Heartbeat timer started");

        self.status_tx.send_replace(HeartbeatStatus {
            mode,
            ticks: 0,
            restarts: state.restarts(),
        });

        let mut ticker = interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        ticker
    }

    async fn on_tick(&self, mode: HeartbeatMode) {
        match mode {
            HeartbeatMode::Idle => {
                info!("Waiting for someone to connect");
            }
            HeartbeatMode::Active => {
                let peers = self.registry.snapshot().await;
                let report = fan_out(&peers, &self.heartbeat_line);
                debug!(
                    delivered = report.delivered,
                    dropped = report.dropped,
                    "Heartbeat broadcast"
                );
            }
        }

        self.status_tx.send_modify(|status| status.ticks += 1);
    }
}

/// Spawns the heartbeat scheduler on a tokio task.
pub fn spawn_heartbeat(
    registry: RegistryHandle,
    config: HeartbeatConfig,
    cancel_token: CancellationToken,
) -> (JoinHandle<()>, watch::Receiver<HeartbeatStatus>) {
    let (scheduler, status_rx) = HeartbeatScheduler::new(registry, config, cancel_token);
    (tokio::spawn(scheduler.run()), status_rx)
}
