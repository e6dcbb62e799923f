// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Background token refresh.
//!
//! [`RefreshScheduler`] checks the stored token on a fixed interval and calls
//! the supplied [`RefreshOp`] once the token is close to expiry. Checks are
//! skipped while the user is idle, so a backgrounded app stops refreshing on
//! its own and resumes after the next [`RefreshScheduler::record_activity`].
//!
//! States:
//!
//! ```text
//!            start()                 stop()
//! Stopped ───────────► Running ─────────────► Stopped
//!                       │   ▲
//!                       └───┘ tick every `interval`
//! ```
//!
//! At most one timer exists per scheduler: `start` while running is a no-op.
//! A failed or panicking refresh is logged and the timer keeps going.

use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use tether_core::config::RefreshSettings;
use tether_core::{token, AuthStateStore, ClockSource, SystemClock};
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tokio_util::task::AbortOnDropHandle;

use crate::source::RefreshOp;

/// Configuration for the refresh scheduler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchedulerConfig {
    /// Time between checks.
    pub interval: Duration,
    /// Idle time after which checks are skipped.
    pub activity_timeout: Duration,
    /// Refresh when this many minutes or fewer remain.
    pub threshold_minutes: u64,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        SchedulerConfig::from(&RefreshSettings::default())
    }
}

impl From<&RefreshSettings> for SchedulerConfig {
    fn from(settings: &RefreshSettings) -> Self {
        SchedulerConfig {
            interval: Duration::from_secs(settings.interval_secs),
            activity_timeout: Duration::from_secs(settings.activity_timeout_secs),
            threshold_minutes: settings.threshold_minutes,
        }
    }
}

/// What a single tick did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// Scheduler is not running.
    Stopped,
    /// User idle past the activity timeout; nothing attempted.
    Idle,
    /// No token stored.
    NoToken,
    /// Reading the token failed; retried on the next tick.
    StoreUnavailable,
    /// Token has enough lifetime left.
    Fresh,
    Refreshed,
    RefreshFailed,
}

/// Diagnostic view of the scheduler.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SchedulerStatus {
    pub is_active: bool,
    pub is_user_active: bool,
    pub time_since_last_activity: Option<Duration>,
}

struct RunningTimer {
    refresh: Arc<dyn RefreshOp>,
    cancel: CancellationToken,
    // Dropped on stop; the task exits through `cancel`.
    _handle: JoinHandle<()>,
}

#[derive(Default)]
struct SchedulerState {
    last_activity: Option<Instant>,
    running: Option<RunningTimer>,
}

struct Shared {
    auth: Arc<AuthStateStore>,
    config: SchedulerConfig,
    clock: Arc<dyn ClockSource>,
    state: Mutex<SchedulerState>,
}

impl Shared {
    fn state(&self) -> MutexGuard<'_, SchedulerState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn is_user_active(&self) -> bool {
        self.state()
            .last_activity
            .is_some_and(|at| at.elapsed() <= self.config.activity_timeout)
    }

    async fn tick(&self, refresh: Arc<dyn RefreshOp>) -> TickOutcome {
        if !self.is_user_active() {
            tracing::debug!("user idle, skipping token refresh check");
            return TickOutcome::Idle;
        }

        let token = match self.auth.get_token() {
            Ok(Some(token)) => token,
            Ok(None) => return TickOutcome::NoToken,
            Err(e) => {
                tracing::warn!("cannot read token for refresh check: {}", e);
                return TickOutcome::StoreUnavailable;
            }
        };

        let now = self.clock.now_secs();
        if !token::should_refresh_at(&token, now, self.config.threshold_minutes) {
            return TickOutcome::Fresh;
        }

        tracing::debug!(
            minutes_left = token::time_to_expiry_minutes_at(&token, now),
            "refreshing token"
        );

        // Own task so a panic stays contained; aborted if the tick is dropped on stop.
        let attempt =
            AbortOnDropHandle::new(tokio::spawn(async move { refresh.refresh().await }));
        match attempt.await {
            Ok(Ok(_)) => {
                tracing::info!("token refreshed");
                TickOutcome::Refreshed
            }
            Ok(Err(e)) => {
                tracing::warn!("background token refresh failed: {}", e);
                TickOutcome::RefreshFailed
            }
            Err(e) => {
                tracing::warn!("background token refresh aborted: {}", e);
                TickOutcome::RefreshFailed
            }
        }
    }
}

/// Periodic, activity-gated token refresher.
///
/// One instance per running application; owned by the composition root and
/// shared behind an `Arc`. Dropping it stops the timer.
pub struct RefreshScheduler {
    shared: Arc<Shared>,
}

impl RefreshScheduler {
    pub fn new(auth: Arc<AuthStateStore>, config: SchedulerConfig) -> Self {
        Self::with_clock(auth, config, Arc::new(SystemClock))
    }

    /// Create a scheduler with a custom wall clock for token expiry (for testing).
    pub fn with_clock(
        auth: Arc<AuthStateStore>,
        config: SchedulerConfig,
        clock: Arc<dyn ClockSource>,
    ) -> Self {
        RefreshScheduler {
            shared: Arc::new(Shared {
                auth,
                config,
                clock,
                state: Mutex::new(SchedulerState::default()),
            }),
        }
    }

    pub fn config(&self) -> &SchedulerConfig {
        &self.shared.config
    }

    /// Arms the timer. Returns false (and changes nothing) if already running
    /// or if called outside a tokio runtime.
    pub fn start<R: RefreshOp + 'static>(&self, refresh: R) -> bool {
        if Handle::try_current().is_err() {
            tracing::warn!("refresh scheduler needs a tokio runtime, not starting");
            return false;
        }
        let mut state = self.shared.state();
        if state.running.is_some() {
            tracing::debug!("refresh scheduler already running");
            return false;
        }
        if state.last_activity.is_none() {
            state.last_activity = Some(Instant::now());
        }

        let refresh: Arc<dyn RefreshOp> = Arc::new(refresh);
        let cancel = CancellationToken::new();
        let handle = tokio::spawn(run_timer(
            Arc::clone(&self.shared),
            Arc::clone(&refresh),
            cancel.clone(),
        ));
        state.running = Some(RunningTimer { refresh, cancel, _handle: handle });

        tracing::info!(
            interval_secs = self.shared.config.interval.as_secs(),
            "refresh scheduler started"
        );
        true
    }

    /// Cancels the timer and any refresh in flight. Returns false if it was
    /// not running.
    pub fn stop(&self) -> bool {
        let Some(timer) = self.shared.state().running.take() else {
            return false;
        };
        timer.cancel.cancel();
        tracing::info!("refresh scheduler stopped");
        true
    }

    /// Marks the user as active now. Allowed in any state.
    pub fn record_activity(&self) {
        self.shared.state().last_activity = Some(Instant::now());
    }

    pub fn is_running(&self) -> bool {
        self.shared.state().running.is_some()
    }

    /// Whether the last activity is within the activity timeout.
    pub fn is_user_active(&self) -> bool {
        self.shared.is_user_active()
    }

    pub fn status(&self) -> SchedulerStatus {
        let state = self.shared.state();
        let since = state.last_activity.map(|at| at.elapsed());
        SchedulerStatus {
            is_active: state.running.is_some(),
            is_user_active: since.is_some_and(|d| d <= self.shared.config.activity_timeout),
            time_since_last_activity: since,
        }
    }

    /// Runs one check immediately, e.g. when the app returns to foreground.
    ///
    /// A `stop` while the check runs abandons it and yields `Stopped`.
    pub async fn tick_now(&self) -> TickOutcome {
        let (refresh, cancel) = match &self.shared.state().running {
            Some(timer) => (Arc::clone(&timer.refresh), timer.cancel.clone()),
            None => return TickOutcome::Stopped,
        };
        tokio::select! {
            _ = cancel.cancelled() => TickOutcome::Stopped,
            outcome = self.shared.tick(refresh) => outcome,
        }
    }
}

impl Drop for RefreshScheduler {
    fn drop(&mut self) {
        if let Some(timer) = self.shared.state().running.take() {
            timer.cancel.cancel();
        }
    }
}

async fn run_timer(shared: Arc<Shared>, refresh: Arc<dyn RefreshOp>, cancel: CancellationToken) {
    let period = shared.config.interval;
    let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = cancel.cancelled() => return,
            _ = ticker.tick() => {}
        }

        let outcome = tokio::select! {
            _ = cancel.cancelled() => return,
            outcome = shared.tick(Arc::clone(&refresh)) => outcome,
        };
        tracing::trace!(?outcome, "refresh tick");
    }
}

#[cfg(test)]
#[path = "scheduler_tests.rs"]
mod tests;
