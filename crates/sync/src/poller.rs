// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Conversation message polling.
//!
//! A [`MessagePoller`] runs fetch-then-stop cycles against a [`MessageSource`]:
//! it fetches messages newer than its cursor, retries on a fixed delay while
//! the result is empty or failing, and stops as soon as a batch arrives. The
//! batch is buffered until the caller pulls it with
//! [`MessagePoller::consume_new_messages`].
//!
//! ```text
//!          start()           non-empty batch
//! Idle ─────────────► Polling ───────────────► Idle
//!  ▲                   │  ▲
//!  │         stop()    │  └── empty: wait empty_delay
//!  └──── Cancelled ◄───┘      error: wait error_delay
//! ```
//!
//! Every session carries an epoch. `stop` and `start` bump it, and a fetch
//! that resolves under an older epoch is discarded, so the cursor never
//! regresses because of a stale request.

use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use tether_core::config::PollingSettings;
use tether_core::AuthStateStore;
use tokio::runtime::Handle;
use tokio_util::sync::CancellationToken;

use crate::source::{FetchResult, Identified, MessageSource};

/// Configuration for the message poller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PollerConfig {
    /// Wait before re-polling after an empty result.
    pub empty_delay: Duration,
    /// Wait before re-polling after a failed fetch.
    pub error_delay: Duration,
    /// Conversations whose id starts with this were created locally and are
    /// not known to the server yet.
    pub local_conversation_prefix: String,
}

impl Default for PollerConfig {
    fn default() -> Self {
        PollerConfig::from(&PollingSettings::default())
    }
}

impl From<&PollingSettings> for PollerConfig {
    fn from(settings: &PollingSettings) -> Self {
        PollerConfig {
            empty_delay: Duration::from_secs(settings.empty_delay_secs),
            error_delay: Duration::from_secs(settings.error_delay_secs),
            local_conversation_prefix: settings.local_conversation_prefix.clone(),
        }
    }
}

impl PollerConfig {
    /// Whether `conversation_id` can be polled at all.
    pub fn is_remote_conversation(&self, conversation_id: &str) -> bool {
        !conversation_id.is_empty()
            && (self.local_conversation_prefix.is_empty()
                || !conversation_id.starts_with(&self.local_conversation_prefix))
    }
}

/// Poller lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PollState {
    #[default]
    Idle,
    Polling,
    Cancelled,
}

struct Session<M> {
    state: PollState,
    conversation_id: Option<String>,
    cursor: Option<String>,
    buffer: Vec<M>,
    epoch: u64,
    attempts: u32,
    cancel: Option<CancellationToken>,
}

impl<M> Default for Session<M> {
    fn default() -> Self {
        Session {
            state: PollState::Idle,
            conversation_id: None,
            cursor: None,
            buffer: Vec::new(),
            epoch: 0,
            attempts: 0,
            cancel: None,
        }
    }
}

impl<M> Session<M> {
    fn cancel(&mut self) -> bool {
        let was_polling = self.state == PollState::Polling;
        if let Some(cancel) = self.cancel.take() {
            cancel.cancel();
        }
        self.epoch += 1;
        if was_polling {
            self.state = PollState::Cancelled;
        }
        was_polling
    }
}

type SharedSession<M> = Arc<Mutex<Session<M>>>;

fn lock<M>(session: &SharedSession<M>) -> MutexGuard<'_, Session<M>> {
    session.lock().unwrap_or_else(|e| e.into_inner())
}

/// How a fetched batch was applied.
enum Applied {
    /// New messages buffered; the cycle is over.
    Delivered(usize),
    /// Every message was already seen.
    Duplicate,
    /// The session moved on while the fetch was in flight.
    Stale,
}

/// Polls one conversation at a time.
///
/// Owned by the view showing the conversation. Call [`stop`](Self::stop) when
/// the view goes away; dropping the poller does the same.
pub struct MessagePoller<S: MessageSource> {
    source: Arc<S>,
    auth: Arc<AuthStateStore>,
    config: PollerConfig,
    session: SharedSession<S::Message>,
}

impl<S: MessageSource> MessagePoller<S> {
    pub fn new(source: Arc<S>, auth: Arc<AuthStateStore>, config: PollerConfig) -> Self {
        MessagePoller {
            source,
            auth,
            config,
            session: Arc::new(Mutex::new(Session::default())),
        }
    }

    pub fn config(&self) -> &PollerConfig {
        &self.config
    }

    /// Starts a fetch cycle for `conversation_id`.
    ///
    /// Returns false without doing anything if already polling, if no token
    /// is stored, if the conversation only exists locally, or if called
    /// outside a tokio runtime. Starting on a different conversation than
    /// last time resets the cursor and drops unconsumed messages.
    pub fn start(&self, conversation_id: &str) -> bool {
        if Handle::try_current().is_err() {
            tracing::warn!("message poller needs a tokio runtime, not polling");
            return false;
        }
        if !self.config.is_remote_conversation(conversation_id) {
            tracing::debug!(conversation_id, "not polling local conversation");
            return false;
        }
        if self.state() == PollState::Polling {
            return false;
        }
        match self.auth.get_token() {
            Ok(Some(token)) if !token.is_empty() => {}
            Ok(_) => {
                tracing::debug!("no token, not polling");
                return false;
            }
            Err(e) => {
                tracing::warn!("cannot read token, not polling: {}", e);
                return false;
            }
        }

        let mut session = lock(&self.session);
        if session.state == PollState::Polling {
            return false;
        }
        if session.conversation_id.as_deref() != Some(conversation_id) {
            session.conversation_id = Some(conversation_id.to_string());
            session.cursor = None;
            session.buffer.clear();
        }
        session.epoch += 1;
        session.attempts = 0;
        session.state = PollState::Polling;
        let cancel = CancellationToken::new();
        session.cancel = Some(cancel.clone());

        tokio::spawn(poll_loop(
            Arc::clone(&self.source),
            Arc::clone(&self.session),
            self.config.clone(),
            conversation_id.to_string(),
            session.epoch,
            cancel,
        ));
        true
    }

    /// Cancels the pending retry and any in-flight fetch.
    ///
    /// Returns false if nothing was polling. Buffered messages and the cursor
    /// are kept.
    pub fn stop(&self) -> bool {
        let stopped = lock(&self.session).cancel();
        if stopped {
            tracing::debug!("message polling stopped");
        }
        stopped
    }

    /// Hands buffered messages to `callback` and clears the buffer.
    ///
    /// Returns false, without calling `callback`, when nothing is buffered.
    pub fn consume_new_messages<F>(&self, callback: F) -> bool
    where
        F: FnOnce(Vec<S::Message>),
    {
        let messages = std::mem::take(&mut lock(&self.session).buffer);
        if messages.is_empty() {
            return false;
        }
        callback(messages);
        true
    }

    pub fn state(&self) -> PollState {
        lock(&self.session).state
    }

    pub fn is_polling(&self) -> bool {
        self.state() == PollState::Polling
    }

    /// Id of the newest message seen in the current conversation.
    pub fn cursor(&self) -> Option<String> {
        lock(&self.session).cursor.clone()
    }

    pub fn conversation_id(&self) -> Option<String> {
        lock(&self.session).conversation_id.clone()
    }

    /// Fetches issued since the last `start`.
    pub fn attempts(&self) -> u32 {
        lock(&self.session).attempts
    }
}

impl<S: MessageSource> Drop for MessagePoller<S> {
    fn drop(&mut self) {
        lock(&self.session).cancel();
    }
}

async fn poll_loop<S: MessageSource>(
    source: Arc<S>,
    session: SharedSession<S::Message>,
    config: PollerConfig,
    conversation_id: String,
    epoch: u64,
    cancel: CancellationToken,
) {
    loop {
        let cursor = {
            let mut current = lock(&session);
            if current.epoch != epoch {
                return;
            }
            current.attempts += 1;
            current.cursor.clone()
        };

        let result = tokio::select! {
            _ = cancel.cancelled() => return,
            result = source.fetch(&conversation_id, cursor.as_deref()) => result,
        };

        let delay = match result {
            Ok(FetchResult { messages, success: true }) if !messages.is_empty() => {
                match apply_batch(&session, epoch, messages) {
                    Applied::Delivered(count) => {
                        tracing::debug!(
                            conversation_id = %conversation_id,
                            count,
                            "new messages buffered"
                        );
                        return;
                    }
                    Applied::Stale => {
                        tracing::debug!(
                            conversation_id = %conversation_id,
                            "discarding stale poll result"
                        );
                        return;
                    }
                    Applied::Duplicate => config.empty_delay,
                }
            }
            Ok(FetchResult { success: true, .. }) => {
                tracing::trace!(conversation_id = %conversation_id, "no new messages");
                config.empty_delay
            }
            Ok(FetchResult { success: false, .. }) => {
                tracing::warn!(
                    conversation_id = %conversation_id,
                    "message fetch reported failure, retrying"
                );
                config.error_delay
            }
            Err(e) => {
                tracing::warn!(
                    conversation_id = %conversation_id,
                    "message fetch failed, retrying: {}",
                    e
                );
                config.error_delay
            }
        };

        tokio::select! {
            _ = cancel.cancelled() => return,
            _ = tokio::time::sleep(delay) => {}
        }
    }
}

fn apply_batch<M: Identified>(session: &SharedSession<M>, epoch: u64, messages: Vec<M>) -> Applied {
    let mut current = lock(session);
    if current.epoch != epoch {
        return Applied::Stale;
    }

    let fresh: Vec<M> = messages
        .into_iter()
        .filter(|m| {
            current.cursor.as_deref() != Some(m.id())
                && !current.buffer.iter().any(|b| b.id() == m.id())
        })
        .collect();
    let Some(last) = fresh.last() else {
        return Applied::Duplicate;
    };

    current.cursor = Some(last.id().to_string());
    let count = fresh.len();
    current.buffer.extend(fresh);
    current.state = PollState::Idle;
    current.cancel = None;
    Applied::Delivered(count)
}

#[cfg(test)]
#[path = "poller_tests.rs"]
mod tests;
