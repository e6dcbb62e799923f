// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Shared test helpers for scheduler and poller tests.

#![allow(clippy::unwrap_used)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use tether_core::{AuthStateStore, MemoryStore};
use tokio::time::Instant;

use crate::source::{
    BoxFuture, FetchError, FetchResult, Message, MessageSource, RefreshError, RefreshOp,
};

/// Wall clock used by tests, in Unix seconds.
pub const NOW_SECS: i64 = 1_700_000_000;

/// Builds an unsigned token expiring `secs` after [`NOW_SECS`].
pub fn token_expiring_in(secs: i64) -> String {
    let header = URL_SAFE_NO_PAD.encode(r#"{"alg":"HS256","typ":"JWT"}"#);
    let payload = URL_SAFE_NO_PAD.encode(format!(
        r#"{{"userId":"u-1","role":"driver","iat":{},"exp":{}}}"#,
        NOW_SECS - 60,
        NOW_SECS + secs
    ));
    format!("{header}.{payload}.sig")
}

pub fn make_auth() -> Arc<AuthStateStore> {
    Arc::new(AuthStateStore::new(Arc::new(MemoryStore::new())))
}

pub fn make_message(id: &str) -> Message {
    Message::new(id, "conv-1", format!("body of {id}"))
}

/// Refresh op that counts calls and returns a fixed result.
#[derive(Clone, Default)]
pub struct CountingRefresh {
    pub calls: Arc<AtomicUsize>,
    pub fail: bool,
}

impl CountingRefresh {
    pub fn failing() -> Self {
        CountingRefresh { fail: true, ..Default::default() }
    }

    pub fn count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl RefreshOp for CountingRefresh {
    fn refresh(&self) -> BoxFuture<'_, Result<Option<String>, RefreshError>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let fail = self.fail;
        Box::pin(async move {
            if fail {
                Err(RefreshError::Network("offline".into()))
            } else {
                Ok(None)
            }
        })
    }
}

type Scripted = Result<FetchResult<Message>, FetchError>;

/// A fetch call observed by [`ScriptedSource`].
#[derive(Debug, Clone)]
pub struct FetchCall {
    pub conversation_id: String,
    pub after_id: Option<String>,
    pub at: Instant,
}

/// Message source replaying scripted responses, then empty results.
#[derive(Clone, Default)]
pub struct ScriptedSource {
    script: Arc<Mutex<VecDeque<Scripted>>>,
    calls: Arc<Mutex<Vec<FetchCall>>>,
}

impl ScriptedSource {
    pub fn new(script: Vec<Scripted>) -> Self {
        ScriptedSource {
            script: Arc::new(Mutex::new(script.into())),
            calls: Arc::default(),
        }
    }

    pub fn push(&self, response: Scripted) {
        self.script.lock().unwrap().push_back(response);
    }

    pub fn calls(&self) -> Vec<FetchCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    /// Sleeps in small steps (auto-advancing paused time) until `n` fetches
    /// have been made.
    pub async fn wait_for_calls(&self, n: usize) {
        for _ in 0..10_000 {
            if self.call_count() >= n {
                return;
            }
            tokio::time::sleep(std::time::Duration::from_millis(100)).await;
        }
        assert!(
            self.call_count() >= n,
            "expected {n} fetches, saw {}",
            self.call_count()
        );
    }
}

impl MessageSource for ScriptedSource {
    type Message = Message;

    fn fetch(
        &self,
        conversation_id: &str,
        after_id: Option<&str>,
    ) -> BoxFuture<'_, Result<FetchResult<Message>, FetchError>> {
        self.calls.lock().unwrap().push(FetchCall {
            conversation_id: conversation_id.to_string(),
            after_id: after_id.map(str::to_string),
            at: Instant::now(),
        });
        let response = self
            .script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok(FetchResult::empty()));
        Box::pin(async move { response })
    }
}
