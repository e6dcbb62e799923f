// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

#![allow(dead_code)]
#![allow(clippy::unwrap_used)]

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
pub use tether::*;

/// Builds an unsigned token expiring `secs` after `now`.
pub fn token_at(now: i64, secs: i64) -> String {
    let header = URL_SAFE_NO_PAD.encode(r#"{"alg":"HS256","typ":"JWT"}"#);
    let payload = URL_SAFE_NO_PAD.encode(format!(
        r#"{{"subjectId":"driver-7","subjectRole":"driver","iat":{now},"exp":{}}}"#,
        now + secs
    ));
    format!("{header}.{payload}.sig")
}

/// Builds a token relative to the real wall clock.
pub fn token_expiring_in(secs: i64) -> String {
    token_at(SystemClock.now_secs(), secs)
}

pub fn memory_auth() -> Arc<AuthStateStore> {
    Arc::new(AuthStateStore::new(Arc::new(MemoryStore::new())))
}

/// Message source replaying a fixed list of batches, then empty results.
#[derive(Default)]
pub struct Inbox {
    batches: Mutex<VecDeque<Vec<Message>>>,
    pub seen_cursors: Mutex<Vec<Option<String>>>,
}

impl Inbox {
    pub fn new(batches: Vec<Vec<Message>>) -> Self {
        Inbox { batches: Mutex::new(batches.into()), ..Default::default() }
    }
}

impl MessageSource for Inbox {
    type Message = Message;

    fn fetch(
        &self,
        _conversation_id: &str,
        after_id: Option<&str>,
    ) -> BoxFuture<'_, std::result::Result<FetchResult<Message>, FetchError>> {
        self.seen_cursors.lock().unwrap().push(after_id.map(str::to_string));
        let batch = self.batches.lock().unwrap().pop_front().unwrap_or_default();
        Box::pin(async move { Ok(FetchResult::ok(batch)) })
    }
}
