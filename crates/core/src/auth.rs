// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Auth state store with change notification.
//!
//! [`AuthStateStore`] owns every auth-related key in the persistent store.
//! Other components read through it and subscribe to [`AuthEvent`]s instead of
//! touching the keys directly.
//!
//! Notification rules:
//! - listeners run synchronously, in subscription order, after the write
//! - a listener that fails or panics is logged and skipped; the write and the
//!   remaining listeners are unaffected
//! - a write that touches no key emits nothing

use std::collections::BTreeMap;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Mutex, MutexGuard, Weak};

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::Result;
use crate::store::KeyValueStore;
use crate::token;

/// Storage keys owned by the auth store.
pub mod keys {
    pub const TOKEN: &str = "auth_token";
    pub const REFRESH_TOKEN: &str = "refresh_token";
    pub const SUBJECT_ID: &str = "user_id";
    pub const SUBJECT_DATA: &str = "user_data";
    pub const TOKEN_ISSUED_AT: &str = "token_issued_at";
    /// First-run flag; only cleared on request.
    pub const ONBOARDING_SEEN: &str = "has_seen_onboarding";

    /// Keys making up an [`AuthSnapshot`](super::AuthSnapshot), in snapshot order.
    pub const SNAPSHOT: [&str; 5] =
        [TOKEN, REFRESH_TOKEN, SUBJECT_ID, SUBJECT_DATA, TOKEN_ISSUED_AT];
}

/// Point-in-time view of the persisted auth fields.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AuthSnapshot {
    pub token: Option<String>,
    pub refresh_token: Option<String>,
    pub subject_id: Option<String>,
    pub subject_data: Option<Value>,
    /// Unix milliseconds.
    pub token_issued_at: Option<i64>,
}

impl AuthSnapshot {
    /// True when every field is absent.
    pub fn is_empty(&self) -> bool {
        *self == AuthSnapshot::default()
    }
}

/// Partial update of the auth fields.
///
/// `None` means "leave unchanged". The store has no per-field delete, so there
/// is no way to null out a single field short of [`AuthStateStore::clear_auth_data`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AuthUpdate {
    pub token: Option<String>,
    pub refresh_token: Option<String>,
    pub subject_id: Option<String>,
    pub subject_data: Option<Value>,
    pub token_issued_at: Option<i64>,
}

impl AuthUpdate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    pub fn refresh_token(mut self, refresh_token: impl Into<String>) -> Self {
        self.refresh_token = Some(refresh_token.into());
        self
    }

    pub fn subject_id(mut self, subject_id: impl Into<String>) -> Self {
        self.subject_id = Some(subject_id.into());
        self
    }

    pub fn subject_data(mut self, subject_data: Value) -> Self {
        self.subject_data = Some(subject_data);
        self
    }

    pub fn token_issued_at(mut self, issued_at_ms: i64) -> Self {
        self.token_issued_at = Some(issued_at_ms);
        self
    }

    /// True when no field would be written.
    pub fn is_empty(&self) -> bool {
        *self == AuthUpdate::default()
    }
}

/// Change notification fanned out to subscribers.
#[derive(Debug, Clone, PartialEq)]
pub enum AuthEvent {
    /// Carries exactly the fields that were written.
    Update(AuthUpdate),
    Clear,
}

/// Options for [`AuthStateStore::clear_auth_data`].
#[derive(Debug, Clone, Copy, Default)]
pub struct ClearOptions {
    /// Also forget that onboarding was completed.
    pub clear_onboarding: bool,
}

/// Error a listener may report; it is logged and otherwise ignored.
pub type ListenerError = Box<dyn std::error::Error + Send + Sync>;

type Listener = dyn Fn(&AuthEvent) -> std::result::Result<(), ListenerError> + Send + Sync;

#[derive(Default)]
struct ListenerRegistry {
    next_id: u64,
    /// Ordered by id, which is subscription order.
    listeners: BTreeMap<u64, Arc<Listener>>,
}

type SharedRegistry = Arc<Mutex<ListenerRegistry>>;

fn lock_registry(registry: &Mutex<ListenerRegistry>) -> MutexGuard<'_, ListenerRegistry> {
    registry.lock().unwrap_or_else(|e| e.into_inner())
}

/// Handle returned by [`AuthStateStore::subscribe`].
///
/// Dropping the handle keeps the listener registered; call
/// [`Subscription::unsubscribe`] to remove it.
#[must_use = "keep the subscription to be able to unsubscribe"]
pub struct Subscription {
    id: u64,
    registry: Weak<Mutex<ListenerRegistry>>,
}

impl Subscription {
    /// Deregisters the listener. Returns false if it was already gone.
    pub fn unsubscribe(self) -> bool {
        match self.registry.upgrade() {
            Some(registry) => lock_registry(&registry).listeners.remove(&self.id).is_some(),
            None => false,
        }
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription").field("id", &self.id).finish()
    }
}

/// Single owner of the persisted auth fields.
///
/// Construct one per running application and share it behind an `Arc`.
pub struct AuthStateStore {
    store: Arc<dyn KeyValueStore>,
    registry: SharedRegistry,
}

impl AuthStateStore {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        AuthStateStore { store, registry: Arc::new(Mutex::new(ListenerRegistry::default())) }
    }

    /// Registers a listener invoked on every [`AuthEvent`].
    pub fn subscribe<F>(&self, listener: F) -> Subscription
    where
        F: Fn(&AuthEvent) -> std::result::Result<(), ListenerError> + Send + Sync + 'static,
    {
        let mut registry = lock_registry(&self.registry);
        let id = registry.next_id;
        registry.next_id += 1;
        registry.listeners.insert(id, Arc::new(listener));
        Subscription { id, registry: Arc::downgrade(&self.registry) }
    }

    /// Number of registered listeners.
    pub fn listener_count(&self) -> usize {
        lock_registry(&self.registry).listeners.len()
    }

    /// Drops every listener. The store stays usable.
    pub fn dispose(&self) {
        lock_registry(&self.registry).listeners.clear();
    }

    fn emit(&self, event: &AuthEvent) {
        // Release the lock before calling out so listeners may (un)subscribe.
        let listeners: Vec<(u64, Arc<Listener>)> = lock_registry(&self.registry)
            .listeners
            .iter()
            .map(|(id, l)| (*id, Arc::clone(l)))
            .collect();

        for (id, listener) in listeners {
            match panic::catch_unwind(AssertUnwindSafe(|| listener(event))) {
                Ok(Ok(())) => {}
                Ok(Err(e)) => tracing::warn!(listener = id, "auth listener failed: {}", e),
                Err(_) => tracing::warn!(listener = id, "auth listener panicked"),
            }
        }
    }

    /// Reads all auth fields in one multi-key read.
    ///
    /// Unparseable subject data or issue time degrade to `None`.
    pub fn get_snapshot(&self) -> Result<AuthSnapshot> {
        let mut values: BTreeMap<String, Option<String>> =
            self.store.multi_get(&keys::SNAPSHOT)?.into_iter().collect();
        let mut take = |key: &str| values.remove(key).flatten();

        Ok(AuthSnapshot {
            token: take(keys::TOKEN),
            refresh_token: take(keys::REFRESH_TOKEN),
            subject_id: take(keys::SUBJECT_ID),
            subject_data: take(keys::SUBJECT_DATA).and_then(|raw| parse_subject_data(&raw)),
            token_issued_at: take(keys::TOKEN_ISSUED_AT).and_then(|raw| parse_issued_at(&raw)),
        })
    }

    /// Writes the present fields in one multi-key write, then emits
    /// [`AuthEvent::Update`] with those fields.
    ///
    /// An empty update touches neither the store nor the listeners. A JSON
    /// `null` subject data counts as absent.
    pub fn set_auth_data(&self, mut update: AuthUpdate) -> Result<()> {
        if update.subject_data.as_ref().is_some_and(Value::is_null) {
            update.subject_data = None;
        }
        if update.is_empty() {
            return Ok(());
        }

        let mut pairs: Vec<(&str, String)> = Vec::with_capacity(keys::SNAPSHOT.len());
        if let Some(token) = &update.token {
            pairs.push((keys::TOKEN, token.clone()));
        }
        if let Some(refresh_token) = &update.refresh_token {
            pairs.push((keys::REFRESH_TOKEN, refresh_token.clone()));
        }
        if let Some(subject_id) = &update.subject_id {
            pairs.push((keys::SUBJECT_ID, subject_id.clone()));
        }
        if let Some(subject_data) = &update.subject_data {
            pairs.push((keys::SUBJECT_DATA, serde_json::to_string(subject_data)?));
        }
        if let Some(issued_at) = update.token_issued_at {
            pairs.push((keys::TOKEN_ISSUED_AT, issued_at.to_string()));
        }

        self.store.multi_set(&pairs)?;
        self.emit(&AuthEvent::Update(update));
        Ok(())
    }

    /// Removes every auth key in one multi-key delete and emits
    /// [`AuthEvent::Clear`].
    pub fn clear_auth_data(&self, options: ClearOptions) -> Result<()> {
        let mut to_remove: Vec<&str> = keys::SNAPSHOT.to_vec();
        if options.clear_onboarding {
            to_remove.push(keys::ONBOARDING_SEEN);
        }

        self.store.multi_remove(&to_remove)?;
        self.emit(&AuthEvent::Clear);
        Ok(())
    }

    pub fn get_token(&self) -> Result<Option<String>> {
        self.store.get(keys::TOKEN)
    }

    pub fn set_token(&self, token: &str) -> Result<()> {
        self.store.set(keys::TOKEN, token)?;
        self.emit(&AuthEvent::Update(AuthUpdate::new().token(token)));
        Ok(())
    }

    pub fn get_refresh_token(&self) -> Result<Option<String>> {
        self.store.get(keys::REFRESH_TOKEN)
    }

    pub fn set_refresh_token(&self, refresh_token: &str) -> Result<()> {
        self.store.set(keys::REFRESH_TOKEN, refresh_token)?;
        self.emit(&AuthEvent::Update(AuthUpdate::new().refresh_token(refresh_token)));
        Ok(())
    }

    pub fn get_token_issued_at(&self) -> Result<Option<i64>> {
        Ok(self.store.get(keys::TOKEN_ISSUED_AT)?.and_then(|raw| parse_issued_at(&raw)))
    }

    pub fn set_token_issued_at(&self, issued_at_ms: i64) -> Result<()> {
        self.store.set(keys::TOKEN_ISSUED_AT, &issued_at_ms.to_string())?;
        self.emit(&AuthEvent::Update(AuthUpdate::new().token_issued_at(issued_at_ms)));
        Ok(())
    }

    pub fn get_subject_data(&self) -> Result<Option<Value>> {
        Ok(self.store.get(keys::SUBJECT_DATA)?.and_then(|raw| parse_subject_data(&raw)))
    }

    /// `null` leaves the stored value unchanged and emits nothing.
    pub fn set_subject_data(&self, subject_data: Value) -> Result<()> {
        if subject_data.is_null() {
            return Ok(());
        }
        self.store.set(keys::SUBJECT_DATA, &serde_json::to_string(&subject_data)?)?;
        self.emit(&AuthEvent::Update(AuthUpdate::new().subject_data(subject_data)));
        Ok(())
    }

    /// A token is stored and passes [`token::is_valid`].
    pub fn is_authenticated(&self) -> Result<bool> {
        Ok(self.get_token()?.is_some_and(|t| token::is_valid(&t)))
    }

    pub fn has_seen_onboarding(&self) -> Result<bool> {
        Ok(self.store.get(keys::ONBOARDING_SEEN)?.is_some_and(|v| v == "true"))
    }

    /// Records the first-run flag. Not an auth field, so no event is emitted.
    pub fn mark_onboarding_seen(&self) -> Result<()> {
        self.store.set(keys::ONBOARDING_SEEN, "true")
    }
}

fn parse_subject_data(raw: &str) -> Option<Value> {
    match serde_json::from_str(raw) {
        Ok(value) => Some(value),
        Err(e) => {
            tracing::warn!("ignoring malformed stored subject data: {}", e);
            None
        }
    }
}

fn parse_issued_at(raw: &str) -> Option<i64> {
    raw.trim().parse().ok()
}

#[cfg(test)]
#[path = "auth_tests.rs"]
mod tests;
