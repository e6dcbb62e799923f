// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Collaborator contracts for the timer-driven components.
//!
//! The scheduler and the poller never talk to the network themselves. They
//! drive caller-supplied operations:
//! - [`RefreshOp`] - obtain a fresh token and write it through the auth store
//! - [`MessageSource`] - fetch messages of a conversation newer than a cursor
//!
//! Both traits return boxed futures so implementations can be stored as trait
//! objects and swapped for scripted doubles in tests.

use std::future::Future;
use std::pin::Pin;

use serde::{Deserialize, Serialize};

/// Boxed, sendable future returned by collaborator operations.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Error returned by a [`RefreshOp`].
#[derive(Debug, thiserror::Error)]
pub enum RefreshError {
    /// Request could not be completed.
    #[error("network error: {0}")]
    Network(String),

    /// Server refused the refresh token.
    #[error("refresh rejected: {0}")]
    Rejected(String),

    /// Writing the new token failed.
    #[error("storage error: {0}")]
    Storage(#[from] tether_core::Error),
}

/// Error returned by a [`MessageSource`].
#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    /// Request could not be completed.
    #[error("network error: {0}")]
    Network(String),

    /// Server answered with an error status.
    #[error("server error {status}: {message}")]
    Server { status: u16, message: String },

    #[error("storage error: {0}")]
    Storage(#[from] tether_core::Error),
}

/// Refresh operation supplied to the scheduler.
///
/// On success the implementation persists the new token via the auth store
/// itself; the returned token is informational.
pub trait RefreshOp: Send + Sync {
    fn refresh(&self) -> BoxFuture<'_, Result<Option<String>, RefreshError>>;
}

impl<F, Fut> RefreshOp for F
where
    F: Fn() -> Fut + Send + Sync,
    Fut: Future<Output = Result<Option<String>, RefreshError>> + Send + 'static,
{
    fn refresh(&self) -> BoxFuture<'_, Result<Option<String>, RefreshError>> {
        Box::pin(self())
    }
}

/// Anything with a stable identifier usable as a poll cursor.
pub trait Identified {
    fn id(&self) -> &str;
}

/// Result of one fetch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FetchResult<M> {
    pub messages: Vec<M>,
    /// `false` means the server reported a failure; treated like an error.
    pub success: bool,
}

impl<M> FetchResult<M> {
    pub fn ok(messages: Vec<M>) -> Self {
        FetchResult { messages, success: true }
    }

    pub fn empty() -> Self {
        Self::ok(Vec::new())
    }

    pub fn failed() -> Self {
        FetchResult { messages: Vec::new(), success: false }
    }
}

/// Message fetch operation supplied to the poller.
pub trait MessageSource: Send + Sync + 'static {
    type Message: Identified + Clone + Send + 'static;

    /// Fetches messages of `conversation_id` newer than `after_id`, oldest first.
    fn fetch(
        &self,
        conversation_id: &str,
        after_id: Option<&str>,
    ) -> BoxFuture<'_, Result<FetchResult<Self::Message>, FetchError>>;
}

/// A conversation message as delivered by the messaging API.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub id: String,
    pub conversation_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sender_id: Option<String>,
    #[serde(default)]
    pub content: String,
    /// Fields this layer does not interpret.
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl Message {
    pub fn new(
        id: impl Into<String>,
        conversation_id: impl Into<String>,
        content: impl Into<String>,
    ) -> Self {
        Message {
            id: id.into(),
            conversation_id: conversation_id.into(),
            sender_id: None,
            content: content.into(),
            extra: serde_json::Map::new(),
        }
    }
}

impl Identified for Message {
    fn id(&self) -> &str {
        &self.id
    }
}
