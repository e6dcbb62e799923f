// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! tether: session and sync resilience for connected clients.
//!
//! Keeps a user authenticated, keeps conversations fresh, and keeps offline
//! mutations durable while connectivity comes and goes.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────┐ refresh ┌─────────────┐ notify ┌─────────────┐
//! │  Scheduler  │────────►│  AuthState  │───────►│ Subscribers │
//! │  (timer)    │◄────────│   Store     │        └─────────────┘
//! └─────────────┘  token  └──────┬──────┘
//!                                │
//! ┌─────────────┐         ┌──────▼──────┐        ┌─────────────┐
//! │   Poller    │         │  KeyValue   │◄───────│  Offline    │
//! │ (per conv)  │         │   Store     │        │   Queue     │
//! └─────────────┘         └─────────────┘        └─────────────┘
//! ```
//!
//! # Features
//!
//! - Activity-gated background token refresh
//! - Fetch-then-stop message polling with two-tier retry delays
//! - Durable offline mutation queue with per-item retry on flush
//! - Injectable refresh and fetch operations for testing
//!
//! The runtime-free pieces live in `tether-core` and are re-exported here.

pub mod poller;
pub mod scheduler;
pub mod source;

pub use poller::{MessagePoller, PollState, PollerConfig};
pub use scheduler::{RefreshScheduler, SchedulerConfig, SchedulerStatus, TickOutcome};
pub use source::{
    BoxFuture, FetchError, FetchResult, Identified, Message, MessageSource, RefreshError,
    RefreshOp,
};

pub use tether_core::{config, token};
pub use tether_core::{
    AuthEvent, AuthSnapshot, AuthStateStore, AuthUpdate, ClearOptions, ClockSource, Error,
    FileStore, KeyValueStore, ListenerError, ManualClock, MemoryStore, OfflineQueue, QueueConfig,
    QueuedMutation, Result, Subscription, SystemClock, TetherConfig, TokenPayload,
};

#[cfg(test)]
mod test_helpers;
