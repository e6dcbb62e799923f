// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! tether-core: runtime-free building blocks of the session and sync layer.
//!
//! This crate provides token inspection, the auth state store, the offline
//! mutation queue, and the persistent key-value store they share. Nothing here
//! spawns tasks or owns timers; see the `tether` crate for those.

pub mod auth;
pub mod clock;
pub mod config;
pub mod error;
pub mod queue;
pub mod store;
pub mod token;

pub use auth::{
    AuthEvent, AuthSnapshot, AuthStateStore, AuthUpdate, ClearOptions, ListenerError, Subscription,
};
pub use clock::{ClockSource, ManualClock, SystemClock};
pub use config::TetherConfig;
pub use error::{Error, Result};
pub use queue::{OfflineQueue, QueueConfig, QueuedMutation};
pub use store::{FileStore, KeyValueStore, MemoryStore};
pub use token::TokenPayload;
