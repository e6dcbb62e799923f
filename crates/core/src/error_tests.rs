// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

#![allow(clippy::unwrap_used)]

use super::*;
use yare::parameterized;

#[parameterized(
    storage = { Error::Storage("backend unavailable".into()), "backend unavailable" },
    corrupted = { Error::CorruptedData("store.json".into()), "store.json" },
    config = { Error::Config("interval_secs must be positive".into()), "interval_secs" },
)]
fn error_display_contains(err: Error, expected: &str) {
    assert!(err.to_string().contains(expected));
}

#[test]
fn error_config_display_has_hint() {
    let err = Error::Config("storage_key must not be empty".into());
    assert!(err.to_string().contains("hint:"));
}

#[test]
fn error_from_io() {
    let io_err = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "read-only");
    let err: Error = io_err.into();
    assert!(matches!(err, Error::Io(_)));
}

#[test]
fn error_from_json() {
    let json_err = serde_json::from_str::<()>("invalid").unwrap_err();
    let err: Error = json_err.into();
    assert!(matches!(err, Error::Json(_)));
}

#[test]
fn error_from_toml() {
    let toml_err = toml::from_str::<toml::Value>("= broken").unwrap_err();
    let err: Error = toml_err.into();
    assert!(matches!(err, Error::ConfigParse(_)));
}
