// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

#![allow(clippy::unwrap_used)]

use super::*;
use tempfile::tempdir;
use yare::parameterized;

#[test]
fn defaults_match_design_values() {
    let config = TetherConfig::default();
    assert_eq!(config.refresh.interval_secs, 900);
    assert_eq!(config.refresh.activity_timeout_secs, 1800);
    assert_eq!(config.refresh.threshold_minutes, 10);
    assert_eq!(config.polling.empty_delay_secs, 5);
    assert_eq!(config.polling.error_delay_secs, 10);
    assert_eq!(config.polling.local_conversation_prefix, "temp_");
    assert_eq!(config.queue.storage_key, "offline_mutation_queue");
    assert_eq!(config.store.path, None);
}

#[test]
fn empty_document_is_all_defaults() {
    assert_eq!(TetherConfig::parse("").unwrap(), TetherConfig::default());
}

#[test]
fn partial_tables_keep_other_defaults() {
    let config = TetherConfig::parse(
        r#"
[refresh]
interval_secs = 60

[polling]
local_conversation_prefix = "local-"
"#,
    )
    .unwrap();

    assert_eq!(config.refresh.interval_secs, 60);
    assert_eq!(config.refresh.activity_timeout_secs, 1800);
    assert_eq!(config.polling.local_conversation_prefix, "local-");
    assert_eq!(config.polling.error_delay_secs, 10);
}

#[parameterized(
    zero_interval = { "[refresh]\ninterval_secs = 0" },
    zero_activity = { "[refresh]\nactivity_timeout_secs = 0" },
    zero_empty_delay = { "[polling]\nempty_delay_secs = 0" },
    zero_error_delay = { "[polling]\nerror_delay_secs = 0" },
    blank_key = { "[queue]\nstorage_key = \"  \"" },
)]
fn invalid_values_rejected(content: &str) {
    assert!(matches!(TetherConfig::parse(content), Err(Error::Config(_))));
}

#[test]
fn malformed_toml_is_parse_error() {
    assert!(matches!(TetherConfig::parse("[refresh"), Err(Error::ConfigParse(_))));
}

#[test]
fn load_missing_file_yields_defaults() {
    let dir = tempdir().unwrap();
    let config = TetherConfig::load(&dir.path().join("absent.toml")).unwrap();
    assert_eq!(config, TetherConfig::default());
}

#[test]
fn save_then_load() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("tether.toml");

    let mut config = TetherConfig::default();
    config.queue.storage_key = "pending".to_string();
    config.store.path = Some("/tmp/store.json".to_string());
    config.save(&path).unwrap();

    let loaded = TetherConfig::load(&path).unwrap();
    assert_eq!(loaded, config);
    assert_eq!(loaded.store_path().unwrap(), PathBuf::from("/tmp/store.json"));
    assert_eq!(loaded.queue_config().storage_key, "pending");
}
