use std::io::Write;
use std::path::PathBuf;

use flowloop::config::{load_and_validate, load_or_default};
use flowloop::errors::FlowloopError;
use flowloop::types::{CacheMode, DuplicatePolicy};
use tempfile::{NamedTempFile, TempDir};

fn config_file(contents: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(contents.as_bytes()).unwrap();
    file
}

#[test]
fn empty_file_yields_defaults() {
    let file = config_file("");
    let cfg = load_and_validate(file.path()).unwrap();

    assert_eq!(cfg.engine.interval_seconds, 1.0);
    assert_eq!(cfg.engine.log_capacity, 100);
    assert!(!cfg.engine.strict_validation);
    assert_eq!(cfg.registry.duplicate_policy, DuplicatePolicy::Warn);
    assert_eq!(cfg.cache.mode, CacheMode::None);
}

#[test]
fn all_sections_are_read() {
    let file = config_file(
        r#"
[engine]
interval_seconds = 0.25
log_capacity = 20
strict_validation = true

[registry]
node_dir = "nodes"
duplicate_policy = "reject"

[cache]
mode = "content"
"#,
    );
    let cfg = load_and_validate(file.path()).unwrap();

    assert_eq!(cfg.engine.interval_seconds, 0.25);
    assert_eq!(cfg.engine.log_capacity, 20);
    assert!(cfg.engine.strict_validation);
    assert_eq!(cfg.registry.node_dir, Some(PathBuf::from("nodes")));
    assert_eq!(cfg.registry.duplicate_policy, DuplicatePolicy::Reject);
    assert_eq!(cfg.cache.mode, CacheMode::Content);
}

#[test]
fn non_positive_interval_is_rejected() {
    let file = config_file("[engine]\ninterval_seconds = 0.0\n");
    let err = load_and_validate(file.path()).unwrap_err();

    assert!(matches!(err, FlowloopError::ConfigError(ref msg) if msg.contains("interval_seconds")));

    let file = config_file("[engine]\njoin_timeout_seconds = 1e300\n");
    let err = load_and_validate(file.path()).unwrap_err();
    assert!(matches!(err, FlowloopError::ConfigError(ref msg) if msg.contains("too large")));
}

#[test]
fn unknown_keys_and_values_are_rejected() {
    let unknown_key = config_file("[engine]\nintervall = 1.0\n");
    assert!(matches!(
        load_and_validate(unknown_key.path()),
        Err(FlowloopError::TomlError(_))
    ));

    let unknown_mode = config_file("[cache]\nmode = \"lru\"\n");
    assert!(matches!(
        load_and_validate(unknown_mode.path()),
        Err(FlowloopError::TomlError(_))
    ));
}

#[test]
fn missing_file_falls_back_to_defaults() {
    let dir = TempDir::new().unwrap();
    let cfg = load_or_default(dir.path().join("flowloop.toml")).unwrap();
    assert_eq!(cfg.engine.interval_seconds, 1.0);

    // An explicit path that does not exist is an error for the strict loader.
    assert!(matches!(
        load_and_validate(dir.path().join("flowloop.toml")),
        Err(FlowloopError::IoError(_))
    ));
}
