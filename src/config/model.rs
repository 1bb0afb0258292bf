// src/config/model.rs

use std::path::PathBuf;

use serde::Deserialize;

use crate::types::{CacheMode, DuplicatePolicy};

/// Engine configuration as read from `flowloop.toml`.
///
/// ```toml
/// [engine]
/// interval_seconds = 1.0
/// log_capacity = 100
///
/// [registry]
/// node_dir = "nodes"
/// duplicate_policy = "warn"
///
/// [cache]
/// mode = "content"
/// ```
///
/// Every section is optional.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RawEngineConfig {
    #[serde(default)]
    pub engine: EngineSection,

    #[serde(default)]
    pub registry: RegistrySection,

    #[serde(default)]
    pub cache: CacheSection,
}

/// Validated configuration. Construct via `TryFrom<RawEngineConfig>`.
#[derive(Debug, Clone, Default)]
pub struct EngineConfig {
    pub engine: EngineSection,
    pub registry: RegistrySection,
    pub cache: CacheSection,
}

impl EngineConfig {
    pub(crate) fn new_unchecked(
        engine: EngineSection,
        registry: RegistrySection,
        cache: CacheSection,
    ) -> Self {
        Self {
            engine,
            registry,
            cache,
        }
    }
}

/// `[engine]` section.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EngineSection {
    /// Sleep between continuous iterations, in seconds.
    #[serde(default = "default_interval_seconds")]
    pub interval_seconds: f64,

    /// Entries kept in the in-memory run log.
    #[serde(default = "default_log_capacity")]
    pub log_capacity: usize,

    /// How long `stop` waits for the worker thread.
    #[serde(default = "default_join_timeout_seconds")]
    pub join_timeout_seconds: f64,

    /// Fail a node whose inputs do not satisfy its schema instead of only
    /// logging it.
    #[serde(default)]
    pub strict_validation: bool,

    /// Capacity of the event channel used by the CLI.
    #[serde(default = "default_event_capacity")]
    pub event_capacity: usize,
}

fn default_interval_seconds() -> f64 {
    1.0
}

fn default_log_capacity() -> usize {
    100
}

fn default_join_timeout_seconds() -> f64 {
    5.0
}

fn default_event_capacity() -> usize {
    256
}

impl Default for EngineSection {
    fn default() -> Self {
        Self {
            interval_seconds: default_interval_seconds(),
            log_capacity: default_log_capacity(),
            join_timeout_seconds: default_join_timeout_seconds(),
            strict_validation: false,
            event_capacity: default_event_capacity(),
        }
    }
}

/// `[registry]` section.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RegistrySection {
    /// Directory scanned for module manifests. Relative paths are resolved
    /// against the config file's directory.
    #[serde(default)]
    pub node_dir: Option<PathBuf>,

    #[serde(default)]
    pub duplicate_policy: DuplicatePolicy,
}

/// `[cache]` section.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CacheSection {
    #[serde(default)]
    pub mode: CacheMode,
}
