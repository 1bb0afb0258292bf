// src/config/validate.rs

use std::time::Duration;

use crate::config::model::{EngineConfig, RawEngineConfig};
use crate::errors::{FlowloopError, Result};

impl TryFrom<RawEngineConfig> for EngineConfig {
    type Error = FlowloopError;

    fn try_from(raw: RawEngineConfig) -> std::result::Result<Self, Self::Error> {
        validate_config(&raw)?;
        Ok(EngineConfig::new_unchecked(raw.engine, raw.registry, raw.cache))
    }
}

pub fn validate_config(cfg: &RawEngineConfig) -> Result<()> {
    let engine = &cfg.engine;

    ensure_positive("[engine].interval_seconds", engine.interval_seconds)?;
    ensure_positive("[engine].join_timeout_seconds", engine.join_timeout_seconds)?;

    if engine.log_capacity == 0 {
        return Err(FlowloopError::ConfigError(
            "[engine].log_capacity must be >= 1 (got 0)".to_string(),
        ));
    }

    if engine.event_capacity == 0 {
        return Err(FlowloopError::ConfigError(
            "[engine].event_capacity must be >= 1 (got 0)".to_string(),
        ));
    }

    if let Some(dir) = &cfg.registry.node_dir {
        if dir.as_os_str().is_empty() {
            return Err(FlowloopError::ConfigError(
                "[registry].node_dir must not be empty".to_string(),
            ));
        }
    }

    Ok(())
}

fn ensure_positive(key: &str, value: f64) -> Result<()> {
    if !value.is_finite() || value <= 0.0 {
        return Err(FlowloopError::ConfigError(format!(
            "{key} must be a positive number (got {value})"
        )));
    }
    if Duration::try_from_secs_f64(value).is_err() {
        return Err(FlowloopError::ConfigError(format!(
            "{key} is too large to be a duration (got {value})"
        )));
    }
    Ok(())
}
