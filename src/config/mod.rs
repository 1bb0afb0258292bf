// src/config/mod.rs

//! Engine configuration.
//!
//! - `model.rs`: the TOML-backed data model.
//! - `loader.rs`: reading a config file from disk.
//! - `validate.rs`: raw → validated conversion.

pub mod loader;
pub mod model;
pub mod validate;

pub use loader::{default_config_path, load_and_validate, load_from_path, load_or_default};
pub use model::{CacheSection, EngineConfig, EngineSection, RawEngineConfig, RegistrySection};
pub use validate::validate_config;
