use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// What the registry does when a node type name is registered twice.
///
/// - `Overwrite`: silently replace the previous descriptor.
/// - `Warn`: replace the previous descriptor and log a warning (default).
/// - `Reject`: keep the previous descriptor and fail with `DuplicateType`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DuplicatePolicy {
    Overwrite,
    #[default]
    Warn,
    Reject,
}

impl FromStr for DuplicatePolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "overwrite" => Ok(DuplicatePolicy::Overwrite),
            "warn" => Ok(DuplicatePolicy::Warn),
            "reject" => Ok(DuplicatePolicy::Reject),
            other => Err(format!(
                "invalid duplicate_policy: {other} (expected \"overwrite\", \"warn\" or \"reject\")"
            )),
        }
    }
}

/// Which result cache strategy the engine is constructed with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CacheMode {
    /// Every lookup misses; nodes always run.
    #[default]
    None,
    /// Per-node memoization keyed by a hash of the resolved inputs.
    Content,
}

impl FromStr for CacheMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "none" | "off" => Ok(CacheMode::None),
            "content" => Ok(CacheMode::Content),
            other => Err(format!(
                "invalid cache mode: {other} (expected \"none\" or \"content\")"
            )),
        }
    }
}
