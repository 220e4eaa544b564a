//! Engine configuration.

use serde::{Deserialize, Serialize};

/// When recompute passes run.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecomputePolicy {
    /// Only on explicit [`GraphEngine::recompute`](crate::GraphEngine::recompute) calls.
    #[default]
    Manual,
    /// After every successful mutation: the mutated scope, then each enclosing scope.
    Eager,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub recompute: RecomputePolicy,

    /// Contain panics raised by compute functions as `ComputeFailure`.
    pub catch_panics: bool,

    /// Emit a debug line summarising every recompute pass.
    pub log_passes: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            recompute: RecomputePolicy::Manual,
            catch_panics: true,
            log_passes: true,
        }
    }
}

impl EngineConfig {
    pub fn eager() -> Self {
        Self {
            recompute: RecomputePolicy::Eager,
            ..Self::default()
        }
    }

    /// Parse a (possibly partial) JSON config; missing fields take their defaults.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}
