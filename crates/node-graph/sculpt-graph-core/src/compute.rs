//! Inputs, outputs and failures of a single node computation.

use hashbrown::HashMap;
use sculpt_api_core::Value;
use thiserror::Error;

use crate::types::OutputMap;

/// Failure raised by a node's compute function.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ComputeError {
    #[error("input '{0}' is not connected")]
    MissingInput(String),
    #[error("input '{handle}' is invalid: {reason}")]
    InvalidInput { handle: String, reason: String },
    #[error("parameter '{0}' is missing")]
    MissingParameter(String),
    #[error("parameter '{0}' has an unusable value")]
    InvalidParameter(String),
    #[error("{0}")]
    Failed(String),
}

impl ComputeError {
    pub fn msg(message: impl Into<String>) -> Self {
        ComputeError::Failed(message.into())
    }
}

/// Values gathered from upstream cached outputs, keyed by input handle.
///
/// Single-input handles carry at most one value. Multi-input handles carry one value per
/// connection, ordered by connection creation.
#[derive(Debug, Clone, Default)]
pub struct NodeInputs {
    values: HashMap<String, Vec<Value>>,
}

impl NodeInputs {
    pub fn new() -> Self {
        NodeInputs::default()
    }

    pub fn push(&mut self, handle: &str, value: Value) {
        self.values.entry(handle.to_string()).or_default().push(value);
    }

    pub fn with(mut self, handle: &str, value: Value) -> Self {
        self.push(handle, value);
        self
    }

    /// First value delivered to `handle`, if connected.
    pub fn get(&self, handle: &str) -> Option<&Value> {
        self.values.get(handle).and_then(|values| values.first())
    }

    /// All values delivered to `handle`.
    pub fn all(&self, handle: &str) -> &[Value] {
        self.values
            .get(handle)
            .map(|values| values.as_slice())
            .unwrap_or_default()
    }

    pub fn require(&self, handle: &str) -> Result<&Value, ComputeError> {
        self.get(handle)
            .ok_or_else(|| ComputeError::MissingInput(handle.to_string()))
    }

    pub fn is_connected(&self, handle: &str) -> bool {
        self.values.contains_key(handle)
    }
}

/// Build an output map containing a single port.
pub fn keyed_output(key: &str, value: Value) -> OutputMap {
    let mut map = HashMap::with_capacity(1);
    map.insert(key.to_string(), value);
    map
}
