use crate::nodes::FanOut;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::Path;

/// Assembly-time knobs shared by the assembler and the demo
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    /// Capacity of ordinary bonds and pipeline hops, 0 for rendezvous
    pub channel_capacity: usize,
    /// Capacity of an error catcher's error bond
    pub error_capacity: usize,
    pub split_fan_out: FanOut,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            channel_capacity: 1,
            error_capacity: 16,
            split_fan_out: FanOut::Concurrent,
        }
    }
}

impl RuntimeConfig {
    /// Read the `runtime` section of a JSON document. A missing section means defaults.
    pub fn from_json(config: &Value) -> Result<Self> {
        match config.get("runtime") {
            None | Some(Value::Null) => Ok(Self::default()),
            Some(section) => serde_json::from_value(section.clone())
                .context("invalid runtime configuration"),
        }
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("reading config {}", path.display()))?;
        let value: Value = serde_json::from_str(&text)
            .with_context(|| format!("parsing config {}", path.display()))?;
        Self::from_json(&value)
    }
}
