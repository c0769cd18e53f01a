use std::collections::BTreeMap;

use serde::Deserialize;

use crate::error::RunnerError;

/// Root configuration, parsed from TOML.
#[derive(Debug, Clone, Deserialize)]
pub struct RunnerConfig {
    /// NDJSON file with input records. Read from stdin when unset.
    #[serde(default)]
    pub input: Option<String>,

    /// Upper bound on triggers in one run.
    #[serde(default = "default_max_triggers")]
    pub max_triggers: usize,

    /// Pause after a trigger that asked to yield.
    #[serde(default = "default_yield_ms")]
    pub yield_ms: u64,

    pub processor: ProcessorConfig,
}

fn default_max_triggers() -> usize {
    10_000
}

fn default_yield_ms() -> u64 {
    1000
}

#[derive(Debug, Clone, Deserialize)]
pub struct ProcessorConfig {
    pub name: String,
    /// Path to processor .so plugin.
    pub plugin: String,
    #[serde(default)]
    pub config: Option<toml::Value>,
    /// Dynamic properties applied after creation, e.g. bitmask rules.
    #[serde(default)]
    pub dynamic: BTreeMap<String, toml::Value>,
}

impl RunnerConfig {
    /// Load configuration from a TOML file.
    pub fn load(path: &str) -> Result<Self, RunnerError> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| RunnerError::Config(format!("{path}: {e}")))?;
        Self::parse(&content)
    }

    /// Parse configuration from a TOML string.
    pub fn parse(toml_str: &str) -> Result<Self, RunnerError> {
        let config: Self =
            toml::from_str(toml_str).map_err(|e| RunnerError::Config(e.to_string()))?;
        if config.max_triggers == 0 {
            return Err(RunnerError::Config("max_triggers must be at least 1".into()));
        }
        Ok(config)
    }
}

impl ProcessorConfig {
    /// Plugin configuration as the JSON text handed to `qs_create_processor`.
    pub fn config_json(&self) -> Result<String, RunnerError> {
        match &self.config {
            Some(value) => Ok(serde_json::to_string(value)?),
            None => Ok("{}".to_string()),
        }
    }

    /// Dynamic properties as text. Strings are taken as-is, integers and
    /// booleans are formatted.
    pub fn dynamic_properties(&self) -> Result<Vec<(String, String)>, RunnerError> {
        self.dynamic
            .iter()
            .map(|(name, value)| {
                let text = match value {
                    toml::Value::String(s) => s.clone(),
                    toml::Value::Integer(i) => i.to_string(),
                    toml::Value::Boolean(b) => b.to_string(),
                    other => {
                        return Err(RunnerError::Config(format!(
                            "dynamic property '{name}' must be a string or integer, got {}",
                            other.type_str()
                        )));
                    }
                };
                Ok((name.clone(), text))
            })
            .collect()
    }
}
