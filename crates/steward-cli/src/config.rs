//! CLI configuration

use anyhow::Result;
use serde::Deserialize;
use std::path::Path;

use steward_engine::EngineConfig;

#[derive(Debug, Default, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub engine: EngineConfig,
    #[serde(default)]
    pub run: RunSettings,
}

#[derive(Debug, Deserialize)]
pub struct RunSettings {
    /// Deadline for a whole request, batches included
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Recorded on every request context
    #[serde(default)]
    pub actor: Option<String>,
}

fn default_timeout_secs() -> u64 {
    300
}

impl Default for RunSettings {
    fn default() -> Self {
        Self {
            timeout_secs: default_timeout_secs(),
            actor: None,
        }
    }
}

impl Settings {
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        let mut builder = config::Config::builder()
            .set_default("run.timeout_secs", default_timeout_secs())?
            // Load from config files if present
            .add_source(config::File::with_name("config/default").required(false))
            .add_source(config::File::with_name("config/local").required(false));

        if let Some(path) = explicit {
            builder = builder.add_source(config::File::from(path).required(true));
        }

        let config = builder
            // Load from environment variables with STEWARD_ prefix
            .add_source(
                config::Environment::with_prefix("STEWARD")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        Ok(config.try_deserialize()?)
    }
}
