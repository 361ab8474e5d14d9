use config::{Config, Environment, File};
use serde::Deserialize;
use std::{env, path::Path};

#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    pub database: DatabaseConfig,
    #[serde(default)]
    pub trace: TraceConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    #[serde(default)]
    pub min_connections: u32,
    #[serde(default = "default_acquire_timeout_secs")]
    pub acquire_timeout_secs: u64,
    /// Run the bundled schema migrations on startup.
    #[serde(default)]
    pub migrate: bool,
}

fn default_acquire_timeout_secs() -> u64 {
    30
}

#[derive(Debug, Deserialize, Clone)]
pub struct TraceConfig {
    pub console: Option<TraceConsoleConfig>,
    pub file: Option<TraceFileConfig>,
}

impl Default for TraceConfig {
    fn default() -> Self {
        Self {
            console: Some(TraceConsoleConfig::default()),
            file: None,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct TraceConsoleConfig {
    pub filter: String,
    pub format: TraceFormat,
    pub buffer_limit: usize,
    pub lossy: bool,
}

impl Default for TraceConsoleConfig {
    fn default() -> Self {
        Self {
            filter: "info".into(),
            format: TraceFormat::Compact,
            buffer_limit: 128_000,
            lossy: true,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct TraceFileConfig {
    pub filter: String,
    pub format: TraceFormat,
    pub directory: String,
    pub filename: String,
    pub buffer_limit: usize,
    pub lossy: bool,
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum TraceFormat {
    Json,
    Pretty,
    Full,
    Compact,
}

impl AppConfig {
    pub fn new<P: AsRef<Path>>(path: P) -> crate::Result<Self> {
        let run_mode = env::var("APP_ENV").unwrap_or_else(|_| "".into());
        Self::load_with_options(path, Some(run_mode), None)
    }

    pub fn load_with_options<P: AsRef<Path>>(
        path: P,
        run_mode: Option<String>,
        overrides: Option<std::collections::HashMap<String, String>>,
    ) -> crate::Result<Self> {
        let dir = path.as_ref().to_string_lossy();
        let run_mode = run_mode.unwrap_or_default();
        let mut builder = Config::builder()
            .add_source(File::with_name(&format!("{dir}/default")))
            // per-environment file, e.g. configs/test.toml
            .add_source(
                File::with_name(&format!("{dir}/{run_mode}")).required(false),
            )
            // not committed
            .add_source(File::with_name(&format!("{dir}/local")).required(false))
            .add_source(
                Environment::with_prefix("PREPQUEST")
                    .prefix_separator("_")
                    .separator("__"),
            );

        if let Some(overrides) = overrides {
            for (key, value) in overrides {
                builder = builder
                    .set_override(key, value)
                    .map_err(|e| crate::Error::Config(anyhow::anyhow!(e)))?;
            }
        }

        builder
            .build()
            .map_err(|e| crate::Error::Config(anyhow::anyhow!(e)))?
            .try_deserialize()
            .map_err(|e| crate::Error::Config(anyhow::anyhow!(e)))
    }
}
