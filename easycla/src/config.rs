use serde::Deserialize;
use std::fs::File;
use std::path::Path;
use store::config::TableNames;

#[derive(Deserialize, Debug)]
pub struct MetricsConfig {
    pub statsd_host: String,
    pub statsd_port: u16,
    #[serde(default = "default_metrics_prefix")]
    pub prefix: String,
}

fn default_metrics_prefix() -> String {
    "easycla".to_string()
}

#[derive(Deserialize, Debug)]
pub struct LoggingConfig {
    /// An `EnvFilter` directive; `RUST_LOG` takes precedence when set.
    #[serde(default = "default_log_level")]
    pub level: String,
    pub sentry_dsn: Option<String>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        LoggingConfig {
            level: default_log_level(),
            sentry_dsn: None,
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

#[derive(Deserialize, Debug)]
pub struct Config {
    pub stage: String,
    pub metrics: Option<MetricsConfig>,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub store: store::config::Config,
    pub upstreams: Option<upstreams::Config>,
    pub api: Option<aggregator::config::Config>,
}

impl Config {
    /// Loads the file, applies the `STAGE` override and validates.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        Self::load(path, std::env::var("STAGE").ok())
    }

    fn load(path: &Path, stage_override: Option<String>) -> Result<Self, ConfigError> {
        let file = File::open(path)?;
        let mut config: Config = serde_yaml::from_reader(file)?;
        if let Some(stage) = stage_override.filter(|s| !s.is_empty()) {
            config.stage = stage;
        }
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.stage.trim().is_empty() {
            return Err(ValidationError::EmptyStage);
        }
        if self.store.page_size == 0 {
            return Err(ValidationError::ZeroPageSize);
        }
        if let Some(metrics) = &self.metrics {
            if metrics.statsd_port == 0 {
                return Err(ValidationError::ZeroStatsdPort);
            }
        }
        if let Some(upstreams) = &self.upstreams {
            upstreams.validate()?;
        }
        if let Some(api) = &self.api {
            api.validate()?;
        }
        Ok(())
    }

    pub fn table_names(&self) -> TableNames {
        TableNames::for_stage(&self.stage).with_metrics_table(self.store.metrics_table.as_deref())
    }
}

#[derive(thiserror::Error, Debug)]
pub enum ValidationError {
    #[error("stage cannot be empty")]
    EmptyStage,
    #[error("store page_size cannot be 0")]
    ZeroPageSize,
    #[error("statsd_port cannot be 0")]
    ZeroStatsdPort,
    #[error("invalid api config: {0}")]
    Api(#[from] aggregator::config::ValidationError),
    #[error("invalid upstreams config: {0}")]
    Upstreams(#[from] upstreams::config::ValidationError),
}

#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    #[error("could not load config from file: {0}")]
    LoadError(#[from] std::io::Error),
    #[error("could not parse config: {0}")]
    ParseError(#[from] serde_yaml::Error),
    #[error("invalid config: {0}")]
    Invalid(#[from] ValidationError),
}
