// Migration configuration - Loading, validation and template generation
use crate::application::card_classifier::ConflictPolicy;
use crate::application::collection_resolver::CollectionMatchPolicy;
use config::builder::DefaultState;
use config::ConfigBuilder;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

const DEFAULT_CONFIG_FILE: &str = "config/migrator";
const ENV_PREFIX: &str = "MIGRATOR";
const LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to load configuration: {0}")]
    Load(#[from] config::ConfigError),

    #[error("invalid configuration:\n  - {}", .0.join("\n  - "))]
    Invalid(Vec<String>),

    #[error("failed to render configuration template: {0}")]
    Template(#[from] toml::ser::Error),

    #[error("failed to write {path}: {source}")]
    Write {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct InstanceSettings {
    pub url: String,
    pub api_key: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct MigrationConfig {
    pub timeout_seconds: u64,
    pub retry_attempts: u32,
    pub retry_delay_seconds: u64,
    pub log_level: String,
    pub conflict_policy: ConflictPolicy,
    pub collection_match: CollectionMatchPolicy,
    // Tables last so the rendered template stays valid TOML.
    pub source: InstanceSettings,
    pub target: InstanceSettings,
}

impl Default for MigrationConfig {
    fn default() -> Self {
        Self {
            timeout_seconds: 30,
            retry_attempts: 3,
            retry_delay_seconds: 5,
            log_level: "info".to_string(),
            conflict_policy: ConflictPolicy::default(),
            collection_match: CollectionMatchPolicy::default(),
            source: InstanceSettings::default(),
            target: InstanceSettings::default(),
        }
    }
}

impl MigrationConfig {
    /// Checks every setting and reports all problems at once.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut errors = Vec::new();

        for (role, instance) in [("source", &self.source), ("target", &self.target)] {
            if instance.url.trim().is_empty() {
                errors.push(format!("{role}.url is required"));
            } else if !is_absolute_http_url(&instance.url) {
                errors.push(format!("{role}.url must be an absolute http(s) URL"));
            }
            if instance.api_key.trim().is_empty() {
                errors.push(format!("{role}.api_key is required"));
            }
        }

        if self.timeout_seconds == 0 {
            errors.push("timeout_seconds must be greater than 0".to_string());
        }

        if !LOG_LEVELS.contains(&self.log_directive().as_str()) {
            errors.push(format!("log_level must be one of: {}", LOG_LEVELS.join(", ")));
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(ConfigError::Invalid(errors))
        }
    }

    /// Log level as a tracing filter directive. Accepts `warning` for `warn`.
    pub fn log_directive(&self) -> String {
        match self.log_level.trim().to_lowercase().as_str() {
            "warning" => "warn".to_string(),
            other => other.to_string(),
        }
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }

    pub fn retry_delay(&self) -> Duration {
        Duration::from_secs(self.retry_delay_seconds)
    }

    fn template() -> Self {
        Self {
            source: InstanceSettings {
                url: "https://source.metabase.example.com".to_string(),
                api_key: "your-source-api-key".to_string(),
            },
            target: InstanceSettings {
                url: "https://target.metabase.example.com".to_string(),
                api_key: "your-target-api-key".to_string(),
            },
            ..Self::default()
        }
    }
}

fn is_absolute_http_url(url: &str) -> bool {
    reqwest::Url::parse(url.trim())
        .map(|parsed| matches!(parsed.scheme(), "http" | "https") && parsed.has_host())
        .unwrap_or(false)
}

/// Loads the configuration from `path` (or the optional `config/migrator`
/// file) overlaid with `MIGRATOR__*` environment variables.
pub fn load_migration_config(path: Option<&Path>) -> Result<MigrationConfig, ConfigError> {
    let file = match path {
        Some(path) => config::File::from(path).required(true),
        None => config::File::with_name(DEFAULT_CONFIG_FILE).required(false),
    };
    let builder = config::Config::builder().add_source(file).add_source(
        config::Environment::with_prefix(ENV_PREFIX)
            .separator("__")
            .try_parsing(true),
    );
    build_config(builder)
}

fn build_config(builder: ConfigBuilder<DefaultState>) -> Result<MigrationConfig, ConfigError> {
    let settings = builder.build()?;
    let config: MigrationConfig = settings.try_deserialize()?;
    config.validate()?;
    Ok(config)
}

pub fn render_template() -> Result<String, ConfigError> {
    Ok(toml::to_string_pretty(&MigrationConfig::template())?)
}

pub fn write_template(path: &Path) -> Result<(), ConfigError> {
    let contents = render_template()?;
    std::fs::write(path, contents).map_err(|source| ConfigError::Write {
        path: path.display().to_string(),
        source,
    })
}
