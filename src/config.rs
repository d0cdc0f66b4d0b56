use clap::Parser;
use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct DatabaseConfig {
    /// DuckDB file path, or `:memory:`.
    pub connection_string: String,
    pub pool_size: usize,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct WebConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct LlmConfig {
    pub backend: String, // "remote" or "ollama"
    pub model: String,
    pub api_key: Option<String>,
    pub api_url: Option<String>,
    pub temperature: Option<f32>,
    pub timeout_secs: u64,
    pub max_retries: u32,
    pub retry_backoff_ms: u64,
}

impl LlmConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn retry_backoff(&self) -> Duration {
        Duration::from_millis(self.retry_backoff_ms)
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct QueryConfig {
    pub execution_timeout_secs: u64,
    pub default_list_limit: usize,
    pub max_list_limit: usize,
}

impl QueryConfig {
    pub fn execution_timeout(&self) -> Duration {
        Duration::from_secs(self.execution_timeout_secs)
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct AppConfig {
    pub database: DatabaseConfig,
    pub web: WebConfig,
    pub llm: LlmConfig,
    pub query: QueryConfig,
}

#[derive(Parser, Debug, Default)]
#[command(author, version, about, long_about = None)]
pub struct CliArgs {
    /// Path to configuration file
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Host to bind to
    #[arg(long)]
    pub host: Option<String>,

    /// Port to bind to
    #[arg(short, long)]
    pub port: Option<u16>,

    /// DuckDB database file (or `:memory:`)
    #[arg(long, value_name = "PATH")]
    pub database: Option<String>,

    /// Fill the analytics tables with demo data on start-up
    #[arg(long)]
    pub seed_demo: bool,

    /// Emit logs as JSON lines
    #[arg(long)]
    pub log_json: bool,
}

impl AppConfig {
    pub fn new(args: &CliArgs) -> Result<Self, ConfigError> {
        // Start with built-in defaults
        let mut config_builder = Config::builder().add_source(Config::try_from(&AppConfig::default())?);

        // Add configuration from file if specified
        if let Some(config_path) = &args.config {
            config_builder = config_builder.add_source(File::from(config_path.as_path()));
        } else {
            // Check for config in default locations
            let default_locations = vec![
                "config.toml",
                "config/config.toml",
                "/etc/dataflow/config.toml",
            ];

            for location in default_locations {
                if Path::new(location).exists() {
                    config_builder =
                        config_builder.add_source(File::new(location, config::FileFormat::Toml));
                    break;
                }
            }
        }

        // DATAFLOW__LLM__API_KEY=... style overrides
        config_builder = config_builder.add_source(
            Environment::with_prefix("DATAFLOW")
                .prefix_separator("__")
                .separator("__"),
        );

        let mut config: AppConfig = config_builder.build()?.try_deserialize()?;

        // Override with command line args if provided
        if let Some(host) = &args.host {
            config.web.host = host.clone();
        }
        if let Some(port) = args.port {
            config.web.port = port;
        }
        if let Some(database) = &args.database {
            config.database.connection_string = database.clone();
        }

        if config.llm.api_key.is_none() {
            config.llm.api_key = std::env::var("OPENAI_API_KEY").ok();
        }

        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.database.pool_size == 0 {
            return Err(ConfigError::Message(
                "database.pool_size must be at least 1".to_string(),
            ));
        }
        if self.query.default_list_limit == 0
            || self.query.default_list_limit > self.query.max_list_limit
        {
            return Err(ConfigError::Message(
                "query.default_list_limit must be between 1 and query.max_list_limit".to_string(),
            ));
        }
        Ok(())
    }
}

// Default implementation
impl Default for AppConfig {
    fn default() -> Self {
        Self {
            database: DatabaseConfig {
                connection_string: "dataflow.duckdb".to_string(),
                pool_size: 5,
            },
            web: WebConfig {
                host: "127.0.0.1".to_string(),
                port: 3000,
            },
            llm: LlmConfig {
                backend: "remote".to_string(),
                model: "gpt-5".to_string(),
                api_key: None,
                api_url: None,
                temperature: None,
                timeout_secs: 30,
                max_retries: 2,
                retry_backoff_ms: 500,
            },
            query: QueryConfig {
                execution_timeout_secs: 10,
                default_list_limit: 20,
                max_list_limit: 100,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_load_without_a_config_file() {
        let args = CliArgs {
            config: Some(PathBuf::from("/nonexistent/dataflow.toml")),
            ..Default::default()
        };
        // An explicit path that does not exist is an error, not a silent fallback.
        assert!(AppConfig::new(&args).is_err());

        let args = CliArgs {
            port: Some(8088),
            database: Some(":memory:".to_string()),
            ..Default::default()
        };
        let config = AppConfig::new(&args).unwrap();
        assert_eq!(config.web.port, 8088);
        assert_eq!(config.database.connection_string, ":memory:");
        assert_eq!(config.llm.timeout(), Duration::from_secs(30));
        assert_eq!(config.query.execution_timeout(), Duration::from_secs(10));
        assert_eq!(config.query.max_list_limit, 100);
    }

    #[test]
    fn rejects_inconsistent_list_limits() {
        let mut config = AppConfig::default();
        config.query.default_list_limit = 500;
        assert!(config.validate().is_err());
    }
}
