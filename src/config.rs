use crate::constants::*;
use crate::error::{PipelineError, Result};
use serde::Deserialize;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::{debug, info};

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub source: SourceConfig,
    pub database: DatabaseConfig,
    pub report: ReportConfig,
    pub charts: ChartsConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SourceConfig {
    pub path: PathBuf,
    pub delimiter: char,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from(DEFAULT_SOURCE_PATH),
            delimiter: ',',
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    Mysql,
    Sqlite,
    Memory,
}

impl FromStr for Backend {
    type Err = PipelineError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "mysql" => Ok(Backend::Mysql),
            "sqlite" => Ok(Backend::Sqlite),
            "memory" => Ok(Backend::Memory),
            other => Err(PipelineError::Config(format!(
                "unknown database backend '{other}' (expected mysql, sqlite or memory)"
            ))),
        }
    }
}

/// Connection parameters for the target table. Passed explicitly to the
/// persistence step; nothing here is global.
#[derive(Clone, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    pub backend: Backend,
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: String,
    /// Database name, or the database file path for the sqlite backend.
    pub database: String,
    pub table: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            backend: Backend::Mysql,
            host: DEFAULT_DB_HOST.to_string(),
            port: DEFAULT_DB_PORT,
            user: DEFAULT_DB_USER.to_string(),
            password: String::new(),
            database: DEFAULT_DB_NAME.to_string(),
            table: DEFAULT_TABLE.to_string(),
        }
    }
}

// Hand-written so the password never reaches the logs.
impl std::fmt::Debug for DatabaseConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DatabaseConfig")
            .field("backend", &self.backend)
            .field("host", &self.host)
            .field("port", &self.port)
            .field("user", &self.user)
            .field("password", &"***")
            .field("database", &self.database)
            .field("table", &self.table)
            .finish()
    }
}

impl DatabaseConfig {
    /// Connection target with the password masked, for logs and messages.
    pub fn redacted_url(&self) -> String {
        match self.backend {
            Backend::Mysql => format!(
                "mysql://{}:***@{}:{}/{}",
                self.user, self.host, self.port, self.database
            ),
            Backend::Sqlite => format!("sqlite://{}", self.database),
            Backend::Memory => "memory://".to_string(),
        }
    }

    /// Apply `COVID_DB_*` overrides. `lookup` is `std::env::var` in production.
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(v) = lookup(ENV_DB_BACKEND) {
            self.backend = v.parse()?;
        }
        if let Some(v) = lookup(ENV_DB_HOST) {
            self.host = v;
        }
        if let Some(v) = lookup(ENV_DB_PORT) {
            self.port = v.trim().parse().map_err(|_| {
                PipelineError::Config(format!("{ENV_DB_PORT} is not a valid port: '{v}'"))
            })?;
        }
        if let Some(v) = lookup(ENV_DB_USER) {
            self.user = v;
        }
        if let Some(v) = lookup(ENV_DB_PASSWORD) {
            self.password = v;
        }
        if let Some(v) = lookup(ENV_DB_NAME) {
            self.database = v;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ReportConfig {
    pub top_n: usize,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            top_n: DEFAULT_TOP_N,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ChartsConfig {
    pub enabled: bool,
    pub output_dir: PathBuf,
    pub deaths_file: String,
    pub population_file: String,
    pub width: u32,
    pub height: u32,
}

impl Default for ChartsConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            output_dir: PathBuf::from("."),
            deaths_file: DEFAULT_DEATHS_CHART.to_string(),
            population_file: DEFAULT_POPULATION_CHART.to_string(),
            width: 1200,
            height: 800,
        }
    }
}

impl Config {
    /// Load configuration from `path`, or from `config.toml` when no path is given.
    /// A missing default file yields the built-in defaults; a missing explicit file is an error.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let (config_path, explicit) = match path {
            Some(p) => (p.to_path_buf(), true),
            None => (PathBuf::from(DEFAULT_CONFIG_PATH), false),
        };

        if !config_path.exists() {
            if explicit {
                return Err(PipelineError::Config(format!(
                    "Failed to read config file '{}': file does not exist",
                    config_path.display()
                )));
            }
            debug!("No {} found, using defaults", config_path.display());
            return Ok(Config::default());
        }

        let config_content = fs::read_to_string(&config_path).map_err(|e| {
            PipelineError::Config(format!(
                "Failed to read config file '{}': {}",
                config_path.display(),
                e
            ))
        })?;

        let config = Self::from_toml(&config_content)?;
        info!("Loaded configuration from {}", config_path.display());
        Ok(config)
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        let config: Config = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Apply environment overrides on top of the file values.
    pub fn apply_env(&mut self) -> Result<()> {
        self.database.apply_overrides(|key| env::var(key).ok())?;
        self.validate()
    }

    pub fn validate(&self) -> Result<()> {
        if self.report.top_n == 0 {
            return Err(PipelineError::Config("report.top_n must be at least 1".into()));
        }
        if self.database.table.trim().is_empty() {
            return Err(PipelineError::Config("database.table must not be empty".into()));
        }
        if self.charts.width == 0 || self.charts.height == 0 {
            return Err(PipelineError::Config("chart dimensions must be non-zero".into()));
        }
        if !self.source.delimiter.is_ascii() {
            return Err(PipelineError::Config(format!(
                "source.delimiter must be a single ASCII character, got '{}'",
                self.source.delimiter
            )));
        }
        Ok(())
    }
}
