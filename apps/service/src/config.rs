use std::time::Duration;
use std::{env, fmt, fs, path};

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub broker: BrokerConfig,
    pub database: DatabaseConfig,
    pub checker: CheckerConfig,
    pub writer: WriterConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BrokerConfig {
    /// Local file path or libsql:// / http(s):// url
    pub url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub auth_token: Option<String>,
    pub topic: String,
    pub client_id: String,
    pub group_id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    pub url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub auth_token: Option<String>,
    pub pool_size: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CheckerConfig {
    pub sites_file: path::PathBuf,
    pub default_timeout_secs: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WriterConfig {
    pub poll_timeout_ms: u64,
    pub max_poll_records: usize,
}

impl Default for BrokerConfig {
    fn default() -> Self {
        Self {
            url: "healthwatch-broker.db".into(),
            auth_token: None,
            topic: "health_checker".into(),
            client_id: "CONSUMER_CLIENT_ID1".into(),
            group_id: "CONSUMER_GROUP_ID".into(),
        }
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self { url: "healthwatch.db".into(), auth_token: None, pool_size: 4 }
    }
}

impl Default for CheckerConfig {
    fn default() -> Self {
        Self { sites_file: "conf/sites.json".into(), default_timeout_secs: 3.0 }
    }
}

impl Default for WriterConfig {
    fn default() -> Self {
        Self { poll_timeout_ms: 5000, max_poll_records: 500 }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            broker: BrokerConfig::default(),
            database: DatabaseConfig::default(),
            checker: CheckerConfig::default(),
            writer: WriterConfig::default(),
        }
    }
}

impl CheckerConfig {
    pub fn default_timeout(&self) -> Duration {
        Duration::try_from_secs_f64(self.default_timeout_secs).unwrap_or(probe::DEFAULT_TIMEOUT)
    }
}

impl WriterConfig {
    pub fn poll_timeout(&self) -> Duration {
        Duration::from_millis(self.poll_timeout_ms)
    }
}

/// Used to ensure we are actually reading a toml file
fn normalize_toml_path(path: &path::Path) -> path::PathBuf {
    let mut path = path.to_path_buf();
    if path.extension().map(|ext| ext != "toml").unwrap_or(true) {
        path.set_extension("toml");
    }
    path
}

/// Get default config path ($XDG_CONFIG_HOME/healthwatch/config.toml or
/// $HOME/.config/...)
fn default_config_path() -> Result<path::PathBuf, ConfigError> {
    let path = if let Ok(config_home) = env::var("XDG_CONFIG_HOME") {
        path::PathBuf::from(config_home)
    } else if let Some(home_dir) = env::home_dir() {
        home_dir.join(".config")
    } else {
        return Err(ConfigError::ConfigPathUnavailable);
    };

    Ok(path.join("healthwatch/config.toml"))
}

fn redact(secret: &Option<String>) -> &'static str {
    if secret.is_some() { "(set)" } else { "(none)" }
}

impl fmt::Display for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let write_indented = |level: usize| {
            move |f: &mut fmt::Formatter<'_>, label: &str, value: &dyn fmt::Display| {
                writeln!(f, "  {:indent$}{}: {}", "", label, value, indent = level * 2)
            }
        };
        let write_title_indented = |level: usize| {
            move |f: &mut fmt::Formatter<'_>, label: &str| {
                writeln!(f, "{:indent$}{}", "", label, indent = level * 2)
            }
        };

        let write_title_1 = write_title_indented(1);
        let write_1 = write_indented(1);

        writeln!(f, "Current Internal Configuration State:")?;
        write_title_1(f, "Broker")?;
        write_1(f, "URL", &self.broker.url)?;
        write_1(f, "Auth Token", &redact(&self.broker.auth_token))?;
        write_1(f, "Topic", &self.broker.topic)?;
        write_1(f, "Client ID", &self.broker.client_id)?;
        write_1(f, "Group ID", &self.broker.group_id)?;
        write_title_1(f, "Database")?;
        write_1(f, "URL", &self.database.url)?;
        write_1(f, "Auth Token", &redact(&self.database.auth_token))?;
        write_1(f, "Pool Size", &self.database.pool_size)?;
        write_title_1(f, "Checker")?;
        write_1(f, "Sites File", &self.checker.sites_file.display())?;
        write_1(f, "Default Timeout (s)", &self.checker.default_timeout_secs)?;
        write_title_1(f, "Writer")?;
        write_1(f, "Poll Timeout (ms)", &self.writer.poll_timeout_ms)?;
        write_1(f, "Max Poll Records", &self.writer.max_poll_records)?;

        Ok(())
    }
}

impl Config {
    /// Generate Config structure from file
    ///
    /// Creates a default config in ~/.config/healthwatch/config.toml
    ///  or the specified path, with the name config.toml if one does not exist
    ///
    /// ```no_run
    /// let cfg = healthwatch::config::Config::from_config(None::<&std::path::Path>)?;
    /// println!("{}", cfg);
    /// # Ok::<(), healthwatch::error::ConfigError>(())
    /// ```
    pub fn from_config(optional_path: Option<impl AsRef<path::Path>>) -> Result<Self, ConfigError> {
        let config_path: path::PathBuf = if let Some(path) = optional_path {
            normalize_toml_path(path.as_ref())
        } else {
            default_config_path()?
        };

        if config_path.exists() {
            let raw_string = fs::read_to_string(&config_path)
                .map_err(|source| ConfigError::ReadFailed { path: config_path.clone(), source })?;
            toml::from_str(raw_string.as_str())
                .map_err(|err| ConfigError::ParseFailed { path: config_path, reason: err.to_string() })
        } else {
            let config = Self::default();
            config.write_config(&config_path)?;
            tracing::info!(path = %config_path.display(), "wrote default configuration");
            Ok(config)
        }
    }

    /// Serialize and write a config to a file
    pub fn write_config(&self, path: &path::Path) -> Result<(), ConfigError> {
        let config_str: String = toml::to_string_pretty(self)?;

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .map_err(|source| ConfigError::WriteFailed { path: parent.to_path_buf(), source })?;
        }

        fs::write(path, config_str).map_err(|source| ConfigError::WriteFailed { path: path.to_path_buf(), source })
    }
}
