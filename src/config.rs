use serde::{Deserialize, Serialize};

use std::{env, fmt, fs, path::Path, time::Duration};

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file '{path}': {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },

    #[error("Failed to parse config file '{path}': {source}")]
    Parse {
        path: String,
        source: serde_yaml::Error,
    },

    #[error("{0} must be provided in the config file or as an ENV variable")]
    MissingSecret(&'static str),

    #[error("Invalid executor settings: {0}")]
    Executor(String),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub port: u16,
    pub mail: MailConfig,
    pub queue: QueueConfig,
    pub executor: ExecutorConfig,
}

#[derive(Clone, Serialize, Deserialize)]
pub struct MailConfig {
    pub username: String,
    pub password: String,
    pub smtp: ServerConfig,
    pub imap: ServerConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueConfig {
    pub name: String,
    pub capacity: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutorConfig {
    pub core_pool_size: usize,
    pub max_pool_size: usize,
    pub queue_capacity: usize,
    #[serde(with = "humantime_serde")]
    pub keep_alive: Duration,
    pub thread_name_prefix: String,
}

impl ServerConfig {
    pub fn smtp() -> Self {
        Self {
            host: "smtp.gmail.com".to_string(),
            port: 587,
        }
    }

    pub fn imap() -> Self {
        Self {
            host: "imap.gmail.com".to_string(),
            port: 993,
        }
    }
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            name: "emailQueue".to_string(),
            capacity: 10_000,
        }
    }
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            core_pool_size: 50,
            max_pool_size: 200,
            queue_capacity: 10_000,
            keep_alive: Duration::from_secs(60),
            thread_name_prefix: "AsyncThread-".to_string(),
        }
    }
}

impl Default for MailConfig {
    fn default() -> Self {
        Self {
            username: String::new(),
            password: String::new(),
            smtp: ServerConfig::smtp(),
            imap: ServerConfig::imap(),
        }
    }
}

impl fmt::Debug for MailConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MailConfig")
            .field("username", &self.username)
            .field("password", &"[REDACTED]")
            .field("smtp", &self.smtp)
            .field("imap", &self.imap)
            .finish()
    }
}

impl Config {
    pub fn with_defaults() -> Self {
        Self {
            port: 8080,
            mail: MailConfig::default(),
            queue: QueueConfig::default(),
            executor: ExecutorConfig::default(),
        }
    }

    /// Parses a YAML document, filling every absent key from the built-in defaults.
    pub fn from_yaml(contents: &str, path: &str) -> Result<Self, ConfigError> {
        let mut value = serde_yaml::to_value(Self::with_defaults()).map_err(|source| {
            ConfigError::Parse {
                path: path.to_string(),
                source,
            }
        })?;
        let overrides: serde_yaml::Value =
            serde_yaml::from_str(contents).map_err(|source| ConfigError::Parse {
                path: path.to_string(),
                source,
            })?;
        merge(&mut value, overrides);

        serde_yaml::from_value(value).map_err(|source| ConfigError::Parse {
            path: path.to_string(),
            source,
        })
    }

    /// Applies `MAIL_USERNAME` / `MAIL_PASSWORD` over whatever the file provided.
    fn apply_env(&mut self) {
        if let Ok(username) = env::var("MAIL_USERNAME") {
            self.mail.username = username;
        }
        if let Ok(password) = env::var("MAIL_PASSWORD") {
            self.mail.password = password;
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.mail.username.is_empty() {
            return Err(ConfigError::MissingSecret("MAIL_USERNAME"));
        }
        if self.mail.password.is_empty() {
            return Err(ConfigError::MissingSecret("MAIL_PASSWORD"));
        }

        let executor = &self.executor;
        if executor.max_pool_size == 0 {
            return Err(ConfigError::Executor(
                "max_pool_size must be greater than zero".to_string(),
            ));
        }
        if executor.core_pool_size > executor.max_pool_size {
            return Err(ConfigError::Executor(format!(
                "core_pool_size ({}) exceeds max_pool_size ({})",
                executor.core_pool_size, executor.max_pool_size
            )));
        }

        Ok(())
    }
}

fn merge(base: &mut serde_yaml::Value, overrides: serde_yaml::Value) {
    match (base, overrides) {
        (serde_yaml::Value::Mapping(base), serde_yaml::Value::Mapping(overrides)) => {
            for (key, value) in overrides {
                match base.get_mut(&key) {
                    Some(slot) => merge(slot, value),
                    None => {
                        base.insert(key, value);
                    }
                }
            }
        }
        (_, serde_yaml::Value::Null) => {}
        (slot, value) => *slot = value,
    }
}

fn read_config(path: &str) -> Result<Config, ConfigError> {
    let contents = fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_string(),
        source,
    })?;
    Config::from_yaml(&contents, path)
}

fn locate_config() -> Result<Config, ConfigError> {
    // Retrieve env variable
    let config_path =
        env::var("MAIL_DISPATCH_CONFIG").unwrap_or_else(|_| "config.yaml".to_string());

    // Try env path
    if Path::new(&config_path).exists() {
        return read_config(&config_path);
    }

    // Fallback to config.yaml
    if Path::new("config.yaml").exists() {
        tracing::warn!(
            "Config file '{}' not found, falling back to 'config.yaml'",
            config_path
        );
        return read_config("config.yaml");
    }

    // Fallback to config.example.yaml
    if Path::new("config.example.yaml").exists() {
        tracing::warn!(
            "Config file '{}' and 'config.yaml' not found, falling back to 'config.example.yaml'\
             \n This file should not be used and should be replaced with actual data",
            config_path
        );
        return read_config("config.example.yaml");
    }

    // Fallback to defaults, secrets must then come from the environment
    tracing::info!("No config file found, using defaults and environment variables");
    Ok(Config::with_defaults())
}

pub fn load_config() -> Result<Config, ConfigError> {
    let mut config = locate_config()?;
    config.apply_env();
    config.validate()?;
    Ok(config)
}
