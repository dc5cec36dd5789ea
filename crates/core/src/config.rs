use std::env;
use std::fs;
use std::path::PathBuf;

use secrecy::SecretString;
use serde::Deserialize;
use thiserror::Error;

use crate::classifier::ClassifierRules;

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub database: DatabaseConfig,
    pub approval: ApprovalConfig,
    pub executor: ExecutorSettings,
    pub classifier: ClassifierRules,
    pub notify: NotifyConfig,
    pub logging: LoggingConfig,
}

#[derive(Clone, Debug)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub timeout_secs: u64,
}

#[derive(Clone, Debug)]
pub struct ApprovalConfig {
    pub signing_key: SecretString,
    pub token_ttl_secs: i64,
}

#[derive(Clone, Debug)]
pub struct ExecutorSettings {
    pub connector_timeout_secs: u64,
}

#[derive(Clone, Debug)]
pub struct NotifyConfig {
    pub sms_enabled: bool,
    pub email_enabled: bool,
    pub channel_timeout_secs: u64,
    pub sms_api_key: Option<SecretString>,
    pub email_api_key: Option<SecretString>,
}

#[derive(Clone, Debug)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    Compact,
    Pretty,
    Json,
}

#[derive(Clone, Debug, Default)]
pub struct ConfigOverrides {
    pub database_url: Option<String>,
    pub log_level: Option<String>,
    pub approval_signing_key: Option<String>,
}

#[derive(Clone, Debug, Default)]
pub struct LoadOptions {
    pub config_path: Option<PathBuf>,
    pub require_file: bool,
    pub overrides: ConfigOverrides,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not read config file `{path}`: {source}")]
    ReadFile { path: PathBuf, source: std::io::Error },
    #[error("could not parse config file `{path}`: {source}")]
    ParseFile { path: PathBuf, source: toml::de::Error },
    #[error("required config file was not found: `{0}`")]
    MissingConfigFile(PathBuf),
    #[error("invalid environment override for `{key}`: `{value}`")]
    InvalidEnvOverride { key: String, value: String },
    #[error("configuration validation failed: {0}")]
    Validation(String),
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            database: DatabaseConfig {
                url: "sqlite://storemind.db".to_string(),
                max_connections: 5,
                timeout_secs: 30,
            },
            approval: ApprovalConfig {
                signing_key: SecretString::from(String::new()),
                token_ttl_secs: 3600,
            },
            executor: ExecutorSettings { connector_timeout_secs: 30 },
            classifier: ClassifierRules::default(),
            notify: NotifyConfig {
                sms_enabled: true,
                email_enabled: true,
                channel_timeout_secs: 10,
                sms_api_key: None,
                email_api_key: None,
            },
            logging: LoggingConfig { level: "info".to_string(), format: LogFormat::Compact },
        }
    }
}

/// TOML shape of the config file; every field is optional and merged
/// over the defaults.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct FileConfig {
    database: Option<FileDatabase>,
    approval: Option<FileApproval>,
    executor: Option<FileExecutor>,
    classifier: Option<ClassifierRules>,
    notify: Option<FileNotify>,
    logging: Option<FileLogging>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct FileDatabase {
    url: Option<String>,
    max_connections: Option<u32>,
    timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct FileApproval {
    signing_key: Option<String>,
    token_ttl_secs: Option<i64>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct FileExecutor {
    connector_timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct FileNotify {
    sms_enabled: Option<bool>,
    email_enabled: Option<bool>,
    channel_timeout_secs: Option<u64>,
    sms_api_key: Option<String>,
    email_api_key: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct FileLogging {
    level: Option<String>,
    format: Option<LogFormat>,
}

impl AppConfig {
    pub fn load(options: LoadOptions) -> Result<Self, ConfigError> {
        let mut config = Self::default();

        if let Some(path) = resolve_config_path(&options)? {
            let raw = fs::read_to_string(&path)
                .map_err(|source| ConfigError::ReadFile { path: path.clone(), source })?;
            let file: FileConfig = toml::from_str(&raw)
                .map_err(|source| ConfigError::ParseFile { path: path.clone(), source })?;
            config.merge_file(file);
        }

        config.apply_env()?;
        config.apply_overrides(&options.overrides);
        config.validate()?;

        Ok(config)
    }

    fn merge_file(&mut self, file: FileConfig) {
        if let Some(database) = file.database {
            if let Some(url) = database.url {
                self.database.url = url;
            }
            if let Some(max_connections) = database.max_connections {
                self.database.max_connections = max_connections;
            }
            if let Some(timeout_secs) = database.timeout_secs {
                self.database.timeout_secs = timeout_secs;
            }
        }
        if let Some(approval) = file.approval {
            if let Some(signing_key) = approval.signing_key {
                self.approval.signing_key = SecretString::from(signing_key);
            }
            if let Some(token_ttl_secs) = approval.token_ttl_secs {
                self.approval.token_ttl_secs = token_ttl_secs;
            }
        }
        if let Some(executor) = file.executor {
            if let Some(connector_timeout_secs) = executor.connector_timeout_secs {
                self.executor.connector_timeout_secs = connector_timeout_secs;
            }
        }
        if let Some(classifier) = file.classifier {
            self.classifier = classifier;
        }
        if let Some(notify) = file.notify {
            if let Some(sms_enabled) = notify.sms_enabled {
                self.notify.sms_enabled = sms_enabled;
            }
            if let Some(email_enabled) = notify.email_enabled {
                self.notify.email_enabled = email_enabled;
            }
            if let Some(channel_timeout_secs) = notify.channel_timeout_secs {
                self.notify.channel_timeout_secs = channel_timeout_secs;
            }
            if let Some(sms_api_key) = notify.sms_api_key {
                self.notify.sms_api_key = Some(SecretString::from(sms_api_key));
            }
            if let Some(email_api_key) = notify.email_api_key {
                self.notify.email_api_key = Some(SecretString::from(email_api_key));
            }
        }
        if let Some(logging) = file.logging {
            if let Some(level) = logging.level {
                self.logging.level = level;
            }
            if let Some(format) = logging.format {
                self.logging.format = format;
            }
        }
    }

    fn apply_env(&mut self) -> Result<(), ConfigError> {
        if let Ok(url) = env::var("STOREMIND_DATABASE_URL") {
            self.database.url = url;
        }
        if let Ok(level) = env::var("STOREMIND_LOG_LEVEL") {
            self.logging.level = level;
        }
        if let Ok(key) = env::var("STOREMIND_APPROVAL_SIGNING_KEY") {
            self.approval.signing_key = SecretString::from(key);
        }
        if let Ok(value) = env::var("STOREMIND_CONNECTOR_TIMEOUT_SECS") {
            self.executor.connector_timeout_secs = value.parse().map_err(|_| {
                ConfigError::InvalidEnvOverride {
                    key: "STOREMIND_CONNECTOR_TIMEOUT_SECS".to_string(),
                    value,
                }
            })?;
        }
        if let Ok(value) = env::var("STOREMIND_TOKEN_TTL_SECS") {
            self.approval.token_ttl_secs = value.parse().map_err(|_| {
                ConfigError::InvalidEnvOverride {
                    key: "STOREMIND_TOKEN_TTL_SECS".to_string(),
                    value,
                }
            })?;
        }
        Ok(())
    }

    fn apply_overrides(&mut self, overrides: &ConfigOverrides) {
        if let Some(url) = &overrides.database_url {
            self.database.url = url.clone();
        }
        if let Some(level) = &overrides.log_level {
            self.logging.level = level.clone();
        }
        if let Some(key) = &overrides.approval_signing_key {
            self.approval.signing_key = SecretString::from(key.clone());
        }
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.database.max_connections == 0 {
            return Err(ConfigError::Validation(
                "database.max_connections must be at least 1".to_string(),
            ));
        }
        if self.approval.token_ttl_secs <= 0 {
            return Err(ConfigError::Validation(
                "approval.token_ttl_secs must be positive".to_string(),
            ));
        }
        if self.executor.connector_timeout_secs == 0 {
            return Err(ConfigError::Validation(
                "executor.connector_timeout_secs must be positive".to_string(),
            ));
        }
        if self.classifier.alert_keywords.is_empty() && self.classifier.action_keywords.is_empty()
        {
            return Err(ConfigError::Validation(
                "classifier must define at least one alert or action keyword".to_string(),
            ));
        }
        Ok(())
    }
}

fn resolve_config_path(options: &LoadOptions) -> Result<Option<PathBuf>, ConfigError> {
    let Some(path) = &options.config_path else {
        return Ok(None);
    };

    if path.exists() {
        return Ok(Some(path.clone()));
    }
    if options.require_file {
        return Err(ConfigError::MissingConfigFile(path.clone()));
    }
    Ok(None)
}
