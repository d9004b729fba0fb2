use crate::infrastructure::classifier::ModelType;
use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

#[derive(Clone, Debug)]
pub struct Config {
    pub database_url: String,
    pub server_host: String,
    pub server_port: u16,
    pub imap_host: String,
    pub imap_port: u16,
    pub imap_use_tls: bool,
    pub imap_command_timeout: Duration,
    pub check_interval: Duration,
    pub job_timeout: Duration,
    pub max_concurrent_jobs: usize,
    pub batch_limit: usize,
    pub spam_folder: String,
    pub trash_folder: String,
    pub model_type: ModelType,
    pub models_dir: PathBuf,
    pub encryption_key: String,
    pub event_bus_capacity: usize,
    pub otel_exporter_endpoint: Option<String>,
    pub service_name: String,
    pub metrics_port: u16,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if it exists
        dotenvy::dotenv().ok();
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Build from any variable source; `from_env` passes the process environment.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |name: &str, default: &str| lookup(name).unwrap_or_else(|| default.to_string());

        let port = |name: &str, default: &str| -> Result<u16, ConfigError> {
            var(name, default)
                .parse()
                .map_err(|_| ConfigError::InvalidPort(name.to_string()))
        };

        let encryption_key = lookup("ENCRYPTION_KEY")
            .filter(|key| !key.trim().is_empty())
            .ok_or(ConfigError::MissingEncryptionKey)?;

        let model_type = var("SPAM_MODEL_TYPE", "lr")
            .parse()
            .map_err(ConfigError::InvalidModelType)?;

        let imap_use_tls = match var("IMAP_USE_TLS", "true").to_ascii_lowercase().as_str() {
            "true" | "1" | "yes" => true,
            "false" | "0" | "no" => false,
            _ => return Err(ConfigError::InvalidNumber("IMAP_USE_TLS".to_string())),
        };

        Ok(Config {
            database_url: var("DATABASE_URL", "sqlite://mailsentry.db?mode=rwc"),
            server_host: var("SERVER_HOST", "0.0.0.0"),
            server_port: port("SERVER_PORT", "8000")?,
            imap_host: var("IMAP_HOST", "imap.yourdomain.com"),
            imap_port: port("IMAP_PORT", "993")?,
            imap_use_tls,
            imap_command_timeout: Duration::from_secs(number(
                &var,
                "IMAP_COMMAND_TIMEOUT_SECONDS",
                "30",
            )?),
            check_interval: Duration::from_secs(number(&var, "EMAIL_CHECK_INTERVAL_SECONDS", "120")?),
            job_timeout: Duration::from_secs(number(&var, "MONITOR_JOB_TIMEOUT_SECONDS", "300")?),
            max_concurrent_jobs: number(&var, "MONITOR_MAX_CONCURRENT_JOBS", "16")?,
            batch_limit: number::<usize, _>(&var, "MONITOR_BATCH_LIMIT", "100")?.clamp(1, 100),
            spam_folder: var("SPAM_FOLDER", "Spam"),
            trash_folder: var("TRASH_FOLDER", "Trash"),
            model_type,
            models_dir: PathBuf::from(var("MODELS_DIR", "models")),
            encryption_key,
            event_bus_capacity: number(&var, "EVENT_BUS_CAPACITY", "100")?,
            otel_exporter_endpoint: lookup("OTEL_EXPORTER_OTLP_ENDPOINT"),
            service_name: var("SERVICE_NAME", "mailsentry"),
            metrics_port: port("METRICS_PORT", "9000")?,
        })
    }

    pub fn server_address(&self) -> String {
        format!("{}:{}", self.server_host, self.server_port)
    }
}

fn number<T, V>(var: &V, name: &str, default: &str) -> Result<T, ConfigError>
where
    T: FromStr,
    V: Fn(&str, &str) -> String,
{
    var(name, default)
        .trim()
        .parse()
        .map_err(|_| ConfigError::InvalidNumber(name.to_string()))
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("ENCRYPTION_KEY environment variable not set")]
    MissingEncryptionKey,

    #[error("Invalid port number in {0}")]
    InvalidPort(String),

    #[error("Invalid value for {0}")]
    InvalidNumber(String),

    #[error("{0}")]
    InvalidModelType(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config(vars: &[(&str, &str)]) -> Result<Config, ConfigError> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|name| vars.get(name).cloned())
    }

    #[test]
    fn test_defaults() {
        let config = config(&[("ENCRYPTION_KEY", "secret")]).unwrap();
        assert_eq!(config.server_address(), "0.0.0.0:8000");
        assert_eq!(config.imap_port, 993);
        assert!(config.imap_use_tls);
        assert_eq!(config.check_interval, Duration::from_secs(120));
        assert_eq!(config.batch_limit, 100);
        assert_eq!(config.spam_folder, "Spam");
        assert_eq!(config.model_type, ModelType::Lr);
        assert_eq!(config.event_bus_capacity, 100);
        assert!(config.otel_exporter_endpoint.is_none());
    }

    #[test]
    fn test_encryption_key_is_required() {
        assert!(matches!(
            config(&[]),
            Err(ConfigError::MissingEncryptionKey)
        ));
        assert!(matches!(
            config(&[("ENCRYPTION_KEY", "  ")]),
            Err(ConfigError::MissingEncryptionKey)
        ));
    }

    #[test]
    fn test_invalid_values_fail() {
        assert!(matches!(
            config(&[("ENCRYPTION_KEY", "k"), ("SERVER_PORT", "http")]),
            Err(ConfigError::InvalidPort(_))
        ));
        assert!(matches!(
            config(&[("ENCRYPTION_KEY", "k"), ("EMAIL_CHECK_INTERVAL_SECONDS", "soon")]),
            Err(ConfigError::InvalidNumber(name)) if name == "EMAIL_CHECK_INTERVAL_SECONDS"
        ));
        assert!(matches!(
            config(&[("ENCRYPTION_KEY", "k"), ("SPAM_MODEL_TYPE", "svm")]),
            Err(ConfigError::InvalidModelType(_))
        ));
    }

    #[test]
    fn test_batch_limit_is_capped() {
        let config = config(&[("ENCRYPTION_KEY", "k"), ("MONITOR_BATCH_LIMIT", "500")]).unwrap();
        assert_eq!(config.batch_limit, 100);
    }
}
