//! Runner settings loaded from the process environment
//!
//! Every knob has a default suitable for local development; production
//! deployments override them through the container environment.

use crate::{Result, SettingsError};
use std::collections::HashMap;
use std::path::PathBuf;

/// Default AMQP port used when `RABBITMQ_HOST` is a bare hostname.
const DEFAULT_AMQP_PORT: u16 = 5672;

/// Settings shared by the runner and the bus client.
#[derive(Debug, Clone)]
pub struct Settings {
    /// HTTP port of the front service (forwarded to its process; the
    /// runner itself does not listen).
    pub port: u16,
    /// MongoDB connection string.
    pub mongodb_uri: String,
    /// Database holding the projects / executions / request collections.
    pub mongodb_database: String,
    /// RabbitMQ host name or full `amqp://` URI.
    pub rabbitmq_host: String,
    /// Docker daemon socket path or URI.
    pub docker_socket_path: String,
    /// Global cap on concurrently running submission containers.
    pub submission_concurrency: usize,
    /// Fallback container timeout when a project does not set one.
    pub default_container_timeout_sec: u64,
    /// Root directory for per-invocation scratch directories.
    pub scratch_root: PathBuf,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            port: 3000,
            mongodb_uri: "mongodb://localhost:27017".to_string(),
            mongodb_database: "solgrade".to_string(),
            rabbitmq_host: "localhost".to_string(),
            docker_socket_path: default_docker_socket(),
            submission_concurrency: 4,
            default_container_timeout_sec: 60,
            scratch_root: std::env::temp_dir().join("solgrade"),
        }
    }
}

#[cfg(windows)]
fn default_docker_socket() -> String {
    "//./pipe/docker_engine".to_string()
}

#[cfg(not(windows))]
fn default_docker_socket() -> String {
    "/var/run/docker.sock".to_string()
}

impl Settings {
    /// Load settings from the process environment.
    pub fn from_env() -> Result<Self> {
        let vars: HashMap<String, String> = std::env::vars().collect();
        Self::from_env_map(&vars)
    }

    /// Load settings from an explicit variable map (injectable for tests).
    pub fn from_env_map(vars: &HashMap<String, String>) -> Result<Self> {
        let defaults = Self::default();

        let port = parse_or("PORT", vars, defaults.port)?;
        let submission_concurrency =
            parse_or("SUBMISSION_CONCURRENCY", vars, defaults.submission_concurrency)?;
        let default_container_timeout_sec = parse_or(
            "DEFAULT_CONTAINER_TIMEOUT_SEC",
            vars,
            defaults.default_container_timeout_sec,
        )?;

        if submission_concurrency == 0 {
            return Err(SettingsError::InvalidValue {
                var: "SUBMISSION_CONCURRENCY",
                value: "0".to_string(),
                reason: "must be at least 1".to_string(),
            });
        }
        if default_container_timeout_sec == 0 {
            return Err(SettingsError::InvalidValue {
                var: "DEFAULT_CONTAINER_TIMEOUT_SEC",
                value: "0".to_string(),
                reason: "must be at least 1 second".to_string(),
            });
        }

        let settings = Self {
            port,
            mongodb_uri: string_or("MONGODB_URI", vars, defaults.mongodb_uri),
            mongodb_database: string_or("MONGODB_DATABASE", vars, defaults.mongodb_database),
            rabbitmq_host: string_or("RABBITMQ_HOST", vars, defaults.rabbitmq_host),
            docker_socket_path: string_or("DOCKER_SOCKET_PATH", vars, defaults.docker_socket_path),
            submission_concurrency,
            default_container_timeout_sec,
            scratch_root: vars
                .get("SCRATCH_ROOT")
                .map(PathBuf::from)
                .unwrap_or(defaults.scratch_root),
        };

        tracing::debug!(
            concurrency = settings.submission_concurrency,
            timeout_sec = settings.default_container_timeout_sec,
            "settings loaded"
        );

        Ok(settings)
    }

    /// The AMQP connection URI derived from `rabbitmq_host`.
    ///
    /// A value that already carries a scheme is used verbatim; a bare host
    /// name gets the default port and vhost.
    pub fn amqp_uri(&self) -> String {
        if self.rabbitmq_host.contains("://") {
            self.rabbitmq_host.clone()
        } else {
            format!("amqp://{}:{}/%2f", self.rabbitmq_host, DEFAULT_AMQP_PORT)
        }
    }
}

fn string_or(var: &'static str, vars: &HashMap<String, String>, default: String) -> String {
    match vars.get(var) {
        Some(v) if !v.is_empty() => v.clone(),
        _ => default,
    }
}

fn parse_or<T>(var: &'static str, vars: &HashMap<String, String>, default: T) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match vars.get(var) {
        Some(raw) if !raw.is_empty() => raw.parse().map_err(|e: T::Err| {
            SettingsError::InvalidValue {
                var,
                value: raw.clone(),
                reason: e.to_string(),
            }
        }),
        _ => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn env(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_defaults() {
        let settings = Settings::from_env_map(&HashMap::new()).unwrap();
        assert_eq!(settings.submission_concurrency, 4);
        assert_eq!(settings.default_container_timeout_sec, 60);
        assert_eq!(settings.mongodb_database, "solgrade");
        assert_eq!(settings.rabbitmq_host, "localhost");
    }

    #[test]
    fn test_overrides() {
        let vars = env(&[
            ("PORT", "8080"),
            ("MONGODB_URI", "mongodb://db:27017"),
            ("RABBITMQ_HOST", "mq.internal"),
            ("DOCKER_SOCKET_PATH", "/run/docker.sock"),
            ("SUBMISSION_CONCURRENCY", "8"),
            ("DEFAULT_CONTAINER_TIMEOUT_SEC", "120"),
        ]);

        let settings = Settings::from_env_map(&vars).unwrap();
        assert_eq!(settings.port, 8080);
        assert_eq!(settings.mongodb_uri, "mongodb://db:27017");
        assert_eq!(settings.rabbitmq_host, "mq.internal");
        assert_eq!(settings.docker_socket_path, "/run/docker.sock");
        assert_eq!(settings.submission_concurrency, 8);
        assert_eq!(settings.default_container_timeout_sec, 120);
    }

    #[test]
    fn test_invalid_number_rejected() {
        let vars = env(&[("SUBMISSION_CONCURRENCY", "not-a-number")]);
        let err = Settings::from_env_map(&vars).unwrap_err();
        assert!(matches!(err, SettingsError::InvalidValue { var, .. } if var == "SUBMISSION_CONCURRENCY"));
    }

    #[test]
    fn test_zero_concurrency_rejected() {
        let vars = env(&[("SUBMISSION_CONCURRENCY", "0")]);
        assert!(Settings::from_env_map(&vars).is_err());
    }

    #[test]
    fn test_empty_value_falls_back_to_default() {
        let vars = env(&[("RABBITMQ_HOST", "")]);
        let settings = Settings::from_env_map(&vars).unwrap();
        assert_eq!(settings.rabbitmq_host, "localhost");
    }

    #[test]
    fn test_amqp_uri_from_bare_host() {
        let vars = env(&[("RABBITMQ_HOST", "mq.internal")]);
        let settings = Settings::from_env_map(&vars).unwrap();
        assert_eq!(settings.amqp_uri(), "amqp://mq.internal:5672/%2f");
    }

    #[test]
    fn test_amqp_uri_passthrough() {
        let vars = env(&[("RABBITMQ_HOST", "amqps://user:pass@mq:5671/%2f")]);
        let settings = Settings::from_env_map(&vars).unwrap();
        assert_eq!(settings.amqp_uri(), "amqps://user:pass@mq:5671/%2f");
    }
}
