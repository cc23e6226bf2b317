//! Environment-driven configuration for the migrator binary.

use std::path::PathBuf;
use std::time::Duration;

use teanote_db::{validate_database_url, validate_schema_name, Error, PoolConfig, Result};

pub const DEFAULT_MAX_CONNECTIONS: u32 = 2;
pub const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_LOG_FILTER: &str = "teanote_migrate=info,teanote_db=info";

/// Output format for log lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Text,
    Json,
}

/// Logging settings, read before anything else so startup errors are logged.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogConfig {
    pub format: LogFormat,
    pub file: Option<PathBuf>,
    pub ansi: Option<bool>,
}

impl LogConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary key lookup. Unrecognized values fall back to
    /// defaults instead of failing: logging must always come up.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let format = match lookup("LOG_FORMAT").as_deref() {
            Some("json") => LogFormat::Json,
            _ => LogFormat::Text,
        };
        Self {
            format,
            file: lookup("LOG_FILE")
                .filter(|p| !p.is_empty())
                .map(PathBuf::from),
            ansi: lookup("LOG_ANSI").map(|v| v == "true" || v == "1"),
        }
    }
}

/// Database settings for one migrator run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MigrateConfig {
    pub database_url: String,
    pub max_connections: u32,
    pub connect_timeout: Duration,
    pub schema: Option<String>,
}

impl MigrateConfig {
    /// Read from the process environment. `database_url` overrides `DATABASE_URL`.
    pub fn from_env(database_url: Option<String>) -> Result<Self> {
        Self::from_lookup(database_url, |key| std::env::var(key).ok())
    }

    pub fn from_lookup(
        database_url: Option<String>,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<Self> {
        let database_url = database_url
            .or_else(|| lookup("DATABASE_URL"))
            .ok_or_else(|| Error::Config("DATABASE_URL is not set".to_string()))?;
        validate_database_url(&database_url)?;

        let max_connections = parse_or(&lookup, "DB_MAX_CONNECTIONS", DEFAULT_MAX_CONNECTIONS)?;
        if max_connections == 0 {
            return Err(Error::Config(
                "DB_MAX_CONNECTIONS must be at least 1".to_string(),
            ));
        }
        let timeout_secs = parse_or(
            &lookup,
            "DB_CONNECT_TIMEOUT_SECS",
            DEFAULT_CONNECT_TIMEOUT_SECS,
        )?;

        let schema = lookup("DB_SCHEMA").filter(|s| !s.is_empty());
        if let Some(schema) = &schema {
            validate_schema_name(schema)?;
        }

        Ok(Self {
            database_url,
            max_connections,
            connect_timeout: Duration::from_secs(timeout_secs),
            schema,
        })
    }

    pub fn pool_config(&self) -> PoolConfig {
        let config = PoolConfig::new()
            .max_connections(self.max_connections)
            .min_connections(0)
            .connect_timeout(self.connect_timeout);
        match &self.schema {
            Some(schema) => config.search_path(schema.clone()),
            None => config,
        }
    }
}

fn parse_or<T: std::str::FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
    default: T,
) -> Result<T> {
    match lookup(key) {
        None => Ok(default),
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|_| Error::Config(format!("{} is not a valid number: {:?}", key, raw))),
    }
}

/// Hide the password part of a connection string for logging.
pub fn redact_url(url: &str) -> String {
    let Some((scheme, rest)) = url.split_once("://") else {
        return url.to_string();
    };
    match rest.rsplit_once('@') {
        Some((credentials, host)) => {
            let user = credentials.split(':').next().unwrap_or_default();
            format!("{}://{}:***@{}", scheme, user, host)
        }
        None => url.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config =
            MigrateConfig::from_lookup(None, env(&[("DATABASE_URL", "postgres://localhost/tea")]))
                .unwrap();
        assert_eq!(config.max_connections, DEFAULT_MAX_CONNECTIONS);
        assert_eq!(config.connect_timeout, Duration::from_secs(30));
        assert!(config.schema.is_none());
        assert!(config.pool_config().search_path.is_none());
    }

    #[test]
    fn test_flag_overrides_env() {
        let config = MigrateConfig::from_lookup(
            Some("postgresql://cli/tea".to_string()),
            env(&[("DATABASE_URL", "postgres://env/tea")]),
        )
        .unwrap();
        assert_eq!(config.database_url, "postgresql://cli/tea");
    }

    #[test]
    fn test_missing_or_invalid_url() {
        assert!(matches!(
            MigrateConfig::from_lookup(None, env(&[])),
            Err(Error::Config(_))
        ));
        assert!(matches!(
            MigrateConfig::from_lookup(None, env(&[("DATABASE_URL", "mysql://localhost/tea")])),
            Err(Error::Config(_))
        ));
    }

    #[test]
    fn test_numeric_and_schema_settings() {
        let config = MigrateConfig::from_lookup(
            None,
            env(&[
                ("DATABASE_URL", "postgres://localhost/tea"),
                ("DB_MAX_CONNECTIONS", "4"),
                ("DB_CONNECT_TIMEOUT_SECS", " 5 "),
                ("DB_SCHEMA", "tea_archive"),
            ]),
        )
        .unwrap();
        assert_eq!(config.max_connections, 4);
        assert_eq!(config.connect_timeout, Duration::from_secs(5));
        assert_eq!(
            config.pool_config().search_path.as_deref(),
            Some("tea_archive")
        );

        for (key, value) in [
            ("DB_MAX_CONNECTIONS", "lots"),
            ("DB_MAX_CONNECTIONS", "0"),
            ("DB_SCHEMA", "bad;schema"),
        ] {
            let result = MigrateConfig::from_lookup(
                None,
                env(&[("DATABASE_URL", "postgres://localhost/tea"), (key, value)]),
            );
            assert!(matches!(result, Err(Error::Config(_))), "{}={}", key, value);
        }
    }

    #[test]
    fn test_log_config() {
        let log = LogConfig::from_lookup(env(&[]));
        assert_eq!(log.format, LogFormat::Text);
        assert!(log.file.is_none());
        assert!(log.ansi.is_none());

        let log = LogConfig::from_lookup(env(&[
            ("LOG_FORMAT", "json"),
            ("LOG_FILE", "/var/log/teanote/migrate.log"),
            ("LOG_ANSI", "false"),
        ]));
        assert_eq!(log.format, LogFormat::Json);
        assert_eq!(
            log.file.as_deref(),
            Some(std::path::Path::new("/var/log/teanote/migrate.log"))
        );
        assert_eq!(log.ansi, Some(false));
    }

    #[test]
    fn test_redact_url() {
        assert_eq!(
            redact_url("postgres://tea:secret@db:5432/notes"),
            "postgres://tea:***@db:5432/notes"
        );
        assert_eq!(redact_url("postgres://db/notes"), "postgres://db/notes");
    }
}
