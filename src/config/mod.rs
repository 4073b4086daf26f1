//! Configuration module for the purge job.
//!
//! The job is configured via a TOML file, with support for environment
//! variable interpolation using `${VAR_NAME}` syntax.
//!
//! # Example
//!
//! ```toml
//! [database]
//! type = "sqlite"
//! path = "/var/lib/shop/store.db"
//!
//! [purge]
//! owner_id = "7"
//!
//! [notification]
//! to = "ops@example.com"
//!
//! [notification.transport]
//! type = "smtp"
//! host = "smtp.example.com"
//! from = "purge@example.com"
//! password = "${SMTP_PASSWORD}"
//! username = "purge"
//! ```

mod database;
mod notification;
mod observability;
mod purge;

use std::{path::Path, sync::LazyLock};

pub use database::*;
pub use notification::*;
pub use observability::*;
pub use purge::*;
use regex::Regex;
use serde::{Deserialize, Serialize};

/// Root configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AppConfig {
    /// Record store holding products and attachments.
    pub database: DatabaseConfig,

    /// Batch deletion settings.
    pub purge: PurgeConfig,

    /// Delayed one-shot activation.
    #[serde(default)]
    pub trigger: TriggerConfig,

    /// Progress notifications.
    #[serde(default)]
    pub notification: NotificationConfig,

    /// Observability configuration (logging, metrics).
    #[serde(default)]
    pub observability: ObservabilityConfig,
}

impl AppConfig {
    /// Load configuration from a TOML file.
    ///
    /// Environment variables in the format `${VAR_NAME}` are expanded.
    /// Missing required variables will cause an error.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path.as_ref())
            .map_err(|e| ConfigError::Io(e, path.as_ref().to_path_buf()))?;

        Self::from_str(&contents)
    }

    /// Parse configuration from a TOML string.
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(contents: &str) -> Result<Self, ConfigError> {
        let expanded = expand_env_vars(contents)?;
        let config: AppConfig = toml::from_str(&expanded).map_err(ConfigError::Parse)?;
        config.validate()?;
        Ok(config)
    }

    /// Replace the configured owner, e.g. from a command-line override.
    pub fn with_owner_id(mut self, owner_id: impl Into<String>) -> Result<Self, ConfigError> {
        self.purge.owner_id = owner_id.into();
        self.purge.validate()?;
        Ok(self)
    }

    /// Validate the configuration for consistency and completeness.
    fn validate(&self) -> Result<(), ConfigError> {
        self.database.validate()?;
        self.purge.validate()?;
        self.notification.validate()?;
        self.observability.validate()?;
        Ok(())
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {1}: {0}")]
    Io(std::io::Error, std::path::PathBuf),

    #[error("Failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Environment variable not found: {0}")]
    EnvVarNotFound(String),

    #[error("Configuration validation error: {0}")]
    Validation(String),
}

static ENV_VAR_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\$\{([^}]+)\}").expect("env var pattern is valid"));

/// Expand environment variables in the format `${VAR_NAME}`.
/// Skips commented lines (lines where content before the variable is a comment).
fn expand_env_vars(input: &str) -> Result<String, ConfigError> {
    let mut result = String::with_capacity(input.len());

    for line in input.lines() {
        let comment_pos = line.find('#');

        let mut line_result = String::with_capacity(line.len());
        let mut last_end = 0;

        for cap in ENV_VAR_PATTERN.captures_iter(line) {
            let Some(whole) = cap.get(0) else {
                continue;
            };

            // Skip if this variable is inside a comment
            if let Some(pos) = comment_pos
                && whole.start() >= pos
            {
                continue;
            }

            line_result.push_str(&line[last_end..whole.start()]);

            let var_name = &cap[1];
            let value = std::env::var(var_name)
                .map_err(|_| ConfigError::EnvVarNotFound(var_name.to_string()))?;
            line_result.push_str(&value);

            last_end = whole.end();
        }

        line_result.push_str(&line[last_end..]);
        result.push_str(&line_result);
        result.push('\n');
    }

    // Remove trailing newline if input didn't have one
    if !input.ends_with('\n') && result.ends_with('\n') {
        result.pop();
    }

    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;

    const MINIMAL: &str = r#"
        [database]
        type = "sqlite"
        path = "store.db"

        [purge]
        owner_id = "7"
    "#;

    #[test]
    fn test_minimal_config() {
        let config = AppConfig::from_str(MINIMAL).unwrap();

        assert_eq!(config.purge.owner_id, "7");
        assert_eq!(config.trigger.delay_secs, 20);
        assert!(matches!(
            config.notification.transport,
            NotificationTransport::Log
        ));
    }

    #[test]
    fn test_example_config_parses() {
        let config =
            AppConfig::from_str(include_str!("../../merchant-purge.example.toml")).unwrap();
        assert_eq!(config.purge.batch_size, 10);
        assert_eq!(config.purge.batches_per_notification, 50);
        assert_eq!(config.notification.to, "ops@example.com");
    }

    #[test]
    fn test_missing_purge_section_fails() {
        let result = AppConfig::from_str(
            r#"
            [database]
            type = "sqlite"
            path = "store.db"
        "#,
        );
        assert!(matches!(result, Err(ConfigError::Parse(_))));
    }

    #[test]
    fn test_unknown_field_rejected() {
        let toml = format!("{}\nbogus = 1\n", MINIMAL);
        assert!(AppConfig::from_str(&toml).is_err());
    }

    #[test]
    fn test_validation_runs_on_load() {
        let result = AppConfig::from_str(
            r#"
            [database]
            type = "sqlite"
            path = "store.db"

            [purge]
            owner_id = "7"
            batch_size = 0
        "#,
        );
        assert!(matches!(result, Err(ConfigError::Validation(_))));
    }

    #[test]
    fn test_with_owner_id_override() {
        let config = AppConfig::from_str(MINIMAL).unwrap();
        let config = config.with_owner_id("99").unwrap();
        assert_eq!(config.purge.owner_id, "99");

        let config = AppConfig::from_str(MINIMAL).unwrap();
        assert!(config.with_owner_id("").is_err());
    }

    #[test]
    fn test_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("purge.toml");
        std::fs::write(&path, MINIMAL).unwrap();

        let config = AppConfig::from_file(&path).unwrap();
        assert_eq!(config.purge.owner_id, "7");

        let missing = AppConfig::from_file(dir.path().join("missing.toml"));
        assert!(matches!(missing, Err(ConfigError::Io(_, _))));
    }

    #[test]
    fn test_env_var_expansion() {
        temp_env::with_var("TEST_PURGE_OWNER", Some("merchant-9"), || {
            let result = expand_env_vars("owner_id = \"${TEST_PURGE_OWNER}\"").unwrap();
            assert_eq!(result, "owner_id = \"merchant-9\"");
        });
    }

    #[test]
    fn test_env_var_missing() {
        temp_env::with_var_unset("TEST_PURGE_UNSET", || {
            let result = expand_env_vars("password = \"${TEST_PURGE_UNSET}\"");
            assert!(matches!(result, Err(ConfigError::EnvVarNotFound(name)) if name == "TEST_PURGE_UNSET"));
        });
    }

    #[test]
    fn test_env_var_in_comment_ignored() {
        let result = expand_env_vars("# password = \"${NONEXISTENT_VAR}\"").unwrap();
        assert_eq!(result, "# password = \"${NONEXISTENT_VAR}\"");
    }

    #[test]
    fn test_env_var_after_comment_ignored() {
        let result = expand_env_vars("key = \"value\" # ${NONEXISTENT_VAR}").unwrap();
        assert_eq!(result, "key = \"value\" # ${NONEXISTENT_VAR}");
    }

    #[test]
    fn test_multiline_with_comments() {
        temp_env::with_var("TEST_PURGE_MULTI", Some("value1"), || {
            let input = r#"key1 = "${TEST_PURGE_MULTI}"
# key2 = "${NONEXISTENT}"
key3 = "literal""#;
            let result = expand_env_vars(input).unwrap();
            assert_eq!(
                result,
                r#"key1 = "value1"
# key2 = "${NONEXISTENT}"
key3 = "literal""#
            );
        });
    }

    #[test]
    fn test_config_with_env_password() {
        temp_env::with_var("TEST_PURGE_SMTP_PASSWORD", Some("hunter2"), || {
            let toml = format!(
                r#"{}
                [notification]
                to = "ops@example.com"

                [notification.transport]
                type = "smtp"
                host = "smtp.example.com"
                from = "purge@example.com"
                username = "purge"
                password = "${{TEST_PURGE_SMTP_PASSWORD}}"
                "#,
                MINIMAL
            );
            let config = AppConfig::from_str(&toml).unwrap();
            let NotificationTransport::Smtp(smtp) = config.notification.transport else {
                panic!("expected smtp transport");
            };
            assert_eq!(smtp.password.as_deref(), Some("hunter2"));
        });
    }
}
