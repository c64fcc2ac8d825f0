// dbpull/src/config/mod.rs
use anyhow::{Context, Result};
use serde::Deserialize;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

pub const DEFAULT_CONFIG_FILE: &str = "dbpull.json";
pub const DEFAULT_LOCAL_DATABASE_CONFIG: &str = "config/database.yml";
pub const DEFAULT_REMOTE_DATABASE_CONFIG: &str = "shared/config/database.yml";
pub const DEFAULT_SECRETS_FILE: &str = ".rbenv-vars";
pub const DEFAULT_CONNECTION_STRING_KEY: &str = "DATABASE_URL";
pub const DEFAULT_RESTORE_ROLE: &str = "deploy";
pub const DEFAULT_MIGRATE_COMMAND: &str = "bundle exec rake db:migrate";

// Structs for deserializing dbpull.json
#[derive(Debug, Clone, Deserialize)]
pub struct JsonEnvironment {
    pub host: Option<String>,
    pub user: Option<String>,
    pub path: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RawJsonConfig {
    pub environments: HashMap<String, JsonEnvironment>,
    pub local_database_config: Option<PathBuf>,
    pub remote_database_config: Option<String>,
    pub secrets_file: Option<String>,
    pub connection_string_key: Option<String>,
    pub restore_role: Option<String>,
    pub migrate_command: Option<String>,
}

/// Identifies the server an environment is deployed to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApplicationProfile {
    pub user: String,
    pub host: String,
    pub remote_path: String,
    pub environment: String,
}

impl ApplicationProfile {
    /// `user@host`, as handed to ssh.
    pub fn ssh_target(&self) -> String {
        format!("{}@{}", self.user, self.host)
    }

    /// Joins a path relative to the application directory on the server.
    pub fn remote_file(&self, relative: &str) -> String {
        format!(
            "{}/{}",
            self.remote_path.trim_end_matches('/'),
            relative.trim_start_matches('/')
        )
    }
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub local_database_config: PathBuf,
    pub remote_database_config: String,
    pub secrets_file: String,
    pub connection_string_key: String,
    pub restore_role: String,
    pub migrate_command: String,
    pub raw_json_config: RawJsonConfig,
}

impl AppConfig {
    pub fn load_from_json(config_path: &Path) -> Result<Self> {
        let config_content = fs::read_to_string(config_path)
            .with_context(|| format!("Failed to read config file at {}", config_path.display()))?;
        Self::from_json_str(&config_content).with_context(|| {
            format!(
                "Failed to load configuration from {}",
                config_path.display()
            )
        })
    }

    pub fn from_json_str(config_content: &str) -> Result<Self> {
        let raw_json_config: RawJsonConfig =
            serde_json::from_str(config_content).context("Failed to parse JSON configuration")?;

        let connection_string_key = non_empty(&raw_json_config.connection_string_key)
            .unwrap_or(DEFAULT_CONNECTION_STRING_KEY)
            .to_string();
        if !is_identifier(&connection_string_key) {
            anyhow::bail!(
                "connection_string_key must be a plain variable name (letters, digits, underscores), got '{}'",
                connection_string_key
            );
        }

        Ok(AppConfig {
            local_database_config: raw_json_config
                .local_database_config
                .clone()
                .filter(|p| !p.as_os_str().is_empty())
                .unwrap_or_else(|| PathBuf::from(DEFAULT_LOCAL_DATABASE_CONFIG)),
            remote_database_config: non_empty(&raw_json_config.remote_database_config)
                .unwrap_or(DEFAULT_REMOTE_DATABASE_CONFIG)
                .to_string(),
            secrets_file: non_empty(&raw_json_config.secrets_file)
                .unwrap_or(DEFAULT_SECRETS_FILE)
                .to_string(),
            connection_string_key,
            restore_role: non_empty(&raw_json_config.restore_role)
                .unwrap_or(DEFAULT_RESTORE_ROLE)
                .to_string(),
            migrate_command: non_empty(&raw_json_config.migrate_command)
                .unwrap_or(DEFAULT_MIGRATE_COMMAND)
                .to_string(),
            raw_json_config,
        })
    }

    /// Resolves the server profile for one deployment environment.
    pub fn load_profile(&self, environment: &str) -> Result<ApplicationProfile> {
        let env_config = self
            .raw_json_config
            .environments
            .get(environment)
            .with_context(|| {
                let mut known: Vec<&str> = self
                    .raw_json_config
                    .environments
                    .keys()
                    .map(String::as_str)
                    .collect();
                known.sort_unstable();
                format!(
                    "Environment '{}' is not configured. Known environments: {:?}",
                    environment, known
                )
            })?;

        let host = non_empty(&env_config.host)
            .with_context(|| format!("host must be set for environment '{}'", environment))?;
        let user = non_empty(&env_config.user)
            .with_context(|| format!("user must be set for environment '{}'", environment))?;
        let path = non_empty(&env_config.path)
            .with_context(|| format!("path must be set for environment '{}'", environment))?;

        Ok(ApplicationProfile {
            user: user.to_string(),
            host: host.to_string(),
            remote_path: path.to_string(),
            environment: environment.to_string(),
        })
    }
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|s| !s.is_empty())
}

fn is_identifier(value: &str) -> bool {
    let mut chars = value.chars();
    matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

#[cfg(test)]
mod tests {
    use super::*;

    const MINIMAL: &str = r#"{
        "environments": {
            "production": { "host": "app.example.com", "user": "deploy", "path": "/home/deploy/app/" },
            "staging": { "host": "staging.example.com", "user": "deploy" }
        }
    }"#;

    #[test]
    fn test_defaults_applied() -> anyhow::Result<()> {
        let config = AppConfig::from_json_str(MINIMAL)?;
        assert_eq!(config.local_database_config, PathBuf::from("config/database.yml"));
        assert_eq!(config.remote_database_config, "shared/config/database.yml");
        assert_eq!(config.secrets_file, ".rbenv-vars");
        assert_eq!(config.connection_string_key, "DATABASE_URL");
        assert_eq!(config.restore_role, "deploy");
        assert_eq!(config.migrate_command, "bundle exec rake db:migrate");
        Ok(())
    }

    #[test]
    fn test_overrides_applied() -> anyhow::Result<()> {
        let config = AppConfig::from_json_str(
            r#"{
                "environments": {},
                "local_database_config": "db/config.yml",
                "secrets_file": ".env",
                "connection_string_key": "PRIMARY_DB_URL",
                "restore_role": "app",
                "migrate_command": "bin/rails db:migrate"
            }"#,
        )?;
        assert_eq!(config.local_database_config, PathBuf::from("db/config.yml"));
        assert_eq!(config.secrets_file, ".env");
        assert_eq!(config.connection_string_key, "PRIMARY_DB_URL");
        assert_eq!(config.restore_role, "app");
        assert_eq!(config.migrate_command, "bin/rails db:migrate");
        Ok(())
    }

    #[test]
    fn test_rejects_unsafe_connection_string_key() {
        let result = AppConfig::from_json_str(
            r#"{ "environments": {}, "connection_string_key": "URL'; rm -rf ~" }"#,
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_load_profile() -> anyhow::Result<()> {
        let config = AppConfig::from_json_str(MINIMAL)?;
        let profile = config.load_profile("production")?;
        assert_eq!(profile.ssh_target(), "deploy@app.example.com");
        assert_eq!(profile.environment, "production");
        assert_eq!(
            profile.remote_file("shared/config/database.yml"),
            "/home/deploy/app/shared/config/database.yml"
        );
        Ok(())
    }

    #[test]
    fn test_load_profile_errors() -> anyhow::Result<()> {
        let config = AppConfig::from_json_str(MINIMAL)?;

        let err = config.load_profile("qa").unwrap_err();
        assert!(err.to_string().contains("'qa' is not configured"));

        let err = config.load_profile("staging").unwrap_err();
        assert_eq!(err.to_string(), "path must be set for environment 'staging'");
        Ok(())
    }

    #[test]
    fn test_load_from_json_missing_file() {
        let result = AppConfig::load_from_json(Path::new("/nonexistent/dbpull.json"));
        assert!(result.is_err());
    }
}
