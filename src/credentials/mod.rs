// dbpull/src/credentials/mod.rs
pub(crate) mod connection_string;
pub(crate) mod template;

use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::path::Path;

use serde_yaml::Value;

use crate::errors::{AppError, Result};

/// The settings found under one environment key of a `database.yml`-style
/// document, as plain text. Completeness is decided by the caller.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DbSection {
    source_name: String,
    fields: BTreeMap<String, String>,
}

impl DbSection {
    pub fn new(source_name: impl Into<String>) -> Self {
        Self {
            source_name: source_name.into(),
            fields: BTreeMap::new(),
        }
    }

    /// Returns a field only when it is present and non-blank.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.fields
            .get(key)
            .map(String::as_str)
            .filter(|value| !value.trim().is_empty())
    }

    /// Whether the key was written at all, even with a null or blank value.
    pub fn has(&self, key: &str) -> bool {
        self.fields.contains_key(key)
    }

    pub fn set(&mut self, key: &str, value: impl Into<String>) {
        self.fields.insert(key.to_string(), value.into());
    }

    pub fn with(mut self, key: &str, value: impl Into<String>) -> Self {
        self.set(key, value);
        self
    }

    /// Where these settings came from, for error messages.
    pub fn source_name(&self) -> &str {
        &self.source_name
    }

    fn require(&self, field: &str, hint: &str) -> Result<&str> {
        self.get(field).ok_or_else(|| AppError::MissingField {
            field: field.to_string(),
            source_name: self.source_name.clone(),
            hint: hint.to_string(),
        })
    }
}

/// Database engines the tool knows how to recreate, dump and restore.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Adapter {
    Mysql,
    Postgresql,
}

impl Adapter {
    pub fn resolve(name: &str) -> Result<Self> {
        match name.trim() {
            "mysql" | "mysql2" => Ok(Adapter::Mysql),
            "postgresql" => Ok(Adapter::Postgresql),
            other => Err(AppError::UnsupportedAdapter {
                adapter: other.to_string(),
            }),
        }
    }
}

impl fmt::Display for Adapter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Adapter::Mysql => f.write_str("mysql"),
            Adapter::Postgresql => f.write_str("postgresql"),
        }
    }
}

/// Fully resolved connection settings for one database.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdapterSettings {
    pub adapter: Adapter,
    pub host: String,
    pub port: Option<u16>,
    pub username: String,
    pub password: Option<String>,
    pub database: String,
}

impl AdapterSettings {
    /// Validates a raw section. A missing `adapter` is reported separately
    /// from an adapter that is present but unsupported.
    pub fn from_section(section: &DbSection) -> Result<Self> {
        let adapter = Adapter::resolve(section.require("adapter", " (mysql2 or postgresql)")?)?;
        let host = section.require("host", " (e.g. localhost)")?.trim().to_string();
        let username = section.require("username", "")?.trim().to_string();
        let database = section.require("database", "")?.trim().to_string();
        let port = match section.get("port") {
            Some(raw) => Some(raw.trim().parse::<u16>().map_err(|_| {
                AppError::Config(format!(
                    "`port` in {} must be a number between 1 and 65535, got '{}'",
                    section.source_name(),
                    raw
                ))
            })?),
            None => None,
        };

        Ok(AdapterSettings {
            adapter,
            host,
            port,
            username,
            password: section.get("password").map(str::to_string),
            database,
        })
    }
}

/// Parses a `database.yml`-style document and returns the settings stored
/// under `environment`. Other environments are discarded.
pub fn parse_document(text: &str, environment: &str, source_name: &str) -> Result<DbSection> {
    let mut document: Value = if text.trim().is_empty() {
        Value::Null
    } else {
        serde_yaml::from_str(text).map_err(|source| AppError::Parse {
            source_name: source_name.to_string(),
            source,
        })?
    };
    document.apply_merge().map_err(|source| AppError::Parse {
        source_name: source_name.to_string(),
        source,
    })?;

    let missing = || AppError::MissingEnvironment {
        environment: environment.to_string(),
        source_name: source_name.to_string(),
    };

    let settings = match document.get(environment) {
        Some(Value::Mapping(map)) if !map.is_empty() => map,
        _ => return Err(missing()),
    };

    let mut section = DbSection::new(source_name);
    for (key, value) in settings {
        let Some(key) = key.as_str() else { continue };
        if let Some(text) = scalar_text(value) {
            section.set(key, text);
        }
    }

    if section.fields.is_empty() {
        return Err(missing());
    }
    Ok(section)
}

/// Nulls are kept as empty text so the key still counts as present.
fn scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::Null => Some(String::new()),
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

/// Loads the `development` settings from the local `database.yml`.
///
/// `username` and `host` are required here because the recreate and restore
/// commands cannot run without them.
pub fn load_local_db_config(path: &Path) -> Result<DbSection> {
    if !path.exists() {
        return Err(AppError::MissingFile {
            path: path.to_path_buf(),
        });
    }

    let text = fs::read_to_string(path)?;
    let section = parse_document(&text, LOCAL_ENVIRONMENT, &path.display().to_string())?;

    section.require("username", "")?;
    section.require("host", " (e.g. localhost)")?;

    Ok(section)
}

pub const LOCAL_ENVIRONMENT: &str = "development";
