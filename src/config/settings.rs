//! TOML-based configuration for quarry.
//!
//! Supports a config file (quarry.toml) with environment variable expansion.
//!
//! Example configuration:
//! ```toml
//! dialect = "tsql"
//!
//! [mapping]
//! field_case = "insensitive"
//!
//! [paging]
//! require_order_by = true
//!
//! [types]
//! text = "ansi_string"
//! int = "int64"
//!
//! [properties]
//! "Customer.Code" = "string"
//!
//! [connection]
//! path = "${DATA_DIR}/app.db"
//! ```

use serde::de::IntoDeserializer;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use crate::filter::FieldCase;
use crate::repository::RepositoryOptions;
use crate::sql::dialect::Dialect;
use crate::types::{DbType, PropertyKey, TypeMapper};
use crate::value::ValueKind;

/// Error type for settings.
#[derive(Debug, thiserror::Error)]
pub enum SettingsError {
    #[error("Config file not found: {0}")]
    FileNotFound(PathBuf),

    #[error("Failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),

    #[error("Failed to parse config file: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

pub type SettingsResult<T> = Result<T, SettingsError>;

/// Root configuration structure.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct Settings {
    /// Dialect statements are compiled for.
    pub dialect: Dialect,

    pub mapping: MappingSettings,

    pub paging: PagingSettings,

    /// Type-level mappings: value kind → database type.
    pub types: BTreeMap<String, DbType>,

    /// Property-level mappings: `Entity.Property` → database type.
    pub properties: BTreeMap<String, DbType>,

    pub connection: ConnectionSettings,
}

/// Field name matching.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct MappingSettings {
    pub field_case: FieldCase,
}

/// Batch query policy.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct PagingSettings {
    /// Reject paging without ORDER BY on every dialect. T-SQL always
    /// requires it.
    pub require_order_by: bool,
}

impl Default for PagingSettings {
    fn default() -> Self {
        Self {
            require_order_by: true,
        }
    }
}

/// SQLite connection configuration.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct ConnectionSettings {
    /// Database file (supports ${ENV_VAR} expansion). Unset means in-memory.
    pub path: Option<String>,
}

impl ConnectionSettings {
    /// The database path with environment variables expanded.
    pub fn resolved_path(&self) -> SettingsResult<Option<PathBuf>> {
        self.path
            .as_deref()
            .map(|p| expand_env_vars(p).map(PathBuf::from))
            .transpose()
    }
}

impl Settings {
    /// Load settings from a TOML file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> SettingsResult<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(SettingsError::FileNotFound(path.to_path_buf()));
        }

        let content = fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> SettingsResult<Self> {
        Ok(toml::from_str(content)?)
    }

    /// Load settings from the default config file locations.
    ///
    /// Searches in order:
    /// 1. Environment variable `QUARRY_CONFIG`
    /// 2. `./quarry.toml`
    /// 3. `<config dir>/quarry/config.toml`
    pub fn load() -> SettingsResult<Self> {
        if let Ok(path) = env::var("QUARRY_CONFIG") {
            return Self::from_file(&path);
        }

        let local_config = PathBuf::from("quarry.toml");
        if local_config.exists() {
            return Self::from_file(&local_config);
        }

        if let Some(config_dir) = dirs::config_dir() {
            let user_config = config_dir.join("quarry").join("config.toml");
            if user_config.exists() {
                return Self::from_file(&user_config);
            }
        }

        Ok(Settings::default())
    }

    /// Build the mapping configuration store from `[types]` and
    /// `[properties]`.
    pub fn type_mapper(&self) -> SettingsResult<TypeMapper> {
        let mut mapper = TypeMapper::new();
        for (kind, db_type) in &self.types {
            let kind = ValueKind::deserialize(kind.as_str().into_deserializer()).map_err(
                |e: serde::de::value::Error| {
                    SettingsError::InvalidConfig(format!("[types] {}: {}", kind, e))
                },
            )?;
            mapper.map_kind(kind, *db_type);
        }
        for (property, db_type) in &self.properties {
            let key = PropertyKey::parse(property).ok_or_else(|| {
                SettingsError::InvalidConfig(format!(
                    "[properties] '{}' is not of the form Entity.Property",
                    property
                ))
            })?;
            mapper.map_property(key, *db_type);
        }
        Ok(mapper)
    }

    pub fn repository_options(&self) -> RepositoryOptions {
        RepositoryOptions {
            field_case: self.mapping.field_case,
            require_order_by: self.paging.require_order_by,
        }
    }
}

/// Expand environment variables in a string.
///
/// Supports `${VAR}` and `$VAR` syntax. A lone `$` is kept.
pub fn expand_env_vars(s: &str) -> SettingsResult<String> {
    let mut result = String::with_capacity(s.len());
    let mut chars = s.chars().peekable();

    while let Some(c) = chars.next() {
        if c != '$' {
            result.push(c);
            continue;
        }

        let var_name: String = if chars.peek() == Some(&'{') {
            chars.next();
            chars.by_ref().take_while(|&ch| ch != '}').collect()
        } else {
            let mut name = String::new();
            while let Some(&ch) = chars.peek() {
                if ch.is_alphanumeric() || ch == '_' {
                    name.push(ch);
                    chars.next();
                } else {
                    break;
                }
            }
            if name.is_empty() {
                result.push('$');
                continue;
            }
            name
        };

        let value =
            env::var(&var_name).map_err(|_| SettingsError::MissingEnvVar(var_name.clone()))?;
        result.push_str(&value);
    }

    Ok(result)
}
