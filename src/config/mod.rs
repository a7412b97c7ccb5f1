//! Configuration module for quarry.
//!
//! Handles the quarry.toml file, environment variable expansion and the
//! mapping configuration it declares.

mod settings;

pub use settings::{
    expand_env_vars, ConnectionSettings, MappingSettings, PagingSettings, Settings, SettingsError,
    SettingsResult,
};
