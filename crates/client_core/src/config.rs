use std::{fs, path::Path};

use anyhow::Context;
use serde::Deserialize;
use shared::protocol::GENERATE_EXCUSE_PATH;

pub const DEFAULT_SETTINGS_FILE: &str = "excuse.toml";

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ClientSettings {
    pub server_url: String,
    pub endpoint_path: String,
    pub log_filter: String,
}

impl Default for ClientSettings {
    fn default() -> Self {
        Self {
            server_url: "http://127.0.0.1:3000".into(),
            endpoint_path: GENERATE_EXCUSE_PATH.into(),
            log_filter: "warn".into(),
        }
    }
}

/// Defaults, then the settings file, then environment overrides.
///
/// An explicit `path` must exist; the default `excuse.toml` is optional.
pub fn load_settings(path: Option<&Path>) -> anyhow::Result<ClientSettings> {
    load_settings_with(path, |key| std::env::var(key).ok())
}

fn load_settings_with(
    path: Option<&Path>,
    lookup: impl Fn(&str) -> Option<String>,
) -> anyhow::Result<ClientSettings> {
    let mut settings = match path {
        Some(path) => {
            let raw = fs::read_to_string(path)
                .with_context(|| format!("failed to read settings file '{}'", path.display()))?;
            parse_settings(&raw)
                .with_context(|| format!("invalid settings file '{}'", path.display()))?
        }
        None => match fs::read_to_string(DEFAULT_SETTINGS_FILE) {
            Ok(raw) => parse_settings(&raw)
                .with_context(|| format!("invalid settings file '{DEFAULT_SETTINGS_FILE}'"))?,
            Err(_) => ClientSettings::default(),
        },
    };

    apply_env_overrides(&mut settings, lookup);
    Ok(settings)
}

pub fn parse_settings(raw: &str) -> anyhow::Result<ClientSettings> {
    Ok(toml::from_str(raw)?)
}

fn apply_env_overrides(settings: &mut ClientSettings, lookup: impl Fn(&str) -> Option<String>) {
    if let Some(v) = lookup("EXCUSE_SERVER_URL") {
        settings.server_url = v;
    }
    if let Some(v) = lookup("APP__SERVER_URL") {
        settings.server_url = v;
    }

    if let Some(v) = lookup("APP__ENDPOINT_PATH") {
        settings.endpoint_path = v;
    }

    if let Some(v) = lookup("APP__LOG_FILTER") {
        settings.log_filter = v;
    }
}

#[cfg(test)]
#[path = "tests/config_tests.rs"]
mod tests;
