use std::{collections::HashMap, fs, path::Path};

use serde::Deserialize;

pub const SETTINGS_FILE: &str = "catalog.toml";

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Settings {
    pub endpoint: String,
    pub api_token: Option<String>,
    pub base_url: String,
    pub log_level: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            endpoint: "http://127.0.0.1:4000/graphql".into(),
            api_token: None,
            base_url: "http://localhost/catalog".into(),
            log_level: "info".into(),
        }
    }
}

/// Defaults, then `catalog.toml` in the working directory, then the environment.
pub fn load_settings() -> Settings {
    let mut settings = Settings::default();
    apply_file(&mut settings, Path::new(SETTINGS_FILE));
    apply_env(&mut settings, |key| std::env::var(key).ok());
    settings
}

pub(crate) fn apply_file(settings: &mut Settings, path: &Path) {
    if let Ok(raw) = fs::read_to_string(path) {
        apply_toml(settings, &raw);
    }
}

pub(crate) fn apply_toml(settings: &mut Settings, raw: &str) {
    let Ok(file_cfg) = toml::from_str::<HashMap<String, String>>(raw) else {
        tracing::warn!("config: ignoring unreadable {SETTINGS_FILE}");
        return;
    };

    if let Some(v) = file_cfg.get("endpoint") {
        settings.endpoint = v.clone();
    }
    if let Some(v) = file_cfg.get("api_token") {
        settings.api_token = Some(v.clone());
    }
    if let Some(v) = file_cfg.get("base_url") {
        settings.base_url = v.clone();
    }
    if let Some(v) = file_cfg.get("log_level") {
        settings.log_level = v.clone();
    }
}

pub(crate) fn apply_env(settings: &mut Settings, lookup: impl Fn(&str) -> Option<String>) {
    if let Some(v) = lookup("CATALOG_ENDPOINT") {
        settings.endpoint = v;
    }
    if let Some(v) = lookup("APP__ENDPOINT") {
        settings.endpoint = v;
    }

    if let Some(v) = lookup("CATALOG_API_TOKEN") {
        settings.api_token = Some(v);
    }
    if let Some(v) = lookup("APP__API_TOKEN") {
        settings.api_token = Some(v);
    }

    if let Some(v) = lookup("CATALOG_BASE_URL") {
        settings.base_url = v;
    }
    if let Some(v) = lookup("APP__BASE_URL") {
        settings.base_url = v;
    }

    if let Some(v) = lookup("APP__LOG_LEVEL") {
        settings.log_level = v;
    }
}

#[cfg(test)]
#[path = "tests/config_tests.rs"]
mod tests;
