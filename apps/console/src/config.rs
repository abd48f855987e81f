use std::{collections::HashMap, fs, time::Duration};

use client_core::{ClientConfig, SeriesMetric, DEFAULT_SERVICE_URL};

pub const SETTINGS_FILE: &str = "console.toml";

#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    pub api_url: String,
    pub api_key: String,
    pub poll_interval_ms: u64,
    pub history_window_secs: u64,
    pub request_timeout_ms: Option<u64>,
    pub log_filter: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_SERVICE_URL.into(),
            api_key: String::new(),
            poll_interval_ms: 1000,
            history_window_secs: 300,
            request_timeout_ms: None,
            log_filter: "info".into(),
        }
    }
}

impl Settings {
    pub fn into_client_config(self, metric: SeriesMetric) -> ClientConfig {
        ClientConfig {
            base_url: self.api_url,
            api_key: self.api_key,
            poll_interval: Duration::from_millis(self.poll_interval_ms.max(1)),
            history_window: Duration::from_secs(self.history_window_secs),
            request_timeout: self.request_timeout_ms.map(Duration::from_millis),
            metric,
        }
    }
}

pub fn load_settings() -> Settings {
    let mut settings = Settings::default();

    if let Ok(raw) = fs::read_to_string(SETTINGS_FILE) {
        apply_file(&mut settings, &raw);
    }
    apply_env(&mut settings, |key| std::env::var(key).ok());

    settings
}

fn apply_file(settings: &mut Settings, raw: &str) {
    let Ok(table) = toml::from_str::<HashMap<String, toml::Value>>(raw) else {
        return;
    };
    let file_cfg: HashMap<String, String> = table
        .into_iter()
        .filter_map(|(key, value)| match value {
            toml::Value::String(v) => Some((key, v)),
            toml::Value::Integer(v) => Some((key, v.to_string())),
            _ => None,
        })
        .collect();

    if let Some(v) = file_cfg.get("api_url") {
        settings.api_url = v.clone();
    }
    if let Some(v) = file_cfg.get("api_key") {
        settings.api_key = v.clone();
    }
    if let Some(v) = file_cfg.get("poll_interval_ms").and_then(|v| v.parse().ok()) {
        settings.poll_interval_ms = v;
    }
    if let Some(v) = file_cfg.get("history_window_secs").and_then(|v| v.parse().ok()) {
        settings.history_window_secs = v;
    }
    if let Some(v) = file_cfg.get("request_timeout_ms").and_then(|v| v.parse().ok()) {
        settings.request_timeout_ms = Some(v);
    }
    if let Some(v) = file_cfg.get("log_filter") {
        settings.log_filter = v.clone();
    }
}

fn apply_env(settings: &mut Settings, var: impl Fn(&str) -> Option<String>) {
    if let Some(v) = var("REACTOR_API_URL") {
        settings.api_url = v;
    }
    if let Some(v) = var("APP__API_URL") {
        settings.api_url = v;
    }

    if let Some(v) = var("REACTOR_API_KEY") {
        settings.api_key = v;
    }
    if let Some(v) = var("APP__API_KEY") {
        settings.api_key = v;
    }

    if let Some(parsed) = var("APP__POLL_INTERVAL_MS").and_then(|v| v.parse().ok()) {
        settings.poll_interval_ms = parsed;
    }
    if let Some(parsed) = var("APP__HISTORY_WINDOW_SECS").and_then(|v| v.parse().ok()) {
        settings.history_window_secs = parsed;
    }
    if let Some(parsed) = var("APP__REQUEST_TIMEOUT_MS").and_then(|v| v.parse().ok()) {
        settings.request_timeout_ms = Some(parsed);
    }

    if let Some(v) = var("APP__LOG_FILTER") {
        settings.log_filter = v;
    }
}
