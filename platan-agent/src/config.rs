//! Load agent config from file and environment.

use serde::Deserialize;
use std::path::PathBuf;

/// Agent configuration. File: ~/.config/platan/config.toml or
/// /etc/platan/config.toml.
/// Env overrides: PLATAN_DEVICE_ID, PLATAN_DEVICE_KEY, PLATAN_UPLOAD_URL,
/// PLATAN_DOWNLOAD_URL.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// Stable device identifier, provisioned out-of-band.
    pub device_id: Option<String>,
    /// Shared device key, hex-encoded. Never transmitted.
    pub device_key: Option<String>,
    /// Endpoint for join/challenge/data commands.
    pub upload_url: Option<String>,
    /// Endpoint for check/down commands.
    pub download_url: Option<String>,
}

/// Load config: merge config file (if present), then env vars.
pub fn load() -> Config {
    let mut c = load_file().unwrap_or_default();
    if let Ok(s) = std::env::var("PLATAN_DEVICE_ID") {
        c.device_id = Some(s);
    }
    if let Ok(s) = std::env::var("PLATAN_DEVICE_KEY") {
        c.device_key = Some(s);
    }
    if let Ok(s) = std::env::var("PLATAN_UPLOAD_URL") {
        c.upload_url = Some(s);
    }
    if let Ok(s) = std::env::var("PLATAN_DOWNLOAD_URL") {
        c.download_url = Some(s);
    }
    c
}

fn config_paths() -> Vec<PathBuf> {
    let home = std::env::var_os("HOME").map(PathBuf::from);
    let mut out = Vec::new();
    if let Some(h) = home {
        out.push(h.join(".config/platan/config.toml"));
    }
    out.push(PathBuf::from("/etc/platan/config.toml"));
    out
}

fn load_file() -> Option<Config> {
    for p in config_paths() {
        if p.exists() {
            if let Ok(s) = std::fs::read_to_string(&p) {
                if let Ok(c) = toml::from_str::<Config>(&s) {
                    return Some(c);
                }
            }
            break;
        }
    }
    None
}
