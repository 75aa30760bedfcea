use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};

use crate::core::Role;

const REDACTED: &str = "********";

#[derive(Debug, Clone, Serialize)]
pub struct EffectiveConfig {
    pub api: ApiConfig,
    pub ui: UiConfig,
    pub session: SessionConfig,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub config_path: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ApiConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct UiConfig {
    pub color: bool,
    pub max_table_rows: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct SessionConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    pub role: Role,
}

impl Default for EffectiveConfig {
    fn default() -> Self {
        Self {
            api: ApiConfig {
                endpoint: None,
                api_key: None,
                timeout_secs: 30,
            },
            ui: UiConfig {
                color: true,
                max_table_rows: 20,
            },
            session: SessionConfig {
                username: None,
                role: Role::Client,
            },
            config_path: None,
        }
    }
}

impl EffectiveConfig {
    /// Copy safe to print: the API key is masked.
    pub fn redacted(&self) -> Self {
        let mut cfg = self.clone();
        if cfg.api.api_key.is_some() {
            cfg.api.api_key = Some(REDACTED.to_string());
        }
        cfg
    }
}

#[derive(Debug, Deserialize)]
struct RawConfig {
    api: Option<RawApiConfig>,
    ui: Option<RawUiConfig>,
    session: Option<RawSessionConfig>,
}

#[derive(Debug, Deserialize)]
struct RawApiConfig {
    endpoint: Option<String>,
    api_key: Option<String>,
    timeout_secs: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct RawUiConfig {
    color: Option<bool>,
    max_table_rows: Option<usize>,
}

#[derive(Debug, Deserialize)]
struct RawSessionConfig {
    username: Option<String>,
    role: Option<Role>,
}

pub fn home_dir() -> Result<PathBuf> {
    std::env::var_os("HOME")
        .filter(|h| !h.is_empty())
        .map(PathBuf::from)
        .ok_or_else(|| anyhow!("HOME is not set"))
}

pub fn default_config_path(home_dir: &Path) -> PathBuf {
    home_dir.join(".config/soarcery/config.toml")
}

pub fn load(config_path: Option<&Path>, home_dir: &Path) -> Result<EffectiveConfig> {
    let mut cfg = EffectiveConfig::default();

    let explicit = config_path.is_some();
    let path = config_path
        .map(ToOwned::to_owned)
        .unwrap_or_else(|| default_config_path(home_dir));

    if path.exists() {
        let s = std::fs::read_to_string(&path)
            .with_context(|| format!("failed to read config file: {}", path.display()))?;
        let raw: RawConfig = toml::from_str(&s)
            .with_context(|| format!("failed to parse config file (TOML): {}", path.display()))?;
        apply_raw_config(&mut cfg, raw);
        cfg.config_path = Some(path.display().to_string());
    } else if explicit {
        return Err(anyhow!("config file not found: {}", path.display()));
    }

    apply_env_overrides(&mut cfg)?;

    Ok(cfg)
}

fn apply_raw_config(cfg: &mut EffectiveConfig, raw: RawConfig) {
    if let Some(api) = raw.api {
        if let Some(endpoint) = non_blank(api.endpoint) {
            cfg.api.endpoint = Some(endpoint);
        }
        if let Some(api_key) = non_blank(api.api_key) {
            cfg.api.api_key = Some(api_key);
        }
        if let Some(timeout_secs) = api.timeout_secs {
            cfg.api.timeout_secs = timeout_secs;
        }
    }

    if let Some(ui) = raw.ui {
        if let Some(color) = ui.color {
            cfg.ui.color = color;
        }
        if let Some(max_table_rows) = ui.max_table_rows {
            cfg.ui.max_table_rows = max_table_rows;
        }
    }

    if let Some(session) = raw.session {
        if let Some(username) = non_blank(session.username) {
            cfg.session.username = Some(username);
        }
        if let Some(role) = session.role {
            cfg.session.role = role;
        }
    }
}

fn apply_env_overrides(cfg: &mut EffectiveConfig) -> Result<()> {
    if let Some(v) = env_non_blank("SOARCERY_API_ENDPOINT") {
        cfg.api.endpoint = Some(v);
    }
    if let Some(v) = env_non_blank("SOARCERY_API_KEY") {
        cfg.api.api_key = Some(v);
    }
    if let Ok(v) = std::env::var("SOARCERY_API_TIMEOUT_SECS") {
        cfg.api.timeout_secs = v
            .trim()
            .parse::<u64>()
            .with_context(|| "SOARCERY_API_TIMEOUT_SECS")?;
    }
    if let Ok(v) = std::env::var("SOARCERY_UI_COLOR") {
        cfg.ui.color = parse_bool(&v).with_context(|| "SOARCERY_UI_COLOR")?;
    }
    if let Ok(v) = std::env::var("SOARCERY_UI_MAX_TABLE_ROWS") {
        cfg.ui.max_table_rows = v
            .trim()
            .parse::<usize>()
            .with_context(|| "SOARCERY_UI_MAX_TABLE_ROWS")?;
    }
    if let Some(v) = env_non_blank("SOARCERY_USER") {
        cfg.session.username = Some(v);
    }
    if let Ok(v) = std::env::var("SOARCERY_ROLE") {
        cfg.session.role = v
            .parse::<Role>()
            .map_err(anyhow::Error::msg)
            .with_context(|| "SOARCERY_ROLE")?;
    }

    Ok(())
}

fn env_non_blank(name: &str) -> Option<String> {
    non_blank(std::env::var(name).ok())
}

fn non_blank(v: Option<String>) -> Option<String> {
    v.map(|s| s.trim().to_string()).filter(|s| !s.is_empty())
}

fn parse_bool(s: &str) -> Result<bool> {
    let s = s.trim().to_ascii_lowercase();
    match s.as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(anyhow!(
            "invalid boolean: {s} (expected true|false|1|0|yes|no|on|off)"
        )),
    }
}
