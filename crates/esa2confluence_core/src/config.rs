use std::env;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

pub const DEFAULT_CONFIG_FILENAME: &str = "esa2confluence.toml";
pub const DEFAULT_USER_AGENT: &str = "esa2confluence/0.1";
pub const DEFAULT_ESA_API_URL: &str = "https://api.esa.io";

#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq, Eq)]
pub struct FileConfig {
    #[serde(default)]
    pub confluence: ConfluenceSection,
    #[serde(default)]
    pub esa: EsaSection,
}

#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq, Eq)]
pub struct ConfluenceSection {
    pub host: Option<String>,
    pub user: Option<String>,
    pub space_id: Option<String>,
    pub user_agent: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq, Eq)]
pub struct EsaSection {
    pub team: Option<String>,
    pub api_url: Option<String>,
    pub user_agent: Option<String>,
}

/// Load and parse a FileConfig from a TOML file. Returns default if file doesn't exist.
pub fn load_config(config_path: &Path) -> Result<FileConfig> {
    if !config_path.exists() {
        return Ok(FileConfig::default());
    }
    let content = fs::read_to_string(config_path)
        .with_context(|| format!("failed to read {}", config_path.display()))?;
    let parsed: FileConfig = toml::from_str(&content)
        .with_context(|| format!("failed to parse {}", config_path.display()))?;
    Ok(parsed)
}

/// Config file location: flag > env ESA2CONFLUENCE_CONFIG > ./esa2confluence.toml.
pub fn config_path(flag: Option<&Path>) -> PathBuf {
    config_path_with_lookup(flag, |key| env::var(key).ok())
}

fn config_path_with_lookup<F>(flag: Option<&Path>, lookup_env: F) -> PathBuf
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(path) = flag {
        return path.to_path_buf();
    }
    match lookup_env("ESA2CONFLUENCE_CONFIG") {
        Some(value) if !value.trim().is_empty() => PathBuf::from(value.trim()),
        _ => PathBuf::from(DEFAULT_CONFIG_FILENAME),
    }
}

#[derive(Clone, PartialEq, Eq)]
pub struct ConfluenceSettings {
    pub host: String,
    pub user: String,
    pub api_token: String,
    pub space_id: String,
    pub user_agent: String,
}

impl ConfluenceSettings {
    pub fn resolve(config: &FileConfig) -> Result<Self> {
        Self::resolve_with_lookup(config, |key| env::var(key).ok())
    }

    fn resolve_with_lookup<F>(config: &FileConfig, lookup_env: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let section = &config.confluence;
        let host = required(&lookup_env, "CONFLUENCE_HOST", section.host.as_deref())?;
        Ok(Self {
            host: host.trim_end_matches('/').to_string(),
            user: required(&lookup_env, "CONFLUENCE_USER", section.user.as_deref())?,
            api_token: required(&lookup_env, "CONFLUENCE_API_TOKEN", None)?,
            space_id: required(&lookup_env, "CONFLUENCE_SPACE_ID", section.space_id.as_deref())?,
            user_agent: optional(&lookup_env, "CONFLUENCE_USER_AGENT")
                .or_else(|| section.user_agent.clone())
                .unwrap_or_else(|| DEFAULT_USER_AGENT.to_string()),
        })
    }
}

impl fmt::Debug for ConfluenceSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConfluenceSettings")
            .field("host", &self.host)
            .field("user", &self.user)
            .field("api_token", &"<redacted>")
            .field("space_id", &self.space_id)
            .field("user_agent", &self.user_agent)
            .finish()
    }
}

#[derive(Clone, PartialEq, Eq)]
pub struct EsaSettings {
    pub access_token: String,
    pub team: String,
    pub api_url: String,
    pub user_agent: String,
}

impl EsaSettings {
    pub fn resolve(config: &FileConfig) -> Result<Self> {
        Self::resolve_with_lookup(config, |key| env::var(key).ok())
    }

    fn resolve_with_lookup<F>(config: &FileConfig, lookup_env: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let section = &config.esa;
        let api_url = optional(&lookup_env, "ESA_API_URL")
            .or_else(|| section.api_url.clone())
            .unwrap_or_else(|| DEFAULT_ESA_API_URL.to_string());
        Ok(Self {
            access_token: required(&lookup_env, "ESA_ACCESS_TOKEN", None)?,
            team: required(&lookup_env, "ESA_TEAM_NAME", section.team.as_deref())?,
            api_url: api_url.trim_end_matches('/').to_string(),
            user_agent: optional(&lookup_env, "ESA_USER_AGENT")
                .or_else(|| section.user_agent.clone())
                .unwrap_or_else(|| DEFAULT_USER_AGENT.to_string()),
        })
    }
}

impl fmt::Debug for EsaSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EsaSettings")
            .field("access_token", &"<redacted>")
            .field("team", &self.team)
            .field("api_url", &self.api_url)
            .field("user_agent", &self.user_agent)
            .finish()
    }
}

fn optional<F>(lookup_env: &F, key: &str) -> Option<String>
where
    F: Fn(&str) -> Option<String>,
{
    lookup_env(key)
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

fn required<F>(lookup_env: &F, key: &str, fallback: Option<&str>) -> Result<String>
where
    F: Fn(&str) -> Option<String>,
{
    optional(lookup_env, key)
        .or_else(|| {
            fallback
                .map(str::trim)
                .filter(|value| !value.is_empty())
                .map(ToString::to_string)
        })
        .ok_or_else(|| anyhow::anyhow!("{key} is required (set it in the environment or .env)"))
}
