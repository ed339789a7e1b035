// merakictl - CLI for the Meraki Dashboard API
// Copyright (C) 2024 Mathias Uhl <mathiasuhl@gmx.de>
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License
// along with this program.  If not, see <https://www.gnu.org/licenses/>.

use anyhow::{Context, Result};
use dirs::config_dir;
use serde::{Deserialize, Serialize};
use std::{
    env, fs,
    path::{Path, PathBuf},
    time::Duration,
};
use thiserror::Error;

pub const DEFAULT_BASE_URL: &str = "https://api.meraki.com/api/v1";
pub const API_KEY_ENV: &str = "MERAKI_DASHBOARD_API_KEY";
pub const BASE_URL_ENV: &str = "MERAKI_BASE_URL";
pub const CONFIG_DIR_ENV: &str = "MERAKICTL_CONFIG_DIR";

const DEFAULT_PER_PAGE: u32 = 1000;
const DEFAULT_TIMEOUT_SECS: u64 = 60;
const DEFAULT_POLL_INTERVAL_SECS: u64 = 1;

/// Non-secret defaults read from YAML. The API key never lives here.
#[derive(Debug, Serialize, Deserialize, Default, Clone, PartialEq, Eq)]
pub struct Config {
    pub base_url: Option<String>,
    pub per_page: Option<u32>,
    pub timeout_secs: Option<u64>,
    pub poll_interval_secs: Option<u64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scope {
    Local,
    User,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not locate a config directory for the current user")]
    MissingConfigDir,
    #[error("API key is required; set MERAKI_DASHBOARD_API_KEY in the environment")]
    MissingApiKey,
}

#[derive(Debug)]
pub struct EffectiveConfig {
    pub api_key: String,
    pub base_url: String,
    pub per_page: u32,
    pub timeout: Duration,
    pub poll_interval: Duration,
}

impl EffectiveConfig {
    pub fn masked_key(&self) -> String {
        mask(&self.api_key)
    }
}

pub fn config_path(scope: Scope, cwd: &Path) -> Result<PathBuf> {
    match scope {
        Scope::Local => Ok(cwd.join(".merakictl.yaml")),
        Scope::User => {
            if let Ok(custom) = env::var(CONFIG_DIR_ENV) {
                return Ok(PathBuf::from(custom).join("config.yaml"));
            }
            let base = config_dir().ok_or(ConfigError::MissingConfigDir)?;
            Ok(base.join("merakictl").join("config.yaml"))
        }
    }
}

pub fn load(cwd: &Path) -> Result<Config> {
    let user = read_if_exists(&config_path(Scope::User, cwd)?)?.unwrap_or_default();
    let local = read_if_exists(&config_path(Scope::Local, cwd)?)?.unwrap_or_default();
    Ok(merge(user, local))
}

pub fn resolve(cwd: &Path, base_url_override: Option<String>) -> Result<EffectiveConfig> {
    let file = load(cwd)?;
    let effective = resolve_with(
        file,
        env::var(API_KEY_ENV).ok(),
        env::var(BASE_URL_ENV).ok(),
        base_url_override,
    )?;
    Ok(effective)
}

/// Precedence for the base URL: flag, environment, project file, user file.
fn resolve_with(
    file: Config,
    api_key: Option<String>,
    env_base_url: Option<String>,
    base_url_override: Option<String>,
) -> Result<EffectiveConfig, ConfigError> {
    let api_key = api_key
        .map(|k| k.trim().to_string())
        .filter(|k| !k.is_empty())
        .ok_or(ConfigError::MissingApiKey)?;

    let base_url = base_url_override
        .or(env_base_url)
        .or(file.base_url)
        .unwrap_or_else(|| DEFAULT_BASE_URL.to_string());

    Ok(EffectiveConfig {
        api_key,
        base_url,
        per_page: file.per_page.unwrap_or(DEFAULT_PER_PAGE),
        timeout: Duration::from_secs(file.timeout_secs.unwrap_or(DEFAULT_TIMEOUT_SECS)),
        poll_interval: Duration::from_secs(
            file.poll_interval_secs
                .unwrap_or(DEFAULT_POLL_INTERVAL_SECS),
        ),
    })
}

fn read_if_exists(path: &Path) -> Result<Option<Config>> {
    if !path.exists() {
        return Ok(None);
    }

    let contents = fs::read_to_string(path).with_context(|| format!("reading {:?}", path))?;
    let config = serde_yaml::from_str(&contents).with_context(|| format!("parsing {:?}", path))?;
    Ok(Some(config))
}

fn merge(user: Config, local: Config) -> Config {
    Config {
        base_url: local.base_url.or(user.base_url),
        per_page: local.per_page.or(user.per_page),
        timeout_secs: local.timeout_secs.or(user.timeout_secs),
        poll_interval_secs: local.poll_interval_secs.or(user.poll_interval_secs),
    }
}

fn mask(key: &str) -> String {
    let tail: String = key
        .chars()
        .rev()
        .take(4)
        .collect::<Vec<_>>()
        .into_iter()
        .rev()
        .collect();
    if key.chars().count() <= 4 {
        "*****".into()
    } else {
        format!("*****{tail}")
    }
}
