use anyhow::{Context, Result};
use chrono::Weekday;
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use taskflow_core::time::{parse_timezone, parse_weekday};

use crate::state::ensure_taskflow_home;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub server: ServerSection,
    pub calendar: CalendarSection,
    pub sync: SyncSection,
    pub log: LogSection,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerSection {
    /// REST root, e.g. `http://127.0.0.1:8000`.
    pub base_url: String,
    /// Live count channel endpoint.
    pub live_url: String,
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CalendarSection {
    /// IANA zone used to compute "today".
    pub timezone: String,
    pub week_start: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncSection {
    pub reconnect_delay_secs: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogSection {
    /// `EnvFilter` directive used when `RUST_LOG` is unset.
    pub filter: String,
}

impl Default for ServerSection {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:8000".to_string(),
            live_url: "ws://127.0.0.1:8000/ws/task-counts/".to_string(),
            timeout_secs: 10,
        }
    }
}

impl Default for CalendarSection {
    fn default() -> Self {
        Self {
            timezone: "America/Chicago".to_string(),
            week_start: "monday".to_string(),
        }
    }
}

impl Default for SyncSection {
    fn default() -> Self {
        Self { reconnect_delay_secs: 3 }
    }
}

impl Default for LogSection {
    fn default() -> Self {
        Self { filter: "warn".to_string() }
    }
}

impl Config {
    pub fn timezone(&self) -> Result<Tz> {
        parse_timezone(&self.calendar.timezone).context("[calendar] timezone")
    }

    pub fn week_start(&self) -> Result<Weekday> {
        parse_weekday(&self.calendar.week_start).context("[calendar] week_start")
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.server.timeout_secs)
    }

    pub fn reconnect_delay(&self) -> Duration {
        Duration::from_secs(self.sync.reconnect_delay_secs)
    }
}

pub fn config_path() -> Result<PathBuf> {
    Ok(ensure_taskflow_home()?.join("config.toml"))
}

pub fn load_config() -> Result<Config> {
    load_config_from(&config_path()?)
}

/// Defaults when the file does not exist; missing keys fall back individually.
pub fn load_config_from(p: &Path) -> Result<Config> {
    if !p.exists() {
        return Ok(Config::default());
    }
    let s = fs::read_to_string(p).with_context(|| format!("read {}", p.display()))?;
    toml::from_str(&s).with_context(|| format!("parse {}", p.display()))
}

pub fn save_config_to(cfg: &Config, p: &Path) -> Result<()> {
    let s = toml::to_string_pretty(cfg).context("serialize config")?;
    fs::write(p, s).with_context(|| format!("write {}", p.display()))?;
    Ok(())
}

pub fn init_config() -> Result<()> {
    let p = config_path()?;
    if p.exists() {
        println!("Config already exists: {}", p.display());
        return Ok(());
    }
    save_config_to(&Config::default(), &p)?;
    println!("Wrote {}", p.display());
    Ok(())
}
