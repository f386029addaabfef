use anyhow::{Context, Result, bail};
use chrono::NaiveTime;
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub profile: ProfileSection,
    #[serde(default)]
    pub logging: LoggingSection,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProfileSection {
    /// IANA timezone used for `--at`, `--day` and display.
    #[serde(default = "default_timezone")]
    pub timezone: String,
    /// Local "HH:MM"; used when an imported day does not set its own.
    #[serde(default)]
    pub bedtime: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggingSection {
    /// EnvFilter directive; `RUST_LOG` overrides it.
    #[serde(default = "default_level")]
    pub level: String,
    #[serde(default)]
    pub format: LogFormat,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

fn default_timezone() -> String {
    "America/Chicago".to_string()
}

fn default_level() -> String {
    "warn".to_string()
}

impl Default for ProfileSection {
    fn default() -> Self {
        Self {
            timezone: default_timezone(),
            bedtime: None,
        }
    }
}

impl Default for LoggingSection {
    fn default() -> Self {
        Self {
            level: default_level(),
            format: LogFormat::default(),
        }
    }
}

impl Config {
    pub fn tz(&self) -> Result<Tz> {
        self.profile
            .timezone
            .parse()
            .map_err(|_| anyhow::anyhow!("invalid timezone in config: {}", self.profile.timezone))
    }

    fn validate(&self) -> Result<()> {
        self.tz()?;
        if let Some(bedtime) = &self.profile.bedtime {
            if NaiveTime::parse_from_str(bedtime, "%H:%M").is_err() {
                bail!("invalid bedtime in config: '{bedtime}' (expected HH:MM)");
            }
        }
        Ok(())
    }
}

pub fn config_path(home: &Path) -> PathBuf {
    home.join("config.toml")
}

/// Missing file means defaults.
pub fn load_config(home: &Path) -> Result<Config> {
    let p = config_path(home);
    if !p.exists() {
        return Ok(Config::default());
    }
    let s = fs::read_to_string(&p).with_context(|| format!("read {}", p.display()))?;
    let cfg: Config = toml::from_str(&s).context("parse config.toml")?;
    cfg.validate()?;
    Ok(cfg)
}

pub fn save_config(home: &Path, cfg: &Config) -> Result<()> {
    let p = config_path(home);
    let s = toml::to_string_pretty(cfg).context("serialize config")?;
    fs::write(&p, s).with_context(|| format!("write {}", p.display()))?;
    Ok(())
}

/// Write a default config unless one exists. Returns the path and whether it was created.
pub fn init_config(home: &Path) -> Result<(PathBuf, bool)> {
    let p = config_path(home);
    if p.exists() {
        return Ok((p, false));
    }
    save_config(home, &Config::default())?;
    Ok((p, true))
}
