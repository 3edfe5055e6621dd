use anyhow::{Context, Result};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Serialize, Deserialize, Default, Debug, Clone, PartialEq)]
pub struct Config {
  /// Scheme and host prepended to locations when printing share links.
  pub origin: Option<String>,
  /// Write logs here instead of stderr.
  pub log_file: Option<PathBuf>,
}

impl Config {
  pub fn load() -> Self {
    if let Some(config_file) = Self::path()
      && let Ok(content) = std::fs::read_to_string(config_file)
      && let Ok(config) = toml::from_str(&content)
    {
      return config;
    }
    Self::default()
  }

  pub fn save(&self) -> Result<PathBuf> {
    let config_file = Self::path().context("No config directory for this platform")?;
    if let Some(dir) = config_file.parent() {
      std::fs::create_dir_all(dir).with_context(|| format!("Failed to create {}", dir.display()))?;
    }
    let content = toml::to_string(self).context("Failed to serialize config")?;
    std::fs::write(&config_file, content).with_context(|| format!("Failed to write {}", config_file.display()))?;
    Ok(config_file)
  }

  pub fn path() -> Option<PathBuf> {
    ProjectDirs::from("", "", "multistream").map(|dirs| dirs.config_dir().join("prefs.toml"))
  }

  /// Full share link for `location`, or the bare location without an origin.
  pub fn share_link(&self, location: &str) -> String {
    match self.origin.as_deref().map(|o| o.trim_end_matches('/')).filter(|o| !o.is_empty()) {
      Some(origin) => format!("{}{}", origin, location),
      None => location.to_string(),
    }
  }
}
