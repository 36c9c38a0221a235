use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

pub const DEFAULT_YEARLY_GOAL_HOURS: i64 = 365;

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct AppConfig {
    pub yearly_goal_hours: i64,
    pub start_minimized: bool,
    /// Build profile and `DEBUG_PROD` only; never read from or written to disk.
    #[serde(skip)]
    pub debug: bool,
    pub window_width: f64,
    pub window_height: f64,
}

impl Default for AppConfig {
    fn default() -> Self {
        AppConfig {
            yearly_goal_hours: DEFAULT_YEARLY_GOAL_HOURS,
            start_minimized: false,
            debug: cfg!(debug_assertions),
            window_width: 1024.0,
            window_height: 728.0,
        }
    }
}

impl AppConfig {
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::get_config_path()?)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            debug!("No config at {:?}, using defaults", path);
            return Ok(Self::default());
        }

        let content = fs::read_to_string(path)?;
        let config = serde_json::from_str(&content)?;
        Ok(config)
    }

    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::get_config_path()?)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let content = serde_json::to_string_pretty(self)?;
        fs::write(path, content)?;
        Ok(())
    }

    fn get_config_path() -> Result<PathBuf> {
        let mut path = dirs::config_dir()
            .ok_or_else(|| anyhow::anyhow!("Failed to get config directory"))?;
        path.push("voidspace");
        path.push("config.json");
        Ok(path)
    }

    /// Applies the process environment on top of the loaded file.
    pub fn with_env(self) -> Self {
        self.with_overrides(|key| std::env::var(key).ok())
    }

    /// `START_MINIMIZED` set to anything forces a minimized window;
    /// `DEBUG_PROD=true` enables debug logging in release builds.
    pub fn with_overrides(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        if lookup("START_MINIMIZED").is_some() {
            self.start_minimized = true;
        }
        if lookup("DEBUG_PROD").as_deref() == Some("true") {
            self.debug = true;
        }
        self
    }

    pub fn set_yearly_goal_hours(&mut self, hours: i64) -> Result<()> {
        if hours < 0 {
            return Err(anyhow::anyhow!("Yearly goal cannot be negative: {}", hours));
        }
        self.yearly_goal_hours = hours;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = AppConfig::load_from(&dir.path().join("config.json")).unwrap();
        assert_eq!(config, AppConfig::default());
        assert_eq!(config.yearly_goal_hours, DEFAULT_YEARLY_GOAL_HOURS);
    }

    #[test]
    fn save_then_load_keeps_values() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.json");

        let mut config = AppConfig::default();
        config.set_yearly_goal_hours(120).unwrap();
        config.start_minimized = true;
        config.save_to(&path).unwrap();

        let loaded = AppConfig::load_from(&path).unwrap();
        assert_eq!(loaded.yearly_goal_hours, 120);
        assert!(loaded.start_minimized);
        assert!(!fs::read_to_string(&path).unwrap().contains("debug"));
    }

    #[test]
    fn partial_file_falls_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, r#"{ "yearly_goal_hours": 50 }"#).unwrap();

        let config = AppConfig::load_from(&path).unwrap();
        assert_eq!(config.yearly_goal_hours, 50);
        assert_eq!(config.window_width, 1024.0);
        assert_eq!(config.window_height, 728.0);
    }

    #[test]
    fn environment_overrides_flags() {
        let base = AppConfig {
            debug: false,
            ..AppConfig::default()
        };

        let config = base
            .clone()
            .with_overrides(env(&[("START_MINIMIZED", "1"), ("DEBUG_PROD", "true")]));
        assert!(config.start_minimized);
        assert!(config.debug);

        let config = base.with_overrides(env(&[("DEBUG_PROD", "yes")]));
        assert!(!config.start_minimized);
        assert!(!config.debug);
    }

    #[test]
    fn negative_goal_is_rejected() {
        let mut config = AppConfig::default();
        assert!(config.set_yearly_goal_hours(-1).is_err());
        assert_eq!(config.yearly_goal_hours, DEFAULT_YEARLY_GOAL_HOURS);
    }
}
