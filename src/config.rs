//! Configuration management for the Jib battery service.
//!
//! The configuration lives in a TOML file and names the device pattern to
//! track, how the status text is phrased, and which BlueZ event source the
//! reconciler subscribes to.

use std::{
   env, fs,
   path::{Path, PathBuf},
};

use serde::{Deserialize, Serialize};

use crate::error::{JibError, Result};

/// Which backend delivers Bluetooth notifications.
#[derive(
   Debug,
   Clone,
   Copy,
   PartialEq,
   Eq,
   Default,
   Serialize,
   Deserialize,
   strum::Display,
   strum::EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum EventSourceKind {
   /// Property-change streams from `bluer`.
   #[default]
   Bluer,
   /// Raw `PropertiesChanged` signals read off the system bus.
   Dbus,
}

/// Main configuration structure for the service.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Config {
   /// Case-insensitive substring a device name must contain to be tracked.
   #[serde(default = "default_target_pattern")]
   pub target_pattern: String,

   #[serde(default = "default_product_name")]
   pub product_name: String,

   #[serde(default = "default_low_battery_threshold")]
   pub low_battery_threshold: u8,

   #[serde(default)]
   pub event_source: EventSourceKind,

   /// Program and arguments spawned by `OpenBluetoothSettings`.
   #[serde(default = "default_settings_command")]
   pub settings_command: Vec<String>,
}

fn default_target_pattern() -> String {
   "jib".to_string()
}

fn default_product_name() -> String {
   "Jib True 2".to_string()
}

const fn default_low_battery_threshold() -> u8 {
   20
}

fn default_settings_command() -> Vec<String> {
   vec!["systemsettings".to_string(), "kcm_bluetooth".to_string()]
}

impl Default for Config {
   fn default() -> Self {
      Self {
         target_pattern: default_target_pattern(),
         product_name: default_product_name(),
         low_battery_threshold: default_low_battery_threshold(),
         event_source: EventSourceKind::default(),
         settings_command: default_settings_command(),
      }
   }
}

impl Config {
   /// Loads configuration from disk or creates default if not exists.
   pub fn load() -> Result<Self> {
      Self::load_from(&Self::config_path()?)
   }

   pub fn load_from(path: &Path) -> Result<Self> {
      if path.exists() {
         let contents = fs::read_to_string(path)?;
         let config: Self = toml::from_str(&contents)?;
         config.validate()?;
         Ok(config)
      } else {
         let config = Self::default();
         config.save_to(path)?;
         Ok(config)
      }
   }

   pub fn save_to(&self, path: &Path) -> Result<()> {
      if let Some(parent) = path.parent() {
         fs::create_dir_all(parent)?;
      }

      let contents = toml::to_string_pretty(self)?;
      fs::write(path, contents)?;

      Ok(())
   }

   fn validate(&self) -> Result<()> {
      if self.low_battery_threshold > 100 {
         return Err(JibError::InvalidConfig(format!(
            "low_battery_threshold must be at most 100, got {}",
            self.low_battery_threshold
         )));
      }
      if self.target_pattern.trim().is_empty() {
         return Err(JibError::InvalidConfig("target_pattern must not be empty".into()));
      }
      Ok(())
   }

   fn config_path() -> Result<PathBuf> {
      if let Ok(jibd_home) = env::var("JIBD_HOME") {
         return Ok(PathBuf::from(jibd_home).join("config.toml"));
      }

      let config_dir = if let Ok(config_home) = env::var("XDG_CONFIG_HOME") {
         PathBuf::from(config_home)
      } else if let Ok(home) = env::var("HOME") {
         PathBuf::from(home).join(".config")
      } else {
         dirs::config_dir().ok_or(JibError::ConfigDirNotFound)?
      };

      Ok(config_dir.join("jibd").join("config.toml"))
   }
}
