//! Display strings derived from the device state.

use serde::Serialize;
use smol_str::SmolStr;

use crate::{config::Config, state::DeviceBatteryState};

/// Color selection for the battery gauge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, strum::Display)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Accent {
   Normal,
   Low,
}

/// How the status text is phrased.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ViewSettings {
   pub product_name: SmolStr,
   pub low_battery_threshold: u8,
}

impl ViewSettings {
   pub fn from_config(config: &Config) -> Self {
      Self {
         product_name: config.product_name.as_str().into(),
         low_battery_threshold: config.low_battery_threshold,
      }
   }
}

impl Default for ViewSettings {
   fn default() -> Self {
      Self::from_config(&Config::default())
   }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StatusView {
   pub low_battery: bool,
   /// Gauge fill in `0.0..=1.0`.
   pub progress: f32,
   pub accent: Accent,
   pub status_line: String,
   pub connection_line: String,
   pub battery_line: String,
   pub advisory_line: String,
}

impl StatusView {
   pub fn from_state(state: &DeviceBatteryState, settings: &ViewSettings) -> Self {
      let product = settings.product_name.as_str();
      let low_battery = state
         .level
         .is_some_and(|level| level <= settings.low_battery_threshold);
      let progress = (f32::from(state.level.unwrap_or(0)) / 100.0).clamp(0.0, 1.0);

      let status_line = if state.connected {
         "Status: Connected".to_string()
      } else {
         "Status: Not connected".to_string()
      };

      let connection_line = if state.connected {
         format!(
            "Connected to {}",
            state.device_name.as_deref().unwrap_or(product)
         )
      } else {
         format!("Connect your {product} to see battery level.")
      };

      let battery_line = match state.level {
         Some(level) => format!("{level}%"),
         None if state.connected => "Charging / waiting for info".to_string(),
         None => "--".to_string(),
      };

      let advisory_line = if low_battery {
         format!("Low battery! Charge your {product} soon.")
      } else {
         format!(
            "A low-battery warning appears here when it drops below {}%.",
            settings.low_battery_threshold
         )
      };

      Self {
         low_battery,
         progress,
         accent: if low_battery { Accent::Low } else { Accent::Normal },
         status_line,
         connection_line,
         battery_line,
         advisory_line,
      }
   }

   pub fn to_json(&self) -> serde_json::Value {
      serde_json::to_value(self).unwrap_or_default()
   }

   /// True when this view enters the low-battery state, given whether the
   /// previous one was already low.
   pub const fn became_low(&self, was_low: bool) -> bool {
      self.low_battery && !was_low
   }
}
