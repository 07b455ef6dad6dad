//! The in-memory record describing the tracked earbuds.

use std::sync::Arc;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use smol_str::SmolStr;

/// Latest published state, readable from the D-Bus side.
pub type SharedState = Arc<RwLock<DeviceBatteryState>>;

/// Last known connection and battery state of the target device.
///
/// The empty default means "not connected, nothing known". A disconnect
/// always resets the record to that default rather than keeping the last
/// level around.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceBatteryState {
   pub connected: bool,
   /// Battery percentage in `0..=100`, only ever set from a battery report.
   pub level: Option<u8>,
   pub device_name: Option<SmolStr>,
}

impl DeviceBatteryState {
   /// State for a device seen as connected with no battery report yet.
   pub fn connected(name: impl Into<SmolStr>) -> Self {
      Self {
         connected: true,
         level: None,
         device_name: Some(name.into()),
      }
   }

   pub fn is_empty(&self) -> bool {
      *self == Self::default()
   }

   pub fn to_json(&self) -> serde_json::Value {
      serde_json::json!({
         "connected": self.connected,
         "level": self.level,
         "device_name": self.device_name.as_deref(),
      })
   }
}

#[cfg(test)]
mod tests {
   use super::*;

   #[test]
   fn test_default_is_empty() {
      let state = DeviceBatteryState::default();
      assert!(state.is_empty());
      assert!(!state.connected);
      assert_eq!(state.level, None);
      assert_eq!(state.device_name, None);
   }

   #[test]
   fn test_json_shape() {
      let state = DeviceBatteryState {
         connected: true,
         level: Some(42),
         device_name: Some("Jib True 2".into()),
      };
      assert_eq!(
         state.to_json(),
         serde_json::json!({"connected": true, "level": 42, "device_name": "Jib True 2"})
      );
      assert_eq!(
         DeviceBatteryState::default().to_json(),
         serde_json::json!({"connected": false, "level": null, "device_name": null})
      );
   }
}
