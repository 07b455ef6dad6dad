//! One-shot startup probe for an already connected target device.
//!
//! Without this the service would report "not connected" until the next
//! Bluetooth event, even when the earbuds were paired long before it
//! started.

use std::collections::HashSet;

use log::{info, warn};
use strum::IntoEnumIterator;

use crate::{
   bluetooth::{
      descriptor::{DeviceDescriptor, TargetMatcher},
      profile::{Profile, ProfileManager},
   },
   state::DeviceBatteryState,
};

/// Looks for a connected target device on the audio profiles.
///
/// Degrades to the empty state when there is no manager or no match. A
/// profile that fails to enumerate is skipped.
pub async fn probe<M: ProfileManager>(
   manager: Option<&M>,
   matcher: &TargetMatcher,
) -> DeviceBatteryState {
   let Some(manager) = manager else {
      info!("No Bluetooth manager available, starting disconnected");
      return DeviceBatteryState::default();
   };

   let mut seen = HashSet::new();
   let mut devices: Vec<DeviceDescriptor> = Vec::new();
   for profile in Profile::iter() {
      match manager.connected_devices(profile).await {
         Ok(found) => devices.extend(found.into_iter().filter(|d| seen.insert(d.address))),
         Err(e) => warn!("Failed to list {profile} devices: {e}"),
      }
   }

   match devices.iter().find_map(|d| matcher.match_descriptor(d)) {
      Some(name) => {
         info!("Found connected target device: {name}");
         DeviceBatteryState::connected(name)
      },
      None => {
         info!("No connected target device among {} audio devices", devices.len());
         DeviceBatteryState::default()
      },
   }
}

#[cfg(test)]
mod tests {
   use std::collections::HashMap;

   use bluer::Address;

   use super::*;
   use crate::error::{JibError, Result};

   #[derive(Default)]
   struct FakeManager {
      devices: HashMap<Profile, Vec<DeviceDescriptor>>,
      failing: Vec<Profile>,
   }

   impl FakeManager {
      fn with(mut self, profile: Profile, addr: u8, name: Option<&str>) -> Self {
         self
            .devices
            .entry(profile)
            .or_default()
            .push(DeviceDescriptor::new(Address::new([0, 0, 0, 0, 0, addr]), name));
         self
      }

      fn failing(mut self, profile: Profile) -> Self {
         self.failing.push(profile);
         self
      }
   }

   impl ProfileManager for FakeManager {
      async fn connected_devices(&self, profile: Profile) -> Result<Vec<DeviceDescriptor>> {
         if self.failing.contains(&profile) {
            return Err(JibError::AdapterNotFound);
         }
         Ok(self.devices.get(&profile).cloned().unwrap_or_default())
      }
   }

   #[tokio::test]
   async fn test_finds_connected_target() {
      let manager = FakeManager::default()
         .with(Profile::Headset, 1, Some("Pixel Buds"))
         .with(Profile::MediaAudio, 2, Some("Jib True 2 Left"));

      let state = probe(Some(&manager), &TargetMatcher::default()).await;
      assert_eq!(
         state,
         DeviceBatteryState {
            connected: true,
            level: None,
            device_name: Some("Jib True 2 Left".into()),
         }
      );
   }

   #[tokio::test]
   async fn test_no_manager_is_empty() {
      let state = probe::<FakeManager>(None, &TargetMatcher::default()).await;
      assert!(state.is_empty());
   }

   #[tokio::test]
   async fn test_no_match_is_empty() {
      let manager = FakeManager::default()
         .with(Profile::Headset, 1, Some("AirPods"))
         .with(Profile::MediaAudio, 2, None);

      let state = probe(Some(&manager), &TargetMatcher::default()).await;
      assert!(state.is_empty());
   }

   #[tokio::test]
   async fn test_failing_profile_is_skipped() {
      let manager = FakeManager::default()
         .with(Profile::MediaAudio, 3, Some("JIB TRUE 2"))
         .failing(Profile::Headset);

      let state = probe(Some(&manager), &TargetMatcher::default()).await;
      assert_eq!(state, DeviceBatteryState::connected("JIB TRUE 2"));
   }

   #[tokio::test]
   async fn test_dedup_keeps_first_occurrence() {
      // Same address on both profiles; the headset entry wins.
      let manager = FakeManager::default()
         .with(Profile::Headset, 7, Some("Jib True 2"))
         .with(Profile::MediaAudio, 7, Some("Jib True 2 (A2DP)"));

      let state = probe(Some(&manager), &TargetMatcher::default()).await;
      assert_eq!(state.device_name.as_deref(), Some("Jib True 2"));
   }

   #[tokio::test]
   async fn test_first_match_wins() {
      let manager = FakeManager::default()
         .with(Profile::Headset, 1, Some("Jib Left"))
         .with(Profile::Headset, 2, Some("Jib Right"));

      let state = probe(Some(&manager), &TargetMatcher::default()).await;
      assert_eq!(state.device_name.as_deref(), Some("Jib Left"));
   }
}
