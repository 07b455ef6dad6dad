//! Audio profiles and the connected-device query the prober runs.

use std::future::Future;

use uuid::Uuid;

use crate::{bluetooth::descriptor::DeviceDescriptor, error::Result};

const fn sig_uuid(short: u16) -> Uuid {
   Uuid::from_u128(((short as u128) << 96) | 0x0000_0000_0000_1000_8000_00805f9b34fb)
}

static HEADSET_UUIDS: [Uuid; 4] = [
   sig_uuid(0x1108), // HSP headset
   sig_uuid(0x1112), // HSP audio gateway
   sig_uuid(0x111e), // HFP hands-free
   sig_uuid(0x111f), // HFP audio gateway
];

static MEDIA_AUDIO_UUIDS: [Uuid; 3] = [
   sig_uuid(0x110a), // A2DP source
   sig_uuid(0x110b), // A2DP sink
   sig_uuid(0x110d), // A2DP
];

/// Bluetooth service categories used to find connected earbuds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::Display, strum::EnumIter)]
pub enum Profile {
   Headset,
   MediaAudio,
}

impl Profile {
   pub fn uuids(self) -> &'static [Uuid] {
      match self {
         Self::Headset => &HEADSET_UUIDS,
         Self::MediaAudio => &MEDIA_AUDIO_UUIDS,
      }
   }

   /// Whether a device advertising `uuids` offers this profile.
   pub fn is_offered_by<'a>(self, uuids: impl IntoIterator<Item = &'a Uuid>) -> bool {
      let ours = self.uuids();
      uuids.into_iter().any(|u| ours.contains(u))
   }
}

/// Source of "which devices are connected on profile P" answers.
pub trait ProfileManager: Sync {
   fn connected_devices(
      &self,
      profile: Profile,
   ) -> impl Future<Output = Result<Vec<DeviceDescriptor>>> + Send;
}
