//! BlueZ-backed profile manager.
//!
//! Answers "which devices are connected on profile P" by walking every
//! adapter's device list and classifying connected devices by the service
//! UUIDs they advertise.

use bluer::{Adapter, Session};
use log::{debug, warn};

use crate::{
   bluetooth::{
      descriptor::DeviceDescriptor,
      profile::{Profile, ProfileManager},
   },
   error::{JibError, Result},
};

/// Handle to the system's BlueZ daemon.
#[derive(Clone)]
pub struct BluezManager {
   session: Session,
}

impl BluezManager {
   pub async fn new() -> Result<Self> {
      Ok(Self {
         session: Session::new().await?,
      })
   }

   pub const fn session(&self) -> &Session {
      &self.session
   }

   async fn adapters(&self) -> Result<Vec<Adapter>> {
      let names = self.session.adapter_names().await?;
      if names.is_empty() {
         return Err(JibError::AdapterNotFound);
      }

      let mut adapters = Vec::with_capacity(names.len());
      for name in names {
         match self.session.adapter(&name) {
            Ok(adapter) => adapters.push(adapter),
            Err(e) => warn!("Failed to open adapter {name}: {e}"),
         }
      }
      Ok(adapters)
   }
}

impl ProfileManager for BluezManager {
   async fn connected_devices(&self, profile: Profile) -> Result<Vec<DeviceDescriptor>> {
      let mut found = Vec::new();

      for adapter in self.adapters().await? {
         for addr in adapter.device_addresses().await? {
            let Ok(device) = adapter.device(addr) else {
               continue;
            };
            if !device.is_connected().await.unwrap_or(false) {
               continue;
            }

            let uuids = device.uuids().await.ok().flatten().unwrap_or_default();
            if !profile.is_offered_by(&uuids) {
               continue;
            }

            let name = device.name().await.ok().flatten();
            debug!("{profile} device connected: {addr} {name:?}");
            found.push(DeviceDescriptor::new(addr, name));
         }
      }

      Ok(found)
   }
}
