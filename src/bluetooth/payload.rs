//! Event payloads and the extraction of device data from them.
//!
//! An event can carry its device in one of two shapes. The `bluer` source
//! builds a typed descriptor directly. The raw D-Bus source forwards a
//! property map keyed by BlueZ property names. Both go through
//! [`EventPayload::descriptor`] and [`EventPayload::battery_level`], so the
//! reconciler never sees the difference.

use std::{collections::HashMap, str::FromStr};

use bluer::Address;
use smol_str::SmolStr;
use zbus::zvariant::{OwnedValue, Value};

use crate::bluetooth::descriptor::DeviceDescriptor;

pub const KEY_ADDRESS: &str = "Address";
pub const KEY_NAME: &str = "Name";
pub const KEY_PERCENTAGE: &str = "Percentage";

/// Level reported when a battery event carries no usable value.
pub const NO_LEVEL: i32 = -1;

/// BlueZ-style property map, as read off a `PropertiesChanged` signal.
pub type PropertyMap = HashMap<String, OwnedValue>;

/// Data attached to a [`BroadcastEvent`](crate::event::BroadcastEvent).
#[derive(Debug, PartialEq)]
pub enum EventPayload {
   Typed {
      device: Option<DeviceDescriptor>,
      level: Option<i32>,
   },
   Legacy(PropertyMap),
}

impl EventPayload {
   pub fn typed(device: DeviceDescriptor) -> Self {
      Self::Typed {
         device: Some(device),
         level: None,
      }
   }

   pub fn typed_with_level(device: DeviceDescriptor, level: i32) -> Self {
      Self::Typed {
         device: Some(device),
         level: Some(level),
      }
   }

   /// Extracts the originating device, if the payload names one.
   ///
   /// A legacy map without a parseable `Address` has no descriptor; a
   /// missing `Name` yields a nameless descriptor.
   pub fn descriptor(&self) -> Option<DeviceDescriptor> {
      match self {
         Self::Typed { device, .. } => device.clone(),
         Self::Legacy(props) => {
            let address = props
               .get(KEY_ADDRESS)
               .and_then(|v| value_str(v))
               .and_then(|s| Address::from_str(s).ok())?;
            let name = props.get(KEY_NAME).and_then(|v| value_str(v)).map(SmolStr::new);
            Some(DeviceDescriptor { address, name })
         },
      }
   }

   /// Battery level carried by the payload, or [`NO_LEVEL`].
   pub fn battery_level(&self) -> i32 {
      match self {
         Self::Typed { level, .. } => level.unwrap_or(NO_LEVEL),
         Self::Legacy(props) => props
            .get(KEY_PERCENTAGE)
            .and_then(|v| value_int(v))
            .unwrap_or(NO_LEVEL),
      }
   }
}

fn value_str<'a>(value: &'a Value<'_>) -> Option<&'a str> {
   match value {
      Value::Str(s) => Some(s.as_str()),
      _ => None,
   }
}

fn value_int(value: &Value<'_>) -> Option<i32> {
   match *value {
      Value::U8(v) => Some(i32::from(v)),
      Value::I16(v) => Some(i32::from(v)),
      Value::U16(v) => Some(i32::from(v)),
      Value::I32(v) => Some(v),
      Value::U32(v) => i32::try_from(v).ok(),
      Value::I64(v) => i32::try_from(v).ok(),
      _ => None,
   }
}

#[cfg(test)]
mod tests {
   use super::*;

   fn owned<'a>(value: impl Into<Value<'a>>) -> OwnedValue {
      OwnedValue::try_from(value.into()).unwrap()
   }

   fn addr() -> Address {
      Address::new([0x12, 0x34, 0x56, 0x78, 0x9a, 0xbc])
   }

   #[test]
   fn test_typed_and_legacy_descriptors_agree() {
      let typed = EventPayload::typed_with_level(
         DeviceDescriptor::new(addr(), Some("Jib True 2")),
         57,
      );
      let legacy = EventPayload::Legacy(PropertyMap::from([
         (KEY_ADDRESS.to_string(), owned(addr().to_string())),
         (KEY_NAME.to_string(), owned("Jib True 2")),
         (KEY_PERCENTAGE.to_string(), owned(57u8)),
      ]));

      assert_eq!(typed.descriptor(), legacy.descriptor());
      assert_eq!(typed.battery_level(), legacy.battery_level());
      assert_eq!(legacy.battery_level(), 57);
   }

   #[test]
   fn test_nameless_device_agrees() {
      let typed = EventPayload::typed(DeviceDescriptor::new(addr(), None::<&str>));
      let legacy = EventPayload::Legacy(PropertyMap::from([(
         KEY_ADDRESS.to_string(),
         owned(addr().to_string()),
      )]));

      assert_eq!(typed.descriptor(), legacy.descriptor());
      assert_eq!(legacy.descriptor().unwrap().name, None);
   }

   #[test]
   fn test_missing_device() {
      let typed = EventPayload::Typed {
         device: None,
         level: Some(50),
      };
      assert_eq!(typed.descriptor(), None);

      let legacy = EventPayload::Legacy(PropertyMap::from([
         (KEY_NAME.to_string(), owned("Jib True 2")),
         (KEY_PERCENTAGE.to_string(), owned(50i32)),
      ]));
      assert_eq!(legacy.descriptor(), None);

      let garbage = EventPayload::Legacy(PropertyMap::from([(
         KEY_ADDRESS.to_string(),
         owned("not an address"),
      )]));
      assert_eq!(garbage.descriptor(), None);
   }

   #[test]
   fn test_missing_level_is_sentinel() {
      let typed = EventPayload::typed(DeviceDescriptor::new(addr(), Some("Jib")));
      assert_eq!(typed.battery_level(), NO_LEVEL);

      let legacy = EventPayload::Legacy(PropertyMap::from([(
         KEY_PERCENTAGE.to_string(),
         owned("fifty"),
      )]));
      assert_eq!(legacy.battery_level(), NO_LEVEL);
   }
}
