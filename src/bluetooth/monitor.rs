//! Event source backed by `bluer` property-change streams.
//!
//! Every adapter gets a monitor task that follows `DeviceAdded` and
//! `DeviceRemoved` events; every known device gets a task following its
//! `Connected` and `BatteryPercentage` properties, aborted once the device
//! is removed.

use std::{collections::HashMap, future::Future};

use bluer::{Adapter, AdapterEvent, Address, Device, DeviceEvent, DeviceProperty, Session};
use futures::stream::StreamExt;
use log::{debug, info, warn};
use smol_str::SmolStr;
use tokio::{
   sync::mpsc::UnboundedSender,
   task::{AbortHandle, JoinSet},
};

use crate::{
   bluetooth::{
      descriptor::DeviceDescriptor,
      payload::EventPayload,
      source::{EventSource, Subscription},
   },
   error::{JibError, Result},
   event::{BroadcastEvent, EventKind},
};

/// Watches all BlueZ adapters through `bluer`.
pub struct BluerEvents {
   session: Session,
}

impl BluerEvents {
   pub const fn new(session: Session) -> Self {
      Self { session }
   }
}

impl EventSource for BluerEvents {
   async fn subscribe(&self) -> Result<Subscription> {
      let names = self.session.adapter_names().await?;
      if names.is_empty() {
         return Err(JibError::AdapterNotFound);
      }

      let (tx, mut subscription) = Subscription::channel();
      for name in names {
         match self.session.adapter(&name) {
            Ok(adapter) => {
               info!("Monitoring adapter {name}");
               subscription.spawn(monitor_adapter(SmolStr::from(name), adapter, tx.clone()));
            },
            Err(e) => warn!("Failed to open adapter {name}: {e}"),
         }
      }
      Ok(subscription)
   }
}

async fn monitor_adapter(name: SmolStr, adapter: Adapter, tx: UnboundedSender<BroadcastEvent>) {
   let Ok(mut events) = adapter.events().await else {
      warn!("Failed to get adapter events for {name}");
      return;
   };

   let mut watchers = DeviceWatchers::default();

   if let Ok(addresses) = adapter.device_addresses().await {
      for addr in addresses {
         watch(&adapter, addr, &mut watchers, &tx);
      }
   }

   while let Some(event) = events.next().await {
      watchers.reap();

      match event {
         AdapterEvent::DeviceAdded(addr) => {
            debug!("Device added on {name}: {addr}");
            watch(&adapter, addr, &mut watchers, &tx);
         },
         AdapterEvent::DeviceRemoved(addr) => {
            debug!("Device removed on {name}: {addr}");
            watchers.unwatch(&addr);
         },
         _ => {},
      }

      if tx.is_closed() {
         break;
      }
   }

   debug!("Adapter event stream for {name} ended");
}

fn watch(
   adapter: &Adapter,
   addr: Address,
   watchers: &mut DeviceWatchers,
   tx: &UnboundedSender<BroadcastEvent>,
) {
   if watchers.is_watching(&addr) {
      return;
   }
   match adapter.device(addr) {
      Ok(device) => watchers.insert(addr, monitor_device(device, tx.clone())),
      Err(e) => warn!("Failed to open device {addr}: {e}"),
   }
}

/// One property-watch task per device address.
///
/// The device stream from `bluer` never ends once its object is removed, so
/// a removed device's task has to be aborted here.
#[derive(Default)]
struct DeviceWatchers {
   tasks: JoinSet<()>,
   handles: HashMap<Address, AbortHandle>,
}

impl DeviceWatchers {
   fn is_watching(&self, addr: &Address) -> bool {
      self.handles.get(addr).is_some_and(|handle| !handle.is_finished())
   }

   fn insert<F>(&mut self, addr: Address, task: F)
   where
      F: Future<Output = ()> + Send + 'static,
   {
      let handle = self.tasks.spawn(task);
      if let Some(previous) = self.handles.insert(addr, handle) {
         previous.abort();
      }
   }

   fn unwatch(&mut self, addr: &Address) {
      if let Some(handle) = self.handles.remove(addr) {
         handle.abort();
      }
   }

   /// Drops bookkeeping for tasks that have already finished.
   fn reap(&mut self) {
      while self.tasks.try_join_next().is_some() {}
      self.handles.retain(|_, handle| !handle.is_finished());
   }
}

/// Maps a device property change to the event it stands for.
fn classify(property: &DeviceProperty) -> Option<(EventKind, Option<i32>)> {
   match *property {
      DeviceProperty::Connected(true) => Some((EventKind::DeviceConnected, None)),
      DeviceProperty::Connected(false) => Some((EventKind::DeviceDisconnected, None)),
      DeviceProperty::BatteryPercentage(level) => {
         Some((EventKind::BatteryLevelChanged, Some(i32::from(level))))
      },
      _ => None,
   }
}

async fn monitor_device(device: Device, tx: UnboundedSender<BroadcastEvent>) {
   let Ok(mut events) = device.events().await else {
      return;
   };

   while let Some(DeviceEvent::PropertyChanged(property)) = events.next().await {
      let Some((kind, level)) = classify(&property) else {
         continue;
      };

      let name = device.name().await.ok().flatten();
      let descriptor = DeviceDescriptor::new(device.address(), name);
      let payload = match level {
         Some(level) => EventPayload::typed_with_level(descriptor, level),
         None => EventPayload::typed(descriptor),
      };
      if tx.send(BroadcastEvent::new(kind, payload)).is_err() {
         break;
      }
   }
}

#[cfg(test)]
mod tests {
   use std::{sync::Arc, time::Duration};

   use super::*;

   fn addr(last: u8) -> Address {
      Address::new([0x10, 0x20, 0x30, 0x40, 0x50, last])
   }

   /// A watcher that holds `alive` until it is aborted.
   fn hold(alive: &Arc<()>) -> impl Future<Output = ()> + Send + 'static {
      let held = alive.clone();
      async move {
         let _held = held;
         std::future::pending::<()>().await;
      }
   }

   #[tokio::test]
   async fn test_removed_device_watcher_is_aborted() {
      let alive = Arc::new(());
      let mut watchers = DeviceWatchers::default();

      watchers.insert(addr(1), hold(&alive));
      assert!(watchers.is_watching(&addr(1)));
      assert!(!watchers.is_watching(&addr(2)));

      watchers.unwatch(&addr(1));
      tokio::time::sleep(Duration::from_millis(20)).await;
      watchers.reap();

      assert!(!watchers.is_watching(&addr(1)));
      assert!(watchers.handles.is_empty());
      assert_eq!(Arc::strong_count(&alive), 1);
   }

   #[tokio::test]
   async fn test_readded_device_has_one_watcher() {
      let alive = Arc::new(());
      let mut watchers = DeviceWatchers::default();

      for _ in 0..3 {
         watchers.insert(addr(1), hold(&alive));
         tokio::time::sleep(Duration::from_millis(5)).await;
         watchers.unwatch(&addr(1));
      }
      watchers.insert(addr(1), hold(&alive));
      watchers.insert(addr(2), hold(&alive));
      tokio::time::sleep(Duration::from_millis(20)).await;
      watchers.reap();

      assert_eq!(watchers.handles.len(), 2);
      assert_eq!(Arc::strong_count(&alive), 3);
   }

   #[tokio::test]
   async fn test_finished_watcher_can_be_replaced() {
      let mut watchers = DeviceWatchers::default();
      watchers.insert(addr(1), async {});
      tokio::time::sleep(Duration::from_millis(20)).await;
      assert!(!watchers.is_watching(&addr(1)));

      watchers.reap();
      assert!(watchers.handles.is_empty());

      let alive = Arc::new(());
      watchers.insert(addr(1), hold(&alive));
      assert!(watchers.is_watching(&addr(1)));
   }

   #[test]
   fn test_classify_device_properties() {
      assert_eq!(
         classify(&DeviceProperty::Connected(true)),
         Some((EventKind::DeviceConnected, None))
      );
      assert_eq!(
         classify(&DeviceProperty::Connected(false)),
         Some((EventKind::DeviceDisconnected, None))
      );
      assert_eq!(
         classify(&DeviceProperty::BatteryPercentage(80)),
         Some((EventKind::BatteryLevelChanged, Some(80)))
      );
      assert_eq!(classify(&DeviceProperty::Rssi(-40)), None);
      assert_eq!(classify(&DeviceProperty::Trusted(true)), None);
   }
}
