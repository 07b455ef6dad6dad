//! Event source reading raw BlueZ `PropertiesChanged` signals.
//!
//! This path bypasses `bluer` and hands the reconciler BlueZ property maps
//! as they appear on the wire. The device address comes from the object
//! path, the name from a follow-up `Get` on `org.bluez.Device1`.
//!
//! Signals are read by one task and resolved into events by another, so
//! the filtered signal queue keeps draining while a `Get` is in flight.

use std::{collections::HashMap, str::FromStr};

use bluer::Address;
use futures::stream::{Stream, StreamExt};
use log::{debug, info};
use tokio::sync::mpsc::{self, UnboundedSender};
use zbus::{
   Connection, MatchRule, Message, MessageStream,
   fdo::PropertiesProxy,
   message::Type as MessageType,
   names::InterfaceName,
   zvariant::{OwnedValue, Value},
};

use crate::{
   bluetooth::{
      payload::{EventPayload, KEY_ADDRESS, KEY_NAME, KEY_PERCENTAGE, PropertyMap},
      source::{EventSource, Subscription},
   },
   error::Result,
   event::{BroadcastEvent, EventKind},
};

const BLUEZ_SERVICE: &str = "org.bluez";
const BLUEZ_ROOT: &str = "/org/bluez";
const DEVICE_IFACE: &str = "org.bluez.Device1";
const BATTERY_IFACE: &str = "org.bluez.Battery1";

/// Signals buffered for the reader before the bus connection backs up.
const SIGNAL_QUEUE: usize = 256;

/// Listens for BlueZ property changes on a dedicated system bus connection.
///
/// Releasing a subscription closes the connection, which drops the match
/// rule on the bus side.
pub struct SignalEvents {
   connection: Connection,
}

impl SignalEvents {
   pub async fn system() -> Result<Self> {
      Ok(Self {
         connection: Connection::system().await?,
      })
   }
}

fn match_rule() -> zbus::Result<MatchRule<'static>> {
   Ok(MatchRule::builder()
      .msg_type(MessageType::Signal)
      .sender(BLUEZ_SERVICE)?
      .interface("org.freedesktop.DBus.Properties")?
      .member("PropertiesChanged")?
      .path_namespace(BLUEZ_ROOT)?
      .build())
}

impl EventSource for SignalEvents {
   async fn subscribe(&self) -> Result<Subscription> {
      let stream =
         MessageStream::for_match_rule(match_rule()?, &self.connection, Some(SIGNAL_QUEUE)).await?;
      info!("Listening for BlueZ property changes on the system bus");

      let (tx, mut subscription) = Subscription::channel();
      let (changes_tx, mut changes) = mpsc::unbounded_channel();
      subscription.spawn(forward_changes(stream, changes_tx));

      let mut names = NameLookup::new(self.connection.clone());
      subscription.spawn(async move {
         while let Some(change) = changes.recv().await {
            let name = names.get(&change.path).await;
            let Some(event) = change.into_event(name) else {
               continue;
            };
            if tx.send(event).is_err() {
               break;
            }
         }
      });

      let connection = self.connection.clone();
      subscription.on_release(async move {
         connection.close().await?;
         Ok(())
      });
      Ok(subscription)
   }
}

/// A BlueZ property change worth an event, before the device name is known.
#[derive(Debug, PartialEq)]
struct Change {
   path: String,
   address: Address,
   kind: EventKind,
   level: Option<OwnedValue>,
}

impl Change {
   fn from_message(msg: &Message) -> Option<Self> {
      let header = msg.header();
      let path = header.path()?.as_str();
      let (interface, mut changed, _invalidated): (String, HashMap<String, OwnedValue>, Vec<String>) =
         msg.body().deserialize().ok()?;

      let (kind, level) = classify(&interface, &mut changed)?;
      Some(Self {
         path: path.to_string(),
         address: address_from_path(path)?,
         kind,
         level,
      })
   }

   fn into_event(self, name: Option<OwnedValue>) -> Option<BroadcastEvent> {
      let mut props = PropertyMap::new();
      props.insert(
         KEY_ADDRESS.to_string(),
         OwnedValue::try_from(Value::from(self.address.to_string())).ok()?,
      );
      if let Some(name) = name {
         props.insert(KEY_NAME.to_string(), name);
      }
      if let Some(level) = self.level {
         props.insert(KEY_PERCENTAGE.to_string(), level);
      }
      Some(BroadcastEvent::new(self.kind, EventPayload::Legacy(props)))
   }
}

/// Drains `messages` into `changes` without ever waiting on the bus.
async fn forward_changes<S>(mut messages: S, changes: UnboundedSender<Change>)
where
   S: Stream<Item = zbus::Result<Message>> + Unpin,
{
   while let Some(msg) = messages.next().await {
      let Some(change) = msg.ok().as_ref().and_then(Change::from_message) else {
         continue;
      };
      if changes.send(change).is_err() {
         break;
      }
   }
}

/// Maps a `PropertiesChanged` body to an event kind, taking the battery
/// value out of `changed` when there is one.
fn classify(
   interface: &str,
   changed: &mut HashMap<String, OwnedValue>,
) -> Option<(EventKind, Option<OwnedValue>)> {
   match interface {
      DEVICE_IFACE => match changed.get("Connected").map(|v| &**v) {
         Some(Value::Bool(true)) => Some((EventKind::DeviceConnected, None)),
         Some(Value::Bool(false)) => Some((EventKind::DeviceDisconnected, None)),
         _ => None,
      },
      BATTERY_IFACE => changed
         .remove(KEY_PERCENTAGE)
         .map(|level| (EventKind::BatteryLevelChanged, Some(level))),
      _ => None,
   }
}

/// Reads `Name` off BlueZ device objects, one cached proxy per path.
struct NameLookup {
   connection: Connection,
   proxies: HashMap<String, PropertiesProxy<'static>>,
}

impl NameLookup {
   fn new(connection: Connection) -> Self {
      Self {
         connection,
         proxies: HashMap::new(),
      }
   }

   async fn proxy(&mut self, path: &str) -> Option<&PropertiesProxy<'static>> {
      if !self.proxies.contains_key(path) {
         let proxy = PropertiesProxy::builder(&self.connection)
            .destination(BLUEZ_SERVICE)
            .ok()?
            .path(path.to_string())
            .ok()?
            .build()
            .await
            .ok()?;
         self.proxies.insert(path.to_string(), proxy);
      }
      self.proxies.get(path)
   }

   async fn get(&mut self, path: &str) -> Option<OwnedValue> {
      let proxy = self.proxy(path).await?;
      match proxy
         .get(InterfaceName::from_static_str_unchecked(DEVICE_IFACE), KEY_NAME)
         .await
      {
         Ok(name) => Some(name),
         Err(e) => {
            debug!("No name for {path}: {e}");
            None
         },
      }
   }
}

/// Parses `/org/bluez/hci0/dev_AA_BB_CC_DD_EE_FF` (and anything below it)
/// into the device address.
fn address_from_path(path: &str) -> Option<Address> {
   let segment = path
      .strip_prefix(BLUEZ_ROOT)?
      .split('/')
      .find_map(|s| s.strip_prefix("dev_"))?;
   Address::from_str(&segment.replace('_', ":")).ok()
}
