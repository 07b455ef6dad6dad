//! D-Bus interface for the Jib battery service.
//!
//! Exposes the tracked state and its presentation as `org.jibd.Battery`
//! on the session bus.

use std::process::Stdio;

use log::info;
use tokio::process::Command;
use zbus::{interface, object_server::SignalEmitter};

use crate::{
   state::SharedState,
   view::{StatusView, ViewSettings},
};

pub const BUS_NAME: &str = "org.jibd";
pub const OBJECT_PATH: &str = "/org/jibd/battery";

pub struct BatteryService {
   state: SharedState,
   settings: ViewSettings,
   settings_command: Vec<String>,
}

impl BatteryService {
   pub const fn new(state: SharedState, settings: ViewSettings, settings_command: Vec<String>) -> Self {
      Self {
         state,
         settings,
         settings_command,
      }
   }

   fn view(&self) -> StatusView {
      StatusView::from_state(&self.state.read(), &self.settings)
   }
}

#[interface(name = "org.jibd.Battery")]
impl BatteryService {
   async fn get_state(&self) -> String {
      self.state.read().to_json().to_string()
   }

   async fn get_view(&self) -> String {
      self.view().to_json().to_string()
   }

   /// Opens the desktop's Bluetooth settings; pairing happens there.
   async fn open_bluetooth_settings(&self) -> zbus::fdo::Result<bool> {
      let Some((program, args)) = self.settings_command.split_first() else {
         return Err(zbus::fdo::Error::Failed(
            "No settings command configured".into(),
         ));
      };

      Command::new(program)
         .args(args)
         .stdin(Stdio::null())
         .stdout(Stdio::null())
         .stderr(Stdio::null())
         .spawn()
         .map_err(|e| zbus::fdo::Error::Failed(format!("Failed to launch {program}: {e}")))?;

      info!("Launched Bluetooth settings: {program}");
      Ok(true)
   }

   // Signals
   #[zbus(signal)]
   pub async fn state_changed(emitter: &SignalEmitter<'_>, state: &str) -> zbus::Result<()>;

   #[zbus(signal)]
   pub async fn low_battery(
      emitter: &SignalEmitter<'_>,
      device_name: &str,
      level: u8,
   ) -> zbus::Result<()>;

   // Properties
   #[zbus(property)]
   async fn connected(&self) -> bool {
      self.state.read().connected
   }

   /// Battery percentage, `-1` when unknown.
   #[zbus(property)]
   async fn level(&self) -> i32 {
      self.state.read().level.map_or(-1, i32::from)
   }

   #[zbus(property)]
   async fn device_name(&self) -> String {
      self
         .state
         .read()
         .device_name
         .as_deref()
         .unwrap_or_default()
         .to_string()
   }

   #[zbus(property)]
   async fn status_line(&self) -> String {
      self.view().status_line
   }

   #[zbus(property)]
   async fn connection_line(&self) -> String {
      self.view().connection_line
   }

   #[zbus(property)]
   async fn battery_line(&self) -> String {
      self.view().battery_line
   }

   #[zbus(property)]
   async fn advisory_line(&self) -> String {
      self.view().advisory_line
   }
}
