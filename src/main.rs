//! Jib earbuds battery service
//!
//! This service watches BlueZ for the Jib earbuds, keeps their connection
//! state and battery level in memory, and publishes both on the session
//! D-Bus for panel widgets and scripts to display.

use std::{sync::Arc, time::Duration};

use crossbeam::queue::SegQueue;
use log::{info, warn};
use tokio::{signal, sync::Notify, time};
use zbus::{Connection, connection, object_server::InterfaceRef};

use bluetooth::{
   descriptor::TargetMatcher,
   manager::BluezManager,
   monitor::BluerEvents,
   signals::SignalEvents,
   source::{EventSource, Subscription},
};
use config::{Config, EventSourceKind};
use dbus::{BUS_NAME, BatteryService, OBJECT_PATH};
use event::StateSink;
use reconciler::Reconciler;
use state::{DeviceBatteryState, SharedState};
use view::{StatusView, ViewSettings};

mod bluetooth;
mod config;
mod dbus;
mod error;
mod event;
mod prober;
mod reconciler;
mod state;
mod view;

use crate::{
   dbus::BatteryServiceSignals,
   error::{JibError, Result},
};

#[tokio::main]
async fn main() -> Result<()> {
   env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

   info!("Starting jibd...");

   let config = Config::load()?;
   info!(
      "Tracking devices matching {:?} via {} events",
      config.target_pattern, config.event_source
   );

   let matcher = TargetMatcher::new(&config.target_pattern);
   let settings = ViewSettings::from_config(&config);
   let state = SharedState::default();
   let processor = EventProcessor::new(state.clone(), settings.clone());

   let service = BatteryService::new(state, settings, config.settings_command.clone());
   let connection = connection::Builder::session()?
      .name(BUS_NAME)?
      .serve_at(OBJECT_PATH, service)?
      .build()
      .await?;

   info!("jibd D-Bus service started at {BUS_NAME}");

   processor.clone().spawn_dispatcher(connection).await?;

   let manager = match BluezManager::new().await {
      Ok(manager) => Some(manager),
      Err(e) => {
         warn!("Bluetooth unavailable: {e}");
         None
      },
   };

   // Subscribe before probing so nothing between the two is missed.
   let subscription = subscribe(&config, manager.as_ref()).await;

   let initial = prober::probe(manager.as_ref(), &matcher).await;
   processor.publish(&initial);

   let reconciler = Reconciler::new(matcher, initial, processor.clone());
   match subscription {
      Ok(subscription) => {
         reconciler
            .run(subscription, async {
               if let Err(e) = signal::ctrl_c().await {
                  warn!("Failed to wait for shutdown signal: {e}");
               }
            })
            .await;
      },
      Err(e) => {
         warn!("Could not subscribe to Bluetooth events: {e}");
         signal::ctrl_c().await?;
      },
   }

   info!("Shutting down jibd...");

   Ok(())
}

async fn subscribe(config: &Config, manager: Option<&BluezManager>) -> Result<Subscription> {
   match config.event_source {
      EventSourceKind::Bluer => {
         let manager = manager.ok_or(JibError::AdapterNotFound)?;
         BluerEvents::new(manager.session().clone()).subscribe().await
      },
      EventSourceKind::Dbus => SignalEvents::system().await?.subscribe().await,
   }
}

struct EventProcessor {
   state: SharedState,
   settings: ViewSettings,
   queue: SegQueue<DeviceBatteryState>,
   notifier: Notify,
}

impl EventProcessor {
   fn new(state: SharedState, settings: ViewSettings) -> Arc<Self> {
      Arc::new(Self {
         state,
         settings,
         queue: SegQueue::new(),
         notifier: Notify::new(),
      })
   }
}

impl EventProcessor {
   async fn recv(self: &Arc<Self>) -> Option<DeviceBatteryState> {
      loop {
         if let Some(state) = self.queue.pop() {
            return Some(state);
         }
         let notify = self.notifier.notified();
         if let Some(state) = self.queue.pop() {
            return Some(state);
         }
         if Arc::strong_count(self) == 1 {
            return None;
         }
         let _ = time::timeout(Duration::from_secs(1), notify).await;
      }
   }

   async fn dispatch(
      &self,
      iface: &InterfaceRef<BatteryService>,
      state: &DeviceBatteryState,
      view: &StatusView,
      became_low: bool,
   ) -> Result<()> {
      iface.state_changed(&state.to_json().to_string()).await?;

      if became_low && let Some(level) = state.level {
         iface
            .low_battery(state.device_name.as_deref().unwrap_or_default(), level)
            .await?;
      }

      let service = iface.get().await;
      let emitter = iface.signal_emitter();
      service.connected_changed(emitter).await?;
      service.level_changed(emitter).await?;
      service.device_name_changed(emitter).await?;
      service.status_line_changed(emitter).await?;
      service.connection_line_changed(emitter).await?;
      service.battery_line_changed(emitter).await?;
      service.advisory_line_changed(emitter).await?;

      info!(
         "{} | {} | {}",
         view.connection_line, view.battery_line, view.advisory_line
      );
      Ok(())
   }

   async fn spawn_dispatcher(self: Arc<Self>, connection: Connection) -> Result<()> {
      let iface = connection
         .object_server()
         .interface::<_, BatteryService>(OBJECT_PATH)
         .await?;
      tokio::spawn(async move {
         let mut was_low = false;
         while let Some(state) = self.recv().await {
            let view = StatusView::from_state(&state, &self.settings);
            let became_low = view.became_low(was_low);
            was_low = view.low_battery;
            if let Err(e) = self.dispatch(&iface, &state, &view, became_low).await {
               warn!("Error dispatching state update: {e}");
            }
         }
      });

      Ok(())
   }
}

impl StateSink for EventProcessor {
   fn publish(&self, state: &DeviceBatteryState) {
      *self.state.write() = state.clone();
      self.queue.push(state.clone());
      self.notifier.notify_waiters();
   }
}
