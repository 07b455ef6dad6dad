//! Folds Bluetooth notifications into the tracked device state.

use std::future::Future;

use log::{debug, info, warn};

use crate::{
   bluetooth::{descriptor::TargetMatcher, source::Subscription},
   event::{BroadcastEvent, EventKind, StateSender},
   state::DeviceBatteryState,
};

/// Computes the state after `event`.
///
/// Returns `None` when the event is ignored (no device, foreign device,
/// unusable battery level) or leaves the state as it was.
pub fn apply(
   state: &DeviceBatteryState,
   event: &BroadcastEvent,
   matcher: &TargetMatcher,
) -> Option<DeviceBatteryState> {
   let descriptor = event.payload.descriptor()?;
   let name = matcher.match_descriptor(&descriptor)?;

   let next = match event.kind {
      EventKind::BatteryLevelChanged => {
         let level = u8::try_from(event.payload.battery_level())
            .ok()
            .filter(|level| *level <= 100)?;
         DeviceBatteryState {
            connected: true,
            level: Some(level),
            device_name: Some(name.into()),
         }
      },
      EventKind::DeviceConnected => DeviceBatteryState {
         connected: true,
         level: state.level,
         device_name: Some(name.into()),
      },
      EventKind::DeviceDisconnected => DeviceBatteryState::default(),
   };

   (next != *state).then_some(next)
}

/// Owns the device state for the lifetime of a subscription.
pub struct Reconciler {
   matcher: TargetMatcher,
   state: DeviceBatteryState,
   sink: StateSender,
}

impl Reconciler {
   pub fn new(matcher: TargetMatcher, initial: DeviceBatteryState, sink: StateSender) -> Self {
      Self {
         matcher,
         state: initial,
         sink,
      }
   }

   /// Applies one event, publishing the new state if it changed.
   pub fn handle(&mut self, event: &BroadcastEvent) -> bool {
      match apply(&self.state, event, &self.matcher) {
         Some(next) => {
            if next.is_empty() {
               info!("{}: target device gone, state cleared", event.kind);
            } else {
               info!("{}: {}", event.kind, next.to_json());
            }
            self.state = next;
            self.sink.publish(&self.state);
            true
         },
         None => {
            debug!("Ignoring {} event", event.kind);
            false
         },
      }
   }

   /// Folds events until `shutdown` resolves, then releases the subscription
   /// and returns the final state.
   ///
   /// If the subscription runs dry first, the last state is kept as is and
   /// `run` still waits for `shutdown`.
   pub async fn run(
      mut self,
      mut subscription: Subscription,
      shutdown: impl Future<Output = ()>,
   ) -> DeviceBatteryState {
      tokio::pin!(shutdown);

      let ended = loop {
         tokio::select! {
            () = &mut shutdown => break false,
            event = subscription.next() => {
               let Some(event) = event else {
                  break true;
               };
               self.handle(&event);
            }
         }
      };

      if ended {
         warn!("Event subscription ended, holding last state until shutdown");
         shutdown.await;
      }

      subscription.release().await;
      self.state
   }
}
