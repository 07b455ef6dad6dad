//! Event types flowing into and out of the reconciler.
//!
//! Inbound, the Bluetooth stack delivers [`BroadcastEvent`]s. Outbound, the
//! reconciler hands every changed state snapshot to a [`StateSink`].

use std::sync::Arc;

use crate::{bluetooth::payload::EventPayload, state::DeviceBatteryState};

/// The three notification kinds the reconciler listens for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::Display)]
pub enum EventKind {
   BatteryLevelChanged,
   DeviceConnected,
   DeviceDisconnected,
}

/// A notification from the Bluetooth stack.
#[derive(Debug, PartialEq)]
pub struct BroadcastEvent {
   pub kind: EventKind,
   pub payload: EventPayload,
}

impl BroadcastEvent {
   pub const fn new(kind: EventKind, payload: EventPayload) -> Self {
      Self { kind, payload }
   }
}

/// Trait for receiving state updates.
pub trait StateSink: Send + Sync {
   /// Publishes a new snapshot of the tracked device state.
   fn publish(&self, state: &DeviceBatteryState);
}

/// Type alias for a thread-safe state sink.
pub type StateSender = Arc<dyn StateSink>;
