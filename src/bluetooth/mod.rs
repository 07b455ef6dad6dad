//! Bluetooth access layer.
//!
//! This module wraps BlueZ: the connected-device query used at startup,
//! the two event sources the reconciler can subscribe to, and the device
//! descriptors and payloads they produce.

pub mod descriptor;
pub mod manager;
pub mod monitor;
pub mod payload;
pub mod profile;
pub mod signals;
pub mod source;
