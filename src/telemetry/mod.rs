//! # Telemetry Relay Module
//!
//! Mirrors robot telemetry to a remote WebSocket listener.
//!
//! This module handles:
//! - Serializing parsed telemetry and link state changes to JSON
//! - A reconnecting WebSocket client with a fixed retry delay
//! - A lifecycle that stops retrying for good after a deliberate shutdown

pub mod lifecycle;
pub mod message;
pub mod relay;

pub use lifecycle::{RelayLifecycle, RelayState};
pub use relay::RelayHandle;
