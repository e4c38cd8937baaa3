//! # Armlink Library
//!
//! Drive a Bluetooth arm + car robot over a serial-profile link.
//!
//! This library holds every piece of the remote: the robot link, the line
//! framer and telemetry parser, held-control auto-repeat, the reconnect
//! policy, and the WebSocket relay that mirrors telemetry to a server.

pub mod command;
pub mod config;
pub mod controller;
pub mod error;
pub mod link;
pub mod protocol;
pub mod reconnect;
pub mod session;
pub mod store;
pub mod telemetry;
