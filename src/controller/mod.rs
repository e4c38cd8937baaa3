//! # Controller Module
//!
//! Optional PS5 DualSense input as an alternative to the console.
//!
//! This module handles:
//! - DualSense detection and connection via evdev
//! - Turning button and D-pad events into press/release edges
//! - A blocking reader thread that hands edges to the session

pub mod mapper;
pub mod ps5;

use std::thread::{self, JoinHandle};
use tracing::{info, warn};

use crate::error::Result;
use mapper::{ButtonEvent, ButtonMapper};
use ps5::DualSenseController;

/// Read `controller` on a dedicated thread
///
/// `on_edge` is called for every button edge and returns `false` to stop the
/// thread, e.g. when the session is gone. evdev reads block, so this cannot
/// live on the async runtime.
pub fn spawn_reader<F>(mut controller: DualSenseController, mut on_edge: F) -> Result<JoinHandle<()>>
where
    F: FnMut(ButtonEvent) -> bool + Send + 'static,
{
    let handle = thread::Builder::new()
        .name("gamepad".to_string())
        .spawn(move || {
            let mut mapper = ButtonMapper::new();
            info!("Reading gamepad input from {}", controller.device_path());

            loop {
                let events = match controller.fetch_events() {
                    Ok(events) => events.collect::<Vec<_>>(),
                    Err(e) => {
                        warn!("Gamepad input stopped: {}", e);
                        return;
                    }
                };

                for event in events {
                    for edge in mapper.process_event(&event) {
                        if !on_edge(edge) {
                            return;
                        }
                    }
                }
            }
        })?;
    Ok(handle)
}
