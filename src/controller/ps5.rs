//! # PS5 DualSense Controller
//!
//! Detects and reads a DualSense controller through the Linux evdev
//! interface.
//!
//! The DualSense is identified by:
//! - Vendor ID: 0x054c (Sony)
//! - Product ID: 0x0ce6 (DualSense, both wired and Bluetooth)

use evdev::Device;
use std::path::Path;
use tracing::{debug, info};

use crate::error::{BridgeError, Result};

/// PS5 DualSense vendor ID (Sony)
const DUALSENSE_VENDOR_ID: u16 = 0x054c;

/// PS5 DualSense product ID (wired and Bluetooth)
const DUALSENSE_PRODUCT_ID: u16 = 0x0ce6;

/// Where evdev nodes live
const INPUT_DIR: &str = "/dev/input";

/// An open DualSense controller
pub struct DualSenseController {
    device: Device,
    device_path: String,
}

impl DualSenseController {
    /// Detect and open the first DualSense controller
    ///
    /// Scans `/dev/input/event*` in sorted order and matches vendor and
    /// product IDs.
    ///
    /// # Errors
    ///
    /// - `ControllerNotFound`: no DualSense is connected
    /// - `Controller`: `/dev/input` is missing or unreadable
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use armlink::controller::ps5::DualSenseController;
    ///
    /// let controller = DualSenseController::open()?;
    /// println!("Connected to controller at: {}", controller.device_path());
    /// # Ok::<(), Box<dyn std::error::Error>>(())
    /// ```
    pub fn open() -> Result<Self> {
        let input_dir = Path::new(INPUT_DIR);

        if !input_dir.exists() {
            return Err(BridgeError::Controller(format!(
                "{} directory not found",
                INPUT_DIR
            )));
        }

        let mut entries: Vec<_> = std::fs::read_dir(input_dir)
            .map_err(|e| BridgeError::Controller(format!("Failed to read {}: {}", INPUT_DIR, e)))?
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(|e| BridgeError::Controller(format!("Failed to read directory entry: {}", e)))?;

        // Deterministic pick when several controllers are connected
        entries.sort_by_key(|entry| entry.path());

        for entry in entries {
            let path = entry.path();

            let is_event_node = path
                .file_name()
                .map(|name| name.to_string_lossy().starts_with("event"))
                .unwrap_or(false);
            if !is_event_node {
                continue;
            }

            match Device::open(&path) {
                Ok(device) => {
                    let id = device.input_id();
                    debug!(
                        "Found input device: {} (vendor: 0x{:04x}, product: 0x{:04x})",
                        path.display(),
                        id.vendor(),
                        id.product()
                    );

                    if id.vendor() == DUALSENSE_VENDOR_ID && id.product() == DUALSENSE_PRODUCT_ID {
                        let device_path = path.to_string_lossy().to_string();
                        info!("Found PS5 DualSense controller at: {}", device_path);
                        return Ok(Self {
                            device,
                            device_path,
                        });
                    }
                }
                Err(e) => {
                    // Permission denied or other errors - skip device
                    debug!("Could not open {}: {}", path.display(), e);
                }
            }
        }

        Err(BridgeError::ControllerNotFound)
    }

    /// Open a specific evdev node without checking its IDs
    ///
    /// Used when `gamepad.device_path` is configured, so other pads that
    /// speak the same button codes can be used.
    pub fn open_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let device = Device::open(path).map_err(|e| {
            BridgeError::Controller(format!("Failed to open {}: {}", path.display(), e))
        })?;
        let device_path = path.to_string_lossy().to_string();
        info!(
            "Opened controller {} at: {}",
            device.name().unwrap_or("unknown"),
            device_path
        );
        Ok(Self {
            device,
            device_path,
        })
    }

    /// Open `device_path`, or detect a DualSense when it is empty
    pub fn open_configured(device_path: &str) -> Result<Self> {
        if device_path.is_empty() {
            Self::open()
        } else {
            Self::open_path(device_path)
        }
    }

    /// The `/dev/input/eventX` path this controller was opened from
    pub fn device_path(&self) -> &str {
        &self.device_path
    }

    /// Fetch available input events; blocks until at least one arrives
    ///
    /// # Errors
    ///
    /// Returns `Controller` if reading fails, e.g. the controller was
    /// disconnected.
    pub fn fetch_events(&mut self) -> Result<impl Iterator<Item = evdev::InputEvent> + '_> {
        self.device
            .fetch_events()
            .map_err(|e| BridgeError::Controller(format!("Failed to fetch events: {}", e)))
    }

    pub fn name(&self) -> Option<&str> {
        self.device.name()
    }
}
