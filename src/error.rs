//! # Error Types
//!
//! Custom error types for Armlink using `thiserror`.

use thiserror::Error;

/// Main error type for Armlink
#[derive(Debug, Error)]
pub enum BridgeError {
    /// Serial port errors (open, configure)
    #[error("Serial error: {0}")]
    Serial(String),

    /// No robot device could be found at any candidate address
    #[error("No device found (tried: {0})")]
    DeviceNotFound(String),

    /// The OS refused access to the device
    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    /// No usable Bluetooth adapter on this host
    #[error("Bluetooth not supported: {0}")]
    BluetoothUnavailable(String),

    /// The Bluetooth adapter exists but is powered off
    #[error("Bluetooth adapter is powered off")]
    BluetoothDisabled,

    /// Gamepad errors
    #[error("Controller error: {0}")]
    Controller(String),

    /// No supported gamepad connected
    #[error("No supported controller found")]
    ControllerNotFound,

    /// Persisted device store errors
    #[error("Device store error: {0}")]
    Store(String),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(#[from] toml::de::Error),

    /// JSON serialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for Armlink
pub type Result<T> = std::result::Result<T, BridgeError>;
