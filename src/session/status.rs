//! Link status line.

use std::fmt;

use crate::link::ConnectError;

/// What the status line shows
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkStatus {
    Searching,
    /// Open in progress; carries the device's display name
    Connecting(String),
    Connected(String),
    ConnectFailed,
    Disconnected,
    NoDeviceFound,
    PermissionDenied,
    BluetoothUnsupported,
    BluetoothDisabled,
}

impl From<ConnectError> for LinkStatus {
    fn from(error: ConnectError) -> Self {
        match error {
            ConnectError::PermissionDenied => Self::PermissionDenied,
            ConnectError::BluetoothUnavailable => Self::BluetoothUnsupported,
            ConnectError::BluetoothDisabled => Self::BluetoothDisabled,
            ConnectError::Unreachable => Self::ConnectFailed,
        }
    }
}

impl fmt::Display for LinkStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Searching => f.write_str("Searching..."),
            Self::Connecting(name) => write!(f, "Connecting {}", name),
            Self::Connected(name) => write!(f, "Connected: {}", name),
            Self::ConnectFailed => f.write_str("Connect failed"),
            Self::Disconnected => f.write_str("Disconnected"),
            Self::NoDeviceFound => f.write_str("No device found"),
            Self::PermissionDenied => f.write_str("Permission denied"),
            Self::BluetoothUnsupported => f.write_str("Bluetooth not supported"),
            Self::BluetoothDisabled => f.write_str("Enable Bluetooth"),
        }
    }
}
