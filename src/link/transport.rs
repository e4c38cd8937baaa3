//! Trait abstraction for the robot link to enable testing

use async_trait::async_trait;
use std::fmt;
use tokio::io::{AsyncRead, AsyncWrite};

use crate::error::Result;

/// Byte stream to the robot
pub trait LinkIo: AsyncRead + AsyncWrite + Send + Unpin {}

impl<T: AsyncRead + AsyncWrite + Send + Unpin> LinkIo for T {}

/// Boxed byte stream returned by [`Transport::open`]
pub type LinkStream = Box<dyn LinkIo>;

/// A device the transport can connect to
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceInfo {
    pub address: String,
    pub name: Option<String>,
}

impl DeviceInfo {
    pub fn new(address: impl Into<String>, name: Option<String>) -> Self {
        Self {
            address: address.into(),
            name,
        }
    }

    /// Human-readable name, falling back to the address
    pub fn label(&self) -> &str {
        match self.name.as_deref() {
            Some(name) if !name.is_empty() => name,
            _ => &self.address,
        }
    }
}

impl fmt::Display for DeviceInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.label(), self.address)
    }
}

/// Opens byte streams to the robot
#[async_trait]
pub trait Transport: Send + Sync {
    /// Open a stream to `address`
    ///
    /// # Errors
    ///
    /// - `PermissionDenied`: the OS refused access, no retry makes sense
    /// - `BluetoothUnavailable` / `BluetoothDisabled`: adapter problems
    /// - anything else: the robot is unreachable for now
    async fn open(&self, address: &str) -> Result<LinkStream>;

    /// List devices that can be passed to [`Transport::open`]
    async fn discover(&self) -> Result<Vec<DeviceInfo>>;
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_label_falls_back_to_address() {
        let named = DeviceInfo::new("00:11:22:33:44:55", Some("ArmCar".to_string()));
        assert_eq!(named.label(), "ArmCar");
        assert_eq!(named.to_string(), "ArmCar (00:11:22:33:44:55)");

        let unnamed = DeviceInfo::new("/dev/rfcomm0", None);
        assert_eq!(unnamed.label(), "/dev/rfcomm0");

        let blank = DeviceInfo::new("/dev/rfcomm1", Some(String::new()));
        assert_eq!(blank.label(), "/dev/rfcomm1");
    }
}
