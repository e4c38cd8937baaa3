//! # BlueZ RFCOMM transport
//!
//! Connects an RFCOMM socket straight to the robot's MAC address, without a
//! bound tty. Only built with the `bluez` feature.

use async_trait::async_trait;
use bluer::rfcomm::{SocketAddr, Stream};
use bluer::{Address, Session};
use tracing::{debug, info, warn};

use super::transport::{DeviceInfo, LinkStream, Transport};
use crate::error::{BridgeError, Result};

/// RFCOMM transport through the BlueZ daemon
#[derive(Debug, Clone)]
pub struct RfcommTransport {
    channel: u8,
}

impl RfcommTransport {
    /// Create a transport connecting on `channel` (the SPP service channel)
    pub fn new(channel: u8) -> Self {
        Self { channel }
    }

    async fn adapter() -> Result<bluer::Adapter> {
        let session = Session::new()
            .await
            .map_err(|e| BridgeError::BluetoothUnavailable(e.to_string()))?;
        let adapter = session
            .default_adapter()
            .await
            .map_err(|e| BridgeError::BluetoothUnavailable(e.to_string()))?;

        let powered = adapter
            .is_powered()
            .await
            .map_err(|e| BridgeError::BluetoothUnavailable(e.to_string()))?;
        if !powered {
            return Err(BridgeError::BluetoothDisabled);
        }
        Ok(adapter)
    }
}

#[async_trait]
impl Transport for RfcommTransport {
    async fn open(&self, address: &str) -> Result<LinkStream> {
        let addr: Address = address
            .parse()
            .map_err(|_| BridgeError::DeviceNotFound(format!("invalid address {}", address)))?;

        // Fail early with a clear status when the adapter is missing or off
        Self::adapter().await?;

        debug!("Connecting RFCOMM {} channel {}", addr, self.channel);
        let stream = Stream::connect(SocketAddr::new(addr, self.channel))
            .await
            .map_err(|e| match e.kind() {
                std::io::ErrorKind::PermissionDenied => {
                    BridgeError::PermissionDenied(address.to_string())
                }
                _ => BridgeError::Io(e),
            })?;

        info!("RFCOMM link up to {}", addr);
        Ok(Box::new(stream))
    }

    async fn discover(&self) -> Result<Vec<DeviceInfo>> {
        let adapter = Self::adapter().await?;
        let addresses = adapter
            .device_addresses()
            .await
            .map_err(|e| BridgeError::BluetoothUnavailable(e.to_string()))?;

        let mut devices = Vec::new();
        for addr in addresses {
            let device = match adapter.device(addr) {
                Ok(device) => device,
                Err(e) => {
                    warn!("Skipping device {}: {}", addr, e);
                    continue;
                }
            };
            match device.is_paired().await {
                Ok(true) => {}
                Ok(false) => continue,
                Err(e) => {
                    warn!("Skipping device {}: {}", addr, e);
                    continue;
                }
            }
            let name = device.name().await.ok().flatten();
            devices.push(DeviceInfo::new(addr.to_string(), name));
        }
        Ok(devices)
    }
}
