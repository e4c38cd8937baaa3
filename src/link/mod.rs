//! # Robot Link Module
//!
//! Owns the byte stream to the robot.
//!
//! This module handles:
//! - Opening the serial profile through a [`Transport`]
//! - One reader task per open connection, framing lines as they arrive
//! - Writing and flushing command tokens
//! - Idempotent teardown that swallows errors from in-flight reads

pub mod serial;
pub mod transport;

#[cfg(feature = "bluez")]
pub mod rfcomm;

pub use transport::{DeviceInfo, LinkStream, Transport};

use std::sync::Arc;
use tokio::io::{AsyncReadExt, AsyncWriteExt, ReadHalf, WriteHalf};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::config::{LinkConfig, TransportKind};
use crate::error::{BridgeError, Result};
use crate::protocol::framer::LineFramer;

/// Well-known Serial Port Profile service UUID
pub const SPP_UUID: &str = "00001101-0000-1000-8000-00805F9B34FB";

/// Size of a single read from the link
const READ_BUFFER_SIZE: usize = 256;

/// Events posted by a connection's reader task
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkEvent {
    /// A complete telemetry line
    Line { generation: u64, line: String },
    /// End of stream or read error; the connection is dead
    Lost { generation: u64, reason: String },
}

/// One open link to the robot
///
/// The writer is used from the owning context; the reader runs as its own
/// task and only posts [`LinkEvent`]s tagged with this connection's
/// generation so stale events can be told apart after a reconnect.
pub struct Connection {
    address: String,
    generation: u64,
    writer: Option<WriteHalf<LinkStream>>,
    reader: Option<JoinHandle<()>>,
}

impl std::fmt::Debug for Connection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection")
            .field("address", &self.address)
            .field("generation", &self.generation)
            .field("open", &self.is_open())
            .finish_non_exhaustive()
    }
}

impl Connection {
    /// Take ownership of an opened stream and start its reader task
    ///
    /// # Arguments
    ///
    /// * `address` - Address the stream was opened with
    /// * `generation` - Tag attached to every event of this connection
    /// * `stream` - Stream returned by [`Transport::open`]
    /// * `max_line_length` - Bound on a partial telemetry line
    /// * `events` - Queue of the owning context
    pub fn spawn<E>(
        address: impl Into<String>,
        generation: u64,
        stream: LinkStream,
        max_line_length: usize,
        events: mpsc::UnboundedSender<E>,
    ) -> Self
    where
        E: From<LinkEvent> + Send + 'static,
    {
        let (reader, writer) = tokio::io::split(stream);
        let framer = LineFramer::with_max_line_length(max_line_length);
        let reader = tokio::spawn(read_loop(reader, generation, framer, events));

        Self {
            address: address.into(),
            generation,
            writer: Some(writer),
            reader: Some(reader),
        }
    }

    pub fn address(&self) -> &str {
        &self.address
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn is_open(&self) -> bool {
        self.writer.is_some()
    }

    /// Write a command and flush it
    ///
    /// # Errors
    ///
    /// Returns `Io` if the write or flush fails, or `NotConnected` kind if the
    /// connection was already closed.
    pub async fn write_command(&mut self, bytes: &[u8]) -> Result<()> {
        let writer = self.writer.as_mut().ok_or_else(|| {
            BridgeError::Io(std::io::Error::new(
                std::io::ErrorKind::NotConnected,
                "connection closed",
            ))
        })?;

        writer.write_all(bytes).await?;
        writer.flush().await?;
        Ok(())
    }

    /// Stop the reader and release the stream
    ///
    /// Safe to call more than once.
    pub async fn close(&mut self) {
        if let Some(reader) = self.reader.take() {
            reader.abort();
        }
        if let Some(mut writer) = self.writer.take() {
            if let Err(e) = writer.shutdown().await {
                debug!("Ignoring error while closing {}: {}", self.address, e);
            }
        }
    }
}

impl Drop for Connection {
    fn drop(&mut self) {
        if let Some(reader) = self.reader.take() {
            reader.abort();
        }
    }
}

async fn read_loop<E>(
    mut reader: ReadHalf<LinkStream>,
    generation: u64,
    mut framer: LineFramer,
    events: mpsc::UnboundedSender<E>,
) where
    E: From<LinkEvent> + Send + 'static,
{
    let mut buffer = [0u8; READ_BUFFER_SIZE];

    let reason = loop {
        match reader.read(&mut buffer).await {
            Ok(0) => break "end of stream".to_string(),
            Ok(n) => {
                for line in framer.feed(&buffer[..n]) {
                    if events.send(LinkEvent::Line { generation, line }.into()).is_err() {
                        // Owner is gone
                        return;
                    }
                }
            }
            Err(e) => {
                warn!("Read from robot link failed: {}", e);
                break e.to_string();
            }
        }
    };

    let _ = events.send(LinkEvent::Lost { generation, reason }.into());
}

/// Why an open attempt failed, as far as the session cares
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectError {
    /// The OS refused access to the device
    PermissionDenied,
    /// No Bluetooth support on this host
    BluetoothUnavailable,
    /// Adapter present but powered off
    BluetoothDisabled,
    /// Robot out of range, switched off, or any other failure
    Unreachable,
}

impl ConnectError {
    pub fn classify(error: &BridgeError) -> Self {
        match error {
            BridgeError::PermissionDenied(_) => Self::PermissionDenied,
            BridgeError::Io(e) if e.kind() == std::io::ErrorKind::PermissionDenied => {
                Self::PermissionDenied
            }
            BridgeError::BluetoothUnavailable(_) => Self::BluetoothUnavailable,
            BridgeError::BluetoothDisabled => Self::BluetoothDisabled,
            _ => Self::Unreachable,
        }
    }

    /// Whether trying the same address again later can succeed
    pub fn should_retry(&self) -> bool {
        matches!(self, Self::Unreachable)
    }
}

/// Build the transport selected in the configuration
///
/// # Errors
///
/// Returns `BluetoothUnavailable` when RFCOMM is requested in a build
/// without the `bluez` feature.
pub fn build_transport(config: &LinkConfig) -> Result<Arc<dyn Transport>> {
    match config.transport {
        TransportKind::Serial => Ok(Arc::new(serial::SerialTransport::new(
            config.baud_rate,
            config.candidates.clone(),
        ))),
        #[cfg(feature = "bluez")]
        TransportKind::Rfcomm => Ok(Arc::new(rfcomm::RfcommTransport::new(config.rfcomm_channel))),
        #[cfg(not(feature = "bluez"))]
        TransportKind::Rfcomm => Err(BridgeError::BluetoothUnavailable(
            "built without the bluez feature".to_string(),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::AsyncReadExt;

    fn open_pair() -> (Connection, tokio::io::DuplexStream, mpsc::UnboundedReceiver<LinkEvent>) {
        let (ours, theirs) = tokio::io::duplex(1024);
        let (tx, rx) = mpsc::unbounded_channel();
        let connection = Connection::spawn("/dev/rfcomm0", 7, Box::new(ours), 1024, tx);
        (connection, theirs, rx)
    }

    #[test]
    fn test_spp_uuid() {
        assert_eq!(SPP_UUID, "00001101-0000-1000-8000-00805F9B34FB");
    }

    #[tokio::test]
    async fn test_reader_posts_lines_with_generation() {
        let (_connection, mut robot, mut events) = open_pair();

        robot.write_all(b"s:30:45\nm:5:200").await.unwrap();
        robot.write_all(b":180:40:12\n").await.unwrap();

        assert_eq!(
            events.recv().await.unwrap(),
            LinkEvent::Line { generation: 7, line: "s:30:45".to_string() }
        );
        assert_eq!(
            events.recv().await.unwrap(),
            LinkEvent::Line { generation: 7, line: "m:5:200:180:40:12".to_string() }
        );
    }

    #[tokio::test]
    async fn test_end_of_stream_reports_lost() {
        let (_connection, robot, mut events) = open_pair();
        drop(robot);

        match events.recv().await.unwrap() {
            LinkEvent::Lost { generation, .. } => assert_eq!(generation, 7),
            other => panic!("Expected Lost, got: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_write_command_reaches_robot() {
        let (mut connection, mut robot, _events) = open_pair();

        connection.write_command(b"K").await.unwrap();
        connection.write_command(b"AU\n").await.unwrap();

        let mut received = [0u8; 4];
        robot.read_exact(&mut received).await.unwrap();
        assert_eq!(&received, b"KAU\n");
    }

    #[tokio::test]
    async fn test_scripted_robot_exchange() {
        // Telemetry arrives first, then the robot expects one command
        let robot = tokio_test::io::Builder::new()
            .read(b"a:1:2:3:4:5:6:7:8\n")
            .write(b"I")
            .build();
        let (tx, mut events) = mpsc::unbounded_channel::<LinkEvent>();
        let mut connection = Connection::spawn("/dev/rfcomm0", 3, Box::new(robot), 1024, tx);

        assert_eq!(
            events.recv().await.unwrap(),
            LinkEvent::Line { generation: 3, line: "a:1:2:3:4:5:6:7:8".to_string() }
        );
        connection.write_command(b"I").await.unwrap();
    }

    #[tokio::test]
    async fn test_close_is_idempotent_and_blocks_writes() {
        let (mut connection, _robot, _events) = open_pair();
        assert!(connection.is_open());

        connection.close().await;
        connection.close().await;

        assert!(!connection.is_open());
        assert!(connection.write_command(b"K").await.is_err());
    }

    #[tokio::test]
    async fn test_close_does_not_report_lost() {
        let (mut connection, _robot, mut events) = open_pair();
        connection.close().await;
        drop(connection);

        // The reader was aborted, so the queue just closes
        assert!(events.recv().await.is_none());
    }

    #[test]
    fn test_connect_error_classification() {
        let denied = BridgeError::PermissionDenied("/dev/rfcomm0".to_string());
        assert_eq!(ConnectError::classify(&denied), ConnectError::PermissionDenied);
        assert!(!ConnectError::classify(&denied).should_retry());

        let io_denied = BridgeError::Io(std::io::Error::from(std::io::ErrorKind::PermissionDenied));
        assert_eq!(ConnectError::classify(&io_denied), ConnectError::PermissionDenied);

        let missing = BridgeError::DeviceNotFound("/dev/rfcomm0".to_string());
        assert_eq!(ConnectError::classify(&missing), ConnectError::Unreachable);
        assert!(ConnectError::classify(&missing).should_retry());

        assert_eq!(
            ConnectError::classify(&BridgeError::BluetoothDisabled),
            ConnectError::BluetoothDisabled
        );
        assert!(!ConnectError::BluetoothUnavailable.should_retry());
    }

    #[cfg(not(feature = "bluez"))]
    #[test]
    fn test_rfcomm_requires_feature() {
        let config = LinkConfig {
            transport: TransportKind::Rfcomm,
            ..LinkConfig::default()
        };
        assert!(matches!(
            build_transport(&config),
            Err(BridgeError::BluetoothUnavailable(_))
        ));
    }
}
