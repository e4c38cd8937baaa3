//! # Telemetry Relay
//!
//! Best-effort WebSocket client that mirrors telemetry to a remote server.
//!
//! The relay runs as its own task with its own reconnect loop; nothing that
//! happens here touches the robot link. Messages published while the socket
//! is down are dropped. A message that cannot be queued counts as a failed
//! send: the client closes the socket and goes through its retry delay.

use futures::{SinkExt, StreamExt};
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, info, warn};

use super::lifecycle::RelayLifecycle;
use crate::config::RelayConfig;

/// How long `shutdown` waits for the close handshake
const SHUTDOWN_GRACE: Duration = Duration::from_secs(1);

/// Sending side of the relay, owned by the session
#[derive(Debug)]
pub struct RelayHandle {
    outbound: mpsc::Sender<String>,
    /// Bumped for every message the queue had no room for
    overflow: watch::Sender<u64>,
    shutdown: watch::Sender<bool>,
    task: Option<JoinHandle<()>>,
}

impl RelayHandle {
    /// Start the relay client task
    ///
    /// Must be called from within a tokio runtime.
    pub fn spawn(config: &RelayConfig) -> Self {
        let (mut handle, outbound, shutdown) = Self::channel(config.queue_capacity);
        let client = RelayClient {
            url: config.url.clone(),
            lifecycle: RelayLifecycle::new(Duration::from_millis(config.reconnect_delay_ms)),
            outbound,
            overflow: handle.overflow.subscribe(),
            shutdown,
        };
        handle.task = Some(tokio::spawn(client.run()));
        handle
    }

    /// A handle with no client task attached
    ///
    /// Published messages land in the returned receiver.
    pub fn channel(capacity: usize) -> (Self, mpsc::Receiver<String>, watch::Receiver<bool>) {
        let (outbound, outbound_rx) = mpsc::channel(capacity);
        let (overflow, _) = watch::channel(0);
        let (shutdown, shutdown_rx) = watch::channel(false);
        let handle = Self {
            outbound,
            overflow,
            shutdown,
            task: None,
        };
        (handle, outbound_rx, shutdown_rx)
    }

    /// Queue a JSON message; returns `false` if it was dropped
    ///
    /// A full queue also tells the client to cycle its socket.
    pub fn publish(&self, text: String) -> bool {
        match self.outbound.try_send(text) {
            Ok(()) => true,
            Err(mpsc::error::TrySendError::Full(_)) => {
                warn!("Relay queue full, dropping telemetry message");
                self.overflow.send_modify(|dropped| *dropped += 1);
                false
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                debug!("Relay stopped, dropping telemetry message");
                false
            }
        }
    }

    /// Disable reconnects and close the socket
    pub async fn shutdown(mut self) {
        let _ = self.shutdown.send(true);
        if let Some(task) = self.task.take() {
            if tokio::time::timeout(SHUTDOWN_GRACE, task).await.is_err() {
                debug!("Relay task did not stop within {:?}", SHUTDOWN_GRACE);
            }
        }
    }
}

enum PumpEnd {
    Shutdown,
    Lost,
}

struct RelayClient {
    url: String,
    lifecycle: RelayLifecycle,
    outbound: mpsc::Receiver<String>,
    overflow: watch::Receiver<u64>,
    shutdown: watch::Receiver<bool>,
}

/// Resolves once shutdown was requested or every handle is gone
async fn shutdown_requested(shutdown: &mut watch::Receiver<bool>) {
    loop {
        if *shutdown.borrow() {
            return;
        }
        if shutdown.changed().await.is_err() {
            return;
        }
    }
}

impl RelayClient {
    async fn run(mut self) {
        while self.lifecycle.begin_connect() {
            debug!("Connecting telemetry relay to {}", self.url);

            let attempt = tokio::select! {
                result = tokio_tungstenite::connect_async(self.url.as_str()) => result,
                _ = shutdown_requested(&mut self.shutdown) => {
                    self.lifecycle.shutdown();
                    break;
                }
            };

            match attempt {
                Ok((socket, _response)) => {
                    self.lifecycle.opened();
                    info!("Telemetry relay connected to {}", self.url);

                    match self.pump(socket).await {
                        PumpEnd::Shutdown => {
                            self.lifecycle.shutdown();
                            break;
                        }
                        PumpEnd::Lost => {}
                    }
                }
                Err(e) => warn!("Telemetry relay connect to {} failed: {}", self.url, e),
            }

            match self.lifecycle.fail() {
                Some(delay) => {
                    if !self.wait_for_retry(delay).await {
                        self.lifecycle.shutdown();
                        break;
                    }
                }
                None => break,
            }
        }
        debug!("Telemetry relay stopped");
    }

    /// Drop outbound messages until the retry is due
    ///
    /// Returns `false` if shutdown was requested meanwhile.
    async fn wait_for_retry(&mut self, delay: Duration) -> bool {
        debug!("Retrying telemetry relay in {:?}", delay);
        let retry = tokio::time::sleep(delay);
        tokio::pin!(retry);

        loop {
            tokio::select! {
                _ = &mut retry => return true,
                _ = shutdown_requested(&mut self.shutdown) => return false,
                message = self.outbound.recv() => match message {
                    Some(_) => debug!("Relay not connected, dropping telemetry message"),
                    None => return false,
                },
            }
        }
    }

    async fn pump<S>(&mut self, socket: tokio_tungstenite::WebSocketStream<S>) -> PumpEnd
    where
        S: tokio::io::AsyncRead + tokio::io::AsyncWrite + Unpin,
    {
        let (mut sink, mut stream) = socket.split();
        // Overflow from before this socket opened is not its fault
        self.overflow.borrow_and_update();

        loop {
            tokio::select! {
                _ = shutdown_requested(&mut self.shutdown) => {
                    let frame = CloseFrame {
                        code: CloseCode::Normal,
                        reason: "app closed".into(),
                    };
                    let _ = sink.send(Message::Close(Some(frame))).await;
                    return PumpEnd::Shutdown;
                }
                Ok(()) = self.overflow.changed() => {
                    warn!("Telemetry relay cannot keep up, reconnecting");
                    let _ = sink.send(Message::Close(None)).await;
                    return PumpEnd::Lost;
                }
                message = self.outbound.recv() => match message {
                    Some(text) => {
                        if let Err(e) = sink.send(Message::Text(text.into())).await {
                            warn!("Telemetry relay send failed: {}", e);
                            return PumpEnd::Lost;
                        }
                    }
                    None => {
                        let _ = sink.send(Message::Close(None)).await;
                        return PumpEnd::Shutdown;
                    }
                },
                inbound = stream.next() => match inbound {
                    Some(Ok(Message::Text(text))) => handle_server_message(text.as_str()),
                    Some(Ok(Message::Close(frame))) => {
                        info!("Telemetry relay closed by server: {:?}", frame);
                        return PumpEnd::Lost;
                    }
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        warn!("Telemetry relay failure: {}", e);
                        return PumpEnd::Lost;
                    }
                    None => return PumpEnd::Lost,
                },
            }
        }
    }
}

/// Inbound server messages are accepted and logged; no commands are defined
fn handle_server_message(text: &str) {
    let text = text.trim();
    if text.is_empty() {
        return;
    }
    info!("Relay command received: {}", text);
}
