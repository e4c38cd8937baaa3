//! # Session Module
//!
//! The single context that owns the robot link and everything around it.
//!
//! Reader tasks, timers, the console and the gamepad thread never touch state
//! directly; they post [`Event`]s into one queue and [`Session::run`] handles
//! them in order. Because of that, nothing in here needs a lock.
//!
//! ```text
//!   press ──> Session ──> CommandEncoder ──> Connection::write_command
//!   bytes ──> reader task ──> Event::Link(Line) ──> parser ──> display + relay
//!   Lost ──> Session ──> ReconnectPolicy ──> Event::ReconnectDue ──> open
//! ```

pub mod console;
pub mod status;

pub use status::LinkStatus;

use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::command::{CommandEncoder, RepeatRegistry, RepeatToken};
use crate::config::Config;
use crate::error::{BridgeError, Result};
use crate::link::{ConnectError, Connection, DeviceInfo, LinkEvent, LinkStream, Transport};
use crate::protocol::display::{self, DisplayRegion};
use crate::protocol::parser::{ParseOutcome, TelemetryParser, WireFormat};
use crate::protocol::record::WireShape;
use crate::reconnect::{ReconnectPolicy, RetryToken};
use crate::store::DeviceStore;
use crate::telemetry::message::{link_state_message, raw_message, telemetry_message, timestamp_ms};
use crate::telemetry::RelayHandle;

/// A user request, from the console or the gamepad
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ControlInput {
    Press(String),
    Release(String),
    Tap(String),
    Search,
    /// Address, or index into the last search result
    Connect(String),
    Disconnect,
    Shutdown,
    Quit,
}

/// Everything the session reacts to
pub enum Event {
    Input(ControlInput),
    Connected {
        generation: u64,
        address: String,
        stream: LinkStream,
    },
    ConnectFailed {
        generation: u64,
        address: String,
        error: BridgeError,
    },
    Discovered(Result<Vec<DeviceInfo>>),
    Link(LinkEvent),
    RepeatTick {
        control: String,
        token: RepeatToken,
    },
    ReconnectDue(RetryToken),
}

impl fmt::Debug for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Event::Input(input) => f.debug_tuple("Input").field(input).finish(),
            Event::Connected {
                generation, address, ..
            } => f
                .debug_struct("Connected")
                .field("generation", generation)
                .field("address", address)
                .finish_non_exhaustive(),
            Event::ConnectFailed {
                generation,
                address,
                error,
            } => f
                .debug_struct("ConnectFailed")
                .field("generation", generation)
                .field("address", address)
                .field("error", error)
                .finish(),
            Event::Discovered(result) => f.debug_tuple("Discovered").field(result).finish(),
            Event::Link(event) => f.debug_tuple("Link").field(event).finish(),
            Event::RepeatTick { control, token } => f
                .debug_struct("RepeatTick")
                .field("control", control)
                .field("token", token)
                .finish(),
            Event::ReconnectDue(token) => f.debug_tuple("ReconnectDue").field(token).finish(),
        }
    }
}

impl From<LinkEvent> for Event {
    fn from(event: LinkEvent) -> Self {
        Event::Link(event)
    }
}

/// What the session reports to its front end
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionUpdate {
    Status(LinkStatus),
    Display { region: DisplayRegion, text: String },
    /// Result of a search, saved address first
    Devices(Vec<DeviceInfo>),
}

/// Cloneable input side of a running session
#[derive(Debug, Clone)]
pub struct SessionHandle {
    events: mpsc::UnboundedSender<Event>,
}

impl SessionHandle {
    /// Post an input; returns `false` once the session has stopped
    pub fn send(&self, input: ControlInput) -> bool {
        self.events.send(Event::Input(input)).is_ok()
    }

    pub fn press(&self, control: &str) -> bool {
        self.send(ControlInput::Press(control.to_string()))
    }

    pub fn release(&self, control: &str) -> bool {
        self.send(ControlInput::Release(control.to_string()))
    }

    pub fn quit(&self) -> bool {
        self.send(ControlInput::Quit)
    }
}

enum LinkState {
    Disconnected,
    Connecting { generation: u64, address: String },
    Connected(Connection),
}

pub struct Session {
    config: Config,
    transport: Arc<dyn Transport>,
    store: DeviceStore,
    relay: Option<RelayHandle>,
    encoder: CommandEncoder,
    parser: TelemetryParser,
    repeats: RepeatRegistry,
    reconnect: ReconnectPolicy,
    retry_timer: Option<JoinHandle<()>>,
    link: LinkState,
    generation: u64,
    devices: Vec<DeviceInfo>,
    events_tx: mpsc::UnboundedSender<Event>,
    events: mpsc::UnboundedReceiver<Event>,
    updates: mpsc::UnboundedSender<SessionUpdate>,
}

impl Session {
    /// Build a session
    ///
    /// Returns the session, a handle for posting input, and the receiver of
    /// status and display updates. Nothing happens until [`Session::run`].
    pub fn new(
        config: Config,
        transport: Arc<dyn Transport>,
        store: DeviceStore,
        relay: Option<RelayHandle>,
    ) -> (Self, SessionHandle, mpsc::UnboundedReceiver<SessionUpdate>) {
        let (events_tx, events) = mpsc::unbounded_channel();
        let (updates, updates_rx) = mpsc::unbounded_channel();

        let session = Self {
            encoder: CommandEncoder::new(config.protocol.newline_terminated),
            parser: TelemetryParser::new(config.protocol.format),
            reconnect: ReconnectPolicy::new(Duration::from_millis(config.link.reconnect_delay_ms)),
            repeats: RepeatRegistry::new(),
            retry_timer: None,
            link: LinkState::Disconnected,
            generation: 0,
            devices: Vec::new(),
            config,
            transport,
            store,
            relay,
            events_tx: events_tx.clone(),
            events,
            updates,
        };
        let handle = SessionHandle { events: events_tx };
        (session, handle, updates_rx)
    }

    /// Handle events until `Quit`, then tear everything down
    pub async fn run(mut self) {
        self.start();

        while let Some(event) = self.events.recv().await {
            if !self.handle_event(event).await {
                break;
            }
        }

        self.teardown().await;
    }

    /// Connect to the remembered robot, or look for one
    fn start(&mut self) {
        if !self.config.link.auto_connect {
            self.set_status(LinkStatus::Disconnected);
            return;
        }

        let target = self
            .store
            .last_address()
            .map(str::to_string)
            .or_else(|| Some(self.config.link.address.clone()).filter(|a| !a.is_empty()));

        match target {
            Some(address) => {
                info!("Auto-connecting to {}", address);
                self.connect_to(address);
            }
            None => self.search(),
        }
    }

    /// Returns `false` when the session should stop
    async fn handle_event(&mut self, event: Event) -> bool {
        match event {
            Event::Input(input) => return self.handle_input(input).await,
            Event::Connected {
                generation,
                address,
                stream,
            } => self.on_connected(generation, address, stream),
            Event::ConnectFailed {
                generation,
                address,
                error,
            } => self.on_connect_failed(generation, &address, &error),
            Event::Discovered(result) => self.on_discovered(result),
            Event::Link(LinkEvent::Line { generation, line }) => {
                if self.is_current_connection(generation) {
                    self.handle_line(&line);
                } else {
                    debug!("Ignoring line from stale connection {}", generation);
                }
            }
            Event::Link(LinkEvent::Lost { generation, reason }) => {
                if self.is_current_connection(generation) {
                    self.on_link_lost(&reason).await;
                } else {
                    debug!("Ignoring loss of stale connection {}", generation);
                }
            }
            Event::RepeatTick { control, token } => self.on_repeat_tick(control, token).await,
            Event::ReconnectDue(token) => self.on_reconnect_due(token),
        }
        true
    }

    async fn handle_input(&mut self, input: ControlInput) -> bool {
        debug!("Input: {:?}", input);
        match input {
            ControlInput::Press(control) => self.press(&control).await,
            ControlInput::Release(control) => self.release(&control).await,
            ControlInput::Tap(control) => {
                if let Some(command) = self.command_for(&control) {
                    self.send_command(&command).await;
                }
            }
            ControlInput::Search => self.search(),
            ControlInput::Connect(target) => {
                let address = self.resolve_target(&target);
                self.connect_to(address);
            }
            ControlInput::Disconnect => self.disconnect().await,
            ControlInput::Shutdown => {
                let command = self.config.controls.shutdown_command.clone();
                self.send_command(&command).await;
                self.disconnect().await;
            }
            ControlInput::Quit => {
                info!("Quit requested");
                return false;
            }
        }
        true
    }

    // ---- commands ----

    fn command_for(&self, control: &str) -> Option<String> {
        match self.config.binding(control) {
            Some(binding) => Some(binding.command.clone()),
            None => {
                warn!("Unknown control '{}'", control);
                None
            }
        }
    }

    /// Send once now, then repeat until released
    async fn press(&mut self, control: &str) {
        let Some(command) = self.command_for(control) else {
            return;
        };

        let token = self.repeats.start(control);
        self.send_command(&command).await;
        self.arm_repeat(control, token);
    }

    async fn release(&mut self, control: &str) {
        let Some(binding) = self.config.binding(control) else {
            warn!("Unknown control '{}'", control);
            return;
        };
        let stop_on_release = binding.stop_on_release;

        self.repeats.cancel(control);
        if stop_on_release {
            let stop = self.config.controls.stop_command.clone();
            self.send_command(&stop).await;
        }
    }

    async fn on_repeat_tick(&mut self, control: String, token: RepeatToken) {
        if !self.repeats.is_current(&control, token) {
            return;
        }
        if let Some(command) = self.command_for(&control) {
            self.send_command(&command).await;
            self.arm_repeat(&control, token);
        }
    }

    fn arm_repeat(&mut self, control: &str, token: RepeatToken) {
        if !self.repeats.is_current(control, token) {
            return;
        }
        let interval = Duration::from_millis(self.config.controls.repeat_interval_ms);
        let events = self.events_tx.clone();
        let tick = Event::RepeatTick {
            control: control.to_string(),
            token,
        };
        let timer = tokio::spawn(async move {
            tokio::time::sleep(interval).await;
            let _ = events.send(tick);
        });
        self.repeats.attach_timer(control, token, timer);
    }

    /// Write one command; a no-op without a connection
    async fn send_command(&mut self, command: &str) {
        let LinkState::Connected(connection) = &mut self.link else {
            debug!("Not connected, dropping command {}", command);
            return;
        };

        let bytes = self.encoder.encode(command);
        if let Err(e) = connection.write_command(&bytes).await {
            warn!("Write to {} failed: {}", connection.address(), e);
            self.on_link_lost(&e.to_string()).await;
        }
    }

    // ---- link lifecycle ----

    fn is_current_connection(&self, generation: u64) -> bool {
        matches!(&self.link, LinkState::Connected(c) if c.generation() == generation)
    }

    /// Name shown for `address`: the device name if known, else the address
    fn display_name(&self, address: &str) -> String {
        self.devices
            .iter()
            .find(|device| device.address == address)
            .map(|device| device.label().to_string())
            .unwrap_or_else(|| address.to_string())
    }

    /// Address for a `connect` argument: an index into the last search, or
    /// an address as is
    fn resolve_target(&self, target: &str) -> String {
        target
            .parse::<usize>()
            .ok()
            .and_then(|index| self.devices.get(index))
            .map(|device| device.address.clone())
            .unwrap_or_else(|| target.to_string())
    }

    /// Close the current link, if any, without scheduling a retry
    async fn close_link(&mut self) {
        match std::mem::replace(&mut self.link, LinkState::Disconnected) {
            LinkState::Connected(mut connection) => {
                connection.close().await;
                info!("Closed link to {}", connection.address());
                self.publish_link_state(false);
            }
            LinkState::Connecting { address, .. } => {
                debug!("Abandoning open of {}", address);
            }
            LinkState::Disconnected => {}
        }
    }

    fn cancel_reconnect(&mut self) {
        self.reconnect.cancel();
        if let Some(timer) = self.retry_timer.take() {
            timer.abort();
        }
    }

    /// Start opening `address`; the result arrives as an event
    fn connect_to(&mut self, address: String) {
        self.cancel_reconnect();

        // Switching robots: the old link closes in the background
        if let LinkState::Connected(mut connection) =
            std::mem::replace(&mut self.link, LinkState::Disconnected)
        {
            tokio::spawn(async move { connection.close().await });
            self.publish_link_state(false);
        }

        self.generation += 1;
        let generation = self.generation;
        self.set_status(LinkStatus::Connecting(self.display_name(&address)));
        self.link = LinkState::Connecting {
            generation,
            address: address.clone(),
        };

        let transport = Arc::clone(&self.transport);
        let events = self.events_tx.clone();
        tokio::spawn(async move {
            let event = match transport.open(&address).await {
                Ok(stream) => Event::Connected {
                    generation,
                    address,
                    stream,
                },
                Err(error) => Event::ConnectFailed {
                    generation,
                    address,
                    error,
                },
            };
            let _ = events.send(event);
        });
    }

    fn on_connected(&mut self, generation: u64, address: String, stream: LinkStream) {
        let current = matches!(&self.link, LinkState::Connecting { generation: g, .. } if *g == generation);
        if !current {
            debug!("Dropping stale connection to {}", address);
            return;
        }

        self.cancel_reconnect();
        // Motor slots stick to the pins of one robot
        if self.store.last_address() != Some(address.as_str()) {
            self.parser.reset();
        }

        let connection = Connection::spawn(
            address.clone(),
            generation,
            stream,
            self.config.protocol.max_line_length,
            self.events_tx.clone(),
        );
        self.link = LinkState::Connected(connection);
        info!("Connected to {}", address);

        if let Err(e) = self.store.save_last_address(&address) {
            warn!("Could not remember {}: {}", address, e);
        }
        self.set_status(LinkStatus::Connected(self.display_name(&address)));
        self.publish_link_state(true);
    }

    fn on_connect_failed(&mut self, generation: u64, address: &str, error: &BridgeError) {
        let current = matches!(&self.link, LinkState::Connecting { generation: g, .. } if *g == generation);
        if !current {
            debug!("Ignoring failure of stale open of {}", address);
            return;
        }

        self.link = LinkState::Disconnected;
        let kind = ConnectError::classify(error);
        warn!("Connect to {} failed: {}", address, error);
        self.set_status(LinkStatus::from(kind));

        if kind.should_retry() {
            self.schedule_reconnect();
        }
    }

    async fn on_link_lost(&mut self, reason: &str) {
        if let LinkState::Connected(mut connection) =
            std::mem::replace(&mut self.link, LinkState::Disconnected)
        {
            warn!("Link to {} lost: {}", connection.address(), reason);
            connection.close().await;
            self.set_status(LinkStatus::Disconnected);
            self.publish_link_state(false);
            self.schedule_reconnect();
        }
    }

    /// Explicit disconnect; no retry follows
    async fn disconnect(&mut self) {
        self.cancel_reconnect();
        self.close_link().await;
        self.set_status(LinkStatus::Disconnected);
    }

    fn schedule_reconnect(&mut self) {
        let Some(token) = self.reconnect.schedule() else {
            return;
        };
        let delay = self.reconnect.delay();
        debug!("Reconnect in {:?}", delay);

        let events = self.events_tx.clone();
        let timer = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let _ = events.send(Event::ReconnectDue(token));
        });
        if let Some(old) = self.retry_timer.replace(timer) {
            old.abort();
        }
    }

    fn on_reconnect_due(&mut self, token: RetryToken) {
        if !self.reconnect.fire(token) {
            return;
        }
        self.retry_timer = None;

        if !matches!(self.link, LinkState::Disconnected) {
            return;
        }
        match self.store.last_address() {
            Some(address) => {
                let address = address.to_string();
                info!("Reconnecting to {}", address);
                self.connect_to(address);
            }
            None => debug!("No saved address to reconnect to"),
        }
    }

    // ---- discovery ----

    fn search(&mut self) {
        self.cancel_reconnect();
        self.set_status(LinkStatus::Searching);

        let transport = Arc::clone(&self.transport);
        let events = self.events_tx.clone();
        tokio::spawn(async move {
            let result = transport.discover().await;
            let _ = events.send(Event::Discovered(result));
        });
    }

    fn on_discovered(&mut self, result: Result<Vec<DeviceInfo>>) {
        let mut devices = match result {
            Ok(devices) => devices,
            Err(e) => {
                warn!("Device search failed: {}", e);
                self.set_status(LinkStatus::from(ConnectError::classify(&e)));
                return;
            }
        };

        if let Some(saved) = self.store.last_address() {
            // Stable, so the rest keeps discovery order
            devices.sort_by_key(|device| device.address != saved);
        }
        info!("Found {} device(s)", devices.len());
        self.devices = devices;
        self.emit(SessionUpdate::Devices(self.devices.clone()));

        let status = match &self.link {
            LinkState::Connected(connection) => {
                LinkStatus::Connected(self.display_name(connection.address()))
            }
            LinkState::Connecting { address, .. } => {
                LinkStatus::Connecting(self.display_name(address))
            }
            LinkState::Disconnected if self.devices.is_empty() => LinkStatus::NoDeviceFound,
            LinkState::Disconnected => LinkStatus::Disconnected,
        };
        self.set_status(status);
    }

    // ---- telemetry ----

    fn handle_line(&mut self, line: &str) {
        // Legacy lines go out raw even when they carry no record
        let raw = self.parser.shape_of(line) == WireShape::Legacy;
        if raw {
            self.relay_message(raw_message(line, timestamp_ms()));
        }

        let parsed = match self.parser.parse(line) {
            ParseOutcome::Record(parsed) => parsed,
            ParseOutcome::Ignored(_) => return,
        };

        let (region, text) = display::render(&parsed);
        self.emit(SessionUpdate::Display { region, text });

        if !raw {
            self.relay_message(telemetry_message(&parsed, line, timestamp_ms()));
        }
    }

    /// Link up/down messages belong to the typed relay format only
    fn publish_link_state(&self, connected: bool) {
        if self.parser.format() == WireFormat::Legacy {
            return;
        }
        self.relay_message(link_state_message(connected));
    }

    fn relay_message(&self, message: Result<String>) {
        if let Some(relay) = &self.relay {
            match message {
                Ok(message) => {
                    relay.publish(message);
                }
                Err(e) => warn!("Could not serialize relay message: {}", e),
            }
        }
    }

    // ---- output ----

    fn set_status(&self, status: LinkStatus) {
        debug!("Status: {}", status);
        self.emit(SessionUpdate::Status(status));
    }

    fn emit(&self, update: SessionUpdate) {
        // Nobody listening is fine
        let _ = self.updates.send(update);
    }

    async fn teardown(&mut self) {
        self.repeats.cancel_all();
        self.cancel_reconnect();
        self.close_link().await;
        if let Some(relay) = self.relay.take() {
            relay.shutdown().await;
        }
        info!("Session stopped");
    }
}
