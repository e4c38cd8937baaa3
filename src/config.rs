//! # Configuration Module
//!
//! Handles loading and validating configuration from TOML files.

use serde::de::Error;
use serde::Deserialize;
use std::collections::{BTreeMap, HashSet};
use std::fs;
use std::path::Path;

use crate::controller::mapper::GamepadButton;
use crate::error::{BridgeError, Result};
use crate::protocol::parser::WireFormat;

/// Main configuration structure
#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub link: LinkConfig,
    #[serde(default)]
    pub protocol: ProtocolConfig,
    #[serde(default)]
    pub controls: ControlsConfig,
    #[serde(default)]
    pub relay: RelayConfig,
    #[serde(default)]
    pub gamepad: GamepadConfig,
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Which transport carries the serial profile
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum TransportKind {
    /// RFCOMM-bound tty such as `/dev/rfcomm0`
    Serial,
    /// Direct BlueZ RFCOMM socket (needs the `bluez` feature)
    Rfcomm,
}

/// Robot link configuration
#[derive(Debug, Deserialize, Clone)]
pub struct LinkConfig {
    #[serde(default = "default_transport")]
    pub transport: TransportKind,

    /// Address to use when nothing has been saved yet
    #[serde(default)]
    pub address: String,

    #[serde(default = "default_candidates")]
    pub candidates: Vec<String>,

    #[serde(default = "default_baud_rate")]
    pub baud_rate: u32,

    #[serde(default = "default_rfcomm_channel")]
    pub rfcomm_channel: u8,

    #[serde(default = "default_reconnect_delay_ms")]
    pub reconnect_delay_ms: u64,

    #[serde(default = "default_auto_connect")]
    pub auto_connect: bool,
}

/// Telemetry and command wire protocol
#[derive(Debug, Deserialize, Clone)]
pub struct ProtocolConfig {
    #[serde(default = "default_wire_format")]
    pub format: WireFormat,

    #[serde(default)]
    pub newline_terminated: bool,

    #[serde(default = "default_max_line_length")]
    pub max_line_length: usize,
}

/// A named control bound to a command token
#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
pub struct ControlBinding {
    pub name: String,
    pub command: String,
    #[serde(default)]
    pub stop_on_release: bool,
}

/// Control bindings and repeat timing
#[derive(Debug, Deserialize, Clone)]
pub struct ControlsConfig {
    #[serde(default = "default_repeat_interval_ms")]
    pub repeat_interval_ms: u64,

    #[serde(default = "default_stop_command")]
    pub stop_command: String,

    #[serde(default = "default_shutdown_command")]
    pub shutdown_command: String,

    #[serde(default = "default_bindings")]
    pub bindings: Vec<ControlBinding>,
}

/// WebSocket telemetry relay configuration
#[derive(Debug, Deserialize, Clone)]
pub struct RelayConfig {
    #[serde(default = "default_relay_enabled")]
    pub enabled: bool,

    #[serde(default = "default_relay_url")]
    pub url: String,

    #[serde(default = "default_relay_reconnect_delay_ms")]
    pub reconnect_delay_ms: u64,

    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,
}

/// Gamepad configuration
#[derive(Debug, Deserialize, Clone)]
pub struct GamepadConfig {
    #[serde(default)]
    pub enabled: bool,

    /// Empty means auto-detect
    #[serde(default)]
    pub device_path: String,

    #[serde(default = "default_gamepad_bindings")]
    pub bindings: BTreeMap<GamepadButton, String>,
}

/// Persisted state configuration
#[derive(Debug, Deserialize, Clone)]
pub struct StoreConfig {
    #[serde(default = "default_store_path")]
    pub path: String,
}

/// Log output configuration
#[derive(Debug, Deserialize, Clone)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Empty means stdout only
    #[serde(default)]
    pub log_dir: String,
}

// Default value functions
fn default_transport() -> TransportKind { TransportKind::Serial }
fn default_candidates() -> Vec<String> {
    vec!["/dev/rfcomm0".to_string(), "/dev/rfcomm1".to_string()]
}
fn default_baud_rate() -> u32 { 9600 }
fn default_rfcomm_channel() -> u8 { 1 }
fn default_reconnect_delay_ms() -> u64 { 2000 }
fn default_auto_connect() -> bool { true }

fn default_wire_format() -> WireFormat { WireFormat::Auto }
fn default_max_line_length() -> usize { 1024 }

fn default_repeat_interval_ms() -> u64 { 100 }
fn default_stop_command() -> String { "S".to_string() }
fn default_shutdown_command() -> String { "Q".to_string() }

fn default_relay_enabled() -> bool { true }
fn default_relay_url() -> String { "ws://localhost:8080/ws".to_string() }
fn default_relay_reconnect_delay_ms() -> u64 { 3000 }
fn default_queue_capacity() -> usize { 64 }

fn default_store_path() -> String { "./state/last_device.toml".to_string() }

fn default_log_level() -> String { "info".to_string() }

fn default_bindings() -> Vec<ControlBinding> {
    [
        ("arm_up", "K"),
        ("arm_down", "J"),
        ("arm_left", "H"),
        ("arm_right", "L"),
        ("link1_up", "R"),
        ("link1_down", "T"),
        ("link2_up", "Y"),
        ("link2_down", "U"),
        ("grab", "I"),
        ("release", "O"),
        ("car_forward", "W"),
        ("car_left", "A"),
        ("car_right", "D"),
        ("car_backward", "S"),
    ]
    .into_iter()
    .map(|(name, command)| ControlBinding {
        name: name.to_string(),
        command: command.to_string(),
        stop_on_release: false,
    })
    .collect()
}

fn default_gamepad_bindings() -> BTreeMap<GamepadButton, String> {
    [
        (GamepadButton::DpadUp, "car_forward"),
        (GamepadButton::DpadDown, "car_backward"),
        (GamepadButton::DpadLeft, "car_left"),
        (GamepadButton::DpadRight, "car_right"),
        (GamepadButton::Triangle, "arm_up"),
        (GamepadButton::Cross, "arm_down"),
        (GamepadButton::Square, "arm_left"),
        (GamepadButton::Circle, "arm_right"),
        (GamepadButton::L1, "link1_up"),
        (GamepadButton::L2, "link1_down"),
        (GamepadButton::R1, "link2_up"),
        (GamepadButton::R2, "link2_down"),
        (GamepadButton::Options, "grab"),
        (GamepadButton::Share, "release"),
    ]
    .into_iter()
    .map(|(button, control)| (button, control.to_string()))
    .collect()
}

impl Default for LinkConfig {
    fn default() -> Self {
        Self {
            transport: default_transport(),
            address: String::new(),
            candidates: default_candidates(),
            baud_rate: default_baud_rate(),
            rfcomm_channel: default_rfcomm_channel(),
            reconnect_delay_ms: default_reconnect_delay_ms(),
            auto_connect: default_auto_connect(),
        }
    }
}

impl Default for ProtocolConfig {
    fn default() -> Self {
        Self {
            format: default_wire_format(),
            newline_terminated: false,
            max_line_length: default_max_line_length(),
        }
    }
}

impl Default for ControlsConfig {
    fn default() -> Self {
        Self {
            repeat_interval_ms: default_repeat_interval_ms(),
            stop_command: default_stop_command(),
            shutdown_command: default_shutdown_command(),
            bindings: default_bindings(),
        }
    }
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            enabled: default_relay_enabled(),
            url: default_relay_url(),
            reconnect_delay_ms: default_relay_reconnect_delay_ms(),
            queue_capacity: default_queue_capacity(),
        }
    }
}

impl Default for GamepadConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            device_path: String::new(),
            bindings: default_gamepad_bindings(),
        }
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self { path: default_store_path() }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            log_dir: String::new(),
        }
    }
}

fn invalid(msg: impl std::fmt::Display) -> BridgeError {
    BridgeError::Config(toml::de::Error::custom(msg))
}

impl Config {
    /// Load configuration from a TOML file
    ///
    /// # Errors
    ///
    /// Returns error if:
    /// - File cannot be read
    /// - TOML parsing fails
    /// - Validation fails
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use armlink::config::Config;
    ///
    /// let config = Config::load("config/default.toml")?;
    /// # Ok::<(), Box<dyn std::error::Error>>(())
    /// ```
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = fs::read_to_string(path)?;
        Self::from_toml(&contents)
    }

    /// Load configuration, falling back to defaults when the file does not exist
    pub fn load_or_default<P: AsRef<Path>>(path: P) -> Result<Self> {
        if path.as_ref().exists() {
            Self::load(path)
        } else {
            let config = Config::default();
            config.validate()?;
            Ok(config)
        }
    }

    /// Parse and validate configuration from a TOML string
    pub fn from_toml(contents: &str) -> Result<Self> {
        let config: Config = toml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Look up a control binding by name
    pub fn binding(&self, name: &str) -> Option<&ControlBinding> {
        self.controls.bindings.iter().find(|b| b.name == name)
    }

    /// Validate configuration values
    ///
    /// # Errors
    ///
    /// Returns error if any configuration value is out of valid range
    pub fn validate(&self) -> Result<()> {
        // Link
        if self.link.reconnect_delay_ms == 0 || self.link.reconnect_delay_ms > 60000 {
            return Err(invalid("link reconnect_delay_ms must be between 1 and 60000"));
        }

        if self.link.transport == TransportKind::Serial
            && ![9600, 19200, 38400, 57600, 115200].contains(&self.link.baud_rate)
        {
            return Err(invalid(
                "baud_rate must be one of: 9600, 19200, 38400, 57600, 115200",
            ));
        }

        if self.link.transport == TransportKind::Rfcomm
            && (self.link.rfcomm_channel == 0 || self.link.rfcomm_channel > 30)
        {
            return Err(invalid("rfcomm_channel must be between 1 and 30"));
        }

        // Protocol
        if self.protocol.max_line_length == 0 {
            return Err(invalid("max_line_length must be greater than 0"));
        }

        // Controls
        if self.controls.repeat_interval_ms == 0 || self.controls.repeat_interval_ms > 10000 {
            return Err(invalid("repeat_interval_ms must be between 1 and 10000"));
        }

        if self.controls.stop_command.is_empty() {
            return Err(invalid("stop_command cannot be empty"));
        }

        if self.controls.shutdown_command.is_empty() {
            return Err(invalid("shutdown_command cannot be empty"));
        }

        let mut names = HashSet::new();
        for binding in &self.controls.bindings {
            if binding.name.is_empty() {
                return Err(invalid("control name cannot be empty"));
            }
            if binding.command.is_empty() {
                return Err(invalid(format!("control '{}' has an empty command", binding.name)));
            }
            if !names.insert(binding.name.as_str()) {
                return Err(invalid(format!("control '{}' is defined twice", binding.name)));
            }
        }

        // Relay
        if self.relay.enabled {
            if !(self.relay.url.starts_with("ws://") || self.relay.url.starts_with("wss://")) {
                return Err(invalid("relay url must start with ws:// or wss://"));
            }
            if self.relay.reconnect_delay_ms == 0 || self.relay.reconnect_delay_ms > 60000 {
                return Err(invalid("relay reconnect_delay_ms must be between 1 and 60000"));
            }
            if self.relay.queue_capacity == 0 {
                return Err(invalid("relay queue_capacity must be greater than 0"));
            }
        }

        // Gamepad bindings must point at known controls
        if self.gamepad.enabled {
            for (button, control) in &self.gamepad.bindings {
                if !names.contains(control.as_str()) {
                    return Err(invalid(format!(
                        "gamepad button {:?} is bound to unknown control '{}'",
                        button, control
                    )));
                }
            }
        }

        if self.store.path.is_empty() {
            return Err(invalid("store path cannot be empty"));
        }

        Ok(())
    }
}
