//! # Armlink
//!
//! Drive a Bluetooth arm + car robot from the console or a PS5 DualSense,
//! and mirror its telemetry to a WebSocket server.
//!
//! # Control Flow
//!
//! 1. **Initialization**
//!    - Load configuration (first argument, default `config/default.toml`)
//!    - Set up logging with tracing subscriber
//!    - Open the device store, start the relay, build the session
//!
//! 2. **Main Loop**
//!    - Console and gamepad threads post input into the session
//!    - Status and display updates are logged as they arrive
//!    - Ctrl+C asks the session to quit
//!
//! 3. **Graceful Shutdown**
//!    - Pending repeats and retries are cancelled
//!    - The link is closed and the relay socket closed with "app closed"
//!
//! Run the application:
//! ```bash
//! cargo run --release -- config/default.toml
//! ```

use anyhow::{Context, Result};
use tracing::{info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use armlink::config::{Config, GamepadConfig, LoggingConfig};
use armlink::controller::{self, ps5::DualSenseController};
use armlink::link;
use armlink::session::{console, Session, SessionHandle, SessionUpdate};
use armlink::store::DeviceStore;
use armlink::telemetry::RelayHandle;

/// Used when no path is given on the command line
const DEFAULT_CONFIG_PATH: &str = "config/default.toml";

/// Daily log file name prefix inside `logging.log_dir`
const LOG_FILE_PREFIX: &str = "armlink.log";

#[tokio::main]
async fn main() -> Result<()> {
    let config_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| DEFAULT_CONFIG_PATH.to_string());
    let config = Config::load_or_default(&config_path)
        .with_context(|| format!("Failed to load configuration from {}", config_path))?;

    let _log_guard = init_logging(&config.logging)?;
    info!("Armlink v{} starting...", env!("CARGO_PKG_VERSION"));
    info!("Configuration: {}", config_path);

    let transport = link::build_transport(&config.link).context("No usable robot transport")?;
    let store = DeviceStore::open(&config.store.path);
    match store.last_address() {
        Some(address) => info!("Last device {} (from {})", address, store.path().display()),
        None => info!("No saved device in {}", store.path().display()),
    }
    let relay = if config.relay.enabled {
        info!("Relaying telemetry to {}", config.relay.url);
        Some(RelayHandle::spawn(&config.relay))
    } else {
        None
    };

    let gamepad = config.gamepad.clone();
    let (session, handle, mut updates) = Session::new(config, transport, store, relay);

    console::spawn_stdin_reader(handle.clone()).context("Failed to start console reader")?;
    if gamepad.enabled {
        start_gamepad(&gamepad, handle.clone());
    }

    let session_task = tokio::spawn(session.run());
    info!("Type 'search', 'press <control>' or 'quit'. Press Ctrl+C to exit");

    loop {
        tokio::select! {
            update = updates.recv() => match update {
                Some(update) => report(update),
                // Session finished and dropped its sender
                None => break,
            },

            // Handle Ctrl+C for graceful shutdown
            _ = tokio::signal::ctrl_c() => {
                info!("Received Ctrl+C, shutting down...");
                if !handle.quit() {
                    break;
                }
            }
        }
    }

    session_task.await.context("Session task failed")?;
    info!("Armlink stopped");
    Ok(())
}

/// Log to stdout, plus a daily file when `log_dir` is set
///
/// `RUST_LOG` overrides `logging.level`. The returned guard flushes the file
/// writer when dropped.
fn init_logging(config: &LoggingConfig) -> Result<Option<WorkerGuard>> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.level))
        .with_context(|| format!("Invalid log level '{}'", config.level))?;

    let (file_layer, guard) = if config.log_dir.is_empty() {
        (None, None)
    } else {
        let appender = tracing_appender::rolling::daily(&config.log_dir, LOG_FILE_PREFIX);
        let (writer, guard) = tracing_appender::non_blocking(appender);
        let layer = tracing_subscriber::fmt::layer()
            .with_writer(writer)
            .with_ansi(false);
        (Some(layer), Some(guard))
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .with(file_layer)
        .init();

    Ok(guard)
}

/// Map gamepad buttons to controls; a missing pad is not fatal
fn start_gamepad(config: &GamepadConfig, handle: SessionHandle) {
    let pad = match DualSenseController::open_configured(&config.device_path) {
        Ok(pad) => pad,
        Err(e) => {
            warn!("Gamepad disabled: {}", e);
            return;
        }
    };

    let bindings = config.bindings.clone();
    let result = controller::spawn_reader(pad, move |edge| match bindings.get(&edge.button) {
        Some(control) if edge.pressed => handle.press(control),
        Some(control) => handle.release(control),
        None => true,
    });
    if let Err(e) = result {
        warn!("Gamepad disabled: {}", e);
    }
}

fn report(update: SessionUpdate) {
    match update {
        SessionUpdate::Status(status) => info!(target: "armlink::status", "{}", status),
        SessionUpdate::Display { region, text } => {
            info!(target: "armlink::display", "[{}] {}", region, text.replace('\n', " | "));
        }
        SessionUpdate::Devices(devices) => {
            if devices.is_empty() {
                info!("No devices");
            }
            for (index, device) in devices.iter().enumerate() {
                info!("  [{}] {}", index, device);
            }
        }
    }
}
