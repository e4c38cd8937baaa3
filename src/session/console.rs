//! Line-oriented console input.
//!
//! | Line | Input |
//! |------|-------|
//! | `press <control>` | start a control, repeating until released |
//! | `release <control>` | stop it |
//! | `tap <control>` | send it once |
//! | `search` | list devices |
//! | `connect <address or index>` | open a device |
//! | `disconnect` | close the link, no reconnect |
//! | `shutdown` | tell the robot to shut down, then disconnect |
//! | `quit` | exit |

use std::io::BufRead;
use std::thread::{self, JoinHandle};
use thiserror::Error;
use tracing::{debug, warn};

use super::{ControlInput, SessionHandle};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConsoleError {
    #[error("unknown command '{0}'")]
    UnknownCommand(String),

    #[error("'{0}' needs an argument")]
    MissingArgument(&'static str),
}

/// Parse one console line; blank lines and `#` comments yield `None`
pub fn parse_line(line: &str) -> Result<Option<ControlInput>, ConsoleError> {
    let line = line.trim();
    if line.is_empty() || line.starts_with('#') {
        return Ok(None);
    }

    let mut words = line.split_whitespace();
    let verb = words.next().unwrap_or_default();
    let argument = words.next();

    let with_argument = |name: &'static str| -> Result<String, ConsoleError> {
        argument
            .map(str::to_string)
            .ok_or(ConsoleError::MissingArgument(name))
    };

    let input = match verb {
        "press" => ControlInput::Press(with_argument("press")?),
        "release" => ControlInput::Release(with_argument("release")?),
        "tap" => ControlInput::Tap(with_argument("tap")?),
        "search" => ControlInput::Search,
        "connect" => ControlInput::Connect(with_argument("connect")?),
        "disconnect" => ControlInput::Disconnect,
        "shutdown" => ControlInput::Shutdown,
        "quit" | "exit" => ControlInput::Quit,
        other => return Err(ConsoleError::UnknownCommand(other.to_string())),
    };
    Ok(Some(input))
}

/// Forward console lines into the session until EOF or `quit`
pub fn read_console<R: BufRead>(reader: R, handle: SessionHandle) {
    for line in reader.lines() {
        let line = match line {
            Ok(line) => line,
            Err(e) => {
                warn!("Console read failed: {}", e);
                return;
            }
        };

        match parse_line(&line) {
            Ok(Some(input)) => {
                let quit = input == ControlInput::Quit;
                if !handle.send(input) || quit {
                    return;
                }
            }
            Ok(None) => {}
            Err(e) => warn!("{}", e),
        }
    }
    debug!("Console input closed");
}

/// Read stdin on its own thread; blocking reads never hold up the runtime
pub fn spawn_stdin_reader(handle: SessionHandle) -> std::io::Result<JoinHandle<()>> {
    thread::Builder::new()
        .name("console".to_string())
        .spawn(move || read_console(std::io::stdin().lock(), handle))
}
