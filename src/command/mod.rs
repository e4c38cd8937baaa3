//! # Command Module
//!
//! Outbound command tokens and auto-repeat bookkeeping.
//!
//! Commands are short ASCII tokens with no length prefix (`K`, `J`, `AU`,
//! `L1U`, ...). Depending on the firmware generation each token is followed
//! by a newline.

pub mod repeat;

pub use repeat::{RepeatRegistry, RepeatToken};

/// Turns command tokens into the bytes written to the robot
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommandEncoder {
    newline_terminated: bool,
}

impl CommandEncoder {
    pub fn new(newline_terminated: bool) -> Self {
        Self { newline_terminated }
    }

    /// Encode one command token
    ///
    /// # Examples
    ///
    /// ```
    /// use armlink::command::CommandEncoder;
    ///
    /// assert_eq!(CommandEncoder::new(false).encode("K"), b"K".to_vec());
    /// assert_eq!(CommandEncoder::new(true).encode("L1U"), b"L1U\n".to_vec());
    /// ```
    pub fn encode(&self, command: &str) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(command.len() + 1);
        bytes.extend_from_slice(command.as_bytes());
        if self.newline_terminated {
            bytes.push(b'\n');
        }
        bytes
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bare_tokens() {
        let encoder = CommandEncoder::new(false);
        assert_eq!(encoder.encode("K"), b"K");
        assert_eq!(encoder.encode("AU"), b"AU");
    }

    #[test]
    fn test_newline_terminated_tokens() {
        let encoder = CommandEncoder::new(true);
        assert_eq!(encoder.encode("F"), b"F\n");
        assert_eq!(encoder.encode("S"), b"S\n");
    }
}
