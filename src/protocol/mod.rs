//! # Robot Wire Protocol Module
//!
//! Text protocol spoken by the robot over the serial profile.
//!
//! This module handles:
//! - Framing the inbound byte stream into newline-terminated lines
//! - Parsing legacy (`pin:pulse:target:pwm:dir:brake`) and tagged
//!   (`m:`, `s:`, `a:`) telemetry lines
//! - Rendering telemetry records into display region text

pub mod display;
pub mod framer;
pub mod parser;
pub mod record;
