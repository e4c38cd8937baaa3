//! Relay message shapes.
//!
//! | Generation | Message |
//! |------------|---------|
//! | Legacy | `{"timestamp": <ms>, "data": "<raw line>\n"}` |
//! | Tagged | `{"timestamp": <ms>, "type": "motor", "data": {...}}` |
//! | Tagged | `{"type": "bluetooth", "data": {"connected": true}}` |

use serde::Serialize;

use crate::error::Result;
use crate::protocol::parser::Parsed;
use crate::protocol::record::{TelemetryRecord, WireShape};

/// `type` of the link state message
pub const LINK_STATE_TYPE: &str = "bluetooth";

#[derive(Serialize)]
struct RawMessage {
    timestamp: i64,
    data: String,
}

#[derive(Serialize)]
struct TypedMessage<'a> {
    timestamp: i64,
    #[serde(rename = "type")]
    kind: &'static str,
    data: &'a TelemetryRecord,
}

#[derive(Serialize)]
struct LinkState {
    connected: bool,
}

#[derive(Serialize)]
struct LinkStateMessage {
    #[serde(rename = "type")]
    kind: &'static str,
    data: LinkState,
}

/// Milliseconds since the Unix epoch
pub fn timestamp_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

/// Serialize one telemetry line for the relay
///
/// The JSON shape follows the wire shape the line was parsed as: legacy lines
/// are forwarded raw, tagged lines as typed objects.
///
/// # Examples
///
/// ```
/// use armlink::protocol::parser::{TelemetryParser, WireFormat};
/// use armlink::telemetry::message::telemetry_message;
///
/// let mut parser = TelemetryParser::new(WireFormat::Tagged);
/// let parsed = parser.parse("s:30:45").into_parsed().unwrap();
/// let json = telemetry_message(&parsed, "s:30:45", 1700000000000).unwrap();
/// assert_eq!(
///     json,
///     r#"{"timestamp":1700000000000,"type":"steering","data":{"current":"30","target":"45"}}"#
/// );
/// ```
pub fn telemetry_message(parsed: &Parsed, raw_line: &str, timestamp: i64) -> Result<String> {
    let json = match parsed.shape {
        WireShape::Legacy => raw_message(raw_line, timestamp)?,
        WireShape::Tagged => serde_json::to_string(&TypedMessage {
            timestamp,
            kind: parsed.record.kind(),
            data: &parsed.record,
        })?,
    };
    Ok(json)
}

/// Serialize a raw line as the legacy generation relays it
///
/// The line does not have to parse; the legacy relay forwards everything.
pub fn raw_message(line: &str, timestamp: i64) -> Result<String> {
    Ok(serde_json::to_string(&RawMessage {
        timestamp,
        data: format!("{}\n", line),
    })?)
}

/// Serialize a robot link up/down event
pub fn link_state_message(connected: bool) -> Result<String> {
    Ok(serde_json::to_string(&LinkStateMessage {
        kind: LINK_STATE_TYPE,
        data: LinkState { connected },
    })?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::parser::{TelemetryParser, WireFormat};
    use serde_json::{json, Value};

    fn message(format: WireFormat, line: &str) -> Value {
        let mut parser = TelemetryParser::new(format);
        let parsed = parser.parse(line).into_parsed().unwrap();
        let text = telemetry_message(&parsed, line, 42).unwrap();
        serde_json::from_str(&text).unwrap()
    }

    #[test]
    fn test_legacy_line_is_forwarded_raw_with_newline() {
        assert_eq!(
            message(WireFormat::Legacy, "3:120:100:50:1:0"),
            json!({"timestamp": 42, "data": "3:120:100:50:1:0\n"})
        );
    }

    #[test]
    fn test_legacy_raw_text_is_escaped() {
        let mut parser = TelemetryParser::new(WireFormat::Legacy);
        let line = "3:\"q\":1:2:3:4\\";
        let parsed = parser.parse(line).into_parsed().unwrap();
        let text = telemetry_message(&parsed, line, 1).unwrap();

        assert!(text.contains(r#"\"q\""#));
        assert!(text.contains(r"\\\n"));
        let value: Value = serde_json::from_str(&text).unwrap();
        assert_eq!(value["data"], format!("{}\n", line));
    }

    #[test]
    fn test_raw_message_for_unparsed_line() {
        let value: Value = serde_json::from_str(&raw_message("READY", 7).unwrap()).unwrap();
        assert_eq!(value, json!({"timestamp": 7, "data": "READY\n"}));
    }

    #[test]
    fn test_tagged_motor_message() {
        assert_eq!(
            message(WireFormat::Tagged, "m:5:200:180:40:12"),
            json!({
                "timestamp": 42,
                "type": "motor",
                "data": {"pin": "5", "target": "200", "actual": "180", "pulse": "40", "pwm": "12"}
            })
        );
    }

    #[test]
    fn test_tagged_arm_message() {
        assert_eq!(
            message(WireFormat::Tagged, "a:1:2:3:4:5:6:7:8"),
            json!({
                "timestamp": 42,
                "type": "arm",
                "data": {
                    "base": {"current": "1", "target": "2"},
                    "linkOne": {"current": "3", "target": "4"},
                    "linkTwo": {"current": "5", "target": "6"},
                    "gripper": {"current": "7", "target": "8"}
                }
            })
        );
    }

    #[test]
    fn test_link_state_message() {
        let value: Value = serde_json::from_str(&link_state_message(true).unwrap()).unwrap();
        assert_eq!(value, json!({"type": "bluetooth", "data": {"connected": true}}));

        let value: Value = serde_json::from_str(&link_state_message(false).unwrap()).unwrap();
        assert_eq!(value["data"]["connected"], false);
    }

    #[test]
    fn test_timestamp_is_epoch_millis() {
        // 2020-01-01 in milliseconds
        assert!(timestamp_ms() > 1_577_836_800_000);
    }
}
