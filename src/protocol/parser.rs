//! # Telemetry Parser
//!
//! Maps one telemetry line to a [`TelemetryRecord`].
//!
//! Two incompatible line shapes exist in the robot firmware:
//!
//! | Shape | Layout | Record |
//! |-------|--------|--------|
//! | Legacy | `pin:pulse:target:pwm:dir:brake` | Motor |
//! | Tagged | `m:pin:target:actual:pulse:pwm` | Motor |
//! | Tagged | `s:current:target` | Steering |
//! | Tagged | `a:curBase:tgtBase:curL1:tgtL1:curL2:tgtL2:curGrip:tgtGrip` | Arm |
//!
//! The firmware does not announce which shape it speaks, so the shape is
//! either fixed by configuration or sniffed from the first field.

use serde::Deserialize;
use tracing::debug;

use super::record::*;

/// Which telemetry line shape to accept
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WireFormat {
    /// Only untagged six-field motor lines
    Legacy,
    /// Only `m`/`s`/`a` tagged lines
    Tagged,
    /// Tagged when the first field is a known tag, legacy otherwise
    Auto,
}

/// A successfully parsed line
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Parsed {
    pub shape: WireShape,
    pub record: TelemetryRecord,
    /// Set for motor records only
    pub slot: Option<MotorSlot>,
}

/// Why a line produced no record
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IgnoreReason {
    UnknownTag(String),
    TooFewFields { expected: usize, found: usize },
}

/// Result of parsing one line
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParseOutcome {
    Record(Parsed),
    Ignored(IgnoreReason),
}

impl ParseOutcome {
    /// The parsed record, if any
    pub fn into_parsed(self) -> Option<Parsed> {
        match self {
            ParseOutcome::Record(parsed) => Some(parsed),
            ParseOutcome::Ignored(_) => None,
        }
    }
}

/// Stateful telemetry parser
///
/// Keeps the first motor pin seen so that pin always lands in [`MotorSlot::A`].
///
/// # Examples
///
/// ```
/// use armlink::protocol::parser::{TelemetryParser, WireFormat};
/// use armlink::protocol::record::MotorSlot;
///
/// let mut parser = TelemetryParser::new(WireFormat::Legacy);
/// let parsed = parser.parse("3:120:100:50:1:0").into_parsed().unwrap();
/// assert_eq!(parsed.slot, Some(MotorSlot::A));
/// ```
#[derive(Debug)]
pub struct TelemetryParser {
    format: WireFormat,
    first_pin: Option<String>,
}

impl TelemetryParser {
    pub fn new(format: WireFormat) -> Self {
        Self {
            format,
            first_pin: None,
        }
    }

    pub fn format(&self) -> WireFormat {
        self.format
    }

    /// Parse one trimmed line
    ///
    /// Unrecognized or short lines are ignored and logged at debug level.
    pub fn parse(&mut self, line: &str) -> ParseOutcome {
        let fields: Vec<&str> = line.split(FIELD_SEPARATOR).collect();

        let outcome = match self.shape_of_fields(&fields) {
            WireShape::Legacy => self.parse_legacy(&fields),
            WireShape::Tagged => self.parse_tagged(&fields),
        };

        if let ParseOutcome::Ignored(reason) = &outcome {
            debug!("Ignoring telemetry line {:?}: {:?}", line, reason);
        }
        outcome
    }

    /// Forget the slotted pin (e.g. after switching robots)
    pub fn reset(&mut self) {
        self.first_pin = None;
    }

    /// Shape a line is read as, whether or not it parses
    pub fn shape_of(&self, line: &str) -> WireShape {
        let first = line.split(FIELD_SEPARATOR).next().unwrap_or_default();
        self.shape_of_fields(&[first])
    }

    fn shape_of_fields(&self, fields: &[&str]) -> WireShape {
        match self.format {
            WireFormat::Legacy => WireShape::Legacy,
            WireFormat::Tagged => WireShape::Tagged,
            WireFormat::Auto => match fields.first() {
                Some(&TAG_MOTOR) | Some(&TAG_STEERING) | Some(&TAG_ARM) => WireShape::Tagged,
                _ => WireShape::Legacy,
            },
        }
    }

    fn parse_legacy(&mut self, fields: &[&str]) -> ParseOutcome {
        if fields.len() < LEGACY_MOTOR_FIELDS {
            return ParseOutcome::Ignored(IgnoreReason::TooFewFields {
                expected: LEGACY_MOTOR_FIELDS,
                found: fields.len(),
            });
        }

        let motor = MotorReport {
            pin: fields[0].to_string(),
            pulse: fields[1].to_string(),
            target: fields[2].to_string(),
            pwm: fields[3].to_string(),
            actual: None,
            drive: Some(DriveFlags {
                direction: fields[4].to_string(),
                brake: fields[5].to_string(),
            }),
        };
        self.motor(WireShape::Legacy, motor)
    }

    fn parse_tagged(&mut self, fields: &[&str]) -> ParseOutcome {
        let (tag, values) = match fields.split_first() {
            Some((tag, values)) => (*tag, values),
            None => return ParseOutcome::Ignored(IgnoreReason::UnknownTag(String::new())),
        };

        let expected = match tag {
            TAG_MOTOR => MOTOR_FIELDS,
            TAG_STEERING => STEERING_FIELDS,
            TAG_ARM => ARM_FIELDS,
            other => return ParseOutcome::Ignored(IgnoreReason::UnknownTag(other.to_string())),
        };
        if values.len() < expected {
            return ParseOutcome::Ignored(IgnoreReason::TooFewFields {
                expected,
                found: values.len(),
            });
        }

        let v = |i: usize| values[i].to_string();
        match tag {
            TAG_MOTOR => self.motor(
                WireShape::Tagged,
                MotorReport {
                    pin: v(0),
                    target: v(1),
                    actual: Some(v(2)),
                    pulse: v(3),
                    pwm: v(4),
                    drive: None,
                },
            ),
            TAG_STEERING => ParseOutcome::Record(Parsed {
                shape: WireShape::Tagged,
                record: TelemetryRecord::Steering(SteeringReport {
                    current: v(0),
                    target: v(1),
                }),
                slot: None,
            }),
            _ => ParseOutcome::Record(Parsed {
                shape: WireShape::Tagged,
                record: TelemetryRecord::Arm(ArmReport {
                    base: JointAngles::new(v(0), v(1)),
                    link_one: JointAngles::new(v(2), v(3)),
                    link_two: JointAngles::new(v(4), v(5)),
                    gripper: JointAngles::new(v(6), v(7)),
                }),
                slot: None,
            }),
        }
    }

    fn motor(&mut self, shape: WireShape, motor: MotorReport) -> ParseOutcome {
        let first = self.first_pin.get_or_insert_with(|| motor.pin.clone());
        let slot = if *first == motor.pin {
            MotorSlot::A
        } else {
            MotorSlot::B
        };

        ParseOutcome::Record(Parsed {
            shape,
            record: TelemetryRecord::Motor(motor),
            slot: Some(slot),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(parser: &mut TelemetryParser, line: &str) -> Parsed {
        parser
            .parse(line)
            .into_parsed()
            .unwrap_or_else(|| panic!("expected a record for {:?}", line))
    }

    #[test]
    fn test_legacy_motor_line() {
        let mut parser = TelemetryParser::new(WireFormat::Legacy);
        let parsed = record(&mut parser, "3:120:100:50:1:0");

        assert_eq!(parsed.shape, WireShape::Legacy);
        match parsed.record {
            TelemetryRecord::Motor(motor) => {
                assert_eq!(motor.pin, "3");
                assert_eq!(motor.pulse, "120");
                assert_eq!(motor.target, "100");
                assert_eq!(motor.pwm, "50");
                assert_eq!(motor.actual, None);
                let drive = motor.drive.unwrap();
                assert_eq!(drive.direction, "1");
                assert_eq!(drive.brake, "0");
            }
            other => panic!("Expected motor record, got: {:?}", other),
        }
    }

    #[test]
    fn test_legacy_first_pin_always_slot_a() {
        let mut parser = TelemetryParser::new(WireFormat::Legacy);

        assert_eq!(record(&mut parser, "3:120:100:50:1:0").slot, Some(MotorSlot::A));
        assert_eq!(record(&mut parser, "5:10:20:30:0:1").slot, Some(MotorSlot::B));
        assert_eq!(record(&mut parser, "3:121:100:51:1:0").slot, Some(MotorSlot::A));
        assert_eq!(record(&mut parser, "7:1:2:3:0:0").slot, Some(MotorSlot::B));
        assert_eq!(record(&mut parser, "3:0:0:0:0:1").slot, Some(MotorSlot::A));
    }

    #[test]
    fn test_legacy_too_few_fields() {
        let mut parser = TelemetryParser::new(WireFormat::Legacy);
        assert_eq!(
            parser.parse("3:120:100:50:1"),
            ParseOutcome::Ignored(IgnoreReason::TooFewFields { expected: 6, found: 5 })
        );
    }

    #[test]
    fn test_tagged_motor_line() {
        let mut parser = TelemetryParser::new(WireFormat::Tagged);
        let parsed = record(&mut parser, "m:5:200:180:40:12");

        assert_eq!(parsed.shape, WireShape::Tagged);
        assert_eq!(parsed.slot, Some(MotorSlot::A));
        assert_eq!(
            parsed.record,
            TelemetryRecord::Motor(MotorReport {
                pin: "5".to_string(),
                target: "200".to_string(),
                actual: Some("180".to_string()),
                pulse: "40".to_string(),
                pwm: "12".to_string(),
                drive: None,
            })
        );
    }

    #[test]
    fn test_tagged_steering_line() {
        let mut parser = TelemetryParser::new(WireFormat::Tagged);
        let parsed = record(&mut parser, "s:30:45");

        assert_eq!(
            parsed.record,
            TelemetryRecord::Steering(SteeringReport {
                current: "30".to_string(),
                target: "45".to_string(),
            })
        );
        assert_eq!(parsed.slot, None);
    }

    #[test]
    fn test_tagged_arm_line() {
        let mut parser = TelemetryParser::new(WireFormat::Tagged);
        let parsed = record(&mut parser, "a:1:2:3:4:5:6:7:8");

        assert_eq!(
            parsed.record,
            TelemetryRecord::Arm(ArmReport {
                base: JointAngles::new("1", "2"),
                link_one: JointAngles::new("3", "4"),
                link_two: JointAngles::new("5", "6"),
                gripper: JointAngles::new("7", "8"),
            })
        );
    }

    #[test]
    fn test_tagged_unknown_tag_ignored() {
        let mut parser = TelemetryParser::new(WireFormat::Tagged);
        assert_eq!(
            parser.parse("x:1:2"),
            ParseOutcome::Ignored(IgnoreReason::UnknownTag("x".to_string()))
        );
    }

    #[test]
    fn test_tagged_insufficient_fields_ignored() {
        let mut parser = TelemetryParser::new(WireFormat::Tagged);
        assert!(parser.parse("m:5:200:180:40").into_parsed().is_none());
        assert!(parser.parse("s:30").into_parsed().is_none());
        assert!(parser.parse("a:1:2:3:4:5:6:7").into_parsed().is_none());
    }

    #[test]
    fn test_tagged_extra_fields_accepted() {
        let mut parser = TelemetryParser::new(WireFormat::Tagged);
        assert!(parser.parse("s:30:45:99").into_parsed().is_some());
    }

    #[test]
    fn test_fields_are_not_validated_as_numbers() {
        let mut parser = TelemetryParser::new(WireFormat::Tagged);
        let parsed = record(&mut parser, "s:left:-1.5");
        match parsed.record {
            TelemetryRecord::Steering(s) => {
                assert_eq!(s.current, "left");
                assert_eq!(s.target, "-1.5");
            }
            other => panic!("Expected steering record, got: {:?}", other),
        }
    }

    #[test]
    fn test_auto_sniffs_shape_per_line() {
        let mut parser = TelemetryParser::new(WireFormat::Auto);

        assert_eq!(record(&mut parser, "s:30:45").shape, WireShape::Tagged);
        assert_eq!(record(&mut parser, "3:120:100:50:1:0").shape, WireShape::Legacy);
        assert_eq!(record(&mut parser, "m:5:200:180:40:12").shape, WireShape::Tagged);
        // Not a tag and too short for legacy
        assert!(parser.parse("x:1:2").into_parsed().is_none());
    }

    #[test]
    fn test_shape_of_unparseable_lines() {
        let auto = TelemetryParser::new(WireFormat::Auto);
        assert_eq!(auto.shape_of("READY"), WireShape::Legacy);
        assert_eq!(auto.shape_of("s:1"), WireShape::Tagged);
        assert_eq!(auto.shape_of(""), WireShape::Legacy);

        let legacy = TelemetryParser::new(WireFormat::Legacy);
        assert_eq!(legacy.shape_of("m:5:200:180:40:12"), WireShape::Legacy);

        let tagged = TelemetryParser::new(WireFormat::Tagged);
        assert_eq!(tagged.shape_of("READY"), WireShape::Tagged);
    }

    #[test]
    fn test_tagged_format_rejects_legacy_line() {
        let mut parser = TelemetryParser::new(WireFormat::Tagged);
        assert!(parser.parse("3:120:100:50:1:0").into_parsed().is_none());
    }

    #[test]
    fn test_tagged_motors_share_slotting() {
        let mut parser = TelemetryParser::new(WireFormat::Tagged);
        assert_eq!(record(&mut parser, "m:5:1:1:1:1").slot, Some(MotorSlot::A));
        assert_eq!(record(&mut parser, "m:6:1:1:1:1").slot, Some(MotorSlot::B));

        parser.reset();
        assert_eq!(record(&mut parser, "m:6:1:1:1:1").slot, Some(MotorSlot::A));
    }
}
