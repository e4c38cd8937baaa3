//! # Telemetry Record Types
//!
//! Typed telemetry reported by the robot. Every field is kept as the text the
//! robot sent; nothing is coerced to a number.

use serde::Serialize;

/// Field separator for every telemetry line
pub const FIELD_SEPARATOR: char = ':';

/// Tag of a motor report in the tagged shape
pub const TAG_MOTOR: &str = "m";

/// Tag of a steering report in the tagged shape
pub const TAG_STEERING: &str = "s";

/// Tag of an arm report in the tagged shape
pub const TAG_ARM: &str = "a";

/// Field count of a legacy motor line (`pin:pulse:target:pwm:dir:brake`)
pub const LEGACY_MOTOR_FIELDS: usize = 6;

/// Minimum field count after the tag of an `m` line
pub const MOTOR_FIELDS: usize = 5;

/// Minimum field count after the tag of an `s` line
pub const STEERING_FIELDS: usize = 2;

/// Minimum field count after the tag of an `a` line
pub const ARM_FIELDS: usize = 8;

/// Shape a line was actually parsed as
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WireShape {
    Legacy,
    Tagged,
}

/// Display channel a motor report is routed to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MotorSlot {
    /// The first pin ever reported
    A,
    /// Any other pin
    B,
}

/// Direction and brake flags, only reported by the legacy shape
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DriveFlags {
    pub direction: String,
    pub brake: String,
}

/// Motor controller report
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MotorReport {
    pub pin: String,
    pub target: String,
    /// Measured speed, only reported by the tagged shape
    #[serde(skip_serializing_if = "Option::is_none")]
    pub actual: Option<String>,
    pub pulse: String,
    pub pwm: String,
    #[serde(skip)]
    pub drive: Option<DriveFlags>,
}

/// Steering servo report
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SteeringReport {
    pub current: String,
    pub target: String,
}

/// Current and target angle of one arm joint
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct JointAngles {
    pub current: String,
    pub target: String,
}

impl JointAngles {
    pub fn new(current: impl Into<String>, target: impl Into<String>) -> Self {
        Self {
            current: current.into(),
            target: target.into(),
        }
    }
}

/// Arm report covering all four joints
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ArmReport {
    pub base: JointAngles,
    pub link_one: JointAngles,
    pub link_two: JointAngles,
    pub gripper: JointAngles,
}

/// One parsed telemetry line
///
/// Serializes as the bare report, which is the `data` object of a relay
/// message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum TelemetryRecord {
    Motor(MotorReport),
    Steering(SteeringReport),
    Arm(ArmReport),
}

impl TelemetryRecord {
    /// Relay message `type` of this record
    pub fn kind(&self) -> &'static str {
        match self {
            TelemetryRecord::Motor(_) => "motor",
            TelemetryRecord::Steering(_) => "steering",
            TelemetryRecord::Arm(_) => "arm",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_names() {
        let steering = TelemetryRecord::Steering(SteeringReport {
            current: "30".to_string(),
            target: "45".to_string(),
        });
        assert_eq!(steering.kind(), "steering");
    }

    #[test]
    fn test_motor_serializes_without_legacy_flags() {
        let motor = TelemetryRecord::Motor(MotorReport {
            pin: "3".to_string(),
            target: "100".to_string(),
            actual: None,
            pulse: "120".to_string(),
            pwm: "50".to_string(),
            drive: Some(DriveFlags {
                direction: "1".to_string(),
                brake: "0".to_string(),
            }),
        });

        let value = serde_json::to_value(&motor).unwrap();
        assert_eq!(
            value,
            serde_json::json!({"pin": "3", "target": "100", "pulse": "120", "pwm": "50"})
        );
    }

    #[test]
    fn test_arm_uses_camel_case_joint_names() {
        let arm = TelemetryRecord::Arm(ArmReport {
            base: JointAngles::new("1", "2"),
            link_one: JointAngles::new("3", "4"),
            link_two: JointAngles::new("5", "6"),
            gripper: JointAngles::new("7", "8"),
        });

        let value = serde_json::to_value(&arm).unwrap();
        assert_eq!(value["linkOne"]["current"], "3");
        assert_eq!(value["linkTwo"]["target"], "6");
        assert_eq!(value["gripper"]["target"], "8");
    }
}
