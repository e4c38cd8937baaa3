//! # Telemetry Display Rendering
//!
//! Turns a parsed telemetry record into the text of one of the four status
//! regions. Values are printed exactly as received.

use std::fmt;

use super::parser::Parsed;
use super::record::{ArmReport, MotorReport, MotorSlot, SteeringReport, TelemetryRecord};

/// One of the four free-text status regions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DisplayRegion {
    /// Box 1
    Arm,
    /// Box 2
    Steering,
    /// Box 3, first motor pin seen
    MotorA,
    /// Box 4, every other motor pin
    MotorB,
}

impl fmt::Display for DisplayRegion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DisplayRegion::Arm => "arm",
            DisplayRegion::Steering => "steering",
            DisplayRegion::MotorA => "motor-a",
            DisplayRegion::MotorB => "motor-b",
        };
        f.write_str(name)
    }
}

/// Pick the region for a parsed record and render its text
pub fn render(parsed: &Parsed) -> (DisplayRegion, String) {
    match &parsed.record {
        TelemetryRecord::Motor(motor) => {
            let region = match parsed.slot {
                Some(MotorSlot::B) => DisplayRegion::MotorB,
                _ => DisplayRegion::MotorA,
            };
            (region, render_motor(motor))
        }
        TelemetryRecord::Steering(steering) => (DisplayRegion::Steering, render_steering(steering)),
        TelemetryRecord::Arm(arm) => (DisplayRegion::Arm, render_arm(arm)),
    }
}

fn render_motor(motor: &MotorReport) -> String {
    match (&motor.drive, &motor.actual) {
        (Some(drive), _) => format!(
            "Pin:{}\nPulse:{}\nTarget:{}\nPWM:{}\nDir:{};BK:{}",
            motor.pin, motor.pulse, motor.target, motor.pwm, drive.direction, drive.brake
        ),
        (None, actual) => format!(
            "Pin:{}\nTarget:{}\nActual:{}\nPulse:{}\nPWM:{}",
            motor.pin,
            motor.target,
            actual.as_deref().unwrap_or("-"),
            motor.pulse,
            motor.pwm
        ),
    }
}

fn render_steering(steering: &SteeringReport) -> String {
    format!("Steer:{}\nTarget:{}", steering.current, steering.target)
}

fn render_arm(arm: &ArmReport) -> String {
    format!(
        "Base:{}/{}\nL1:{}/{}\nL2:{}/{}\nGrip:{}/{}",
        arm.base.current,
        arm.base.target,
        arm.link_one.current,
        arm.link_one.target,
        arm.link_two.current,
        arm.link_two.target,
        arm.gripper.current,
        arm.gripper.target
    )
}
