// command/goal.rs

// Goal, feedback and result messages exchanged with the two action services
// (localization pipeline switch and mobility motion), plus the pose and segment
// types embedded in them. Everything here is plain data: built once, sent, dropped.

use nalgebra::{UnitQuaternion, Vector3};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Position and orientation of the robot body in some frame.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Pose {
    /// Cartesian position (meters)
    pub position: Vector3<f64>,
    /// Attitude as a unit quaternion
    pub orientation: UnitQuaternion<f64>,
}

impl Pose {
    /// Pose from its parts
    pub fn new(position: Vector3<f64>, orientation: UnitQuaternion<f64>) -> Self {
        Pose {
            position,
            orientation,
        }
    }

    /// Pose at the origin with identity attitude
    pub fn identity() -> Self {
        Pose::new(Vector3::zeros(), UnitQuaternion::identity())
    }
}

/// A pose with the time it is valid for and the frame it is expressed in.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct StampedPose {
    /// Seconds on the robot clock
    pub stamp: f64,
    /// Frame the pose is expressed in
    pub frame_id: String,
    /// The pose itself
    pub pose: Pose,
}

/// Linear and angular components of a velocity or acceleration.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Twist {
    /// Meters per second, or per second squared
    pub linear: Vector3<f64>,
    /// Radians per second, or per second squared
    pub angular: Vector3<f64>,
}

/// One sample of a planned trajectory.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Setpoint {
    /// Seconds on the robot clock at which this sample applies
    pub when: f64,
    /// Where the body should be
    pub pose: Pose,
    /// Velocity at this sample
    pub twist: Twist,
    /// Acceleration at this sample
    pub accel: Twist,
}

/// A recorded, replayable trajectory.
pub type Segment = Vec<Setpoint>;

/// Goal for the localization pipeline switch service.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SwitchGoal {
    /// Pipeline name (none, ml, ar, hr, ...)
    pub pipeline: String,
}

/// Switch service feedback. The service reports nothing useful mid-switch.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct SwitchFeedback;

/// Switch service result.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct SwitchResult {
    /// Service-specific response code
    pub response: i32,
}

/// What the motion service is asked to do.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MotionCommand {
    /// Hold position with the propulsion idle
    Idle,
    /// Stop and hold the current pose
    Stop,
    /// Prepare the propulsion for the flight mode
    Prep,
    /// Plan through the given poses, in order
    Move {
        /// Targets, each stamped with when it should be reached
        states: Vec<StampedPose>,
    },
    /// Replay a previously planned segment
    Exec {
        /// Setpoints to fly
        segment: Segment,
    },
}

impl MotionCommand {
    /// Upper-case command name as shown to the operator
    pub fn name(&self) -> &'static str {
        match self {
            MotionCommand::Idle => "IDLE",
            MotionCommand::Stop => "STOP",
            MotionCommand::Prep => "PREP",
            MotionCommand::Move { .. } => "MOVE",
            MotionCommand::Exec { .. } => "EXEC",
        }
    }
}

/// Goal for the mobility motion service. Also the on-disk format of a recorded segment.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MotionGoal {
    /// Speed and tolerance profile the service flies with
    pub flight_mode: String,
    /// What to do
    pub command: MotionCommand,
}

/// Internal state of the motion service, carried in feedback.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[allow(missing_docs)]
pub enum MotionState {
    Initializing,
    WaitingForStop,
    Waiting,
    Idling,
    Stopping,
    Prepping,
    Bootstrapping,
    Planning,
    Validating,
    Preparing,
    Controlling,
    Replanning,
    Revalidating,
    Unknown,
}

impl fmt::Display for MotionState {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let name = match self {
            MotionState::Initializing => "INITIALIZING",
            MotionState::WaitingForStop => "WAITING_FOR_STOP",
            MotionState::Waiting => "WAITING",
            MotionState::Idling => "IDLING",
            MotionState::Stopping => "STOPPING",
            MotionState::Prepping => "PREPPING",
            MotionState::Bootstrapping => "BOOTSTRAPPING",
            MotionState::Planning => "PLANNING",
            MotionState::Validating => "VALIDATING",
            MotionState::Preparing => "PREPARING",
            MotionState::Controlling => "CONTROLLING",
            MotionState::Replanning => "REPLANNING",
            MotionState::Revalidating => "REVALIDATING",
            MotionState::Unknown => "UNKNOWN",
        };
        f.write_str(name)
    }
}

/// Tracking errors reported while a motion goal is being executed.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct MotionProgress {
    /// meters
    pub error_position: f64,
    /// radians
    pub error_attitude: f64,
    /// meters per second
    pub error_velocity: f64,
    /// radians per second
    pub error_omega: f64,
}

/// Motion service feedback.
#[derive(Clone, Debug, PartialEq)]
pub struct MotionFeedback {
    /// What the service is doing
    pub state: MotionState,
    /// Tracking errors so far
    pub progress: MotionProgress,
}

impl fmt::Display for MotionFeedback {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let p = &self.progress;
        write!(
            f,
            "POS: {:.2} mm ATT: {:.2} deg VEL: {:.2} mm/s OMEGA: {:.2} deg/s [{}]",
            1000.0 * p.error_position,
            p.error_attitude.to_degrees(),
            1000.0 * p.error_velocity,
            p.error_omega.to_degrees(),
            self.state
        )
    }
}

/// Motion service result: a detailed response code and the segment that was flown.
#[derive(Clone, Debug, PartialEq)]
pub struct MotionResult {
    /// A [`MotionResponse`](super::MotionResponse) code
    pub response: i32,
    /// Empty unless a segment was planned
    pub segment: Segment,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn feedback_line_converts_units() {
        let feedback = MotionFeedback {
            state: MotionState::Controlling,
            progress: MotionProgress {
                error_position: 0.0125,
                error_attitude: std::f64::consts::PI,
                error_velocity: 0.001,
                error_omega: 0.0,
            },
        };
        assert_eq!(
            feedback.to_string(),
            "POS: 12.50 mm ATT: 180.00 deg VEL: 1.00 mm/s OMEGA: 0.00 deg/s [CONTROLLING]"
        );
    }

    #[test]
    fn command_names_are_upper_case() {
        assert_eq!(MotionCommand::Idle.name(), "IDLE");
        assert_eq!(MotionCommand::Exec { segment: vec![] }.name(), "EXEC");
        assert_eq!(MotionCommand::Move { states: vec![] }.name(), "MOVE");
    }
}
