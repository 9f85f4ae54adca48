// options.rs

// Operator input, independent of how it was collected. Exactly one intent must be
// selected; everything else refines how a motion goal is built and recorded.

use std::path::PathBuf;
use std::time::Duration;

use crate::config::ConfigError;

/// Motion service commands the operator can ask for
#[derive(Clone, Debug, PartialEq)]
pub enum MotionIntent {
    /// IDLE goal
    Idle,
    /// STOP goal
    Stop,
    /// PREP goal
    Prep,
    /// Move to the live pose with the position/attitude overrides applied
    Move,
    /// Replay a recorded segment
    Execute(PathBuf),
}

impl MotionIntent {
    /// Whether the planner has to be reconfigured before the goal is sent
    pub fn needs_planner(&self) -> bool {
        matches!(self, MotionIntent::Move | MotionIntent::Execute(_))
    }
}

/// The one thing the operator asked for
#[derive(Clone, Debug, PartialEq)]
pub enum Intent {
    /// Switch the localization pipeline
    SwitchPipeline(String),
    /// Send a goal to the motion service
    Motion(MotionIntent),
}

/// Validated operator request
#[derive(Clone, Debug, PartialEq)]
pub struct Request {
    /// What to do
    pub intent: Intent,
    /// Where to record the segment of a successful motion
    pub record: Option<PathBuf>,
    /// "X Y Z", any prefix of it, or empty
    pub position: String,
    /// "angle X Y Z", "yaw", or empty
    pub attitude: String,
    /// Deferral added to the live timestamp of a MOVE
    pub delay: Duration,
}

impl Request {
    /// Request for `intent` with no overrides, recording or delay
    pub fn new(intent: Intent) -> Self {
        Request {
            intent,
            record: None,
            position: String::new(),
            attitude: String::new(),
            delay: Duration::ZERO,
        }
    }
}

/// Raw operator selections, as collected from the command line
#[derive(Clone, Debug, Default, PartialEq)]
pub struct OperatorRequest {
    /// Pipeline to switch to
    pub pipeline: Option<String>,
    /// MOVE selected
    pub move_to: bool,
    /// STOP selected
    pub stop: bool,
    /// IDLE selected
    pub idle: bool,
    /// PREP selected
    pub prep: bool,
    /// Segment to replay
    pub execute: Option<PathBuf>,
    /// Where to record the flown segment
    pub record: Option<PathBuf>,
    /// Position override
    pub position: String,
    /// Attitude override
    pub attitude: String,
    /// Seconds
    pub wait: f64,
}

impl OperatorRequest {
    /// Picks the single intent and checks the remaining inputs
    pub fn validate(self) -> Result<Request, ConfigError> {
        let pipeline = self.pipeline.filter(|pipeline| !pipeline.is_empty());
        let execute = self.execute.filter(|path| !path.as_os_str().is_empty());

        let mut selected: Vec<(&str, Intent)> = Vec::new();
        if let Some(pipeline) = pipeline {
            selected.push(("--loc", Intent::SwitchPipeline(pipeline)));
        }
        if self.move_to {
            selected.push(("--move", Intent::Motion(MotionIntent::Move)));
        }
        if self.stop {
            selected.push(("--stop", Intent::Motion(MotionIntent::Stop)));
        }
        if self.idle {
            selected.push(("--idle", Intent::Motion(MotionIntent::Idle)));
        }
        if self.prep {
            selected.push(("--prep", Intent::Motion(MotionIntent::Prep)));
        }
        if let Some(path) = execute {
            selected.push(("--exec", Intent::Motion(MotionIntent::Execute(path))));
        }

        if selected.len() > 1 {
            let flags: Vec<&str> = selected.iter().map(|(flag, _)| *flag).collect();
            return Err(ConfigError::ConflictingIntents(flags.join(", ")));
        }
        let (_, intent) = selected.pop().ok_or(ConfigError::MissingIntent)?;

        if !(self.wait >= 0.0) || !self.wait.is_finite() {
            return Err(ConfigError::NegativeDelay(self.wait));
        }

        Ok(Request {
            intent,
            record: self.record.filter(|path| !path.as_os_str().is_empty()),
            position: self.position,
            attitude: self.attitude,
            delay: Duration::from_secs_f64(self.wait),
        })
    }
}
