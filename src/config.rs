// config.rs

// Tool configuration, loaded from an optional YAML file and overridden from the
// command line. Timeouts are validated here, before any remote interaction.

use log::info;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

use crate::action::ActionTimeouts;

/// Configuration and operator input errors. All of them stop the tool before it
/// talks to any service.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The config file could not be opened
    #[error("could not read config {}: {source}", .path.display())]
    Read {
        /// Config file
        path: PathBuf,
        /// Underlying failure
        #[source]
        source: std::io::Error,
    },
    /// The config file is not valid YAML for [`TeleopConfig`]
    #[error("could not parse config {}: {source}", .path.display())]
    Parse {
        /// Config file
        path: PathBuf,
        /// Parser failure
        #[source]
        source: serde_yaml::Error,
    },
    /// Zero, negative or NaN timeout
    #[error("your {0} timeout must be positive")]
    NonPositiveTimeout(&'static str),
    /// Infinite, or too long to be represented
    #[error("your {0} timeout of {1} s is out of range")]
    TimeoutOutOfRange(&'static str, f64),
    /// Negative or non-finite deferral
    #[error("deferral delay must not be negative, got {0} s")]
    NegativeDelay(f64),
    /// No command was selected
    #[error("you must specify one of --loc, --move, --stop, --idle, --prep or --exec <segment>")]
    MissingIntent,
    /// More than one command was selected; lists the flags
    #[error("you can only specify one of --loc, --move, --stop, --idle, --prep or --exec <segment>, got {0}")]
    ConflictingIntents(String),
}

/// Main configuration structure for the teleop tool
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TeleopConfig {
    /// Action session timeouts, shared by both services
    pub timeouts: TimeoutConfig,
    /// Frames used to look up the live pose
    pub frames: FrameConfig,
    /// Choreographer settings pushed before MOVE and EXEC
    pub planner: PlannerConfig,
    /// Flight mode requested for motion goals
    pub flight_mode: String,
}

/// Action timeouts in seconds
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Until both services are connected
    pub connect: f64,
    /// From submission until the goal goes active
    pub active: f64,
    /// Longest silence from an active goal
    pub response: f64,
    /// Disabled unless positive
    pub deadline: f64,
}

/// Frame names for the pose lookup
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FrameConfig {
    /// Robot namespace, prefixed to the body frame when set
    pub namespace: String,
    /// Frame goals are expressed in
    pub world: String,
    /// Frame of the robot body
    pub body: String,
}

/// Planner parameters. Desired limits are only pushed when positive.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlannerConfig {
    /// Path planning algorithm
    pub planner: String,
    /// Keep the body facing the direction of travel
    pub face_forward: bool,
    /// Segment sampling rate (Hz)
    pub desired_rate: Option<f64>,
    /// m/s
    pub desired_vel: Option<f64>,
    /// m/s^2
    pub desired_accel: Option<f64>,
    /// rad/s
    pub desired_omega: Option<f64>,
    /// rad/s^2
    pub desired_alpha: Option<f64>,
    /// Check for collisions while flying
    pub collision_checking: bool,
    /// Validate the segment before flying it
    pub validation: bool,
    /// Move to the first setpoint before an EXEC
    pub bootstrapping: bool,
    /// Start as soon as the goal arrives; otherwise honour goal timestamps
    pub immediate: bool,
    /// Synchronize the segment to the robot clock
    pub timesync: bool,
    /// Replan around obstacles
    pub replanning: bool,
}

impl Default for TeleopConfig {
    fn default() -> Self {
        TeleopConfig {
            timeouts: TimeoutConfig::default(),
            frames: FrameConfig::default(),
            planner: PlannerConfig::default(),
            flight_mode: String::new(),
        }
    }
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        TimeoutConfig {
            connect: 30.0,
            active: 30.0,
            response: 30.0,
            deadline: -1.0,
        }
    }
}

impl Default for FrameConfig {
    fn default() -> Self {
        FrameConfig {
            namespace: String::new(),
            world: "world".to_string(),
            body: "body".to_string(),
        }
    }
}

impl Default for PlannerConfig {
    fn default() -> Self {
        PlannerConfig {
            planner: "trapezoidal".to_string(),
            face_forward: false,
            desired_rate: Some(1.0),
            desired_vel: None,
            desired_accel: None,
            desired_omega: None,
            desired_alpha: None,
            collision_checking: true,
            validation: true,
            bootstrapping: true,
            immediate: true,
            timesync: false,
            replanning: false,
        }
    }
}

impl TeleopConfig {
    /// Loads a configuration file. Missing keys take their defaults.
    pub fn from_yaml_file(path: &Path) -> Result<Self, ConfigError> {
        let file = File::open(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let config: TeleopConfig = serde_yaml::from_reader(file).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        info!("Loaded configuration from {}", path.display());
        Ok(config)
    }

    /// Checks everything that would otherwise fail mid-run
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.timeouts.validate()
    }
}

impl TimeoutConfig {
    /// Connect, active and response timeouts must be positive; every enforced timeout
    /// must fit in a `Duration`
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.to_action_timeouts().map(|_| ())
    }

    /// Session timeouts. A deadline that is not positive is disabled.
    pub fn to_action_timeouts(&self) -> Result<ActionTimeouts, ConfigError> {
        let deadline = if self.deadline > 0.0 {
            Some(seconds("deadline", self.deadline)?)
        } else {
            None
        };
        Ok(ActionTimeouts {
            connect: required("connect", self.connect)?,
            active: required("active", self.active)?,
            response: required("response", self.response)?,
            deadline,
        })
    }
}

fn required(name: &'static str, value: f64) -> Result<Duration, ConfigError> {
    // also rejects NaN
    if !(value > 0.0) {
        return Err(ConfigError::NonPositiveTimeout(name));
    }
    seconds(name, value)
}

fn seconds(name: &'static str, value: f64) -> Result<Duration, ConfigError> {
    Duration::try_from_secs_f64(value).map_err(|_| ConfigError::TimeoutOutOfRange(name, value))
}
