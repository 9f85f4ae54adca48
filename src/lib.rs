//! Mobility teleop - command dispatch for a free-flying robot
//!
//! This library drives the two action services a teleoperation run talks to, the
//! localization pipeline switch and the mobility motion service. It waits for both
//! to connect, builds exactly one goal from the operator's request and the live pose,
//! and classifies the result for the operator.

#![warn(missing_docs)]
#![warn(unused_extern_crates)]

pub mod action;
/// Goal construction, classification and storage
pub mod command;
/// Configuration types
pub mod config;
/// Operator request validation
pub mod options;
pub mod orchestrator;
/// Planner reconfiguration
pub mod reconfigure;
/// In-process stand-ins for the robot services
pub mod sim;

// Re-export commonly used items for easier access
pub use action::{ActionClient, ActionEvent, ActionState, ActionTimeouts, ActionTransport};
pub use config::{ConfigError, TeleopConfig};
pub use options::{Intent, MotionIntent, OperatorRequest, Request};
pub use orchestrator::{Collaborators, Orchestrator, RunOutcome};

use thiserror::Error;

/// Teleop error types. Every one of them ends the run; nothing is retried.
#[derive(Debug, Error)]
pub enum TeleopError {
    /// Invalid configuration or operator input
    #[error(transparent)]
    Config(#[from] ConfigError),
    /// The target pose could not be built
    #[error(transparent)]
    Geometry(#[from] command::GeometryError),
    /// A recorded segment could not be loaded
    #[error("segment not loaded: {0}")]
    Storage(#[from] command::StorageError),
    /// An action channel could not be opened
    #[error(transparent)]
    Transport(#[from] action::TransportError),
    /// The planner refused its settings
    #[error(transparent)]
    Reconfigure(#[from] reconfigure::ReconfigureError),
    /// The event loop could not be started
    #[error("could not start the event loop: {0}")]
    Runtime(#[from] std::io::Error),
}

/// Convenient result alias for the teleop crate
pub type Result<T> = std::result::Result<T, TeleopError>;
