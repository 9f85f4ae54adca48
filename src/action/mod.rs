//! Action interface for the teleop tool
//!
//! This module handles all communication with the remote action services:
//! - The generic [`ActionClient`] with its connect/active/response/deadline timeouts
//! - The [`ActionTransport`] seam that real or simulated services plug into
//! - The two concrete action types, pipeline switch and motion

mod client;

use std::fmt;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::mpsc::UnboundedSender;

use crate::command::goal::{
    MotionFeedback, MotionGoal, MotionResult, SwitchFeedback, SwitchGoal, SwitchResult,
};

pub use client::*;

/// Shape of an action: the message types exchanged with its server.
pub trait Action: fmt::Debug + 'static {
    /// Goal sent to the server
    type Goal: Clone + fmt::Debug + Send + 'static;
    /// Zero or more of these arrive while the goal is active
    type Feedback: fmt::Debug + Send + 'static;
    /// Delivered once the goal completes
    type Result: fmt::Debug + Send + 'static;

    /// Server name, used in logs
    const NAME: &'static str;
}

/// Localization manager pipeline switch
#[derive(Debug)]
pub enum SwitchAction {}

impl Action for SwitchAction {
    type Goal = SwitchGoal;
    type Feedback = SwitchFeedback;
    type Result = SwitchResult;
    const NAME: &'static str = "localization_manager/switch";
}

/// Mobility motion
#[derive(Debug)]
pub enum MotionAction {}

impl Action for MotionAction {
    type Goal = MotionGoal;
    type Feedback = MotionFeedback;
    type Result = MotionResult;
    const NAME: &'static str = "mobility/motion";
}

/// Terminal outcome of an action session
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ActionState {
    /// The server reported success
    Success,
    /// The goal was cancelled or replaced on the server
    Preempted,
    /// The server gave up on the goal
    Aborted,
    /// No connection within the connect timeout
    TimeoutOnConnect,
    /// The goal did not go active within the active timeout
    TimeoutOnActive,
    /// Nothing heard from the server within the response timeout
    TimeoutOnResponse,
    /// No result before the overall deadline
    TimeoutOnDeadline,
}

impl ActionState {
    /// True for the four client-side timeouts, which carry no result payload
    pub fn is_timeout(&self) -> bool {
        matches!(
            self,
            ActionState::TimeoutOnConnect
                | ActionState::TimeoutOnActive
                | ActionState::TimeoutOnResponse
                | ActionState::TimeoutOnDeadline
        )
    }
}

impl fmt::Display for ActionState {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let name = match self {
            ActionState::Success => "SUCCESS",
            ActionState::Preempted => "PREEMPTED",
            ActionState::Aborted => "ABORTED",
            ActionState::TimeoutOnConnect => "TIMEOUT_ON_CONNECT",
            ActionState::TimeoutOnActive => "TIMEOUT_ON_ACTIVE",
            ActionState::TimeoutOnResponse => "TIMEOUT_ON_RESPONSE",
            ActionState::TimeoutOnDeadline => "TIMEOUT_ON_DEADLINE",
        };
        f.write_str(name)
    }
}

/// Final status the server reports for a goal
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[allow(missing_docs)]
pub enum GoalStatus {
    Succeeded,
    Preempted,
    Aborted,
}

impl From<GoalStatus> for ActionState {
    fn from(status: GoalStatus) -> Self {
        match status {
            GoalStatus::Succeeded => ActionState::Success,
            GoalStatus::Preempted => ActionState::Preempted,
            GoalStatus::Aborted => ActionState::Aborted,
        }
    }
}

/// Raw events a transport pushes towards the client
#[derive(Debug)]
pub enum ServerEvent<A: Action> {
    /// Handshake with the server completed
    Connected,
    /// The server started working on the submitted goal
    Active,
    /// Progress report on the active goal
    Feedback(A::Feedback),
    /// Final status and payload
    Result(GoalStatus, A::Result),
}

/// Where a transport delivers its events
pub type ServerSink<A> = UnboundedSender<ServerEvent<A>>;

/// Transport errors
#[derive(Debug, Error, Clone, PartialEq)]
pub enum TransportError {
    /// The middleware refused the channel
    #[error("could not open a channel to {server}: {reason}")]
    Open {
        /// Action name
        server: &'static str,
        /// What the middleware said
        reason: String,
    },
}

/// Delivery of goals and server events for one action. Provided by the middleware.
pub trait ActionTransport<A: Action> {
    /// Starts connecting to the server; all later events go to `sink`
    fn open(&mut self, sink: ServerSink<A>) -> Result<(), TransportError>;

    /// Hands a goal to the server. False if it could not be taken.
    fn send_goal(&mut self, goal: &A::Goal) -> bool;
}

/// Timeouts applied to one action session
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ActionTimeouts {
    /// Limit on the connection handshake
    pub connect: Duration,
    /// Limit between submission and the server accepting the goal
    pub active: Duration,
    /// Limit between consecutive messages once active
    pub response: Duration,
    /// Limit on the whole goal, from submission to result
    pub deadline: Option<Duration>,
}

impl Default for ActionTimeouts {
    fn default() -> Self {
        ActionTimeouts {
            connect: Duration::from_secs(30),
            active: Duration::from_secs(30),
            response: Duration::from_secs(30),
            deadline: None,
        }
    }
}
