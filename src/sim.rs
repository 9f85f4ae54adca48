// sim.rs

// In-process stand-ins for the robot side of a run: both action services, the pose
// provider and the planner parameter server. The binary uses them for dry runs; the
// services answer on a fixed schedule driven by the tokio clock.

use log::{debug, info};
use nalgebra::Vector3;
use std::time::Duration;
use tokio::time::sleep;

use crate::action::{
    Action, ActionTransport, GoalStatus, MotionAction, ServerEvent, ServerSink, SwitchAction,
    TransportError,
};
use crate::command::geometry::{GeometryError, PoseLookup};
use crate::command::goal::{
    MotionCommand, MotionFeedback, MotionGoal, MotionProgress, MotionResult, MotionState, Pose,
    Segment, Setpoint, StampedPose, SwitchFeedback, SwitchGoal, SwitchResult, Twist,
};
use crate::command::outcome::MotionResponse;
use crate::reconfigure::{ParamValue, Reconfigure, ReconfigureError, CHOREOGRAPHER};

/// How a simulated service behaves
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SimSettings {
    /// Delay before the handshake completes
    pub connect_latency: Duration,
    /// Delay between consecutive server messages once a goal is sent
    pub step: Duration,
    /// Feedback messages sent before the result
    pub feedback_count: usize,
    /// Final status of every goal
    pub status: GoalStatus,
    /// Detailed response code put in the result
    pub response: i32,
    /// False to model a server that never comes up
    pub connects: bool,
    /// False to model a server that declines every goal
    pub accepts: bool,
}

impl Default for SimSettings {
    fn default() -> Self {
        SimSettings {
            connect_latency: Duration::from_millis(200),
            step: Duration::from_millis(100),
            feedback_count: 3,
            status: GoalStatus::Succeeded,
            response: MotionResponse::Success.code(),
            connects: true,
            accepts: true,
        }
    }
}

fn connect<A: Action>(sink: ServerSink<A>, settings: SimSettings) {
    if !settings.connects {
        debug!("{}: simulated server stays silent", A::NAME);
        return;
    }
    tokio::spawn(async move {
        sleep(settings.connect_latency).await;
        // The client may already be gone; nothing to do then
        let _ = sink.send(ServerEvent::Connected);
    });
}

fn play<A: Action>(
    sink: ServerSink<A>,
    settings: SimSettings,
    feedback: Vec<A::Feedback>,
    result: A::Result,
) {
    tokio::spawn(async move {
        sleep(settings.step).await;
        if sink.send(ServerEvent::Active).is_err() {
            return;
        }
        for message in feedback {
            sleep(settings.step).await;
            if sink.send(ServerEvent::Feedback(message)).is_err() {
                return;
            }
        }
        sleep(settings.step).await;
        let _ = sink.send(ServerEvent::Result(settings.status, result));
    });
}

/// Simulated localization manager
#[derive(Debug, Default)]
pub struct SimulatedSwitch {
    settings: SimSettings,
    sink: Option<ServerSink<SwitchAction>>,
}

impl SimulatedSwitch {
    /// A switch service that behaves as `settings` say
    pub fn new(settings: SimSettings) -> Self {
        SimulatedSwitch {
            settings,
            sink: None,
        }
    }
}

impl ActionTransport<SwitchAction> for SimulatedSwitch {
    fn open(&mut self, sink: ServerSink<SwitchAction>) -> Result<(), TransportError> {
        connect(sink.clone(), self.settings);
        self.sink = Some(sink);
        Ok(())
    }

    fn send_goal(&mut self, goal: &SwitchGoal) -> bool {
        let Some(sink) = self.sink.clone() else {
            return false;
        };
        if !self.settings.accepts {
            return false;
        }
        info!("Simulated switch to the '{}' pipeline", goal.pipeline);
        let feedback = vec![SwitchFeedback; self.settings.feedback_count];
        let result = SwitchResult {
            response: self.settings.response,
        };
        play(sink, self.settings, feedback, result);
        true
    }
}

/// Simulated mobility service. Results echo a segment built from the goal.
#[derive(Debug, Default)]
pub struct SimulatedMotion {
    settings: SimSettings,
    sink: Option<ServerSink<MotionAction>>,
}

impl SimulatedMotion {
    /// A motion service that behaves as `settings` say
    pub fn new(settings: SimSettings) -> Self {
        SimulatedMotion {
            settings,
            sink: None,
        }
    }
}

/// Segment a motion service would report for `goal`: the given segment for EXEC, one
/// resting setpoint per state for MOVE, nothing otherwise.
pub fn flown_segment(goal: &MotionGoal) -> Segment {
    match &goal.command {
        MotionCommand::Exec { segment } => segment.clone(),
        MotionCommand::Move { states } => states
            .iter()
            .map(|state| Setpoint {
                when: state.stamp,
                pose: state.pose,
                twist: Twist::default(),
                accel: Twist::default(),
            })
            .collect(),
        _ => Segment::new(),
    }
}

impl ActionTransport<MotionAction> for SimulatedMotion {
    fn open(&mut self, sink: ServerSink<MotionAction>) -> Result<(), TransportError> {
        connect(sink.clone(), self.settings);
        self.sink = Some(sink);
        Ok(())
    }

    fn send_goal(&mut self, goal: &MotionGoal) -> bool {
        let Some(sink) = self.sink.clone() else {
            return false;
        };
        if !self.settings.accepts {
            return false;
        }
        let count = self.settings.feedback_count;
        let feedback = (0..count)
            .map(|i| {
                let remaining = (count - i) as f64 / count as f64;
                MotionFeedback {
                    state: MotionState::Controlling,
                    progress: MotionProgress {
                        error_position: 0.01 * remaining,
                        error_attitude: 0.02 * remaining,
                        error_velocity: 0.005 * remaining,
                        error_omega: 0.01 * remaining,
                    },
                }
            })
            .collect();
        let result = MotionResult {
            response: self.settings.response,
            segment: flown_segment(goal),
        };
        play(sink, self.settings, feedback, result);
        true
    }
}

/// Pose provider that always reports the same pose
#[derive(Clone, Debug, PartialEq)]
pub struct StaticPose {
    /// Reported pose
    pub pose: Pose,
    /// Reported time
    pub stamp: f64,
}

impl Default for StaticPose {
    fn default() -> Self {
        StaticPose {
            pose: Pose::identity(),
            stamp: 0.0,
        }
    }
}

impl PoseLookup for StaticPose {
    fn lookup(
        &self,
        world_frame: &str,
        body_frame: &str,
        as_of: Option<f64>,
    ) -> Result<StampedPose, GeometryError> {
        debug!("Pose of {} in {}", body_frame, world_frame);
        Ok(StampedPose {
            stamp: as_of.unwrap_or(self.stamp),
            frame_id: world_frame.to_string(),
            pose: self.pose,
        })
    }
}

/// Parameter server that records what it is sent
#[derive(Clone, Debug, Default)]
pub struct RecordingReconfigure {
    staged: Vec<(String, ParamValue)>,
    applied: Vec<(String, ParamValue)>,
}

impl RecordingReconfigure {
    /// Parameters of every successful apply, in order
    pub fn applied(&self) -> &[(String, ParamValue)] {
        &self.applied
    }
}

impl Reconfigure for RecordingReconfigure {
    fn set(&mut self, name: &str, value: ParamValue) {
        self.staged.push((name.to_string(), value));
    }

    fn apply(&mut self) -> Result<(), ReconfigureError> {
        info!("Reconfigured {} with {} parameters", CHOREOGRAPHER, self.staged.len());
        self.applied.append(&mut self.staged);
        Ok(())
    }
}
