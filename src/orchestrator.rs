//! Run orchestration
//!
//! One [`Orchestrator`] value drives one teleop run: it starts the switch and motion
//! sessions, waits until both are connected, submits exactly one goal and ends the
//! run on the first terminal outcome. All events are handled in order on a single
//! task, so the readiness latch needs no locking.

use log::{debug, info, warn};
use std::fmt;

use crate::action::{
    Action, ActionClient, ActionEvent, ActionState, ActionTransport, MotionAction, SwitchAction,
};
use crate::command::geometry::{body_frame, resolve_target, PoseLookup, PoseOverrides};
use crate::command::goal::{MotionCommand, MotionGoal, SwitchGoal};
use crate::command::outcome::{classify_switch, Classification, Outcome, OutcomeClassifier};
use crate::command::storage::SegmentStore;
use crate::config::TeleopConfig;
use crate::options::{Intent, MotionIntent, Request};
use crate::reconfigure::{reconfigure_planner, Reconfigure};
use crate::TeleopError;

/// External services the orchestrator calls besides the two actions
pub struct Collaborators {
    /// Where the robot is now
    pub poses: Box<dyn PoseLookup>,
    /// Recorded segments
    pub store: Box<dyn SegmentStore>,
    /// Planner parameter server
    pub planner: Box<dyn Reconfigure>,
}

/// How a run ended
#[derive(Clone, Debug, PartialEq)]
pub enum RunOutcome {
    /// The switch session ended the run, either with the requested pipeline switch
    /// or by failing before any motion goal could be sent
    Switch(Classification),
    /// The motion goal finished
    Motion(Outcome),
    /// A service declined the goal
    Rejected(&'static str),
}

impl RunOutcome {
    /// True only if the requested switch or motion succeeded. Decides the exit code.
    pub fn is_success(&self) -> bool {
        match self {
            RunOutcome::Switch(classification) => classification.state == ActionState::Success,
            RunOutcome::Motion(outcome) => outcome.is_success(),
            RunOutcome::Rejected(_) => false,
        }
    }
}

impl fmt::Display for RunOutcome {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            RunOutcome::Switch(classification) => write!(f, "Switch: {}", classification.message),
            RunOutcome::Motion(outcome) => write!(f, "{}", outcome),
            RunOutcome::Rejected(server) => write!(f, "{} did not accept goal", server),
        }
    }
}

/// Lets the submission logic run once, the first time both sessions are ready
#[derive(Debug, Default)]
pub struct ReadinessLatch {
    fired: bool,
}

impl ReadinessLatch {
    /// True exactly once: the first time it is called with `ready` set
    pub fn fire_if(&mut self, ready: bool) -> bool {
        if ready && !self.fired {
            self.fired = true;
            return true;
        }
        false
    }

    /// Whether the goal has been dispatched
    pub fn has_fired(&self) -> bool {
        self.fired
    }
}

enum Inbound {
    Switch(ActionEvent<SwitchAction>),
    Motion(ActionEvent<MotionAction>),
}

/// Drives a single teleop run
pub struct Orchestrator {
    config: TeleopConfig,
    request: Request,
    switch: ActionClient<SwitchAction>,
    motion: ActionClient<MotionAction>,
    collaborators: Collaborators,
    latch: ReadinessLatch,
}

impl Orchestrator {
    /// Both sessions get the same timeouts. Fails if they are invalid, before any
    /// service is contacted.
    pub fn new(
        config: TeleopConfig,
        request: Request,
        switch: impl ActionTransport<SwitchAction> + 'static,
        motion: impl ActionTransport<MotionAction> + 'static,
        collaborators: Collaborators,
    ) -> Result<Self, TeleopError> {
        let timeouts = config.timeouts.to_action_timeouts()?;
        let mut switch = ActionClient::new(switch);
        switch.configure(timeouts);
        let mut motion = ActionClient::new(motion);
        motion.configure(timeouts);
        Ok(Orchestrator {
            config,
            request,
            switch,
            motion,
            collaborators,
            latch: ReadinessLatch::default(),
        })
    }

    /// Runs until the first terminal outcome
    pub async fn run(mut self) -> Result<RunOutcome, TeleopError> {
        if let Intent::Motion(motion) = &self.request.intent {
            if motion.needs_planner() {
                reconfigure_planner(self.collaborators.planner.as_mut(), &self.config.planner)?;
            }
        }

        self.switch.start()?;
        self.motion.start()?;

        loop {
            let inbound = tokio::select! {
                event = self.switch.next_event() => Inbound::Switch(event),
                event = self.motion.next_event() => Inbound::Motion(event),
            };
            let finished = match inbound {
                Inbound::Switch(event) => self.on_switch_event(event)?,
                Inbound::Motion(event) => self.on_motion_event(event)?,
            };
            if let Some(outcome) = finished {
                debug!("Run finished: {}", outcome);
                return Ok(outcome);
            }
        }
    }

    fn on_switch_event(
        &mut self,
        event: ActionEvent<SwitchAction>,
    ) -> Result<Option<RunOutcome>, TeleopError> {
        match event {
            ActionEvent::Connected => self.on_connected(),
            ActionEvent::Feedback(_) => Ok(None),
            ActionEvent::Result(state, _) => self.on_switch_outcome(state),
        }
    }

    fn on_motion_event(
        &mut self,
        event: ActionEvent<MotionAction>,
    ) -> Result<Option<RunOutcome>, TeleopError> {
        match event {
            ActionEvent::Connected => self.on_connected(),
            ActionEvent::Feedback(feedback) => {
                info!("{}", feedback);
                Ok(None)
            }
            ActionEvent::Result(state, result) => {
                let classifier = OutcomeClassifier::new(
                    self.collaborators.store.as_ref(),
                    self.request.record.as_deref(),
                    &self.config.flight_mode,
                );
                Ok(Some(RunOutcome::Motion(classifier.classify(state, result.as_ref()))))
            }
        }
    }

    fn on_connected(&mut self) -> Result<Option<RunOutcome>, TeleopError> {
        let ready = self.switch.is_connected() && self.motion.is_connected();
        if !self.latch.fire_if(ready) {
            return Ok(None);
        }
        info!("All actions connected. Sending command...");
        match self.request.intent.clone() {
            Intent::SwitchPipeline(pipeline) => {
                let goal = SwitchGoal { pipeline };
                if self.switch.submit(&goal) {
                    Ok(None)
                } else {
                    Ok(Some(RunOutcome::Rejected(SwitchAction::NAME)))
                }
            }
            // No switch was asked for; carry on as if one had succeeded
            Intent::Motion(_) => self.on_switch_outcome(ActionState::Success),
        }
    }

    fn on_switch_outcome(&mut self, state: ActionState) -> Result<Option<RunOutcome>, TeleopError> {
        match (state, self.request.intent.clone()) {
            (ActionState::Success, Intent::Motion(motion)) => self.begin_motion_phase(&motion),
            _ => Ok(Some(RunOutcome::Switch(classify_switch(state)))),
        }
    }

    fn begin_motion_phase(&mut self, intent: &MotionIntent) -> Result<Option<RunOutcome>, TeleopError> {
        let goal = self.build_motion_goal(intent)?;
        info!("Sending {} goal", goal.command.name());
        if self.motion.submit(&goal) {
            Ok(None)
        } else {
            Ok(Some(RunOutcome::Rejected(MotionAction::NAME)))
        }
    }

    fn build_motion_goal(&self, intent: &MotionIntent) -> Result<MotionGoal, TeleopError> {
        let command = match intent {
            MotionIntent::Idle => MotionCommand::Idle,
            MotionIntent::Stop => MotionCommand::Stop,
            MotionIntent::Prep => MotionCommand::Prep,
            MotionIntent::Move => {
                let overrides = PoseOverrides::parse(
                    &self.request.position,
                    &self.request.attitude,
                    self.request.delay,
                )?;
                if !overrides.delay.is_zero() && self.config.planner.immediate {
                    warn!("Deferred moves only wait when immediate execution is disabled");
                }
                let frames = &self.config.frames;
                let live = self.collaborators.poses.lookup(
                    &frames.world,
                    &body_frame(&frames.namespace, &frames.body),
                    None,
                )?;
                MotionCommand::Move {
                    states: vec![resolve_target(&live, &overrides)?],
                }
            }
            MotionIntent::Execute(path) => {
                // The recording carries its own flight mode
                let goal = self.collaborators.store.read(path)?;
                debug!("Loaded {} goal from {}", goal.command.name(), path.display());
                return Ok(goal);
            }
        };
        Ok(MotionGoal {
            flight_mode: self.config.flight_mode.clone(),
            command,
        })
    }
}
