// command/outcome.rs

// Turns the terminal state of an action plus the motion service's detailed response
// code into a fixed operator-facing message and category. On a successful motion with
// recording requested, the flown segment is saved as a replayable EXEC goal.

use log::{error, info};
use std::fmt;
use std::path::{Path, PathBuf};

use super::goal::{MotionCommand, MotionGoal, MotionResult};
use super::storage::SegmentStore;
use crate::action::ActionState;

/// Operator-facing grouping of outcomes
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Category {
    /// The goal was achieved
    Completed,
    /// Cancelled or preempted before completion
    Interrupted,
    /// The server aborted a goal without a detailed reason
    Failed,
    /// Planning, validation or control failed
    MotionFailure,
    /// An obstacle stopped the motion
    Obstacle,
    /// Something inside the motion service went wrong
    InternalFailure,
    /// The goal itself was not acceptable
    RequestRejected,
    /// Requested limits are outside what the flight mode allows
    LimitViolation,
    /// The robot drifted outside its tracking tolerance
    ToleranceViolation,
    /// The action timed out before a result arrived
    Timeout,
    /// The response code is not one the tool knows
    Unknown,
}

/// Detailed response codes of the motion service. Variant names follow the service's
/// own; [`MotionResponse::message`] says what each one means.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[repr(i32)]
#[allow(missing_docs)]
pub enum MotionResponse {
    AlreadyThere = 2,
    Success = 1,
    Preempted = 0,
    PlanFailed = -1,
    ValidateFailed = -2,
    ControlFailed = -3,
    ObstacleDetected = -4,
    ReplanNotEnoughTime = -5,
    ReplanFailed = -6,
    RevalidateFailed = -7,
    NotInWaitingMode = -8,
    InvalidFlightMode = -9,
    UnexpectedEmptySegment = -10,
    CouldNotResample = -11,
    UnexpectedEmptyStates = -12,
    InvalidCommand = -13,
    CannotQueryRobotPose = -14,
    NotOnFirstPose = -15,
    BadDesiredVelocity = -16,
    BadDesiredAcceleration = -17,
    BadDesiredOmega = -18,
    BadDesiredAlpha = -19,
    BadDesiredRate = -20,
    ToleranceViolationPosition = -21,
    ToleranceViolationAttitude = -22,
    ToleranceViolationVelocity = -23,
    ToleranceViolationOmega = -24,
    Cancelled = -25,
}

impl MotionResponse {
    /// Every known response
    pub const ALL: [MotionResponse; 28] = [
        MotionResponse::AlreadyThere,
        MotionResponse::Success,
        MotionResponse::Preempted,
        MotionResponse::PlanFailed,
        MotionResponse::ValidateFailed,
        MotionResponse::ControlFailed,
        MotionResponse::ObstacleDetected,
        MotionResponse::ReplanNotEnoughTime,
        MotionResponse::ReplanFailed,
        MotionResponse::RevalidateFailed,
        MotionResponse::NotInWaitingMode,
        MotionResponse::InvalidFlightMode,
        MotionResponse::UnexpectedEmptySegment,
        MotionResponse::CouldNotResample,
        MotionResponse::UnexpectedEmptyStates,
        MotionResponse::InvalidCommand,
        MotionResponse::CannotQueryRobotPose,
        MotionResponse::NotOnFirstPose,
        MotionResponse::BadDesiredVelocity,
        MotionResponse::BadDesiredAcceleration,
        MotionResponse::BadDesiredOmega,
        MotionResponse::BadDesiredAlpha,
        MotionResponse::BadDesiredRate,
        MotionResponse::ToleranceViolationPosition,
        MotionResponse::ToleranceViolationAttitude,
        MotionResponse::ToleranceViolationVelocity,
        MotionResponse::ToleranceViolationOmega,
        MotionResponse::Cancelled,
    ];

    /// Wire value
    pub fn code(self) -> i32 {
        self as i32
    }

    /// Response for a wire value. `None` for codes this tool does not know.
    pub fn from_code(code: i32) -> Option<Self> {
        MotionResponse::ALL
            .iter()
            .copied()
            .find(|response| response.code() == code)
    }

    /// Fixed operator-facing text
    pub fn message(self) -> &'static str {
        match self {
            MotionResponse::AlreadyThere => "We are already at the location",
            MotionResponse::Success => "Motion succeeded",
            MotionResponse::Cancelled => "Motion cancelled by callee",
            MotionResponse::Preempted => "Motion preempted by thirdparty",
            MotionResponse::PlanFailed => "Plan/bootstrap failed",
            MotionResponse::ValidateFailed => "Validate failed",
            MotionResponse::ControlFailed => "Control failed",
            MotionResponse::ObstacleDetected => "Obstacle detected / replan disabled",
            MotionResponse::ReplanNotEnoughTime => "Obstacle and no time to replan",
            MotionResponse::ReplanFailed => "Obstacle and replanning failed",
            MotionResponse::RevalidateFailed => "Obstacle and revalidating failed",
            MotionResponse::NotInWaitingMode => "Internal failure",
            MotionResponse::InvalidFlightMode => "Invalid flight mode specified",
            MotionResponse::UnexpectedEmptySegment => "Segment empty",
            MotionResponse::CouldNotResample => "Could not resample segment",
            MotionResponse::UnexpectedEmptyStates => "State vector empty",
            MotionResponse::InvalidCommand => "Command rejected",
            MotionResponse::CannotQueryRobotPose => "Failed to find the current pose",
            MotionResponse::NotOnFirstPose => "Not on first pose / no bootstrapping",
            MotionResponse::BadDesiredVelocity => "Requested vel too high",
            MotionResponse::BadDesiredAcceleration => "Requested accel too high",
            MotionResponse::BadDesiredOmega => "Requested omega too high",
            MotionResponse::BadDesiredAlpha => "Requested alpha too high",
            MotionResponse::BadDesiredRate => "Requested rate too low",
            MotionResponse::ToleranceViolationPosition => "Position tolerance violated",
            MotionResponse::ToleranceViolationAttitude => "Attitude tolerance violated",
            MotionResponse::ToleranceViolationVelocity => "Velocity tolerance violated",
            MotionResponse::ToleranceViolationOmega => "Omega tolerance violated",
        }
    }

    /// Group this response is reported under
    pub fn category(self) -> Category {
        use MotionResponse::*;
        match self {
            AlreadyThere | Success => Category::Completed,
            Cancelled | Preempted => Category::Interrupted,
            PlanFailed | ValidateFailed | ControlFailed => Category::MotionFailure,
            ObstacleDetected | ReplanNotEnoughTime | ReplanFailed | RevalidateFailed => {
                Category::Obstacle
            }
            NotInWaitingMode | UnexpectedEmptySegment | CouldNotResample | UnexpectedEmptyStates
            | CannotQueryRobotPose => Category::InternalFailure,
            InvalidCommand | InvalidFlightMode | NotOnFirstPose => Category::RequestRejected,
            BadDesiredVelocity | BadDesiredAcceleration | BadDesiredOmega | BadDesiredAlpha
            | BadDesiredRate => Category::LimitViolation,
            ToleranceViolationPosition
            | ToleranceViolationAttitude
            | ToleranceViolationVelocity
            | ToleranceViolationOmega => Category::ToleranceViolation,
        }
    }
}

const UNKNOWN_MESSAGE: &str = "Error: unknown";

/// Fixed message for a client-side timeout
pub fn timeout_message(state: ActionState) -> Option<&'static str> {
    match state {
        ActionState::TimeoutOnConnect => Some("Timeout on connecting to action"),
        ActionState::TimeoutOnActive => Some("Timeout on action going active"),
        ActionState::TimeoutOnResponse => Some("Timeout on receiving a response"),
        ActionState::TimeoutOnDeadline => Some("Timeout on result deadline"),
        _ => None,
    }
}

/// Operator-facing reading of a terminal state
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Classification {
    /// Terminal state of the session
    pub state: ActionState,
    /// Raw detailed response, when the server sent one
    pub response: Option<i32>,
    /// Operator-facing group
    pub category: Category,
    /// Operator-facing text
    pub message: &'static str,
}

impl Classification {
    fn timeout(state: ActionState, message: &'static str) -> Self {
        Classification {
            state,
            response: None,
            category: Category::Timeout,
            message,
        }
    }
}

impl fmt::Display for Classification {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "Result: {}", self.message)
    }
}

/// Classifies a motion result. Timeouts short-circuit without looking at the payload.
pub fn classify_motion(state: ActionState, result: Option<&MotionResult>) -> Classification {
    if let Some(message) = timeout_message(state) {
        return Classification::timeout(state, message);
    }
    let code = result.map(|result| result.response);
    match code.and_then(MotionResponse::from_code) {
        Some(response) => Classification {
            state,
            response: code,
            category: response.category(),
            message: response.message(),
        },
        None => Classification {
            state,
            response: code,
            category: Category::Unknown,
            message: UNKNOWN_MESSAGE,
        },
    }
}

/// Classifies a pipeline switch, which only reports a terminal state
pub fn classify_switch(state: ActionState) -> Classification {
    if let Some(message) = timeout_message(state) {
        return Classification::timeout(state, message);
    }
    let (category, message) = match state {
        ActionState::Success => (Category::Completed, "Pipeline switched"),
        ActionState::Preempted => (Category::Interrupted, "Error: PREEMPTED"),
        _ => (Category::Failed, "Error: ABORTED"),
    };
    Classification {
        state,
        response: None,
        category,
        message,
    }
}

/// What happened to the recording of a flown segment
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Persistence {
    /// No recording was asked for, or the motion did not succeed
    NotRequested,
    /// Written to this path
    Saved(PathBuf),
    /// The write failed for this reason
    NotSaved(String),
}

/// A classified motion result and the fate of its recording
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Outcome {
    /// How the motion ended
    pub classification: Classification,
    /// What happened to the recording
    pub persistence: Persistence,
}

impl Outcome {
    /// True if the motion service reported success
    pub fn is_success(&self) -> bool {
        self.classification.state == ActionState::Success
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match &self.persistence {
            Persistence::NotRequested => {}
            Persistence::Saved(path) => writeln!(f, "Segment saved to {}", path.display())?,
            Persistence::NotSaved(reason) => writeln!(f, "Segment not saved: {}", reason)?,
        }
        write!(f, "{}", self.classification)
    }
}

/// Classifies motion results and records successful segments when asked to
pub struct OutcomeClassifier<'a> {
    store: &'a dyn SegmentStore,
    record: Option<&'a Path>,
    flight_mode: &'a str,
}

impl<'a> OutcomeClassifier<'a> {
    /// `record` is where to save the segment of a successful motion, if anywhere.
    /// `flight_mode` is the mode originally requested; it goes into the recording.
    pub fn new(store: &'a dyn SegmentStore, record: Option<&'a Path>, flight_mode: &'a str) -> Self {
        OutcomeClassifier {
            store,
            record,
            flight_mode,
        }
    }

    /// Classifies the result, then saves the segment if the motion succeeded and a
    /// recording was requested
    pub fn classify(&self, state: ActionState, result: Option<&MotionResult>) -> Outcome {
        let classification = classify_motion(state, result);
        let persistence = match (state, self.record, result) {
            (ActionState::Success, Some(path), Some(result)) => self.persist(path, result),
            _ => Persistence::NotRequested,
        };
        Outcome {
            classification,
            persistence,
        }
    }

    fn persist(&self, path: &Path, result: &MotionResult) -> Persistence {
        let goal = MotionGoal {
            flight_mode: self.flight_mode.to_string(),
            command: MotionCommand::Exec {
                segment: result.segment.clone(),
            },
        };
        match self.store.write(path, &goal) {
            Ok(()) => {
                info!("Segment saved to {}", path.display());
                Persistence::Saved(path.to_path_buf())
            }
            Err(e) => {
                error!("Segment not saved: {}", e);
                Persistence::NotSaved(e.to_string())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::goal::{Pose, Setpoint, Twist};
    use crate::command::storage::{MockSegmentStore, StorageError};
    use rstest::rstest;
    use std::collections::HashSet;

    fn result(response: i32) -> MotionResult {
        MotionResult {
            response,
            segment: vec![Setpoint {
                when: 12.5,
                pose: Pose::identity(),
                twist: Twist::default(),
                accel: Twist::default(),
            }],
        }
    }

    #[test]
    fn response_codes_are_unique_and_round_trip() {
        let codes: HashSet<i32> = MotionResponse::ALL.iter().map(|r| r.code()).collect();
        assert_eq!(codes.len(), MotionResponse::ALL.len());
        for response in MotionResponse::ALL {
            assert_eq!(MotionResponse::from_code(response.code()), Some(response));
        }
    }

    #[test]
    fn every_response_has_its_own_message() {
        let messages: HashSet<&str> = MotionResponse::ALL.iter().map(|r| r.message()).collect();
        assert_eq!(messages.len(), MotionResponse::ALL.len());
        assert!(!messages.contains(UNKNOWN_MESSAGE));
    }

    #[rstest]
    #[case(MotionResponse::AlreadyThere, Category::Completed, "We are already at the location")]
    #[case(MotionResponse::Cancelled, Category::Interrupted, "Motion cancelled by callee")]
    #[case(MotionResponse::ControlFailed, Category::MotionFailure, "Control failed")]
    #[case(MotionResponse::ReplanFailed, Category::Obstacle, "Obstacle and replanning failed")]
    #[case(MotionResponse::InvalidFlightMode, Category::RequestRejected, "Invalid flight mode specified")]
    #[case(MotionResponse::BadDesiredRate, Category::LimitViolation, "Requested rate too low")]
    #[case(MotionResponse::ToleranceViolationOmega, Category::ToleranceViolation, "Omega tolerance violated")]
    #[case(MotionResponse::CouldNotResample, Category::InternalFailure, "Could not resample segment")]
    fn responses_map_to_fixed_categories(
        #[case] response: MotionResponse,
        #[case] category: Category,
        #[case] message: &str,
    ) {
        let classification = classify_motion(ActionState::Aborted, Some(&result(response.code())));
        assert_eq!(classification.category, category);
        assert_eq!(classification.message, message);
        assert_eq!(classification.response, Some(response.code()));
    }

    #[rstest]
    #[case(3)]
    #[case(-26)]
    #[case(i32::MIN)]
    fn unknown_codes_map_to_the_generic_category(#[case] code: i32) {
        let classification = classify_motion(ActionState::Success, Some(&result(code)));
        assert_eq!(classification.category, Category::Unknown);
        assert_eq!(classification.message, "Error: unknown");
    }

    #[rstest]
    #[case(ActionState::TimeoutOnConnect, "Timeout on connecting to action")]
    #[case(ActionState::TimeoutOnActive, "Timeout on action going active")]
    #[case(ActionState::TimeoutOnResponse, "Timeout on receiving a response")]
    #[case(ActionState::TimeoutOnDeadline, "Timeout on result deadline")]
    fn timeouts_short_circuit(#[case] state: ActionState, #[case] message: &str) {
        let classification = classify_motion(state, None);
        assert_eq!(classification.category, Category::Timeout);
        assert_eq!(classification.message, message);
        assert_eq!(classify_switch(state).message, message);
    }

    #[test]
    fn switch_states_are_classified_without_payload() {
        assert_eq!(classify_switch(ActionState::Success).category, Category::Completed);
        assert_eq!(classify_switch(ActionState::Preempted).category, Category::Interrupted);
        assert_eq!(classify_switch(ActionState::Aborted).category, Category::Failed);
    }

    #[test]
    fn successful_write_reports_saved() {
        let path = Path::new("/tmp/segment.yaml");
        let mut store = MockSegmentStore::new();
        store
            .expect_write()
            .withf(|path, goal| {
                path == Path::new("/tmp/segment.yaml")
                    && goal.flight_mode == "quiet"
                    && goal.command.name() == "EXEC"
            })
            .times(1)
            .returning(|_, _| Ok(()));
        let classifier = OutcomeClassifier::new(&store, Some(path), "quiet");

        let outcome = classifier.classify(ActionState::Success, Some(&result(1)));
        assert_eq!(outcome.persistence, Persistence::Saved(path.to_path_buf()));
        assert_eq!(outcome.classification.message, "Motion succeeded");
    }

    #[test]
    fn failed_write_reports_not_saved_and_keeps_the_classification() {
        let mut store = MockSegmentStore::new();
        store.expect_write().times(1).returning(|path, _| {
            Err(StorageError::Io {
                path: path.to_path_buf(),
                source: std::io::Error::new(std::io::ErrorKind::PermissionDenied, "read-only"),
            })
        });
        let classifier = OutcomeClassifier::new(&store, Some(Path::new("/ro/seg.yaml")), "nominal");

        let outcome = classifier.classify(ActionState::Success, Some(&result(1)));
        assert!(matches!(outcome.persistence, Persistence::NotSaved(_)));
        assert!(outcome.is_success());
        assert_eq!(outcome.classification.category, Category::Completed);
    }

    #[rstest]
    #[case(ActionState::Preempted)]
    #[case(ActionState::Aborted)]
    fn only_success_is_recorded(#[case] state: ActionState) {
        let mut store = MockSegmentStore::new();
        store.expect_write().times(0);
        let classifier = OutcomeClassifier::new(&store, Some(Path::new("seg.yaml")), "nominal");
        let outcome = classifier.classify(state, Some(&result(0)));
        assert_eq!(outcome.persistence, Persistence::NotRequested);
    }

    #[test]
    fn nothing_is_recorded_without_a_path() {
        let mut store = MockSegmentStore::new();
        store.expect_write().times(0);
        let classifier = OutcomeClassifier::new(&store, None, "nominal");
        let outcome = classifier.classify(ActionState::Success, Some(&result(1)));
        assert_eq!(outcome.persistence, Persistence::NotRequested);
    }
}
