// command/mod.rs

// Everything needed to build one goal and make sense of its result: message types,
// target pose resolution, outcome classification and segment storage.

/// Target pose resolution
pub mod geometry;
/// Action messages and pose types
pub mod goal;
/// Result classification
pub mod outcome;
/// Recorded segments
pub mod storage;

pub use geometry::{GeometryError, OrientationOverride, PoseLookup, PoseOverrides};
pub use goal::{MotionCommand, MotionGoal, Pose, Segment, StampedPose, SwitchGoal};
pub use outcome::{Category, Classification, MotionResponse, Outcome, OutcomeClassifier, Persistence};
pub use storage::{SegmentStore, StorageError, YamlSegmentStore};
