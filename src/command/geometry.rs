// command/geometry.rs

// Resolves the target pose of a MOVE command from the live pose of the robot and
// the operator's overrides. Position values replace live coordinates in X, Y, Z order.
// Attitude is either a full axis-angle rotation or a yaw target applied on top of the
// live attitude, leaving roll and pitch untouched.

use log::debug;
use nalgebra::{Unit, UnitQuaternion, Vector3};
use std::time::Duration;
use thiserror::Error;

use super::goal::{Pose, StampedPose};

/// Smallest norm accepted for an axis or a horizontal heading vector
const MIN_NORM: f64 = 1e-9;

/// Errors raised while building a target pose
#[derive(Debug, Error, Clone, PartialEq)]
pub enum GeometryError {
    /// The transform provider has no recent body pose
    #[error("could not query the pose of the robot: {0}")]
    PoseUnavailable(String),
    /// A token in an override string is not a finite real number
    #[error("'{0}' is not a real number")]
    InvalidNumber(String),
    /// Attitude override with an element count other than 1 or 4
    #[error("invalid attitude format: expected 1 (yaw) or 4 (angle X Y Z) elements, got {0}")]
    InvalidOrientation(usize),
    /// Axis-angle override with a zero-length axis
    #[error("axis-angle attitude needs a non-zero axis")]
    DegenerateAxis,
    /// Yaw override while the body's forward axis points straight up or down
    #[error("cannot apply a yaw target: the body has no horizontal heading")]
    DegenerateHeading,
}

/// Answers "where is the robot now?".
#[cfg_attr(test, mockall::automock)]
pub trait PoseLookup {
    /// Pose of `body_frame` in `world_frame`. `as_of` of `None` asks for the latest
    /// available transform.
    fn lookup(
        &self,
        world_frame: &str,
        body_frame: &str,
        as_of: Option<f64>,
    ) -> Result<StampedPose, GeometryError>;
}

/// Name of the body frame for a robot namespace
pub fn body_frame(namespace: &str, body: &str) -> String {
    if namespace.is_empty() {
        body.to_string()
    } else {
        format!("{}/{}", namespace, body)
    }
}

/// Splits a whitespace separated list of reals. NaN and infinities are not reals.
pub fn parse_reals(input: &str) -> Result<Vec<f64>, GeometryError> {
    input
        .split_whitespace()
        .map(|token| match token.parse::<f64>() {
            Ok(value) if value.is_finite() => Ok(value),
            _ => Err(GeometryError::InvalidNumber(token.to_string())),
        })
        .collect()
}

/// Attitude requested by the operator
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum OrientationOverride {
    /// Full rotation; the axis does not need to be normalized
    AxisAngle {
        /// Radians
        angle: f64,
        /// Rotation axis
        axis: Vector3<f64>,
    },
    /// Desired heading in the world frame (radians)
    Yaw(f64),
}

impl OrientationOverride {
    /// Parses "angle X Y Z" or "yaw". An empty string means no override.
    pub fn parse(input: &str) -> Result<Option<Self>, GeometryError> {
        let values = parse_reals(input)?;
        match values.as_slice() {
            [] => Ok(None),
            [yaw] => Ok(Some(OrientationOverride::Yaw(*yaw))),
            [angle, x, y, z] => Ok(Some(OrientationOverride::AxisAngle {
                angle: *angle,
                axis: Vector3::new(*x, *y, *z),
            })),
            other => Err(GeometryError::InvalidOrientation(other.len())),
        }
    }

    /// Target attitude given the live one
    pub fn apply(&self, live: &UnitQuaternion<f64>) -> Result<UnitQuaternion<f64>, GeometryError> {
        match *self {
            OrientationOverride::AxisAngle { angle, axis } => axis_angle(angle, axis),
            OrientationOverride::Yaw(yaw) => with_yaw(live, yaw),
        }
    }
}

/// Everything the operator may change about the live pose
#[derive(Clone, Debug, Default, PartialEq)]
pub struct PoseOverrides {
    /// Zero to three values for X, Y, Z. Extra values are ignored.
    pub position: Vec<f64>,
    /// Replaces the live attitude when set
    pub orientation: Option<OrientationOverride>,
    /// Added to the live timestamp to defer execution
    pub delay: Duration,
}

impl PoseOverrides {
    /// Builds overrides from the operator's position and attitude strings
    pub fn parse(position: &str, orientation: &str, delay: Duration) -> Result<Self, GeometryError> {
        Ok(PoseOverrides {
            position: parse_reals(position)?,
            orientation: OrientationOverride::parse(orientation)?,
            delay,
        })
    }
}

/// Unit quaternion for a rotation of `angle` about `axis`
pub fn axis_angle(angle: f64, axis: Vector3<f64>) -> Result<UnitQuaternion<f64>, GeometryError> {
    let axis = Unit::try_new(axis, MIN_NORM).ok_or(GeometryError::DegenerateAxis)?;
    Ok(UnitQuaternion::from_axis_angle(&axis, angle))
}

/// Heading of the body: azimuth of its forward axis projected on the world XY plane
pub fn heading(orientation: &UnitQuaternion<f64>) -> Option<f64> {
    let forward = orientation * Vector3::x();
    let horizontal = Vector3::new(forward.x, forward.y, 0.0).try_normalize(MIN_NORM)?;
    Some(horizontal.y.atan2(horizontal.x))
}

/// Rotates `live` about the world Z axis so that its heading becomes `yaw`
pub fn with_yaw(live: &UnitQuaternion<f64>, yaw: f64) -> Result<UnitQuaternion<f64>, GeometryError> {
    let current = heading(live).ok_or(GeometryError::DegenerateHeading)?;
    let delta = yaw - current;
    // (cos(delta/2), 0, 0, sin(delta/2))
    let correction = UnitQuaternion::from_axis_angle(&Vector3::z_axis(), delta);
    Ok(correction * live)
}

/// Target pose for a MOVE: the live pose with the overrides applied
pub fn resolve_target(live: &StampedPose, overrides: &PoseOverrides) -> Result<StampedPose, GeometryError> {
    let mut position = live.pose.position;
    for (axis, value) in overrides.position.iter().take(3).enumerate() {
        position[axis] = *value;
    }

    let orientation = match &overrides.orientation {
        Some(attitude) => attitude.apply(&live.pose.orientation)?,
        None => live.pose.orientation,
    };

    let target = StampedPose {
        stamp: live.stamp + overrides.delay.as_secs_f64(),
        frame_id: live.frame_id.clone(),
        pose: Pose::new(position, orientation),
    };
    debug!(
        "Resolved target: position={:?} orientation={:?} stamp={}",
        target.pose.position, target.pose.orientation, target.stamp
    );
    Ok(target)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use rstest::rstest;
    use std::f64::consts::{FRAC_PI_2, FRAC_PI_4};

    fn live_at_origin() -> StampedPose {
        StampedPose {
            stamp: 100.0,
            frame_id: "world".to_string(),
            pose: Pose::identity(),
        }
    }

    #[test]
    fn partial_position_keeps_remaining_live_coordinates() {
        let overrides = PoseOverrides::parse("1.0 2.0", "", Duration::ZERO).unwrap();
        let target = resolve_target(&live_at_origin(), &overrides).unwrap();
        assert_eq!(target.pose.position, Vector3::new(1.0, 2.0, 0.0));
        assert_eq!(target.pose.orientation, UnitQuaternion::identity());
    }

    #[test]
    fn extra_position_values_are_ignored() {
        let overrides = PoseOverrides::parse("1 2 3 4", "", Duration::ZERO).unwrap();
        let target = resolve_target(&live_at_origin(), &overrides).unwrap();
        assert_eq!(target.pose.position, Vector3::new(1.0, 2.0, 3.0));
    }

    #[test]
    fn delay_defers_the_timestamp() {
        let overrides = PoseOverrides::parse("", "", Duration::from_millis(2500)).unwrap();
        let target = resolve_target(&live_at_origin(), &overrides).unwrap();
        assert_relative_eq!(target.stamp, 102.5);
    }

    #[test]
    fn yaw_quarter_turn_points_forward_along_world_y() {
        let overrides = PoseOverrides::parse("", &FRAC_PI_2.to_string(), Duration::ZERO).unwrap();
        let target = resolve_target(&live_at_origin(), &overrides).unwrap();
        let forward = target.pose.orientation * Vector3::x();
        assert_relative_eq!(forward, Vector3::y(), epsilon = 1e-12);
    }

    #[test]
    fn axis_is_normalized_by_the_conversion() {
        let scaled = axis_angle(FRAC_PI_4, Vector3::new(0.0, 0.0, 5.0)).unwrap();
        let unit = axis_angle(FRAC_PI_4, Vector3::z()).unwrap();
        assert_relative_eq!(scaled, unit, epsilon = 1e-12);
    }

    #[test]
    fn zero_axis_is_rejected() {
        let overrides = PoseOverrides::parse("", "1.0 0 0 0", Duration::ZERO).unwrap();
        assert_eq!(
            resolve_target(&live_at_origin(), &overrides),
            Err(GeometryError::DegenerateAxis)
        );
    }

    #[test]
    fn yaw_on_a_vertical_body_is_rejected() {
        let mut live = live_at_origin();
        live.pose.orientation = UnitQuaternion::from_axis_angle(&Vector3::y_axis(), -FRAC_PI_2);
        let overrides = PoseOverrides::parse("", "0.3", Duration::ZERO).unwrap();
        assert_eq!(
            resolve_target(&live, &overrides),
            Err(GeometryError::DegenerateHeading)
        );
    }

    #[rstest]
    #[case("1 2", 2)]
    #[case("1 2 3", 3)]
    #[case("1 2 3 4 5", 5)]
    fn orientation_counts_other_than_one_or_four_fail(#[case] input: &str, #[case] count: usize) {
        assert_eq!(
            OrientationOverride::parse(input),
            Err(GeometryError::InvalidOrientation(count))
        );
    }

    #[rstest]
    #[case("", None)]
    #[case("   ", None)]
    #[case("0.5", Some(OrientationOverride::Yaw(0.5)))]
    #[case("1 0 0 1", Some(OrientationOverride::AxisAngle { angle: 1.0, axis: Vector3::z() }))]
    fn orientation_parses_supported_counts(
        #[case] input: &str,
        #[case] expected: Option<OrientationOverride>,
    ) {
        assert_eq!(OrientationOverride::parse(input), Ok(expected));
    }

    #[rstest]
    #[case("two")]
    #[case("nan")]
    #[case("NaN")]
    #[case("inf")]
    #[case("-inf")]
    #[case("infinity")]
    fn garbage_tokens_are_rejected(#[case] token: &str) {
        assert_eq!(
            parse_reals(&format!("1.0 {}", token)),
            Err(GeometryError::InvalidNumber(token.to_string()))
        );
    }

    #[test]
    fn non_finite_attitude_never_reaches_the_target() {
        assert_eq!(
            PoseOverrides::parse("", "inf", Duration::ZERO),
            Err(GeometryError::InvalidNumber("inf".to_string()))
        );
        assert_eq!(
            PoseOverrides::parse("1 nan 2", "", Duration::ZERO),
            Err(GeometryError::InvalidNumber("nan".to_string()))
        );
    }

    #[test]
    fn body_frame_is_namespaced() {
        assert_eq!(body_frame("", "body"), "body");
        assert_eq!(body_frame("bumble", "body"), "bumble/body");
    }
}
