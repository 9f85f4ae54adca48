// reconfigure.rs

// Pushes planner settings to the choreographer before a MOVE or EXEC. Parameters are
// staged with `set` and take effect together on `apply`.

use log::{debug, error};
use std::fmt;
use thiserror::Error;

use crate::config::PlannerConfig;

/// Node that owns the planner parameters
pub const CHOREOGRAPHER: &str = "choreographer";

/// Value of a planner parameter
#[derive(Clone, Debug, PartialEq)]
#[allow(missing_docs)]
pub enum ParamValue {
    Double(f64),
    Bool(bool),
    Str(String),
}

impl fmt::Display for ParamValue {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            ParamValue::Double(value) => write!(f, "{}", value),
            ParamValue::Bool(value) => write!(f, "{}", value),
            ParamValue::Str(value) => write!(f, "'{}'", value),
        }
    }
}

/// Reconfiguration errors
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ReconfigureError {
    /// The parameter server did not take the settings
    #[error("could not reconfigure the {node} node: {reason}")]
    Rejected {
        /// Node that was being reconfigured
        node: String,
        /// Why it failed
        reason: String,
    },
}

/// Remote parameter server
#[cfg_attr(test, mockall::automock)]
pub trait Reconfigure {
    /// Stages a parameter
    fn set(&mut self, name: &str, value: ParamValue);
    /// Applies everything staged since the last apply, atomically
    fn apply(&mut self) -> Result<(), ReconfigureError>;
}

/// Parameters derived from the planner settings, in the order they are pushed
pub fn planner_parameters(config: &PlannerConfig) -> Vec<(&'static str, ParamValue)> {
    let mut params = Vec::new();
    let limits = [
        ("desired_vel", config.desired_vel),
        ("desired_accel", config.desired_accel),
        ("desired_omega", config.desired_omega),
        ("desired_alpha", config.desired_alpha),
        ("desired_rate", config.desired_rate),
    ];
    for (name, value) in limits {
        if let Some(value) = value.filter(|value| *value > 0.0) {
            params.push((name, ParamValue::Double(value)));
        }
    }
    let toggles = [
        ("enable_collision_checking", config.collision_checking),
        ("enable_validation", config.validation),
        ("enable_bootstrapping", config.bootstrapping),
        ("enable_immediate", config.immediate),
        ("enable_timesync", config.timesync),
        ("enable_replanning", config.replanning),
        ("enable_faceforward", config.face_forward),
    ];
    for (name, value) in toggles {
        params.push((name, ParamValue::Bool(value)));
    }
    if !config.planner.is_empty() {
        params.push(("planner", ParamValue::Str(config.planner.clone())));
    }
    params
}

/// Stages and applies the planner settings. Failure aborts the run.
pub fn reconfigure_planner(
    client: &mut dyn Reconfigure,
    config: &PlannerConfig,
) -> Result<(), ReconfigureError> {
    for (name, value) in planner_parameters(config) {
        debug!("{}: {} = {}", CHOREOGRAPHER, name, value);
        client.set(name, value);
    }
    client.apply().map_err(|e| {
        error!("Could not reconfigure the {} node", CHOREOGRAPHER);
        e
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_positive_limits_are_pushed() {
        let config = PlannerConfig {
            desired_vel: Some(0.2),
            desired_accel: Some(-1.0),
            desired_rate: None,
            ..PlannerConfig::default()
        };
        let names: Vec<&str> = planner_parameters(&config).iter().map(|(name, _)| *name).collect();
        assert!(names.contains(&"desired_vel"));
        assert!(!names.contains(&"desired_accel"));
        assert!(!names.contains(&"desired_rate"));
    }

    #[test]
    fn defaults_push_toggles_and_planner_name() {
        let params = planner_parameters(&PlannerConfig::default());
        assert_eq!(params.first(), Some(&("desired_rate", ParamValue::Double(1.0))));
        assert!(params.contains(&("enable_validation", ParamValue::Bool(true))));
        assert!(params.contains(&("enable_replanning", ParamValue::Bool(false))));
        assert_eq!(
            params.last(),
            Some(&("planner", ParamValue::Str("trapezoidal".to_string())))
        );
        assert_eq!(params.len(), 9);
    }

    #[test]
    fn empty_planner_name_is_not_pushed() {
        let config = PlannerConfig {
            planner: String::new(),
            ..PlannerConfig::default()
        };
        assert!(planner_parameters(&config)
            .iter()
            .all(|(name, _)| *name != "planner"));
    }

    #[derive(Default)]
    struct Recorder {
        staged: Vec<(String, ParamValue)>,
        applied: Vec<Vec<(String, ParamValue)>>,
    }

    impl Reconfigure for Recorder {
        fn set(&mut self, name: &str, value: ParamValue) {
            self.staged.push((name.to_string(), value));
        }

        fn apply(&mut self) -> Result<(), ReconfigureError> {
            self.applied.push(std::mem::take(&mut self.staged));
            Ok(())
        }
    }

    #[test]
    fn parameters_are_applied_together() {
        let mut client = Recorder::default();
        reconfigure_planner(&mut client, &PlannerConfig::default()).unwrap();

        assert!(client.staged.is_empty());
        assert_eq!(client.applied.len(), 1);
        assert_eq!(client.applied[0].len(), 9);
        assert_eq!(
            client.applied[0][0],
            ("desired_rate".to_string(), ParamValue::Double(1.0))
        );
    }

    #[test]
    fn apply_failure_is_returned() {
        let mut client = MockReconfigure::new();
        client.expect_set().return_const(());
        client.expect_apply().returning(|| {
            Err(ReconfigureError::Rejected {
                node: CHOREOGRAPHER.to_string(),
                reason: "timeout".to_string(),
            })
        });
        assert!(reconfigure_planner(&mut client, &PlannerConfig::default()).is_err());
    }
}
