// command/storage.rs

// Durable storage for recorded segments. A recording is a complete motion goal
// (flight mode + EXEC command + segment) so it can be replayed as-is.

use log::info;
use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;

use super::goal::MotionGoal;

/// Errors raised while writing or reading a recorded segment
#[derive(Debug, Error)]
pub enum StorageError {
    /// The file could not be opened, written or read
    #[error("could not access {}: {source}", .path.display())]
    Io {
        /// File involved
        path: PathBuf,
        /// Underlying failure
        #[source]
        source: std::io::Error,
    },
    /// The file is not a serialized goal
    #[error("{} does not hold a recorded goal: {source}", .path.display())]
    Format {
        /// File involved
        path: PathBuf,
        /// Parser failure
        #[source]
        source: serde_yaml::Error,
    },
}

/// Reads and writes recorded goals. `write` returning `Ok(())` means the goal is on disk.
#[cfg_attr(test, mockall::automock)]
pub trait SegmentStore {
    /// Saves `goal` to `path`, replacing what was there
    fn write(&self, path: &Path, goal: &MotionGoal) -> Result<(), StorageError>;
    /// Loads the goal saved at `path`
    fn read(&self, path: &Path) -> Result<MotionGoal, StorageError>;
}

/// Stores goals as YAML documents
#[derive(Clone, Copy, Debug, Default)]
pub struct YamlSegmentStore;

impl SegmentStore for YamlSegmentStore {
    fn write(&self, path: &Path, goal: &MotionGoal) -> Result<(), StorageError> {
        let file = File::create(path).map_err(|source| StorageError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let mut writer = BufWriter::new(file);
        serde_yaml::to_writer(&mut writer, goal).map_err(|source| StorageError::Format {
            path: path.to_path_buf(),
            source,
        })?;
        writer.flush().map_err(|source| StorageError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        info!("Wrote {} goal to {}", goal.command.name(), path.display());
        Ok(())
    }

    fn read(&self, path: &Path) -> Result<MotionGoal, StorageError> {
        let file = File::open(path).map_err(|source| StorageError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        serde_yaml::from_reader(BufReader::new(file)).map_err(|source| StorageError::Format {
            path: path.to_path_buf(),
            source,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::goal::{MotionCommand, Pose, Setpoint, Twist};
    use nalgebra::{UnitQuaternion, Vector3};

    #[test]
    fn missing_file_is_an_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = YamlSegmentStore.read(&dir.path().join("absent.yaml")).unwrap_err();
        assert!(matches!(err, StorageError::Io { .. }));
    }

    #[test]
    fn unrelated_yaml_is_a_format_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("other.yaml");
        std::fs::write(&path, "pipeline: ar\nresponse: 1\n").unwrap();
        let err = YamlSegmentStore.read(&path).unwrap_err();
        assert!(matches!(err, StorageError::Format { .. }));
    }

    #[test]
    fn bare_commands_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("stop.yaml");
        let goal = MotionGoal {
            flight_mode: "nominal".to_string(),
            command: MotionCommand::Stop,
        };
        YamlSegmentStore.write(&path, &goal).unwrap();
        assert_eq!(YamlSegmentStore.read(&path).unwrap(), goal);
    }

    #[test]
    fn exec_segment_round_trips_exactly() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("segment.yaml");
        let segment = (0..3)
            .map(|i| {
                let t = i as f64 * 0.1;
                Setpoint {
                    when: 1700000000.125 + t,
                    pose: Pose::new(
                        Vector3::new(0.1 + t, -1.0 / 3.0, 4.875e-3),
                        UnitQuaternion::from_euler_angles(0.1, -0.2, 0.3 + t),
                    ),
                    twist: Twist {
                        linear: Vector3::new(0.02 * t, -0.015, 1e-7),
                        angular: Vector3::new(0.0, 0.001, -0.0333),
                    },
                    accel: Twist {
                        linear: Vector3::new(-0.0025, 0.0125 * t, 2.0 / 7.0),
                        angular: Vector3::new(1.5e-4, 0.0, -0.1),
                    },
                }
            })
            .collect();
        let goal = MotionGoal {
            flight_mode: "difficult".to_string(),
            command: MotionCommand::Exec { segment },
        };

        YamlSegmentStore.write(&path, &goal).unwrap();
        assert_eq!(YamlSegmentStore.read(&path).unwrap(), goal);
    }
}
