pub mod calibration;
pub mod clock;
pub mod config;
pub mod controller;
pub mod error;
pub mod estimator;
pub mod follower;
pub mod gpio_input;
pub mod mode;
pub mod motor;
pub mod odometry;
pub mod robot;
pub mod sensors;

// Re-export commonly used types
pub use calibration::{CalibrationBounds, SensorCalibrator};
pub use config::RobotConfig;
pub use error::{Error, Result};
pub use follower::{FollowStatus, LineFollower, TickOutcome};
pub use mode::{Button, Event, Mode};
pub use motor::{MotorCommand, MotorDrive};
pub use odometry::{Pose, ReturnManeuver};
pub use robot::Robot;

#[cfg(test)]
pub(crate) mod mocks;
