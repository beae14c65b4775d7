//! Per-tick control core.
//!
//! `LineFollower` owns every piece of state that survives between ticks:
//! calibration bounds, the glitch filter, PID history, and the dead-reckoned
//! pose. Hardware is passed in per call, so the core runs the same against the
//! real robot and against scripted readings.

use crate::calibration::{CalibrationBounds, SensorCalibrator};
use crate::clock::Clock;
use crate::config::RobotConfig;
use crate::controller::{ControllerState, SteeringController};
use crate::error::Result;
use crate::estimator::{LineEstimate, LineEstimator, RangeFilterState};
use crate::motor::{MotorCommand, MotorDrive};
use crate::odometry::{OdometryIntegrator, Pose, ReturnManeuver, plan_return_home};
use crate::sensors::{LineSensors, SensorArray};

#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum FollowStatus {
    Following,
    /// No sensor has seen the line for `lost_after_ticks` ticks. Stop following.
    LineLost,
}

#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub struct TickOutcome {
    pub command: MotorCommand,
    pub estimate: LineEstimate,
    pub status: FollowStatus,
}

pub struct LineFollower {
    config: RobotConfig,
    bounds: CalibrationBounds,
    filter: RangeFilterState,
    estimator: LineEstimator,
    controller: SteeringController,
    controller_state: ControllerState,
    odometry: OdometryIntegrator,
    pose: Pose,
    blind_ticks: u32,
}

impl LineFollower {
    /// Fails if `config` does not pass `RobotConfig::validate`.
    pub fn new(config: RobotConfig) -> Result<Self> {
        config.validate()?;

        let estimator = LineEstimator::new(config.estimator.clone());
        let controller =
            SteeringController::new(config.controller.clone(), config.estimator.center());
        let odometry = OdometryIntegrator::new(config.wheel.clone());

        Ok(Self {
            config,
            bounds: CalibrationBounds::new(),
            filter: RangeFilterState::new(),
            estimator,
            controller,
            controller_state: ControllerState::new(),
            odometry,
            pose: Pose::default(),
            blind_ticks: 0,
        })
    }

    pub fn config(&self) -> &RobotConfig {
        &self.config
    }

    pub fn bounds(&self) -> &CalibrationBounds {
        &self.bounds
    }

    pub fn base_speed(&self) -> i32 {
        self.controller.base_speed()
    }

    /// Use bounds learned elsewhere, and seed the filter with `raw`.
    pub fn set_bounds(&mut self, bounds: CalibrationBounds, raw: &SensorArray) {
        self.bounds = bounds;
        self.filter.prime(raw, &self.bounds);
    }

    /// Run the calibration sweep and prime the glitch filter from the
    /// first reading after it.
    pub fn calibrate<S, M, C>(
        &mut self,
        sensors: &mut S,
        motors: &mut M,
        clock: &C,
    ) -> Result<CalibrationBounds>
    where
        S: LineSensors,
        M: MotorDrive,
        C: Clock,
    {
        let bounds = SensorCalibrator::new(&self.config.calibration).sweep(sensors, motors, clock)?;
        let raw = sensors.read_sensors()?;
        self.set_bounds(bounds, &raw);
        Ok(bounds)
    }

    /// Start (or restart) following at `now_ms` from a fresh reading `raw`.
    /// The robot may have been moved while parked, so the glitch filter is
    /// seeded from `raw`. Time spent parked is not counted by the controller
    /// or the odometry.
    pub fn resume(&mut self, raw: &SensorArray, now_ms: i64) {
        self.filter.prime(raw, &self.bounds);
        self.controller_state = ControllerState::starting_at(now_ms);
        self.restart_odometry(now_ms);
        self.blind_ticks = 0;
    }

    /// Integrate the next drive from `now_ms` instead of the last record.
    pub fn restart_odometry(&mut self, now_ms: i64) {
        self.odometry.restart_clock(now_ms);
    }

    /// Estimate only, no steering. Used to watch for the line while parked.
    /// Jumps are expected when the robot is picked up, so the filter follows
    /// the reading instead of rejecting it.
    pub fn observe(&mut self, raw: &SensorArray) -> LineEstimate {
        self.filter.prime(raw, &self.bounds);
        self.estimator.estimate(raw, &self.bounds, &mut self.filter)
    }

    /// One control tick: estimate, steer, and track how long the line has been gone.
    pub fn follow_line_tick(&mut self, raw: &SensorArray, now_ms: i64) -> TickOutcome {
        let estimate = self.estimator.estimate(raw, &self.bounds, &mut self.filter);
        let command = self
            .controller
            .step(estimate.position, now_ms, &mut self.controller_state);

        if estimate.seen {
            self.blind_ticks = 0;
        } else {
            self.blind_ticks = self.blind_ticks.saturating_add(1);
        }

        let status = if self.blind_ticks >= self.config.estimator.lost_after_ticks {
            FollowStatus::LineLost
        } else {
            FollowStatus::Following
        };

        log::debug!(
            "pos {:>3} seen {} values {:?} -> {}",
            estimate.position,
            estimate.seen,
            estimate.values,
            command
        );

        TickOutcome {
            command,
            estimate,
            status,
        }
    }

    /// Feed the command pair just sent to the motors into the odometry.
    pub fn record_drive(&mut self, command: MotorCommand, now_ms: i64) {
        self.odometry
            .integrate(command.left, command.right, now_ms, &mut self.pose);
    }

    pub fn estimate_pose(&self) -> Pose {
        self.pose
    }

    pub fn plan_return_home(&self) -> ReturnManeuver {
        plan_return_home(&self.pose, &self.config.homing)
    }

    pub fn set_speed(&mut self, speed: i32) -> i32 {
        self.controller.set_base_speed(speed)
    }

    /// Change the cruise speed by `delta`. Returns the new speed.
    pub fn adjust_speed(&mut self, delta: i32) -> i32 {
        self.controller.adjust_base_speed(delta)
    }
}
