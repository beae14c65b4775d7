//! Dead reckoning from commanded wheel speeds.
//!
//! Fixed-point convention used throughout:
//! - time: milliseconds
//! - wheel speed: tenths of a millimetre per second
//! - angular rate: milli-degrees per second
//! - heading and angles: micro-degrees, clockwise-positive, 0 = initial forward axis
//! - x, y, distance: micrometres, y along the initial forward axis, x to its right
//!
//! With these units `mdeg/s * ms = µdeg` and `(0.1 mm/s) * ms / 10 = µm`, so no
//! other scale factors appear. Floating point is only used inside sin, cos and
//! atan2, and results are rounded back to integers.

use std::fmt;

use crate::config::{HomingConfig, WheelCalibration};

/// One full turn in micro-degrees.
pub const FULL_TURN_UDEG: i64 = 360_000_000;
const HALF_TURN_UDEG: i64 = FULL_TURN_UDEG / 2;
const UDEG_PER_DEG: f64 = 1_000_000.0;

/// Wrap into [0, 360°).
pub fn wrap_heading(heading_udeg: i64) -> i64 {
    heading_udeg.rem_euclid(FULL_TURN_UDEG)
}

/// Wrap into (-180°, 180°].
pub fn wrap_relative(angle_udeg: i64) -> i64 {
    let wrapped = angle_udeg.rem_euclid(FULL_TURN_UDEG);
    if wrapped > HALF_TURN_UDEG {
        wrapped - FULL_TURN_UDEG
    } else {
        wrapped
    }
}

fn udeg_to_radians(udeg: i64) -> f64 {
    (udeg as f64 / UDEG_PER_DEG).to_radians()
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Pose {
    pub x_um: i64,
    pub y_um: i64,
    pub heading_udeg: i64,
}

impl fmt::Display for Pose {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "({:.1}mm, {:.1}mm, {:.1}°)",
            self.x_um as f64 / 1000.0,
            self.y_um as f64 / 1000.0,
            self.heading_udeg as f64 / UDEG_PER_DEG
        )
    }
}

impl Pose {
    pub fn distance_to_origin_um(&self) -> i64 {
        (self.x_um as f64).hypot(self.y_um as f64).round() as i64
    }
}

/// Integrates commanded wheel speeds into a pose.
pub struct OdometryIntegrator {
    calib: WheelCalibration,
    last_tick_ms: Option<i64>,
}

impl OdometryIntegrator {
    pub fn new(calib: WheelCalibration) -> Self {
        Self {
            calib,
            last_tick_ms: None,
        }
    }

    /// Measure the next tick from `now_ms`, e.g. after the robot sat parked.
    pub fn restart_clock(&mut self, now_ms: i64) {
        self.last_tick_ms = Some(now_ms);
    }

    /// Physical wheel speed (0.1 mm/s) for a motor command. Zero in the
    /// deadband, sign follows the command.
    pub fn wheel_speed(&self, command: i32) -> i64 {
        let c = &self.calib;
        let magnitude = (i64::from(command).abs() * c.slope_num / c.slope_den - c.intercept).max(0);
        if command >= 0 { magnitude } else { -magnitude }
    }

    /// Rotation rate in milli-degrees per second, positive clockwise.
    pub fn angular_rate(&self, left: i32, right: i32) -> i64 {
        let c = &self.calib;
        (self.wheel_speed(left) - self.wheel_speed(right)) * c.turn_gain / c.wheelbase
    }

    /// Advance `pose` by the command pair that was driven since this
    /// integrator's previous call. The first call only starts the clock.
    pub fn integrate(&mut self, left: i32, right: i32, now_ms: i64, pose: &mut Pose) {
        let Some(last) = self.last_tick_ms else {
            self.last_tick_ms = Some(now_ms);
            return;
        };

        let dt_ms = now_ms - last;
        if dt_ms <= 0 {
            log::trace!("Odometry skipped non-positive tick ({}ms)", dt_ms);
            return;
        }
        self.last_tick_ms = Some(now_ms);

        let delta_udeg = self.angular_rate(left, right) * dt_ms;
        // Midpoint heading over the tick
        let alpha = udeg_to_radians(pose.heading_udeg + delta_udeg / 2);
        pose.heading_udeg = wrap_heading(pose.heading_udeg + delta_udeg);

        let avg_speed = self.wheel_speed((left + right) / 2);
        let distance_um = (avg_speed * dt_ms) as f64 / 10.0;

        pose.x_um += (distance_um * alpha.sin()).round() as i64;
        pose.y_um += (distance_um * alpha.cos()).round() as i64;
    }
}

/// Open-loop "turn, then drive straight" back to the origin.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ReturnManeuver {
    /// Relative turn, positive clockwise, in (-180°, 180°].
    pub turn_udeg: i64,
    pub turn_duration_ms: u64,
    pub travel_duration_ms: u64,
    /// Straight-line distance actually driven, after the stop margin.
    pub distance_um: i64,
}

impl fmt::Display for ReturnManeuver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "turn {:.1}° for {}ms, then drive {:.1}mm for {}ms",
            self.turn_udeg as f64 / UDEG_PER_DEG,
            self.turn_duration_ms,
            self.distance_um as f64 / 1000.0,
            self.travel_duration_ms
        )
    }
}

/// Plan the timed turn and straight run that bring `pose` back home.
pub fn plan_return_home(pose: &Pose, homing: &HomingConfig) -> ReturnManeuver {
    let distance_um = pose.distance_to_origin_um();
    if distance_um == 0 {
        return ReturnManeuver::default();
    }

    // Clockwise from the forward axis: east component first
    let bearing = (-pose.x_um as f64).atan2(-pose.y_um as f64);
    let bearing_udeg = (bearing.to_degrees() * UDEG_PER_DEG).round() as i64;
    let turn_udeg = wrap_relative(bearing_udeg - pose.heading_udeg);

    let turn_duration_ms = turn_udeg.unsigned_abs() / (homing.turn_rate_deg_per_s as u64 * 1000);

    let travel_um = (distance_um - homing.stop_margin_mm * 1000).max(0);
    // µm / (mm/s) = ms
    let travel_duration_ms = travel_um as u64 / homing.travel_mm_per_s as u64;

    ReturnManeuver {
        turn_udeg,
        turn_duration_ms,
        travel_duration_ms,
        distance_um: travel_um,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DEG: i64 = 1_000_000;

    fn integrator() -> OdometryIntegrator {
        OdometryIntegrator::new(WheelCalibration::default())
    }

    #[test]
    fn test_wheel_speed_curve() {
        let odo = integrator();
        // 40 * 430 / 8 - 680
        assert_eq!(odo.wheel_speed(40), 1470);
        assert_eq!(odo.wheel_speed(-40), -1470);
        assert_eq!(odo.wheel_speed(0), 0);
    }

    #[test]
    fn test_wheel_speed_deadband() {
        let odo = integrator();
        // 12 * 430 / 8 = 645 < 680
        assert_eq!(odo.wheel_speed(12), 0);
        assert_eq!(odo.wheel_speed(-12), 0);
        assert!(odo.wheel_speed(13) > 0);
    }

    #[test]
    fn test_angular_rate_sign() {
        let odo = integrator();
        let rate = odo.angular_rate(40, -40);
        // about 196 deg/s clockwise
        assert!((195_000..=197_000).contains(&rate), "rate {}", rate);
        assert_eq!(odo.angular_rate(-40, 40), -rate);
        assert_eq!(odo.angular_rate(100, 100), 0);
    }

    #[test]
    fn test_first_call_only_latches_time() {
        let mut odo = integrator();
        let mut pose = Pose::default();
        odo.integrate(200, 200, 5_000, &mut pose);
        assert_eq!(pose, Pose::default());
    }

    #[test]
    fn test_straight_line() {
        let mut odo = integrator();
        let mut pose = Pose::default();

        odo.integrate(100, 100, 0, &mut pose);
        odo.integrate(100, 100, 1_000, &mut pose);

        // 100 * 430 / 8 - 680 = 4695 tenths of mm/s for one second
        assert_eq!(pose, Pose {
            x_um: 0,
            y_um: 469_500,
            heading_udeg: 0,
        });
    }

    #[test]
    fn test_straight_line_in_small_ticks() {
        let mut odo = integrator();
        let mut pose = Pose::default();

        odo.integrate(100, 100, 0, &mut pose);
        for t in 1..=100 {
            odo.integrate(100, 100, t * 10, &mut pose);
        }
        assert_eq!(pose.x_um, 0);
        assert_eq!(pose.y_um, 469_500);
        assert_eq!(pose.heading_udeg, 0);
    }

    #[test]
    fn test_restart_clock_drops_idle_time() {
        let mut odo = integrator();
        let mut pose = Pose::default();

        odo.restart_clock(10_000);
        odo.integrate(100, 100, 10_100, &mut pose);
        assert_eq!(pose.y_um, 46_950);
    }

    #[test]
    fn test_non_positive_dt_is_skipped() {
        let mut odo = integrator();
        let mut pose = Pose::default();

        odo.integrate(100, 100, 100, &mut pose);
        odo.integrate(100, 100, 100, &mut pose);
        odo.integrate(100, 100, 50, &mut pose);
        assert_eq!(pose, Pose::default());

        // Time is still measured from the last good tick
        odo.integrate(100, 100, 200, &mut pose);
        assert_eq!(pose.y_um, 46_950);
    }

    #[test]
    fn test_spin_in_place_changes_heading_only() {
        let mut odo = integrator();
        let mut pose = Pose::default();
        let rate = odo.angular_rate(40, -40);

        odo.integrate(40, -40, 0, &mut pose);
        odo.integrate(40, -40, 100, &mut pose);

        assert_eq!(pose.heading_udeg, rate * 100);
        assert_eq!((pose.x_um, pose.y_um), (0, 0));
    }

    #[test]
    fn test_heading_wraps() {
        let mut odo = integrator();
        let mut pose = Pose {
            heading_udeg: 359 * DEG,
            ..Pose::default()
        };
        odo.integrate(40, -40, 0, &mut pose);
        odo.integrate(40, -40, 100, &mut pose);
        assert!(pose.heading_udeg >= 0 && pose.heading_udeg < 20 * DEG);

        let mut pose = Pose {
            heading_udeg: DEG,
            ..Pose::default()
        };
        odo.integrate(-40, 40, 200, &mut pose);
        assert!(pose.heading_udeg > 340 * DEG && pose.heading_udeg < FULL_TURN_UDEG);
    }

    #[test]
    fn test_heading_convention() {
        let mut odo = integrator();
        // Facing +x (90° clockwise from forward)
        let mut pose = Pose {
            heading_udeg: 90 * DEG,
            ..Pose::default()
        };
        odo.integrate(100, 100, 0, &mut pose);
        odo.integrate(100, 100, 1_000, &mut pose);
        assert_eq!(pose.x_um, 469_500);
        assert_eq!(pose.y_um, 0);
    }

    #[test]
    fn test_midpoint_heading_during_arc() {
        let mut odo = integrator();
        let mut pose = Pose::default();

        // Gentle right arc: x grows because the midpoint heading is already clockwise
        odo.integrate(120, 100, 0, &mut pose);
        odo.integrate(120, 100, 100, &mut pose);
        assert!(pose.heading_udeg > 0);
        assert!(pose.x_um > 0);
        assert!(pose.y_um > 0);
    }

    #[test]
    fn test_wrap_relative() {
        assert_eq!(wrap_relative(190 * DEG), -170 * DEG);
        assert_eq!(wrap_relative(-190 * DEG), 170 * DEG);
        assert_eq!(wrap_relative(180 * DEG), 180 * DEG);
        assert_eq!(wrap_relative(-180 * DEG), 180 * DEG);
        assert_eq!(wrap_relative(0), 0);
    }

    #[test]
    fn test_return_from_straight_ahead() {
        let pose = Pose {
            x_um: 0,
            y_um: 1_000_000,
            heading_udeg: 0,
        };
        let plan = plan_return_home(&pose, &HomingConfig::default());

        assert_eq!(plan.turn_udeg, 180 * DEG);
        assert_eq!(plan.turn_duration_ms, 180 * DEG as u64 / 196_000);
        assert_eq!(plan.distance_um, 980_000);
        assert_eq!(plan.travel_duration_ms, 980_000 / 147);
    }

    #[test]
    fn test_return_turns_left_when_home_is_left() {
        // Robot 500 mm to the right of home, facing forward
        let pose = Pose {
            x_um: 500_000,
            y_um: 0,
            heading_udeg: 0,
        };
        let plan = plan_return_home(&pose, &HomingConfig::default());
        assert_eq!(plan.turn_udeg, -90 * DEG);
    }

    #[test]
    fn test_return_when_already_facing_home() {
        let pose = Pose {
            x_um: -300_000,
            y_um: -400_000,
            heading_udeg: wrap_heading((0.6f64.atan2(0.8).to_degrees() * 1e6).round() as i64),
        };
        let plan = plan_return_home(&pose, &HomingConfig::default());
        assert!(plan.turn_udeg.abs() <= 1);
        assert_eq!(plan.turn_duration_ms, 0);
        assert_eq!(plan.distance_um, 480_000);
    }

    #[test]
    fn test_return_margin_never_backs_up() {
        let pose = Pose {
            x_um: 5_000,
            y_um: 5_000,
            heading_udeg: 0,
        };
        let plan = plan_return_home(&pose, &HomingConfig::default());
        assert_eq!(plan.distance_um, 0);
        assert_eq!(plan.travel_duration_ms, 0);
    }

    #[test]
    fn test_return_at_origin_is_empty() {
        let plan = plan_return_home(&Pose::default(), &HomingConfig::default());
        assert_eq!(plan, ReturnManeuver::default());
    }
}
