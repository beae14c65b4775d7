use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::sensors::NUM_SENSORS;

// ** SENSOR / ESTIMATOR CONFIGURATION ** //

/// Virtual track position of each sensor, left to right. Center is "on line".
pub const LINE_WEIGHTS: [i32; NUM_SENSORS] = [0, 125, 250, 375, 500];
/// A normalized value above this means the line is under the array.
pub const STRONG_THRESHOLD: u8 = 35;
/// Only values above this contribute to the centroid.
pub const WEAK_THRESHOLD: u8 = 20;
/// Largest tick-to-tick jump (of 100) accepted by the glitch filter.
pub const GLITCH_THRESHOLD: u8 = 30;
/// Consecutive blind ticks before the follow loop reports the line lost.
pub const LOST_AFTER_TICKS: u32 = 200;

// ** CALIBRATION CONFIGURATION ** //

/// Spin the robot in place and sample the array this many times.
pub const SWEEP_TICKS: u32 = 165;
pub const SWEEP_SAMPLE_INTERVAL_MS: u64 = 10;
pub const SWEEP_SPEED: i32 = 40;
/// Time to get a hand clear of the robot before it starts spinning.
pub const SWEEP_START_DELAY_MS: u64 = 500;
pub const SWEEP_SETTLE_MS: u64 = 750;

// ** STEERING CONFIGURATION ** //

/// PID gains. Integer arithmetic: turn = e*KP + integral/KI_DIVISOR + d*KD
pub const KP: i32 = 2;
pub const KI_DIVISOR: i64 = 6500;
pub const KD: i32 = 23;
/// Derivative numerator scale, keeps (delta_e / dt_ms) from truncating to 0
pub const DERIVATIVE_SCALE: i32 = 10;
pub const BASE_SPEED: i32 = 255;
/// Below this the motors stall instead of turning.
pub const MIN_DRIVE_SPEED: i32 = 30;
pub const MAX_DRIVE_SPEED: i32 = 255;
/// Base speed change per button press while tuning.
pub const SPEED_STEP: i32 = 10;

// ** ODOMETRY CONFIGURATION ** //

/// Wheel speed curve: |cmd| * SLOPE_NUM / SLOPE_DEN - INTERCEPT (0.1 mm/s)
/// Measured on robot 493 with fully charged batteries.
pub const WHEEL_SLOPE_NUM: i64 = 430;
pub const WHEEL_SLOPE_DEN: i64 = 8;
pub const WHEEL_INTERCEPT: i64 = 680;
/// Wheelbase in tenths of a millimetre.
pub const WHEELBASE: i64 = 859;
/// Milli-degrees per radian.
pub const TURN_GAIN: i64 = 57_296;

// ** HOMING CONFIGURATION ** //

pub const HOMING_TURN_SPEED: i32 = 40;
/// Measured spin rate at HOMING_TURN_SPEED.
pub const HOMING_TURN_RATE_DEG_PER_S: i64 = 196;
pub const HOMING_TRAVEL_SPEED: i32 = 40;
/// Measured straight-line speed at HOMING_TRAVEL_SPEED.
pub const HOMING_TRAVEL_MM_PER_S: i64 = 147;
/// Stop this far short of the origin.
pub const HOMING_STOP_MARGIN_MM: i64 = 20;

// ** GPIO CONFIGURATION ** //

/// BCM pins of the five RC reflectance sensors, left to right.
pub const GPIO_SENSOR_PINS: [u8; NUM_SENSORS] = [5, 6, 17, 22, 27];
pub const GPIO_EMITTER_PIN: u8 = 21;
/// Sensor discharge timeout (microseconds). Also the maximum raw reading.
pub const SENSOR_TIMEOUT_US: u16 = 2000;
pub const GPIO_BUTTON_A: u8 = 23;
pub const GPIO_BUTTON_B: u8 = 24;
pub const GPIO_BUTTON_C: u8 = 25;
/// Hardware PWM pins: left motor on PWM0 (GPIO 12 or 18), right on PWM1 (13 or 19).
pub const GPIO_LEFT_PWM: u8 = 18;
pub const GPIO_RIGHT_PWM: u8 = 13;
pub const GPIO_LEFT_DIR: u8 = 20;
pub const GPIO_RIGHT_DIR: u8 = 16;
pub const MOTOR_PWM_FREQUENCY_HZ: f64 = 20_000.0;

/// How the glitch filter treats a reading that jumps past the threshold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FilterPolicy {
    /// Keep the stored value for as long as the new one is out of range.
    Sticky,
    /// Reject once, accept on the second consecutive out-of-range tick.
    Adaptive,
    /// Use every reading as is.
    Off,
}

/// What the estimator reports while no sensor sees the line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BlindSteer {
    HoldLast,
    SnapToEdge,
}

/// Integral value right after the position error changes sign.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum IntegralReset {
    Zero,
    /// Start again from this tick's `error * dt`.
    Reseed,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct EstimatorConfig {
    pub weights: [i32; NUM_SENSORS],
    pub strong_threshold: u8,
    pub weak_threshold: u8,
    pub glitch_threshold: u8,
    pub filter_policy: FilterPolicy,
    pub blind_steer: BlindSteer,
    pub lost_after_ticks: u32,
}

impl Default for EstimatorConfig {
    fn default() -> Self {
        Self {
            weights: LINE_WEIGHTS,
            strong_threshold: STRONG_THRESHOLD,
            weak_threshold: WEAK_THRESHOLD,
            glitch_threshold: GLITCH_THRESHOLD,
            filter_policy: FilterPolicy::Sticky,
            blind_steer: BlindSteer::HoldLast,
            lost_after_ticks: LOST_AFTER_TICKS,
        }
    }
}

impl EstimatorConfig {
    /// Track position that means "line under the middle sensor".
    pub fn center(&self) -> i32 {
        self.weights[NUM_SENSORS / 2]
    }

    /// Settings of the simpler 328p program: higher thresholds, no glitch filter.
    pub fn simple() -> Self {
        Self {
            strong_threshold: 40,
            weak_threshold: 25,
            filter_policy: FilterPolicy::Off,
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct CalibrationConfig {
    pub sweep_ticks: u32,
    pub sample_interval_ms: u64,
    pub sweep_speed: i32,
    pub start_delay_ms: u64,
    pub settle_ms: u64,
    /// Subtracted from every learned minimum after the sweep.
    pub min_margin: u16,
}

impl Default for CalibrationConfig {
    fn default() -> Self {
        Self {
            sweep_ticks: SWEEP_TICKS,
            sample_interval_ms: SWEEP_SAMPLE_INTERVAL_MS,
            sweep_speed: SWEEP_SPEED,
            start_delay_ms: SWEEP_START_DELAY_MS,
            settle_ms: SWEEP_SETTLE_MS,
            min_margin: 0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct ControllerConfig {
    pub kp: i32,
    /// Zero disables the integral term.
    pub ki_divisor: i64,
    pub kd: i32,
    pub derivative_scale: i32,
    pub base_speed: i32,
    pub min_speed: i32,
    pub max_speed: i32,
    pub speed_step: i32,
    pub integral_reset: IntegralReset,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            kp: KP,
            ki_divisor: KI_DIVISOR,
            kd: KD,
            derivative_scale: DERIVATIVE_SCALE,
            base_speed: BASE_SPEED,
            min_speed: MIN_DRIVE_SPEED,
            max_speed: MAX_DRIVE_SPEED,
            speed_step: SPEED_STEP,
            integral_reset: IntegralReset::Zero,
        }
    }
}

/// Per-robot curve from motor command to wheel speed. Fit it per physical unit.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct WheelCalibration {
    pub slope_num: i64,
    pub slope_den: i64,
    /// Tenths of mm/s lost to friction; commands below intercept/slope are deadband.
    pub intercept: i64,
    /// Tenths of a millimetre.
    pub wheelbase: i64,
    /// Milli-degrees per radian, or a fitted substitute.
    pub turn_gain: i64,
}

impl Default for WheelCalibration {
    fn default() -> Self {
        Self {
            slope_num: WHEEL_SLOPE_NUM,
            slope_den: WHEEL_SLOPE_DEN,
            intercept: WHEEL_INTERCEPT,
            wheelbase: WHEELBASE,
            turn_gain: TURN_GAIN,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct HomingConfig {
    pub turn_speed: i32,
    pub turn_rate_deg_per_s: i64,
    pub travel_speed: i32,
    pub travel_mm_per_s: i64,
    pub stop_margin_mm: i64,
    /// Start the maneuver on its own once the line is lost.
    pub on_line_lost: bool,
}

impl Default for HomingConfig {
    fn default() -> Self {
        Self {
            turn_speed: HOMING_TURN_SPEED,
            turn_rate_deg_per_s: HOMING_TURN_RATE_DEG_PER_S,
            travel_speed: HOMING_TRAVEL_SPEED,
            travel_mm_per_s: HOMING_TRAVEL_MM_PER_S,
            stop_margin_mm: HOMING_STOP_MARGIN_MM,
            on_line_lost: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct HardwareConfig {
    pub sensor_pins: [u8; NUM_SENSORS],
    pub emitter_pin: u8,
    pub sensor_timeout_us: u16,
    pub button_a: u8,
    pub button_b: u8,
    pub button_c: u8,
    pub left_pwm: u8,
    pub right_pwm: u8,
    pub left_dir: u8,
    pub right_dir: u8,
    pub pwm_frequency_hz: f64,
}

impl Default for HardwareConfig {
    fn default() -> Self {
        Self {
            sensor_pins: GPIO_SENSOR_PINS,
            emitter_pin: GPIO_EMITTER_PIN,
            sensor_timeout_us: SENSOR_TIMEOUT_US,
            button_a: GPIO_BUTTON_A,
            button_b: GPIO_BUTTON_B,
            button_c: GPIO_BUTTON_C,
            left_pwm: GPIO_LEFT_PWM,
            right_pwm: GPIO_RIGHT_PWM,
            left_dir: GPIO_LEFT_DIR,
            right_dir: GPIO_RIGHT_DIR,
            pwm_frequency_hz: MOTOR_PWM_FREQUENCY_HZ,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default env_logger filter when RUST_LOG is unset.
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

/// Everything tunable on one robot. Each program variant is one instance.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct RobotConfig {
    pub estimator: EstimatorConfig,
    pub calibration: CalibrationConfig,
    pub controller: ControllerConfig,
    pub wheel: WheelCalibration,
    pub homing: HomingConfig,
    pub hardware: HardwareConfig,
    pub logging: LoggingConfig,
}

impl RobotConfig {
    /// Load and validate a TOML config. Missing sections keep their defaults.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = fs::read_to_string(path)?;
        Self::from_toml(&contents)
    }

    pub fn from_toml(contents: &str) -> Result<Self> {
        let config: RobotConfig = toml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_toml(&self) -> Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    pub fn validate(&self) -> Result<()> {
        let est = &self.estimator;
        if !est.weights.windows(2).all(|w| w[0] < w[1]) {
            return Err(Error::InvalidConfig(format!(
                "line weights must be strictly increasing: {:?}",
                est.weights
            )));
        }
        if est.strong_threshold > 100 || est.weak_threshold > 100 || est.glitch_threshold > 100 {
            return Err(Error::InvalidConfig(
                "estimator thresholds are percentages (0-100)".into(),
            ));
        }
        if est.lost_after_ticks == 0 {
            return Err(Error::InvalidConfig(
                "lost_after_ticks must be at least 1".into(),
            ));
        }

        let ctl = &self.controller;
        if ctl.min_speed <= 0 || ctl.min_speed >= ctl.max_speed {
            return Err(Error::InvalidConfig(format!(
                "need 0 < min_speed < max_speed, got {} and {}",
                ctl.min_speed, ctl.max_speed
            )));
        }

        let wheel = &self.wheel;
        if wheel.wheelbase <= 0 || wheel.slope_den == 0 {
            return Err(Error::InvalidConfig(
                "wheelbase and slope_den must be nonzero".into(),
            ));
        }

        let homing = &self.homing;
        if homing.turn_rate_deg_per_s <= 0 || homing.travel_mm_per_s <= 0 {
            return Err(Error::InvalidConfig(
                "homing turn rate and travel speed must be positive".into(),
            ));
        }

        if self.calibration.sweep_ticks == 0 {
            return Err(Error::InvalidConfig("sweep_ticks must be nonzero".into()));
        }

        Ok(())
    }
}
