//! Learns the reflectance range of each sensor.
//!
//! The robot spins in place over the line while the array is sampled, so every
//! sensor sees both the line and the background. Readings are later scaled
//! into 0-100 against the learned bounds.

use std::fmt;

use crate::clock::Clock;
use crate::config::CalibrationConfig;
use crate::error::{Error, Result};
use crate::motor::{MotorCommand, MotorDrive};
use crate::sensors::{LineSensors, NUM_SENSORS, SensorArray};

/// Normalized reading range.
pub const NORMALIZED_MAX: u8 = 100;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SensorBounds {
    pub min: u16,
    pub max: u16,
}

impl SensorBounds {
    /// Nothing observed yet.
    pub const EMPTY: SensorBounds = SensorBounds {
        min: u16::MAX,
        max: 0,
    };

    /// A sensor whose bounds never opened up carries no signal.
    pub fn is_degenerate(&self) -> bool {
        self.max <= self.min
    }

    /// Scale `raw` into [0, 100]. Degenerate bounds read as 0.
    pub fn normalize(&self, raw: u16) -> u8 {
        if self.is_degenerate() {
            return 0;
        }
        let span = i64::from(self.max) - i64::from(self.min);
        let scaled = (i64::from(raw) - i64::from(self.min)) * i64::from(NORMALIZED_MAX) / span;
        scaled.clamp(0, i64::from(NORMALIZED_MAX)) as u8
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CalibrationBounds {
    pub sensors: [SensorBounds; NUM_SENSORS],
}

impl Default for CalibrationBounds {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for CalibrationBounds {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, b) in self.sensors.iter().enumerate() {
            if i > 0 {
                write!(f, " ")?;
            }
            if b.is_degenerate() {
                write!(f, "[{}: --]", i)?;
            } else {
                write!(f, "[{}: {}-{}]", i, b.min, b.max)?;
            }
        }
        Ok(())
    }
}

impl CalibrationBounds {
    pub fn new() -> Self {
        Self {
            sensors: [SensorBounds::EMPTY; NUM_SENSORS],
        }
    }

    /// Bounds with the same range on every sensor.
    pub fn uniform(min: u16, max: u16) -> Self {
        Self {
            sensors: [SensorBounds { min, max }; NUM_SENSORS],
        }
    }

    /// Widen each sensor's bounds to include `raw`.
    pub fn observe(&mut self, raw: &SensorArray) {
        for (bounds, &value) in self.sensors.iter_mut().zip(raw.iter()) {
            bounds.min = bounds.min.min(value);
            bounds.max = bounds.max.max(value);
        }
    }

    /// Lower every learned minimum so live readings slightly under it still scale.
    pub fn widen_min(&mut self, margin: u16) {
        for bounds in self.sensors.iter_mut().filter(|b| !b.is_degenerate()) {
            bounds.min = bounds.min.saturating_sub(margin);
        }
    }

    pub fn normalize(&self, raw: &SensorArray) -> [u8; NUM_SENSORS] {
        std::array::from_fn(|i| self.sensors[i].normalize(raw[i]))
    }

    /// Indices of sensors that never saw contrast.
    pub fn degenerate_sensors(&self) -> Vec<usize> {
        self.sensors
            .iter()
            .enumerate()
            .filter(|(_, b)| b.is_degenerate())
            .map(|(i, _)| i)
            .collect()
    }

    pub fn validate(&self) -> Result<()> {
        let sensors = self.degenerate_sensors();
        if sensors.is_empty() {
            Ok(())
        } else {
            Err(Error::DegenerateCalibration { sensors })
        }
    }
}

/// Runs the calibration sweep.
pub struct SensorCalibrator<'a> {
    config: &'a CalibrationConfig,
}

impl<'a> SensorCalibrator<'a> {
    pub fn new(config: &'a CalibrationConfig) -> Self {
        Self { config }
    }

    /// Spin in place and learn bounds from `sweep_ticks` samples.
    pub fn sweep<S, M, C>(
        &self,
        sensors: &mut S,
        motors: &mut M,
        clock: &C,
    ) -> Result<CalibrationBounds>
    where
        S: LineSensors,
        M: MotorDrive,
        C: Clock,
    {
        let cfg = self.config;
        log::info!(
            "Calibrating: {} samples every {}ms at speed {}",
            cfg.sweep_ticks,
            cfg.sample_interval_ms,
            cfg.sweep_speed
        );

        clock.sleep_ms(cfg.start_delay_ms);
        motors.drive(MotorCommand::spin(cfg.sweep_speed))?;

        let mut bounds = CalibrationBounds::new();
        let sampled = self.sample(sensors, clock, &mut bounds);

        // Stop before reporting a sensor failure
        motors.stop()?;
        sampled?;
        clock.sleep_ms(cfg.settle_ms);

        if cfg.min_margin > 0 {
            bounds.widen_min(cfg.min_margin);
        }

        log::info!("Calibration done: {}", bounds);
        if let Err(e) = bounds.validate() {
            log::warn!("{}", e);
        }
        Ok(bounds)
    }

    fn sample<S: LineSensors, C: Clock>(
        &self,
        sensors: &mut S,
        clock: &C,
        bounds: &mut CalibrationBounds,
    ) -> Result<()> {
        for tick in 0..self.config.sweep_ticks {
            let raw = sensors.read_sensors()?;
            bounds.observe(&raw);
            log::trace!("Sweep {:>3}: {:?}", tick, raw);
            clock.sleep_ms(self.config.sample_interval_ms);
        }
        Ok(())
    }
}
