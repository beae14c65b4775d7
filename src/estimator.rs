//! Line position from a reflectance snapshot.
//!
//! Readings are normalized against the calibration bounds, passed through a
//! per-sensor glitch filter and reduced to a weighted centroid over the
//! configured line weights. The result is a track position on the weights'
//! scale (0-500 by default, 250 is centered) plus whether the line was seen.

use crate::calibration::CalibrationBounds;
use crate::config::{BlindSteer, EstimatorConfig, FilterPolicy};
use crate::sensors::{NUM_SENSORS, SensorArray};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct LineEstimate {
    pub position: i32,
    pub seen: bool,
    /// Filtered normalized values the estimate was computed from.
    pub values: [u8; NUM_SENSORS],
}

/// Last accepted normalized value per sensor.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RangeFilterState {
    accepted: [Option<u8>; NUM_SENSORS],
    pending: [Option<u8>; NUM_SENSORS],
}

impl RangeFilterState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed from a reading taken right after calibration, so the first
    /// ticks on the line are not rejected against nothing.
    pub fn prime(&mut self, raw: &SensorArray, bounds: &CalibrationBounds) {
        self.accepted = bounds.normalize(raw).map(Some);
        self.pending = [None; NUM_SENSORS];
    }

    pub fn is_primed(&self) -> bool {
        self.accepted.iter().all(Option::is_some)
    }

    pub fn accepted(&self) -> [Option<u8>; NUM_SENSORS] {
        self.accepted
    }

    /// Replace out-of-range jumps with the stored value, store what passes.
    pub fn apply(
        &mut self,
        values: [u8; NUM_SENSORS],
        threshold: u8,
        policy: FilterPolicy,
    ) -> [u8; NUM_SENSORS] {
        if policy == FilterPolicy::Off {
            return values;
        }

        let mut out = values;
        for (i, value) in values.into_iter().enumerate() {
            let Some(stored) = self.accepted[i] else {
                self.accepted[i] = Some(value);
                continue;
            };

            if stored.abs_diff(value) <= threshold {
                self.accepted[i] = Some(value);
                self.pending[i] = None;
                continue;
            }

            let confirmed = policy == FilterPolicy::Adaptive
                && self.pending[i].is_some_and(|p| p.abs_diff(value) <= threshold);

            if confirmed {
                log::trace!("Sensor {} re-based {} -> {}", i, stored, value);
                self.accepted[i] = Some(value);
                self.pending[i] = None;
            } else {
                log::trace!("Sensor {} glitch {} (holding {})", i, value, stored);
                if policy == FilterPolicy::Adaptive {
                    self.pending[i] = Some(value);
                }
                out[i] = stored;
            }
        }
        out
    }
}

pub struct LineEstimator {
    config: EstimatorConfig,
    last_position: i32,
}

impl LineEstimator {
    /// Starts out reporting the center position.
    pub fn new(config: EstimatorConfig) -> Self {
        let last_position = config.center();
        Self {
            config,
            last_position,
        }
    }

    pub fn config(&self) -> &EstimatorConfig {
        &self.config
    }

    /// Most recent position, the one reported under total blackout.
    pub fn last_position(&self) -> i32 {
        self.last_position
    }

    pub fn estimate(
        &mut self,
        raw: &SensorArray,
        bounds: &CalibrationBounds,
        filter: &mut RangeFilterState,
    ) -> LineEstimate {
        let cfg = &self.config;
        let values = filter.apply(bounds.normalize(raw), cfg.glitch_threshold, cfg.filter_policy);

        let seen = values.iter().any(|&v| v > cfg.strong_threshold);

        if !seen && cfg.blind_steer == BlindSteer::SnapToEdge {
            // Hard turn back toward the side the line was last on
            let position = if self.last_position >= cfg.center() {
                cfg.weights[NUM_SENSORS - 1]
            } else {
                cfg.weights[0]
            };
            return LineEstimate {
                position,
                seen,
                values,
            };
        }

        let (weighted, total) = values
            .iter()
            .zip(cfg.weights.iter())
            .filter(|(v, _)| **v > cfg.weak_threshold)
            .fold((0i64, 0i64), |(weighted, total), (&v, &w)| {
                (weighted + i64::from(v) * i64::from(w), total + i64::from(v))
            });

        if total > 0 {
            self.last_position = (weighted / total) as i32;
        }

        LineEstimate {
            position: self.last_position,
            seen,
            values,
        }
    }
}
