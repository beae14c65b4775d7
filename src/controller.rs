use crate::config::{ControllerConfig, IntegralReset};
use crate::motor::MotorCommand;

/// Everything the PID loop carries from one tick to the next.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ControllerState {
    pub last_error: i32,
    /// Sum of error * dt_ms since the last direction change.
    pub integral: i64,
    pub last_derivative: i32,
    pub last_tick_ms: Option<i64>,
}

impl ControllerState {
    pub fn new() -> Self {
        Self::default()
    }

    /// State whose first tick measures time from `now_ms`.
    pub fn starting_at(now_ms: i64) -> Self {
        Self {
            last_tick_ms: Some(now_ms),
            ..Self::default()
        }
    }
}

/// Raise a non-positive wheel to `min_speed` and take the shortfall from the
/// other wheel, left first, then cap both at `max_speed`.
pub fn clamp_drive(mut left: i32, mut right: i32, min_speed: i32, max_speed: i32) -> MotorCommand {
    if left <= 0 {
        right += -left - min_speed;
        left = min_speed;
    }
    if right <= 0 {
        left += -right - min_speed;
        right = min_speed;
    }

    MotorCommand::new(left.min(max_speed), right.min(max_speed))
}

/// PID steering from line position to a differential wheel command.
pub struct SteeringController {
    config: ControllerConfig,
    center: i32,
}

impl SteeringController {
    /// `center` is the position that means "on the line", usually the middle weight.
    pub fn new(config: ControllerConfig, center: i32) -> Self {
        Self { config, center }
    }

    pub fn config(&self) -> &ControllerConfig {
        &self.config
    }

    pub fn base_speed(&self) -> i32 {
        self.config.base_speed
    }

    pub fn set_base_speed(&mut self, speed: i32) -> i32 {
        self.config.base_speed = speed.clamp(0, self.config.max_speed);
        self.config.base_speed
    }

    /// Change the cruise speed by `delta`, kept within [0, max_speed].
    pub fn adjust_base_speed(&mut self, delta: i32) -> i32 {
        self.set_base_speed(self.config.base_speed + delta)
    }

    /// Turn term for one tick. Updates the integral and derivative history.
    fn turn(&self, error: i32, dt_ms: i64, state: &mut ControllerState) -> i64 {
        let cfg = &self.config;

        let derivative = if dt_ms > 0 {
            let d = i64::from(error - state.last_error) * i64::from(cfg.derivative_scale) / dt_ms;
            d as i32
        } else {
            log::trace!("Non-positive tick ({}ms), reusing derivative", dt_ms);
            state.last_derivative
        };

        let step = i64::from(error) * dt_ms.max(0);
        let crossed = (state.last_error < 0 && error > 0) || (state.last_error > 0 && error < 0);
        if crossed {
            // Overshot the line: the accumulated history points the wrong way
            state.integral = match cfg.integral_reset {
                IntegralReset::Zero => 0,
                IntegralReset::Reseed => step,
            };
        } else {
            state.integral += step;
        }

        let integral_term = if cfg.ki_divisor != 0 {
            state.integral / cfg.ki_divisor
        } else {
            0
        };

        state.last_derivative = derivative;

        i64::from(error) * i64::from(cfg.kp)
            + integral_term
            + i64::from(derivative) * i64::from(cfg.kd)
    }

    /// Compute this tick's wheel command from the line position.
    pub fn step(&self, position: i32, now_ms: i64, state: &mut ControllerState) -> MotorCommand {
        let cfg = &self.config;
        let error = position - self.center;
        let dt_ms = state.last_tick_ms.map_or(0, |last| now_ms - last);

        // Anything past this saturates one wheel and floors the other anyway
        let turn = self
            .turn(error, dt_ms, state)
            .clamp(i64::from(-cfg.max_speed) * 4, i64::from(cfg.max_speed) * 4) as i32;

        state.last_error = error;
        state.last_tick_ms = Some(now_ms);

        let command = clamp_drive(
            cfg.base_speed + turn,
            cfg.base_speed - turn,
            cfg.min_speed,
            cfg.max_speed,
        );
        log::trace!(
            "err {:>4} dt {:>3}ms turn {:>5} integral {:>7} -> {}",
            error,
            dt_ms,
            turn,
            state.integral,
            command
        );
        command
    }
}
