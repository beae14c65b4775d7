use std::fmt;

use crate::config::HardwareConfig;
use crate::error::{Error, Result};

// Use rppal in production
#[cfg(not(test))]
use rppal::{
    gpio::{Gpio, OutputPin},
    pwm::{Channel, Polarity, Pwm},
};

// Mock PWM / GPIO for testing
#[cfg(test)]
use crate::mocks::{
    mock_gpio::{Gpio, OutputPin},
    mock_pwm::{Channel, Polarity, Pwm},
};

/// Signed wheel speeds. Positive drives forward.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct MotorCommand {
    pub left: i32,
    pub right: i32,
}

impl MotorCommand {
    pub const STOP: MotorCommand = MotorCommand { left: 0, right: 0 };

    pub fn new(left: i32, right: i32) -> Self {
        Self { left, right }
    }

    /// Spin in place, clockwise for positive speed.
    pub fn spin(speed: i32) -> Self {
        Self::new(speed, -speed)
    }

    pub fn straight(speed: i32) -> Self {
        Self::new(speed, speed)
    }
}

impl fmt::Display for MotorCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "(L {:>4}, R {:>4})", self.left, self.right)
    }
}

/// Fire-and-forget wheel command sink.
pub trait MotorDrive {
    fn drive(&mut self, command: MotorCommand) -> Result<()>;

    fn stop(&mut self) -> Result<()> {
        self.drive(MotorCommand::STOP)
    }
}

fn pwm_channel(pin: u8) -> Result<Channel> {
    match pin {
        12 | 18 => Ok(Channel::Pwm0),
        13 | 19 => Ok(Channel::Pwm1),
        _ => Err(Error::InvalidPin(pin)),
    }
}

/// One motor: a hardware PWM channel for magnitude and a GPIO for direction.
struct Motor {
    pwm: Pwm,
    direction: OutputPin,
}

impl Motor {
    fn new(pwm_pin: u8, dir_pin: u8, frequency_hz: f64, gpio: &Gpio) -> Result<Self> {
        let pwm = Pwm::with_frequency(
            pwm_channel(pwm_pin)?,
            frequency_hz,
            0.0, // stopped
            Polarity::Normal,
            true, // enabled
        )?;
        let direction = gpio.get(dir_pin)?.into_output();
        Ok(Self { pwm, direction })
    }

    fn set_speed(&mut self, speed: i32, max_speed: i32) -> Result<()> {
        if speed < 0 {
            self.direction.set_high();
        } else {
            self.direction.set_low();
        }

        let duty_cycle = (f64::from(speed.unsigned_abs()) / f64::from(max_speed)).clamp(0.0, 1.0);
        self.pwm.set_duty_cycle(duty_cycle)?;
        Ok(())
    }

    fn disable(&mut self) -> Result<()> {
        self.pwm.set_duty_cycle(0.0)?;
        self.pwm.disable()?;
        Ok(())
    }
}

/// Differential drive on two H-bridge channels.
pub struct PwmMotors {
    left: Motor,
    right: Motor,
    max_speed: i32,
}

impl PwmMotors {
    /// Create the drive from the configured pin map
    pub fn new(hardware: &HardwareConfig, max_speed: i32) -> Result<Self> {
        Self::with_pins(
            (hardware.left_pwm, hardware.left_dir),
            (hardware.right_pwm, hardware.right_dir),
            hardware.pwm_frequency_hz,
            max_speed,
        )
    }

    /// Create the drive on custom `(pwm, direction)` pin pairs
    pub fn with_pins(
        left: (u8, u8),
        right: (u8, u8),
        frequency_hz: f64,
        max_speed: i32,
    ) -> Result<Self> {
        if pwm_channel(left.0)? == pwm_channel(right.0)? {
            return Err(Error::InvalidPin(right.0));
        }
        if max_speed <= 0 {
            return Err(Error::InvalidConfig(format!(
                "max_speed must be positive, got {}",
                max_speed
            )));
        }

        let gpio = Gpio::new()?;
        let left = Motor::new(left.0, left.1, frequency_hz, &gpio)?;
        let right = Motor::new(right.0, right.1, frequency_hz, &gpio)?;

        log::debug!("Motors ready at {:.0} Hz, full scale {}", frequency_hz, max_speed);
        Ok(Self {
            left,
            right,
            max_speed,
        })
    }

    /// Disable PWM output
    pub fn disable(&mut self) -> Result<()> {
        self.left.disable()?;
        self.right.disable()?;
        Ok(())
    }
}

impl MotorDrive for PwmMotors {
    fn drive(&mut self, command: MotorCommand) -> Result<()> {
        self.left.set_speed(command.left, self.max_speed)?;
        self.right.set_speed(command.right, self.max_speed)?;
        Ok(())
    }
}

impl Drop for PwmMotors {
    fn drop(&mut self) {
        // Ensure PWM is disabled when dropped
        let _ = self.disable();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mocks::{mock_gpio, mock_pwm};

    fn motors() -> Result<PwmMotors> {
        mock_gpio::reset_mock_pins();
        PwmMotors::with_pins((18, 20), (13, 16), 20_000.0, 255)
    }

    #[test]
    fn test_forward_command_sets_duty_and_direction() -> Result<()> {
        let mut motors = motors()?;
        motors.drive(MotorCommand::new(255, 51))?;

        assert_eq!(mock_pwm::get_mock_duty_cycle(Channel::Pwm0), Some(1.0));
        assert_eq!(mock_pwm::get_mock_duty_cycle(Channel::Pwm1), Some(0.2));
        assert_eq!(mock_gpio::get_mock_output(20), Some(mock_gpio::Level::Low));
        assert_eq!(mock_gpio::get_mock_output(16), Some(mock_gpio::Level::Low));
        Ok(())
    }

    #[test]
    fn test_reverse_sets_direction_pin() -> Result<()> {
        let mut motors = motors()?;
        motors.drive(MotorCommand::spin(-40))?;

        assert_eq!(mock_gpio::get_mock_output(20), Some(mock_gpio::Level::High));
        assert_eq!(mock_gpio::get_mock_output(16), Some(mock_gpio::Level::Low));
        Ok(())
    }

    #[test]
    fn test_out_of_range_duty_is_clamped() -> Result<()> {
        let mut motors = motors()?;
        motors.drive(MotorCommand::straight(1000))?;
        assert_eq!(mock_pwm::get_mock_duty_cycle(Channel::Pwm0), Some(1.0));
        Ok(())
    }

    #[test]
    fn test_stop_and_drop_disable() -> Result<()> {
        let mut motors = motors()?;
        motors.drive(MotorCommand::straight(100))?;
        motors.stop()?;
        assert_eq!(mock_pwm::get_mock_duty_cycle(Channel::Pwm1), Some(0.0));

        assert!(mock_pwm::is_mock_enabled(Channel::Pwm0));
        drop(motors);
        assert!(!mock_pwm::is_mock_enabled(Channel::Pwm0));
        assert!(!mock_pwm::is_mock_enabled(Channel::Pwm1));
        Ok(())
    }

    #[test]
    fn test_rejects_shared_or_invalid_channels() {
        assert!(matches!(
            PwmMotors::with_pins((18, 20), (12, 16), 20_000.0, 255),
            Err(Error::InvalidPin(12))
        ));
        assert!(matches!(
            PwmMotors::with_pins((4, 20), (13, 16), 20_000.0, 255),
            Err(Error::InvalidPin(4))
        ));
    }
}
