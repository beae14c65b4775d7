//! Error types for line-rs

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// GPIO access failed (sensor array, buttons, motor direction pins)
    #[error("GPIO error: {0}")]
    Gpio(#[from] rppal::gpio::Error),

    /// Hardware PWM access failed
    #[error("PWM error: {0}")]
    Pwm(#[from] rppal::pwm::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration file is not valid TOML for `RobotConfig`
    #[error("Config parse error: {0}")]
    ConfigParse(#[from] toml::de::Error),

    #[error("Config serialize error: {0}")]
    ConfigSerialize(#[from] toml::ser::Error),

    /// Configuration parsed but holds values the controller cannot run with
    #[error("Invalid config: {0}")]
    InvalidConfig(String),

    /// One or more sensors never saw contrast during the sweep (max <= min)
    #[error("Degenerate calibration on sensor(s) {sensors:?}")]
    DegenerateCalibration { sensors: Vec<usize> },

    /// Pin cannot be used for the requested function
    #[error("Invalid pin: {0}")]
    InvalidPin(u8),
}
