pub mod mock_clock;
pub mod mock_drive;
pub mod mock_gpio;
pub mod mock_pwm;
