use std::thread;
use std::time::Duration;

use crate::config::HardwareConfig;
use crate::error::Result;
use crate::mode::Button;

// Use rppal in production
#[cfg(not(test))]
use rppal::gpio::{Gpio, InputPin, Level};

#[cfg(test)]
// This is only used in testing, not compiled in release.
use crate::mocks::mock_gpio::{Gpio, InputPin, Level};

/// Three active-low push buttons with pull-ups.
pub struct ButtonPanel {
    pins: [(Button, InputPin); 3],
    held: [bool; 3],
}

/// Provides methods for interacting with GPIO supported physical hardware.
impl ButtonPanel {
    pub fn new(hardware: &HardwareConfig) -> Result<Self> {
        Self::with_pins(hardware.button_a, hardware.button_b, hardware.button_c)
    }

    pub fn with_pins(a: u8, b: u8, c: u8) -> Result<Self> {
        let gpio = Gpio::new()?;

        let pins = [
            (Button::A, gpio.get(a)?.into_input_pullup()),
            (Button::B, gpio.get(b)?.into_input_pullup()),
            (Button::C, gpio.get(c)?.into_input_pullup()),
        ];

        thread::sleep(Duration::from_millis(100));

        Ok(Self {
            pins,
            held: [false; 3],
        })
    }

    /// Buttons that went down since the last poll, in A, B, C order.
    pub fn poll(&mut self) -> Vec<Button> {
        let mut pressed = Vec::new();
        for ((button, pin), held) in self.pins.iter().zip(self.held.iter_mut()) {
            let down = pin.read() == Level::Low;
            if down && !*held {
                log::debug!("Button {:?} pressed", button);
                pressed.push(*button);
            }
            *held = down;
        }
        pressed
    }
}
