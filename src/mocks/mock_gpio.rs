// This file is only compiled during tests

use std::cell::RefCell;
use std::collections::HashMap;

use crate::error::Result;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Level {
    Low,
    High,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Mode {
    Input,
    Output,
}

thread_local! {
    // Level seen on the wire by an input, set from tests.
    static MOCK_PINS: RefCell<HashMap<u8, Level>> = RefCell::new(HashMap::new());
    // Level last driven by an output.
    static MOCK_OUTPUTS: RefCell<HashMap<u8, Level>> = RefCell::new(HashMap::new());
}

fn external_level(pin: u8) -> Level {
    MOCK_PINS.with(|pins| *pins.borrow().get(&pin).unwrap_or(&Level::High))
}

fn drive(pin: u8, level: Level) {
    MOCK_OUTPUTS.with(|outputs| {
        outputs.borrow_mut().insert(pin, level);
    });
}

pub struct InputPin {
    pin: u8,
}

impl InputPin {
    pub fn read(&self) -> Level {
        external_level(self.pin)
    }
}

pub struct OutputPin {
    pin: u8,
}

impl OutputPin {
    pub fn set_high(&mut self) {
        drive(self.pin, Level::High);
    }

    pub fn set_low(&mut self) {
        drive(self.pin, Level::Low);
    }
}

pub struct IoPin {
    pin: u8,
    mode: Mode,
}

impl IoPin {
    pub fn set_mode(&mut self, mode: Mode) {
        self.mode = mode;
    }

    pub fn set_high(&mut self) {
        drive(self.pin, Level::High);
    }

    pub fn read(&self) -> Level {
        match self.mode {
            Mode::Input => external_level(self.pin),
            Mode::Output => get_mock_output(self.pin).unwrap_or(Level::Low),
        }
    }
}

pub struct Gpio;

impl Gpio {
    pub fn new() -> Result<Self> {
        Ok(Gpio)
    }

    pub fn get(&self, pin: u8) -> Result<Pin> {
        Ok(Pin { pin })
    }
}

pub struct Pin {
    pin: u8,
}

impl Pin {
    pub fn into_input_pullup(self) -> InputPin {
        MOCK_PINS.with(|pins| {
            pins.borrow_mut().entry(self.pin).or_insert(Level::High);
        });
        InputPin { pin: self.pin }
    }

    pub fn into_output(self) -> OutputPin {
        drive(self.pin, Level::Low);
        OutputPin { pin: self.pin }
    }

    pub fn into_io(self, mode: Mode) -> IoPin {
        IoPin {
            pin: self.pin,
            mode,
        }
    }
}

// test helper function to set pin levels
pub fn set_mock_pin_level(pin: u8, level: Level) {
    MOCK_PINS.with(|pins| {
        pins.borrow_mut().insert(pin, level);
    });
}

// test helper to check what an output is driving
pub fn get_mock_output(pin: u8) -> Option<Level> {
    MOCK_OUTPUTS.with(|outputs| outputs.borrow().get(&pin).copied())
}

// test helper to reset all pins
pub fn reset_mock_pins() {
    MOCK_PINS.with(|pins| pins.borrow_mut().clear());
    MOCK_OUTPUTS.with(|outputs| outputs.borrow_mut().clear());
}
