use std::thread;
use std::time::{Duration, Instant};

use crate::config::HardwareConfig;
use crate::error::Result;

// Use rppal in production
#[cfg(not(test))]
use rppal::gpio::{Gpio, IoPin, Level, Mode, OutputPin};

#[cfg(test)]
// This is only used in testing, not compiled in release.
use crate::mocks::mock_gpio::{Gpio, IoPin, Level, Mode, OutputPin};

/// Number of reflectance sensors in the array.
pub const NUM_SENSORS: usize = 5;

/// One raw reading per sensor, left to right.
pub type SensorArray = [u16; NUM_SENSORS];

/// How long the sensor capacitors are charged before timing the discharge.
const CHARGE_TIME_US: u64 = 10;

/// Source of reflectance snapshots.
pub trait LineSensors {
    /// Read all sensors as one atomic snapshot.
    fn read_sensors(&mut self) -> Result<SensorArray>;
}

/// QTR-RC style array: each reading is the discharge time in microseconds,
/// capped at the timeout. Dark surfaces discharge slowly and read high.
pub struct ReflectanceArray {
    pins: Vec<IoPin>,
    emitter: OutputPin,
    timeout_us: u16,
}

impl ReflectanceArray {
    pub fn new(hardware: &HardwareConfig) -> Result<Self> {
        Self::with_pins(
            hardware.sensor_pins,
            hardware.emitter_pin,
            hardware.sensor_timeout_us,
        )
    }

    pub fn with_pins(
        sensor_pins: [u8; NUM_SENSORS],
        emitter_pin: u8,
        timeout_us: u16,
    ) -> Result<Self> {
        let gpio = Gpio::new()?;

        let mut pins = Vec::with_capacity(NUM_SENSORS);
        for pin in sensor_pins {
            pins.push(gpio.get(pin)?.into_io(Mode::Input));
        }

        let mut emitter = gpio.get(emitter_pin)?.into_output();
        emitter.set_high();

        log::debug!(
            "Reflectance array on pins {:?}, emitter {}, timeout {}us",
            sensor_pins,
            emitter_pin,
            timeout_us
        );

        Ok(Self {
            pins,
            emitter,
            timeout_us,
        })
    }

    /// Charge every sensor, release them together and time each discharge.
    fn time_discharge(&mut self) -> SensorArray {
        for pin in self.pins.iter_mut() {
            pin.set_mode(Mode::Output);
            pin.set_high();
        }
        thread::sleep(Duration::from_micros(CHARGE_TIME_US));
        for pin in self.pins.iter_mut() {
            pin.set_mode(Mode::Input);
        }

        let timeout = Duration::from_micros(u64::from(self.timeout_us));
        let mut readings: [Option<u16>; NUM_SENSORS] = [None; NUM_SENSORS];
        let start = Instant::now();

        loop {
            let elapsed = start.elapsed();
            if elapsed >= timeout || readings.iter().all(Option::is_some) {
                break;
            }
            let elapsed_us = elapsed.as_micros().min(u128::from(self.timeout_us)) as u16;
            for (reading, pin) in readings.iter_mut().zip(self.pins.iter()) {
                if reading.is_none() && pin.read() == Level::Low {
                    *reading = Some(elapsed_us);
                }
            }
        }

        readings.map(|r| r.unwrap_or(self.timeout_us))
    }
}

impl LineSensors for ReflectanceArray {
    fn read_sensors(&mut self) -> Result<SensorArray> {
        let raw = self.time_discharge();
        log::trace!("Raw sensors: {:?}", raw);
        Ok(raw)
    }
}

impl Drop for ReflectanceArray {
    fn drop(&mut self) {
        // Emitters off when the array goes away
        self.emitter.set_low();
    }
}
