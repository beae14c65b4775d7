// This file is only compiled during tests

use std::collections::VecDeque;

use crate::error::Result;
use crate::motor::{MotorCommand, MotorDrive};
use crate::sensors::{LineSensors, SensorArray};

/// Remembers every command it was given.
#[derive(Debug, Default)]
pub struct RecordingDrive {
    pub commands: Vec<MotorCommand>,
}

impl RecordingDrive {
    pub fn last(&self) -> Option<MotorCommand> {
        self.commands.last().copied()
    }
}

impl MotorDrive for RecordingDrive {
    fn drive(&mut self, command: MotorCommand) -> Result<()> {
        self.commands.push(command);
        Ok(())
    }
}

/// Replays readings in order, then repeats the last one.
pub struct ScriptedSensors {
    readings: VecDeque<SensorArray>,
    last: SensorArray,
    pub reads: usize,
}

impl ScriptedSensors {
    pub fn new(readings: Vec<SensorArray>) -> Self {
        Self {
            readings: readings.into(),
            last: [0; 5],
            reads: 0,
        }
    }
}

impl LineSensors for ScriptedSensors {
    fn read_sensors(&mut self) -> Result<SensorArray> {
        if let Some(next) = self.readings.pop_front() {
            self.last = next;
        }
        self.reads += 1;
        Ok(self.last)
    }
}
