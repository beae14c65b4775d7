use crate::clock::Clock;
use crate::config::RobotConfig;
use crate::error::Result;
use crate::follower::{FollowStatus, LineFollower};
use crate::mode::{Button, Event, Mode};
use crate::motor::{MotorCommand, MotorDrive};
use crate::odometry::ReturnManeuver;
use crate::sensors::LineSensors;

/// Runs the mode state machine on top of a `LineFollower` and real (or mock)
/// hardware.
pub struct Robot<S, M, C> {
    follower: LineFollower,
    mode: Mode,
    sensors: S,
    motors: M,
    clock: C,
    /// What the wheels are currently doing.
    last_command: MotorCommand,
}

impl<S: LineSensors, M: MotorDrive, C: Clock> Robot<S, M, C> {
    /// Fails if `config` does not pass `RobotConfig::validate`.
    pub fn new(config: RobotConfig, sensors: S, motors: M, clock: C) -> Result<Self> {
        Ok(Self {
            follower: LineFollower::new(config)?,
            mode: Mode::default(),
            sensors,
            motors,
            clock,
            last_command: MotorCommand::STOP,
        })
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    pub fn follower(&self) -> &LineFollower {
        &self.follower
    }

    pub fn follower_mut(&mut self) -> &mut LineFollower {
        &mut self.follower
    }

    pub fn motors(&self) -> &M {
        &self.motors
    }

    /// Feed an event through the state machine and run the entry action of
    /// the new mode.
    pub fn handle(&mut self, event: Event) -> Result<()> {
        let previous = self.mode;
        let next = previous.on_event(event);
        if next == previous {
            log::trace!("{:?} ignored while {}", event, previous);
            return Ok(());
        }

        log::info!("Mode {} -> {} ({:?})", previous, next, event);
        if previous == Mode::Following {
            // Account for the wheels running since the last tick
            let now = self.clock.now_ms();
            self.follower.record_drive(self.last_command, now);
        }
        self.mode = next;
        self.enter(next)
    }

    /// Button press from the operator. While tuning, A and B change the
    /// cruise speed instead of being state machine events.
    pub fn handle_button(&mut self, button: Button) -> Result<()> {
        if self.mode == Mode::TuningGain {
            let step = self.follower.config().controller.speed_step;
            let delta = match button {
                Button::A => step,
                Button::B => -step,
                Button::C => return self.handle(Event::Button(button)),
            };
            let speed = self.follower.adjust_speed(delta);
            log::info!("Base speed {}", speed);
            return Ok(());
        }
        self.handle(Event::Button(button))
    }

    /// One pass of the main loop. Returns the mode after the tick.
    pub fn tick(&mut self) -> Result<Mode> {
        match self.mode {
            Mode::Following => self.follow_tick()?,
            Mode::Lost => {
                let raw = self.sensors.read_sensors()?;
                if self.follower.observe(&raw).seen {
                    self.handle(Event::LineFound)?;
                }
            }
            _ => {}
        }
        Ok(self.mode)
    }

    fn follow_tick(&mut self) -> Result<()> {
        let raw = self.sensors.read_sensors()?;
        let now = self.clock.now_ms();
        let outcome = self.follower.follow_line_tick(&raw, now);

        if outcome.status == FollowStatus::LineLost {
            log::warn!("Line lost at {}", self.follower.estimate_pose());
            self.handle(Event::LineLost)?;
            if self.follower.config().homing.on_line_lost {
                self.handle(Event::Button(Button::C))?;
            }
            return Ok(());
        }

        self.drive(outcome.command)?;
        self.follower.record_drive(outcome.command, now);
        Ok(())
    }

    fn enter(&mut self, mode: Mode) -> Result<()> {
        match mode {
            Mode::Idle | Mode::TuningGain | Mode::Lost => self.drive(MotorCommand::STOP),
            Mode::Calibrating => {
                self.follower
                    .calibrate(&mut self.sensors, &mut self.motors, &self.clock)?;
                self.last_command = MotorCommand::STOP;
                self.handle(Event::CalibrationComplete)
            }
            Mode::Following => {
                let raw = self.sensors.read_sensors()?;
                self.follower.resume(&raw, self.clock.now_ms());
                Ok(())
            }
            Mode::ReturningHome => {
                self.follower.restart_odometry(self.clock.now_ms());
                let plan = self.follower.plan_return_home();
                log::info!(
                    "Returning home from {}: {}",
                    self.follower.estimate_pose(),
                    plan
                );

                if let Err(e) = self.run_maneuver(&plan) {
                    self.motors.stop()?;
                    return Err(e);
                }
                self.drive(MotorCommand::STOP)?;
                log::info!("Home, estimated pose {}", self.follower.estimate_pose());
                self.handle(Event::ManeuverComplete)
            }
        }
    }

    fn run_maneuver(&mut self, plan: &ReturnManeuver) -> Result<()> {
        let homing = &self.follower.config().homing;
        let (turn_speed, travel_speed) = (homing.turn_speed, homing.travel_speed);

        if plan.turn_duration_ms > 0 {
            let spin = if plan.turn_udeg >= 0 {
                MotorCommand::spin(turn_speed)
            } else {
                MotorCommand::spin(-turn_speed)
            };
            self.drive_for(spin, plan.turn_duration_ms)?;
        }
        if plan.travel_duration_ms > 0 {
            self.drive_for(MotorCommand::straight(travel_speed), plan.travel_duration_ms)?;
        }
        Ok(())
    }

    fn drive_for(&mut self, command: MotorCommand, ms: u64) -> Result<()> {
        self.drive(command)?;
        self.clock.sleep_ms(ms);
        self.follower.record_drive(command, self.clock.now_ms());
        Ok(())
    }

    fn drive(&mut self, command: MotorCommand) -> Result<()> {
        self.motors.drive(command)?;
        self.last_command = command;
        Ok(())
    }
}
