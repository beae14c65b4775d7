use std::fmt;

#[derive(Debug, PartialEq, Eq, Clone, Copy, Hash)]
/// The three push buttons on the robot.
pub enum Button {
    A,
    B,
    C,
}

#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum Event {
    Button(Button),
    CalibrationComplete,
    LineLost,
    LineFound,
    ManeuverComplete,
}

#[derive(Debug, PartialEq, Eq, Clone, Copy, Default)]
pub enum Mode {
    #[default]
    Idle,
    Calibrating,
    /// Buttons adjust the cruise speed before (re)starting.
    TuningGain,
    Following,
    /// Line gone for too long; motors stopped, waiting for it or for a go-home.
    Lost,
    ReturningHome,
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Mode::Idle => "idle",
            Mode::Calibrating => "calibrating",
            Mode::TuningGain => "tuning",
            Mode::Following => "following",
            Mode::Lost => "lost",
            Mode::ReturningHome => "returning home",
        };
        f.write_str(name)
    }
}

impl Mode {
    /// Next mode for `event`. Events with no transition leave the mode as is.
    pub fn on_event(self, event: Event) -> Mode {
        match (self, event) {
            (Mode::Idle, Event::Button(Button::A)) => Mode::Calibrating,
            (Mode::Calibrating, Event::CalibrationComplete) => Mode::TuningGain,
            (Mode::TuningGain, Event::Button(Button::C)) => Mode::Following,
            (Mode::Following, Event::Button(Button::A | Button::B)) => Mode::TuningGain,
            (Mode::Following, Event::Button(Button::C)) => Mode::ReturningHome,
            (Mode::Following, Event::LineLost) => Mode::Lost,
            (Mode::Lost, Event::LineFound) => Mode::Following,
            (Mode::Lost, Event::Button(Button::C)) => Mode::ReturningHome,
            (Mode::ReturningHome, Event::ManeuverComplete) => Mode::Idle,
            (mode, _) => mode,
        }
    }

    /// Modes in which the wheels must not be driven by the line controller.
    pub fn motors_parked(self) -> bool {
        matches!(self, Mode::Idle | Mode::TuningGain | Mode::Lost)
    }
}
