use std::io::Write;
use std::path::PathBuf;
use std::thread;
use std::time::Duration;

use clap::Parser;
use line_rs::clock::SystemClock;
use line_rs::gpio_input::ButtonPanel;
use line_rs::motor::PwmMotors;
use line_rs::sensors::ReflectanceArray;
use line_rs::{Mode, Robot, RobotConfig};

const LOOP_DELAY_PARKED_MS: u64 = 20;

// Usage:
//  A: calibrate (spins in place, keep the robot over the line)
//  Tuning: A faster, B slower, C go
//  Following: A or B back to tuning, C return to the start point
#[derive(Parser, Debug)]
#[command(name = "line-rs", about = "Line-following robot with return-home")]
struct Args {
    /// TOML config file (built-in defaults when omitted)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Cruise speed override, 0-255
    #[arg(short, long)]
    speed: Option<i32>,

    /// Print the effective config as TOML and exit
    #[arg(long)]
    print_config: bool,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let config = match &args.config {
        Some(path) => RobotConfig::from_file(path)?,
        None => RobotConfig::default(),
    };

    let env = env_logger::Env::default().default_filter_or(&config.logging.level);
    env_logger::Builder::from_env(env)
        .format(|buf, record| writeln!(buf, "[{}] {}", record.level(), record.args()))
        .init();

    if args.print_config {
        print!("{}", config.to_toml()?);
        return Ok(());
    }

    log::info!("Starting line follower...");
    let hw = &config.hardware;
    log::info!("  Sensors:  GPIO {:?} (emitter {})", hw.sensor_pins, hw.emitter_pin);
    log::info!("  Buttons:  A {}  B {}  C {}", hw.button_a, hw.button_b, hw.button_c);
    log::info!(
        "  Motors:   left PWM {} dir {}, right PWM {} dir {}",
        hw.left_pwm,
        hw.left_dir,
        hw.right_pwm,
        hw.right_dir
    );

    let sensors = ReflectanceArray::new(hw)?;
    let motors = PwmMotors::new(hw, config.controller.max_speed)?;
    let mut buttons = ButtonPanel::new(hw)?;

    let mut robot = Robot::new(config, sensors, motors, SystemClock::new())?;
    if let Some(speed) = args.speed {
        log::info!("Base speed {}", robot.follower_mut().set_speed(speed));
    }

    log::info!("Press A to calibrate");
    let mut mode = robot.mode();
    loop {
        for button in buttons.poll() {
            robot.handle_button(button)?;
        }

        let next = robot.tick()?;
        if next != mode {
            match next {
                Mode::TuningGain => log::info!(
                    "Speed {}: A faster, B slower, C go",
                    robot.follower().base_speed()
                ),
                Mode::Lost => {
                    log::info!("Put the robot back on the line, or press C to go home")
                }
                Mode::Idle => log::info!("Press A to calibrate"),
                _ => {}
            }
            mode = next;
        }

        // Following runs flat out, parked modes only poll buttons
        if mode.motors_parked() {
            thread::sleep(Duration::from_millis(LOOP_DELAY_PARKED_MS));
        }
    }
}
