use std::path::PathBuf;

use clap::Parser;
use line_rs::calibration::SensorCalibrator;
use line_rs::clock::{Clock, SystemClock};
use line_rs::motor::PwmMotors;
use line_rs::sensors::{LineSensors, ReflectanceArray};
use line_rs::{CalibrationBounds, RobotConfig};

#[derive(Parser, Debug)]
#[command(name = "calibrate", about = "Reflectance sensor calibration sweep")]
struct Args {
    /// TOML config file (built-in defaults when omitted)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Live readings to print after the sweep
    #[arg(short, long, default_value = "20")]
    readings: u32,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    let config = match &args.config {
        Some(path) => RobotConfig::from_file(path)?,
        None => RobotConfig::default(),
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    println!("╔══════════════════════════════════════════════════════╗");
    println!("║     Reflectance Sensor Calibration Tool              ║");
    println!("╚══════════════════════════════════════════════════════╝\n");

    let cal = &config.calibration;
    println!("Instructions:");
    println!("1. Put the robot on the track with the line under the middle sensor");
    println!("2. Keep hands clear, the robot spins in place");
    println!(
        "3. The sweep takes {} samples, {}ms apart, at speed {}",
        cal.sweep_ticks, cal.sample_interval_ms, cal.sweep_speed
    );
    println!("4. Copy the bounds somewhere if you need them, nothing is saved\n");

    let mut sensors = ReflectanceArray::new(&config.hardware)?;
    let mut motors = PwmMotors::new(&config.hardware, config.controller.max_speed)?;
    let clock = SystemClock::new();

    println!("Starting in {}ms...\n", cal.start_delay_ms);
    let bounds = SensorCalibrator::new(cal).sweep(&mut sensors, &mut motors, &clock)?;
    motors.disable()?;

    print_bounds(&bounds);

    let degenerate = bounds.degenerate_sensors();
    if !degenerate.is_empty() {
        println!("\n✗ No contrast on sensor(s) {:?}: they will read 0", degenerate);
        println!("  Check the emitter and that the sweep crossed the line.");
    } else {
        println!("\n✓ All sensors saw the line");
    }

    if args.readings > 0 {
        println!("\nNormalized readings (0 = floor, 100 = line):");
        for _ in 0..args.readings {
            let raw = sensors.read_sensors()?;
            let values = bounds.normalize(&raw);
            let bars: Vec<String> = values.iter().map(|v| format!("{:>3}", v)).collect();
            println!("  [{}]   raw {:?}", bars.join(" "), raw);
            clock.sleep_ms(250);
        }
    }

    Ok(())
}

fn print_bounds(bounds: &CalibrationBounds) {
    println!("{:^8} | {:^8} | {:^8} | {:^8}", "Sensor", "Min", "Max", "Span");
    println!("{:-<8}-+-{:-<8}-+-{:-<8}-+-{:-<8}", "", "", "", "");
    for (i, sensor) in bounds.sensors.iter().enumerate() {
        let span = i32::from(sensor.max) - i32::from(sensor.min);
        println!(
            "{:^8} | {:>8} | {:>8} | {:>8}",
            i, sensor.min, sensor.max, span
        );
    }
}
