// Wheel check: spin each wheel forward then backward to verify the pin map
//
// Usage: cargo run --example wheel_check -- [config.json] [--simulate]
//
// Safety features:
// - Explicit confirmation before any writes
// - Every wheel is stopped between directions
// - Wheels are stopped again when the actuator is dropped

use rover_runtime::config::RoverConfig;
use rover_runtime::motor::{
    Direction, SimHardware, SysfsHardware, Wheel, WheelActuator, WheelHardware,
};
use std::io::{self, Write};
use std::path::Path;
use std::thread::sleep;
use std::time::Duration;

const SPIN_TIME: Duration = Duration::from_millis(500);

fn confirm(prompt: &str) -> io::Result<bool> {
    print!("{} [y/N]: ", prompt);
    io::stdout().flush()?;
    let mut input = String::new();
    io::stdin().read_line(&mut input)?;
    Ok(input.trim().eq_ignore_ascii_case("y"))
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("debug")),
        )
        .init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let simulate = args.iter().any(|a| a == "--simulate");
    let config = match args.iter().find(|a| !a.starts_with("--")) {
        Some(path) => RoverConfig::load(Path::new(path))?,
        None => RoverConfig::default(),
    };

    println!("Rover wheel check (WITH WRITES)");
    println!("  This tool WILL drive every wheel in turn.");
    println!("  Make sure the wheels are OFF THE GROUND before proceeding!");
    println!();
    for wheel in Wheel::ALL {
        let pins = config.wheels.as_array()[wheel.index()];
        println!(
            "  {:<12} in1=gpio{:<3} in2=gpio{:<3} pwmchip{}/pwm{}",
            wheel, pins.in1, pins.in2, pins.pwm_chip, pins.pwm_channel
        );
    }
    println!();

    if !simulate && !confirm("Are the rover's wheels OFF THE GROUND?")? {
        println!("Please elevate the rover so the wheels can spin freely.");
        return Ok(());
    }

    if simulate {
        check_wheels(SimHardware::new(config.max_duty), &config)
    } else {
        check_wheels(SysfsHardware::from_config(&config), &config)
    }
}

fn check_wheels<H: WheelHardware>(
    hw: H,
    config: &RoverConfig,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut actuator = WheelActuator::new(hw, config.duty_policy());
    println!("Configuring direction pins and duty channels...");
    actuator.initialize()?;
    println!("  ✓ All wheels configured and stopped");
    println!();

    for wheel in Wheel::ALL {
        for direction in [Direction::Forward, Direction::Backward] {
            let duty = actuator.drive(wheel, direction, false)?;
            println!("  {} {:?} at duty {}", wheel, direction, duty);
            sleep(SPIN_TIME);
            actuator.stop(wheel)?;
            sleep(config.settle());
        }
    }

    actuator.stop_all()?;
    println!();
    println!("Check complete. Each wheel should have spun forward, then backward.");
    Ok(())
}
