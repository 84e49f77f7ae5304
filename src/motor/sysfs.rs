// Linux sysfs backend: H-bridge inputs on /sys/class/gpio, enable lines on
// /sys/class/pwm.
//
// GPIO: export -> gpioN/direction ("low" = output, driven low) -> gpioN/value
// PWM:  pwmchipC/export -> pwmN/period, pwmN/duty_cycle (ns), pwmN/enable
//
// Duty levels are mapped linearly onto the period: level / max * period ns.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::debug;

use super::hardware::{HwError, Result, WheelHardware};
use super::{Direction, DirectionPin, DutyLevel, Wheel};
use crate::config::{RoverConfig, WheelPins};

pub struct SysfsHardware {
    gpio_root: PathBuf,
    pwm_root: PathBuf,
    pins: [WheelPins; 4],
    period_ns: u64,
    max_duty: DutyLevel,
    staged: [DutyLevel; 4],
}

fn write_attr(path: &Path, value: impl AsRef<[u8]>) -> Result<()> {
    fs::write(path, value).map_err(|source| HwError::Io {
        path: path.to_path_buf(),
        source,
    })
}

fn read_attr(path: &Path) -> Result<String> {
    fs::read_to_string(path)
        .map(|s| s.trim().to_string())
        .map_err(|source| HwError::Io {
            path: path.to_path_buf(),
            source,
        })
}

impl SysfsHardware {
    pub fn new(
        gpio_root: impl Into<PathBuf>,
        pwm_root: impl Into<PathBuf>,
        pins: [WheelPins; 4],
        period_ns: u64,
        max_duty: DutyLevel,
    ) -> Self {
        Self {
            gpio_root: gpio_root.into(),
            pwm_root: pwm_root.into(),
            pins,
            period_ns,
            max_duty,
            staged: [0; 4],
        }
    }

    pub fn from_config(config: &RoverConfig) -> Self {
        Self::new(
            &config.gpio_root,
            &config.pwm_root,
            config.wheels.as_array(),
            config.pwm_period_ns(),
            config.max_duty,
        )
    }

    fn gpio_dir(&self, pin: u32) -> PathBuf {
        self.gpio_root.join(format!("gpio{pin}"))
    }

    fn pwm_dir(&self, wheel: Wheel) -> PathBuf {
        let pins = self.pins[wheel.index()];
        self.pwm_root
            .join(format!("pwmchip{}", pins.pwm_chip))
            .join(format!("pwm{}", pins.pwm_channel))
    }

    fn level_to_ns(&self, level: DutyLevel) -> u64 {
        self.period_ns * u64::from(level) / u64::from(self.max_duty)
    }

    /// `None` when `ns` is too large to be a duty cycle at all
    fn ns_to_level(&self, ns: u64) -> Option<DutyLevel> {
        let scaled = ns
            .checked_mul(u64::from(self.max_duty))?
            .checked_add(self.period_ns / 2)?;
        Some((scaled / self.period_ns).min(u64::from(self.max_duty)) as DutyLevel)
    }

    fn export_gpio(&self, wheel: Wheel, pin: u32) -> Result<()> {
        let dir = self.gpio_dir(pin);
        if !dir.exists() {
            write_attr(&self.gpio_root.join("export"), pin.to_string())?;
            if !dir.exists() {
                return Err(HwError::Config {
                    wheel,
                    reason: format!("gpio{pin} did not appear after export"),
                });
            }
        }
        write_attr(&dir.join("direction"), "low")
    }

    fn write_pin(&self, pin: u32, high: bool) -> Result<()> {
        write_attr(
            &self.gpio_dir(pin).join("value"),
            if high { "1" } else { "0" },
        )
    }
}

impl WheelHardware for SysfsHardware {
    fn configure_direction_pins(&mut self, wheel: Wheel) -> Result<()> {
        let pins = self.pins[wheel.index()];
        self.export_gpio(wheel, pins.in1)?;
        self.export_gpio(wheel, pins.in2)?;
        debug!("{}: gpio{} and gpio{} set as outputs", wheel, pins.in1, pins.in2);
        Ok(())
    }

    fn configure_duty_channel(&mut self, wheel: Wheel) -> Result<()> {
        let pins = self.pins[wheel.index()];
        let dir = self.pwm_dir(wheel);
        if !dir.exists() {
            let chip = self.pwm_root.join(format!("pwmchip{}", pins.pwm_chip));
            write_attr(&chip.join("export"), pins.pwm_channel.to_string())?;
            if !dir.exists() {
                return Err(HwError::Config {
                    wheel,
                    reason: format!(
                        "pwmchip{}/pwm{} did not appear after export",
                        pins.pwm_chip, pins.pwm_channel
                    ),
                });
            }
        }
        // duty_cycle must never exceed period, so zero it first
        write_attr(&dir.join("duty_cycle"), "0")?;
        write_attr(&dir.join("period"), self.period_ns.to_string())?;
        write_attr(&dir.join("enable"), "1")?;
        self.staged[wheel.index()] = 0;
        debug!("{}: pwm channel enabled, period {} ns", wheel, self.period_ns);
        Ok(())
    }

    fn set_direction(&mut self, wheel: Wheel, direction: Direction) -> Result<()> {
        let pins = self.pins[wheel.index()];
        for (pin, high) in direction.pin_writes() {
            let gpio = match pin {
                DirectionPin::In1 => pins.in1,
                DirectionPin::In2 => pins.in2,
            };
            self.write_pin(gpio, high)?;
        }
        Ok(())
    }

    fn set_duty(&mut self, wheel: Wheel, level: DutyLevel) -> Result<()> {
        if level > self.max_duty {
            return Err(HwError::DutyOutOfRange {
                wheel,
                level,
                max: self.max_duty,
            });
        }
        self.staged[wheel.index()] = level;
        Ok(())
    }

    fn commit_duty(&mut self, wheel: Wheel) -> Result<()> {
        let ns = self.level_to_ns(self.staged[wheel.index()]);
        write_attr(&self.pwm_dir(wheel).join("duty_cycle"), ns.to_string())
    }

    fn get_duty(&mut self, wheel: Wheel) -> Result<DutyLevel> {
        let path = self.pwm_dir(wheel).join("duty_cycle");
        let value = read_attr(&path)?;
        match value.parse::<u64>().ok().and_then(|ns| self.ns_to_level(ns)) {
            Some(level) => Ok(level),
            None => Err(HwError::ReadBack { path, value }),
        }
    }
}
