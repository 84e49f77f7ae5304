// Timing, duty levels, topics, pin map and command-line flags
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Duration;

use clap::Parser;
use serde::{Deserialize, Serialize};

use crate::motor::{DutyLevel, DutyPolicy};

// Drive loop timing
pub const LOOP_TICK: Duration = Duration::from_millis(10);
pub const SETTLE_TIME: Duration = Duration::from_millis(1000);

// Duty levels (8-bit PWM resolution)
pub const MAX_DUTY: DutyLevel = 255;
pub const BASE_DUTY: DutyLevel = 220;
pub const DUTY_NUDGE: DutyLevel = 5;
pub const TURBO_MULTIPLIER: u16 = 2;
pub const PWM_FREQUENCY_HZ: u32 = 5000;

// Zenoh topics
pub const TOPIC_CMD: &str = "rover/cmd"; // fire-and-forget command bytes
pub const TOPIC_CMD_ACK: &str = "rover/cmd/ack"; // acknowledged command bytes (get)
pub const TOPIC_STATUS: &str = "rover/state/status"; // status echo
pub const STATUS_PERIOD: Duration = Duration::from_millis(100);

// 128-bit identifier of the rover command service
pub const SERVICE_UUID: &str = "cafebabe-1234-5678-90ab-cdef12345678";

// Serial command link (Bluetooth/RF serial modem)
pub const SERIAL_BAUD: u32 = 9600;

// Linux sysfs roots
pub const GPIO_ROOT: &str = "/sys/class/gpio";
pub const PWM_ROOT: &str = "/sys/class/pwm";

/// H-bridge inputs and enable channel of one wheel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WheelPins {
    pub in1: u32,
    pub in2: u32,
    pub pwm_chip: u32,
    pub pwm_channel: u32,
}

impl WheelPins {
    pub const fn new(in1: u32, in2: u32, pwm_channel: u32) -> Self {
        Self {
            in1,
            in2,
            pwm_chip: 0,
            pwm_channel,
        }
    }
}

/// Static wheel -> pins mapping
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WheelMap {
    pub front_left: WheelPins,
    pub front_right: WheelPins,
    pub back_left: WheelPins,
    pub back_right: WheelPins,
}

impl Default for WheelMap {
    fn default() -> Self {
        Self {
            front_left: WheelPins::new(14, 15, 0),
            front_right: WheelPins::new(5, 27, 1),
            back_left: WheelPins::new(18, 19, 2),
            back_right: WheelPins::new(22, 23, 3),
        }
    }
}

impl WheelMap {
    /// Pins in `Wheel::ALL` order
    pub fn as_array(&self) -> [WheelPins; 4] {
        [
            self.front_left,
            self.front_right,
            self.back_left,
            self.back_right,
        ]
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Cannot read config {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid config JSON: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Invalid config: {0}")]
    Invalid(String),
}

/// Runtime configuration. Every field has a default, so a config file only
/// needs the values it overrides.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RoverConfig {
    pub tick_ms: u64,
    pub settle_ms: u64,
    pub base_duty: DutyLevel,
    pub max_duty: DutyLevel,
    pub duty_nudge: DutyLevel,
    pub turbo_multiplier: u16,
    pub pwm_frequency_hz: u32,
    pub wheels: WheelMap,
    pub gpio_root: PathBuf,
    pub pwm_root: PathBuf,
    pub command_topic: String,
    pub ack_topic: String,
    pub status_topic: String,
}

impl Default for RoverConfig {
    fn default() -> Self {
        Self {
            tick_ms: LOOP_TICK.as_millis() as u64,
            settle_ms: SETTLE_TIME.as_millis() as u64,
            base_duty: BASE_DUTY,
            max_duty: MAX_DUTY,
            duty_nudge: DUTY_NUDGE,
            turbo_multiplier: TURBO_MULTIPLIER,
            pwm_frequency_hz: PWM_FREQUENCY_HZ,
            wheels: WheelMap::default(),
            gpio_root: PathBuf::from(GPIO_ROOT),
            pwm_root: PathBuf::from(PWM_ROOT),
            command_topic: TOPIC_CMD.to_string(),
            ack_topic: TOPIC_CMD_ACK.to_string(),
            status_topic: TOPIC_STATUS.to_string(),
        }
    }
}

impl RoverConfig {
    /// Load and validate a JSON config file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json(&text)
    }

    pub fn from_json(text: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |msg: String| -> Result<(), ConfigError> { Err(ConfigError::Invalid(msg)) };

        if self.tick_ms == 0 {
            return invalid("tick_ms must be greater than 0".into());
        }
        if self.max_duty == 0 {
            return invalid("max_duty must be greater than 0".into());
        }
        if self.base_duty > self.max_duty {
            return invalid(format!(
                "base_duty {} exceeds max_duty {}",
                self.base_duty, self.max_duty
            ));
        }
        if self.turbo_multiplier == 0 {
            return invalid("turbo_multiplier must be at least 1".into());
        }
        if self.pwm_frequency_hz == 0 || u64::from(self.pwm_frequency_hz) > 1_000_000_000 {
            return invalid(format!(
                "pwm_frequency_hz {} out of range",
                self.pwm_frequency_hz
            ));
        }

        let wheels = self.wheels.as_array();
        let mut gpios = HashSet::new();
        let mut channels = HashSet::new();
        for pins in wheels {
            for gpio in [pins.in1, pins.in2] {
                if !gpios.insert(gpio) {
                    return invalid(format!("gpio {gpio} assigned more than once"));
                }
            }
            if !channels.insert((pins.pwm_chip, pins.pwm_channel)) {
                return invalid(format!(
                    "pwmchip{}/pwm{} assigned more than once",
                    pins.pwm_chip, pins.pwm_channel
                ));
            }
        }
        Ok(())
    }

    pub fn tick(&self) -> Duration {
        Duration::from_millis(self.tick_ms)
    }

    pub fn settle(&self) -> Duration {
        Duration::from_millis(self.settle_ms)
    }

    pub fn pwm_period_ns(&self) -> u64 {
        1_000_000_000 / u64::from(self.pwm_frequency_hz)
    }

    pub fn duty_policy(&self) -> DutyPolicy {
        DutyPolicy {
            base: self.base_duty,
            max: self.max_duty,
            nudge: self.duty_nudge,
            turbo_multiplier: self.turbo_multiplier,
        }
    }
}

/// Command-line flags of the runtime binary
#[derive(Debug, Clone, Parser)]
#[command(name = "rover-runtime", version, about = "Four-wheel rover drive runtime")]
pub struct Cli {
    /// JSON config file (defaults are used for anything it leaves out)
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Drive an in-memory simulated board instead of sysfs GPIO/PWM
    #[arg(long)]
    pub simulate: bool,

    /// Also accept command bytes from this serial port
    #[arg(long)]
    pub serial: Option<String>,

    #[arg(long, default_value_t = SERIAL_BAUD)]
    pub baud: u32,
}

impl Cli {
    pub fn load_config(&self) -> Result<RoverConfig, ConfigError> {
        match &self.config {
            Some(path) => RoverConfig::load(path),
            None => Ok(RoverConfig::default()),
        }
    }
}
