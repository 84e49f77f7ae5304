// Motor control module for the four-wheel rover base
//
// Provides:
// - Motion patterns (motion command -> per-wheel stop/forward/backward)
// - Duty policy (base duty, turbo scaling, start-up nudge)
// - Hardware backends (Linux sysfs GPIO/PWM, in-memory simulation)
// - Wheel actuator API used by the drive loop

use std::fmt;

mod driver;
pub mod hardware;
pub mod kinematics;
pub mod ramp;
pub mod sysfs;

pub use driver::WheelActuator;
pub use hardware::{HwCall, HwError, SimHardware, WheelHardware};
pub use kinematics::{wheel_states, WheelState, WheelStates};
pub use ramp::DutyPolicy;
pub use sysfs::SysfsHardware;

/// Duty cycle level in `[0, max_duty]`
pub type DutyLevel = u16;

/// Fixed wheel positions. Each owns one direction pin pair and one duty channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Wheel {
    FrontLeft,
    FrontRight,
    BackLeft,
    BackRight,
}

impl Wheel {
    pub const ALL: [Wheel; 4] = [
        Wheel::FrontLeft,
        Wheel::FrontRight,
        Wheel::BackLeft,
        Wheel::BackRight,
    ];

    pub const fn index(self) -> usize {
        match self {
            Wheel::FrontLeft => 0,
            Wheel::FrontRight => 1,
            Wheel::BackLeft => 2,
            Wheel::BackRight => 3,
        }
    }

    pub const fn name(self) -> &'static str {
        match self {
            Wheel::FrontLeft => "front-left",
            Wheel::FrontRight => "front-right",
            Wheel::BackLeft => "back-left",
            Wheel::BackRight => "back-right",
        }
    }
}

impl fmt::Display for Wheel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Spin direction of a driven wheel
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Forward,
    Backward,
}

/// One of the two H-bridge inputs of a wheel
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DirectionPin {
    In1,
    In2,
}

impl Direction {
    /// H-bridge input levels (in1, in2)
    pub const fn pin_levels(self) -> (bool, bool) {
        match self {
            Direction::Forward => (true, false),
            Direction::Backward => (false, true),
        }
    }

    /// Pin writes that switch the bridge into this direction, in order.
    /// The deasserted input comes first so both inputs are never high together.
    pub const fn pin_writes(self) -> [(DirectionPin, bool); 2] {
        match self {
            Direction::Forward => [(DirectionPin::In2, false), (DirectionPin::In1, true)],
            Direction::Backward => [(DirectionPin::In1, false), (DirectionPin::In2, true)],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write(pins: &mut (bool, bool), pin: DirectionPin, high: bool) {
        match pin {
            DirectionPin::In1 => pins.0 = high,
            DirectionPin::In2 => pins.1 = high,
        }
    }

    #[test]
    fn test_pin_writes_end_on_pin_levels() {
        for direction in [Direction::Forward, Direction::Backward] {
            let mut pins = (false, false);
            for (pin, high) in direction.pin_writes() {
                write(&mut pins, pin, high);
            }
            assert_eq!(pins, direction.pin_levels());
        }
    }

    #[test]
    fn test_switching_never_drives_both_inputs() {
        let starts = [(false, false), (true, false), (false, true)];
        for start in starts {
            for direction in [Direction::Forward, Direction::Backward] {
                let mut pins = start;
                for (pin, high) in direction.pin_writes() {
                    write(&mut pins, pin, high);
                    assert_ne!(pins, (true, true), "{:?} from {:?}", direction, start);
                }
            }
        }
    }
}
