// Hardware capability consumed by the wheel actuator, plus an in-memory
// backend used for simulation runs and tests.

use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use super::{Direction, DirectionPin, DutyLevel, Wheel};

/// Error types for direction pin and duty channel access
#[derive(Debug, thiserror::Error)]
pub enum HwError {
    #[error("IO error on {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to configure {wheel}: {reason}")]
    Config { wheel: Wheel, reason: String },

    #[error("{wheel} used before its pins and channel were configured")]
    NotConfigured { wheel: Wheel },

    #[error("Duty level {level} out of range for {wheel} (max {max})")]
    DutyOutOfRange {
        wheel: Wheel,
        level: DutyLevel,
        max: DutyLevel,
    },

    #[error("Unexpected value {value:?} read back from {}", .path.display())]
    ReadBack { path: PathBuf, value: String },

    #[error("Injected fault on {wheel}")]
    Fault { wheel: Wheel },
}

pub type Result<T> = std::result::Result<T, HwError>;

/// Direction pins and duty channel of each wheel.
///
/// Any error leaves the wheel in an unknown electrical state, so callers
/// treat it as fatal and never retry.
pub trait WheelHardware {
    fn configure_direction_pins(&mut self, wheel: Wheel) -> Result<()>;
    fn configure_duty_channel(&mut self, wheel: Wheel) -> Result<()>;
    fn set_direction(&mut self, wheel: Wheel, direction: Direction) -> Result<()>;
    /// Stage a duty level; it takes effect on `commit_duty`
    fn set_duty(&mut self, wheel: Wheel, level: DutyLevel) -> Result<()>;
    fn commit_duty(&mut self, wheel: Wheel) -> Result<()>;
    /// Duty level currently applied on the channel
    fn get_duty(&mut self, wheel: Wheel) -> Result<DutyLevel>;
}

/// One recorded hardware call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HwCall {
    ConfigureDirectionPins(Wheel),
    ConfigureDutyChannel(Wheel),
    SetDirection(Wheel, Direction),
    SetDuty(Wheel, DutyLevel),
    CommitDuty(Wheel),
}

#[derive(Debug, Default, Clone, Copy)]
struct SimWheel {
    pins_configured: bool,
    channel_configured: bool,
    pins: (bool, bool),
    both_high_seen: bool,
    staged: DutyLevel,
    applied: DutyLevel,
}

#[derive(Debug, Default)]
struct SimBoard {
    wheels: [SimWheel; 4],
    recording: bool,
    calls: Vec<HwCall>,
    faulty: Option<Wheel>,
}

/// In-memory backend. Clones share the same board, so a test can keep a
/// handle while the drive loop owns another.
///
/// Only boards built with [`SimHardware::recording`] keep a call log.
#[derive(Debug, Clone)]
pub struct SimHardware {
    board: Arc<Mutex<SimBoard>>,
    max_duty: DutyLevel,
}

impl SimHardware {
    pub fn new(max_duty: DutyLevel) -> Self {
        Self {
            board: Arc::default(),
            max_duty,
        }
    }

    /// Board that logs every call, for inspecting call order
    pub fn recording(max_duty: DutyLevel) -> Self {
        let hw = Self::new(max_duty);
        hw.board().recording = true;
        hw
    }

    fn board(&self) -> MutexGuard<'_, SimBoard> {
        self.board.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Every call made so far, in order. Empty unless recording.
    pub fn calls(&self) -> Vec<HwCall> {
        self.board().calls.clone()
    }

    pub fn clear_calls(&self) {
        self.board().calls.clear();
    }

    /// Duty level currently applied on a wheel's channel
    pub fn duty(&self, wheel: Wheel) -> DutyLevel {
        self.board().wheels[wheel.index()].applied
    }

    /// Current (in1, in2) pin levels of a wheel
    pub fn pins(&self, wheel: Wheel) -> (bool, bool) {
        self.board().wheels[wheel.index()].pins
    }

    /// Whether both inputs of a wheel were ever high at the same time
    pub fn both_high_seen(&self, wheel: Wheel) -> bool {
        self.board().wheels[wheel.index()].both_high_seen
    }

    /// Make every subsequent call touching `wheel` fail
    pub fn inject_fault(&self, wheel: Wheel) {
        self.board().faulty = Some(wheel);
    }

    fn with_wheel<T>(
        &mut self,
        wheel: Wheel,
        call: Option<HwCall>,
        f: impl FnOnce(&mut SimWheel) -> Result<T>,
    ) -> Result<T> {
        let mut board = self.board();
        if board.faulty == Some(wheel) {
            return Err(HwError::Fault { wheel });
        }
        if let Some(call) = call.filter(|_| board.recording) {
            board.calls.push(call);
        }
        f(&mut board.wheels[wheel.index()])
    }
}

impl Default for SimHardware {
    fn default() -> Self {
        Self::new(crate::config::MAX_DUTY)
    }
}

impl WheelHardware for SimHardware {
    fn configure_direction_pins(&mut self, wheel: Wheel) -> Result<()> {
        self.with_wheel(wheel, Some(HwCall::ConfigureDirectionPins(wheel)), |w| {
            w.pins_configured = true;
            w.pins = (false, false);
            Ok(())
        })
    }

    fn configure_duty_channel(&mut self, wheel: Wheel) -> Result<()> {
        self.with_wheel(wheel, Some(HwCall::ConfigureDutyChannel(wheel)), |w| {
            w.channel_configured = true;
            w.staged = 0;
            w.applied = 0;
            Ok(())
        })
    }

    fn set_direction(&mut self, wheel: Wheel, direction: Direction) -> Result<()> {
        self.with_wheel(wheel, Some(HwCall::SetDirection(wheel, direction)), |w| {
            if !w.pins_configured {
                return Err(HwError::NotConfigured { wheel });
            }
            for (pin, high) in direction.pin_writes() {
                match pin {
                    DirectionPin::In1 => w.pins.0 = high,
                    DirectionPin::In2 => w.pins.1 = high,
                }
                w.both_high_seen |= w.pins == (true, true);
            }
            Ok(())
        })
    }

    fn set_duty(&mut self, wheel: Wheel, level: DutyLevel) -> Result<()> {
        let max = self.max_duty;
        self.with_wheel(wheel, Some(HwCall::SetDuty(wheel, level)), |w| {
            if !w.channel_configured {
                return Err(HwError::NotConfigured { wheel });
            }
            if level > max {
                return Err(HwError::DutyOutOfRange { wheel, level, max });
            }
            w.staged = level;
            Ok(())
        })
    }

    fn commit_duty(&mut self, wheel: Wheel) -> Result<()> {
        self.with_wheel(wheel, Some(HwCall::CommitDuty(wheel)), |w| {
            if !w.channel_configured {
                return Err(HwError::NotConfigured { wheel });
            }
            w.applied = w.staged;
            Ok(())
        })
    }

    fn get_duty(&mut self, wheel: Wheel) -> Result<DutyLevel> {
        self.with_wheel(wheel, None, |w| {
            if !w.channel_configured {
                return Err(HwError::NotConfigured { wheel });
            }
            Ok(w.applied)
        })
    }
}
