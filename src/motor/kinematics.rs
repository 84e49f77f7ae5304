// Motion patterns for the four-wheel base
// Maps each motion command to a stop/forward/backward state per wheel.

use super::{Direction, Wheel};
use crate::messages::Motion;

/// What a single wheel does for a motion
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WheelState {
    Stop,
    Drive(Direction),
}

use WheelState::{Drive, Stop};

const FWD: WheelState = Drive(Direction::Forward);
const BACK: WheelState = Drive(Direction::Backward);

/// Per-wheel states for the four wheels
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WheelStates {
    pub front_left: WheelState,
    pub front_right: WheelState,
    pub back_left: WheelState,
    pub back_right: WheelState,
}

impl WheelStates {
    pub const fn new(
        front_left: WheelState,
        front_right: WheelState,
        back_left: WheelState,
        back_right: WheelState,
    ) -> Self {
        Self {
            front_left,
            front_right,
            back_left,
            back_right,
        }
    }

    pub const fn all(state: WheelState) -> Self {
        Self::new(state, state, state, state)
    }

    pub fn get(&self, wheel: Wheel) -> WheelState {
        match wheel {
            Wheel::FrontLeft => self.front_left,
            Wheel::FrontRight => self.front_right,
            Wheel::BackLeft => self.back_left,
            Wheel::BackRight => self.back_right,
        }
    }

    /// States paired with their wheel, in `Wheel::ALL` order
    pub fn iter(&self) -> impl Iterator<Item = (Wheel, WheelState)> + '_ {
        Wheel::ALL.into_iter().map(|wheel| (wheel, self.get(wheel)))
    }
}

/// Motion pattern table
///
/// | Motion   | FL   | FR   | BL   | BR   |
/// |----------|------|------|------|------|
/// | Idle     | stop | stop | stop | stop |
/// | Forward  | fwd  | fwd  | fwd  | fwd  |
/// | Backward | back | back | back | back |
/// | Left     | back | stop | stop | fwd  |
/// | Right    | stop | back | fwd  | stop |
pub const fn wheel_states(motion: Motion) -> WheelStates {
    match motion {
        Motion::Idle => WheelStates::all(Stop),
        Motion::Forward => WheelStates::all(FWD),
        Motion::Backward => WheelStates::all(BACK),
        Motion::Left => WheelStates::new(BACK, Stop, Stop, FWD),
        Motion::Right => WheelStates::new(Stop, BACK, FWD, Stop),
    }
}
