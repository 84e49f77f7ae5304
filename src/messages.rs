// Define message types exchanged with remote peers

use serde::{Deserialize, Serialize};

use crate::config::SERVICE_UUID;
use crate::state::Snapshot;

/// Command byte written by a remote peer.
///
/// The discriminants are the wire format: peers send the ordinal as a single
/// byte, so the ordering must never change.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Command {
    Idle = 0,
    MoveForward = 1,
    MoveBackward = 2,
    MoveLeft = 3,
    MoveRight = 4,
    ActivateTurbo = 5,
    DeactivateTurbo = 6,
}

impl Command {
    pub fn as_byte(self) -> u8 {
        self as u8
    }

    /// The motion this command requests, or `None` for the turbo toggles
    pub fn motion(self) -> Option<Motion> {
        match self {
            Command::Idle => Some(Motion::Idle),
            Command::MoveForward => Some(Motion::Forward),
            Command::MoveBackward => Some(Motion::Backward),
            Command::MoveLeft => Some(Motion::Left),
            Command::MoveRight => Some(Motion::Right),
            Command::ActivateTurbo | Command::DeactivateTurbo => None,
        }
    }
}

impl TryFrom<u8> for Command {
    type Error = InvalidCommand;

    fn try_from(raw: u8) -> Result<Self, Self::Error> {
        match raw {
            0 => Ok(Command::Idle),
            1 => Ok(Command::MoveForward),
            2 => Ok(Command::MoveBackward),
            3 => Ok(Command::MoveLeft),
            4 => Ok(Command::MoveRight),
            5 => Ok(Command::ActivateTurbo),
            6 => Ok(Command::DeactivateTurbo),
            other => Err(InvalidCommand::UnknownByte(other)),
        }
    }
}

/// Motion states the rover can be in. Turbo toggles are never a motion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Motion {
    #[default]
    Idle,
    Forward,
    Backward,
    Left,
    Right,
}

impl Motion {
    /// Compact code used when packing the motion into the shared state.
    /// Matches the wire ordinal of the corresponding command.
    pub const fn code(self) -> u8 {
        match self {
            Motion::Idle => 0,
            Motion::Forward => 1,
            Motion::Backward => 2,
            Motion::Left => 3,
            Motion::Right => 4,
        }
    }

    pub const fn from_code(code: u8) -> Option<Self> {
        match code {
            0 => Some(Motion::Idle),
            1 => Some(Motion::Forward),
            2 => Some(Motion::Backward),
            3 => Some(Motion::Left),
            4 => Some(Motion::Right),
            _ => None,
        }
    }
}

impl From<Motion> for Command {
    fn from(motion: Motion) -> Self {
        match motion {
            Motion::Idle => Command::Idle,
            Motion::Forward => Command::MoveForward,
            Motion::Backward => Command::MoveBackward,
            Motion::Left => Command::MoveLeft,
            Motion::Right => Command::MoveRight,
        }
    }
}

/// Rejection reasons for a command write
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum InvalidCommand {
    #[error("Unknown command byte 0x{0:02X}")]
    UnknownByte(u8),

    #[error("Command payload must be exactly 1 byte, got {0}")]
    BadLength(usize),
}

/// Status echo published by the runtime
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoverStatus {
    pub service: String,
    pub motion: Motion,
    pub turbo: bool,
    /// A motion change is pending its stop-and-settle phase
    pub settling: bool,
}

impl From<&Snapshot> for RoverStatus {
    fn from(snapshot: &Snapshot) -> Self {
        Self {
            service: SERVICE_UUID.to_string(),
            motion: snapshot.motion().unwrap_or_default(),
            turbo: snapshot.turbo,
            settling: snapshot.changed,
        }
    }
}
