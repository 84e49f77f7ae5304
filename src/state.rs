// Shared command state between the transports and the drive loop
//
// The whole state (motion, turbo flag, changed marker) lives in one atomic
// byte. Every update is a single read-modify-write, so a reader always sees
// all three fields from the same write and writers never block.

use std::sync::atomic::{AtomicU8, Ordering};

use crate::messages::Motion;

const MOTION_MASK: u8 = 0b0000_0111;
const TURBO_BIT: u8 = 0b0000_1000;
const CHANGED_BIT: u8 = 0b0001_0000;

/// Latest commanded motion, turbo flag and "changed" marker.
///
/// Created once at start-up and shared through an `Arc` by every command
/// source and the drive loop.
#[derive(Debug, Default)]
pub struct CommandState {
    bits: AtomicU8,
}

/// Consistent view of the state at one instant
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Snapshot {
    raw_motion: u8,
    pub turbo: bool,
    pub changed: bool,
}

impl Snapshot {
    fn from_bits(bits: u8) -> Self {
        Self {
            raw_motion: bits & MOTION_MASK,
            turbo: bits & TURBO_BIT != 0,
            changed: bits & CHANGED_BIT != 0,
        }
    }

    /// Decoded motion, `None` if the packed code is not a motion
    pub fn motion(&self) -> Option<Motion> {
        Motion::from_code(self.raw_motion)
    }

    pub fn raw_motion(&self) -> u8 {
        self.raw_motion
    }
}

impl CommandState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self) -> Snapshot {
        Snapshot::from_bits(self.bits.load(Ordering::Acquire))
    }

    /// Record a new motion. Returns true if it differs from the current one,
    /// in which case the changed marker is raised. Writing the current motion
    /// again leaves the marker untouched.
    pub fn set_motion(&self, motion: Motion) -> bool {
        let code = motion.code();
        let prev = self.update(|bits| {
            let mut next = (bits & !MOTION_MASK) | code;
            if bits & MOTION_MASK != code {
                next |= CHANGED_BIT;
            }
            next
        });
        prev & MOTION_MASK != code
    }

    pub fn set_turbo(&self, active: bool) {
        if active {
            self.bits.fetch_or(TURBO_BIT, Ordering::AcqRel);
        } else {
            self.bits.fetch_and(!TURBO_BIT, Ordering::AcqRel);
        }
    }

    /// Clear the changed marker and return the state as it was cleared.
    ///
    /// The motion in the returned snapshot is the one the settle phase covered;
    /// anything written afterwards raises the marker again.
    pub fn acknowledge_change(&self) -> Snapshot {
        let prev = self.bits.fetch_and(!CHANGED_BIT, Ordering::AcqRel);
        Snapshot::from_bits(prev & !CHANGED_BIT)
    }

    /// Replace an undecodable motion with Idle, keeping turbo and changed.
    pub fn reset_invalid_motion(&self) {
        let _ = self
            .bits
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |bits| {
                match Motion::from_code(bits & MOTION_MASK) {
                    Some(_) => None,
                    None => Some((bits & !MOTION_MASK) | Motion::Idle.code()),
                }
            });
    }

    fn update(&self, f: impl Fn(u8) -> u8) -> u8 {
        self.bits
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |bits| Some(f(bits)))
            .unwrap_or_else(|bits| bits)
    }

    #[cfg(test)]
    pub(crate) fn force_raw_motion(&self, raw: u8) {
        self.update(|bits| (bits & !MOTION_MASK) | (raw & MOTION_MASK));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_defaults() {
        let state = CommandState::new();
        let snap = state.snapshot();
        assert_eq!(snap.motion(), Some(Motion::Idle));
        assert!(!snap.turbo);
        assert!(!snap.changed);
    }

    #[test]
    fn test_new_motion_raises_changed() {
        let state = CommandState::new();
        assert!(state.set_motion(Motion::Forward));
        let snap = state.snapshot();
        assert_eq!(snap.motion(), Some(Motion::Forward));
        assert!(snap.changed);
    }

    #[test]
    fn test_same_motion_does_not_touch_changed() {
        let state = CommandState::new();
        assert!(!state.set_motion(Motion::Idle));
        assert!(!state.snapshot().changed);

        state.set_motion(Motion::Left);
        state.acknowledge_change();
        assert!(!state.set_motion(Motion::Left));
        assert!(!state.snapshot().changed);
    }

    #[test]
    fn test_duplicate_keeps_pending_change() {
        let state = CommandState::new();
        state.set_motion(Motion::Right);
        state.set_motion(Motion::Right);
        assert!(state.snapshot().changed);
    }

    #[test]
    fn test_turbo_is_independent_of_motion() {
        let state = CommandState::new();
        state.set_motion(Motion::Backward);
        state.set_turbo(true);
        let snap = state.snapshot();
        assert!(snap.turbo);
        assert!(snap.changed);
        assert_eq!(snap.motion(), Some(Motion::Backward));

        state.set_turbo(false);
        let snap = state.snapshot();
        assert!(!snap.turbo);
        assert_eq!(snap.motion(), Some(Motion::Backward));
    }

    #[test]
    fn test_acknowledge_returns_cleared_snapshot() {
        let state = CommandState::new();
        state.set_turbo(true);
        state.set_motion(Motion::Forward);
        let snap = state.acknowledge_change();
        assert!(!snap.changed);
        assert!(snap.turbo);
        assert_eq!(snap.motion(), Some(Motion::Forward));
        assert!(!state.snapshot().changed);
    }

    #[test]
    fn test_reset_invalid_motion() {
        let state = CommandState::new();
        state.set_turbo(true);
        state.force_raw_motion(7);
        assert_eq!(state.snapshot().motion(), None);

        state.reset_invalid_motion();
        let snap = state.snapshot();
        assert_eq!(snap.motion(), Some(Motion::Idle));
        assert!(snap.turbo);
    }

    #[test]
    fn test_reset_leaves_valid_motion_alone() {
        let state = CommandState::new();
        state.set_motion(Motion::Left);
        state.reset_invalid_motion();
        assert_eq!(state.snapshot().motion(), Some(Motion::Left));
    }

    #[test]
    fn test_concurrent_writers_never_tear() {
        let state = Arc::new(CommandState::new());
        let writers: Vec<_> = (0..4)
            .map(|i| {
                let state = Arc::clone(&state);
                std::thread::spawn(move || {
                    for n in 0..1000 {
                        let motion = if (n + i) % 2 == 0 {
                            Motion::Forward
                        } else {
                            Motion::Backward
                        };
                        state.set_motion(motion);
                        state.set_turbo(n % 3 == 0);
                    }
                })
            })
            .collect();

        for _ in 0..1000 {
            let snap = state.snapshot();
            assert!(snap.motion().is_some());
        }
        for writer in writers {
            writer.join().unwrap();
        }
        assert!(state.snapshot().motion().is_some());
    }
}
