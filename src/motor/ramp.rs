// Duty policy: how hard a driven wheel is pushed
//
// target = base * (turbo ? multiplier : 1), capped at max.
// When the channel currently sits below the target, one extra nudge is added
// on top to break motor stiction. This is a single increment per call, not a
// ramp, and the result never exceeds max.

use super::DutyLevel;
use crate::config::{BASE_DUTY, DUTY_NUDGE, MAX_DUTY, TURBO_MULTIPLIER};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DutyPolicy {
    pub base: DutyLevel,
    pub max: DutyLevel,
    pub nudge: DutyLevel,
    pub turbo_multiplier: u16,
}

impl Default for DutyPolicy {
    fn default() -> Self {
        Self {
            base: BASE_DUTY,
            max: MAX_DUTY,
            nudge: DUTY_NUDGE,
            turbo_multiplier: TURBO_MULTIPLIER,
        }
    }
}

impl DutyPolicy {
    /// Nominal duty before the start-up nudge
    pub fn target(&self, turbo_active: bool) -> DutyLevel {
        let multiplier = if turbo_active {
            u32::from(self.turbo_multiplier)
        } else {
            1
        };
        let raw = u32::from(self.base) * multiplier;
        raw.min(u32::from(self.max)) as DutyLevel
    }

    /// Duty to apply given what the channel currently runs at
    pub fn compute_duty(&self, current: DutyLevel, turbo_active: bool) -> DutyLevel {
        let target = self.target(turbo_active);
        if current < target {
            target.saturating_add(self.nudge).min(self.max)
        } else {
            target
        }
    }
}
