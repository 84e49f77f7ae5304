// High-level wheel actuator for the rover base
//
// Combines the duty policy and a hardware backend to provide a simple API
// for driving or stopping each wheel.

use tracing::{debug, info, warn};

use super::hardware::{HwError, WheelHardware};
use super::kinematics::{WheelState, WheelStates};
use super::ramp::DutyPolicy;
use super::{Direction, DutyLevel, Wheel};

/// Owns the hardware and applies per-wheel drive/stop requests
pub struct WheelActuator<H: WheelHardware> {
    hw: H,
    policy: DutyPolicy,
}

impl<H: WheelHardware> WheelActuator<H> {
    pub fn new(hw: H, policy: DutyPolicy) -> Self {
        Self { hw, policy }
    }

    /// Configure direction pins and duty channels of every wheel, then stop
    /// them all.
    ///
    /// This must be called before driving. Any failure is a configuration
    /// error and the rover must not run.
    pub fn initialize(&mut self) -> Result<(), HwError> {
        info!("Configuring direction pins and duty channels");
        for wheel in Wheel::ALL {
            self.hw.configure_direction_pins(wheel)?;
            self.hw.configure_duty_channel(wheel)?;
            debug!("Wheel {} configured", wheel);
        }
        self.stop_all()?;
        info!("Wheels initialized successfully");
        Ok(())
    }

    /// Duty the policy would apply to `wheel` right now
    pub fn compute_duty(&mut self, wheel: Wheel, turbo_active: bool) -> Result<DutyLevel, HwError> {
        let current = self.hw.get_duty(wheel)?;
        Ok(self.policy.compute_duty(current, turbo_active))
    }

    /// Set the direction pins, then set and commit the policy duty
    pub fn drive(
        &mut self,
        wheel: Wheel,
        direction: Direction,
        turbo_active: bool,
    ) -> Result<DutyLevel, HwError> {
        self.hw.set_direction(wheel, direction)?;
        let duty = self.compute_duty(wheel, turbo_active)?;
        self.hw.set_duty(wheel, duty)?;
        self.hw.commit_duty(wheel)?;
        debug!("Drive {} {:?} at duty {}", wheel, direction, duty);
        Ok(duty)
    }

    /// Zero the duty. Direction pins are left as they are.
    pub fn stop(&mut self, wheel: Wheel) -> Result<(), HwError> {
        self.hw.set_duty(wheel, 0)?;
        self.hw.commit_duty(wheel)
    }

    /// Stop every wheel. A failing wheel does not keep the others running:
    /// all four are attempted and the first error is returned.
    pub fn stop_all(&mut self) -> Result<(), HwError> {
        let mut first_err = None;
        for wheel in Wheel::ALL {
            if let Err(e) = self.stop(wheel) {
                warn!("Failed to stop {}: {}", wheel, e);
                first_err.get_or_insert(e);
            }
        }
        match first_err {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    /// Apply a full motion pattern
    pub fn apply(&mut self, states: &WheelStates, turbo_active: bool) -> Result<(), HwError> {
        for (wheel, state) in states.iter() {
            match state {
                WheelState::Stop => self.stop(wheel)?,
                WheelState::Drive(direction) => {
                    self.drive(wheel, direction, turbo_active)?;
                }
            }
        }
        Ok(())
    }

    pub fn policy(&self) -> &DutyPolicy {
        &self.policy
    }

    pub fn hardware(&self) -> &H {
        &self.hw
    }
}

impl<H: WheelHardware> Drop for WheelActuator<H> {
    fn drop(&mut self) {
        // Never leave a wheel spinning when the owner goes away
        if let Err(e) = self.stop_all() {
            warn!("Failed to stop wheels on drop: {}", e);
        }
    }
}
