// MIT License
//
// Copyright (c) 2025 Ronan LE MEILLAT for SCTG Development
//
// Permission is hereby granted, free of charge, to any person obtaining a copy
// of this software and associated documentation files (the "Software"), to deal
// in the Software without restriction, including without limitation the rights
// to use, copy, modify, merge, publish, distribute, sublicense, and/or sell
// copies of the Software, and to permit persons to whom the Software is
// furnished to do so, subject to the following conditions:
//
// The above copyright notice and this permission notice shall be included in all
// copies or substantial portions of the Software.
//
// THE SOFTWARE IS PROVIDED "AS IS", WITHOUT WARRANTY OF ANY KIND, EXPRESS OR
// IMPLIED, INCLUDING BUT NOT LIMITED TO THE WARRANTIES OF MERCHANTABILITY,
// FITNESS FOR A PARTICULAR PURPOSE AND NONINFRINGEMENT. IN NO EVENT SHALL THE
// AUTHORS OR COPYRIGHT HOLDERS BE LIABLE FOR ANY CLAIM, DAMAGES OR OTHER
// LIABILITY, WHETHER IN AN ACTION OF CONTRACT, TORT OR OTHERWISE, ARISING FROM,
// OUT OF OR IN CONNECTION WITH THE SOFTWARE OR THE USE OR OTHER DEALINGS IN THE
// SOFTWARE.

//! Hysteresis (bang-bang) actuator control
//!
//! The same control law drives the lid heater and the Peltier element. The only
//! differences are the dead-band width and whether the actuator can pump heat
//! out (bidirectional) or only in (unidirectional).

use crate::error::HardwareError;
use log::debug;

/// Current direction through an H-bridge
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Polarity {
    Off,
    /// Heating
    Forward,
    /// Cooling
    Reverse,
}

/// What an actuator can do with heat
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Capability {
    /// Heats only (resistive heater)
    Unidirectional,
    /// Heats and cools, with an auxiliary fan (Peltier)
    Bidirectional,
}

/// Output commanded to an actuator for one tick
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ActuatorPolarityState {
    pub mode: Polarity,
    /// 0.0 or 1.0
    pub duty: f64,
    /// Fan duty, 0.0 or 1.0; always 0.0 for unidirectional actuators
    pub auxiliary_duty: f64,
}

impl ActuatorPolarityState {
    pub const OFF: ActuatorPolarityState = ActuatorPolarityState {
        mode: Polarity::Off,
        duty: 0.0,
        auxiliary_duty: 0.0,
    };
}

/// Decision taken by the control law
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    /// Inside the dead-band: power removed, direction lines left as they were
    Idle,
    /// Full power, heating
    Heat,
    /// Full power, cooling
    Cool,
    /// Power removed and direction lines released
    Release,
}

impl Action {
    /// Output state for this action on an actuator of the given capability
    pub fn state(self, capability: Capability) -> ActuatorPolarityState {
        match self {
            Action::Idle | Action::Release => ActuatorPolarityState::OFF,
            Action::Heat => ActuatorPolarityState {
                mode: Polarity::Forward,
                duty: 1.0,
                auxiliary_duty: match capability {
                    Capability::Bidirectional => 1.0,
                    Capability::Unidirectional => 0.0,
                },
            },
            Action::Cool => ActuatorPolarityState {
                mode: Polarity::Reverse,
                duty: 1.0,
                auxiliary_duty: 0.0,
            },
        }
    }
}

/// Bang-bang law with a dead-band of half-width `dead_band` around the setpoint.
///
/// A non-finite measurement releases the actuator.
pub fn decide(capability: Capability, dead_band: f64, setpoint: f64, measured: f64) -> Action {
    if !measured.is_finite() {
        return Action::Release;
    }
    let error = setpoint - measured;
    if error.abs() < dead_band {
        Action::Idle
    } else if error > 0.0 {
        Action::Heat
    } else {
        match capability {
            Capability::Unidirectional => Action::Release,
            Capability::Bidirectional => Action::Cool,
        }
    }
}

/// Low-level lines of an H-bridge driven actuator
#[cfg_attr(test, mockall::automock)]
pub trait ActuatorDriver {
    /// Set the direction inputs
    fn set_polarity(&mut self, polarity: Polarity) -> Result<(), HardwareError>;

    /// Set the bridge enable, 0.0 or 1.0
    fn set_duty(&mut self, duty: f64) -> Result<(), HardwareError>;

    /// Set the auxiliary output (fan), 0.0 or 1.0. Drivers without one ignore it.
    fn set_auxiliary_duty(&mut self, _duty: f64) -> Result<(), HardwareError> {
        Ok(())
    }
}

impl<T: ActuatorDriver + ?Sized> ActuatorDriver for Box<T> {
    fn set_polarity(&mut self, polarity: Polarity) -> Result<(), HardwareError> {
        (**self).set_polarity(polarity)
    }

    fn set_duty(&mut self, duty: f64) -> Result<(), HardwareError> {
        (**self).set_duty(duty)
    }

    fn set_auxiliary_duty(&mut self, duty: f64) -> Result<(), HardwareError> {
        (**self).set_auxiliary_duty(duty)
    }
}

/// Hysteresis controller bound to an actuator driver
pub struct HysteresisActuator<D> {
    name: &'static str,
    driver: D,
    capability: Capability,
    dead_band: f64,
    state: ActuatorPolarityState,
}

impl<D: ActuatorDriver> HysteresisActuator<D> {
    /// Wrap `driver`. The actuator is commanded off so the initial state matches
    /// the hardware.
    pub fn new(
        name: &'static str,
        driver: D,
        capability: Capability,
        dead_band: f64,
    ) -> Result<Self, HardwareError> {
        let mut actuator = Self {
            name,
            driver,
            capability,
            dead_band,
            state: ActuatorPolarityState::OFF,
        };
        actuator.off()?;
        Ok(actuator)
    }

    /// Run the control law once and apply the result
    pub fn update(&mut self, setpoint: f64, measured: f64) -> Result<ActuatorPolarityState, HardwareError> {
        let action = decide(self.capability, self.dead_band, setpoint, measured);
        debug!(
            "{}: setpoint {:.2}°C measured {:.2}°C -> {:?}",
            self.name, setpoint, measured, action
        );
        self.apply(action)?;
        Ok(self.state)
    }

    /// Remove power and release the direction lines
    pub fn off(&mut self) -> Result<(), HardwareError> {
        self.apply(Action::Release)
    }

    /// Last commanded state
    pub fn state(&self) -> ActuatorPolarityState {
        self.state
    }

    pub fn capability(&self) -> Capability {
        self.capability
    }

    fn apply(&mut self, action: Action) -> Result<(), HardwareError> {
        let state = action.state(self.capability);
        match action {
            Action::Idle => {
                self.driver.set_duty(0.0)?;
            }
            Action::Heat | Action::Cool => {
                // Direction before power
                self.driver.set_polarity(state.mode)?;
                self.driver.set_duty(state.duty)?;
            }
            Action::Release => {
                self.driver.set_duty(0.0)?;
                self.driver.set_polarity(Polarity::Off)?;
            }
        }
        if self.capability == Capability::Bidirectional {
            self.driver.set_auxiliary_duty(state.auxiliary_duty)?;
        }
        self.state = state;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockall::predicate::eq;
    use mockall::Sequence;

    #[test]
    fn test_dead_band_symmetry() {
        for capability in [Capability::Unidirectional, Capability::Bidirectional] {
            for offset in [-0.49, -0.25, 0.0, 0.25, 0.49] {
                let action = decide(capability, 0.5, 37.0, 37.0 + offset);
                assert_eq!(action, Action::Idle, "{:?} offset {}", capability, offset);
                assert_eq!(action.state(capability), ActuatorPolarityState::OFF);
            }
        }
    }

    #[test]
    fn test_heating_below_setpoint() {
        let heater = decide(Capability::Unidirectional, 0.5, 37.0, 30.0);
        assert_eq!(heater, Action::Heat);
        assert_eq!(
            heater.state(Capability::Unidirectional),
            ActuatorPolarityState {
                mode: Polarity::Forward,
                duty: 1.0,
                auxiliary_duty: 0.0
            }
        );

        let peltier = decide(Capability::Bidirectional, 0.5, 15.0, 4.0);
        assert_eq!(
            peltier.state(Capability::Bidirectional),
            ActuatorPolarityState {
                mode: Polarity::Forward,
                duty: 1.0,
                auxiliary_duty: 1.0
            }
        );
    }

    #[test]
    fn test_heater_never_cools() {
        for measured in [37.5, 38.0, 50.0, 200.0] {
            let action = decide(Capability::Unidirectional, 0.5, 37.0, measured);
            assert_eq!(action, Action::Release, "measured {}", measured);
            assert_eq!(action.state(Capability::Unidirectional).duty, 0.0);
        }
    }

    #[test]
    fn test_peltier_cools_above_setpoint() {
        let action = decide(Capability::Bidirectional, 0.5, 4.0, 20.0);
        assert_eq!(
            action.state(Capability::Bidirectional),
            ActuatorPolarityState {
                mode: Polarity::Reverse,
                duty: 1.0,
                auxiliary_duty: 0.0
            }
        );
    }

    #[test]
    fn test_band_edge_switches() {
        // |error| == dead_band is outside the band
        assert_eq!(decide(Capability::Bidirectional, 0.5, 10.0, 9.5), Action::Heat);
        assert_eq!(decide(Capability::Bidirectional, 0.5, 10.0, 10.5), Action::Cool);
    }

    #[test]
    fn test_missing_measurement_releases() {
        assert_eq!(decide(Capability::Unidirectional, 0.5, 37.0, f64::NAN), Action::Release);
        assert_eq!(decide(Capability::Bidirectional, 0.5, 4.0, f64::NAN), Action::Release);
    }

    #[test]
    fn test_new_commands_off() {
        let mut driver = MockActuatorDriver::new();
        driver.expect_set_duty().with(eq(0.0)).times(1).returning(|_| Ok(()));
        driver
            .expect_set_polarity()
            .with(eq(Polarity::Off))
            .times(1)
            .returning(|_| Ok(()));
        driver.expect_set_auxiliary_duty().never();

        let heater = HysteresisActuator::new("heater", driver, Capability::Unidirectional, 0.5).unwrap();
        assert_eq!(heater.state(), ActuatorPolarityState::OFF);
    }

    #[test]
    fn test_direction_set_before_power() {
        let mut driver = MockActuatorDriver::new();
        let mut seq = Sequence::new();
        driver
            .expect_set_polarity()
            .with(eq(Polarity::Reverse))
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Ok(()));
        driver
            .expect_set_duty()
            .with(eq(1.0))
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Ok(()));
        driver
            .expect_set_auxiliary_duty()
            .with(eq(0.0))
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Ok(()));

        let mut peltier = HysteresisActuator {
            name: "peltier",
            driver,
            capability: Capability::Bidirectional,
            dead_band: 0.5,
            state: ActuatorPolarityState::OFF,
        };
        let state = peltier.update(4.0, 25.0).unwrap();
        assert_eq!(state.mode, Polarity::Reverse);
    }

    #[test]
    fn test_dead_band_keeps_direction_latched() {
        let mut driver = MockActuatorDriver::new();
        driver.expect_set_polarity().never();
        driver.expect_set_duty().with(eq(0.0)).times(1).returning(|_| Ok(()));
        driver
            .expect_set_auxiliary_duty()
            .with(eq(0.0))
            .times(1)
            .returning(|_| Ok(()));

        let mut peltier = HysteresisActuator {
            name: "peltier",
            driver,
            capability: Capability::Bidirectional,
            dead_band: 0.5,
            state: ActuatorPolarityState::OFF,
        };
        assert_eq!(peltier.update(4.0, 4.2).unwrap(), ActuatorPolarityState::OFF);
    }

    #[test]
    fn test_driver_failure_propagates() {
        let mut driver = MockActuatorDriver::new();
        driver.expect_set_polarity().returning(|_| Ok(()));
        driver
            .expect_set_duty()
            .returning(|_| Err(HardwareError::new("heater H-bridge", "GPIO busy")));

        let mut heater = HysteresisActuator {
            name: "heater",
            driver,
            capability: Capability::Unidirectional,
            dead_band: 0.5,
            state: ActuatorPolarityState::OFF,
        };
        assert!(heater.update(37.0, 20.0).is_err());
    }
}
