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

//! Simulated rig for running the controller without hardware
//!
//! Two lumped thermal masses share the ambient: the Peltier block (read by the
//! thermocouple) and the heated lid (read by the NTC). The plant advances by
//! one tick period every time the thermocouple is sampled, which happens once
//! per control tick.

use crate::actuator::{ActuatorDriver, Polarity};
use crate::config::{NtcConfig, RigConfig};
use crate::controller::RigHardware;
use crate::error::HardwareError;
use crate::sensor::{BetaThermistor, ThermocoupleReader, VoltageReader};
use std::cell::RefCell;
use std::rc::Rc;

/// Thermal model of a single mass losing heat to the ambient
#[derive(Debug, Clone)]
pub struct ThermalMass {
    temperature: f64,      // Current temperature (°C)
    pub ambient_temp: f64,     // Ambient temperature (°C)
    pub thermal_capacity: f64, // Thermal capacity (J/°C)
    pub heat_loss_coeff: f64,  // Heat loss coefficient (W/°C)
}

impl ThermalMass {
    pub fn new(initial_temp: f64, ambient_temp: f64, thermal_capacity: f64, heat_loss_coeff: f64) -> Self {
        ThermalMass {
            temperature: initial_temp,
            ambient_temp,
            thermal_capacity,
            heat_loss_coeff,
        }
    }

    /// Update temperature for `power` watts (negative removes heat) over `dt` seconds
    pub fn update(&mut self, power: f64, loss_coeff: f64, dt: f64) {
        let heat_added = power * dt;
        let heat_lost = loss_coeff * (self.temperature - self.ambient_temp) * dt;
        self.temperature += (heat_added - heat_lost) / self.thermal_capacity;
    }

    pub fn get_temperature(&self) -> f64 {
        self.temperature
    }
}

/// Output lines of one simulated H-bridge
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BridgeState {
    pub polarity: Polarity,
    pub duty: f64,
    pub fan: f64,
}

impl Default for BridgeState {
    fn default() -> Self {
        Self {
            polarity: Polarity::Off,
            duty: 0.0,
            fan: 0.0,
        }
    }
}

/// Physical state of the simulated rig
#[derive(Debug, Clone)]
pub struct ThermalPlant {
    pub block: ThermalMass,
    pub lid: ThermalMass,
    pub peltier: BridgeState,
    pub heater: BridgeState,
    /// Peltier heat pumping at full duty (W)
    pub peltier_power: f64,
    /// Resistive heater power at full duty (W)
    pub heater_power: f64,
    /// Extra block loss coefficient while the fan runs (W/°C)
    pub fan_loss_coeff: f64,
    /// Time step applied on each thermocouple read (s)
    pub dt: f64,
    /// When set, every NTC read fails
    pub ntc_disconnected: bool,
}

impl ThermalPlant {
    /// Rig at ambient temperature, stepped by `dt` seconds per tick
    pub fn new(ambient: f64, dt: f64) -> Self {
        Self {
            block: ThermalMass::new(ambient, ambient, 60.0, 0.4),
            lid: ThermalMass::new(ambient, ambient, 120.0, 0.3),
            peltier: BridgeState::default(),
            heater: BridgeState::default(),
            peltier_power: 20.0,
            heater_power: 15.0,
            fan_loss_coeff: 0.6,
            dt,
            ntc_disconnected: false,
        }
    }

    /// Advance both masses by one time step
    pub fn step(&mut self) {
        let peltier_power = match self.peltier.polarity {
            Polarity::Forward => self.peltier_power * self.peltier.duty,
            Polarity::Reverse => -self.peltier_power * self.peltier.duty,
            Polarity::Off => 0.0,
        };
        let block_loss = self.block.heat_loss_coeff + self.fan_loss_coeff * self.peltier.fan;
        self.block.update(peltier_power, block_loss, self.dt);

        // A released bridge carries no current whatever the enable line says
        let heater_power = match self.heater.polarity {
            Polarity::Off => 0.0,
            _ => self.heater_power * self.heater.duty,
        };
        let lid_loss = self.lid.heat_loss_coeff;
        self.lid.update(heater_power, lid_loss, self.dt);
    }
}

/// Shared handle to the plant, cloned into every simulated driver
pub type SharedPlant = Rc<RefCell<ThermalPlant>>;

/// Thermocouple on the Peltier block; each read advances the plant one step
pub struct SimThermocouple {
    plant: SharedPlant,
}

impl ThermocoupleReader for SimThermocouple {
    fn read_celsius(&mut self) -> Result<f64, HardwareError> {
        let mut plant = self.plant.borrow_mut();
        plant.step();
        Ok(plant.block.get_temperature())
    }
}

/// NTC divider on the lid, seen through an ideal ADC
pub struct SimNtcAdc {
    plant: SharedPlant,
    thermistor: BetaThermistor,
}

impl VoltageReader for SimNtcAdc {
    fn read_volts(&mut self) -> Result<f64, HardwareError> {
        let plant = self.plant.borrow();
        if plant.ntc_disconnected {
            return Err(HardwareError::new("simulated ADS1115", "no acknowledge"));
        }
        Ok(self.thermistor.voltage_at(plant.lid.get_temperature()))
    }
}

#[derive(Debug, Clone, Copy)]
enum Bridge {
    Peltier,
    Heater,
}

/// Simulated H-bridge driving one of the plant actuators
pub struct SimBridge {
    plant: SharedPlant,
    bridge: Bridge,
}

impl SimBridge {
    fn with_state<F: FnOnce(&mut BridgeState)>(&mut self, f: F) {
        let mut plant = self.plant.borrow_mut();
        match self.bridge {
            Bridge::Peltier => f(&mut plant.peltier),
            Bridge::Heater => f(&mut plant.heater),
        }
    }
}

impl ActuatorDriver for SimBridge {
    fn set_polarity(&mut self, polarity: Polarity) -> Result<(), HardwareError> {
        self.with_state(|state| state.polarity = polarity);
        Ok(())
    }

    fn set_duty(&mut self, duty: f64) -> Result<(), HardwareError> {
        self.with_state(|state| state.duty = duty);
        Ok(())
    }

    fn set_auxiliary_duty(&mut self, duty: f64) -> Result<(), HardwareError> {
        self.with_state(|state| state.fan = duty);
        Ok(())
    }
}

/// Build the plant and a full set of simulated drivers for it
pub fn simulated_rig(config: &RigConfig, ambient: f64) -> (SharedPlant, RigHardware) {
    let dt = config.tick_period().as_secs_f64();
    let plant = Rc::new(RefCell::new(ThermalPlant::new(ambient, dt)));
    let hardware = simulated_hardware(&plant, &config.ntc);
    (plant, hardware)
}

/// Simulated drivers attached to an existing plant
pub fn simulated_hardware(plant: &SharedPlant, ntc: &NtcConfig) -> RigHardware {
    RigHardware {
        thermocouple: Box::new(SimThermocouple {
            plant: Rc::clone(plant),
        }),
        ntc_adc: Box::new(SimNtcAdc {
            plant: Rc::clone(plant),
            thermistor: BetaThermistor::new(ntc),
        }),
        peltier: Box::new(SimBridge {
            plant: Rc::clone(plant),
            bridge: Bridge::Peltier,
        }),
        heater: Box::new(SimBridge {
            plant: Rc::clone(plant),
            bridge: Bridge::Heater,
        }),
    }
}
