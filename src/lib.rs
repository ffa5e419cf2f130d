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

//! # Thermocycler
//!
//! Two-channel hysteresis temperature controller for a Raspberry Pi rig:
//!
//! - a Peltier module, driven in both directions, follows a program of
//!   `(temperature, duration)` cycles measured by a MAX31856 thermocouple
//! - a resistive heater holds a fixed setpoint measured by an NTC thermistor
//!   read through an ADS1115
//!
//! Every control tick samples both channels, updates both actuators and
//! appends a [`SensorSample`] to the run log. At the end of a run the log is
//! written as a table (and an SVG plot) by a [`PersistenceSink`].
//!
//! ```no_run
//! use thermocycler::{
//!     parse_cycles, simulated_rig, Controller, EventFormat, FileSink, RigConfig, VirtualClock,
//! };
//!
//! let config = RigConfig::default();
//! let cycles = parse_cycles(&["4:30", "15:30"]).unwrap();
//! let (_plant, hardware) = simulated_rig(&config, 22.0);
//! let mut controller = Controller::new(
//!     &config,
//!     hardware,
//!     37.0,
//!     cycles,
//!     Box::new(VirtualClock::new()),
//!     Box::new(FileSink::new("data")),
//! )
//! .unwrap();
//!
//! for event in controller.run() {
//!     print!("{}", event.unwrap().render(EventFormat::Plain));
//! }
//! ```

pub mod actuator;
pub mod cli;
pub mod clock;
pub mod config;
pub mod controller;
pub mod cycle;
pub mod error;
pub mod persistence;
pub mod plot;
pub mod recorder;
#[cfg(feature = "rpi")]
pub mod rpi;
pub mod scheduler;
pub mod sensor;
pub mod simulation;

pub use actuator::{
    decide, Action, ActuatorDriver, ActuatorPolarityState, Capability, HysteresisActuator, Polarity,
};
pub use clock::{Clock, SystemClock, VirtualClock};
pub use config::{ActuatorConfig, NtcConfig, RigConfig, ThermocoupleConfig};
pub use controller::{Controller, RigHardware, RunStream};
pub use cycle::{parse_cycles, TemperatureCycle};
pub use error::{
    ConfigError, ControlError, ConversionError, CycleParseError, HardwareError, PersistenceError,
    RecordError,
};
pub use persistence::{load_table, write_table, FileSink, PersistenceSink, TABLE_HEADER};
pub use recorder::{EventFormat, Recorder, RunEvent, RunLog, SensorSample};
pub use scheduler::{CycleScheduler, Step};
pub use sensor::{
    BetaThermistor, ExponentialFilter, SensorConditioner, ThermocoupleReader, VoltageReader,
    KELVIN_OFFSET,
};
pub use simulation::{simulated_hardware, simulated_rig, SharedPlant, ThermalMass, ThermalPlant};
