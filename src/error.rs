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

//! Error types for the thermocycler
//!
//! Degraded secondary readings are not errors at this level: they are reported
//! through [`ConversionError`] and turned into an absent value by the sensor
//! conditioner. Everything wrapped by [`ControlError`] ends the run.

use std::path::PathBuf;
use thiserror::Error;

/// A `TEMP:DURATION` entry that could not be turned into a cycle
#[derive(Debug, Clone, PartialEq, Error)]
#[error("invalid cycle '{entry}': {reason}. Use the format TEMP:DURATION, for example 4:30")]
pub struct CycleParseError {
    /// The offending entry, verbatim
    pub entry: String,
    /// What was wrong with it
    pub reason: String,
}

/// Rig configuration rejected at load or validation time
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read configuration file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse configuration file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yml::Error,
    },

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Failure reported by a sensor bus or an actuator line
#[derive(Debug, Clone, PartialEq, Error)]
#[error("{device}: {message}")]
pub struct HardwareError {
    /// Human readable device name (e.g. "MAX31856", "heater H-bridge")
    pub device: String,
    pub message: String,
}

impl HardwareError {
    pub fn new(device: impl Into<String>, message: impl ToString) -> Self {
        Self {
            device: device.into(),
            message: message.to_string(),
        }
    }
}

/// Why a divider voltage could not be converted to a temperature
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConversionError {
    #[error("divider voltage {0} V is not positive")]
    NonPositiveVoltage(f64),

    #[error("thermistor resistance ratio {0} is not positive")]
    NonPositiveRatio(f64),

    #[error("conversion produced a non-finite temperature")]
    NonFinite,

    #[error("ADC read failed: {0}")]
    Bus(#[from] HardwareError),
}

/// A sample that would break the time ordering of the run log
#[derive(Debug, Clone, PartialEq, Error)]
#[error("sample at {elapsed:.3}s is older than the last recorded sample at {last:.3}s")]
pub struct RecordError {
    pub elapsed: f64,
    pub last: f64,
}

/// Failure to write or read the run table or its plot
#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed table {path} at line {line}: {message}")]
    Malformed {
        path: PathBuf,
        line: usize,
        message: String,
    },

    #[error("no data to plot")]
    EmptyLog,
}

/// Fatal errors that end a run
#[derive(Debug, Error)]
pub enum ControlError {
    #[error("hardware failure: {0}")]
    Hardware(#[from] HardwareError),

    #[error("run log rejected a sample: {0}")]
    Record(#[from] RecordError),

    #[error("failed to persist run data: {0}")]
    Persistence(#[from] PersistenceError),
}
