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

//! Rig configuration
//!
//! Pin assignments, calibration constants and loop timing for one rig. Every
//! field has a default matching the reference hardware, so an empty YAML file
//! (or no file at all) yields a usable configuration.

use crate::error::ConfigError;
use serde::{Deserialize, Deserializer, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Complete rig configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RigConfig {
    /// Heater (lid) H-bridge
    #[serde(deserialize_with = "heater_section")]
    pub heater: ActuatorConfig,
    /// Peltier H-bridge with its auxiliary fan
    #[serde(deserialize_with = "peltier_section")]
    pub peltier: ActuatorConfig,
    /// MAX31856 thermocouple amplifier wiring
    pub thermocouple: ThermocoupleConfig,
    /// NTC thermistor behind an ADS1115
    pub ntc: NtcConfig,
    /// Exponential smoothing factor applied to the thermocouple, in (0, 1]
    pub filter_alpha: f64,
    /// Nominal pause between two ticks, in milliseconds
    pub tick_period_ms: u64,
    /// Directory receiving the run tables and plots
    pub output_dir: PathBuf,
}

/// H-bridge pins, polarity table and dead-band for one actuator
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActuatorConfig {
    /// BCM pin driving the bridge enable (duty)
    pub pwm_pin: u8,
    /// BCM pins driving the two direction inputs
    pub ctrl_pins: [u8; 2],
    /// Direction input levels for forward (heating) operation
    pub forward: [bool; 2],
    /// Direction input levels for reverse (cooling) operation
    pub reverse: [bool; 2],
    /// Optional auxiliary output (fan)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fan_pin: Option<u8>,
    /// Error band around the setpoint in which the actuator stays off (°C)
    pub dead_band: f64,
}

/// Actuator section as written in the file; missing keys keep the defaults
/// of the actuator it describes
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ActuatorSection {
    pwm_pin: Option<u8>,
    ctrl_pins: Option<[u8; 2]>,
    forward: Option<[bool; 2]>,
    reverse: Option<[bool; 2]>,
    // `fan_pin: null` removes the fan, a missing key keeps it
    #[serde(deserialize_with = "present")]
    fan_pin: Option<Option<u8>>,
    dead_band: Option<f64>,
}

impl ActuatorSection {
    fn over(self, base: ActuatorConfig) -> ActuatorConfig {
        ActuatorConfig {
            pwm_pin: self.pwm_pin.unwrap_or(base.pwm_pin),
            ctrl_pins: self.ctrl_pins.unwrap_or(base.ctrl_pins),
            forward: self.forward.unwrap_or(base.forward),
            reverse: self.reverse.unwrap_or(base.reverse),
            fan_pin: self.fan_pin.unwrap_or(base.fan_pin),
            dead_band: self.dead_band.unwrap_or(base.dead_band),
        }
    }
}

fn present<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    T::deserialize(deserializer).map(Some)
}

fn heater_section<'de, D: Deserializer<'de>>(deserializer: D) -> Result<ActuatorConfig, D::Error> {
    Ok(ActuatorSection::deserialize(deserializer)?.over(ActuatorConfig::heater()))
}

fn peltier_section<'de, D: Deserializer<'de>>(deserializer: D) -> Result<ActuatorConfig, D::Error> {
    Ok(ActuatorSection::deserialize(deserializer)?.over(ActuatorConfig::peltier()))
}

/// SPI wiring of the thermocouple amplifier
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ThermocoupleConfig {
    /// SPI bus index (0 for /dev/spidev0.x)
    pub spi_bus: u8,
    /// BCM pin used as chip select
    pub cs_pin: u8,
    /// SPI clock speed in Hz
    pub clock_hz: u32,
}

/// NTC thermistor divider and Beta calibration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NtcConfig {
    /// I2C device of the ADS1115
    pub i2c_device: String,
    /// ADS1115 single-ended input (0..=3)
    pub channel: u8,
    /// Resistance at the calibration temperature (Ω)
    pub r0: f64,
    /// Beta coefficient (K)
    pub beta: f64,
    /// Calibration temperature (K)
    pub t0_kelvin: f64,
    /// Divider supply voltage (V)
    pub vcc: f64,
    /// Fixed divider resistor (Ω)
    pub series_resistor: f64,
}

impl Default for RigConfig {
    fn default() -> Self {
        Self {
            heater: ActuatorConfig::heater(),
            peltier: ActuatorConfig::peltier(),
            thermocouple: ThermocoupleConfig::default(),
            ntc: NtcConfig::default(),
            filter_alpha: 0.18,
            tick_period_ms: 500,
            output_dir: PathBuf::from("data"),
        }
    }
}

impl ActuatorConfig {
    /// Lid heater on a VNH5019: IN_A high drives current, no reverse use
    pub fn heater() -> Self {
        Self {
            pwm_pin: 17,
            ctrl_pins: [27, 22],
            forward: [true, false],
            reverse: [false, true],
            fan_pin: None,
            dead_band: 0.5,
        }
    }

    /// Peltier on a VNH5019: IN_B heats, IN_A cools, fan on BCM 23
    pub fn peltier() -> Self {
        Self {
            pwm_pin: 13,
            ctrl_pins: [26, 4],
            forward: [false, true],
            reverse: [true, false],
            fan_pin: Some(23),
            dead_band: 0.5,
        }
    }

    fn validate(&self, name: &str) -> Result<(), ConfigError> {
        if !(self.dead_band.is_finite() && self.dead_band > 0.0) {
            return Err(ConfigError::Invalid(format!(
                "{} dead_band must be a positive number, got {}",
                name, self.dead_band
            )));
        }
        if self.forward == self.reverse {
            return Err(ConfigError::Invalid(format!(
                "{} forward and reverse direction levels must differ",
                name
            )));
        }
        if self.forward == [true, true] || self.reverse == [true, true] {
            return Err(ConfigError::Invalid(format!(
                "{} direction levels must not drive both inputs high",
                name
            )));
        }
        if self.ctrl_pins[0] == self.ctrl_pins[1] || self.ctrl_pins.contains(&self.pwm_pin) {
            return Err(ConfigError::Invalid(format!("{} uses the same pin twice", name)));
        }
        Ok(())
    }
}

impl Default for ThermocoupleConfig {
    fn default() -> Self {
        Self {
            spi_bus: 0,
            cs_pin: 24,
            clock_hz: 1_000_000,
        }
    }
}

impl Default for NtcConfig {
    fn default() -> Self {
        Self {
            i2c_device: "/dev/i2c-1".to_string(),
            channel: 0,
            r0: 9940.0,
            beta: 3976.0,
            t0_kelvin: 273.0 + 25.0,
            vcc: 3.3,
            series_resistor: 47_000.0,
        }
    }
}

impl NtcConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        let positive = [
            ("r0", self.r0),
            ("beta", self.beta),
            ("t0_kelvin", self.t0_kelvin),
            ("vcc", self.vcc),
            ("series_resistor", self.series_resistor),
        ];
        for (name, value) in positive {
            if !(value.is_finite() && value > 0.0) {
                return Err(ConfigError::Invalid(format!(
                    "ntc.{} must be a positive number, got {}",
                    name, value
                )));
            }
        }
        if self.channel > 3 {
            return Err(ConfigError::Invalid(format!(
                "ntc.channel must be between 0 and 3, got {}",
                self.channel
            )));
        }
        Ok(())
    }
}

impl RigConfig {
    /// Load and validate a YAML configuration file
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config: RigConfig =
            serde_yml::from_str(&contents).map_err(|source| ConfigError::Parse {
                path: path.to_path_buf(),
                source,
            })?;
        config.validate()?;
        Ok(config)
    }

    /// Check value ranges that serde cannot express
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.filter_alpha > 0.0 && self.filter_alpha <= 1.0) {
            return Err(ConfigError::Invalid(format!(
                "filter_alpha must be in (0, 1], got {}",
                self.filter_alpha
            )));
        }
        if self.tick_period_ms == 0 {
            return Err(ConfigError::Invalid(
                "tick_period_ms must be greater than zero".to_string(),
            ));
        }
        self.heater.validate("heater")?;
        self.peltier.validate("peltier")?;
        self.ntc.validate()
    }

    /// Tick period as a [`Duration`]
    pub fn tick_period(&self) -> Duration {
        Duration::from_millis(self.tick_period_ms)
    }
}
