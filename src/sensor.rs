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

//! Temperature sensor conditioning
//!
//! Two independent channels feed the controller:
//! - the primary channel is a thermocouple amplifier returning Celsius, smoothed
//!   with a first-order exponential filter;
//! - the secondary channel is an NTC thermistor in a voltage divider, converted
//!   to Celsius with the single-point Beta equation.
//!
//! A failing primary read is a hardware failure. A failing secondary read only
//! degrades the sample: it is logged and reported as `None`.

use crate::config::NtcConfig;
use crate::error::{ConversionError, HardwareError};
use log::warn;

/// Offset between Kelvin and Celsius used by the NTC calibration
pub const KELVIN_OFFSET: f64 = 273.0;

/// Raw temperature source for the primary channel
#[cfg_attr(test, mockall::automock)]
pub trait ThermocoupleReader {
    /// Read the current temperature in Celsius
    fn read_celsius(&mut self) -> Result<f64, HardwareError>;
}

/// Raw voltage source for the secondary channel
#[cfg_attr(test, mockall::automock)]
pub trait VoltageReader {
    /// Read the divider output voltage in volts
    fn read_volts(&mut self) -> Result<f64, HardwareError>;
}

impl<T: ThermocoupleReader + ?Sized> ThermocoupleReader for Box<T> {
    fn read_celsius(&mut self) -> Result<f64, HardwareError> {
        (**self).read_celsius()
    }
}

impl<T: VoltageReader + ?Sized> VoltageReader for Box<T> {
    fn read_volts(&mut self) -> Result<f64, HardwareError> {
        (**self).read_volts()
    }
}

/// First-order exponential moving average
#[derive(Debug, Clone)]
pub struct ExponentialFilter {
    alpha: f64,
    filtered: Option<f64>,
}

impl ExponentialFilter {
    /// `alpha` is the weight of the newest sample and must be in (0, 1]
    pub fn new(alpha: f64) -> Self {
        Self {
            alpha,
            filtered: None,
        }
    }

    /// Feed a raw sample and return the filtered value.
    ///
    /// The first sample ever observed seeds the filter and is returned as is.
    pub fn update(&mut self, raw: f64) -> f64 {
        let next = match self.filtered {
            Some(previous) => self.alpha * raw + (1.0 - self.alpha) * previous,
            None => raw,
        };
        self.filtered = Some(next);
        next
    }

    /// Last filtered value, if any sample was seen
    pub fn value(&self) -> Option<f64> {
        self.filtered
    }
}

/// Beta-equation NTC thermistor in a divider (NTC between Vcc and ADC input,
/// series resistor to ground)
#[derive(Debug, Clone)]
pub struct BetaThermistor {
    beta: f64,
    vcc: f64,
    series_resistor: f64,
    /// R0 · exp(−Beta / T0)
    r_infinity: f64,
}

impl BetaThermistor {
    pub fn new(config: &NtcConfig) -> Self {
        Self {
            beta: config.beta,
            vcc: config.vcc,
            series_resistor: config.series_resistor,
            r_infinity: config.r0 * (-config.beta / config.t0_kelvin).exp(),
        }
    }

    /// Convert a divider output voltage to Celsius
    pub fn celsius_from_voltage(&self, volts: f64) -> Result<f64, ConversionError> {
        if !(volts > 0.0) {
            return Err(ConversionError::NonPositiveVoltage(volts));
        }
        let resistance = self.vcc * self.series_resistor / volts - self.series_resistor;
        let ratio = resistance / self.r_infinity;
        if !(ratio > 0.0) {
            return Err(ConversionError::NonPositiveRatio(ratio));
        }
        let kelvin = self.beta / ratio.ln();
        let celsius = kelvin - KELVIN_OFFSET;
        if !celsius.is_finite() {
            return Err(ConversionError::NonFinite);
        }
        Ok(celsius)
    }

    /// Divider output voltage the thermistor produces at `celsius`
    pub fn voltage_at(&self, celsius: f64) -> f64 {
        let resistance = self.r_infinity * (self.beta / (celsius + KELVIN_OFFSET)).exp();
        self.vcc * self.series_resistor / (resistance + self.series_resistor)
    }
}

/// Both temperature channels of the rig
pub struct SensorConditioner<P, S> {
    thermocouple: P,
    ntc_adc: S,
    filter: ExponentialFilter,
    thermistor: BetaThermistor,
}

impl<P: ThermocoupleReader, S: VoltageReader> SensorConditioner<P, S> {
    pub fn new(thermocouple: P, ntc_adc: S, alpha: f64, ntc: &NtcConfig) -> Self {
        Self {
            thermocouple,
            ntc_adc,
            filter: ExponentialFilter::new(alpha),
            thermistor: BetaThermistor::new(ntc),
        }
    }

    /// Filtered thermocouple temperature in Celsius
    pub fn read_primary(&mut self) -> Result<f64, HardwareError> {
        let raw = self.thermocouple.read_celsius()?;
        Ok(self.filter.update(raw))
    }

    /// NTC temperature in Celsius, or `None` when the reading is unusable
    pub fn read_secondary(&mut self) -> Option<f64> {
        let reading = self
            .ntc_adc
            .read_volts()
            .map_err(ConversionError::from)
            .and_then(|volts| self.thermistor.celsius_from_voltage(volts));

        match reading {
            Ok(celsius) => Some(celsius),
            Err(e) => {
                warn!("NTC reading unavailable: {}", e);
                None
            }
        }
    }

    pub fn thermistor(&self) -> &BetaThermistor {
        &self.thermistor
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn conditioner(
        thermocouple: MockThermocoupleReader,
        adc: MockVoltageReader,
        alpha: f64,
    ) -> SensorConditioner<MockThermocoupleReader, MockVoltageReader> {
        SensorConditioner::new(thermocouple, adc, alpha, &NtcConfig::default())
    }

    #[test]
    fn test_filter_seeds_with_first_sample() {
        let mut filter = ExponentialFilter::new(0.18);
        assert_eq!(filter.value(), None);
        assert_eq!(filter.update(21.5), 21.5);
        assert_relative_eq!(filter.update(31.5), 0.18 * 31.5 + 0.82 * 21.5, epsilon = 1e-12);
    }

    #[test]
    fn test_filter_converges_monotonically() {
        for alpha in [0.05, 0.18, 0.5, 1.0] {
            let mut filter = ExponentialFilter::new(alpha);
            filter.update(0.0);
            let mut previous_gap = f64::INFINITY;
            for _ in 0..2000 {
                let gap = 25.0 - filter.update(25.0);
                assert!(
                    gap >= -1e-12 && gap <= previous_gap + 1e-12,
                    "alpha {} overshot or diverged",
                    alpha
                );
                previous_gap = gap;
            }
            assert!(previous_gap.abs() < 1e-9, "alpha {} did not converge: gap {}", alpha, previous_gap);
        }
    }

    #[test]
    fn test_beta_round_trip() {
        let thermistor = BetaThermistor::new(&NtcConfig::default());
        let mut celsius = -20.0;
        while celsius <= 120.0 {
            let volts = thermistor.voltage_at(celsius);
            let back = thermistor.celsius_from_voltage(volts).unwrap();
            assert_relative_eq!(back, celsius, epsilon = 1e-6);
            celsius += 2.5;
        }
    }

    #[test]
    fn test_beta_calibration_point() {
        // At T0 the thermistor resistance is R0
        let config = NtcConfig::default();
        let thermistor = BetaThermistor::new(&config);
        let volts = config.vcc * config.series_resistor / (config.r0 + config.series_resistor);
        assert_relative_eq!(thermistor.celsius_from_voltage(volts).unwrap(), 25.0, epsilon = 1e-9);
    }

    #[test]
    fn test_conversion_rejects_zero_voltage() {
        let thermistor = BetaThermistor::new(&NtcConfig::default());
        assert_eq!(
            thermistor.celsius_from_voltage(0.0),
            Err(ConversionError::NonPositiveVoltage(0.0))
        );
        assert!(thermistor.celsius_from_voltage(-0.1).is_err());
        assert!(thermistor.celsius_from_voltage(f64::NAN).is_err());
    }

    #[test]
    fn test_conversion_rejects_saturated_divider() {
        // V = Vcc means a zero-ohm thermistor: ln(0) is undefined
        let thermistor = BetaThermistor::new(&NtcConfig::default());
        assert!(matches!(
            thermistor.celsius_from_voltage(3.3),
            Err(ConversionError::NonPositiveRatio(_))
        ));
        assert!(thermistor.celsius_from_voltage(4.0).is_err());
    }

    #[test]
    fn test_read_primary_filters() {
        let mut thermocouple = MockThermocoupleReader::new();
        let mut readings = vec![10.0, 20.0].into_iter();
        thermocouple
            .expect_read_celsius()
            .times(2)
            .returning(move || Ok(readings.next().unwrap()));

        let mut sensor = conditioner(thermocouple, MockVoltageReader::new(), 0.5);
        assert_eq!(sensor.read_primary().unwrap(), 10.0);
        assert_eq!(sensor.read_primary().unwrap(), 15.0);
    }

    #[test]
    fn test_read_primary_propagates_bus_failure() {
        let mut thermocouple = MockThermocoupleReader::new();
        thermocouple
            .expect_read_celsius()
            .returning(|| Err(HardwareError::new("MAX31856", "fault register set")));

        let mut sensor = conditioner(thermocouple, MockVoltageReader::new(), 0.5);
        assert!(sensor.read_primary().is_err());
    }

    #[test]
    fn test_read_secondary_division_by_zero_is_unavailable() {
        let mut adc = MockVoltageReader::new();
        adc.expect_read_volts().returning(|| Ok(0.0));

        let mut sensor = conditioner(MockThermocoupleReader::new(), adc, 0.5);
        assert_eq!(sensor.read_secondary(), None);
    }

    #[test]
    fn test_read_secondary_bus_failure_is_unavailable() {
        let mut adc = MockVoltageReader::new();
        adc.expect_read_volts()
            .returning(|| Err(HardwareError::new("ADS1115", "no acknowledge")));

        let mut sensor = conditioner(MockThermocoupleReader::new(), adc, 0.5);
        assert_eq!(sensor.read_secondary(), None);
    }

    #[test]
    fn test_read_secondary_converts() {
        let thermistor = BetaThermistor::new(&NtcConfig::default());
        let volts = thermistor.voltage_at(37.0);
        let mut adc = MockVoltageReader::new();
        adc.expect_read_volts().returning(move || Ok(volts));

        let mut sensor = conditioner(MockThermocoupleReader::new(), adc, 0.5);
        assert_relative_eq!(sensor.read_secondary().unwrap(), 37.0, epsilon = 1e-6);
    }
}
