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

//! Temperature cycles and their `TEMP:DURATION` text encoding

use crate::error::CycleParseError;
use std::fmt;
use std::str::FromStr;

/// One segment of a run: hold `target_temperature` for `duration` seconds
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TemperatureCycle {
    target_temperature: f64,
    duration: f64,
}

impl TemperatureCycle {
    /// Create a cycle, rejecting negative or non-finite values
    pub fn new(target_temperature: f64, duration: f64) -> Result<Self, String> {
        if !target_temperature.is_finite() {
            return Err("target temperature must be a finite number".to_string());
        }
        if !duration.is_finite() || duration < 0.0 {
            return Err("duration must be a non-negative number of seconds".to_string());
        }
        Ok(Self {
            target_temperature,
            duration,
        })
    }

    /// Target temperature in Celsius
    pub fn target_temperature(&self) -> f64 {
        self.target_temperature
    }

    /// Duration in seconds
    pub fn duration(&self) -> f64 {
        self.duration
    }

    /// Cycles used when none are given on the command line
    pub fn default_program() -> Vec<TemperatureCycle> {
        vec![
            TemperatureCycle {
                target_temperature: 4.0,
                duration: 20.0,
            },
            TemperatureCycle {
                target_temperature: 15.0,
                duration: 20.0,
            },
        ]
    }
}

impl fmt::Display for TemperatureCycle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.target_temperature, self.duration)
    }
}

impl FromStr for TemperatureCycle {
    type Err = CycleParseError;

    fn from_str(entry: &str) -> Result<Self, Self::Err> {
        let invalid = |reason: &str| CycleParseError {
            entry: entry.to_string(),
            reason: reason.to_string(),
        };

        let (temp, duration) = entry
            .split_once(':')
            .ok_or_else(|| invalid("missing ':' separator"))?;
        let temp: f64 = temp
            .trim()
            .parse()
            .map_err(|_| invalid("temperature is not a number"))?;
        let duration: f64 = duration
            .trim()
            .parse()
            .map_err(|_| invalid("duration is not a number"))?;

        TemperatureCycle::new(temp, duration).map_err(|reason| invalid(&reason))
    }
}

/// Parse every entry, or fall back to [`TemperatureCycle::default_program`]
/// when the list is empty. Stops at the first malformed entry.
pub fn parse_cycles<S: AsRef<str>>(entries: &[S]) -> Result<Vec<TemperatureCycle>, CycleParseError> {
    if entries.is_empty() {
        return Ok(TemperatureCycle::default_program());
    }
    entries.iter().map(|entry| entry.as_ref().parse()).collect()
}
