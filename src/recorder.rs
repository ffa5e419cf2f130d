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

//! Run log and status events
//!
//! The [`Recorder`] keeps every sample of a run in time order. [`RunEvent`] is
//! what the controller hands to its consumer; it renders either as plain text
//! or framed as a Server-Sent Events message.

use crate::error::RecordError;
use std::fmt;
use std::path::PathBuf;

/// One tick worth of measurements and targets
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SensorSample {
    /// Seconds since the start of the run
    pub elapsed_seconds: f64,
    /// Filtered thermocouple temperature (Peltier side)
    pub thermocouple_temp: f64,
    /// Active cycle target
    pub peltier_target: f64,
    /// NTC temperature (heater side), NaN when unavailable
    pub ntc_temp: f64,
    /// Run-wide heater setpoint
    pub heater_target: f64,
}

/// Ordered samples of one run
pub type RunLog = Vec<SensorSample>;

/// Append-only sample store enforcing time order
#[derive(Debug, Clone, Default)]
pub struct Recorder {
    log: RunLog,
}

impl Recorder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drop every sample, ready for a new run
    pub fn clear(&mut self) {
        self.log.clear();
    }

    /// Append a sample; its timestamp must not precede the previous one
    pub fn record(&mut self, sample: SensorSample) -> Result<(), RecordError> {
        if let Some(last) = self.log.last() {
            if sample.elapsed_seconds < last.elapsed_seconds {
                return Err(RecordError {
                    elapsed: sample.elapsed_seconds,
                    last: last.elapsed_seconds,
                });
            }
        }
        self.log.push(sample);
        Ok(())
    }

    pub fn log(&self) -> &[SensorSample] {
        &self.log
    }

    pub fn len(&self) -> usize {
        self.log.len()
    }

    pub fn is_empty(&self) -> bool {
        self.log.is_empty()
    }
}

/// How events are written to the consumer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventFormat {
    /// One line of text per event
    Plain,
    /// `data: <text>\n\n`, for streaming to a remote listener
    Framed,
}

impl EventFormat {
    pub fn from_sse_flag(sse: bool) -> Self {
        if sse {
            EventFormat::Framed
        } else {
            EventFormat::Plain
        }
    }
}

/// Status event produced by a run
#[derive(Debug, Clone, PartialEq)]
pub enum RunEvent {
    RunStarted,
    CycleStarted {
        target_temperature: f64,
        duration: f64,
    },
    /// Temperatures seen by the two actuators on this tick
    Status {
        peltier_temp: f64,
        heater_temp: Option<f64>,
    },
    CycleFinished {
        target_temperature: f64,
    },
    RunFinished {
        path: PathBuf,
    },
}

impl RunEvent {
    /// Event text in the requested format, terminator included
    pub fn render(&self, format: EventFormat) -> String {
        match format {
            EventFormat::Plain => format!("{}\n", self),
            EventFormat::Framed => format!("data: {}\n\n", self),
        }
    }
}

impl fmt::Display for RunEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunEvent::RunStarted => write!(f, "[INFO] Starting thermal control"),
            // `{:?}` prints the shortest exact form of the parsed value (4.0, 4.25)
            RunEvent::CycleStarted {
                target_temperature,
                duration,
            } => write!(
                f,
                "[INFO] Cycle {:?}°C for {:?}s",
                target_temperature, duration
            ),
            RunEvent::Status {
                peltier_temp,
                heater_temp: Some(heater_temp),
            } => write!(f, "Peltier={:.2}C / Heater={:.2}C", peltier_temp, heater_temp),
            RunEvent::Status {
                peltier_temp,
                heater_temp: None,
            } => write!(f, "Peltier={:.2}C / Heater=unavailable", peltier_temp),
            RunEvent::CycleFinished { target_temperature } => {
                write!(f, "[INFO] End of cycle {:?}°C", target_temperature)
            }
            RunEvent::RunFinished { path } => write!(f, "[INFO] File saved: {}", path.display()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(elapsed_seconds: f64) -> SensorSample {
        SensorSample {
            elapsed_seconds,
            thermocouple_temp: 20.0,
            peltier_target: 4.0,
            ntc_temp: 30.0,
            heater_target: 37.0,
        }
    }

    #[test]
    fn test_recorder_accepts_equal_timestamps() {
        let mut recorder = Recorder::new();
        recorder.record(sample(0.0)).unwrap();
        recorder.record(sample(0.5)).unwrap();
        recorder.record(sample(0.5)).unwrap();
        assert_eq!(recorder.len(), 3);
    }

    #[test]
    fn test_recorder_rejects_time_going_backwards() {
        let mut recorder = Recorder::new();
        recorder.record(sample(1.0)).unwrap();
        let err = recorder.record(sample(0.5)).unwrap_err();
        assert_eq!(err.last, 1.0);
        assert_eq!(recorder.len(), 1);

        recorder.clear();
        assert!(recorder.is_empty());
        assert!(recorder.record(sample(0.5)).is_ok());
    }

    #[test]
    fn test_render_plain_and_framed() {
        let event = RunEvent::Status {
            peltier_temp: 4.123,
            heater_temp: Some(36.991),
        };
        assert_eq!(
            event.render(EventFormat::Plain),
            "Peltier=4.12C / Heater=36.99C\n"
        );
        assert_eq!(
            event.render(EventFormat::Framed),
            "data: Peltier=4.12C / Heater=36.99C\n\n"
        );
    }

    #[test]
    fn test_render_lifecycle_events() {
        let start = RunEvent::CycleStarted {
            target_temperature: 4.0,
            duration: 20.0,
        };
        assert_eq!(start.to_string(), "[INFO] Cycle 4.0°C for 20.0s");

        let end = RunEvent::CycleFinished {
            target_temperature: 15.0,
        };
        assert_eq!(
            end.render(EventFormat::Framed),
            "data: [INFO] End of cycle 15.0°C\n\n"
        );

        let fractional = RunEvent::CycleStarted {
            target_temperature: 4.25,
            duration: 30.05,
        };
        assert_eq!(fractional.to_string(), "[INFO] Cycle 4.25°C for 30.05s");
        assert_eq!(
            RunEvent::CycleFinished {
                target_temperature: -2.125
            }
            .to_string(),
            "[INFO] End of cycle -2.125°C"
        );

        let unavailable = RunEvent::Status {
            peltier_temp: 10.0,
            heater_temp: None,
        };
        assert!(unavailable.to_string().contains("unavailable"));
    }

    #[test]
    fn test_format_from_flag() {
        assert_eq!(EventFormat::from_sse_flag(true), EventFormat::Framed);
        assert_eq!(EventFormat::from_sse_flag(false), EventFormat::Plain);
    }
}
