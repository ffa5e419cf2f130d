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

//! Run orchestration
//!
//! [`Controller`] owns the sensors, both actuators, the cycle program and the
//! run log. [`Controller::run`] returns a [`RunStream`]: an iterator whose every
//! `next()` performs one step of the run (one tick or one milestone) and yields
//! the resulting [`RunEvent`]. Dropping the stream early leaves the actuators in
//! their last commanded state.

use crate::actuator::{ActuatorDriver, Capability, HysteresisActuator};
use crate::clock::Clock;
use crate::config::RigConfig;
use crate::cycle::TemperatureCycle;
use crate::error::{ControlError, HardwareError};
use crate::persistence::PersistenceSink;
use crate::recorder::{Recorder, RunEvent, SensorSample};
use crate::scheduler::{CycleScheduler, Step};
use crate::sensor::{SensorConditioner, ThermocoupleReader, VoltageReader};
use log::{debug, info};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Hardware handles of one rig
pub struct RigHardware {
    pub thermocouple: Box<dyn ThermocoupleReader>,
    pub ntc_adc: Box<dyn VoltageReader>,
    pub peltier: Box<dyn ActuatorDriver>,
    pub heater: Box<dyn ActuatorDriver>,
}

type Sensors = SensorConditioner<Box<dyn ThermocoupleReader>, Box<dyn VoltageReader>>;
type Actuator = HysteresisActuator<Box<dyn ActuatorDriver>>;

/// Thermocycler controller
pub struct Controller {
    sensor: Sensors,
    peltier: Actuator,
    heater: Actuator,
    heater_setpoint: f64,
    cycles: Vec<TemperatureCycle>,
    recorder: Recorder,
    clock: Box<dyn Clock>,
    sink: Box<dyn PersistenceSink>,
    tick_period: Duration,
    run_started: Duration,
    last_output: Option<PathBuf>,
}

impl Controller {
    /// Take ownership of the rig. Both actuators are commanded off.
    pub fn new(
        config: &RigConfig,
        hardware: RigHardware,
        heater_setpoint: f64,
        cycles: Vec<TemperatureCycle>,
        clock: Box<dyn Clock>,
        sink: Box<dyn PersistenceSink>,
    ) -> Result<Self, HardwareError> {
        let sensor = SensorConditioner::new(
            hardware.thermocouple,
            hardware.ntc_adc,
            config.filter_alpha,
            &config.ntc,
        );
        let peltier = HysteresisActuator::new(
            "peltier",
            hardware.peltier,
            Capability::Bidirectional,
            config.peltier.dead_band,
        )?;
        let heater = HysteresisActuator::new(
            "heater",
            hardware.heater,
            Capability::Unidirectional,
            config.heater.dead_band,
        )?;

        Ok(Self {
            sensor,
            peltier,
            heater,
            heater_setpoint,
            cycles,
            recorder: Recorder::new(),
            clock,
            sink,
            tick_period: config.tick_period(),
            run_started: Duration::ZERO,
            last_output: None,
        })
    }

    /// Start a run over the configured cycles. The previous run log is dropped.
    pub fn run(&mut self) -> RunStream<'_> {
        self.recorder.clear();
        let scheduler = CycleScheduler::new(self.cycles.clone(), self.tick_period);
        RunStream {
            controller: self,
            scheduler,
            failed: false,
        }
    }

    /// Samples of the current or last run
    pub fn log(&self) -> &[SensorSample] {
        self.recorder.log()
    }

    /// Table written by the last completed run
    pub fn last_output(&self) -> Option<&Path> {
        self.last_output.as_deref()
    }

    pub fn cycles(&self) -> &[TemperatureCycle] {
        &self.cycles
    }

    pub fn heater_setpoint(&self) -> f64 {
        self.heater_setpoint
    }

    /// Sample both channels, drive both actuators and record the sample
    fn tick(&mut self, cycle: TemperatureCycle) -> Result<RunEvent, ControlError> {
        let elapsed = self.clock.now().saturating_sub(self.run_started);
        let peltier_temp = self.sensor.read_primary()?;
        let heater_temp = self.sensor.read_secondary();

        self.recorder.record(SensorSample {
            elapsed_seconds: elapsed.as_secs_f64(),
            thermocouple_temp: peltier_temp,
            peltier_target: cycle.target_temperature(),
            ntc_temp: heater_temp.unwrap_or(f64::NAN),
            heater_target: self.heater_setpoint,
        })?;

        self.peltier.update(cycle.target_temperature(), peltier_temp)?;
        match heater_temp {
            Some(measured) => {
                self.heater.update(self.heater_setpoint, measured)?;
            }
            None => {
                debug!("heater: no NTC reading, forcing off");
                self.heater.off()?;
            }
        }

        Ok(RunEvent::Status {
            peltier_temp,
            heater_temp,
        })
    }

    /// Shut both actuators down and hand the log to the sink
    fn finish(&mut self) -> Result<RunEvent, ControlError> {
        self.peltier.off()?;
        self.heater.off()?;
        info!("Run complete, {} samples recorded", self.recorder.len());

        let path = self.sink.persist(self.recorder.log())?;
        self.last_output = Some(path.clone());
        Ok(RunEvent::RunFinished { path })
    }

    fn perform(&mut self, step: Step) -> Result<RunEvent, ControlError> {
        match step {
            Step::RunStart => {
                self.run_started = self.clock.now();
                info!(
                    "Starting thermal control: {} cycles, heater setpoint {:.1}°C",
                    self.cycles.len(),
                    self.heater_setpoint
                );
                Ok(RunEvent::RunStarted)
            }
            Step::CycleStart(cycle) => {
                info!(
                    "Cycle {:?}°C for {:?}s",
                    cycle.target_temperature(),
                    cycle.duration()
                );
                Ok(RunEvent::CycleStarted {
                    target_temperature: cycle.target_temperature(),
                    duration: cycle.duration(),
                })
            }
            Step::Tick(cycle) => self.tick(cycle),
            Step::CycleEnd(cycle) => Ok(RunEvent::CycleFinished {
                target_temperature: cycle.target_temperature(),
            }),
            Step::Finish => self.finish(),
        }
    }
}

/// Pull-driven event stream of one run
///
/// Yields `Err` at most once; the stream is exhausted after an error.
pub struct RunStream<'a> {
    controller: &'a mut Controller,
    scheduler: CycleScheduler,
    failed: bool,
}

impl Iterator for RunStream<'_> {
    type Item = Result<RunEvent, ControlError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed {
            return None;
        }
        let step = self.scheduler.next_step(&mut self.controller.clock)?;
        let result = self.controller.perform(step);
        if result.is_err() {
            self.failed = true;
        }
        Some(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actuator::{ActuatorPolarityState, Polarity};
    use crate::clock::VirtualClock;
    use crate::error::PersistenceError;
    use crate::simulation::simulated_rig;
    use std::cell::RefCell;
    use std::rc::Rc;

    /// Keeps the persisted log in memory
    #[derive(Clone, Default)]
    struct MemorySink {
        saved: Rc<RefCell<Vec<SensorSample>>>,
    }

    impl PersistenceSink for MemorySink {
        fn persist(&mut self, log: &[SensorSample]) -> Result<PathBuf, PersistenceError> {
            *self.saved.borrow_mut() = log.to_vec();
            Ok(PathBuf::from("memory.csv"))
        }
    }

    struct FailingSink;

    impl PersistenceSink for FailingSink {
        fn persist(&mut self, _log: &[SensorSample]) -> Result<PathBuf, PersistenceError> {
            Err(PersistenceError::Io {
                path: PathBuf::from("data/run.csv"),
                source: std::io::Error::new(std::io::ErrorKind::PermissionDenied, "read-only"),
            })
        }
    }

    fn controller(cycles: Vec<TemperatureCycle>, sink: Box<dyn PersistenceSink>) -> Controller {
        let config = RigConfig::default();
        let (_plant, hardware) = simulated_rig(&config, 22.0);
        Controller::new(&config, hardware, 37.0, cycles, Box::new(VirtualClock::new()), sink).unwrap()
    }

    #[test]
    fn test_run_event_sequence() {
        let cycles = vec![TemperatureCycle::new(4.0, 1.0).unwrap()];
        let mut controller = controller(cycles, Box::new(MemorySink::default()));
        let events: Vec<RunEvent> = controller.run().collect::<Result<_, _>>().unwrap();

        assert_eq!(events.first(), Some(&RunEvent::RunStarted));
        assert_eq!(
            events[1],
            RunEvent::CycleStarted {
                target_temperature: 4.0,
                duration: 1.0
            }
        );
        let statuses = events
            .iter()
            .filter(|e| matches!(e, RunEvent::Status { .. }))
            .count();
        assert_eq!(statuses, 3);
        assert_eq!(
            events[events.len() - 2],
            RunEvent::CycleFinished {
                target_temperature: 4.0
            }
        );
        assert_eq!(
            events.last(),
            Some(&RunEvent::RunFinished {
                path: PathBuf::from("memory.csv")
            })
        );
        assert_eq!(controller.last_output(), Some(Path::new("memory.csv")));
    }

    #[test]
    fn test_log_is_persisted_and_monotonic() {
        let sink = MemorySink::default();
        let saved = Rc::clone(&sink.saved);
        let cycles = vec![
            TemperatureCycle::new(4.0, 2.0).unwrap(),
            TemperatureCycle::new(15.0, 2.0).unwrap(),
        ];
        let mut controller = controller(cycles, Box::new(sink));
        for event in controller.run() {
            event.unwrap();
        }

        let saved = saved.borrow();
        assert_eq!(saved.as_slice(), controller.log());
        assert_eq!(saved.len(), 10);
        assert!(saved
            .windows(2)
            .all(|w| w[0].elapsed_seconds <= w[1].elapsed_seconds));
        assert!(saved[..5].iter().all(|s| s.peltier_target == 4.0));
        assert!(saved[5..].iter().all(|s| s.peltier_target == 15.0));
        assert!(saved.iter().all(|s| s.heater_target == 37.0));
    }

    #[test]
    fn test_actuators_off_after_run() {
        let config = RigConfig::default();
        let (plant, hardware) = simulated_rig(&config, 22.0);
        let cycles = vec![TemperatureCycle::new(4.0, 1.0).unwrap()];
        let mut controller = Controller::new(
            &config,
            hardware,
            37.0,
            cycles,
            Box::new(VirtualClock::new()),
            Box::new(MemorySink::default()),
        )
        .unwrap();

        let mut stream = controller.run();
        stream.next();
        stream.next();
        stream.next().unwrap().unwrap();
        // Mid-cycle: the Peltier cools toward 4°C and the heater warms toward 37°C
        assert_eq!(plant.borrow().peltier.polarity, Polarity::Reverse);
        assert_eq!(plant.borrow().heater.polarity, Polarity::Forward);

        for event in stream {
            event.unwrap();
        }
        let plant = plant.borrow();
        assert_eq!(plant.peltier.duty, 0.0);
        assert_eq!(plant.peltier.fan, 0.0);
        assert_eq!(plant.heater.duty, 0.0);
        assert_eq!(plant.heater.polarity, Polarity::Off);
        assert_eq!(controller.peltier.state(), ActuatorPolarityState::OFF);
    }

    #[test]
    fn test_missing_ntc_forces_heater_off() {
        let config = RigConfig::default();
        let (plant, hardware) = simulated_rig(&config, 22.0);
        plant.borrow_mut().ntc_disconnected = true;
        let cycles = vec![TemperatureCycle::new(4.0, 1.0).unwrap()];
        let mut controller = Controller::new(
            &config,
            hardware,
            37.0,
            cycles,
            Box::new(VirtualClock::new()),
            Box::new(MemorySink::default()),
        )
        .unwrap();

        let mut stream = controller.run();
        stream.next();
        stream.next();
        let status = stream.next().unwrap().unwrap();
        assert!(matches!(
            status,
            RunEvent::Status {
                heater_temp: None,
                ..
            }
        ));
        assert_eq!(plant.borrow().heater.duty, 0.0);
        drop(stream);

        assert!(controller.log()[0].ntc_temp.is_nan());
    }

    #[test]
    fn test_table_failure_ends_run() {
        let cycles = vec![TemperatureCycle::new(4.0, 0.5).unwrap()];
        let mut controller = controller(cycles, Box::new(FailingSink));
        let results: Vec<_> = controller.run().collect();

        let last = results.last().unwrap();
        assert!(matches!(last, Err(ControlError::Persistence(_))));
        assert_eq!(results.iter().filter(|r| r.is_err()).count(), 1);
        assert_eq!(controller.last_output(), None);
    }

    #[test]
    fn test_rerun_starts_fresh_log() {
        let cycles = vec![TemperatureCycle::new(4.0, 0.5).unwrap()];
        let mut controller = controller(cycles, Box::new(MemorySink::default()));
        controller.run().for_each(drop);
        let first = controller.log().len();
        controller.run().for_each(drop);

        assert_eq!(controller.log().len(), first);
        assert_eq!(controller.log()[0].elapsed_seconds, 0.0);
    }
}
