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

//! Cycle sequencing and tick pacing
//!
//! [`CycleScheduler`] only decides *what happens next*; the controller performs
//! the work for each [`Step`]. Each call to [`CycleScheduler::next_step`] is one
//! unit of work, so a caller that stops asking stops the rig.
//!
//! The pause happens at the start of every tick but the first one of a cycle,
//! i.e. after the previous tick's status has been handed to the consumer. Since
//! the pause is fixed, the real tick period is the pause plus the time spent on
//! I/O, and a cycle always lasts at least its configured duration.

use crate::clock::Clock;
use crate::cycle::TemperatureCycle;
use std::time::Duration;

/// Next unit of work for the controller
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Step {
    RunStart,
    CycleStart(TemperatureCycle),
    /// Sample, actuate and report once toward the cycle target
    Tick(TemperatureCycle),
    CycleEnd(TemperatureCycle),
    /// All cycles done: shut down and persist
    Finish,
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Phase {
    Pending,
    Starting(usize),
    Ticking {
        index: usize,
        started: Option<Duration>,
    },
    Finishing,
    Done,
}

/// State machine walking through the cycle list
#[derive(Debug, Clone)]
pub struct CycleScheduler {
    cycles: Vec<TemperatureCycle>,
    tick_period: Duration,
    phase: Phase,
}

impl CycleScheduler {
    pub fn new(cycles: Vec<TemperatureCycle>, tick_period: Duration) -> Self {
        Self {
            cycles,
            tick_period,
            phase: Phase::Pending,
        }
    }

    pub fn tick_period(&self) -> Duration {
        self.tick_period
    }

    /// True once [`Step::Finish`] has been handed out
    pub fn is_done(&self) -> bool {
        self.phase == Phase::Done
    }

    /// Advance the state machine, pausing on `clock` between ticks
    pub fn next_step<C: Clock + ?Sized>(&mut self, clock: &mut C) -> Option<Step> {
        match self.phase {
            Phase::Pending => {
                self.phase = self.start_or_finish(0);
                Some(Step::RunStart)
            }
            Phase::Starting(index) => {
                self.phase = Phase::Ticking {
                    index,
                    started: None,
                };
                Some(Step::CycleStart(self.cycles[index]))
            }
            Phase::Ticking { index, started } => {
                let cycle = self.cycles[index];
                let started = match started {
                    Some(started) => {
                        clock.sleep(self.tick_period);
                        started
                    }
                    None => clock.now(),
                };
                let elapsed = clock.now().saturating_sub(started);
                if elapsed.as_secs_f64() <= cycle.duration() {
                    self.phase = Phase::Ticking {
                        index,
                        started: Some(started),
                    };
                    Some(Step::Tick(cycle))
                } else {
                    self.phase = self.start_or_finish(index + 1);
                    Some(Step::CycleEnd(cycle))
                }
            }
            Phase::Finishing => {
                self.phase = Phase::Done;
                Some(Step::Finish)
            }
            Phase::Done => None,
        }
    }

    fn start_or_finish(&self, index: usize) -> Phase {
        if index < self.cycles.len() {
            Phase::Starting(index)
        } else {
            Phase::Finishing
        }
    }
}
