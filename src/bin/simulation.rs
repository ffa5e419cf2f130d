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

//! Thermocycler on a simulated rig
//!
//! Runs the full control loop against the thermal model of the Peltier block
//! and heated lid. By default the clock is virtual and the run completes
//! immediately; `--realtime` paces ticks on the wall clock.

use anyhow::{Context, Result};
use clap::Parser;
use log::{error, info};
use std::io::Write;
use thermocycler::cli::{init_logging, ControlArgs};
use thermocycler::{simulated_rig, Clock, Controller, FileSink, SystemClock, VirtualClock};

/// Simulated Peltier / heater thermocycler
#[derive(Debug, Parser)]
#[command(author, version, about, long_about = None)]
struct Args {
    #[command(flatten)]
    control: ControlArgs,

    /// Pace ticks on the wall clock instead of a virtual clock
    #[arg(long, default_value_t = false)]
    realtime: bool,

    /// Ambient (and initial) temperature of the simulated rig in °C
    #[arg(long, default_value_t = 22.0)]
    ambient: f64,
}

fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(&args.control);

    // Reject a bad program before touching the rig
    let cycles = args.control.cycle_program()?;
    let config = args.control.rig_config()?;
    let format = args.control.event_format();

    info!(
        "Simulated rig at {:.1}°C ambient, {} cycles, tick {} ms",
        args.ambient,
        cycles.len(),
        config.tick_period_ms
    );
    let (_plant, hardware) = simulated_rig(&config, args.ambient);
    let clock: Box<dyn Clock> = if args.realtime {
        Box::new(SystemClock::new())
    } else {
        Box::new(VirtualClock::new())
    };
    let sink = FileSink::new(config.output_dir.clone());

    let mut controller = Controller::new(
        &config,
        hardware,
        args.control.heater_temp,
        cycles,
        clock,
        Box::new(sink),
    )
    .context("failed to initialize the simulated rig")?;

    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    for event in controller.run() {
        match event {
            Ok(event) => {
                out.write_all(event.render(format).as_bytes())?;
                out.flush()?;
            }
            Err(e) => {
                error!("Run aborted: {}", e);
                return Err(e.into());
            }
        }
    }

    Ok(())
}
