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

//! Thermocycler on the Raspberry Pi rig
//!
//! MAX31856 thermocouple on SPI, NTC through an ADS1115 on I2C and two
//! H-bridges on GPIO. Ticks are paced on the wall clock.

use anyhow::{Context, Result};
use clap::Parser;
use log::{error, info};
use std::io::Write;
use thermocycler::cli::{init_logging, ControlArgs};
use thermocycler::rpi::rpi_hardware;
use thermocycler::{Controller, FileSink, SystemClock};

/// Peltier / heater thermocycler for Raspberry Pi
#[derive(Debug, Parser)]
#[command(author, version, about, long_about = None)]
struct Args {
    #[command(flatten)]
    control: ControlArgs,
}

fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(&args.control);

    // Reject a bad program before touching the rig
    let cycles = args.control.cycle_program()?;
    let config = args.control.rig_config()?;
    let format = args.control.event_format();

    let hardware = rpi_hardware(&config).context("failed to acquire rig hardware")?;
    info!("Heater setpoint {:.1}°C, {} cycles", args.control.heater_temp, cycles.len());

    let mut controller = Controller::new(
        &config,
        hardware,
        args.control.heater_temp,
        cycles,
        Box::new(SystemClock::new()),
        Box::new(FileSink::new(config.output_dir.clone())),
    )
    .context("failed to switch the actuators off")?;

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
