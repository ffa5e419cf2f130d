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

//! Command line options shared by the thermocycler binaries

use crate::config::RigConfig;
use crate::cycle::{parse_cycles, TemperatureCycle};
use crate::error::{ConfigError, CycleParseError};
use crate::recorder::EventFormat;
use clap::Args;
use log::info;
use std::path::PathBuf;

/// Run options common to the simulated and the hardware rig
#[derive(Debug, Clone, Args)]
pub struct ControlArgs {
    /// Heater (lid) setpoint in °C, held for the whole run
    #[arg(
        long = "heater-temp",
        default_value_t = 37.0,
        value_parser = parse_setpoint,
        allow_hyphen_values = true
    )]
    pub heater_temp: f64,

    /// Peltier cycle as TEMP:DURATION (°C:s), repeat for a program.
    /// Defaults to 4:20 then 15:20
    #[arg(long = "cycle", value_name = "TEMP:DURATION", allow_hyphen_values = true)]
    pub cycles: Vec<String>,

    /// Frame status lines as Server-Sent Events messages
    #[arg(long)]
    pub sse: bool,

    /// Rig configuration file (YAML)
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Directory for run tables and plots, overrides the configuration
    #[arg(short, long, value_name = "DIR")]
    pub output_dir: Option<PathBuf>,

    /// Enable verbose logging (debug level)
    #[arg(short = 'v', long = "verbose")]
    pub verbose: bool,

    /// Disable all logging output
    #[arg(short = 'q', long = "quiet")]
    pub quiet: bool,
}

impl ControlArgs {
    /// Cycle program from the `--cycle` options
    pub fn cycle_program(&self) -> Result<Vec<TemperatureCycle>, CycleParseError> {
        parse_cycles(&self.cycles)
    }

    /// Configuration file (or defaults) with command line overrides applied
    pub fn rig_config(&self) -> Result<RigConfig, ConfigError> {
        let mut config = match &self.config {
            Some(path) => {
                info!("Loading configuration from {}", path.display());
                RigConfig::from_file(path)?
            }
            None => RigConfig::default(),
        };
        if let Some(dir) = &self.output_dir {
            config.output_dir = dir.clone();
        }
        Ok(config)
    }

    pub fn event_format(&self) -> EventFormat {
        EventFormat::from_sse_flag(self.sse)
    }

    pub fn log_level(&self) -> log::LevelFilter {
        if self.quiet {
            log::LevelFilter::Off
        } else if self.verbose {
            log::LevelFilter::Debug
        } else {
            log::LevelFilter::Info
        }
    }
}

/// Finite temperature in °C
fn parse_setpoint(value: &str) -> Result<f64, String> {
    let setpoint: f64 = value
        .trim()
        .parse()
        .map_err(|_| format!("'{}' is not a temperature", value))?;
    if !setpoint.is_finite() {
        return Err(format!("setpoint must be a finite temperature, got {}", value));
    }
    Ok(setpoint)
}

/// Initialize env_logger at the level selected by `-v` / `-q`
pub fn init_logging(args: &ControlArgs) {
    env_logger::Builder::from_default_env()
        .filter_level(args.log_level())
        .init();
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[derive(Debug, Parser)]
    struct TestCli {
        #[command(flatten)]
        control: ControlArgs,
    }

    fn parse(args: &[&str]) -> ControlArgs {
        let argv = std::iter::once("thermocycler").chain(args.iter().copied());
        TestCli::parse_from(argv).control
    }

    #[test]
    fn test_defaults() {
        let args = parse(&[]);
        assert_eq!(args.heater_temp, 37.0);
        assert!(args.cycles.is_empty());
        assert_eq!(args.event_format(), EventFormat::Plain);
        assert_eq!(args.log_level(), log::LevelFilter::Info);
        assert_eq!(args.cycle_program().unwrap(), TemperatureCycle::default_program());
    }

    #[test]
    fn test_repeated_cycles_keep_order() {
        let args = parse(&["--cycle", "95:10", "--cycle", "-5:30", "--sse", "-q"]);
        let program = args.cycle_program().unwrap();
        assert_eq!(program.len(), 2);
        assert_eq!(program[0].target_temperature(), 95.0);
        assert_eq!(program[1].target_temperature(), -5.0);
        assert_eq!(program[1].duration(), 30.0);
        assert_eq!(args.event_format(), EventFormat::Framed);
        assert_eq!(args.log_level(), log::LevelFilter::Off);
    }

    #[test]
    fn test_bad_cycle_is_reported() {
        let args = parse(&["--cycle", "4:30", "--cycle", "warm:10"]);
        let err = args.cycle_program().unwrap_err();
        assert_eq!(err.entry, "warm:10");
    }

    #[test]
    fn test_heater_setpoint_must_be_finite() {
        assert_eq!(parse(&["--heater-temp", "42.5"]).heater_temp, 42.5);
        assert_eq!(parse(&["--heater-temp", "-3"]).heater_temp, -3.0);

        for bad in ["inf", "-inf", "NaN", "hot"] {
            let result = TestCli::try_parse_from(["thermocycler", "--heater-temp", bad]);
            assert!(result.is_err(), "--heater-temp {} should be rejected", bad);
        }
    }

    #[test]
    fn test_output_dir_overrides_config_file() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "tick_period_ms: 250\noutput_dir: from_file").unwrap();
        let path = file.path().to_string_lossy().to_string();

        let args = parse(&["--config", &path, "--output-dir", "/tmp/runs"]);
        let config = args.rig_config().unwrap();
        assert_eq!(config.tick_period_ms, 250);
        assert_eq!(config.output_dir, PathBuf::from("/tmp/runs"));

        let args = parse(&["--config", &path]);
        assert_eq!(args.rig_config().unwrap().output_dir, PathBuf::from("from_file"));
    }
}
