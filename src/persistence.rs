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

//! Run table and plot output
//!
//! The table is the record of a run: failing to write it fails the run. The
//! plot is a convenience and its failures are only logged.

use crate::error::PersistenceError;
use crate::plot;
use crate::recorder::SensorSample;
use chrono::Local;
use log::{error, info};
use std::fs::{self, File};
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use uuid::Uuid;

/// Header line of the run table
pub const TABLE_HEADER: &str = "time,temp_peltier,target_peltier,temp_heater,target_heater";

/// Destination for a finished run log
pub trait PersistenceSink {
    /// Store `log` and return the path of the written table
    fn persist(&mut self, log: &[SensorSample]) -> Result<PathBuf, PersistenceError>;
}

impl<T: PersistenceSink + ?Sized> PersistenceSink for Box<T> {
    fn persist(&mut self, log: &[SensorSample]) -> Result<PathBuf, PersistenceError> {
        (**self).persist(log)
    }
}

/// Writes `temp_data_<timestamp>_<id>.csv` and a sibling `.svg` into a directory
#[derive(Debug, Clone)]
pub struct FileSink {
    directory: PathBuf,
}

impl FileSink {
    pub fn new(directory: impl Into<PathBuf>) -> Self {
        Self {
            directory: directory.into(),
        }
    }

    /// Fresh table path inside the output directory
    pub fn next_table_path(&self) -> PathBuf {
        let id = Uuid::new_v4().simple().to_string();
        let filename = format!(
            "temp_data_{}_{}.csv",
            Local::now().format("%Y%m%d_%H%M%S"),
            &id[..6]
        );
        self.directory.join(filename)
    }
}

impl PersistenceSink for FileSink {
    fn persist(&mut self, log: &[SensorSample]) -> Result<PathBuf, PersistenceError> {
        fs::create_dir_all(&self.directory).map_err(|source| PersistenceError::Io {
            path: self.directory.clone(),
            source,
        })?;

        let table_path = self.next_table_path();
        write_table(&table_path, log)?;
        info!("Wrote {} samples to {}", log.len(), table_path.display());

        let plot_path = table_path.with_extension("svg");
        match write_plot(&plot_path, log) {
            Ok(()) => info!("Wrote plot to {}", plot_path.display()),
            Err(e) => error!("Failed to render plot {}: {}", plot_path.display(), e),
        }

        Ok(table_path)
    }
}

/// Write the five-column table, two decimals per value
pub fn write_table(path: &Path, log: &[SensorSample]) -> Result<(), PersistenceError> {
    let io_error = |source| PersistenceError::Io {
        path: path.to_path_buf(),
        source,
    };

    let mut writer = BufWriter::new(File::create(path).map_err(io_error)?);
    writeln!(writer, "{}", TABLE_HEADER).map_err(io_error)?;
    for s in log {
        writeln!(
            writer,
            "{},{},{},{},{}",
            cell(s.elapsed_seconds),
            cell(s.thermocouple_temp),
            cell(s.peltier_target),
            cell(s.ntc_temp),
            cell(s.heater_target)
        )
        .map_err(io_error)?;
    }
    writer.flush().map_err(io_error)
}

/// One table value: two decimals, `nan` for a missing reading
fn cell(value: f64) -> String {
    if value.is_nan() {
        "nan".to_string()
    } else {
        format!("{:.2}", value)
    }
}

/// Read a table written by [`write_table`] back into samples
pub fn load_table(path: &Path) -> Result<Vec<SensorSample>, PersistenceError> {
    let file = File::open(path).map_err(|source| PersistenceError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let malformed = |line: usize, message: String| PersistenceError::Malformed {
        path: path.to_path_buf(),
        line,
        message,
    };

    let mut samples = Vec::new();
    for (index, line) in BufReader::new(file).lines().enumerate() {
        let line = line.map_err(|source| PersistenceError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let number = index + 1;

        if index == 0 {
            if line.trim() != TABLE_HEADER {
                return Err(malformed(number, format!("unexpected header '{}'", line)));
            }
            continue;
        }
        if line.trim().is_empty() {
            continue;
        }

        let values = line
            .split(',')
            .map(|field| field.trim().parse::<f64>())
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| malformed(number, e.to_string()))?;
        let [elapsed_seconds, thermocouple_temp, peltier_target, ntc_temp, heater_target] =
            values[..]
        else {
            return Err(malformed(
                number,
                format!("expected 5 columns, found {}", values.len()),
            ));
        };

        samples.push(SensorSample {
            elapsed_seconds,
            thermocouple_temp,
            peltier_target,
            ntc_temp,
            heater_target,
        });
    }

    Ok(samples)
}

fn write_plot(path: &Path, log: &[SensorSample]) -> Result<(), PersistenceError> {
    let svg = plot::render_svg(log)?;
    fs::write(path, svg).map_err(|source| PersistenceError::Io {
        path: path.to_path_buf(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn log() -> Vec<SensorSample> {
        vec![
            SensorSample {
                elapsed_seconds: 0.0012,
                thermocouple_temp: 21.4567,
                peltier_target: 4.0,
                ntc_temp: 25.0,
                heater_target: 37.0,
            },
            SensorSample {
                elapsed_seconds: 0.5031,
                thermocouple_temp: 20.9,
                peltier_target: 4.0,
                ntc_temp: f64::NAN,
                heater_target: 37.0,
            },
        ]
    }

    #[test]
    fn test_write_table_format() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("run.csv");
        write_table(&path, &log()).unwrap();

        let contents = fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = contents.lines().collect();
        assert_eq!(lines[0], TABLE_HEADER);
        assert_eq!(lines[1], "0.00,21.46,4.00,25.00,37.00");
        assert_eq!(lines[2], "0.50,20.90,4.00,nan,37.00");
        assert_eq!(lines.len(), 3);
    }

    #[test]
    fn test_table_round_trip() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("run.csv");
        let original = log();
        write_table(&path, &original).unwrap();
        let loaded = load_table(&path).unwrap();

        assert_eq!(loaded.len(), original.len());
        for (a, b) in original.iter().zip(&loaded) {
            let pairs = [
                (a.elapsed_seconds, b.elapsed_seconds),
                (a.thermocouple_temp, b.thermocouple_temp),
                (a.peltier_target, b.peltier_target),
                (a.ntc_temp, b.ntc_temp),
                (a.heater_target, b.heater_target),
            ];
            for (written, read) in pairs {
                if written.is_nan() {
                    assert!(read.is_nan());
                } else {
                    assert!((written - read).abs() <= 0.005 + 1e-9, "{} vs {}", written, read);
                }
            }
        }
    }

    #[test]
    fn test_load_table_rejects_bad_rows() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("bad.csv");
        fs::write(&path, format!("{}\n1.00,2.00,3.00\n", TABLE_HEADER)).unwrap();
        assert!(matches!(
            load_table(&path),
            Err(PersistenceError::Malformed { line: 2, .. })
        ));

        fs::write(&path, "a,b,c\n").unwrap();
        assert!(matches!(
            load_table(&path),
            Err(PersistenceError::Malformed { line: 1, .. })
        ));
    }

    #[test]
    fn test_file_sink_writes_table_and_plot() {
        let dir = tempdir().unwrap();
        let mut sink = FileSink::new(dir.path().join("data"));
        let table = sink.persist(&log()).unwrap();

        let name = table.file_name().unwrap().to_string_lossy().to_string();
        assert!(name.starts_with("temp_data_") && name.ends_with(".csv"), "{}", name);
        assert!(table.exists());
        assert!(table.with_extension("svg").exists());
    }

    #[test]
    fn test_file_sink_plot_failure_is_not_fatal() {
        let dir = tempdir().unwrap();
        let mut sink = FileSink::new(dir.path());
        let table = sink.persist(&[]).unwrap();

        assert_eq!(fs::read_to_string(&table).unwrap().trim(), TABLE_HEADER);
        assert!(!table.with_extension("svg").exists());
    }

    #[test]
    fn test_file_sink_unwritable_directory_is_fatal() {
        let dir = tempdir().unwrap();
        let blocker = dir.path().join("not_a_dir");
        fs::write(&blocker, "").unwrap();
        let mut sink = FileSink::new(&blocker);
        assert!(matches!(sink.persist(&log()), Err(PersistenceError::Io { .. })));
    }

    #[test]
    fn test_table_paths_are_unique() {
        let sink = FileSink::new("data");
        assert_ne!(sink.next_table_path(), sink.next_table_path());
    }
}
