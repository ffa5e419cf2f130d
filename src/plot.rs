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

//! SVG chart of a run log
//!
//! Four series against time: Peltier temperature and target, heater
//! temperature and target. Unavailable (NaN) samples break the line.

use crate::error::PersistenceError;
use crate::recorder::SensorSample;

const WIDTH: f64 = 800.0;
const HEIGHT: f64 = 400.0;
const MARGIN: f64 = 60.0;

/// Plot area mapping from data space to SVG coordinates
struct Frame {
    time_min: f64,
    time_max: f64,
    temp_min: f64,
    temp_max: f64,
    plot_width: f64,
    plot_height: f64,
}

impl Frame {
    fn x(&self, time: f64) -> f64 {
        MARGIN + (time - self.time_min) / (self.time_max - self.time_min) * self.plot_width
    }

    fn y(&self, temp: f64) -> f64 {
        MARGIN + self.plot_height
            - (temp - self.temp_min) / (self.temp_max - self.temp_min) * self.plot_height
    }
}

/// Render the run log as a standalone SVG document
pub fn render_svg(log: &[SensorSample]) -> Result<String, PersistenceError> {
    if log.is_empty() {
        return Err(PersistenceError::EmptyLog);
    }

    let time_min = log.first().map_or(0.0, |s| s.elapsed_seconds);
    let mut time_max = log.last().map_or(0.0, |s| s.elapsed_seconds);
    if time_max <= time_min {
        time_max = time_min + 1.0;
    }

    let (mut temp_min, mut temp_max) = log
        .iter()
        .flat_map(|s| [s.thermocouple_temp, s.peltier_target, s.ntc_temp, s.heater_target])
        .filter(|t| t.is_finite())
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), t| (lo.min(t), hi.max(t)));
    if !temp_min.is_finite() {
        return Err(PersistenceError::EmptyLog);
    }

    // Add some padding to temperature range
    let padding = ((temp_max - temp_min) * 0.1).max(1.0);
    temp_min -= padding;
    temp_max += padding;

    let frame = Frame {
        time_min,
        time_max,
        temp_min,
        temp_max,
        plot_width: WIDTH - 2.0 * MARGIN,
        plot_height: HEIGHT - 2.0 * MARGIN,
    };

    let peltier_path = line_path(&frame, log, |s| s.thermocouple_temp);
    let peltier_target_path = line_path(&frame, log, |s| s.peltier_target);
    let heater_path = line_path(&frame, log, |s| s.ntc_temp);
    let heater_target_path = line_path(&frame, log, |s| s.heater_target);
    let grid_lines = grid_lines(&frame);
    let axes = axes(&frame);

    let svg = format!(
        "<svg width=\"{width}\" height=\"{height}\" viewBox=\"0 0 {width} {height}\" xmlns=\"http://www.w3.org/2000/svg\">\
            <defs>\
                <style>\
                    .chart-title {{ font: bold 16px Arial, sans-serif; text-anchor: middle; }}\
                    .axis-label {{ font: 12px Arial, sans-serif; text-anchor: middle; }}\
                    .axis-tick {{ font: 10px Arial, sans-serif; text-anchor: middle; }}\
                    .legend {{ font: 12px Arial, sans-serif; }}\
                    .grid-line {{ stroke: #e0e0e0; stroke-width: 0.5; }}\
                    .peltier-line {{ stroke: #45b7d1; stroke-width: 2; fill: none; }}\
                    .peltier-target {{ stroke: #45b7d1; stroke-width: 1.5; fill: none; stroke-dasharray: 5,5; }}\
                    .heater-line {{ stroke: #ff6b6b; stroke-width: 2; fill: none; }}\
                    .heater-target {{ stroke: #ff6b6b; stroke-width: 1.5; fill: none; stroke-dasharray: 5,5; }}\
                    .axis-line {{ stroke: #333; stroke-width: 1; }}\
                </style>\
            </defs>\
            <rect width=\"100%\" height=\"100%\" fill=\"white\"/>\
            <text x=\"{title_x}\" y=\"25\" class=\"chart-title\">Temperature Control</text>\
            {grid_lines}\
            {axes}\
            <path d=\"{peltier_path}\" class=\"peltier-line\"/>\
            <path d=\"{peltier_target_path}\" class=\"peltier-target\"/>\
            <path d=\"{heater_path}\" class=\"heater-line\"/>\
            <path d=\"{heater_target_path}\" class=\"heater-target\"/>\
            <g transform=\"translate({legend_x}, 40)\">\
                <rect x=\"0\" y=\"0\" width=\"150\" height=\"85\" fill=\"white\" stroke=\"#ccc\" stroke-width=\"1\"/>\
                <line x1=\"10\" y1=\"15\" x2=\"30\" y2=\"15\" class=\"peltier-line\"/>\
                <text x=\"35\" y=\"19\" class=\"legend\">Peltier</text>\
                <line x1=\"10\" y1=\"33\" x2=\"30\" y2=\"33\" class=\"peltier-target\"/>\
                <text x=\"35\" y=\"37\" class=\"legend\">Set Peltier</text>\
                <line x1=\"10\" y1=\"51\" x2=\"30\" y2=\"51\" class=\"heater-line\"/>\
                <text x=\"35\" y=\"55\" class=\"legend\">Heater</text>\
                <line x1=\"10\" y1=\"69\" x2=\"30\" y2=\"69\" class=\"heater-target\"/>\
                <text x=\"35\" y=\"73\" class=\"legend\">Set Heater</text>\
            </g>\
        </svg>",
        width = WIDTH,
        height = HEIGHT,
        title_x = WIDTH / 2.0,
        grid_lines = grid_lines,
        axes = axes,
        peltier_path = peltier_path,
        peltier_target_path = peltier_target_path,
        heater_path = heater_path,
        heater_target_path = heater_target_path,
        legend_x = WIDTH - 160.0
    );

    Ok(svg)
}

/// SVG path for one series, starting a new sub-path after each gap
fn line_path(frame: &Frame, log: &[SensorSample], value: impl Fn(&SensorSample) -> f64) -> String {
    let mut path = String::new();
    let mut pen_down = false;

    for sample in log {
        let y = value(sample);
        if !y.is_finite() {
            pen_down = false;
            continue;
        }
        let command = if pen_down { " L" } else { " M" };
        path.push_str(&format!(
            "{} {:.1} {:.1}",
            command,
            frame.x(sample.elapsed_seconds),
            frame.y(y)
        ));
        pen_down = true;
    }

    path.trim_start().to_string()
}

fn grid_lines(frame: &Frame) -> String {
    let mut grid = String::new();

    for i in 0..=10 {
        let time = frame.time_min + i as f64 * (frame.time_max - frame.time_min) / 10.0;
        let x = frame.x(time);
        grid.push_str(&format!(
            "<line x1=\"{:.1}\" y1=\"{:.1}\" x2=\"{:.1}\" y2=\"{:.1}\" class=\"grid-line\"/>",
            x,
            MARGIN,
            x,
            MARGIN + frame.plot_height
        ));
    }

    for i in 0..=8 {
        let temp = frame.temp_min + i as f64 * (frame.temp_max - frame.temp_min) / 8.0;
        let y = frame.y(temp);
        grid.push_str(&format!(
            "<line x1=\"{:.1}\" y1=\"{:.1}\" x2=\"{:.1}\" y2=\"{:.1}\" class=\"grid-line\"/>",
            MARGIN,
            y,
            MARGIN + frame.plot_width,
            y
        ));
    }

    grid
}

fn axes(frame: &Frame) -> String {
    let mut axes = String::new();

    axes.push_str(&format!(
        "<line x1=\"{:.1}\" y1=\"{:.1}\" x2=\"{:.1}\" y2=\"{:.1}\" class=\"axis-line\"/>",
        MARGIN,
        MARGIN,
        MARGIN,
        MARGIN + frame.plot_height
    ));
    axes.push_str(&format!(
        "<line x1=\"{:.1}\" y1=\"{:.1}\" x2=\"{:.1}\" y2=\"{:.1}\" class=\"axis-line\"/>",
        MARGIN,
        MARGIN + frame.plot_height,
        MARGIN + frame.plot_width,
        MARGIN + frame.plot_height
    ));

    for i in 0..=8 {
        let temp = frame.temp_min + i as f64 * (frame.temp_max - frame.temp_min) / 8.0;
        axes.push_str(&format!(
            "<text x=\"{:.1}\" y=\"{:.1}\" class=\"axis-tick\">{:.1}</text>",
            MARGIN - 20.0,
            frame.y(temp) + 3.0,
            temp
        ));
    }

    for i in 0..=10 {
        let time = frame.time_min + i as f64 * (frame.time_max - frame.time_min) / 10.0;
        axes.push_str(&format!(
            "<text x=\"{:.1}\" y=\"{:.1}\" class=\"axis-tick\">{:.0}</text>",
            frame.x(time),
            MARGIN + frame.plot_height + 15.0,
            time
        ));
    }

    axes.push_str(&format!(
        "<text x=\"{:.1}\" y=\"{:.1}\" class=\"axis-label\">Time (s)</text>",
        MARGIN + frame.plot_width / 2.0,
        MARGIN + frame.plot_height + 35.0
    ));
    axes.push_str(&format!(
        "<text x=\"15\" y=\"{:.1}\" class=\"axis-label\" transform=\"rotate(-90, 15, {:.1})\">Temperature (°C)</text>",
        MARGIN + frame.plot_height / 2.0,
        MARGIN + frame.plot_height / 2.0
    ));

    axes
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(elapsed_seconds: f64, ntc_temp: f64) -> SensorSample {
        SensorSample {
            elapsed_seconds,
            thermocouple_temp: 20.0 - elapsed_seconds,
            peltier_target: 4.0,
            ntc_temp,
            heater_target: 37.0,
        }
    }

    #[test]
    fn test_render_svg() {
        let log = vec![sample(0.0, 25.0), sample(0.5, 26.0), sample(1.0, 27.0)];
        let svg = render_svg(&log).unwrap();
        assert!(svg.starts_with("<svg"), "SVG should start with svg tag");
        assert!(svg.ends_with("</svg>"));
        assert_eq!(svg.matches("<path d=\"M").count(), 4);
        assert!(svg.contains("Set Heater"));
    }

    #[test]
    fn test_render_svg_breaks_on_missing_samples() {
        let log = vec![
            sample(0.0, 25.0),
            sample(0.5, f64::NAN),
            sample(1.0, 27.0),
            sample(1.5, 28.0),
        ];
        let path = line_path(
            &Frame {
                time_min: 0.0,
                time_max: 1.5,
                temp_min: 0.0,
                temp_max: 40.0,
                plot_width: 680.0,
                plot_height: 280.0,
            },
            &log,
            |s| s.ntc_temp,
        );
        assert_eq!(path.matches('M').count(), 2);
        assert_eq!(path.matches('L').count(), 1);
        assert!(!path.contains("NaN"));
    }

    #[test]
    fn test_render_svg_single_sample() {
        let svg = render_svg(&[sample(0.0, 25.0)]).unwrap();
        assert!(!svg.contains("NaN"), "degenerate ranges must not produce NaN coordinates");
    }

    #[test]
    fn test_render_svg_empty_log() {
        assert!(matches!(render_svg(&[]), Err(PersistenceError::EmptyLog)));
    }
}
