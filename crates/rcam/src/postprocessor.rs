use crate::geometry::{approx_eq, round_to_precision, Point3, PRECISION};
use crate::job::{Job, Toolpath};
use crate::types::{ComputedPoint, SpindleDirection, Units};
use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::Path;
use tracing::{info, warn};

const MM_PER_INCH: f64 = 25.4;

/// G-code as individual lines.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GCode {
    pub lines: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Motion {
    Rapid,
    Feed,
}

/// Stateful G-code serializer.
///
/// Tracks position, feed, spindle and motion mode so that repeated words are
/// left out. The stream always ends with `M5` and `M2`: either through
/// [`GCodeWriter::finish`] or, failing that, when the writer is dropped.
pub struct GCodeWriter<W: Write> {
    out: Option<W>,
    units: Units,
    position: Point3,
    rapid_height: f64,
    base_feed_rate: f64,
    feed_rate: f64,
    plunge_scale: f64,
    spindle_rpm: u32,
    spindle_direction: Option<SpindleDirection>,
    motion: Option<Motion>,
}

impl<W: Write> GCodeWriter<W> {
    /// Open a stream in absolute positioning with the given output units.
    pub fn new(out: W, units: Units) -> io::Result<Self> {
        let mut writer = Self {
            out: Some(out),
            units,
            position: Point3::ZERO,
            rapid_height: 0.0,
            base_feed_rate: 0.0,
            feed_rate: 0.0,
            plunge_scale: 1.0,
            spindle_rpm: 0,
            spindle_direction: None,
            motion: None,
        };
        writer.write_line("G90")?;
        writer.write_line(match units {
            Units::Metric => "G21",
            Units::Imperial => "G20",
        })?;
        Ok(writer)
    }

    pub fn set_rapid_height(&mut self, rapid_height: f64) {
        self.rapid_height = rapid_height;
    }

    pub fn set_plunge_scale(&mut self, plunge_scale: f64) {
        self.plunge_scale = plunge_scale;
    }

    /// Cutting feed rate in mm/min, emitted only when it changes.
    pub fn set_feed_rate(&mut self, rate: f64) -> io::Result<()> {
        let rate = rate.max(0.0);
        if approx_eq(rate, self.base_feed_rate) {
            return Ok(());
        }
        self.base_feed_rate = rate;
        self.emit_feed_rate(rate)
    }

    pub fn set_spindle(&mut self, rpm: u32, direction: SpindleDirection) -> io::Result<()> {
        if rpm == 0 {
            // a stopped spindle needs M3/M4 again to restart
            self.spindle_rpm = 0;
            self.spindle_direction = None;
            return self.write_line("M5");
        }
        if rpm == self.spindle_rpm {
            return Ok(());
        }

        let mut line = format!("S{rpm}");
        if self.spindle_direction != Some(direction) {
            line.push_str(match direction {
                SpindleDirection::Clockwise => " M3",
                SpindleDirection::CounterClockwise => " M4",
            });
        }
        self.spindle_rpm = rpm;
        self.spindle_direction = Some(direction);
        self.write_line(&line)
    }

    /// Move to `target`, at rapid speed when the move is safe to do so.
    ///
    /// Downward plunges run at the plunge-scaled feed rate; the base rate is
    /// restored on the next other feed move.
    pub fn move_to(&mut self, target: Point3) -> io::Result<()> {
        let motion = if self.is_rapid(target) {
            Motion::Rapid
        } else {
            Motion::Feed
        };

        if motion == Motion::Feed {
            let rate = if self.is_down_move(target) {
                self.base_feed_rate * self.plunge_scale
            } else {
                self.base_feed_rate
            };
            if !approx_eq(rate, self.feed_rate) {
                self.emit_feed_rate(rate)?;
            }
        }

        let coordinates = format!(
            "X{} Y{} Z{}",
            self.length(target.x),
            self.length(target.y),
            self.length(target.z)
        );
        let line = if self.motion == Some(motion) {
            coordinates
        } else {
            let word = match motion {
                Motion::Rapid => "G0",
                Motion::Feed => "G1",
            };
            format!("{word} {coordinates}")
        };
        self.motion = Some(motion);
        self.position = target;
        self.write_line(&line)
    }

    /// Wait for `seconds`.
    pub fn dwell(&mut self, seconds: f64) -> io::Result<()> {
        let line = format!("G4 P{}", number(seconds.max(0.0)));
        self.write_line(&line)
    }

    /// Stop the spindle, end the program and hand back the output.
    pub fn finish(mut self) -> io::Result<W> {
        self.close()?;
        self.out
            .take()
            .ok_or_else(|| io::Error::other("G-code stream already closed"))
    }

    fn close(&mut self) -> io::Result<()> {
        self.write_line("M5")?;
        self.write_line("M2")?;
        if let Some(out) = self.out.as_mut() {
            out.flush()?;
        }
        Ok(())
    }

    fn is_rapid(&self, target: Point3) -> bool {
        approx_eq(target.z, self.rapid_height)
            || (target.z > self.rapid_height && !self.is_down_move(target))
            || self.is_up_move(target)
    }

    fn is_down_move(&self, target: Point3) -> bool {
        self.position.same_xy(&target) && target.z < self.position.z - crate::geometry::EPSILON
    }

    fn is_up_move(&self, target: Point3) -> bool {
        self.position.same_xy(&target) && target.z > self.position.z + crate::geometry::EPSILON
    }

    fn emit_feed_rate(&mut self, rate: f64) -> io::Result<()> {
        self.feed_rate = rate;
        self.motion = Some(Motion::Feed);
        let line = format!("G1 F{}", self.length(rate));
        self.write_line(&line)
    }

    /// Millimetres in output units.
    fn length(&self, value: f64) -> String {
        match self.units {
            Units::Metric => number(value),
            Units::Imperial => number(value / MM_PER_INCH),
        }
    }

    fn write_line(&mut self, line: &str) -> io::Result<()> {
        let out = self
            .out
            .as_mut()
            .ok_or_else(|| io::Error::other("G-code stream already closed"))?;
        writeln!(out, "{}", line.to_uppercase())
    }
}

impl<W: Write> Drop for GCodeWriter<W> {
    fn drop(&mut self) {
        if self.out.is_some() {
            if let Err(err) = self.close() {
                warn!("Failed to close G-code stream: {}", err);
            }
        }
    }
}

fn number(value: f64) -> String {
    format!("{:.*}", PRECISION as usize, round_to_precision(value))
}

/// Output settings of a G-code export.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExportOptions {
    pub units: Units,
}

/// Stream `points` through `writer`, one move per point.
///
/// Zero dwells are left out.
pub fn write_points<W: Write>(writer: &mut GCodeWriter<W>, points: &[ComputedPoint]) -> io::Result<()> {
    for point in points {
        writer.set_rapid_height(point.state.rapid_height);
        writer.set_plunge_scale(point.state.plunge_scale);
        writer.set_spindle(point.state.spindle_rpm, point.state.spindle_direction)?;
        writer.set_feed_rate(point.state.feed_rate)?;
        writer.move_to(point.position)?;
        if point.dwell > 0.0 {
            writer.dwell(point.dwell)?;
        }
    }
    Ok(())
}

/// Render a computed toolpath as G-code lines.
pub fn post_process(toolpath: &Toolpath, options: &ExportOptions) -> Result<GCode> {
    let mut writer = GCodeWriter::new(Vec::new(), options.units).context("open G-code buffer")?;
    write_points(&mut writer, &toolpath.points).context("write toolpath")?;
    let bytes = writer.finish().context("close G-code buffer")?;
    let text = String::from_utf8(bytes).context("G-code is not valid UTF-8")?;
    Ok(GCode {
        lines: text.lines().map(str::to_string).collect(),
    })
}

/// Write the computed toolpath of `job` to `path`.
pub fn export_job<P: AsRef<Path>>(job: &Job, path: P, options: &ExportOptions) -> Result<()> {
    let path = path.as_ref();
    let toolpath = job
        .computed
        .as_ref()
        .ok_or_else(|| anyhow!("job {} has not been computed", job.name))?;

    let file = File::create(path).with_context(|| format!("create G-code file {}", path.display()))?;
    let mut writer = GCodeWriter::new(BufWriter::new(file), options.units)
        .with_context(|| format!("write G-code file {}", path.display()))?;
    write_points(&mut writer, &toolpath.points)
        .with_context(|| format!("write G-code file {}", path.display()))?;
    writer
        .finish()
        .with_context(|| format!("close G-code file {}", path.display()))?;

    info!(
        "Exported job {} to {} ({} point(s))",
        job.name,
        path.display(),
        toolpath.points.len()
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::MachineState;

    fn output(writer: GCodeWriter<Vec<u8>>) -> Vec<String> {
        let bytes = writer.finish().expect("finish");
        String::from_utf8(bytes)
            .expect("utf8")
            .lines()
            .map(str::to_string)
            .collect()
    }

    #[test]
    fn test_header_and_footer() {
        let writer = GCodeWriter::new(Vec::new(), Units::Metric).unwrap();
        assert_eq!(output(writer), vec!["G90", "G21", "M5", "M2"]);
        let writer = GCodeWriter::new(Vec::new(), Units::Imperial).unwrap();
        assert_eq!(output(writer)[1], "G20");
    }

    #[test]
    fn test_drop_closes_stream() {
        let mut buffer = Vec::new();
        {
            let mut writer = GCodeWriter::new(&mut buffer, Units::Metric).unwrap();
            writer.move_to(Point3::new(1.0, 2.0, 0.0)).unwrap();
        }
        let text = String::from_utf8(buffer).unwrap();
        assert!(text.ends_with("M5\nM2\n"), "unexpected tail: {text}");
    }

    #[test]
    fn test_modal_motion_word() {
        let mut writer = GCodeWriter::new(Vec::new(), Units::Metric).unwrap();
        writer.set_rapid_height(5.0);
        writer.move_to(Point3::new(0.0, 0.0, 5.0)).unwrap();
        writer.move_to(Point3::new(10.0, 0.0, 5.0)).unwrap();
        writer.move_to(Point3::new(10.0, 0.0, -1.0)).unwrap();
        let lines = output(writer);
        assert_eq!(lines[2], "G0 X0.00000 Y0.00000 Z5.00000");
        assert_eq!(lines[3], "X10.00000 Y0.00000 Z5.00000");
        assert_eq!(lines[4], "G1 X10.00000 Y0.00000 Z-1.00000");
    }

    #[test]
    fn test_plunge_uses_scaled_feed() {
        let mut writer = GCodeWriter::new(Vec::new(), Units::Metric).unwrap();
        writer.set_rapid_height(5.0);
        writer.set_plunge_scale(0.5);
        writer.move_to(Point3::new(0.0, 0.0, 5.0)).unwrap();
        writer.set_feed_rate(1000.0).unwrap();
        writer.move_to(Point3::new(0.0, 0.0, -2.0)).unwrap();
        writer.move_to(Point3::new(5.0, 0.0, -2.0)).unwrap();
        let lines = output(writer);
        assert_eq!(
            &lines[3..8],
            &[
                "G1 F1000.00000",
                "G1 F500.00000",
                "X0.00000 Y0.00000 Z-2.00000",
                "G1 F1000.00000",
                "X5.00000 Y0.00000 Z-2.00000",
            ]
        );
    }

    #[test]
    fn test_spindle_words() {
        let mut writer = GCodeWriter::new(Vec::new(), Units::Metric).unwrap();
        writer.set_spindle(12000, SpindleDirection::Clockwise).unwrap();
        writer.set_spindle(12000, SpindleDirection::Clockwise).unwrap();
        writer.set_spindle(8000, SpindleDirection::Clockwise).unwrap();
        writer.set_spindle(8000, SpindleDirection::CounterClockwise).unwrap();
        writer.set_spindle(9000, SpindleDirection::CounterClockwise).unwrap();
        writer.set_spindle(0, SpindleDirection::Clockwise).unwrap();
        let lines = output(writer);
        assert_eq!(&lines[2..6], &["S12000 M3", "S8000", "S9000 M4", "M5"]);
    }

    #[test]
    fn test_restart_after_stop_repeats_direction() {
        let mut writer = GCodeWriter::new(Vec::new(), Units::Metric).unwrap();
        writer.set_spindle(12000, SpindleDirection::Clockwise).unwrap();
        writer.set_spindle(0, SpindleDirection::Clockwise).unwrap();
        writer.set_spindle(12000, SpindleDirection::Clockwise).unwrap();
        let lines = output(writer);
        assert_eq!(&lines[2..5], &["S12000 M3", "M5", "S12000 M3"]);
    }

    #[test]
    fn test_negative_zero_and_imperial_scale() {
        let mut writer = GCodeWriter::new(Vec::new(), Units::Imperial).unwrap();
        writer.set_rapid_height(5.0);
        writer.move_to(Point3::new(25.4, -0.000001, 5.0)).unwrap();
        writer.dwell(1.5).unwrap();
        let lines = output(writer);
        assert_eq!(lines[2], "G0 X1.00000 Y0.00000 Z0.19685");
        assert_eq!(lines[3], "G4 P1.50000");
    }

    #[test]
    fn test_zero_dwell_is_skipped_when_writing_points() {
        let zero = MachineState::default();
        let points = vec![
            ComputedPoint::new(Point3::new(0.0, 0.0, 5.0), zero),
            ComputedPoint::new(Point3::new(0.0, 0.0, -1.0), zero).with_dwell(0.0),
            ComputedPoint::new(Point3::new(0.0, 0.0, -2.0), zero).with_dwell(2.0),
        ];
        let toolpath = Toolpath {
            status: crate::types::ComputeStatus::Finished,
            points,
        };
        let gcode = post_process(&toolpath, &ExportOptions::default()).unwrap();
        let dwells: Vec<&String> = gcode.lines.iter().filter(|l| l.starts_with("G4")).collect();
        assert_eq!(dwells, vec!["G4 P2.00000"]);
    }
}
