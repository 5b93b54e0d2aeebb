//! In-memory dataset of generation samples and its CSV export.
//!
//! Numbers are written with Rust's `Display` for `f64`, which is
//! locale-independent and the shortest representation that parses back to
//! the same value.

use std::path::Path;

use csv::WriterBuilder;
use nalgebra::Point3;
use tracing::{info, warn};

use crate::config::{GenerationSchema, HeightAxis};
use crate::errors::ExportError;

/// One settled trial of a generation campaign.
#[derive(Debug, Clone, PartialEq)]
pub struct DataPoint {
    pub joint_targets: Vec<f64>,
    pub end_effector: Point3<f64>,
    pub arm_position: Point3<f64>,
    /// Robot-base origin at settle time, used for base-relative output.
    pub base_origin: Point3<f64>,
    pub collision: bool,
}

/// Layout options for [`DatasetRecorder::export`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ExportFormat {
    pub schema: GenerationSchema,
    pub delimiter: char,
    pub relative_to_base: bool,
    /// Adds an `under_thresh` column: 1 when the end effector sits below
    /// this height (m) relative to the robot base.
    pub under_threshold: Option<f64>,
    pub height_axis: HeightAxis,
}

impl Default for ExportFormat {
    fn default() -> Self {
        Self {
            schema: GenerationSchema::Standard,
            delimiter: ',',
            relative_to_base: false,
            under_threshold: None,
            height_axis: HeightAxis::Z,
        }
    }
}

impl DataPoint {
    /// End-effector offset from the robot-base origin.
    pub fn relative_end_effector(&self) -> Point3<f64> {
        Point3::from(self.end_effector - self.base_origin)
    }

    pub fn is_under(&self, threshold: f64, axis: HeightAxis) -> bool {
        self.relative_end_effector()[axis.index()] < threshold
    }
}

#[derive(Debug, Clone, Default)]
pub struct DatasetRecorder {
    points: Vec<DataPoint>,
}

pub fn format_number(value: f64) -> String {
    value.to_string()
}

fn delimiter_byte(delimiter: char) -> Result<u8, ExportError> {
    if delimiter.is_ascii() {
        Ok(delimiter as u8)
    } else {
        Err(ExportError::InvalidDelimiter(delimiter))
    }
}

/// Write `header` and `rows` to `path`, replacing any existing file.
pub fn write_table<I>(path: &Path, delimiter: char, header: &[String], rows: I) -> Result<usize, ExportError>
where
    I: IntoIterator<Item = Vec<String>>,
{
    let delimiter = delimiter_byte(delimiter)?;
    if path.exists() {
        warn!("Overwriting existing file {}", path.display());
    }
    let mut writer = WriterBuilder::new()
        .delimiter(delimiter)
        .flexible(false)
        .from_path(path)?;
    writer.write_record(header)?;
    let mut written = 0;
    for row in rows {
        writer.write_record(&row)?;
        written += 1;
    }
    writer.flush()?;
    Ok(written)
}

impl DatasetRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn append(&mut self, point: DataPoint) {
        self.points.push(point);
    }

    pub fn points(&self) -> &[DataPoint] {
        &self.points
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn clear(&mut self) {
        self.points.clear();
    }

    /// Column names for `joint_count` joints.
    pub fn header(format: &ExportFormat, joint_count: usize) -> Vec<String> {
        let mut header = Vec::with_capacity(joint_count + 8);
        if format.schema == GenerationSchema::WithArmPosition {
            header.extend(["arm_x", "arm_y", "arm_z"].map(String::from));
        }
        header.extend((1..=joint_count).map(|j| format!("j{}", j)));
        header.extend(["end_x", "end_y", "end_z"].map(String::from));
        if format.under_threshold.is_some() {
            header.push("under_thresh".to_string());
        }
        header.push("collision".to_string());
        header
    }

    fn row(point: &DataPoint, format: &ExportFormat, joint_count: usize) -> Vec<String> {
        let mut row = Vec::with_capacity(joint_count + 8);
        if format.schema == GenerationSchema::WithArmPosition {
            row.extend(point.arm_position.iter().map(|&v| format_number(v)));
        }
        // pad or cut so every row matches the header
        row.extend(
            (0..joint_count).map(|j| format_number(point.joint_targets.get(j).copied().unwrap_or(0.0))),
        );
        let end = if format.relative_to_base {
            point.relative_end_effector()
        } else {
            point.end_effector
        };
        row.extend(end.iter().map(|&v| format_number(v)));
        if let Some(threshold) = format.under_threshold {
            row.push(if point.is_under(threshold, format.height_axis) { "1" } else { "0" }.to_string());
        }
        row.push(if point.collision { "1" } else { "0" }.to_string());
        row
    }

    /// Write every recorded point to `path`. The recorder keeps its points,
    /// so a failed export can be retried.
    pub fn export(&self, path: &Path, format: &ExportFormat) -> Result<usize, ExportError> {
        let joint_count = self
            .points
            .iter()
            .map(|point| point.joint_targets.len())
            .max()
            .unwrap_or(0);
        self.export_with_joints(path, format, joint_count)
    }

    /// Like [`export`](Self::export) but with an explicit joint column count,
    /// so an empty dataset still gets a complete header.
    pub fn export_with_joints(
        &self,
        path: &Path,
        format: &ExportFormat,
        joint_count: usize,
    ) -> Result<usize, ExportError> {
        let header = Self::header(format, joint_count);
        let rows = self
            .points
            .iter()
            .map(|point| Self::row(point, format, joint_count));
        let written = write_table(path, format.delimiter, &header, rows)?;
        info!("Saved {} data points to {}", written, path.display());
        Ok(written)
    }
}
