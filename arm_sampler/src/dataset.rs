//! Trajectory dataset loader for replay validation.
//!
//! Expected format (comma or semicolon separated, header required):
//! - Required columns, resolved by name: `x_rel, y_rel, z_rel, j1, j2, j3, j4`
//! - Any other columns are ignored, in any order
//!
//! A missing required column fails the whole load. A row that is too short
//! or holds an unparseable number is skipped and counted.

use std::collections::HashMap;
use std::io::Read;
use std::path::Path;

use csv::ReaderBuilder;
use nalgebra::Vector3;
use rand::Rng;
use tracing::{debug, info, warn};

use crate::config::SampleSelection;
use crate::errors::DatasetError;

pub const POSITION_COLUMNS: [&str; 3] = ["x_rel", "y_rel", "z_rel"];
pub const JOINT_COLUMNS: [&str; 4] = ["j1", "j2", "j3", "j4"];

/// One stored pose: where the end effector was, relative to the robot base,
/// and the joint targets that put it there.
#[derive(Debug, Clone, PartialEq)]
pub struct TrajectoryRow {
    pub relative: Vector3<f64>,
    pub joints: Vec<f64>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoadSummary {
    pub good: usize,
    pub skipped: usize,
}

#[derive(Debug, Clone, Default)]
pub struct TrajectoryDataset {
    rows: Vec<TrajectoryRow>,
    summary: LoadSummary,
}

fn parse_field(record: &csv::StringRecord, idx: usize) -> Option<f64> {
    record.get(idx).and_then(|v| v.parse::<f64>().ok())
}

/// Empty lines after the header line.
fn blank_data_lines(text: &str) -> usize {
    text.lines()
        .map(|line| line.trim_end_matches('\r'))
        .skip_while(|line| line.is_empty())
        .skip(1)
        .filter(|line| line.is_empty())
        .count()
}

impl TrajectoryDataset {
    pub fn load(path: &Path) -> Result<Self, DatasetError> {
        info!("Loading trajectory dataset from {}", path.display());
        let file = std::fs::File::open(path)?;
        Self::from_reader(file)
    }

    pub fn from_reader<R: Read>(mut reader: R) -> Result<Self, DatasetError> {
        let mut text = String::new();
        reader.read_to_string(&mut text)?;
        Self::parse_str(&text)
    }

    pub fn parse_str(text: &str) -> Result<Self, DatasetError> {
        let text = text.strip_prefix('\u{feff}').unwrap_or(text);
        if text.trim().is_empty() {
            return Err(DatasetError::Empty);
        }
        // Either separator may appear on any line; none of the fields are quoted text.
        let normalized = text.replace(';', ",");

        let mut csv_reader = ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .trim(csv::Trim::All)
            .from_reader(normalized.as_bytes());

        let headers = csv_reader.headers()?.clone();
        // a repeated column name resolves to its first occurrence
        let mut col_map: HashMap<&str, usize> = HashMap::new();
        for (i, h) in headers.iter().enumerate() {
            col_map.entry(h).or_insert(i);
        }

        let mut position_idx = [0usize; 3];
        let mut joint_idx = [0usize; 4];
        for (slot, required) in POSITION_COLUMNS
            .iter()
            .chain(JOINT_COLUMNS.iter())
            .enumerate()
        {
            let idx = *col_map.get(required).ok_or_else(|| DatasetError::MissingColumn {
                column: required.to_string(),
                header: headers.iter().collect::<Vec<_>>().join(","),
            })?;
            if slot < 3 {
                position_idx[slot] = idx;
            } else {
                joint_idx[slot - 3] = idx;
            }
        }
        let max_idx = position_idx
            .iter()
            .chain(joint_idx.iter())
            .copied()
            .max()
            .unwrap_or(0);

        let mut rows = Vec::new();
        // the reader drops empty lines on its own; they still count as skipped
        let mut skipped = blank_data_lines(&normalized);
        for (line, result) in csv_reader.records().enumerate() {
            // +2: one for the header, one for 1-based numbering
            let csv_line = line + 2;
            let record = match result {
                Ok(r) => r,
                Err(e) => {
                    debug!("Skipping line {}: {}", csv_line, e);
                    skipped += 1;
                    continue;
                }
            };
            if record.len() <= max_idx {
                debug!("Skipping line {}: {} fields, need {}", csv_line, record.len(), max_idx + 1);
                skipped += 1;
                continue;
            }

            let position: Option<Vec<f64>> = position_idx.iter().map(|&i| parse_field(&record, i)).collect();
            let joints: Option<Vec<f64>> = joint_idx.iter().map(|&i| parse_field(&record, i)).collect();
            match (position, joints) {
                (Some(p), Some(joints)) => rows.push(TrajectoryRow {
                    relative: Vector3::new(p[0], p[1], p[2]),
                    joints,
                }),
                _ => {
                    debug!("Skipping line {}: invalid number", csv_line);
                    skipped += 1;
                }
            }
        }

        let summary = LoadSummary {
            good: rows.len(),
            skipped,
        };
        if skipped > 0 {
            warn!("Dataset loaded: {} good rows, {} skipped", summary.good, summary.skipped);
        } else {
            info!("Dataset loaded: {} good rows, {} skipped", summary.good, summary.skipped);
        }
        Ok(Self { rows, summary })
    }

    pub fn rows(&self) -> &[TrajectoryRow] {
        &self.rows
    }

    pub fn row(&self, index: usize) -> Option<&TrajectoryRow> {
        self.rows.get(index)
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn summary(&self) -> LoadSummary {
        self.summary
    }

    /// Up to `max` distinct row indices drawn uniformly without replacement.
    pub fn select_sample<R: Rng + ?Sized>(&self, max: usize, rng: &mut R) -> Vec<usize> {
        let amount = max.min(self.rows.len());
        if amount == 0 {
            return Vec::new();
        }
        rand::seq::index::sample(rng, self.rows.len(), amount).into_vec()
    }

    /// Index of the row whose stored relative position is closest to `target`.
    pub fn nearest_row(&self, target: &Vector3<f64>) -> Option<usize> {
        self.rows
            .iter()
            .enumerate()
            .map(|(i, row)| (i, (row.relative - target).norm_squared()))
            .min_by(|a, b| a.1.total_cmp(&b.1))
            .map(|(i, _)| i)
    }

    /// Row indices to replay under `selection`, at most `max` of them.
    pub fn select<R: Rng + ?Sized>(&self, selection: &SampleSelection, max: usize, rng: &mut R) -> Vec<usize> {
        match selection {
            SampleSelection::UniformRandom => self.select_sample(max, rng),
            SampleSelection::Nearest { targets } => targets
                .iter()
                .filter_map(|t| self.nearest_row(&Vector3::new(t[0], t[1], t[2])))
                .take(max)
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use std::collections::HashSet;

    const HEADER: &str = "x_rel,y_rel,z_rel,j1,j2,j3,j4";

    #[test]
    fn test_columns_resolved_by_name() {
        let csv = "j4,extra,j1,z_rel,j2,y_rel,x_rel,j3\n4,skip,1,0.3,2,0.2,0.1,3\n";
        let dataset = TrajectoryDataset::parse_str(csv).unwrap();
        assert_eq!(dataset.len(), 1);
        let row = &dataset.rows()[0];
        assert_eq!(row.relative, Vector3::new(0.1, 0.2, 0.3));
        assert_eq!(row.joints, vec![1.0, 2.0, 3.0, 4.0]);
    }

    #[test]
    fn test_missing_column_is_fatal() {
        let csv = "x_rel,y_rel,z_rel,j1,j2,j4\n0,0,0,1,2,4\n";
        match TrajectoryDataset::parse_str(csv) {
            Err(DatasetError::MissingColumn { column, header }) => {
                assert_eq!(column, "j3");
                assert_eq!(header, "x_rel,y_rel,z_rel,j1,j2,j4");
            }
            other => panic!("expected missing column, got {:?}", other),
        }
    }

    #[test]
    fn test_short_and_bad_rows_are_skipped() {
        let csv = format!("{}\n0.1,0.2,0.3,1,2,3,4\n0.1,0.2,0.3,1,2\n0.1,abc,0.3,1,2,3,4\n0,0,0,0,0,0,0\n", HEADER);
        let dataset = TrajectoryDataset::parse_str(&csv).unwrap();
        assert_eq!(dataset.summary(), LoadSummary { good: 2, skipped: 2 });
    }

    #[test]
    fn test_blank_lines_are_counted_as_skipped() {
        let csv = format!("\n{}\n0.1,0.2,0.3,1,2,3,4\n\n\r\n0,0,0,0,0,0,0\n\n", HEADER);
        let dataset = TrajectoryDataset::parse_str(&csv).unwrap();
        assert_eq!(dataset.summary(), LoadSummary { good: 2, skipped: 3 });
    }

    #[test]
    fn test_duplicate_column_uses_first() {
        let csv = format!("{},j1\n0,0,0,1,2,3,4,99\n", HEADER);
        let dataset = TrajectoryDataset::parse_str(&csv).unwrap();
        assert_eq!(dataset.rows()[0].joints, vec![1.0, 2.0, 3.0, 4.0]);
    }

    #[test]
    fn test_semicolons_and_mixed_separators() {
        let csv = "x_rel;y_rel;z_rel;j1;j2;j3;j4\n0.1;0.2;0.3;1;2;3;4\n0.5,0.6,0.7;5;6;7;8\n";
        let dataset = TrajectoryDataset::parse_str(csv).unwrap();
        assert_eq!(dataset.len(), 2);
        assert_eq!(dataset.rows()[1].joints, vec![5.0, 6.0, 7.0, 8.0]);
    }

    #[test]
    fn test_bom_and_whitespace() {
        let csv = format!("\u{feff}{}\r\n 0.1 , 0.2 ,0.3, 1,2,3,4 \r\n", HEADER);
        let dataset = TrajectoryDataset::parse_str(&csv).unwrap();
        assert_eq!(dataset.len(), 1);
        assert_eq!(dataset.rows()[0].relative.x, 0.1);
    }

    #[test]
    fn test_empty_input() {
        assert!(matches!(TrajectoryDataset::parse_str(""), Err(DatasetError::Empty)));
        let header_only = TrajectoryDataset::parse_str(HEADER).unwrap();
        assert!(header_only.is_empty());
    }

    #[test]
    fn test_sample_is_distinct_and_bounded() {
        let mut csv = String::from(HEADER);
        for i in 0..20 {
            csv.push_str(&format!("\n{},0,0,0,0,0,0", i));
        }
        let dataset = TrajectoryDataset::parse_str(&csv).unwrap();
        let mut rng = StdRng::seed_from_u64(7);

        let picked = dataset.select_sample(8, &mut rng);
        assert_eq!(picked.len(), 8);
        assert_eq!(picked.iter().collect::<HashSet<_>>().len(), 8);
        assert!(picked.iter().all(|&i| i < 20));

        assert_eq!(dataset.select_sample(500, &mut rng).len(), 20);
    }

    #[test]
    fn test_nearest_selection() {
        let csv = format!("{}\n0,0,0,1,1,1,1\n1,0,0,2,2,2,2\n0,1,0,3,3,3,3\n", HEADER);
        let dataset = TrajectoryDataset::parse_str(&csv).unwrap();
        let selection = SampleSelection::Nearest {
            targets: vec![[0.9, 0.1, 0.0], [0.1, 0.8, 0.0]],
        };
        let mut rng = StdRng::seed_from_u64(0);
        assert_eq!(dataset.select(&selection, 10, &mut rng), vec![1, 2]);
        assert_eq!(dataset.select(&selection, 1, &mut rng), vec![1]);
    }
}
