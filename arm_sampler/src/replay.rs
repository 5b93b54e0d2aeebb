//! Replay validation campaign.
//!
//! Drives the arm through stored poses of a [`TrajectoryDataset`] and
//! measures how far the end effector lands from where the dataset says it
//! should be. The target of a row is the robot-base origin plus the row's
//! base-relative position.

use std::path::{Path, PathBuf};

use nalgebra::Point3;
use rand::Rng;
use tracing::{debug, error, info, warn};

use crate::backend::ArmBody;
use crate::config::{ColliderPolicy, ReplayConfig};
use crate::dataset::TrajectoryDataset;
use crate::drive::{BlendProgress, JointDriveModel};
use crate::driver::{Campaign, Suspend, Tick};
use crate::errors::{CampaignError, ExportError};
use crate::recorder::{format_number, write_table};

pub const REPORT_HEADER: [&str; 2] = ["csv_index", "distance_m"];

/// Error bucket boundaries (m).
pub const NEAR_ERROR_M: f64 = 0.15;
pub const FAR_ERROR_M: f64 = 0.30;

#[derive(Debug, Clone, PartialEq)]
pub struct ValidationPoint {
    /// Row index in the loaded dataset.
    pub row_index: usize,
    pub error_m: f64,
    pub end_effector: Point3<f64>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ErrorStats {
    pub count: usize,
    pub mean_m: f64,
    /// error <= 0.15 m
    pub within_15cm: usize,
    /// 0.15 m < error <= 0.30 m
    pub between_15_30cm: usize,
    /// error > 0.30 m
    pub beyond_30cm: usize,
    pub max_m: f64,
}

impl ErrorStats {
    pub fn from_errors<I: IntoIterator<Item = f64>>(errors: I) -> Self {
        let mut stats = ErrorStats::default();
        let mut sum = 0.0;
        for error in errors {
            stats.count += 1;
            sum += error;
            stats.max_m = stats.max_m.max(error);
            if error <= NEAR_ERROR_M {
                stats.within_15cm += 1;
            } else if error <= FAR_ERROR_M {
                stats.between_15_30cm += 1;
            } else {
                stats.beyond_30cm += 1;
            }
        }
        if stats.count > 0 {
            stats.mean_m = sum / stats.count as f64;
        }
        stats
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplayState {
    Idle,
    /// Start the move to the `k`-th selected row.
    StartBlend { k: usize },
    Blending { k: usize },
    Measuring { k: usize },
    Exporting,
    Done,
    Cancelled,
}

pub struct ReplayCampaign<R> {
    config: ReplayConfig,
    dataset: TrajectoryDataset,
    output: PathBuf,
    rng: R,
    state: ReplayState,
    drive: JointDriveModel,
    selected: Vec<usize>,
    points: Vec<ValidationPoint>,
    stats: Option<ErrorStats>,
}

impl<R: Rng> ReplayCampaign<R> {
    pub fn new(
        config: ReplayConfig,
        dataset: TrajectoryDataset,
        rng: R,
        output: PathBuf,
    ) -> Result<Self, CampaignError> {
        config.validate().map_err(CampaignError::Config)?;
        Ok(Self {
            config,
            dataset,
            output,
            rng,
            state: ReplayState::Idle,
            drive: JointDriveModel::default(),
            selected: Vec::new(),
            points: Vec::new(),
            stats: None,
        })
    }

    /// Load the dataset at `path` and build a campaign over it. A dataset
    /// with a missing column never yields a campaign.
    pub fn from_path(config: ReplayConfig, path: &Path, rng: R, output: PathBuf) -> Result<Self, CampaignError> {
        let dataset = TrajectoryDataset::load(path)?;
        Self::new(config, dataset, rng, output)
    }

    pub fn state(&self) -> ReplayState {
        self.state
    }

    pub fn dataset(&self) -> &TrajectoryDataset {
        &self.dataset
    }

    /// Row indices chosen for this run, in replay order.
    pub fn selected(&self) -> &[usize] {
        &self.selected
    }

    pub fn points(&self) -> &[ValidationPoint] {
        &self.points
    }

    /// Available once the replay has finished.
    pub fn stats(&self) -> Option<ErrorStats> {
        self.stats
    }

    pub fn output_path(&self) -> &Path {
        &self.output
    }

    /// `(row index, error)` of every point above the report height threshold.
    pub fn report_rows(&self) -> Vec<(usize, f64)> {
        let axis = self.config.height_axis.index();
        self.points
            .iter()
            .filter(|point| point.end_effector[axis] > self.config.report_min_height)
            .map(|point| (point.row_index, point.error_m))
            .collect()
    }

    pub fn export_report(&self, path: &Path) -> Result<usize, ExportError> {
        let header: Vec<String> = REPORT_HEADER.iter().map(|h| h.to_string()).collect();
        let rows = self
            .report_rows()
            .into_iter()
            .map(|(index, error)| vec![index.to_string(), format_number(error)]);
        let written = write_table(path, ',', &header, rows)?;
        info!(
            "Saved {} of {} validation results to {}",
            written,
            self.points.len(),
            path.display()
        );
        Ok(written)
    }

    fn start<A: ArmBody + ?Sized>(&mut self, arm: &mut A) {
        self.drive = JointDriveModel::discover(arm);
        self.drive
            .initialize(arm, self.config.gains, ColliderPolicy::PerJoint);
        self.selected = self
            .dataset
            .select(&self.config.selection, self.config.max_samples, &mut self.rng);
        self.points.clear();
        self.stats = None;
        let summary = self.dataset.summary();
        info!(
            "Replay started: {} of {} rows selected ({} skipped at load)",
            self.selected.len(),
            summary.good,
            summary.skipped
        );
    }

    fn measure<A: ArmBody + ?Sized>(&mut self, arm: &A, k: usize) {
        let row_index = self.selected[k];
        let Some(row) = self.dataset.row(row_index) else {
            return;
        };
        let target = arm.base_origin() + row.relative;
        let end_effector = arm.end_effector();
        let error_m = nalgebra::distance(&end_effector, &target);
        if error_m <= self.config.tolerance_m {
            debug!("Row {}: error {:.4} m", row_index, error_m);
        } else {
            warn!(
                "Row {}: error {:.4} m exceeds tolerance {} m",
                row_index, error_m, self.config.tolerance_m
            );
        }
        self.points.push(ValidationPoint {
            row_index,
            error_m,
            end_effector,
        });
    }

    fn finish(&mut self) -> Result<Suspend, CampaignError> {
        self.state = ReplayState::Done;
        let stats = ErrorStats::from_errors(self.points.iter().map(|point| point.error_m));
        self.stats = Some(stats);
        info!(
            "Replay finished: {} samples, mean error {:.4} m, max {:.4} m",
            stats.count, stats.mean_m, stats.max_m
        );
        info!(
            "Error distribution: <= 15 cm: {}, 15-30 cm: {}, > 30 cm: {}",
            stats.within_15cm, stats.between_15_30cm, stats.beyond_30cm
        );
        match self.export_report(&self.output) {
            Ok(_) => Ok(Suspend::Done),
            Err(e) => {
                error!("Failed to export validation report to {}: {}", self.output.display(), e);
                Err(e.into())
            }
        }
    }
}

impl<A: ArmBody + ?Sized, R: Rng> Campaign<A> for ReplayCampaign<R> {
    fn advance(&mut self, arm: &mut A, tick: Tick) -> Result<Suspend, CampaignError> {
        loop {
            match self.state {
                ReplayState::Idle => {
                    self.start(arm);
                    self.state = if self.selected.is_empty() {
                        ReplayState::Exporting
                    } else {
                        ReplayState::StartBlend { k: 0 }
                    };
                }
                ReplayState::StartBlend { k } => {
                    let joints = self
                        .dataset
                        .row(self.selected[k])
                        .map(|row| row.joints.clone())
                        .unwrap_or_default();
                    self.drive.blend_to(&joints, self.config.blend_duration)?;
                    self.state = ReplayState::Blending { k };
                }
                ReplayState::Blending { k } => match self.drive.advance_blend(arm, tick.dt) {
                    BlendProgress::Running => return Ok(Suspend::NextTick),
                    BlendProgress::Finished | BlendProgress::Idle => {
                        self.state = ReplayState::Measuring { k };
                        return Ok(Suspend::Seconds(self.config.settle_time));
                    }
                },
                ReplayState::Measuring { k } => {
                    self.measure(arm, k);
                    self.state = if k + 1 < self.selected.len() {
                        ReplayState::StartBlend { k: k + 1 }
                    } else {
                        ReplayState::Exporting
                    };
                    return Ok(Suspend::Seconds(self.config.inter_sample_delay));
                }
                ReplayState::Exporting => return self.finish(),
                ReplayState::Done | ReplayState::Cancelled => return Ok(Suspend::Done),
            }
        }
    }

    fn cancel(&mut self, _arm: &mut A) {
        self.drive.abandon_blend();
        self.state = ReplayState::Cancelled;
        info!(
            "Replay cancelled after {} of {} samples, nothing exported",
            self.points.len(),
            self.selected.len()
        );
    }
}
