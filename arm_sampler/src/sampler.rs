//! Generation campaign: random joint configurations, settled and recorded.
//!
//! Each trial draws every actuated joint uniformly within its limits, applies
//! the joints one after another, waits for the arm to settle and records the
//! resulting end-effector position together with a collision flag. A trial
//! that collided teleports the arm back to its starting pose. The campaign
//! aborts early when the end effector stops moving across a full window of
//! trials, and always finishes by exporting what it collected.

use std::path::{Path, PathBuf};

use rand::Rng;
use tracing::{debug, error, info, warn};

use crate::backend::{ArmBody, ArmPose, JointLimits, JointVelocity};
use crate::blockage::BlockageDetector;
use crate::collision::CollisionMonitor;
use crate::config::SamplerConfig;
use crate::drive::JointDriveModel;
use crate::driver::{Campaign, Suspend, Tick};
use crate::errors::{CampaignError, ExportError};
use crate::recorder::{DataPoint, DatasetRecorder, ExportFormat};

/// Range used for joints that report unbounded limits.
const UNBOUNDED_RANGE: (f64, f64) = (-180.0, 180.0);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrialStep {
    /// Commanding the joint in this slot.
    Applying { slot: usize },
    /// All joints commanded; waiting for physics to settle.
    Settling,
    /// Settled; read collisions and record the data point.
    Measuring,
    /// Inter-trial pause.
    Cooldown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SamplerState {
    Idle,
    Sampling { trial: usize, step: TrialStep },
    /// Waiting out the post-collision reset delay.
    Resetting { trial: usize },
    Exporting,
    Done,
    Cancelled,
}

pub struct GenerationCampaign<R> {
    config: SamplerConfig,
    output: PathBuf,
    rng: R,
    state: SamplerState,
    drive: JointDriveModel,
    monitor: Option<CollisionMonitor>,
    blockage: BlockageDetector,
    recorder: DatasetRecorder,
    initial_pose: Option<ArmPose>,
    initial_positions: Vec<f64>,
    last_reset_positions: Option<Vec<f64>>,
    last_reset_velocities: Option<Vec<JointVelocity>>,
    trial_targets: Vec<f64>,
    resets: usize,
    aborted: bool,
}

impl<R: Rng> GenerationCampaign<R> {
    pub fn new(config: SamplerConfig, rng: R, output: PathBuf) -> Result<Self, CampaignError> {
        config.validate().map_err(CampaignError::Config)?;
        let window = config.window_size;
        Ok(Self {
            config,
            output,
            rng,
            state: SamplerState::Idle,
            drive: JointDriveModel::default(),
            monitor: None,
            blockage: BlockageDetector::new(window),
            recorder: DatasetRecorder::new(),
            initial_pose: None,
            initial_positions: Vec::new(),
            last_reset_positions: None,
            last_reset_velocities: None,
            trial_targets: Vec::new(),
            resets: 0,
            aborted: false,
        })
    }

    pub fn state(&self) -> SamplerState {
        self.state
    }

    pub fn points(&self) -> &[DataPoint] {
        self.recorder.points()
    }

    pub fn recorder(&self) -> &DatasetRecorder {
        &self.recorder
    }

    pub fn output_path(&self) -> &Path {
        &self.output
    }

    /// Joint positions read when the campaign started.
    pub fn initial_positions(&self) -> &[f64] {
        &self.initial_positions
    }

    /// Joint positions read right after the most recent collision reset.
    pub fn last_reset_positions(&self) -> Option<&[f64]> {
        self.last_reset_positions.as_deref()
    }

    /// Velocity of every joint, root included, read right after the most
    /// recent collision reset.
    pub fn last_reset_velocities(&self) -> Option<&[JointVelocity]> {
        self.last_reset_velocities.as_deref()
    }

    pub fn resets(&self) -> usize {
        self.resets
    }

    /// `true` when sampling stopped because the arm was blocked.
    pub fn aborted(&self) -> bool {
        self.aborted
    }

    pub fn drive(&self) -> &JointDriveModel {
        &self.drive
    }

    fn export_format(&self) -> ExportFormat {
        ExportFormat {
            schema: self.config.schema,
            delimiter: self.config.delimiter,
            relative_to_base: self.config.relative_to_base,
            under_threshold: self.config.under_threshold_m,
            height_axis: self.config.height_axis,
        }
    }

    /// Write the collected points to `path`. Used to retry a failed export.
    pub fn export_to(&self, path: &Path) -> Result<usize, ExportError> {
        self.recorder
            .export_with_joints(path, &self.export_format(), self.drive.actuated_count())
    }

    fn start<A: ArmBody + ?Sized>(&mut self, arm: &mut A) {
        self.drive = JointDriveModel::discover(arm);
        self.initial_pose = Some(ArmPose::capture(arm));
        self.initial_positions = self.drive.positions(arm);
        self.drive
            .initialize(arm, self.config.gains, self.config.collider_policy);

        let monitor = CollisionMonitor::new(arm.joint_count());
        arm.attach_collision_sink(monitor.sink());
        monitor.reset_all();
        self.monitor = Some(monitor);

        self.blockage = BlockageDetector::new(self.config.window_size);
        self.recorder.clear();
        self.resets = 0;
        self.aborted = false;
        self.last_reset_positions = None;
        self.last_reset_velocities = None;
        info!(
            "Generation campaign started: {} trials over {} actuated joints, output {}",
            self.config.trials,
            self.drive.actuated_count(),
            self.output.display()
        );
    }

    /// Uniform draw within the slot's limits.
    fn draw(&mut self, slot: usize) -> f64 {
        let Some(limits) = self.drive.limits(slot) else {
            return 0.0;
        };
        let mut range = JointLimits::new(
            if limits.lower.is_finite() { limits.lower } else { UNBOUNDED_RANGE.0 },
            if limits.upper.is_finite() { limits.upper } else { UNBOUNDED_RANGE.1 },
        );
        // finite bounds can still be too far apart to sample between
        if !range.span().is_finite() {
            range = JointLimits::new(UNBOUNDED_RANGE.0, UNBOUNDED_RANGE.1);
        }
        if range.span() <= 0.0 {
            range.lower
        } else {
            self.rng.random_range(range.lower..=range.upper)
        }
    }

    /// Read and clear this trial's collisions, then record the data point.
    fn measure<A: ArmBody + ?Sized>(&mut self, arm: &A, trial: usize) -> bool {
        let collided_joints = self
            .monitor
            .as_ref()
            .map(|monitor| monitor.drain())
            .unwrap_or_default();
        let collision = !collided_joints.is_empty();
        let end_effector = arm.end_effector();

        self.recorder.append(DataPoint {
            joint_targets: std::mem::take(&mut self.trial_targets),
            end_effector,
            arm_position: arm.arm_position(),
            base_origin: arm.base_origin(),
            collision,
        });
        self.blockage.push(end_effector);
        debug!(
            "Trial {}/{}: end effector ({:.3}, {:.3}, {:.3}), collision={}",
            trial + 1,
            self.config.trials,
            end_effector.x,
            end_effector.y,
            end_effector.z,
            collision
        );
        if collision {
            info!("Trial {} collided on joints {:?}", trial + 1, collided_joints);
        }
        collision
    }

    fn reset_arm<A: ArmBody + ?Sized>(&mut self, arm: &mut A) {
        let toggle_surface = self.config.disable_surface_on_reset;
        if toggle_surface {
            arm.set_surface_collider_enabled(false);
        }
        if let Some(pose) = &self.initial_pose {
            pose.restore(arm);
        }
        self.drive.zero_targets(arm);
        if toggle_surface {
            arm.set_surface_collider_enabled(true);
        }
        self.last_reset_positions = Some(self.drive.positions(arm));
        self.last_reset_velocities = Some((0..arm.joint_count()).map(|joint| arm.read_velocity(joint)).collect());
        self.resets += 1;
        info!("Arm reset to its starting pose ({} resets so far)", self.resets);
    }

    fn finish(&mut self) -> Result<Suspend, CampaignError> {
        self.state = SamplerState::Done;
        info!(
            "Generation finished: {} points, {} resets{}",
            self.recorder.len(),
            self.resets,
            if self.aborted { ", aborted on blockage" } else { "" }
        );
        match self.export_to(&self.output) {
            Ok(_) => Ok(Suspend::Done),
            Err(e) => {
                error!("Failed to export generation data to {}: {}", self.output.display(), e);
                Err(e.into())
            }
        }
    }
}

impl<A: ArmBody + ?Sized, R: Rng> Campaign<A> for GenerationCampaign<R> {
    fn advance(&mut self, arm: &mut A, _tick: Tick) -> Result<Suspend, CampaignError> {
        loop {
            match self.state {
                SamplerState::Idle => {
                    self.start(arm);
                    self.state = if self.config.trials == 0 || self.drive.actuated_count() == 0 {
                        SamplerState::Exporting
                    } else {
                        SamplerState::Sampling {
                            trial: 0,
                            step: TrialStep::Applying { slot: 0 },
                        }
                    };
                }
                SamplerState::Sampling { trial, step } => match step {
                    TrialStep::Applying { slot } => {
                        if slot == 0 {
                            self.trial_targets.clear();
                        }
                        let value = self.draw(slot);
                        let applied = self.drive.set_target(arm, slot, value)?;
                        self.trial_targets.push(applied);
                        let next = if slot + 1 < self.drive.actuated_count() {
                            TrialStep::Applying { slot: slot + 1 }
                        } else {
                            TrialStep::Settling
                        };
                        self.state = SamplerState::Sampling { trial, step: next };
                        return Ok(Suspend::Seconds(self.config.inter_joint_delay));
                    }
                    TrialStep::Settling => {
                        self.state = SamplerState::Sampling {
                            trial,
                            step: TrialStep::Measuring,
                        };
                        return Ok(Suspend::Seconds(self.config.settle_time));
                    }
                    TrialStep::Measuring => {
                        let collision = self.measure(arm, trial);
                        if self.blockage.is_blocked(self.config.min_span_m) {
                            warn!(
                                "End effector moved at most {:.1} mm over the last {} trials, aborting",
                                self.blockage.max_span() * 1000.0,
                                self.blockage.capacity()
                            );
                            self.aborted = true;
                            self.state = SamplerState::Exporting;
                            continue;
                        }
                        if collision {
                            self.reset_arm(arm);
                            self.state = SamplerState::Resetting { trial };
                            return Ok(Suspend::Seconds(self.config.reset_delay));
                        }
                        self.state = SamplerState::Sampling {
                            trial,
                            step: TrialStep::Cooldown,
                        };
                        return Ok(Suspend::Seconds(self.config.inter_trial_delay));
                    }
                    TrialStep::Cooldown => {
                        self.state = if trial + 1 < self.config.trials {
                            SamplerState::Sampling {
                                trial: trial + 1,
                                step: TrialStep::Applying { slot: 0 },
                            }
                        } else {
                            SamplerState::Exporting
                        };
                    }
                },
                SamplerState::Resetting { trial } => {
                    // Second clear for a collided trial. Measuring already drained the
                    // trial's own flags; this one drops contacts raised by the teleport
                    // so they are not charged to the next trial.
                    if let Some(monitor) = &self.monitor {
                        monitor.reset_all();
                    }
                    self.state = SamplerState::Sampling {
                        trial,
                        step: TrialStep::Cooldown,
                    };
                    return Ok(Suspend::Seconds(self.config.inter_trial_delay));
                }
                SamplerState::Exporting => return self.finish(),
                SamplerState::Done | SamplerState::Cancelled => return Ok(Suspend::Done),
            }
        }
    }

    fn cancel(&mut self, _arm: &mut A) {
        self.drive.abandon_blend();
        self.state = SamplerState::Cancelled;
        info!(
            "Generation campaign cancelled with {} points collected, nothing exported",
            self.recorder.len()
        );
    }
}
