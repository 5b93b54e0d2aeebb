//! Campaign configuration.
//!
//! Every struct here derives serde so a whole run can be described in one
//! JSON document, and every struct has a `validate()` that reports the first
//! inconsistent field as a plain message.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// PD-like drive parameters installed on every actuated joint.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq)]
pub struct DriveGains {
    pub stiffness: f64,
    pub damping: f64,
    pub force_limit: f64,
}

impl DriveGains {
    pub fn new(stiffness: f64, damping: f64, force_limit: f64) -> Self {
        Self {
            stiffness,
            damping,
            force_limit,
        }
    }

    pub fn validate(&self) -> Result<(), String> {
        if !(self.stiffness.is_finite() && self.stiffness >= 0.0) {
            return Err("Stiffness must be a non-negative number.".to_string());
        }
        if !(self.damping.is_finite() && self.damping >= 0.0) {
            return Err("Damping must be a non-negative number.".to_string());
        }
        if !(self.force_limit > 0.0) {
            return Err("Force limit must be greater than 0.".to_string());
        }
        Ok(())
    }
}

impl Default for DriveGains {
    fn default() -> Self {
        Self {
            stiffness: 100.0,
            damping: 20.0,
            force_limit: 1e5,
        }
    }
}

/// Granularity at which collisions are evaluated.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ColliderPolicy {
    /// Every actuated joint keeps its own collider.
    #[default]
    PerJoint,
    /// Individual joint colliders are disabled; only coarser bodies collide.
    Coarse,
}

/// Column layout of the generation output file.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum GenerationSchema {
    /// `j1..jk,end_x,end_y,end_z,collision`
    #[default]
    Standard,
    /// `arm_x,arm_y,arm_z,j1..jk,end_x,end_y,end_z,collision`
    WithArmPosition,
}

/// World axis treated as "up" when filtering the validation report.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum HeightAxis {
    X,
    Y,
    #[default]
    Z,
}

impl HeightAxis {
    pub fn index(&self) -> usize {
        match self {
            HeightAxis::X => 0,
            HeightAxis::Y => 1,
            HeightAxis::Z => 2,
        }
    }
}

/// How the replay validator picks dataset rows.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Default)]
pub enum SampleSelection {
    /// Distinct rows drawn uniformly at random, without replacement.
    #[default]
    UniformRandom,
    /// For each base-relative target, the row whose stored position is closest.
    Nearest { targets: Vec<[f64; 3]> },
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct SamplerConfig {
    pub trials: usize,
    pub gains: DriveGains,
    /// Pause after each joint is commanded (s).
    pub inter_joint_delay: f64,
    /// Time allowed for physics to settle before measuring (s).
    pub settle_time: f64,
    /// Pause after a post-collision reset (s).
    pub reset_delay: f64,
    /// Pause between trials (s).
    pub inter_trial_delay: f64,
    /// Number of settled positions examined by the blockage detector.
    pub window_size: usize,
    /// Span (m) under which the arm is considered blocked.
    pub min_span_m: f64,
    pub collider_policy: ColliderPolicy,
    /// Disable the surface collider while the arm is teleported back.
    pub disable_surface_on_reset: bool,
    pub schema: GenerationSchema,
    /// Write end-effector coordinates relative to the robot base.
    pub relative_to_base: bool,
    /// When set, each row also flags whether the end effector ended below
    /// this height (m) relative to the robot base.
    pub under_threshold_m: Option<f64>,
    /// Axis the threshold is measured along.
    pub height_axis: HeightAxis,
    pub delimiter: char,
    /// Explicit output file; a unique name is generated when absent.
    pub output_path: Option<PathBuf>,
}

impl SamplerConfig {
    pub fn validate(&self) -> Result<(), String> {
        self.gains.validate()?;
        for (name, value) in [
            ("inter_joint_delay", self.inter_joint_delay),
            ("settle_time", self.settle_time),
            ("reset_delay", self.reset_delay),
            ("inter_trial_delay", self.inter_trial_delay),
        ] {
            if !(value.is_finite() && value >= 0.0) {
                return Err(format!("{} must be a non-negative number of seconds.", name));
            }
        }
        if self.window_size < 2 {
            return Err("Blockage window must hold at least 2 samples.".to_string());
        }
        if !(self.min_span_m.is_finite() && self.min_span_m >= 0.0) {
            return Err("Minimum span must be a non-negative distance.".to_string());
        }
        if !self.delimiter.is_ascii() {
            return Err(format!("Delimiter {:?} must be ASCII.", self.delimiter));
        }
        if let Some(threshold) = self.under_threshold_m {
            if !threshold.is_finite() {
                return Err("Under-threshold height must be a finite distance.".to_string());
            }
        }
        Ok(())
    }

    /// Output file for this campaign, inside `dir` when no explicit path is set.
    pub fn resolve_output(&self, dir: &Path) -> PathBuf {
        self.output_path
            .clone()
            .unwrap_or_else(|| dir.join(unique_file_name("joint_data")))
    }
}

impl Default for SamplerConfig {
    fn default() -> Self {
        Self {
            trials: 100,
            gains: DriveGains::default(),
            inter_joint_delay: 0.1,
            settle_time: 1.0,
            reset_delay: 1.0,
            inter_trial_delay: 1.0,
            window_size: 5,
            min_span_m: 0.4,
            collider_policy: ColliderPolicy::PerJoint,
            disable_surface_on_reset: true,
            schema: GenerationSchema::Standard,
            relative_to_base: false,
            under_threshold_m: None,
            height_axis: HeightAxis::Z,
            delimiter: ',',
            output_path: None,
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct ReplayConfig {
    pub max_samples: usize,
    pub gains: DriveGains,
    /// Duration of the smooth move to each stored pose (s).
    pub blend_duration: f64,
    pub settle_time: f64,
    pub inter_sample_delay: f64,
    /// Errors above this distance (m) are logged as warnings.
    pub tolerance_m: f64,
    /// Only samples whose end effector is strictly higher than this appear in the report.
    pub report_min_height: f64,
    pub height_axis: HeightAxis,
    pub selection: SampleSelection,
    pub output_path: Option<PathBuf>,
}

impl ReplayConfig {
    pub fn validate(&self) -> Result<(), String> {
        self.gains.validate()?;
        for (name, value) in [
            ("blend_duration", self.blend_duration),
            ("settle_time", self.settle_time),
            ("inter_sample_delay", self.inter_sample_delay),
        ] {
            if !(value.is_finite() && value >= 0.0) {
                return Err(format!("{} must be a non-negative number of seconds.", name));
            }
        }
        if !(self.tolerance_m.is_finite() && self.tolerance_m >= 0.0) {
            return Err("Tolerance must be a non-negative distance.".to_string());
        }
        if !self.report_min_height.is_finite() {
            return Err("Report height threshold must be finite.".to_string());
        }
        Ok(())
    }

    pub fn resolve_output(&self, dir: &Path) -> PathBuf {
        self.output_path
            .clone()
            .unwrap_or_else(|| dir.join(unique_file_name("test_result")))
    }
}

impl Default for ReplayConfig {
    fn default() -> Self {
        Self {
            max_samples: 500,
            gains: DriveGains::default(),
            blend_duration: 0.5,
            settle_time: 2.0,
            inter_sample_delay: 0.05,
            tolerance_m: 0.01,
            report_min_height: 0.3,
            height_axis: HeightAxis::Z,
            selection: SampleSelection::UniformRandom,
            output_path: None,
        }
    }
}

/// Fixed-step simulation clock settings.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct DriverConfig {
    /// Physics tick length (s).
    pub tick_seconds: f64,
    /// Simulated-time ceiling after which the campaign is cancelled.
    pub max_sim_seconds: Option<f64>,
}

impl DriverConfig {
    pub fn validate(&self) -> Result<(), String> {
        if !(self.tick_seconds.is_finite() && self.tick_seconds > 0.0) {
            return Err("Tick length must be greater than 0.".to_string());
        }
        if let Some(max) = self.max_sim_seconds {
            if !(max > 0.0) {
                return Err("Simulated-time ceiling must be greater than 0.".to_string());
            }
        }
        Ok(())
    }
}

impl Default for DriverConfig {
    fn default() -> Self {
        Self {
            tick_seconds: 0.01,
            max_sim_seconds: None,
        }
    }
}

/// `<prefix>_<8 hex chars>.csv`
pub fn unique_file_name(prefix: &str) -> String {
    let id = Uuid::new_v4().simple().to_string();
    format!("{}_{}.csv", prefix, &id[..8])
}
