#![allow(dead_code)]

use std::path::PathBuf;

use arm_sampler::backend::{ArmBody, JointActuator, JointLimits, JointVelocity};
use arm_sampler::collision::CollisionSink;
use arm_sampler::config::DriveGains;
use nalgebra::{Isometry3, Point3, Vector3};

/// Metres of end-effector travel per degree of joint motion.
pub const REACH_PER_DEGREE: f64 = 0.1;

/// Deterministic arm: joint positions jump to their targets on every step
/// and the end effector is an affine function of the joint positions.
pub struct MockArm {
    pub limits: Vec<JointLimits>,
    pub dof: Vec<usize>,
    pub targets: Vec<f64>,
    pub positions: Vec<f64>,
    pub velocities: Vec<JointVelocity>,
    pub gains: Vec<Option<DriveGains>>,
    pub colliders: Vec<bool>,
    pub surface_enabled: bool,
    pub surface_toggles: usize,
    pub root: Isometry3<f64>,
    pub base: Point3<f64>,
    /// Positions stop following targets, as if the arm were jammed.
    pub frozen: bool,
    /// Linear velocity every actuated joint is left with after a step.
    pub drift: Option<Vector3<f64>>,
    pub steps: u64,
    sink: Option<CollisionSink>,
    writes: Vec<usize>,
    scripted: Vec<(usize, usize)>,
    pending: Vec<usize>,
}

impl MockArm {
    /// Fixed root plus four revolute joints limited to +/-90 degrees.
    pub fn four_axis() -> Self {
        Self::with_joints(&[(-90.0, 90.0); 4])
    }

    pub fn with_joints(limits: &[(f64, f64)]) -> Self {
        let n = limits.len() + 1;
        let mut all = vec![JointLimits::new(0.0, 0.0)];
        all.extend(limits.iter().map(|&(lo, hi)| JointLimits::new(lo, hi)));
        let mut dof = vec![1; n];
        dof[0] = 0;
        Self {
            limits: all,
            dof,
            targets: vec![0.0; n],
            positions: vec![0.0; n],
            velocities: vec![JointVelocity::default(); n],
            gains: vec![None; n],
            colliders: vec![true; n],
            surface_enabled: true,
            surface_toggles: 0,
            root: Isometry3::identity(),
            base: Point3::origin(),
            frozen: false,
            drift: None,
            steps: 0,
            sink: None,
            writes: vec![0; n],
            scripted: Vec::new(),
            pending: Vec::new(),
        }
    }

    /// Start from a pose other than all-zero.
    pub fn starting_at(mut self, positions: &[f64]) -> Self {
        for (joint, &p) in positions.iter().enumerate() {
            if joint + 1 < self.positions.len() {
                self.positions[joint + 1] = p;
                self.targets[joint + 1] = p;
            }
        }
        self
    }

    pub fn with_base(mut self, base: Point3<f64>) -> Self {
        self.base = base;
        self
    }

    pub fn drifting(mut self, velocity: Vector3<f64>) -> Self {
        self.drift = Some(velocity);
        self
    }

    /// Raise a collision on `joint` at the first step after its `nth`
    /// drive-target write (1-based).
    pub fn collide_after_write(mut self, joint: usize, nth: usize) -> Self {
        self.scripted.push((joint, nth));
        self
    }

    /// End-effector offset from the base for the given actuated positions.
    pub fn reach(joints: &[f64]) -> Vector3<f64> {
        let j = |i: usize| joints.get(i).copied().unwrap_or(0.0);
        Vector3::new(j(0), j(1), j(2) + j(3)) * REACH_PER_DEGREE
    }

    pub fn actuated_positions(&self) -> Vec<f64> {
        self.positions[1..].to_vec()
    }
}

impl JointActuator for MockArm {
    fn joint_count(&self) -> usize {
        self.limits.len()
    }

    fn dof_count(&self, joint: usize) -> usize {
        self.dof.get(joint).copied().unwrap_or(0)
    }

    fn limits(&self, joint: usize) -> JointLimits {
        self.limits[joint]
    }

    fn set_drive_gains(&mut self, joint: usize, gains: DriveGains) {
        self.gains[joint] = Some(gains);
    }

    fn drive_target(&self, joint: usize) -> f64 {
        self.targets[joint]
    }

    fn set_drive_target(&mut self, joint: usize, target: f64) {
        self.targets[joint] = target;
        self.writes[joint] += 1;
        let count = self.writes[joint];
        if self.scripted.contains(&(joint, count)) {
            self.pending.push(joint);
        }
    }

    fn read_position(&self, joint: usize) -> Option<f64> {
        (self.dof_count(joint) > 0).then(|| self.positions[joint])
    }

    fn read_velocity(&self, joint: usize) -> JointVelocity {
        self.velocities[joint]
    }

    fn zero_velocity(&mut self, joint: usize) {
        self.velocities[joint] = JointVelocity::default();
    }

    fn set_collider_enabled(&mut self, joint: usize, enabled: bool) {
        self.colliders[joint] = enabled;
    }
}

impl ArmBody for MockArm {
    fn end_effector(&self) -> Point3<f64> {
        self.base + Self::reach(&self.positions[1..])
    }

    fn arm_position(&self) -> Point3<f64> {
        Point3::from(self.root.translation.vector)
    }

    fn base_origin(&self) -> Point3<f64> {
        self.base
    }

    fn root_pose(&self) -> Isometry3<f64> {
        self.root
    }

    fn set_root_pose(&mut self, pose: Isometry3<f64>) {
        self.root = pose;
    }

    fn joint_local_pose(&self, joint: usize) -> Isometry3<f64> {
        Isometry3::rotation(Vector3::z() * self.positions[joint].to_radians())
    }

    fn set_joint_local_pose(&mut self, joint: usize, pose: Isometry3<f64>) {
        self.positions[joint] = pose.rotation.scaled_axis().z.to_degrees();
    }

    fn set_surface_collider_enabled(&mut self, enabled: bool) {
        self.surface_enabled = enabled;
        self.surface_toggles += 1;
    }

    fn attach_collision_sink(&mut self, sink: CollisionSink) {
        self.sink = Some(sink);
    }

    fn step(&mut self, dt: f64) {
        self.steps += 1;
        if !self.frozen {
            for joint in 1..self.positions.len() {
                if self.dof[joint] > 0 {
                    let delta = self.targets[joint] - self.positions[joint];
                    self.velocities[joint].angular = Vector3::z() * (delta / dt);
                    self.positions[joint] = self.targets[joint];
                }
            }
        }
        if let Some(drift) = self.drift {
            for joint in 1..self.velocities.len() {
                if self.dof[joint] > 0 {
                    self.velocities[joint].linear = drift;
                }
            }
        }
        for joint in std::mem::take(&mut self.pending) {
            if let (Some(sink), true) = (&self.sink, self.colliders[joint]) {
                sink.on_collision(joint);
            }
        }
    }
}

pub fn temp_csv(tag: &str) -> PathBuf {
    std::env::temp_dir().join(arm_sampler::config::unique_file_name(tag))
}

/// Read a delimited file back as a header plus rows of fields.
pub fn read_table(path: &std::path::Path, delimiter: u8) -> (Vec<String>, Vec<Vec<String>>) {
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .from_path(path)
        .unwrap();
    let header = reader.headers().unwrap().iter().map(String::from).collect();
    let rows = reader
        .records()
        .map(|r| r.unwrap().iter().map(String::from).collect())
        .collect();
    (header, rows)
}
