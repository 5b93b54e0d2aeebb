//! Kinematic arm with PD joint drives and a floor collider.
//!
//! Each actuated joint is a unit-inertia axis driven toward its target:
//! `accel = stiffness * error - damping * velocity`, clamped to the force
//! limit and integrated semi-implicitly. The floor is a trigger: a link whose
//! tip crosses below it raises one collision-begin event, and raises another
//! only after it has left the floor again.

use arm_sampler::backend::{ArmBody, JointActuator, JointLimits, JointVelocity};
use arm_sampler::collision::CollisionSink;
use arm_sampler::config::DriveGains;
use nalgebra::{Isometry3, Point3, Vector3};
use tracing::debug;

use crate::kinematics::ArmKinematics;
use crate::robot_config::ArmModel;

#[derive(Debug, Clone)]
struct JointState {
    limits: JointLimits,
    dof: usize,
    gains: DriveGains,
    target: f64,
    /// deg
    position: f64,
    /// deg/s
    velocity: f64,
    /// Velocity of the link tip from the last step (m/s).
    linear: Vector3<f64>,
    collider_enabled: bool,
    in_contact: bool,
}

pub struct SimArm {
    kinematics: ArmKinematics,
    root: Isometry3<f64>,
    /// Index 0 is the fixed root.
    joints: Vec<JointState>,
    sink: Option<CollisionSink>,
    surface_enabled: bool,
}

impl SimArm {
    pub fn new(model: ArmModel) -> Self {
        let mut joints = vec![JointState {
            limits: JointLimits::new(0.0, 0.0),
            dof: 0,
            gains: DriveGains::default(),
            target: 0.0,
            position: 0.0,
            velocity: 0.0,
            linear: Vector3::zeros(),
            collider_enabled: true,
            in_contact: false,
        }];
        joints.extend(model.links.iter().map(|link| JointState {
            limits: link.limits(),
            dof: link.dof,
            gains: DriveGains::default(),
            target: 0.0,
            position: 0.0,
            velocity: 0.0,
            linear: Vector3::zeros(),
            collider_enabled: true,
            in_contact: false,
        }));
        Self {
            kinematics: ArmKinematics::new(model),
            root: Isometry3::identity(),
            joints,
            sink: None,
            surface_enabled: true,
        }
    }

    pub fn with_root(mut self, root: Isometry3<f64>) -> Self {
        self.root = root;
        self
    }

    /// Place joints directly, targets included, without stepping physics.
    pub fn set_positions(&mut self, positions: &[f64]) {
        for (joint, &p) in self.joints.iter_mut().skip(1).zip(positions) {
            let p = joint.limits.clamp(p);
            joint.position = p;
            joint.target = p;
            joint.velocity = 0.0;
        }
    }

    pub fn kinematics(&self) -> &ArmKinematics {
        &self.kinematics
    }

    /// Actuated joint positions (deg), j1 first.
    pub fn positions(&self) -> Vec<f64> {
        self.joints.iter().skip(1).map(|joint| joint.position).collect()
    }

    pub fn surface_enabled(&self) -> bool {
        self.surface_enabled
    }

    fn link_tips(&self) -> Vec<Point3<f64>> {
        self.kinematics.link_tips(&self.root, &self.positions())
    }

    fn joint_axis(&self, joint: usize) -> Vector3<f64> {
        let frames = self.kinematics.frames(&self.root, &self.positions());
        frames
            .get(joint)
            .map(|frame| frame.rotation * Vector3::z())
            .unwrap_or_else(Vector3::z)
    }

    fn update_contacts(&mut self) {
        let floor = self.kinematics.model().floor_height;
        let tips = self.link_tips();
        for (i, tip) in tips.iter().enumerate() {
            let joint = i + 1;
            let below = self.surface_enabled && tip.z < floor;
            let state = &mut self.joints[joint];
            if below && !state.in_contact && state.collider_enabled {
                debug!("Link {} touched the floor at z={:.3}", joint, tip.z);
                if let Some(sink) = &self.sink {
                    sink.on_collision(joint);
                }
            }
            state.in_contact = below;
        }
    }
}

impl JointActuator for SimArm {
    fn joint_count(&self) -> usize {
        self.joints.len()
    }

    fn dof_count(&self, joint: usize) -> usize {
        self.joints.get(joint).map(|j| j.dof).unwrap_or(0)
    }

    fn limits(&self, joint: usize) -> JointLimits {
        self.joints
            .get(joint)
            .map(|j| j.limits)
            .unwrap_or(JointLimits::new(0.0, 0.0))
    }

    fn set_drive_gains(&mut self, joint: usize, gains: DriveGains) {
        if let Some(j) = self.joints.get_mut(joint) {
            j.gains = gains;
        }
    }

    fn drive_target(&self, joint: usize) -> f64 {
        self.joints.get(joint).map(|j| j.target).unwrap_or(0.0)
    }

    fn set_drive_target(&mut self, joint: usize, target: f64) {
        if let Some(j) = self.joints.get_mut(joint) {
            j.target = target;
        }
    }

    fn read_position(&self, joint: usize) -> Option<f64> {
        self.joints
            .get(joint)
            .filter(|j| j.dof > 0)
            .map(|j| j.position)
    }

    fn read_velocity(&self, joint: usize) -> JointVelocity {
        match self.joints.get(joint) {
            Some(j) if j.dof > 0 => JointVelocity {
                linear: j.linear,
                angular: self.joint_axis(joint) * j.velocity.to_radians(),
            },
            _ => JointVelocity::default(),
        }
    }

    fn zero_velocity(&mut self, joint: usize) {
        if let Some(j) = self.joints.get_mut(joint) {
            j.velocity = 0.0;
            j.linear = Vector3::zeros();
        }
    }

    fn set_collider_enabled(&mut self, joint: usize, enabled: bool) {
        if let Some(j) = self.joints.get_mut(joint) {
            j.collider_enabled = enabled;
        }
    }
}

impl ArmBody for SimArm {
    fn end_effector(&self) -> Point3<f64> {
        self.kinematics.forward_kinematics(&self.root, &self.positions())
    }

    fn arm_position(&self) -> Point3<f64> {
        Point3::from(self.root.translation.vector)
    }

    fn base_origin(&self) -> Point3<f64> {
        let [x, y, z] = self.kinematics.model().base_offset;
        self.root * Point3::new(x, y, z)
    }

    fn root_pose(&self) -> Isometry3<f64> {
        self.root
    }

    fn set_root_pose(&mut self, pose: Isometry3<f64>) {
        self.root = pose;
    }

    fn joint_local_pose(&self, joint: usize) -> Isometry3<f64> {
        match joint {
            0 => Isometry3::identity(),
            j if j < self.joints.len() => self.kinematics.local_transform(j - 1, self.joints[j].position),
            _ => Isometry3::identity(),
        }
    }

    fn set_joint_local_pose(&mut self, joint: usize, pose: Isometry3<f64>) {
        if joint == 0 || joint >= self.joints.len() {
            return;
        }
        let position = self.kinematics.joint_position_from_local(joint - 1, &pose);
        self.joints[joint].position = position;
    }

    fn set_surface_collider_enabled(&mut self, enabled: bool) {
        self.surface_enabled = enabled;
        if !enabled {
            for joint in self.joints.iter_mut() {
                joint.in_contact = false;
            }
        }
    }

    fn attach_collision_sink(&mut self, sink: CollisionSink) {
        self.sink = Some(sink);
    }

    fn step(&mut self, dt: f64) {
        if dt <= 0.0 {
            return;
        }
        let before = self.link_tips();
        for joint in self.joints.iter_mut().skip(1) {
            if joint.dof == 0 {
                continue;
            }
            let error = joint.target - joint.position;
            let limit = joint.gains.force_limit.abs();
            let accel = (joint.gains.stiffness * error - joint.gains.damping * joint.velocity).clamp(-limit, limit);
            joint.velocity += accel * dt;
            joint.position += joint.velocity * dt;
            let clamped = joint.limits.clamp(joint.position);
            if clamped != joint.position {
                joint.position = clamped;
                joint.velocity = 0.0;
            }
        }
        let after = self.link_tips();
        for (i, (a, b)) in before.iter().zip(&after).enumerate() {
            self.joints[i + 1].linear = (b - a) / dt;
        }
        self.update_contacts();
    }
}
