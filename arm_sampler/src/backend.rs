//! Capability traits implemented by a physics backend.
//!
//! The sampling engine never reaches into simulation internals. Joints are
//! driven through [`JointActuator`], the rest of the articulated body
//! (poses, colliders, stepping) through [`ArmBody`]. Joint index 0 is the
//! fixed root and is never actuated.

use nalgebra::{Isometry3, Point3, Vector3};
use serde::{Deserialize, Serialize};

use crate::collision::CollisionSink;
use crate::config::DriveGains;

/// Hard position limits of one joint.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq)]
pub struct JointLimits {
    pub lower: f64,
    pub upper: f64,
}

impl JointLimits {
    /// Swapped bounds are reordered so `lower <= upper` always holds.
    pub fn new(lower: f64, upper: f64) -> Self {
        if lower <= upper {
            Self { lower, upper }
        } else {
            Self {
                lower: upper,
                upper: lower,
            }
        }
    }

    /// Clamp into `[lower, upper]`. NaN maps to `lower`.
    pub fn clamp(&self, value: f64) -> f64 {
        value.max(self.lower).min(self.upper)
    }

    pub fn contains(&self, value: f64) -> bool {
        value >= self.lower && value <= self.upper
    }

    pub fn span(&self) -> f64 {
        self.upper - self.lower
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct JointVelocity {
    pub linear: Vector3<f64>,
    pub angular: Vector3<f64>,
}

impl Default for JointVelocity {
    fn default() -> Self {
        Self { linear: Vector3::zeros(), angular: Vector3::zeros() }
    }
}

impl JointVelocity {
    pub fn is_zero(&self) -> bool {
        self.linear == Vector3::zeros() && self.angular == Vector3::zeros()
    }
}

/// Per-joint access to drives and measured state.
pub trait JointActuator {
    /// Number of joints, fixed root included.
    fn joint_count(&self) -> usize;

    /// Degrees of freedom reported by the joint. Zero means stationary.
    fn dof_count(&self, joint: usize) -> usize;

    fn limits(&self, joint: usize) -> JointLimits;

    fn set_drive_gains(&mut self, joint: usize, gains: DriveGains);

    fn drive_target(&self, joint: usize) -> f64;

    fn set_drive_target(&mut self, joint: usize, target: f64);

    /// Current joint position, or `None` when the joint has no degree of freedom.
    fn read_position(&self, joint: usize) -> Option<f64>;

    fn read_velocity(&self, joint: usize) -> JointVelocity;

    fn zero_velocity(&mut self, joint: usize);

    fn set_collider_enabled(&mut self, joint: usize, enabled: bool);
}

/// Whole-arm view: world poses, colliders and the physics tick.
pub trait ArmBody: JointActuator {
    /// End-effector position in world coordinates.
    fn end_effector(&self) -> Point3<f64>;

    /// World position of the arm's root body.
    fn arm_position(&self) -> Point3<f64>;

    /// Origin of the robot-base frame that dataset positions are relative to.
    fn base_origin(&self) -> Point3<f64>;

    fn root_pose(&self) -> Isometry3<f64>;

    fn set_root_pose(&mut self, pose: Isometry3<f64>);

    /// Pose of a joint's body relative to its parent.
    fn joint_local_pose(&self, joint: usize) -> Isometry3<f64>;

    fn set_joint_local_pose(&mut self, joint: usize, pose: Isometry3<f64>);

    /// Designated surface the arm works over (table, tray). No-op when the
    /// backend has none.
    fn set_surface_collider_enabled(&mut self, _enabled: bool) {}

    /// Register where collision-begin events are delivered.
    fn attach_collision_sink(&mut self, sink: CollisionSink);

    /// Advance physics by `dt` seconds.
    fn step(&mut self, dt: f64);
}

/// Root and per-joint local poses, captured at campaign start.
#[derive(Debug, Clone, PartialEq)]
pub struct ArmPose {
    pub root: Isometry3<f64>,
    pub joints: Vec<Isometry3<f64>>,
}

impl ArmPose {
    pub fn capture<A: ArmBody + ?Sized>(arm: &A) -> Self {
        Self {
            root: arm.root_pose(),
            joints: (0..arm.joint_count())
                .map(|joint| arm.joint_local_pose(joint))
                .collect(),
        }
    }

    /// Teleport the arm back to this pose and stop every body.
    ///
    /// Drive targets are left alone; they belong to the drive model.
    pub fn restore<A: ArmBody + ?Sized>(&self, arm: &mut A) {
        arm.set_root_pose(self.root);
        let count = self.joints.len().min(arm.joint_count());
        for (joint, pose) in self.joints.iter().take(count).enumerate() {
            arm.set_joint_local_pose(joint, *pose);
        }
        for joint in 0..arm.joint_count() {
            arm.zero_velocity(joint);
        }
    }
}
