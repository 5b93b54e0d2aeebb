//! Joint drive model.
//!
//! Wraps the ordered actuated joints of an arm. Joint 0 (the fixed root) and
//! joints that report zero degrees of freedom are left out, so slot `0` is
//! `j1`, slot `1` is `j2`, and so on. Every target goes through
//! [`JointDriveModel::set_target`], which clamps to the joint's limits.

use tracing::debug;

use crate::backend::{JointActuator, JointLimits};
use crate::bridge::RemoteTargets;
use crate::config::{ColliderPolicy, DriveGains};
use crate::errors::DriveError;

/// Blends shorter than this are stretched to it.
pub const MIN_BLEND_DURATION: f64 = 0.01;

#[derive(Debug, Clone, PartialEq)]
pub struct Joint {
    /// Index in the backend's joint list.
    pub index: usize,
    pub limits: JointLimits,
    pub gains: DriveGains,
    pub target: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlendProgress {
    Idle,
    Running,
    Finished,
}

#[derive(Debug, Clone)]
struct Blend {
    start: Vec<f64>,
    goal: Vec<f64>,
    duration: f64,
    t: f64,
}

#[derive(Debug, Clone, Default)]
pub struct JointDriveModel {
    joints: Vec<Joint>,
    blend: Option<Blend>,
}

/// Hermite ease-in/ease-out on `[0, 1]`.
pub fn smoothstep(t: f64) -> f64 {
    let t = t.clamp(0.0, 1.0);
    t * t * (3.0 - 2.0 * t)
}

impl JointDriveModel {
    /// Build the joint list from the arm's structure.
    pub fn discover<A: JointActuator + ?Sized>(arm: &A) -> Self {
        let joints = (1..arm.joint_count())
            .filter(|&index| arm.dof_count(index) > 0)
            .map(|index| Joint {
                index,
                limits: arm.limits(index),
                gains: DriveGains::default(),
                target: arm.drive_target(index),
            })
            .collect();
        Self {
            joints,
            blend: None,
        }
    }

    /// Install `gains` on every actuated joint and zero its target.
    pub fn initialize<A: JointActuator + ?Sized>(
        &mut self,
        arm: &mut A,
        gains: DriveGains,
        policy: ColliderPolicy,
    ) {
        self.blend = None;
        for slot in 0..self.joints.len() {
            let index = self.joints[slot].index;
            self.joints[slot].gains = gains;
            arm.set_drive_gains(index, gains);
            if policy == ColliderPolicy::Coarse {
                arm.set_collider_enabled(index, false);
            }
            self.write(arm, slot, 0.0);
        }
        debug!(
            "Initialized {} actuated joints (stiffness={}, damping={}, force_limit={})",
            self.joints.len(),
            gains.stiffness,
            gains.damping,
            gains.force_limit
        );
    }

    pub fn joints(&self) -> &[Joint] {
        &self.joints
    }

    pub fn actuated_count(&self) -> usize {
        self.joints.len()
    }

    pub fn limits(&self, slot: usize) -> Option<JointLimits> {
        self.joints.get(slot).map(|joint| joint.limits)
    }

    pub fn targets(&self) -> Vec<f64> {
        self.joints.iter().map(|joint| joint.target).collect()
    }

    /// Clamp `value` to the joint's limits, store and apply it.
    /// Returns the value actually applied.
    pub fn set_target<A: JointActuator + ?Sized>(
        &mut self,
        arm: &mut A,
        slot: usize,
        value: f64,
    ) -> Result<f64, DriveError> {
        if slot >= self.joints.len() {
            return Err(DriveError::UnknownJoint(slot));
        }
        Ok(self.write(arm, slot, value))
    }

    fn write<A: JointActuator + ?Sized>(&mut self, arm: &mut A, slot: usize, value: f64) -> f64 {
        let joint = &mut self.joints[slot];
        let clamped = joint.limits.clamp(value);
        joint.target = clamped;
        arm.set_drive_target(joint.index, clamped);
        clamped
    }

    /// Engine-reported position, 0 for a joint without degrees of freedom.
    pub fn read_position<A: JointActuator + ?Sized>(&self, arm: &A, slot: usize) -> f64 {
        self.joints
            .get(slot)
            .and_then(|joint| arm.read_position(joint.index))
            .unwrap_or(0.0)
    }

    pub fn positions<A: JointActuator + ?Sized>(&self, arm: &A) -> Vec<f64> {
        (0..self.joints.len())
            .map(|slot| self.read_position(arm, slot))
            .collect()
    }

    pub fn zero_targets<A: JointActuator + ?Sized>(&mut self, arm: &mut A) {
        for slot in 0..self.joints.len() {
            self.write(arm, slot, 0.0);
        }
    }

    /// Start a smooth move from the current targets to `targets`.
    ///
    /// Only the first `min(targets.len(), actuated)` joints move. The move is
    /// advanced by [`advance_blend`](Self::advance_blend) once per tick.
    pub fn blend_to(&mut self, targets: &[f64], duration: f64) -> Result<(), DriveError> {
        if self.blend.is_some() {
            return Err(DriveError::BlendInFlight);
        }
        let count = targets.len().min(self.joints.len());
        let start = self.joints[..count].iter().map(|joint| joint.target).collect();
        let goal = self.joints[..count]
            .iter()
            .zip(targets)
            .map(|(joint, &target)| joint.limits.clamp(target))
            .collect();
        self.blend = Some(Blend {
            start,
            goal,
            duration: duration.max(MIN_BLEND_DURATION),
            t: 0.0,
        });
        Ok(())
    }

    /// Apply one tick of the in-flight blend. The last tick lands exactly on
    /// the goal.
    pub fn advance_blend<A: JointActuator + ?Sized>(&mut self, arm: &mut A, dt: f64) -> BlendProgress {
        let Some(mut blend) = self.blend.take() else {
            return BlendProgress::Idle;
        };
        blend.t = (blend.t + dt / blend.duration).min(1.0);
        let s = smoothstep(blend.t);
        for slot in 0..blend.goal.len() {
            let value = blend.start[slot] + (blend.goal[slot] - blend.start[slot]) * s;
            self.write(arm, slot, value);
        }
        if blend.t >= 1.0 {
            BlendProgress::Finished
        } else {
            self.blend = Some(blend);
            BlendProgress::Running
        }
    }

    pub fn is_blending(&self) -> bool {
        self.blend.is_some()
    }

    /// Drop the in-flight blend. Joints keep their last commanded target.
    pub fn abandon_blend(&mut self) {
        self.blend = None;
    }

    /// Write the bridge's latest angles when they pass its gate.
    pub fn apply_remote<A: JointActuator + ?Sized>(&mut self, arm: &mut A, remote: &RemoteTargets) -> bool {
        let Some(angles) = remote.applicable(self.joints.len()) else {
            return false;
        };
        for (slot, &angle) in angles.iter().take(self.joints.len()).enumerate() {
            self.write(arm, slot, angle);
        }
        true
    }
}
