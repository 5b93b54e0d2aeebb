// Forward kinematics for the DHm chain described by `ArmModel`.
//
// Joint positions are degrees; frames are nalgebra isometries in metres.

use nalgebra::{Isometry3, Point3, Vector3};

use crate::robot_config::ArmModel;

#[derive(Debug, Clone)]
pub struct ArmKinematics {
    model: ArmModel,
}

/// Homogeneous transform for one DHm link: `RotX(alpha) * TransX(a) * RotZ(theta) * TransZ(d)`.
/// Angles in radians.
pub fn dh_transform(a: f64, alpha: f64, theta: f64, d: f64) -> Isometry3<f64> {
    Isometry3::rotation(Vector3::x() * alpha)
        * Isometry3::translation(a, 0.0, 0.0)
        * Isometry3::rotation(Vector3::z() * theta)
        * Isometry3::translation(0.0, 0.0, d)
}

/// Wrap into (-180, 180].
pub fn wrap_degrees(angle: f64) -> f64 {
    let wrapped = (angle + 180.0).rem_euclid(360.0) - 180.0;
    if wrapped == -180.0 {
        180.0
    } else {
        wrapped
    }
}

impl ArmKinematics {
    pub fn new(model: ArmModel) -> Self {
        Self { model }
    }

    pub fn model(&self) -> &ArmModel {
        &self.model
    }

    pub fn link_count(&self) -> usize {
        self.model.links.len()
    }

    /// Pose of link `link` (0-based over actuated links) relative to its parent.
    pub fn local_transform(&self, link: usize, q: f64) -> Isometry3<f64> {
        let spec = &self.model.links[link];
        dh_transform(
            spec.a,
            spec.alpha.to_radians(),
            (spec.theta_offset + q).to_radians(),
            spec.d,
        )
    }

    /// Joint position that produces `pose` as the local transform of `link`.
    ///
    /// Only the rotation is used: `RotX(alpha)^-1 * R = RotZ(theta)`.
    pub fn joint_position_from_local(&self, link: usize, pose: &Isometry3<f64>) -> f64 {
        let spec = &self.model.links[link];
        let twist = Isometry3::rotation(Vector3::x() * spec.alpha.to_radians());
        let about_z = (twist.inverse() * pose).rotation.to_rotation_matrix();
        let m = about_z.matrix();
        let theta = m[(1, 0)].atan2(m[(0, 0)]).to_degrees();
        wrap_degrees(theta - spec.theta_offset)
    }

    /// World frame of every link for positions `q`, root first.
    pub fn frames(&self, root: &Isometry3<f64>, q: &[f64]) -> Vec<Isometry3<f64>> {
        let mut frames = Vec::with_capacity(self.link_count() + 1);
        let mut current = *root;
        frames.push(current);
        for link in 0..self.link_count() {
            current *= self.local_transform(link, q.get(link).copied().unwrap_or(0.0));
            frames.push(current);
        }
        frames
    }

    pub fn tool_point(&self, last_frame: &Isometry3<f64>) -> Point3<f64> {
        let [x, y, z] = self.model.tool;
        last_frame * Point3::new(x, y, z)
    }

    /// Tool position in world coordinates.
    pub fn forward_kinematics(&self, root: &Isometry3<f64>, q: &[f64]) -> Point3<f64> {
        let frames = self.frames(root, q);
        match frames.last() {
            Some(last) => self.tool_point(last),
            None => Point3::from(root.translation.vector),
        }
    }

    /// End point of each link: the next frame origin, the tool for the last link.
    pub fn link_tips(&self, root: &Isometry3<f64>, q: &[f64]) -> Vec<Point3<f64>> {
        let frames = self.frames(root, q);
        let mut tips: Vec<Point3<f64>> = frames
            .iter()
            .skip(2)
            .map(|frame| Point3::from(frame.translation.vector))
            .collect();
        if let Some(last) = frames.last() {
            tips.push(self.tool_point(last));
        }
        tips
    }
}

impl Default for ArmKinematics {
    fn default() -> Self {
        Self::new(ArmModel::default())
    }
}
