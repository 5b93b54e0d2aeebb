/// Arm geometry and joint ranges for the simulated arm.
///
/// Links follow the Modified Denavit-Hartenberg (DHm) convention: the
/// transform from link i-1 to link i is `RotX(alpha) * TransX(a) *
/// RotZ(theta_offset + q) * TransZ(d)`. Lengths are metres, angles degrees.

use arm_sampler::JointLimits;
use serde::{Deserialize, Serialize};

/// One revolute link of the chain.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LinkSpec {
    /// Link length a_{i-1} (m)
    pub a: f64,
    /// Link twist α_{i-1} (deg)
    pub alpha: f64,
    /// Link offset d_i (m)
    pub d: f64,
    /// Constant added to the joint position to get θ_i (deg)
    pub theta_offset: f64,
    pub lower: f64,
    pub upper: f64,
    /// Zero makes the joint stationary.
    #[serde(default = "default_dof")]
    pub dof: usize,
}

fn default_dof() -> usize {
    1
}

impl LinkSpec {
    pub fn limits(&self) -> JointLimits {
        JointLimits::new(self.lower, self.upper)
    }
}

/// Arm description with DHm parameters
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ArmModel {
    pub name: String,

    /// Actuated links, base to tip. Joint 0 (the fixed root) is implicit.
    pub links: Vec<LinkSpec>,

    /// Tool point in the last link frame (m)
    pub tool: [f64; 3],

    /// Robot-base frame origin relative to the root body (m)
    pub base_offset: [f64; 3],

    /// Height of the floor collider (m)
    pub floor_height: f64,
}

impl ArmModel {
    /// Four-axis arm: base yaw, then three pitch joints.
    ///
    /// Link | a_{i-1} | α_{i-1} | θ_i     | d_i
    /// -----|---------|---------|---------|------
    /// L1   | 0       | 0       | J1      | 0.20
    /// L2   | 0       | -90     | J2-90   | 0
    /// L3   | 0.35    | 0       | J3      | 0
    /// L4   | 0.30    | 0       | J4      | 0
    ///
    /// Tool 0.10 m along x4. At zero the arm points straight up and the tool
    /// sits at (0, 0, 0.95).
    pub fn four_axis() -> Self {
        Self {
            name: "four_axis".to_string(),
            links: vec![
                LinkSpec { a: 0.0, alpha: 0.0, d: 0.20, theta_offset: 0.0, lower: -170.0, upper: 170.0, dof: 1 },
                LinkSpec { a: 0.0, alpha: -90.0, d: 0.0, theta_offset: -90.0, lower: -90.0, upper: 90.0, dof: 1 },
                LinkSpec { a: 0.35, alpha: 0.0, d: 0.0, theta_offset: 0.0, lower: -135.0, upper: 135.0, dof: 1 },
                LinkSpec { a: 0.30, alpha: 0.0, d: 0.0, theta_offset: 0.0, lower: -100.0, upper: 100.0, dof: 1 },
            ],
            tool: [0.10, 0.0, 0.0],
            base_offset: [0.0, 0.0, 0.0],
            floor_height: 0.0,
        }
    }

    /// Number of joints including the fixed root.
    pub fn joint_count(&self) -> usize {
        self.links.len() + 1
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.links.is_empty() {
            return Err("Arm model needs at least one link.".to_string());
        }
        for (i, link) in self.links.iter().enumerate() {
            let values = [link.a, link.alpha, link.d, link.theta_offset];
            if values.iter().any(|v| !v.is_finite()) {
                return Err(format!("Link {} has a non-finite DH parameter.", i + 1));
            }
            if link.lower.is_nan() || link.upper.is_nan() {
                return Err(format!("Link {} has NaN limits.", i + 1));
            }
        }
        if !self.floor_height.is_finite() {
            return Err("Floor height must be finite.".to_string());
        }
        Ok(())
    }
}

impl Default for ArmModel {
    fn default() -> Self {
        Self::four_axis()
    }
}
