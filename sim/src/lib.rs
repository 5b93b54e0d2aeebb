// Library exports for the simulated arm

pub mod arm;
pub mod bridge;
pub mod kinematics;
pub mod robot_config;
pub mod runner;
pub mod settings;

pub use arm::SimArm;
pub use kinematics::ArmKinematics;
pub use robot_config::{ArmModel, LinkSpec};
pub use settings::Settings;
