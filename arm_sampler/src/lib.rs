// Trajectory sampling and replay validation for simulated articulated arms.
//
// Physics is reached only through the capability traits in `backend`; the
// campaigns in `sampler` and `replay` are driven by `driver::SimulationDriver`.

pub mod backend;
pub mod blockage;
pub mod bridge;
pub mod collision;
pub mod config;
pub mod dataset;
pub mod drive;
pub mod driver;
pub mod recorder;
pub mod replay;
pub mod sampler;

pub mod errors;
pub use errors::*;

pub use backend::{ArmBody, ArmPose, JointActuator, JointLimits, JointVelocity};
pub use blockage::BlockageDetector;
pub use bridge::{RemoteAngles, RemoteTargets};
pub use collision::{CollisionMonitor, CollisionSink};
pub use config::{
    ColliderPolicy, DriveGains, DriverConfig, GenerationSchema, HeightAxis, ReplayConfig,
    SampleSelection, SamplerConfig,
};
pub use dataset::{LoadSummary, TrajectoryDataset, TrajectoryRow};
pub use drive::{BlendProgress, JointDriveModel};
pub use driver::{Campaign, CancelHandle, RunOutcome, SimulationDriver, Suspend, Tick};
pub use recorder::{DataPoint, DatasetRecorder, ExportFormat};
pub use replay::{ErrorStats, ReplayCampaign, ValidationPoint};
pub use sampler::GenerationCampaign;
