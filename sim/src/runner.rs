//! Blocking campaign runs against a [`SimArm`].

use std::path::{Path, PathBuf};

use arm_sampler::driver::{CancelHandle, RunOutcome, SimulationDriver};
use arm_sampler::errors::CampaignError;
use arm_sampler::replay::{ErrorStats, ReplayCampaign};
use arm_sampler::sampler::GenerationCampaign;
use rand::rngs::StdRng;
use rand::SeedableRng;
use tracing::{info, warn};

use crate::arm::SimArm;
use crate::settings::Settings;

#[derive(Debug, Clone, PartialEq)]
pub struct RunReport {
    pub outcome: RunOutcome,
    pub output: PathBuf,
    /// Data points (generation) or validated samples (replay).
    pub samples: usize,
    /// Generation only: sampling stopped on blockage.
    pub aborted: bool,
    /// Replay only.
    pub stats: Option<ErrorStats>,
    /// Requested file that could not be written; `output` then names the
    /// fallback copy.
    pub failed_output: Option<PathBuf>,
}

fn rng(seed: Option<u64>) -> StdRng {
    match seed {
        Some(seed) => {
            info!("Using fixed seed {}", seed);
            StdRng::seed_from_u64(seed)
        }
        None => StdRng::from_os_rng(),
    }
}

pub fn build_arm(settings: &Settings) -> SimArm {
    SimArm::new(settings.arm.clone())
}

pub fn generate(settings: &Settings, arm: &mut SimArm, cancel: CancelHandle) -> Result<RunReport, CampaignError> {
    let output = settings.generation_output();
    let mut campaign = GenerationCampaign::new(settings.sampler.clone(), rng(settings.seed), output.clone())?;
    let mut driver = SimulationDriver::new(settings.driver.clone())?.with_cancel_handle(cancel);
    let (outcome, output, failed_output) = match driver.run(arm, &mut campaign) {
        Ok(outcome) => (outcome, output, None),
        Err(CampaignError::Export(e)) => {
            let fallback = settings.fallback_output("joint_data");
            warn!("Could not write {}: {}. Saving to {} instead", output.display(), e, fallback.display());
            campaign.export_to(&fallback)?;
            (RunOutcome::Completed, fallback, Some(output))
        }
        Err(e) => return Err(e),
    };
    Ok(RunReport {
        outcome,
        output,
        samples: campaign.points().len(),
        aborted: campaign.aborted(),
        stats: None,
        failed_output,
    })
}

pub fn validate(
    settings: &Settings,
    arm: &mut SimArm,
    dataset: &Path,
    cancel: CancelHandle,
) -> Result<RunReport, CampaignError> {
    let output = settings.report_output();
    let mut campaign = ReplayCampaign::from_path(settings.replay.clone(), dataset, rng(settings.seed), output.clone())?;
    let mut driver = SimulationDriver::new(settings.driver.clone())?.with_cancel_handle(cancel);
    let (outcome, output, failed_output) = match driver.run(arm, &mut campaign) {
        Ok(outcome) => (outcome, output, None),
        Err(CampaignError::Export(e)) => {
            let fallback = settings.fallback_output("test_result");
            warn!("Could not write {}: {}. Saving to {} instead", output.display(), e, fallback.display());
            campaign.export_report(&fallback)?;
            (RunOutcome::Completed, fallback, Some(output))
        }
        Err(e) => return Err(e),
    };
    Ok(RunReport {
        outcome,
        output,
        samples: campaign.points().len(),
        aborted: false,
        stats: campaign.stats(),
        failed_output,
    })
}
