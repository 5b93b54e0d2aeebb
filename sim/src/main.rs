use std::error::Error;
use std::path::PathBuf;

use arm_sampler::driver::{CancelHandle, RunOutcome};
use sim::bridge;
use sim::runner::{self, RunReport};
use sim::settings::Settings;
use tracing::{error, info, warn};

const USAGE: &str = "usage: sim [generate | validate <dataset.csv> | bridge]";

/// Raise `cancel` on Ctrl-C.
fn cancel_on_ctrl_c(cancel: CancelHandle) {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Ctrl-C received, stopping at the next suspension point");
            cancel.cancel();
        }
    });
}

fn log_report(report: &RunReport) {
    match report.outcome {
        RunOutcome::Completed => info!("Wrote {} samples to {}", report.samples, report.output.display()),
        RunOutcome::Cancelled => warn!("Run cancelled after {} samples; nothing written", report.samples),
        RunOutcome::TimedOut => warn!("Run hit its time ceiling after {} samples; nothing written", report.samples),
    }
    if let Some(failed) = &report.failed_output {
        warn!("{} could not be written; results saved to {}", failed.display(), report.output.display());
    }
    if report.aborted {
        warn!("Sampling stopped early: the arm appears blocked");
    }
    if let Some(stats) = report.stats {
        info!(
            "Mean error {:.4} m over {} samples (<= 15 cm: {}, 15-30 cm: {}, > 30 cm: {})",
            stats.mean_m, stats.count, stats.within_15cm, stats.between_15_30cm, stats.beyond_30cm
        );
    }
}

async fn run_generate(settings: Settings) -> Result<(), Box<dyn Error + Send + Sync>> {
    let cancel = CancelHandle::new();
    cancel_on_ctrl_c(cancel.clone());
    let report = tokio::task::spawn_blocking(move || {
        let mut arm = runner::build_arm(&settings);
        runner::generate(&settings, &mut arm, cancel)
    })
    .await??;
    log_report(&report);
    Ok(())
}

async fn run_validate(settings: Settings, dataset: PathBuf) -> Result<(), Box<dyn Error + Send + Sync>> {
    let cancel = CancelHandle::new();
    cancel_on_ctrl_c(cancel.clone());
    let report = tokio::task::spawn_blocking(move || {
        let mut arm = runner::build_arm(&settings);
        runner::validate(&settings, &mut arm, &dataset, cancel)
    })
    .await??;
    log_report(&report);
    Ok(())
}

async fn run_bridge(settings: Settings) -> Result<(), Box<dyn Error + Send + Sync>> {
    let stream = bridge::connect(&settings.bridge.url).await?;
    let cancel = CancelHandle::new();
    cancel_on_ctrl_c(cancel.clone());
    let mut arm = runner::build_arm(&settings);
    let remote = bridge::run_session(stream, &mut arm, settings.sampler.gains, &settings.bridge, cancel).await?;
    info!("Bridge session ended after {} target updates", remote.updates());
    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error + Send + Sync>> {
    tracing_subscriber::fmt::init();

    let settings = match Settings::load() {
        Ok(settings) => settings,
        Err(e) => {
            error!("{}", e);
            return Err(e.into());
        }
    };

    let mut args = std::env::args().skip(1);
    let mode = args.next().unwrap_or_else(|| "generate".to_string());
    let result = match mode.as_str() {
        "generate" => run_generate(settings).await,
        "validate" => match args.next().map(PathBuf::from).or_else(|| settings.dataset.clone()) {
            Some(dataset) => run_validate(settings, dataset).await,
            None => Err(format!("validate needs a dataset path\n{}", USAGE).into()),
        },
        "bridge" => run_bridge(settings).await,
        other => Err(format!("unknown mode '{}'\n{}", other, USAGE).into()),
    };
    if let Err(e) = &result {
        error!("{}", e);
    }
    result
}
