//! Fixed-step simulation driver.
//!
//! Campaigns are explicit state machines. Each call to [`Campaign::advance`]
//! does the work of one state and returns a [`Suspend`] telling the driver
//! how much simulated time must pass before the next call. The driver owns
//! the clock: it steps the arm at a fixed tick, so a run is deterministic for
//! a given arm, seed and tick length.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::backend::ArmBody;
use crate::config::DriverConfig;
use crate::errors::CampaignError;

/// Slack when comparing the clock against a wake time.
const WAKE_EPSILON: f64 = 1e-9;

/// What a campaign waits for before its next step.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Suspend {
    /// Simulated seconds to let pass.
    Seconds(f64),
    /// Exactly one physics tick.
    NextTick,
    /// The campaign has finished.
    Done,
}

/// Clock reading handed to a campaign.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Tick {
    /// Simulated seconds since the driver started.
    pub now: f64,
    /// Length of one physics tick.
    pub dt: f64,
}

pub trait Campaign<A: ArmBody + ?Sized> {
    /// Run the current state until it has to wait.
    fn advance(&mut self, arm: &mut A, tick: Tick) -> Result<Suspend, CampaignError>;

    /// Stop at the next suspension point. Nothing is exported.
    fn cancel(&mut self, arm: &mut A);
}

/// Cloneable flag used to stop a running campaign from another thread.
#[derive(Debug, Clone, Default)]
pub struct CancelHandle {
    flag: Arc<AtomicBool>,
}

impl CancelHandle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.flag.store(true, Ordering::Release);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::Acquire)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    Completed,
    Cancelled,
    /// The simulated-time ceiling was reached; the campaign was cancelled.
    TimedOut,
}

#[derive(Debug)]
pub struct SimulationDriver {
    config: DriverConfig,
    ticks: u64,
    cancel: CancelHandle,
}

impl SimulationDriver {
    pub fn new(config: DriverConfig) -> Result<Self, CampaignError> {
        config.validate().map_err(CampaignError::Config)?;
        Ok(Self {
            config,
            ticks: 0,
            cancel: CancelHandle::new(),
        })
    }

    /// Share an existing cancellation flag instead of a fresh one.
    pub fn with_cancel_handle(mut self, cancel: CancelHandle) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn cancel_handle(&self) -> CancelHandle {
        self.cancel.clone()
    }

    /// Simulated seconds elapsed.
    pub fn now(&self) -> f64 {
        self.ticks as f64 * self.config.tick_seconds
    }

    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    fn tick(&self) -> Tick {
        Tick {
            now: self.now(),
            dt: self.config.tick_seconds,
        }
    }

    fn step<A: ArmBody + ?Sized>(&mut self, arm: &mut A) {
        arm.step(self.config.tick_seconds);
        self.ticks += 1;
    }

    fn interrupted(&self) -> Option<RunOutcome> {
        if self.cancel.is_cancelled() {
            return Some(RunOutcome::Cancelled);
        }
        match self.config.max_sim_seconds {
            Some(max) if self.now() >= max - WAKE_EPSILON => Some(RunOutcome::TimedOut),
            _ => None,
        }
    }

    /// Drive `campaign` to completion, cancellation or the time ceiling.
    pub fn run<A, C>(&mut self, arm: &mut A, campaign: &mut C) -> Result<RunOutcome, CampaignError>
    where
        A: ArmBody + ?Sized,
        C: Campaign<A> + ?Sized,
    {
        info!("Simulation driver started (tick {} s)", self.config.tick_seconds);
        loop {
            if let Some(outcome) = self.interrupted() {
                return Ok(self.stop(arm, campaign, outcome));
            }

            match campaign.advance(arm, self.tick())? {
                Suspend::Done => {
                    info!("Campaign finished after {:.2} s simulated", self.now());
                    return Ok(RunOutcome::Completed);
                }
                Suspend::NextTick => self.step(arm),
                Suspend::Seconds(seconds) => {
                    let wake = self.now() + seconds.max(0.0);
                    while self.now() < wake - WAKE_EPSILON {
                        if let Some(outcome) = self.interrupted() {
                            return Ok(self.stop(arm, campaign, outcome));
                        }
                        self.step(arm);
                    }
                }
            }
        }
    }

    fn stop<A, C>(&mut self, arm: &mut A, campaign: &mut C, outcome: RunOutcome) -> RunOutcome
    where
        A: ArmBody + ?Sized,
        C: Campaign<A> + ?Sized,
    {
        match outcome {
            RunOutcome::TimedOut => warn!("Simulated-time ceiling reached at {:.2} s, cancelling campaign", self.now()),
            _ => info!("Campaign cancelled at {:.2} s simulated", self.now()),
        }
        campaign.cancel(arm);
        debug!("Driver stopped after {} ticks", self.ticks);
        outcome
    }
}
