//! Periodic cycle driver.

use std::time::Duration;

use tokio::sync::watch;
use tokio::time::{interval_at, Instant, Interval, MissedTickBehavior};
use tracing::{debug, error, info};

use crate::engine::ChaosEngine;
use crate::error::{CycleError, SelectError};

/// Longest supported cycle interval (one year).
pub const MAX_INTERVAL: Duration = Duration::from_secs(365 * 24 * 60 * 60);

/// Runs a [`ChaosEngine`] cycle now and then once per tick until shutdown.
pub struct ControlLoop {
    engine: ChaosEngine,
}

impl ControlLoop {
    pub fn new(engine: ChaosEngine) -> Self {
        Self { engine }
    }

    /// Ticker whose first tick fires one `period` from now. Periods above
    /// [`MAX_INTERVAL`] are clamped to it.
    pub fn ticker(period: Duration) -> Interval {
        let period = period.min(MAX_INTERVAL);
        let mut ticker = interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        ticker
    }

    /// Run until `shutdown` flips to `true` (or its sender is dropped).
    ///
    /// The first cycle starts immediately. Shutdown is only looked at after a
    /// cycle, so a running cycle always finishes its victims. Returns the number
    /// of cycles executed.
    pub async fn run(&self, mut ticks: Interval, mut shutdown: watch::Receiver<bool>) -> u64 {
        let mut cycles = 0u64;

        loop {
            cycles += 1;
            self.run_once().await;

            if *shutdown.borrow_and_update() {
                break;
            }

            tokio::select! {
                _ = ticks.tick() => {}
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }

        info!(cycles, "chaos loop stopped");
        cycles
    }

    async fn run_once(&self) {
        match self.engine.kill_pods().await {
            Ok(report) => {
                debug!(
                    report = %serde_json::to_string(&report).unwrap_or_default(),
                    "cycle report"
                );
            }
            Err(CycleError::Select(SelectError::List(e))) => {
                error!(error = %e, "failed to list pods, retrying next cycle");
            }
            Err(e) => {
                error!(error = %e, "failed to kill pods");
            }
        }
    }
}
