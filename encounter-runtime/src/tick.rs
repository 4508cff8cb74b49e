//! Fixed-rate region tick loop.

use std::time::Duration;

use encounter_core::metrics::{EncounterCounters, TickBudgetMonitor, spans};
use encounter_core::notify::ShutdownSignal;
use tokio::time::{self, Instant, MissedTickBehavior};
use tracing::{info, info_span, warn};

use crate::config::frame_duration;
use crate::error::Result;
use crate::region::Region;

/// Drives a [`Region`] at a fixed frame rate until shutdown.
#[derive(Debug)]
pub struct TickLoop {
    frame: Duration,
    monitor: TickBudgetMonitor,
}

impl TickLoop {
    /// Loop ticking `frames_per_second` times a second.
    ///
    /// # Errors
    /// `EncounterError::InvalidTickRate` unless the rate gives a
    /// representable, non-zero frame.
    pub fn new(frames_per_second: f64) -> Result<Self> {
        let frame = frame_duration(frames_per_second)?;
        Ok(Self {
            frame,
            monitor: TickBudgetMonitor::new(frame.as_secs_f64() * 1000.0),
        })
    }

    /// Length of one frame.
    #[must_use]
    pub fn frame(&self) -> Duration {
        self.frame
    }

    /// Tick timings against the frame budget.
    #[must_use]
    pub fn monitor(&self) -> &TickBudgetMonitor {
        &self.monitor
    }

    /// Tick `region` until `shutdown` fires, then await its in-flight
    /// notifications. Returns the number of ticks run.
    ///
    /// # Errors
    /// `RuntimeError::Join` if a notification task panicked.
    pub async fn run(&self, region: &mut Region, mut shutdown: ShutdownSignal) -> Result<u64> {
        let mut interval = time::interval(self.frame);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

        let mut last = Instant::now();
        let mut ticks = 0_u64;
        info!(frame_ms = self.monitor.budget_ms(), constructs = region.len(), "tick loop started");

        loop {
            tokio::select! {
                biased;
                () = shutdown.triggered() => break,
                _ = interval.tick() => {}
            }

            let now = Instant::now();
            let delta_time = now.duration_since(last).as_secs_f64();
            last = now;

            let span = info_span!(spans::REGION_TICK, tick = ticks);
            let report = span.in_scope(|| region.tick(delta_time));
            let elapsed = now.elapsed();
            self.monitor.record(elapsed.as_secs_f64() * 1000.0);
            ticks += 1;

            if elapsed > self.frame {
                EncounterCounters::bump(&region.counters().tick_overruns);
                warn!(
                    elapsed_ms = elapsed.as_secs_f64() * 1000.0,
                    budget_ms = self.monitor.budget_ms(),
                    spawned = report.notifications_spawned,
                    "tick overran its frame"
                );
            }
        }

        region.drain().await?;
        info!(
            ticks,
            timings = %self.monitor.percentiles().summary(self.monitor.budget_ms()),
            "tick loop stopped"
        );
        Ok(ticks)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RuntimeConfig;
    use crate::error::RuntimeError;
    use crate::hooks::logging_collaborators;
    use crate::steps::default_steps;
    use crate::testing::setup;
    use encounter_core::error::EncounterError;
    use encounter_core::notify::shutdown_channel;
    use encounter_core::types::ConstructId;

    #[test]
    fn non_positive_rates_fail_fast() {
        for fps in [0.0, -5.0, f64::NAN, f64::INFINITY, 1e-20, 1e300] {
            let err = TickLoop::new(fps).expect_err("invalid rate");
            assert!(matches!(err, RuntimeError::Engine(EncounterError::InvalidTickRate(_))));
        }
    }

    #[test]
    fn frame_matches_rate() {
        let tick_loop = TickLoop::new(20.0).expect("valid");
        assert_eq!(tick_loop.frame(), Duration::from_millis(50));
    }

    #[tokio::test(start_paused = true)]
    async fn runs_until_shutdown() {
        let (trigger, signal) = shutdown_channel();
        let mut region = Region::new(
            RuntimeConfig::default(),
            logging_collaborators(),
            default_steps(),
            signal.clone(),
        );
        region.spawn(setup(ConstructId(1))).expect("spawn");
        let tick_loop = TickLoop::new(20.0).expect("valid");

        let (ticks, ()) = tokio::join!(tick_loop.run(&mut region, signal), async {
            time::sleep(Duration::from_millis(260)).await;
            trigger.trigger();
        });
        let ticks = ticks.expect("clean shutdown");

        assert!((5..=7).contains(&ticks), "ran {ticks} ticks");
        assert_eq!(region.ticks(), ticks);
        assert_eq!(tick_loop.monitor().tick_count(), ticks);
        let ctx = region.context(ConstructId(1)).expect("spawned");
        assert!((ctx.delta_time() - 0.05).abs() < 1e-6);
    }

    #[tokio::test(start_paused = true)]
    async fn already_triggered_signal_runs_nothing() {
        let (trigger, signal) = shutdown_channel();
        trigger.trigger();
        let mut region = Region::new(RuntimeConfig::default(), logging_collaborators(), Vec::new(), signal.clone());
        let ticks = TickLoop::new(10.0).expect("valid").run(&mut region, signal).await.expect("ok");
        assert_eq!(ticks, 0);
    }
}
