//! Runtime counters and tick-budget monitoring.
//!
//! Counters are plain `AtomicU64`s bumped on the hot path with relaxed
//! ordering and read only on export. The tick monitor keeps a ring buffer of
//! recent tick durations behind a `parking_lot::Mutex`; it is written once
//! per tick and read rarely.

use std::fmt::Write as _;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

use parking_lot::Mutex;

// ---------------------------------------------------------------------------
// Counters (lock-free)
// ---------------------------------------------------------------------------

/// Atomic counters for engine events, shared by every context in a region.
#[derive(Debug)]
pub struct EncounterCounters {
    /// Damage entries recorded into any ledger.
    pub damage_recorded: AtomicU64,
    /// Lifecycle events handed to the reaction hook successfully.
    pub notifications_delivered: AtomicU64,
    /// Notifications skipped because the event was already claimed.
    pub notifications_suppressed: AtomicU64,
    /// Notifications whose reaction hook failed.
    pub notifications_failed: AtomicU64,
    /// Destruction events that needed pilot/owner attribution.
    pub attribution_fallbacks: AtomicU64,
    /// Attribution lookups that errored.
    pub attribution_failures: AtomicU64,
    /// Region ticks completed.
    pub ticks: AtomicU64,
    /// Ticks that took longer than their frame.
    pub tick_overruns: AtomicU64,
}

impl EncounterCounters {
    /// Zeroed counters.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            damage_recorded: AtomicU64::new(0),
            notifications_delivered: AtomicU64::new(0),
            notifications_suppressed: AtomicU64::new(0),
            notifications_failed: AtomicU64::new(0),
            attribution_fallbacks: AtomicU64::new(0),
            attribution_failures: AtomicU64::new(0),
            ticks: AtomicU64::new(0),
            tick_overruns: AtomicU64::new(0),
        }
    }

    /// Add one to `counter`.
    pub fn bump(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    /// Read every counter.
    #[must_use]
    pub fn snapshot(&self) -> CounterSnapshot {
        let load = |c: &AtomicU64| c.load(Ordering::Relaxed);
        CounterSnapshot {
            damage_recorded: load(&self.damage_recorded),
            notifications_delivered: load(&self.notifications_delivered),
            notifications_suppressed: load(&self.notifications_suppressed),
            notifications_failed: load(&self.notifications_failed),
            attribution_fallbacks: load(&self.attribution_fallbacks),
            attribution_failures: load(&self.attribution_failures),
            ticks: load(&self.ticks),
            tick_overruns: load(&self.tick_overruns),
        }
    }
}

impl Default for EncounterCounters {
    fn default() -> Self {
        Self::new()
    }
}

/// Counter values at one point in time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CounterSnapshot {
    /// Damage entries recorded.
    pub damage_recorded: u64,
    /// Notifications delivered.
    pub notifications_delivered: u64,
    /// Notifications suppressed as duplicates.
    pub notifications_suppressed: u64,
    /// Notifications that failed.
    pub notifications_failed: u64,
    /// Attribution fallbacks attempted.
    pub attribution_fallbacks: u64,
    /// Attribution lookups that failed.
    pub attribution_failures: u64,
    /// Ticks completed.
    pub ticks: u64,
    /// Ticks over their frame budget.
    pub tick_overruns: u64,
}

impl CounterSnapshot {
    /// Prometheus text exposition of every counter.
    #[must_use]
    pub fn to_prometheus(&self) -> String {
        let rows: [(&str, &str, u64); 8] = [
            ("encounter_damage_recorded_total", "Damage entries recorded", self.damage_recorded),
            (
                "encounter_notifications_delivered_total",
                "Lifecycle notifications delivered",
                self.notifications_delivered,
            ),
            (
                "encounter_notifications_suppressed_total",
                "Duplicate lifecycle notifications suppressed",
                self.notifications_suppressed,
            ),
            (
                "encounter_notifications_failed_total",
                "Lifecycle notifications whose reaction failed",
                self.notifications_failed,
            ),
            (
                "encounter_attribution_fallbacks_total",
                "Destruction events attributed via pilot or owner",
                self.attribution_fallbacks,
            ),
            (
                "encounter_attribution_failures_total",
                "Attribution lookups that failed",
                self.attribution_failures,
            ),
            ("encounter_ticks_total", "Region ticks completed", self.ticks),
            ("encounter_tick_overruns_total", "Ticks over frame budget", self.tick_overruns),
        ];

        let mut out = String::new();
        for (name, help, value) in rows {
            let _ = writeln!(out, "# HELP {name} {help}");
            let _ = writeln!(out, "# TYPE {name} counter");
            let _ = writeln!(out, "{name} {value}");
        }
        out
    }
}

// ---------------------------------------------------------------------------
// Tick Budget Monitor
// ---------------------------------------------------------------------------

const TICK_HISTORY: usize = 256;

/// Ring buffer of recent tick durations against a per-tick budget.
#[derive(Debug)]
pub struct TickBudgetMonitor {
    budget_ms: f64,
    history: Mutex<TickHistory>,
}

#[derive(Debug)]
struct TickHistory {
    timings: [f64; TICK_HISTORY],
    next: usize,
    count: u64,
}

impl TickHistory {
    fn filled(&self) -> &[f64] {
        let n = usize::try_from(self.count).map_or(TICK_HISTORY, |c| c.min(TICK_HISTORY));
        &self.timings[..n]
    }
}

impl TickBudgetMonitor {
    /// Monitor ticks against `budget_ms` milliseconds.
    #[must_use]
    pub fn new(budget_ms: f64) -> Self {
        Self {
            budget_ms,
            history: Mutex::new(TickHistory {
                timings: [0.0; TICK_HISTORY],
                next: 0,
                count: 0,
            }),
        }
    }

    /// Start timing a tick; the duration is recorded when the guard drops.
    pub fn begin_tick(&self) -> TickGuard<'_> {
        TickGuard {
            monitor: self,
            start: Instant::now(),
        }
    }

    /// Record a tick duration in milliseconds.
    pub fn record(&self, ms: f64) {
        let mut h = self.history.lock();
        let idx = h.next;
        h.timings[idx] = ms;
        h.next = (idx + 1) % TICK_HISTORY;
        h.count += 1;
    }

    /// Most recent tick duration, 0 before the first tick.
    #[must_use]
    pub fn last_tick_ms(&self) -> f64 {
        let h = self.history.lock();
        if h.count == 0 {
            return 0.0;
        }
        h.timings[(h.next + TICK_HISTORY - 1) % TICK_HISTORY]
    }

    /// Whether the most recent tick exceeded the budget.
    #[must_use]
    pub fn is_over_budget(&self) -> bool {
        self.last_tick_ms() > self.budget_ms
    }

    /// P50/P95/P99/max over the buffered ticks.
    #[must_use]
    #[allow(
        clippy::cast_precision_loss,
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss
    )]
    pub fn percentiles(&self) -> TickPercentiles {
        let mut sorted = self.history.lock().filled().to_vec();
        let n = sorted.len();
        if n == 0 {
            return TickPercentiles::default();
        }
        sorted.sort_by(f64::total_cmp);

        let at = |q: f64| sorted[((n as f64 * q) as usize).min(n - 1)];
        let over = sorted.iter().filter(|&&t| t > self.budget_ms).count();
        TickPercentiles {
            p50: at(0.5),
            p95: at(0.95),
            p99: at(0.99),
            max: sorted[n - 1],
            over_budget_ratio: over as f64 / n as f64,
        }
    }

    /// Ticks recorded since creation.
    #[must_use]
    pub fn tick_count(&self) -> u64 {
        self.history.lock().count
    }

    /// The budget in milliseconds.
    #[must_use]
    pub fn budget_ms(&self) -> f64 {
        self.budget_ms
    }
}

/// Records elapsed time into its monitor when dropped.
pub struct TickGuard<'a> {
    monitor: &'a TickBudgetMonitor,
    start: Instant,
}

impl Drop for TickGuard<'_> {
    fn drop(&mut self) {
        self.monitor.record(self.start.elapsed().as_secs_f64() * 1000.0);
    }
}

/// Tick duration statistics in milliseconds.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct TickPercentiles {
    /// Median.
    pub p50: f64,
    /// 95th percentile.
    pub p95: f64,
    /// 99th percentile.
    pub p99: f64,
    /// Slowest buffered tick.
    pub max: f64,
    /// Fraction of buffered ticks over budget.
    pub over_budget_ratio: f64,
}

impl TickPercentiles {
    /// One-line summary for logs.
    #[must_use]
    pub fn summary(&self, budget_ms: f64) -> String {
        format!(
            "P50={:.2}ms P95={:.2}ms P99={:.2}ms Max={:.2}ms Budget={budget_ms:.1}ms Over={:.1}%",
            self.p50,
            self.p95,
            self.p99,
            self.max,
            self.over_budget_ratio * 100.0,
        )
    }
}

// ---------------------------------------------------------------------------
// Tracing span names
// ---------------------------------------------------------------------------

/// Span names shared by the engine and its runtime.
pub mod spans {
    /// One region tick.
    pub const REGION_TICK: &str = "encounter::region_tick";
    /// Applying a perception frame.
    pub const PERCEPTION: &str = "encounter::perception";
    /// Lifecycle notification dispatch.
    pub const NOTIFY: &str = "encounter::notify";
    /// Destruction attribution fallback.
    pub const ATTRIBUTION: &str = "encounter::attribution";
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counters_start_at_zero() {
        assert_eq!(EncounterCounters::new().snapshot(), CounterSnapshot::default());
    }

    #[test]
    fn bump_shows_up_in_snapshot_and_export() {
        let c = EncounterCounters::new();
        EncounterCounters::bump(&c.notifications_delivered);
        EncounterCounters::bump(&c.notifications_delivered);
        EncounterCounters::bump(&c.notifications_suppressed);

        let snap = c.snapshot();
        assert_eq!(snap.notifications_delivered, 2);
        assert_eq!(snap.notifications_suppressed, 1);

        let prom = snap.to_prometheus();
        assert!(prom.contains("encounter_notifications_delivered_total 2"));
        assert!(prom.contains("# TYPE encounter_ticks_total counter"));
    }

    #[test]
    fn monitor_tracks_last_tick_and_budget() {
        let m = TickBudgetMonitor::new(50.0);
        assert!(m.last_tick_ms().abs() < f64::EPSILON);
        m.record(10.0);
        m.record(60.0);
        assert_eq!(m.tick_count(), 2);
        assert!((m.last_tick_ms() - 60.0).abs() < f64::EPSILON);
        assert!(m.is_over_budget());
    }

    #[test]
    fn ring_buffer_wraps() {
        let m = TickBudgetMonitor::new(50.0);
        for i in 0..(TICK_HISTORY + 10) {
            #[allow(clippy::cast_precision_loss)]
            m.record(i as f64);
        }
        #[allow(clippy::cast_precision_loss)]
        let last = (TICK_HISTORY + 9) as f64;
        assert!((m.last_tick_ms() - last).abs() < f64::EPSILON);
        assert!((m.percentiles().max - last).abs() < f64::EPSILON);
    }

    #[test]
    fn percentiles_are_ordered() {
        let m = TickBudgetMonitor::new(40.0);
        for i in 0..100 {
            m.record(f64::from(i));
        }
        let p = m.percentiles();
        assert!(p.p50 <= p.p95 && p.p95 <= p.p99 && p.p99 <= p.max);
        assert!((p.over_budget_ratio - 0.59).abs() < 1e-9);
        assert!(p.summary(40.0).contains("Budget=40.0ms"));
    }

    #[test]
    fn guard_records_one_tick() {
        let m = TickBudgetMonitor::new(1_000.0);
        drop(m.begin_tick());
        assert_eq!(m.tick_count(), 1);
    }
}
