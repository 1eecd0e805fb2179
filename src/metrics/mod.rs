pub mod logger;

use crate::orchestrator::NodeFailure;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::{Duration, Instant};
use parking_lot::RwLock;
use tracing::warn;

/// Raised when a tick's failure rate strictly exceeds the configured
/// threshold. Never stops the run.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Alarm {
    MobilityFailureRate { rate: f64, threshold: f64 },
    LinkFailureRate { rate: f64, threshold: f64 },
}

impl Alarm {
    pub fn mobility(rate: f64, threshold: f64) -> Option<Self> {
        (rate > threshold).then_some(Alarm::MobilityFailureRate { rate, threshold })
    }

    pub fn link(rate: f64, threshold: f64) -> Option<Self> {
        (rate > threshold).then_some(Alarm::LinkFailureRate { rate, threshold })
    }
}

/// Everything that went on during one tick, besides the graph itself.
#[derive(Debug, Clone, Default)]
pub struct TickDiagnostics {
    pub tick: u64,
    pub nodes: usize,
    pub mobility_calls: usize,
    pub mobility_failures: Vec<NodeFailure>,
    pub edges: usize,
    pub link_failures: usize,
    pub retries: u64,
    pub peak_mobility_in_flight: usize,
    pub peak_link_in_flight: usize,
    pub alarms: Vec<Alarm>,
    pub deadline_expired: bool,
    pub elapsed: Duration,
}

impl TickDiagnostics {
    pub fn mobility_failure_rate(&self) -> f64 {
        ratio(self.mobility_failures.len(), self.mobility_calls)
    }

    pub fn link_failure_rate(&self) -> f64 {
        ratio(self.link_failures, self.edges)
    }
}

fn ratio(part: usize, whole: usize) -> f64 {
    if whole == 0 { 0.0 } else { part as f64 / whole as f64 }
}

/// Flat per-tick row, one line of the run's CSV.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    pub tick: u64,
    pub timestamp: f64,
    pub nodes: usize,
    pub mobility_calls: usize,
    pub mobility_failures: usize,
    pub edges: usize,
    pub link_failures: usize,
    pub retries: u64,
    pub peak_link_in_flight: usize,
    pub alarms: usize,
    pub deadline_expired: bool,
    pub tick_ms: f64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RunSummary {
    pub ticks: u64,
    pub total_edges: u64,
    pub total_link_failures: u64,
    pub total_mobility_failures: u64,
    pub total_retries: u64,
    pub alarms: Vec<(u64, Alarm)>,
    pub avg_edges_per_tick: f64,
    pub avg_tick_ms: f64,
    pub max_tick_ms: f64,
}

#[derive(Debug, Clone)]
pub struct MetricsCollector {
    inner: Arc<RwLock<MetricsInner>>,
    start_time: Instant,
}

#[derive(Debug, Default)]
struct MetricsInner {
    summary: RunSummary,
    total_tick_ms: f64,
    snapshots: Vec<MetricsSnapshot>,
}

impl MetricsCollector {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(RwLock::new(MetricsInner::default())),
            start_time: Instant::now(),
        }
    }

    pub fn record(&self, diag: &TickDiagnostics) {
        let tick_ms = diag.elapsed.as_secs_f64() * 1000.0;
        let snapshot = MetricsSnapshot {
            tick: diag.tick,
            timestamp: self.start_time.elapsed().as_secs_f64(),
            nodes: diag.nodes,
            mobility_calls: diag.mobility_calls,
            mobility_failures: diag.mobility_failures.len(),
            edges: diag.edges,
            link_failures: diag.link_failures,
            retries: diag.retries,
            peak_link_in_flight: diag.peak_link_in_flight,
            alarms: diag.alarms.len(),
            deadline_expired: diag.deadline_expired,
            tick_ms,
        };

        let mut inner = self.inner.write();
        let summary = &mut inner.summary;
        summary.ticks += 1;
        summary.total_edges += diag.edges as u64;
        summary.total_link_failures += diag.link_failures as u64;
        summary.total_mobility_failures += diag.mobility_failures.len() as u64;
        summary.total_retries += diag.retries;
        summary.alarms.extend(diag.alarms.iter().map(|a| (diag.tick, *a)));
        summary.max_tick_ms = summary.max_tick_ms.max(tick_ms);
        inner.total_tick_ms += tick_ms;

        if diag.deadline_expired {
            warn!("Tick {} hit its deadline after {:.1}ms", diag.tick, tick_ms);
        }

        inner.snapshots.push(snapshot);
    }

    /// Row of the most recently recorded tick.
    pub fn latest(&self) -> Option<MetricsSnapshot> {
        self.inner.read().snapshots.last().cloned()
    }

    pub fn get_snapshots(&self) -> Vec<MetricsSnapshot> {
        self.inner.read().snapshots.clone()
    }

    pub fn summary(&self) -> RunSummary {
        let inner = self.inner.read();
        let mut summary = inner.summary.clone();
        if summary.ticks > 0 {
            summary.avg_edges_per_tick = summary.total_edges as f64 / summary.ticks as f64;
            summary.avg_tick_ms = inner.total_tick_ms / summary.ticks as f64;
        }
        summary
    }
}

impl Default for MetricsCollector {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn alarm_needs_rate_strictly_above_threshold() {
        assert_eq!(Alarm::mobility(0.5, 0.5), None);
        assert!(Alarm::mobility(0.51, 0.5).is_some());
        assert_eq!(Alarm::link(1.0, 0.2), Some(Alarm::LinkFailureRate { rate: 1.0, threshold: 0.2 }));
    }

    #[test]
    fn summary_accumulates_ticks() {
        let metrics = MetricsCollector::new();
        for tick in 0..4 {
            metrics.record(&TickDiagnostics {
                tick,
                edges: 10,
                link_failures: (tick % 2) as usize,
                alarms: if tick == 3 { vec![Alarm::LinkFailureRate { rate: 0.9, threshold: 0.5 }] } else { vec![] },
                elapsed: Duration::from_millis(20),
                ..TickDiagnostics::default()
            });
        }
        let summary = metrics.summary();
        assert_eq!(summary.ticks, 4);
        assert_eq!(summary.total_edges, 40);
        assert_eq!(summary.total_link_failures, 2);
        assert_eq!(summary.alarms.len(), 1);
        assert_eq!(summary.alarms[0].0, 3);
        assert!((summary.avg_edges_per_tick - 10.0).abs() < 1e-9);
        assert_eq!(metrics.get_snapshots().len(), 4);
    }
}
