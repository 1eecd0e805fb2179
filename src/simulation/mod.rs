pub mod config;
pub use config::{LocatorConfig, SimConfig};

use crate::collaborators::{
    ConsulLocator, Endpoint, HttpLinkEvaluator, HttpPositionOracle, LinkEvaluator, PositionOracle, ServiceLocator,
    StaticLocator,
};
use crate::discovery::NeighborDiscovery;
use crate::graph::{GraphAssembler, NeighborGraph};
use crate::metrics::logger::RunRecorder;
use crate::metrics::{Alarm, MetricsCollector, TickDiagnostics};
use crate::node::NodeStateStore;
use crate::orchestrator::{Dispatcher, LinkOrchestrator, PositionOracleClient, TickDeadline};
use anyhow::{Context, Result};
use indicatif::{ProgressBar, ProgressStyle};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tracing::{info, warn};

/// What one tick produced.
#[derive(Debug, Clone)]
pub struct TickReport {
    pub graph: NeighborGraph,
    pub diagnostics: TickDiagnostics,
}

/// Drives ticks strictly one after another: move nodes, rebuild the index,
/// discover neighbors, evaluate links, assemble the graph.
pub struct Simulation {
    config: SimConfig,
    store: NodeStateStore,
    discovery: NeighborDiscovery,
    mobility: PositionOracleClient,
    links: LinkOrchestrator,
    pub metrics: MetricsCollector,
    next_tick: u64,
}

impl Simulation {
    pub fn new(
        config: SimConfig,
        store: NodeStateStore,
        oracle: Arc<dyn PositionOracle>,
        evaluator: Arc<dyn LinkEvaluator>,
        locator: Arc<dyn ServiceLocator>,
    ) -> Self {
        let mobility = PositionOracleClient::new(
            oracle,
            locator.clone(),
            config.mobility_service.clone(),
            Dispatcher::new("mobility", config.mobility_concurrency, config.retry.clone()),
        );
        let links = LinkOrchestrator::new(
            evaluator,
            locator,
            config.channel_service.clone(),
            config.channel_model.clone(),
            Dispatcher::new("link", config.link_concurrency, config.retry.clone()),
        );

        Self {
            discovery: NeighborDiscovery::new(config.range_policy),
            config,
            store,
            mobility,
            links,
            metrics: MetricsCollector::new(),
            next_tick: 0,
        }
    }

    /// Generated population talking to the HTTP collaborators.
    pub fn from_config(config: SimConfig) -> Result<Self> {
        config.validate()?;

        let timeout = config.retry.call_timeout();
        let locator: Arc<dyn ServiceLocator> = match &config.locator {
            LocatorConfig::Consul { address } => Arc::new(ConsulLocator::new(address.clone(), timeout)?),
            LocatorConfig::Static { mobility, channel } => Arc::new(
                StaticLocator::new()
                    .with_service(config.mobility_service.clone(), parse_endpoints(mobility)?)
                    .with_service(config.channel_service.clone(), parse_endpoints(channel)?),
            ),
        };
        let oracle = Arc::new(HttpPositionOracle::new(timeout)?);
        let evaluator = Arc::new(HttpLinkEvaluator::new(timeout)?);
        let store = NodeStateStore::populate(config.num_nodes, &config.node, config.volume, config.seed);

        Ok(Self::new(config, store, oracle, evaluator, locator))
    }

    pub fn config(&self) -> &SimConfig {
        &self.config
    }

    pub fn store(&self) -> &NodeStateStore {
        &self.store
    }

    /// Run one full tick. Collaborator failures degrade the result but never
    /// fail the call.
    pub async fn step(&mut self) -> Result<TickReport> {
        let started = Instant::now();
        let tick = self.next_tick;
        let threshold = self.config.alarm_threshold;
        let deadline = TickDeadline::start(self.config.tick_deadline());
        let mut alarms = Vec::new();

        // Previous tick is fully assembled, so the store may move now.
        let before = self.store.snapshot();
        let moved = self.mobility.refresh(&before, deadline.token()).await;
        for (id, state) in &moved.updates {
            self.store.advance(*id, state.clone())?;
        }
        if let Some(alarm) = Alarm::mobility(moved.failure_rate(), threshold) {
            warn!(
                "Tick {}: {} of {} mobility calls failed ({:.0}%)",
                tick,
                moved.failures.len(),
                moved.calls,
                moved.failure_rate() * 100.0
            );
            alarms.push(alarm);
        }

        // Frozen for the rest of the tick.
        let snapshot = self.store.snapshot();
        let index = NeighborDiscovery::build_index(&snapshot);
        let edges = self.discovery.discover(&snapshot, &index);

        let evaluated = self.links.evaluate(&snapshot, &edges, deadline.token()).await;
        let link_failures = evaluated.failures();
        if let Some(alarm) = Alarm::link(evaluated.failure_rate(), threshold) {
            warn!(
                "Tick {}: {} of {} link evaluations failed ({:.0}%)",
                tick,
                link_failures,
                edges.len(),
                evaluated.failure_rate() * 100.0
            );
            alarms.push(alarm);
        }

        let diagnostics = TickDiagnostics {
            tick,
            nodes: snapshot.len(),
            mobility_calls: moved.calls,
            mobility_failures: moved.failures,
            edges: edges.len(),
            link_failures,
            retries: moved.retries + evaluated.retries,
            peak_mobility_in_flight: moved.peak_in_flight,
            peak_link_in_flight: evaluated.peak_in_flight,
            alarms,
            deadline_expired: deadline.expired(),
            elapsed: started.elapsed(),
        };

        let graph = GraphAssembler::assemble(tick, snapshot.ids(), &edges, evaluated.results)?;
        self.metrics.record(&diagnostics);
        self.next_tick += 1;

        info!(
            "Tick {}: {} nodes, {} edges ({} failed), {} node(s) held in place, {:.1}ms",
            tick,
            diagnostics.nodes,
            diagnostics.edges,
            diagnostics.link_failures,
            diagnostics.mobility_failures.len(),
            diagnostics.elapsed.as_secs_f64() * 1000.0
        );

        Ok(TickReport { graph, diagnostics })
    }

    pub async fn run(&mut self) -> Result<()> {
        info!("Starting simulation: {}", self.config.name);
        info!("Nodes: {}, Ticks: {}", self.store.len(), self.config.ticks);
        info!(
            "Concurrency: {} mobility / {} link calls, range policy {:?}",
            self.config.mobility_concurrency, self.config.link_concurrency, self.config.range_policy
        );

        let dir = PathBuf::from(&self.config.results_dir);
        let stem = format!("{}_{}", self.config.name, chrono::Local::now().format("%Y%m%d_%H%M%S"));
        let mut recorder = RunRecorder::create(&dir, &stem)?;

        let pb = ProgressBar::new(self.config.ticks);
        pb.set_style(
            ProgressStyle::default_bar()
                .template("[{elapsed_precise}] {bar:40.cyan/blue} tick {pos}/{len} {msg}")?
                .progress_chars("█▓░"),
        );

        for _ in 0..self.config.ticks {
            let report = self.step().await?;
            if let Some(row) = self.metrics.latest() {
                recorder.record(&report.graph, &row)?;
            }
            pb.inc(1);
            pb.set_message(format!(
                "Edges: {} | Failed: {} | Alarms: {}",
                report.diagnostics.edges,
                report.diagnostics.link_failures,
                report.diagnostics.alarms.len()
            ));
        }

        pb.finish_with_message("Simulation complete");
        info!("Graphs saved to: {}", recorder.graph_path().display());
        info!("Tick metrics saved to: {}", recorder.csv_path().display());
        recorder.finish()?;

        self.save_summary(&dir.join(format!("{}_summary.json", stem)))?;
        Ok(())
    }

    fn save_summary(&self, path: &Path) -> Result<()> {
        let summary = self.metrics.summary();
        std::fs::write(path, serde_json::to_string_pretty(&summary)?)?;
        info!("Summary saved to: {}", path.display());

        info!("Avg edges per tick: {:.1}", summary.avg_edges_per_tick);
        info!("Link failures: {} of {}", summary.total_link_failures, summary.total_edges);
        info!("Avg tick time: {:.2} ms", summary.avg_tick_ms);
        if !summary.alarms.is_empty() {
            warn!("{} alarm(s) raised during the run", summary.alarms.len());
        }

        Ok(())
    }
}

fn parse_endpoints(raw: &[String]) -> Result<Vec<Endpoint>> {
    raw.iter()
        .map(|s| Endpoint::parse(s).with_context(|| format!("invalid endpoint '{}', expected host:port", s)))
        .collect()
}
