use crate::collaborators::ChannelModel;
use crate::discovery::RangePolicy;
use crate::node::NodeTemplate;
use crate::orchestrator::RetryPolicy;
use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum LocatorConfig {
    Consul { address: String },
    Static { mobility: Vec<String>, channel: Vec<String> },
}

impl Default for LocatorConfig {
    fn default() -> Self {
        LocatorConfig::Consul {
            address: "127.0.0.1:8500".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SimConfig {
    pub name: String,
    pub num_nodes: u32,
    pub ticks: u64,
    /// Edge length of the cube nodes are initially placed in.
    pub volume: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub seed: Option<u64>,
    pub range_policy: RangePolicy,
    pub mobility_concurrency: usize,
    pub link_concurrency: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tick_deadline_ms: Option<u64>,
    /// Failure rate above which a tick raises an alarm.
    pub alarm_threshold: f64,
    pub mobility_service: String,
    pub channel_service: String,
    pub results_dir: String,
    pub retry: RetryPolicy,
    pub locator: LocatorConfig,
    pub channel_model: ChannelModel,
    pub node: NodeTemplate,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            name: "default_sim".to_string(),
            num_nodes: 10,
            ticks: 1,
            volume: 5_000.0,
            seed: None,
            range_policy: RangePolicy::Source,
            mobility_concurrency: 16,
            link_concurrency: 32,
            tick_deadline_ms: None,
            alarm_threshold: 0.5,
            mobility_service: "Default_MobilityModel".to_string(),
            channel_service: "Default_ChannelModel".to_string(),
            results_dir: "results".to_string(),
            retry: RetryPolicy::default(),
            locator: LocatorConfig::default(),
            channel_model: ChannelModel::default(),
            node: NodeTemplate::default(),
        }
    }
}

impl SimConfig {
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).with_context(|| format!("failed to read config {}", path.display()))?;
        let config: SimConfig = toml::from_str(&content).with_context(|| format!("failed to parse config {}", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_toml(&self) -> Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    pub fn validate(&self) -> Result<()> {
        if self.num_nodes == 0 {
            bail!("num_nodes must be at least 1");
        }
        if self.mobility_concurrency == 0 || self.link_concurrency == 0 {
            bail!("concurrency caps must be at least 1");
        }
        if self.retry.max_attempts == 0 {
            bail!("retry.max_attempts must be at least 1");
        }
        if !(0.0..=1.0).contains(&self.alarm_threshold) {
            bail!("alarm_threshold must lie in [0, 1], got {}", self.alarm_threshold);
        }
        if !(self.node.range >= 0.0) {
            bail!("node.range must be non-negative, got {}", self.node.range);
        }
        if !(self.volume.is_finite() && self.volume >= 0.0) {
            bail!("volume must be finite and non-negative, got {}", self.volume);
        }
        Ok(())
    }

    pub fn tick_deadline(&self) -> Option<Duration> {
        self.tick_deadline_ms.map(Duration::from_millis)
    }

    pub fn with_nodes(mut self, num_nodes: u32) -> Self {
        self.num_nodes = num_nodes;
        self
    }

    pub fn with_ticks(mut self, ticks: u64) -> Self {
        self.ticks = ticks;
        self
    }

    pub fn with_range(mut self, range: f64) -> Self {
        self.node.range = range;
        self
    }

    pub fn with_concurrency(mut self, mobility: usize, links: usize) -> Self {
        self.mobility_concurrency = mobility;
        self.link_concurrency = links;
        self
    }

    pub fn with_deadline(mut self, deadline_ms: Option<u64>) -> Self {
        self.tick_deadline_ms = deadline_ms;
        self
    }
}
