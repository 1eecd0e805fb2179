#![allow(dead_code)]

use async_trait::async_trait;
use radiomesh::collaborators::LocatorError;
use radiomesh::prelude::*;
use std::collections::HashSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

pub const MOBILITY: &str = "Default_MobilityModel";
pub const CHANNEL: &str = "Default_ChannelModel";

pub fn store_at(points: &[(f64, f64, f64)], range: f64) -> NodeStateStore {
    let template = NodeTemplate { range, ..NodeTemplate::default() };
    NodeStateStore::new(
        points
            .iter()
            .enumerate()
            .map(|(i, &(x, y, z))| template.instantiate(NodeId::new(i as u64), Position::new(x, y, z))),
    )
    .unwrap()
}

pub fn locator() -> Arc<StaticLocator> {
    Arc::new(
        StaticLocator::new()
            .with_service(MOBILITY, vec![Endpoint::new("mobility.local", 7001)])
            .with_service(CHANNEL, vec![Endpoint::new("channel-a.local", 7002), Endpoint::new("channel-b.local", 7002)]),
    )
}

pub fn fast_config() -> SimConfig {
    let mut config = SimConfig::default();
    config.retry = RetryPolicy {
        max_attempts: 3,
        base_backoff_ms: 1,
        max_backoff_ms: 5,
        call_timeout_ms: 200,
    };
    config
}

pub fn ids(neighbors: &[Neighbor]) -> Vec<u64> {
    neighbors.iter().map(|n| n.id.as_u64()).collect()
}

/// Hands back the state it was given.
pub struct FrozenOracle;

#[async_trait]
impl PositionOracle for FrozenOracle {
    async fn advance(&self, _endpoint: &Endpoint, request: &MobilityRequest) -> Result<KinematicState, CallError> {
        Ok(request.state.clone())
    }
}

/// Shifts every node by a fixed offset along x.
pub struct ShiftOracle(pub f64);

#[async_trait]
impl PositionOracle for ShiftOracle {
    async fn advance(&self, _endpoint: &Endpoint, request: &MobilityRequest) -> Result<KinematicState, CallError> {
        let mut state = request.state.clone();
        state.position.x += self.0;
        Ok(state)
    }
}

/// Answers with a NaN x coordinate for even ids, a small shift otherwise.
pub struct NanOracle;

#[async_trait]
impl PositionOracle for NanOracle {
    async fn advance(&self, _endpoint: &Endpoint, request: &MobilityRequest) -> Result<KinematicState, CallError> {
        let mut state = request.state.clone();
        if request.node.as_u64() % 2 == 0 {
            state.position.x = f64::NAN;
        } else {
            state.position.y += 1.0;
        }
        Ok(state)
    }
}

pub struct FailingOracle;

#[async_trait]
impl PositionOracle for FailingOracle {
    async fn advance(&self, _endpoint: &Endpoint, _request: &MobilityRequest) -> Result<KinematicState, CallError> {
        Err(CallError::Unavailable("connection refused".into()))
    }
}

/// Deterministic link quality derived from the pair geometry.
pub struct DistanceEvaluator;

#[async_trait]
impl LinkEvaluator for DistanceEvaluator {
    async fn evaluate(&self, _endpoint: &Endpoint, request: &LinkRequest) -> Result<f64, CallError> {
        Ok((request.tx_position.distance(&request.rx_position) / 100.0).min(1.0))
    }
}

/// Always fails for the listed directed edges, otherwise defers to
/// [`DistanceEvaluator`].
pub struct FailFor {
    pub edges: HashSet<(u64, u64)>,
    pub calls: AtomicUsize,
}

impl FailFor {
    pub fn new(edges: &[(u64, u64)]) -> Self {
        Self {
            edges: edges.iter().copied().collect(),
            calls: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl LinkEvaluator for FailFor {
    async fn evaluate(&self, endpoint: &Endpoint, request: &LinkRequest) -> Result<f64, CallError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.edges.contains(&(request.source.as_u64(), request.target.as_u64())) {
            return Err(CallError::Server { status: 500 });
        }
        DistanceEvaluator.evaluate(endpoint, request).await
    }
}

/// Records how many evaluations overlap.
#[derive(Default)]
pub struct PeakRecorder {
    current: AtomicUsize,
    pub peak: AtomicUsize,
    pub calls: AtomicUsize,
}

#[async_trait]
impl LinkEvaluator for PeakRecorder {
    async fn evaluate(&self, _endpoint: &Endpoint, _request: &LinkRequest) -> Result<f64, CallError> {
        let now = self.current.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        self.calls.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(2)).await;
        self.current.fetch_sub(1, Ordering::SeqCst);
        Ok(0.0)
    }
}

/// Never answers within any reasonable deadline.
pub struct StalledEvaluator;

#[async_trait]
impl LinkEvaluator for StalledEvaluator {
    async fn evaluate(&self, _endpoint: &Endpoint, _request: &LinkRequest) -> Result<f64, CallError> {
        tokio::time::sleep(Duration::from_secs(30)).await;
        Ok(0.0)
    }
}

pub struct DownLocator;

#[async_trait]
impl ServiceLocator for DownLocator {
    async fn resolve(&self, _service: &str) -> Result<Vec<Endpoint>, LocatorError> {
        Err(LocatorError::Unreachable("connection refused".into()))
    }
}
