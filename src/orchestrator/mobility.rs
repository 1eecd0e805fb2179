use super::Dispatcher;
use crate::collaborators::{CallError, Endpoint, LocatorError, MobilityRequest, PositionOracle, ServiceLocator};
use crate::node::{KinematicState, NodeId, Snapshot};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

#[derive(Debug, Clone, PartialEq)]
pub struct NodeFailure {
    pub node: NodeId,
    pub error: CallError,
    pub attempts: u32,
}

/// Outcome of one mobility refresh. Nodes listed in `failures` keep their
/// previous state for the tick.
#[derive(Debug, Default)]
pub struct MobilityRound {
    pub updates: Vec<(NodeId, KinematicState)>,
    pub failures: Vec<NodeFailure>,
    pub calls: usize,
    pub retries: u64,
    pub peak_in_flight: usize,
}

impl MobilityRound {
    pub fn failure_rate(&self) -> f64 {
        if self.calls == 0 {
            0.0
        } else {
            self.failures.len() as f64 / self.calls as f64
        }
    }
}

/// Asks the mobility service for every node's next state, one call per node.
pub struct PositionOracleClient {
    oracle: Arc<dyn PositionOracle>,
    locator: Arc<dyn ServiceLocator>,
    service: String,
    dispatcher: Dispatcher,
}

impl PositionOracleClient {
    pub fn new(
        oracle: Arc<dyn PositionOracle>,
        locator: Arc<dyn ServiceLocator>,
        service: impl Into<String>,
        dispatcher: Dispatcher,
    ) -> Self {
        Self {
            oracle,
            locator,
            service: service.into(),
            dispatcher,
        }
    }

    pub async fn refresh(&self, snapshot: &Snapshot, cancel: &CancellationToken) -> MobilityRound {
        let calls = snapshot.len();
        if calls == 0 {
            return MobilityRound::default();
        }

        let endpoints = match resolve_endpoints(self.locator.as_ref(), &self.service, cancel).await {
            Ok(endpoints) => endpoints,
            Err(error) => {
                warn!("Mobility service lookup failed, no node moves this tick: {}", error);
                return MobilityRound {
                    failures: snapshot
                        .ids()
                        .map(|node| NodeFailure { node, error: error.clone(), attempts: 0 })
                        .collect(),
                    calls,
                    ..MobilityRound::default()
                };
            }
        };

        let jobs: Vec<(usize, MobilityRequest)> = snapshot
            .nodes()
            .iter()
            .enumerate()
            .map(|(idx, n)| (idx, MobilityRequest { node: n.id, state: n.state.clone() }))
            .collect();

        let oracle = self.oracle.clone();
        let report = self
            .dispatcher
            .run(jobs, cancel, move |job, attempt| {
                let oracle = oracle.clone();
                let endpoint = pick(&endpoints, job.0, attempt);
                async move { oracle.advance(&endpoint, &job.1).await.and_then(finite_state) }
            })
            .await;

        let mut round = MobilityRound {
            calls,
            retries: report.retries(),
            peak_in_flight: report.peak_in_flight,
            ..MobilityRound::default()
        };

        for (node, outcome) in snapshot.ids().zip(report.outcomes) {
            match outcome.result {
                Ok(state) => round.updates.push((node, state)),
                Err(error) => {
                    debug!("{} keeps its position: {} after {} attempt(s)", node, error, outcome.attempts);
                    round.failures.push(NodeFailure { node, error, attempts: outcome.attempts });
                }
            }
        }
        round
    }
}

// A NaN coordinate would poison every range test it touches.
fn finite_state(state: KinematicState) -> Result<KinematicState, CallError> {
    if state.is_finite() {
        Ok(state)
    } else {
        Err(CallError::Malformed(format!(
            "non-finite kinematic state at ({}, {}, {})",
            state.position.x, state.position.y, state.position.z
        )))
    }
}

/// Resolve once per tick. An empty answer counts as an unavailable service,
/// and the lookup gives up as soon as the tick deadline fires.
pub(crate) async fn resolve_endpoints(
    locator: &dyn ServiceLocator,
    service: &str,
    cancel: &CancellationToken,
) -> Result<Arc<Vec<Endpoint>>, CallError> {
    let endpoints = tokio::select! {
        biased;
        _ = cancel.cancelled() => return Err(CallError::Cancelled),
        resolved = locator.resolve(service) => resolved?,
    };
    if endpoints.is_empty() {
        return Err(LocatorError::NoEndpoints(service.to_string()).into());
    }
    Ok(Arc::new(endpoints))
}

/// Round-robin over the tick's endpoints; retries move on to the next one.
pub(crate) fn pick(endpoints: &[Endpoint], idx: usize, attempt: u32) -> Endpoint {
    endpoints[(idx + attempt as usize - 1) % endpoints.len()].clone()
}
