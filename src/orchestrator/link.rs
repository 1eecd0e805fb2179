use super::Dispatcher;
use super::mobility::{pick, resolve_endpoints};
use crate::collaborators::{CallError, ChannelModel, LinkEvaluator, LinkRequest, ServiceLocator};
use crate::discovery::CandidateEdge;
use crate::graph::LinkResult;
use crate::node::Snapshot;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Link results aligned index-for-index with the tick's candidate edges.
#[derive(Debug, Default)]
pub struct LinkRound {
    pub results: Vec<LinkResult>,
    pub retries: u64,
    pub peak_in_flight: usize,
}

impl LinkRound {
    pub fn failures(&self) -> usize {
        self.results.iter().filter(|r| r.is_failed()).count()
    }

    pub fn failure_rate(&self) -> f64 {
        if self.results.is_empty() {
            0.0
        } else {
            self.failures() as f64 / self.results.len() as f64
        }
    }
}

/// Fans candidate edges out to the channel-model service under its own
/// concurrency cap and folds the answers back in edge order.
pub struct LinkOrchestrator {
    evaluator: Arc<dyn LinkEvaluator>,
    locator: Arc<dyn ServiceLocator>,
    service: String,
    model: ChannelModel,
    dispatcher: Dispatcher,
}

impl LinkOrchestrator {
    pub fn new(
        evaluator: Arc<dyn LinkEvaluator>,
        locator: Arc<dyn ServiceLocator>,
        service: impl Into<String>,
        model: ChannelModel,
        dispatcher: Dispatcher,
    ) -> Self {
        Self {
            evaluator,
            locator,
            service: service.into(),
            model,
            dispatcher,
        }
    }

    pub async fn evaluate(&self, snapshot: &Snapshot, edges: &[CandidateEdge], cancel: &CancellationToken) -> LinkRound {
        if edges.is_empty() {
            return LinkRound::default();
        }

        let endpoints = match resolve_endpoints(self.locator.as_ref(), &self.service, cancel).await {
            Ok(endpoints) => endpoints,
            Err(error) => {
                warn!("Channel service lookup failed, {} link(s) marked failed: {}", edges.len(), error);
                return LinkRound {
                    results: edges.iter().map(|_| LinkResult::failed(&error, 0)).collect(),
                    ..LinkRound::default()
                };
            }
        };

        // Requests are built up front from the frozen snapshot; an edge whose
        // endpoint vanished from it (never expected) fails without a call.
        let mut results: Vec<Option<LinkResult>> = vec![None; edges.len()];
        let mut jobs = Vec::with_capacity(edges.len());
        for (idx, edge) in edges.iter().enumerate() {
            match self.request_for(idx, edge, snapshot) {
                Some(request) => jobs.push((idx, request)),
                None => {
                    let error = CallError::Unavailable(format!("{} -> {} missing from snapshot", edge.source, edge.target));
                    results[idx] = Some(LinkResult::failed(&error, 0));
                }
            }
        }
        let slots: Vec<usize> = jobs.iter().map(|(idx, _)| *idx).collect();

        let evaluator = self.evaluator.clone();
        let report = self
            .dispatcher
            .run(jobs, cancel, move |job, attempt| {
                let evaluator = evaluator.clone();
                let endpoint = pick(&endpoints, job.0, attempt);
                async move { evaluator.evaluate(&endpoint, &job.1).await }
            })
            .await;

        let retries = report.retries();
        let peak_in_flight = report.peak_in_flight;

        for (idx, outcome) in slots.into_iter().zip(report.outcomes) {
            let result = match outcome.result {
                Ok(quality) => LinkResult::Ok { quality },
                Err(error) => {
                    let edge = &edges[idx];
                    warn!("Link {} -> {} failed after {} attempt(s): {}", edge.source, edge.target, outcome.attempts, error);
                    LinkResult::failed(&error, outcome.attempts)
                }
            };
            results[idx] = Some(result);
        }

        let results: Vec<LinkResult> = results
            .into_iter()
            .map(|r| r.unwrap_or_else(|| LinkResult::failed(&CallError::Cancelled, 0)))
            .collect();

        debug!("Evaluated {} link(s), peak {} in flight", results.len(), peak_in_flight);

        LinkRound {
            results,
            retries,
            peak_in_flight,
        }
    }

    fn request_for(&self, idx: usize, edge: &CandidateEdge, snapshot: &Snapshot) -> Option<LinkRequest> {
        let tx = snapshot.get(edge.source)?;
        let rx = snapshot.get(edge.target)?;
        Some(LinkRequest {
            link_id: idx as u64,
            source: edge.source,
            target: edge.target,
            tx: tx.radio.clone(),
            rx: rx.radio.clone(),
            tx_position: tx.position(),
            rx_position: rx.position(),
            model: self.model.clone(),
        })
    }
}
