//! Bounded fan-out of collaborator calls with per-call timeout, retry and
//! a tick-wide deadline. Both the mobility refresh and the link evaluation
//! run through the same [`Dispatcher`], each with its own cap.

pub mod link;
pub mod mobility;

pub use link::{LinkOrchestrator, LinkRound};
pub use mobility::{MobilityRound, NodeFailure, PositionOracleClient};

use crate::collaborators::CallError;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio::task::{JoinHandle, JoinSet};
use tokio_util::sync::CancellationToken;
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_backoff_ms: u64,
    pub max_backoff_ms: u64,
    pub call_timeout_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_backoff_ms: 50,
            max_backoff_ms: 1_000,
            call_timeout_ms: 2_000,
        }
    }
}

impl RetryPolicy {
    pub fn call_timeout(&self) -> Duration {
        Duration::from_millis(self.call_timeout_ms)
    }

    /// Delay before the attempt following `attempt` (1-based): base, 2·base, 4·base, ...
    pub fn backoff(&self, attempt: u32) -> Duration {
        let factor = 1u64 << attempt.saturating_sub(1).min(16);
        Duration::from_millis(self.base_backoff_ms.saturating_mul(factor).min(self.max_backoff_ms))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CallOutcome<T> {
    pub result: Result<T, CallError>,
    pub attempts: u32,
}

#[derive(Debug)]
pub struct BatchReport<T> {
    /// One outcome per job, in job order.
    pub outcomes: Vec<CallOutcome<T>>,
    pub peak_in_flight: usize,
}

impl<T> BatchReport<T> {
    pub fn retries(&self) -> u64 {
        self.outcomes.iter().map(|o| o.attempts.saturating_sub(1) as u64).sum()
    }
}

/// Runs a batch of independent calls with at most `concurrency` in flight.
#[derive(Debug, Clone)]
pub struct Dispatcher {
    label: &'static str,
    concurrency: usize,
    policy: RetryPolicy,
}

impl Dispatcher {
    pub fn new(label: &'static str, concurrency: usize, policy: RetryPolicy) -> Self {
        Self {
            label,
            concurrency: concurrency.max(1),
            policy,
        }
    }

    pub fn concurrency(&self) -> usize {
        self.concurrency
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// `call` receives the job and the 1-based attempt number. A task is only
    /// spawned once it holds a permit, so neither calls nor tasks ever exceed
    /// the cap. Jobs still waiting when `cancel` fires are never issued.
    pub async fn run<J, T, F, Fut>(&self, jobs: Vec<J>, cancel: &CancellationToken, call: F) -> BatchReport<T>
    where
        J: Send + Sync + 'static,
        T: Send + 'static,
        F: Fn(Arc<J>, u32) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<T, CallError>> + Send + 'static,
    {
        let total = jobs.len();
        let mut slots: Vec<Option<CallOutcome<T>>> = (0..total).map(|_| None).collect();
        let semaphore = Arc::new(Semaphore::new(self.concurrency));
        let call = Arc::new(call);
        let gauge = Arc::new(InFlight::default());
        let mut tasks = JoinSet::new();

        for (idx, job) in jobs.into_iter().enumerate() {
            let permit = tokio::select! {
                biased;
                _ = cancel.cancelled() => None,
                permit = semaphore.clone().acquire_owned() => permit.ok(),
            };
            let Some(permit) = permit else {
                slots[idx] = Some(CallOutcome { result: Err(CallError::Cancelled), attempts: 0 });
                continue;
            };

            let job = Arc::new(job);
            let call = call.clone();
            let gauge = gauge.clone();
            let cancel = cancel.clone();
            let policy = self.policy.clone();
            let label = self.label;

            tasks.spawn(async move {
                let _permit = permit;
                let outcome = with_retry(label, idx, &policy, &cancel, &gauge, |attempt| (*call)(job.clone(), attempt)).await;
                (idx, outcome)
            });
        }

        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((idx, outcome)) => slots[idx] = Some(outcome),
                Err(e) => debug!("{} task ended abnormally: {}", self.label, e),
            }
        }

        let outcomes = slots
            .into_iter()
            .map(|slot| {
                slot.unwrap_or_else(|| CallOutcome {
                    result: Err(CallError::Unavailable("call task aborted".to_string())),
                    attempts: 0,
                })
            })
            .collect();

        BatchReport {
            outcomes,
            peak_in_flight: gauge.peak.load(Ordering::Acquire),
        }
    }
}

#[derive(Debug, Default)]
struct InFlight {
    current: AtomicUsize,
    peak: AtomicUsize,
}

impl InFlight {
    fn enter(&self) {
        let now = self.current.fetch_add(1, Ordering::AcqRel) + 1;
        self.peak.fetch_max(now, Ordering::AcqRel);
    }

    fn leave(&self) {
        self.current.fetch_sub(1, Ordering::AcqRel);
    }
}

async fn with_retry<T, F, Fut>(
    label: &str,
    idx: usize,
    policy: &RetryPolicy,
    cancel: &CancellationToken,
    gauge: &InFlight,
    call: F,
) -> CallOutcome<T>
where
    F: Fn(u32) -> Fut,
    Fut: Future<Output = Result<T, CallError>>,
{
    let timeout = policy.call_timeout();
    let mut attempts = 0;

    loop {
        attempts += 1;

        gauge.enter();
        let result = tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(CallError::Cancelled),
            r = tokio::time::timeout(timeout, call(attempts)) => r.unwrap_or(Err(CallError::Timeout(timeout))),
        };
        gauge.leave();

        let err = match result {
            Ok(value) => return CallOutcome { result: Ok(value), attempts },
            Err(err) => err,
        };

        if attempts >= err.attempt_limit(policy.max_attempts) || cancel.is_cancelled() {
            return CallOutcome { result: Err(err), attempts };
        }

        let backoff = policy.backoff(attempts);
        debug!("{} #{} attempt {} failed ({}), retrying in {:?}", label, idx, attempts, err, backoff);

        tokio::select! {
            biased;
            _ = cancel.cancelled() => return CallOutcome { result: Err(CallError::Cancelled), attempts },
            _ = tokio::time::sleep(backoff) => {}
        }
    }
}

/// Cancellation token that fires after the tick deadline, if any.
/// Dropping it stops the timer.
pub struct TickDeadline {
    token: CancellationToken,
    timer: Option<JoinHandle<()>>,
}

impl TickDeadline {
    pub fn start(deadline: Option<Duration>) -> Self {
        let token = CancellationToken::new();
        let timer = deadline.map(|after| {
            let token = token.clone();
            tokio::spawn(async move {
                tokio::time::sleep(after).await;
                token.cancel();
            })
        });
        Self { token, timer }
    }

    pub fn token(&self) -> &CancellationToken {
        &self.token
    }

    pub fn expired(&self) -> bool {
        self.token.is_cancelled()
    }
}

impl Drop for TickDeadline {
    fn drop(&mut self) {
        if let Some(timer) = self.timer.take() {
            timer.abort();
        }
    }
}
