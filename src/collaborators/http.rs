//! JSON-over-HTTP clients for the mobility and channel-model services.

use super::{CallError, ChannelModel, Endpoint, LinkEvaluator, LinkRequest, MobilityRequest, PositionOracle};
use crate::node::{KinematicState, Position, RadioParams};
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::time::Duration;

pub const MOBILITY_PATH: &str = "/mobility";
pub const CHANNEL_PATH: &str = "/model";

#[derive(Debug, Serialize, Deserialize)]
struct MobilityEnvelope {
    node: KinematicState,
}

#[derive(Debug, Serialize)]
struct ChannelParams<'a> {
    #[serde(rename = "linkid")]
    link_id: u64,
    #[serde(rename = "txnode")]
    tx: &'a RadioParams,
    #[serde(rename = "rxnode")]
    rx: &'a RadioParams,
    #[serde(rename = "txposition")]
    tx_position: &'a Position,
    #[serde(rename = "rxposition")]
    rx_position: &'a Position,
    model: &'a ChannelModel,
}

/// The channel service answers with either a bare number or an object
/// carrying the packet-loss ratio.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ChannelAnswer {
    Scalar(f64),
    Object {
        #[serde(alias = "PLR", alias = "value")]
        plr: f64,
    },
}

impl ChannelAnswer {
    fn value(&self) -> f64 {
        match self {
            ChannelAnswer::Scalar(v) => *v,
            ChannelAnswer::Object { plr } => *plr,
        }
    }
}

fn build_client(connect_timeout: Duration) -> Result<reqwest::Client, CallError> {
    reqwest::Client::builder()
        .connect_timeout(connect_timeout)
        .build()
        .map_err(|e| CallError::Unavailable(format!("failed to create HTTP client: {}", e)))
}

fn classify(err: reqwest::Error, timeout: Duration) -> CallError {
    if err.is_timeout() {
        CallError::Timeout(timeout)
    } else if err.is_decode() {
        CallError::Malformed(err.to_string())
    } else {
        CallError::Unavailable(err.to_string())
    }
}

async fn post_json<B, R>(client: &reqwest::Client, url: &str, body: &B, timeout: Duration) -> Result<R, CallError>
where
    B: Serialize + ?Sized,
    R: DeserializeOwned,
{
    let response = client
        .post(url)
        .json(body)
        .send()
        .await
        .map_err(|e| classify(e, timeout))?;

    let status = response.status();
    if status.is_server_error() {
        return Err(CallError::Server { status: status.as_u16() });
    }
    if !status.is_success() {
        return Err(CallError::Rejected { status: status.as_u16() });
    }

    let bytes = response.bytes().await.map_err(|e| classify(e, timeout))?;
    serde_json::from_slice(&bytes).map_err(|e| CallError::Malformed(e.to_string()))
}

pub struct HttpPositionOracle {
    client: reqwest::Client,
    connect_timeout: Duration,
}

impl HttpPositionOracle {
    pub fn new(connect_timeout: Duration) -> Result<Self, CallError> {
        Ok(Self {
            client: build_client(connect_timeout)?,
            connect_timeout,
        })
    }
}

#[async_trait]
impl PositionOracle for HttpPositionOracle {
    async fn advance(&self, endpoint: &Endpoint, request: &MobilityRequest) -> Result<KinematicState, CallError> {
        let body = MobilityEnvelope { node: request.state.clone() };
        let answer: MobilityEnvelope =
            post_json(&self.client, &endpoint.url(MOBILITY_PATH), &body, self.connect_timeout).await?;
        Ok(answer.node)
    }
}

pub struct HttpLinkEvaluator {
    client: reqwest::Client,
    connect_timeout: Duration,
}

impl HttpLinkEvaluator {
    pub fn new(connect_timeout: Duration) -> Result<Self, CallError> {
        Ok(Self {
            client: build_client(connect_timeout)?,
            connect_timeout,
        })
    }
}

#[async_trait]
impl LinkEvaluator for HttpLinkEvaluator {
    async fn evaluate(&self, endpoint: &Endpoint, request: &LinkRequest) -> Result<f64, CallError> {
        let body = ChannelParams {
            link_id: request.link_id,
            tx: &request.tx,
            rx: &request.rx,
            tx_position: &request.tx_position,
            rx_position: &request.rx_position,
            model: &request.model,
        };
        let answer: ChannelAnswer =
            post_json(&self.client, &endpoint.url(CHANNEL_PATH), &body, self.connect_timeout).await?;

        let value = answer.value();
        if !value.is_finite() {
            return Err(CallError::Malformed(format!("non-finite link quality {}", value)));
        }
        Ok(value)
    }
}
