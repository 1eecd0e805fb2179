//! External collaborators: the position oracle, the channel model and the
//! service locator that finds them. The core only sees these traits.

#[cfg(test)]
pub(crate) mod canned;
pub mod error;
pub mod http;
pub mod locator;

pub use error::{CallError, FailureKind, LocatorError};
pub use http::{HttpLinkEvaluator, HttpPositionOracle};
pub use locator::{ConsulLocator, Endpoint, ServiceLocator, StaticLocator};

use crate::node::{KinematicState, NodeId, Position, RadioParams};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Propagation model selector forwarded to the channel collaborator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChannelModel {
    #[serde(rename = "largescalemodel")]
    pub large_scale: String,
    #[serde(rename = "smallscalemodel")]
    pub small_scale: String,
}

impl Default for ChannelModel {
    fn default() -> Self {
        Self {
            large_scale: "FreeSpacePathLossModel".to_string(),
            small_scale: "NakagamiFadingModel".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct MobilityRequest {
    pub node: NodeId,
    pub state: KinematicState,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LinkRequest {
    pub link_id: u64,
    pub source: NodeId,
    pub target: NodeId,
    pub tx: RadioParams,
    pub rx: RadioParams,
    pub tx_position: Position,
    pub rx_position: Position,
    pub model: ChannelModel,
}

/// Advances one node's kinematic state by one tick.
#[async_trait]
pub trait PositionOracle: Send + Sync {
    async fn advance(&self, endpoint: &Endpoint, request: &MobilityRequest) -> Result<KinematicState, CallError>;
}

/// Scores the radio link between two nodes (packet-loss ratio or any other
/// scalar the channel model defines).
#[async_trait]
pub trait LinkEvaluator: Send + Sync {
    async fn evaluate(&self, endpoint: &Endpoint, request: &LinkRequest) -> Result<f64, CallError>;
}
