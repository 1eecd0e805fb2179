//! Node data model: identity, kinematic state, radio parameters and range.
//!
//! Mobility parameters are kept as opaque JSON because only the mobility
//! collaborator interprets them.

pub mod store;

pub use store::{NodeStateStore, Snapshot, StoreError};

use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(u64);

impl NodeId {
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "node-{}", self.0)
    }
}

/// Point in 3-space. 2-D deployments keep `z` constant.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Position {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Position {
    pub fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    /// Coordinate along axis 0 (x), 1 (y) or 2 (z).
    pub fn axis(&self, axis: usize) -> f64 {
        match axis {
            0 => self.x,
            1 => self.y,
            _ => self.z,
        }
    }

    /// Squared Euclidean distance. Range checks compare this against r²
    /// so the index and the exhaustive scan agree bit for bit.
    pub fn distance2(&self, other: &Position) -> f64 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        let dz = self.z - other.z;
        dx * dx + dy * dy + dz * dz
    }

    pub fn distance(&self, other: &Position) -> f64 {
        self.distance2(other).sqrt()
    }

    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite() && self.z.is_finite()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Velocity {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Velocity {
    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite() && self.z.is_finite()
    }
}

/// Everything the mobility collaborator needs to advance a node one tick.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KinematicState {
    #[serde(rename = "pos")]
    pub position: Position,
    pub time: f64,
    #[serde(rename = "v")]
    pub velocity: Velocity,
    pub model: String,
    #[serde(rename = "param", default)]
    pub params: serde_json::Value,
}

impl KinematicState {
    /// No NaN or infinite component anywhere in the kinematics.
    pub fn is_finite(&self) -> bool {
        self.position.is_finite() && self.velocity.is_finite() && self.time.is_finite()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RadioParams {
    /// Carrier frequency in Hz.
    pub frequency: f64,
    #[serde(rename = "bitrate")]
    pub bit_rate: f64,
    pub modulation: String,
    #[serde(rename = "bandwidth")]
    pub bandwidth: f64,
    /// Fading shape parameter (Nakagami m).
    pub m: f64,
    #[serde(rename = "powerindbm")]
    pub power_dbm: f64,
}

impl Default for RadioParams {
    fn default() -> Self {
        Self {
            frequency: 2.4e9,
            bit_rate: 5.0e7,
            modulation: "BPSK".to_string(),
            bandwidth: 2.0e7,
            m: 0.0,
            power_dbm: 20.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    pub id: NodeId,
    pub state: KinematicState,
    pub radio: RadioParams,
    /// Communication range; targets at distance <= range are neighbors.
    pub range: f64,
}

impl Node {
    pub fn position(&self) -> Position {
        self.state.position
    }
}

/// Defaults stamped onto every generated node.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NodeTemplate {
    pub range: f64,
    pub radio: RadioParams,
    pub model: String,
    pub time: f64,
    pub velocity: Velocity,
    pub params: serde_json::Value,
}

impl Default for NodeTemplate {
    fn default() -> Self {
        Self {
            range: 2000.0,
            radio: RadioParams::default(),
            model: "RandomWalk".to_string(),
            time: 10.0,
            velocity: Velocity { x: 10.0, y: 10.0, z: 10.0 },
            params: serde_json::json!({ "minspeed": 0.0, "maxspeed": 20.0 }),
        }
    }
}

impl NodeTemplate {
    pub fn instantiate(&self, id: NodeId, position: Position) -> Node {
        Node {
            id,
            state: KinematicState {
                position,
                time: self.time,
                velocity: self.velocity,
                model: self.model.clone(),
                params: self.params.clone(),
            },
            radio: self.radio.clone(),
            range: self.range,
        }
    }
}
