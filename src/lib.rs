pub mod node;
pub mod spatial;
pub mod discovery;
pub mod collaborators;
pub mod orchestrator;
pub mod graph;
pub mod metrics;
pub mod simulation;

pub use node::{Node, NodeId, NodeStateStore};
pub use spatial::KdTree;
pub use discovery::{CandidateEdge, NeighborDiscovery, RangePolicy};
pub use graph::{GraphAssembler, LinkResult, NeighborGraph};
pub use simulation::{Simulation, SimConfig};
pub use metrics::MetricsCollector;

pub mod prelude {
    pub use crate::node::{KinematicState, Node, NodeId, NodeStateStore, NodeTemplate, Position, RadioParams, Snapshot};
    pub use crate::discovery::{CandidateEdge, NeighborDiscovery, RangePolicy};
    pub use crate::collaborators::{
        CallError, ChannelModel, Endpoint, LinkEvaluator, LinkRequest, MobilityRequest, PositionOracle,
        ServiceLocator, StaticLocator,
    };
    pub use crate::orchestrator::{Dispatcher, RetryPolicy};
    pub use crate::graph::{GraphAssembler, LinkResult, Neighbor, NeighborGraph};
    pub use crate::metrics::{Alarm, TickDiagnostics};
    pub use crate::simulation::{Simulation, SimConfig, TickReport};
}
