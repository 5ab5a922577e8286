//! Monarch-Route: graph expansion core for tiled road-network routing
//!
//! Building blocks, leaves first:
//! - Bucket queue: monotonic double-bucket priority queue with decrease-key
//! - Edge status: sparse per-edge {state, label index} bookkeeping
//! - Labels: append-only store addressed by stable 32-bit indices
//! - Expansion engine: forward / reverse / multimodal label-setting
//!   traversals over the tiled multi-level graph
//! - Reach: bounded per-direction counts of reachable junctions, topology
//!   BFS or cost-aware through the engine
//!
//! Key principle: one traversal owns its whole working state. Tile access,
//! costing, and termination policy are collaborators behind traits, so the
//! same expansion drives isochrones, time-distance matrices, multimodal
//! search, and reach scoring.

pub mod bucket_queue;
pub mod costing;
pub mod dijkstras;
pub mod edge_status;
pub mod graph;
pub mod label;
pub mod location;
pub mod policy;
pub mod reach;
pub mod timeutil;
pub mod validate;

pub use bucket_queue::DoubleBucketQueue;
pub use costing::{Cost, DynamicCost, MultiModalOptions, RoadCosting, RoadCostingOptions,
    TransitCosting, TransitCostingOptions, TravelMode, MAX_TRAVEL_MODES};
pub use dijkstras::{Dijkstras, ExpansionStats};
pub use edge_status::{EdgeSet, EdgeStatus, EdgeStatusInfo};
pub use graph::{GraphId, GraphReader, GraphTile, TileSet, TileSetBuilder};
pub use label::{BdEdgeLabel, EdgeLabel, MmEdgeLabel, INVALID_LABEL};
pub use location::{Location, PathEdge};
pub use policy::{DefaultPolicy, ExpansionHints, ExpansionPolicy, ExpansionRecommendation, RoutingType};
pub use reach::{simple_reach, DirectedReach, Reach, INBOUND, OUTBOUND};
