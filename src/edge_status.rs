//! Edge status index
//!
//! Tracks, for every directed edge a traversal has touched, whether its
//! label is still in the queue (temporary) or settled (permanent), and
//! which label store index holds it. Most edges of a graph are never
//! touched, so storage is a sparse two-level map: tile key, then edge slot
//! within the tile. The per-tile map is reserved to the tile's edge count
//! on first touch; that hint is a sizing aid only.

use rustc_hash::FxHashMap;

use crate::graph::{GraphId, GraphTile};
use crate::label::INVALID_LABEL;

/// Label state of an edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EdgeSet {
    /// Never touched by the traversal.
    #[default]
    Unreached,
    /// Labeled and still in the queue.
    Temporary,
    /// Settled; the best cost to this edge is final.
    Permanent,
}

/// State and label index of one edge.
#[derive(Debug, Clone, Copy)]
pub struct EdgeStatusInfo {
    pub set: EdgeSet,
    pub index: u32,
}

impl Default for EdgeStatusInfo {
    fn default() -> Self {
        EdgeStatusInfo { set: EdgeSet::Unreached, index: INVALID_LABEL }
    }
}

/// Sparse map from edge id to `EdgeStatusInfo`.
#[derive(Debug, Default)]
pub struct EdgeStatus {
    tiles: FxHashMap<u64, FxHashMap<u32, EdgeStatusInfo>>,
}

impl EdgeStatus {
    pub fn new() -> EdgeStatus {
        EdgeStatus::default()
    }

    /// Status of an edge; `Unreached` when never set.
    pub fn get(&self, edge_id: GraphId) -> EdgeStatusInfo {
        self.tiles
            .get(&edge_id.tile_key())
            .and_then(|t| t.get(&edge_id.id()))
            .copied()
            .unwrap_or_default()
    }

    /// Record a state and label index for an edge. The tile is a capacity
    /// hint for the first touch of its edges.
    pub fn set(&mut self, edge_id: GraphId, set: EdgeSet, index: u32, tile: &GraphTile) {
        let per_tile = self.tiles.entry(edge_id.tile_key()).or_insert_with(|| {
            let mut m = FxHashMap::default();
            m.reserve(tile.directededge_count());
            m
        });
        per_tile.insert(edge_id.id(), EdgeStatusInfo { set, index });
    }

    /// Change the state of an edge, keeping its label index. Creates the
    /// entry with an invalid index when the edge was never set, which is
    /// how multimodal seed labels get settled.
    pub fn update(&mut self, edge_id: GraphId, set: EdgeSet) {
        let per_tile = self.tiles.entry(edge_id.tile_key()).or_default();
        per_tile
            .entry(edge_id.id())
            .and_modify(|e| e.set = set)
            .or_insert(EdgeStatusInfo { set, index: INVALID_LABEL });
    }

    pub fn clear(&mut self) {
        self.tiles.clear();
    }

    /// Every recorded edge with its status.
    pub fn iter(&self) -> impl Iterator<Item = (GraphId, EdgeStatusInfo)> + '_ {
        self.tiles.iter().flat_map(|(tile_key, per_tile)| {
            let base = GraphId::from_value(*tile_key);
            per_tile.iter().map(move |(slot, info)| (base.with_id(*slot), *info))
        })
    }
}
