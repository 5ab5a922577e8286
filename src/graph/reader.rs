//! Tile access
//!
//! `GraphReader` is the seam between the expansion core and tile storage.
//! The traversal only ever borrows tiles for the duration of a lookup; a
//! reader backed by an eviction cache must keep a handed-out tile valid
//! until the next reader call.
//!
//! `TileSet` is the in-memory implementation used by the reference
//! collaborators and by tests.

use rustc_hash::FxHashMap;

use super::tile::{DirectedEdge, GraphTile};
use super::GraphId;

/// Read access to the tiled graph.
pub trait GraphReader {
    /// The tile containing `id`, or `None` for a regional dataset hole.
    fn tile(&self, id: GraphId) -> Option<&GraphTile>;

    /// Id of the reverse-direction edge of `edge_id`, resolved through the
    /// end node's tile.
    fn opposing_edge_id(&self, edge_id: GraphId) -> Option<GraphId> {
        let edge = self.tile(edge_id)?.directededge(edge_id)?;
        let end_tile = self.tile(edge.endnode)?;
        let node = end_tile.node(edge.endnode)?;
        Some(edge.endnode.with_id(node.edge_index + edge.opp_index))
    }

    /// Reverse-direction edge of `edge_id` together with its id and tile.
    fn opposing_edge(&self, edge_id: GraphId) -> Option<(GraphId, &GraphTile, &DirectedEdge)> {
        let opp_id = self.opposing_edge_id(edge_id)?;
        let tile = self.tile(opp_id)?;
        let edge = tile.directededge(opp_id)?;
        Some((opp_id, tile, edge))
    }

    /// End node of a directed edge with the tile that holds it.
    fn end_node(&self, edge: &DirectedEdge) -> Option<(&GraphTile, GraphId)> {
        self.tile(edge.endnode).map(|t| (t, edge.endnode))
    }
}

/// In-memory tile collection.
#[derive(Debug, Default)]
pub struct TileSet {
    tiles: FxHashMap<u64, GraphTile>,
}

impl TileSet {
    pub fn new() -> TileSet {
        TileSet::default()
    }

    pub fn insert(&mut self, tile: GraphTile) {
        self.tiles.insert(tile.id().tile_key(), tile);
    }

    pub fn len(&self) -> usize {
        self.tiles.len()
    }

    /// All tiles with their keys.
    pub fn tile_entries(&self) -> Vec<(u64, &GraphTile)> {
        self.tiles.iter().map(|(k, t)| (*k, t)).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.tiles.is_empty()
    }
}

impl GraphReader for TileSet {
    fn tile(&self, id: GraphId) -> Option<&GraphTile> {
        if !id.is_valid() {
            return None;
        }
        self.tiles.get(&id.tile_key())
    }
}
