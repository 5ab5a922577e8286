//! Synthetic tile-set construction
//!
//! Builds in-memory tile sets for the reference collaborators and for
//! tests. Nodes are staged per tile, edges are staged per node, and the
//! flat tile arrays (edge offsets, opposing-edge indices, transition
//! slices) are resolved in one pass at `build`.
//!
//! Every physical connection is added as an edge pair so each directed
//! edge has a resolvable opposing edge, which the reverse traversal and
//! the reach analysis both rely on.

use anyhow::{bail, Context, Result};
use rustc_hash::FxHashMap;

use super::tile::{
    DirectedEdge, GraphTile, NodeInfo, NodeTransition, NodeType, TileHeader, TransitDeparture,
    TransitRoute, Use,
};
use super::reader::GraphReader;
use super::{GraphId, TileSet};

/// Attributes of one staged edge pair.
#[derive(Debug, Clone)]
pub struct EdgeSpec {
    pub length: f32,
    /// Access mask traveling a -> b.
    pub forward_mask: u16,
    /// Access mask traveling b -> a.
    pub reverse_mask: u16,
    pub use_: Use,
    pub lineid: u32,
    pub shortcut: bool,
}

impl Default for EdgeSpec {
    fn default() -> Self {
        EdgeSpec {
            length: 0.0,
            forward_mask: super::access::ALL,
            reverse_mask: super::access::ALL,
            use_: Use::Road,
            lineid: 0,
            shortcut: false,
        }
    }
}

#[derive(Debug, Clone)]
struct StagedEdge {
    to: GraphId,
    length: f32,
    forwardaccess: u16,
    reverseaccess: u16,
    use_: Use,
    lineid: u32,
    shortcut: bool,
    /// Local position of the opposing edge within the target node's list.
    opp_local: u32,
}

#[derive(Debug, Clone)]
struct StagedNode {
    ll: (f64, f64),
    timezone: u32,
    access: u16,
    node_type: NodeType,
    edges: Vec<StagedEdge>,
    transitions: Vec<NodeTransition>,
}

#[derive(Debug, Default)]
struct StagedTile {
    base: GraphId,
    header: TileHeader,
    nodes: Vec<StagedNode>,
    departures: Vec<TransitDeparture>,
    routes: Vec<TransitRoute>,
    text: Vec<String>,
}

/// Builder for an in-memory `TileSet`.
#[derive(Debug, Default)]
pub struct TileSetBuilder {
    tiles: FxHashMap<u64, StagedTile>,
}

impl TileSetBuilder {
    pub fn new() -> TileSetBuilder {
        TileSetBuilder::default()
    }

    fn staged(&mut self, base: GraphId) -> &mut StagedTile {
        self.tiles.entry(base.tile_key()).or_insert_with(|| StagedTile {
            base,
            // Slot 0 of the text table is the reserved empty string.
            text: vec![String::new()],
            ..StagedTile::default()
        })
    }

    /// Add a node to `tile` at hierarchy `level`, returning its id.
    pub fn add_node(&mut self, tile: u32, level: u32, ll: (f64, f64)) -> GraphId {
        let base = GraphId::new(tile, level, 0);
        let staged = self.staged(base);
        let id = base.with_id(staged.nodes.len() as u32);
        staged.nodes.push(StagedNode {
            ll,
            timezone: 0,
            access: super::access::ALL,
            node_type: NodeType::Street,
            edges: Vec::new(),
            transitions: Vec::new(),
        });
        id
    }

    fn node_mut(&mut self, id: GraphId) -> Option<&mut StagedNode> {
        self.tiles.get_mut(&id.tile_key())?.nodes.get_mut(id.id() as usize)
    }

    pub fn set_timezone(&mut self, node: GraphId, tz_index: u32) {
        if let Some(n) = self.node_mut(node) {
            n.timezone = tz_index;
        }
    }

    pub fn set_node_type(&mut self, node: GraphId, node_type: NodeType) {
        if let Some(n) = self.node_mut(node) {
            n.node_type = node_type;
        }
    }

    pub fn set_node_access(&mut self, node: GraphId, access: u16) {
        if let Some(n) = self.node_mut(node) {
            n.access = access;
        }
    }

    pub fn set_header(&mut self, tile: u32, level: u32, base_ll: (f64, f64), date_created: u32) {
        let base = GraphId::new(tile, level, 0);
        let staged = self.staged(base);
        staged.header = TileHeader { base_ll, date_created };
    }

    /// Add an edge pair between two existing nodes.
    pub fn add_edge_pair(&mut self, a: GraphId, b: GraphId, spec: EdgeSpec) {
        // Positions within each node's staged list are final local indices.
        let a_local = self
            .node_mut(a)
            .map(|n| n.edges.len() as u32)
            .unwrap_or(0);
        let b_local = self
            .node_mut(b)
            .map(|n| n.edges.len() as u32)
            .unwrap_or(0);
        if let Some(n) = self.node_mut(a) {
            n.edges.push(StagedEdge {
                to: b,
                length: spec.length,
                forwardaccess: spec.forward_mask,
                reverseaccess: spec.reverse_mask,
                use_: spec.use_,
                lineid: spec.lineid,
                shortcut: spec.shortcut,
                opp_local: b_local,
            });
        }
        if let Some(n) = self.node_mut(b) {
            n.edges.push(StagedEdge {
                to: a,
                length: spec.length,
                forwardaccess: spec.reverse_mask,
                reverseaccess: spec.forward_mask,
                use_: spec.use_,
                lineid: spec.lineid,
                shortcut: spec.shortcut,
                opp_local: a_local,
            });
        }
    }

    /// Bidirectional road with the same access both ways.
    pub fn add_road(&mut self, a: GraphId, b: GraphId, length: f32, access: u16) {
        self.add_edge_pair(a, b, EdgeSpec { length, forward_mask: access, reverse_mask: access, ..EdgeSpec::default() });
    }

    /// One-way road from `a` to `b`.
    pub fn add_oneway(&mut self, a: GraphId, b: GraphId, length: f32, access: u16) {
        self.add_edge_pair(a, b, EdgeSpec { length, forward_mask: access, reverse_mask: 0, ..EdgeSpec::default() });
    }

    /// Shortcut pair, excluded from expansion.
    pub fn add_shortcut(&mut self, a: GraphId, b: GraphId, length: f32, access: u16) {
        self.add_edge_pair(a, b, EdgeSpec { length, forward_mask: access, reverse_mask: access, shortcut: true, ..EdgeSpec::default() });
    }

    /// Pedestrian connection edge of the given transit `use_`.
    pub fn add_connection(&mut self, a: GraphId, b: GraphId, length: f32, use_: Use) {
        self.add_edge_pair(
            a,
            b,
            EdgeSpec {
                length,
                forward_mask: super::access::PEDESTRIAN,
                reverse_mask: super::access::PEDESTRIAN,
                use_,
                ..EdgeSpec::default()
            },
        );
    }

    /// Rail line edge pair serving `lineid`.
    pub fn add_transit_line(&mut self, a: GraphId, b: GraphId, length: f32, lineid: u32) {
        self.add_edge_pair(
            a,
            b,
            EdgeSpec {
                length,
                forward_mask: super::access::PEDESTRIAN,
                reverse_mask: super::access::PEDESTRIAN,
                use_: Use::Rail,
                lineid,
                ..EdgeSpec::default()
            },
        );
    }

    /// Directed cross-level transition from `a` to `b`.
    pub fn add_transition(&mut self, a: GraphId, b: GraphId) {
        let up = b.level() < a.level();
        if let Some(n) = self.node_mut(a) {
            n.transitions.push(NodeTransition { endnode: b, up });
        }
    }

    /// Register a transit route operated by `operator`, returning its route
    /// index within the tile holding `tile_node`.
    pub fn add_route(&mut self, tile_node: GraphId, operator: &str) -> u32 {
        let staged = self.staged(tile_node.tile_base());
        let offset = if operator.is_empty() {
            0
        } else {
            staged.text.push(operator.to_string());
            (staged.text.len() - 1) as u32
        };
        staged.routes.push(TransitRoute { op_name_offset: offset });
        (staged.routes.len() - 1) as u32
    }

    /// Add a departure record to the tile holding `tile_node`.
    pub fn add_departure(&mut self, tile_node: GraphId, departure: TransitDeparture) {
        self.staged(tile_node.tile_base()).departures.push(departure);
    }

    /// Resolve offsets and produce the tile set.
    pub fn build(self) -> Result<TileSet> {
        let mut tiles = TileSet::new();
        for (_, staged) in self.tiles {
            let mut nodes = Vec::with_capacity(staged.nodes.len());
            let mut directededges = Vec::new();
            let mut transitions = Vec::new();

            for node in &staged.nodes {
                let edge_index = directededges.len() as u32;
                let transition_index = transitions.len() as u32;
                for e in &node.edges {
                    if !e.to.is_valid() {
                        bail!("edge target is invalid in tile {:?}", staged.base);
                    }
                    directededges.push(DirectedEdge {
                        endnode: e.to,
                        opp_index: e.opp_local,
                        forwardaccess: e.forwardaccess,
                        reverseaccess: e.reverseaccess,
                        shortcut: e.shortcut,
                        localedgeidx: (directededges.len() as u32) - edge_index,
                        length: e.length,
                        use_: e.use_,
                        lineid: e.lineid,
                    });
                }
                transitions.extend(node.transitions.iter().cloned());
                nodes.push(NodeInfo {
                    edge_index,
                    edge_count: node.edges.len() as u32,
                    transition_index,
                    transition_count: node.transitions.len() as u32,
                    timezone: node.timezone,
                    access: node.access,
                    node_type: node.node_type,
                    ll: node.ll,
                });
            }

            tiles.insert(GraphTile::new(
                staged.base,
                staged.header,
                nodes,
                directededges,
                transitions,
                staged.departures,
                staged.routes,
                staged.text,
            ));
        }

        // Cross-tile references have to resolve now that every tile exists.
        for (_, tile) in tiles.tile_entries() {
            for node_slot in 0..tile.node_count() {
                let id = tile.id().with_id(node_slot as u32);
                let node = tile.node(id).context("staged node lost during build")?;
                for t in tile.transitions(node) {
                    if tiles.tile(t.endnode).and_then(|tt| tt.node(t.endnode)).is_none() {
                        bail!("transition from {:?} targets missing node {:?}", id, t.endnode);
                    }
                }
            }
        }

        Ok(tiles)
    }
}

/// Find the directed edge from `from` to `to`, if one exists.
pub fn edge_id_between<R: super::GraphReader>(reader: &R, from: GraphId, to: GraphId) -> Option<GraphId> {
    let tile = reader.tile(from)?;
    let node = tile.node(from)?;
    for (i, e) in tile.directededges(node).iter().enumerate() {
        if e.endnode == to {
            return Some(from.with_id(node.edge_index + i as u32));
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::access;

    #[test]
    fn test_offsets_and_opposing() {
        let mut b = TileSetBuilder::new();
        let a = b.add_node(0, 0, (0.0, 0.0));
        let m = b.add_node(0, 0, (0.001, 0.0));
        let c = b.add_node(0, 0, (0.002, 0.0));
        b.add_road(a, m, 50.0, access::ALL);
        b.add_road(m, c, 60.0, access::ALL);
        let tiles = b.build().unwrap();

        let tile = tiles.tile(m).unwrap();
        let mid = tile.node(m).unwrap();
        assert_eq!(mid.edge_count, 2);

        let am = edge_id_between(&tiles, a, m).unwrap();
        let opp = tiles.opposing_edge_id(am).unwrap();
        let opp_edge = tile.directededge(opp).unwrap();
        assert_eq!(opp_edge.endnode, a);
        assert_eq!(opp_edge.length, 50.0);
    }

    #[test]
    fn test_transition_to_missing_node_fails() {
        let mut b = TileSetBuilder::new();
        let a = b.add_node(0, 0, (0.0, 0.0));
        b.add_transition(a, GraphId::new(9, 1, 0));
        assert!(b.build().is_err());
    }

    #[test]
    fn test_route_interning() {
        let mut b = TileSetBuilder::new();
        let a = b.add_node(0, 0, (0.0, 0.0));
        let r = b.add_route(a, "metro");
        let tiles = b.build().unwrap();
        let tile = tiles.tile(a).unwrap();
        let route = tile.transit_route(r).unwrap();
        assert_eq!(tile.name(route.op_name_offset), "metro");
    }
}
