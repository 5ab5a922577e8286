//! Tile records: nodes, directed edges, transitions, transit schedule
//!
//! A tile stores its nodes and directed edges in flat arrays. Each node
//! carries an offset and count into the directed-edge array (its outgoing
//! edge slice) and into the transition array (its counterparts on other
//! hierarchy levels). Transit schedule records live alongside so departures
//! can be resolved without leaving the tile.

use super::GraphId;

/// Coarse classification of a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum NodeType {
    #[default]
    Street,
    /// Entrance/exit between the street network and a transit station.
    TransitEgress,
    /// Station interior node.
    TransitStation,
    /// Platform shared by multiple routes, where boarding happens.
    MultiUseTransitPlatform,
}

/// What a directed edge is used for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Use {
    #[default]
    Road,
    Ferry,
    /// Connects the street network to a transit egress.
    TransitConnection,
    /// Connects an egress to the station interior.
    EgressConnection,
    /// Connects the station interior to a platform.
    PlatformConnection,
    /// Rail transit line.
    Rail,
    /// Bus transit line.
    Bus,
}

/// Node record within a tile.
#[derive(Debug, Clone, Default)]
pub struct NodeInfo {
    /// Base of this node's outgoing edge slice in the tile's edge array.
    pub edge_index: u32,
    /// Number of outgoing edges.
    pub edge_count: u32,
    /// Base of this node's transition slice in the tile's transition array.
    pub transition_index: u32,
    /// Number of cross-level transitions.
    pub transition_count: u32,
    /// Timezone index, 0 when unknown. Nonzero values resolve through the
    /// timezone table (see `timeutil::tz_from_index`).
    pub timezone: u32,
    /// Access bitmask at the node itself.
    pub access: u16,
    pub node_type: NodeType,
    /// Longitude, latitude.
    pub ll: (f64, f64),
}

/// Directed edge record within a tile.
#[derive(Debug, Clone)]
pub struct DirectedEdge {
    /// Node this edge leads to. May live in a different tile or level.
    pub endnode: GraphId,
    /// Offset from `endnode`'s `edge_index` of the reverse-direction edge.
    pub opp_index: u32,
    /// Access bitmask along the edge direction.
    pub forwardaccess: u16,
    /// Access bitmask against the edge direction.
    pub reverseaccess: u16,
    /// Synthetic edge bypassing a chain of edges. Never expanded here.
    pub shortcut: bool,
    /// Index of this edge among the edges of its begin node.
    pub localedgeidx: u32,
    /// Length in meters.
    pub length: f32,
    pub use_: Use,
    /// Transit line id, meaningful for `Use::Rail` / `Use::Bus` edges.
    pub lineid: u32,
}

impl Default for DirectedEdge {
    fn default() -> Self {
        DirectedEdge {
            endnode: GraphId::INVALID,
            opp_index: 0,
            forwardaccess: 0,
            reverseaccess: 0,
            shortcut: false,
            localedgeidx: 0,
            length: 0.0,
            use_: Use::Road,
            lineid: 0,
        }
    }
}

impl DirectedEdge {
    pub fn is_shortcut(&self) -> bool {
        self.shortcut
    }

    /// Scheduled transit line edges. Boarding these consults the departure
    /// table instead of the road costing.
    pub fn is_transit_line(&self) -> bool {
        matches!(self.use_, Use::Rail | Use::Bus)
    }
}

/// Directed link from a node to its counterpart on another hierarchy level.
#[derive(Debug, Clone)]
pub struct NodeTransition {
    pub endnode: GraphId,
    /// True when the target level is coarser than this one.
    pub up: bool,
}

/// One scheduled departure along a transit line edge.
#[derive(Debug, Clone)]
pub struct TransitDeparture {
    /// Line this departure serves, matching `DirectedEdge::lineid`.
    pub lineid: u32,
    pub tripid: u32,
    /// Block id, 0 when the trip belongs to no block. Trips in the same
    /// nonzero block can be ridden through without reboarding cost.
    pub blockid: u32,
    /// Route index within the tile's route table.
    pub routeindex: u32,
    /// Departure time in seconds from midnight of the service day.
    pub departure_time: u32,
    /// Ride duration in seconds.
    pub elapsed_time: u32,
    /// Days-of-week bitmask, bit 0 = Sunday.
    pub dow_mask: u8,
    /// Last service day, counted in days since the tile was created.
    pub end_day: u32,
    pub wheelchair_accessible: bool,
    pub bicycle_accessible: bool,
}

/// Transit route attributes referenced by departures.
#[derive(Debug, Clone, Default)]
pub struct TransitRoute {
    /// Offset into the tile text table of the operating agency name,
    /// 0 when unknown.
    pub op_name_offset: u32,
}

/// Per-tile metadata.
#[derive(Debug, Clone, Default)]
pub struct TileHeader {
    /// Southwest corner of the tile, (lon, lat).
    pub base_ll: (f64, f64),
    /// Day the tile was created, counted from the schedule pivot date.
    /// Departure day indices are relative to this.
    pub date_created: u32,
}

/// A geographically-bounded slab of the routing graph.
#[derive(Debug, Clone, Default)]
pub struct GraphTile {
    id: GraphId,
    header: TileHeader,
    nodes: Vec<NodeInfo>,
    directededges: Vec<DirectedEdge>,
    transitions: Vec<NodeTransition>,
    departures: Vec<TransitDeparture>,
    routes: Vec<TransitRoute>,
    /// Interned strings referenced by offset; slot 0 is reserved empty.
    text: Vec<String>,
}

impl GraphTile {
    pub(crate) fn new(
        id: GraphId,
        header: TileHeader,
        nodes: Vec<NodeInfo>,
        directededges: Vec<DirectedEdge>,
        transitions: Vec<NodeTransition>,
        departures: Vec<TransitDeparture>,
        routes: Vec<TransitRoute>,
        text: Vec<String>,
    ) -> GraphTile {
        GraphTile { id, header, nodes, directededges, transitions, departures, routes, text }
    }

    /// Tile id with a zero slot index.
    pub fn id(&self) -> GraphId {
        self.id
    }

    pub fn header(&self) -> &TileHeader {
        &self.header
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn directededge_count(&self) -> usize {
        self.directededges.len()
    }

    /// Node record for an id in this tile.
    pub fn node(&self, id: GraphId) -> Option<&NodeInfo> {
        if id.tile_key() != self.id.tile_key() {
            return None;
        }
        self.nodes.get(id.id() as usize)
    }

    /// Directed edge record for an id in this tile.
    pub fn directededge(&self, id: GraphId) -> Option<&DirectedEdge> {
        if id.tile_key() != self.id.tile_key() {
            return None;
        }
        self.directededges.get(id.id() as usize)
    }

    /// Directed edge by raw slot index.
    pub fn directededge_at(&self, index: u32) -> Option<&DirectedEdge> {
        self.directededges.get(index as usize)
    }

    /// Outgoing edge slice of a node.
    pub fn directededges(&self, node: &NodeInfo) -> &[DirectedEdge] {
        let start = node.edge_index as usize;
        let end = start + node.edge_count as usize;
        &self.directededges[start.min(self.directededges.len())..end.min(self.directededges.len())]
    }

    /// Cross-level transition slice of a node.
    pub fn transitions(&self, node: &NodeInfo) -> &[NodeTransition] {
        let start = node.transition_index as usize;
        let end = start + node.transition_count as usize;
        &self.transitions[start.min(self.transitions.len())..end.min(self.transitions.len())]
    }

    /// Longitude/latitude of a node in this tile.
    pub fn node_ll(&self, id: GraphId) -> Option<(f64, f64)> {
        self.node(id).map(|n| n.ll)
    }

    pub fn transit_route(&self, routeindex: u32) -> Option<&TransitRoute> {
        self.routes.get(routeindex as usize)
    }

    /// Interned string by offset. Offset 0 is the empty string.
    pub fn name(&self, offset: u32) -> &str {
        self.text.get(offset as usize).map(String::as_str).unwrap_or("")
    }

    /// Earliest departure on `lineid` at or after `current_time` (seconds
    /// from midnight) valid on the given service day. `day` counts from the
    /// tile's creation date; `dow_mask` selects the day of week. No service
    /// is returned for dates before the tile was created, or past a
    /// departure's last service day. Accessibility constraints filter
    /// departures that cannot carry the request.
    #[allow(clippy::too_many_arguments)]
    pub fn next_departure(
        &self,
        lineid: u32,
        current_time: u32,
        day: u32,
        dow_mask: u8,
        date_before_tile: bool,
        wheelchair: bool,
        bicycle: bool,
    ) -> Option<&TransitDeparture> {
        if date_before_tile {
            return None;
        }
        self.departures
            .iter()
            .filter(|d| {
                d.lineid == lineid
                    && d.departure_time >= current_time
                    && (d.dow_mask & dow_mask) != 0
                    && day <= d.end_day
                    && (!wheelchair || d.wheelchair_accessible)
                    && (!bicycle || d.bicycle_accessible)
            })
            .min_by_key(|d| d.departure_time)
    }
}
