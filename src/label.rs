//! Edge labels
//!
//! A label records the best path found so far to a directed edge. Labels
//! live in an append-only store and are addressed by dense 32-bit indices;
//! once emplaced a label may be updated in place but never moves, so queue
//! and status references stay valid across appends.
//!
//! Three flavors share a common base: the plain label, the bidirectional
//! label used by the forward and reverse traversals, and the multimodal
//! label that additionally tracks transit state.

use crate::costing::{Cost, TravelMode};
use crate::graph::{DirectedEdge, GraphId, Use};

/// Sentinel label index meaning "no predecessor" / "not found".
pub const INVALID_LABEL: u32 = u32::MAX;

/// Common label base.
#[derive(Debug, Clone)]
pub struct EdgeLabel {
    predecessor: u32,
    edge_id: GraphId,
    endnode: GraphId,
    cost: Cost,
    sortcost: f32,
    /// Straight-line distance term carried for heuristic-augmented
    /// consumers. Zero in the plain traversals.
    distance: f32,
    mode: TravelMode,
    use_: Use,
    /// Meters traveled along the path to reach this edge's end.
    path_distance: u32,
    origin: bool,
    has_time_restrictions: bool,
}

impl EdgeLabel {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        predecessor: u32,
        edge_id: GraphId,
        edge: &DirectedEdge,
        cost: Cost,
        sortcost: f32,
        mode: TravelMode,
        path_distance: u32,
        has_time_restrictions: bool,
    ) -> EdgeLabel {
        EdgeLabel {
            predecessor,
            edge_id,
            endnode: edge.endnode,
            cost,
            sortcost,
            distance: 0.0,
            mode,
            use_: edge.use_,
            path_distance,
            origin: false,
            has_time_restrictions,
        }
    }

    pub fn predecessor(&self) -> u32 {
        self.predecessor
    }

    pub fn edgeid(&self) -> GraphId {
        self.edge_id
    }

    pub fn endnode(&self) -> GraphId {
        self.endnode
    }

    pub fn cost(&self) -> Cost {
        self.cost
    }

    pub fn sortcost(&self) -> f32 {
        self.sortcost
    }

    pub fn distance(&self) -> f32 {
        self.distance
    }

    pub fn mode(&self) -> TravelMode {
        self.mode
    }

    pub fn use_(&self) -> Use {
        self.use_
    }

    pub fn path_distance(&self) -> u32 {
        self.path_distance
    }

    pub fn origin(&self) -> bool {
        self.origin
    }

    pub fn has_time_restrictions(&self) -> bool {
        self.has_time_restrictions
    }

    pub fn set_origin(&mut self) {
        self.origin = true;
    }
}

/// Label used by the forward and reverse traversals. Carries the opposing
/// edge id so a reverse path can be connected later.
#[derive(Debug, Clone)]
pub struct BdEdgeLabel {
    label: EdgeLabel,
    opp_edge_id: GraphId,
    transition_cost: Cost,
}

impl BdEdgeLabel {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        predecessor: u32,
        edge_id: GraphId,
        opp_edge_id: GraphId,
        edge: &DirectedEdge,
        cost: Cost,
        sortcost: f32,
        mode: TravelMode,
        transition_cost: Cost,
        has_time_restrictions: bool,
    ) -> BdEdgeLabel {
        BdEdgeLabel {
            label: EdgeLabel::new(predecessor, edge_id, edge, cost, sortcost, mode, 0, has_time_restrictions),
            opp_edge_id,
            transition_cost,
        }
    }

    /// In-place relaxation. The sort cost is decremented by the real cost
    /// improvement so any external heuristic term is preserved.
    pub fn update(
        &mut self,
        predecessor: u32,
        cost: Cost,
        sortcost: f32,
        transition_cost: Cost,
        has_time_restrictions: bool,
    ) {
        self.label.predecessor = predecessor;
        self.label.cost = cost;
        self.label.sortcost = sortcost;
        self.transition_cost = transition_cost;
        self.label.has_time_restrictions = has_time_restrictions;
    }

    pub fn label(&self) -> &EdgeLabel {
        &self.label
    }

    pub fn set_origin(&mut self) {
        self.label.set_origin();
    }

    pub fn predecessor(&self) -> u32 {
        self.label.predecessor
    }

    pub fn edgeid(&self) -> GraphId {
        self.label.edge_id
    }

    pub fn opp_edgeid(&self) -> GraphId {
        self.opp_edge_id
    }

    pub fn endnode(&self) -> GraphId {
        self.label.endnode
    }

    pub fn cost(&self) -> Cost {
        self.label.cost
    }

    pub fn sortcost(&self) -> f32 {
        self.label.sortcost
    }

    pub fn mode(&self) -> TravelMode {
        self.label.mode
    }

    pub fn use_(&self) -> Use {
        self.label.use_
    }

    pub fn transition_cost(&self) -> Cost {
        self.transition_cost
    }

    pub fn origin(&self) -> bool {
        self.label.origin
    }

    pub fn has_time_restrictions(&self) -> bool {
        self.label.has_time_restrictions
    }
}

/// Label used by the multimodal traversal.
#[derive(Debug, Clone)]
pub struct MmEdgeLabel {
    label: EdgeLabel,
    /// Trip currently ridden, 0 while walking.
    trip_id: u32,
    /// Last boarded or passed transit platform.
    prior_stop_id: GraphId,
    block_id: u32,
    /// Interned operator id of the current trip, 0 when none.
    operator_id: u32,
    /// Whether transit has been taken anywhere on the path.
    has_transit: bool,
    transition_cost: Cost,
}

impl MmEdgeLabel {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        predecessor: u32,
        edge_id: GraphId,
        edge: &DirectedEdge,
        cost: Cost,
        sortcost: f32,
        mode: TravelMode,
        path_distance: u32,
        trip_id: u32,
        prior_stop_id: GraphId,
        block_id: u32,
        operator_id: u32,
        has_transit: bool,
        transition_cost: Cost,
        has_time_restrictions: bool,
    ) -> MmEdgeLabel {
        MmEdgeLabel {
            label: EdgeLabel::new(
                predecessor,
                edge_id,
                edge,
                cost,
                sortcost,
                mode,
                path_distance,
                has_time_restrictions,
            ),
            trip_id,
            prior_stop_id,
            block_id,
            operator_id,
            has_transit,
            transition_cost,
        }
    }

    /// In-place relaxation, additionally refreshing the transit state that
    /// rides along with the cheaper path.
    #[allow(clippy::too_many_arguments)]
    pub fn update(
        &mut self,
        predecessor: u32,
        cost: Cost,
        sortcost: f32,
        path_distance: u32,
        trip_id: u32,
        block_id: u32,
        transition_cost: Cost,
        has_time_restrictions: bool,
    ) {
        self.label.predecessor = predecessor;
        self.label.cost = cost;
        self.label.sortcost = sortcost;
        self.label.path_distance = path_distance;
        self.trip_id = trip_id;
        self.block_id = block_id;
        self.transition_cost = transition_cost;
        self.label.has_time_restrictions = has_time_restrictions;
    }

    pub fn label(&self) -> &EdgeLabel {
        &self.label
    }

    pub fn set_origin(&mut self) {
        self.label.set_origin();
    }

    pub fn predecessor(&self) -> u32 {
        self.label.predecessor
    }

    pub fn edgeid(&self) -> GraphId {
        self.label.edge_id
    }

    pub fn endnode(&self) -> GraphId {
        self.label.endnode
    }

    pub fn cost(&self) -> Cost {
        self.label.cost
    }

    pub fn sortcost(&self) -> f32 {
        self.label.sortcost
    }

    pub fn mode(&self) -> TravelMode {
        self.label.mode
    }

    pub fn use_(&self) -> Use {
        self.label.use_
    }

    pub fn path_distance(&self) -> u32 {
        self.label.path_distance
    }

    pub fn tripid(&self) -> u32 {
        self.trip_id
    }

    pub fn prior_stopid(&self) -> GraphId {
        self.prior_stop_id
    }

    pub fn blockid(&self) -> u32 {
        self.block_id
    }

    pub fn transit_operator(&self) -> u32 {
        self.operator_id
    }

    pub fn has_transit(&self) -> bool {
        self.has_transit
    }

    pub fn origin(&self) -> bool {
        self.label.origin
    }

    pub fn has_time_restrictions(&self) -> bool {
        self.label.has_time_restrictions
    }
}
