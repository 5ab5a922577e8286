//! Costing interface
//!
//! The traversal delegates every scoring and permission decision to a
//! `DynamicCost` collaborator: per-mode access, edge and transition costs,
//! time-dependent restrictions, and the node/edge filters used by the
//! reach analysis. Reference implementations live in `road` and `transit`.

use crate::graph::{DirectedEdge, GraphId, GraphTile, NodeInfo, TransitDeparture};
use crate::label::{BdEdgeLabel, EdgeLabel};
use serde::{Deserialize, Serialize};
use std::ops::{Add, AddAssign, Mul};

pub mod road;
pub mod transit;

pub use road::{RoadCosting, RoadCostingOptions};
pub use transit::{MultiModalOptions, TransitCosting, TransitCostingOptions};

/// Cost of a partial path: elapsed seconds and the weight used for
/// comparisons. The two agree for plain time costing; weights diverge when
/// a costing penalizes without spending time.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Cost {
    pub secs: f32,
    pub cost: f32,
}

impl Cost {
    pub fn new(secs: f32, cost: f32) -> Cost {
        Cost { secs, cost }
    }
}

impl Add for Cost {
    type Output = Cost;

    fn add(self, other: Cost) -> Cost {
        Cost { secs: self.secs + other.secs, cost: self.cost + other.cost }
    }
}

impl AddAssign for Cost {
    fn add_assign(&mut self, other: Cost) {
        self.secs += other.secs;
        self.cost += other.cost;
    }
}

impl Mul<f32> for Cost {
    type Output = Cost;

    fn mul(self, f: f32) -> Cost {
        Cost { secs: self.secs * f, cost: self.cost * f }
    }
}

/// Travel mode of a label. Multimodal paths switch between `Pedestrian`
/// and `PublicTransit` as transit is boarded and left.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TravelMode {
    Drive = 0,
    Pedestrian = 1,
    Bicycle = 2,
    PublicTransit = 3,
}

/// Number of travel modes, sizing per-mode costing arrays.
pub const MAX_TRAVEL_MODES: usize = 4;

impl TravelMode {
    pub fn index(self) -> usize {
        self as usize
    }

    pub fn name(self) -> &'static str {
        match self {
            TravelMode::Drive => "drive",
            TravelMode::Pedestrian => "pedestrian",
            TravelMode::Bicycle => "bicycle",
            TravelMode::PublicTransit => "public_transit",
        }
    }
}

/// Outcome of an access check.
#[derive(Debug, Clone, Copy, Default)]
pub struct Allowance {
    pub allowed: bool,
    /// The edge carries restrictions that depend on the time of travel.
    pub time_restricted: bool,
}

impl Allowance {
    pub fn allow() -> Allowance {
        Allowance { allowed: true, time_restricted: false }
    }

    pub fn deny() -> Allowance {
        Allowance { allowed: false, time_restricted: false }
    }
}

/// Node filter, true to reject the node.
pub type NodeFilter<'a> = Box<dyn Fn(&NodeInfo) -> bool + 'a>;

/// Edge filter, positive to accept the edge.
pub type EdgeFilter<'a> = Box<dyn Fn(&DirectedEdge) -> f32 + 'a>;

/// Scoring and permission collaborator of the traversal.
///
/// Implementations are used from a single traversal at a time; methods
/// that accumulate state across calls (exclusion lists, connection
/// toggles) take `&self` and use interior mutability.
pub trait DynamicCost {
    fn travel_mode(&self) -> TravelMode;

    /// Access bit this costing travels under.
    fn access_mode(&self) -> u16;

    /// Cost quantum roughly matching one second; sizes the queue buckets.
    fn unit_size(&self) -> f32 {
        1.0
    }

    /// Whether expansion may pass through the node at all.
    fn allowed_node(&self, node: &NodeInfo) -> bool {
        node.access & self.access_mode() != 0
    }

    /// Access check along the edge direction. `localtime` is zero when the
    /// traversal carries no date-time.
    fn allowed(
        &self,
        edge: &DirectedEdge,
        pred: &EdgeLabel,
        tile: &GraphTile,
        edge_id: GraphId,
        localtime: u64,
        tz_index: u32,
    ) -> Allowance;

    /// Access check for traversing `edge` against its direction, scored on
    /// the opposing edge.
    #[allow(clippy::too_many_arguments)]
    fn allowed_reverse(
        &self,
        edge: &DirectedEdge,
        pred: &EdgeLabel,
        opp_edge: &DirectedEdge,
        opp_tile: &GraphTile,
        opp_edge_id: GraphId,
        localtime: u64,
        tz_index: u32,
    ) -> Allowance;

    /// Whether a restriction forbids extending `pred` onto `edge`. The
    /// label store is provided so implementations can walk the path.
    #[allow(clippy::too_many_arguments)]
    fn restricted(
        &self,
        _edge: &DirectedEdge,
        _pred: &EdgeLabel,
        _labels: &[BdEdgeLabel],
        _tile: &GraphTile,
        _edge_id: GraphId,
        _forward: bool,
        _localtime: u64,
        _tz_index: u32,
    ) -> bool {
        false
    }

    /// Cost to traverse the edge. `second_of_week` selects time-dependent
    /// speeds where the costing has them.
    fn edge_cost(&self, edge: &DirectedEdge, tile: &GraphTile, second_of_week: u32) -> Cost;

    /// Cost of transitioning onto `edge` at `node` coming from `pred`.
    fn transition_cost(&self, _edge: &DirectedEdge, _node: &NodeInfo, _pred: &EdgeLabel) -> Cost {
        Cost::default()
    }

    /// Transition cost for the reverse traversal, scored on the opposing
    /// pair of edges.
    fn transition_cost_reverse(
        &self,
        _local_edge_idx: u32,
        _node: &NodeInfo,
        _opp_edge: &DirectedEdge,
        _opp_pred_edge: &DirectedEdge,
    ) -> Cost {
        Cost::default()
    }

    /// Reject this edge as a seed because a user avoid point lies ahead of
    /// the origin position along it.
    fn avoid_as_origin_edge(&self, _edge_id: GraphId, _percent_along: f32) -> bool {
        false
    }

    fn avoid_as_destination_edge(&self, _edge_id: GraphId, _percent_along: f32) -> bool {
        false
    }

    /// Filter used by the topology-only reach analysis; true rejects.
    fn node_filter(&self) -> NodeFilter<'_> {
        let mask = self.access_mode();
        Box::new(move |node| node.access & mask == 0)
    }

    /// Filter used by the topology-only reach analysis; positive accepts.
    fn edge_filter(&self) -> EdgeFilter<'_> {
        let mask = self.access_mode();
        Box::new(move |edge| {
            if edge.is_shortcut() || edge.forwardaccess & mask == 0 {
                0.0
            } else {
                1.0
            }
        })
    }

    // Transit-specific hooks, meaningful for the multimodal traversal.

    /// Transfer penalty applied at a platform before any station change is
    /// known.
    fn default_transfer_cost(&self) -> Cost {
        Cost::default()
    }

    /// Transfer penalty when changing stations.
    fn transfer_cost(&self) -> Cost {
        Cost::default()
    }

    fn is_excluded_node(&self, _tile: &GraphTile, _node: &NodeInfo) -> bool {
        false
    }

    fn is_excluded_edge(&self, _tile: &GraphTile, _edge: &DirectedEdge) -> bool {
        false
    }

    /// Populate per-tile exclusion state on first visit of the tile.
    fn add_to_exclude_list(&self, _tile: &GraphTile) {}

    fn wheelchair(&self) -> bool {
        false
    }

    fn bicycle(&self) -> bool {
        false
    }

    /// Factor applied to edge weights when this mode is used inside a
    /// multimodal traversal.
    fn mode_factor(&self) -> f32 {
        1.0
    }

    /// Allow pedestrian use of transit connection edges for the duration
    /// of a multimodal traversal.
    fn set_allow_transit_connections(&self, _allow: bool) {}

    /// Switch to the multimodal walking-distance limit.
    fn use_max_multimodal_distance(&self) {}

    /// Cost of riding a transit edge boarded at `departure`, including the
    /// wait from `localtime` (seconds of day) to departure.
    fn transit_edge_cost(
        &self,
        _edge: &DirectedEdge,
        departure: &TransitDeparture,
        localtime: u32,
    ) -> Cost {
        let wait = departure.departure_time.saturating_sub(localtime) as f32;
        let total = wait + departure.elapsed_time as f32;
        Cost::new(total, total)
    }
}

/// Node filter accepting everything, for filterless reach queries.
pub fn pass_through_node_filter<'a>() -> NodeFilter<'a> {
    Box::new(|_| false)
}

/// Edge filter accepting everything except shortcuts.
pub fn pass_through_edge_filter<'a>() -> EdgeFilter<'a> {
    Box::new(|edge| if edge.is_shortcut() { 0.0 } else { 1.0 })
}
