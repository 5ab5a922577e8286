//! Reference road costing
//!
//! Scores road edges by travel time at a per-mode default speed, applies
//! the mode's access mask, supports user avoid points and simple periodic
//! restrictions. This is deliberately small; production costings plug in
//! through the same trait.

use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use std::cell::Cell;

use crate::graph::{access, DirectedEdge, GraphId, GraphTile, NodeInfo, Use};
use crate::label::{BdEdgeLabel, EdgeLabel};
use crate::timeutil::SECONDS_PER_DAY;

use super::{Allowance, Cost, DynamicCost, TravelMode};

/// A periodic ban on an edge, expressed in seconds of day.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct TimeRestriction {
    pub edge_id: GraphId,
    /// Ban window start, seconds from midnight.
    pub start: u32,
    /// Ban window end (exclusive), seconds from midnight.
    pub end: u32,
}

/// Options for the road costing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoadCostingOptions {
    /// Speed used for every edge, km/h.
    pub speed_kmh: f32,
    /// Fixed cost added per intersection transition.
    pub turn_cost_secs: f32,
    /// Walking distance cap applied during multimodal traversals, meters.
    pub max_multimodal_distance: u32,
    /// User avoid points: edge id with the avoid position along it.
    pub avoid_edges: Vec<(GraphId, f32)>,
    /// Periodic bans checked when the traversal carries a date-time.
    pub time_restrictions: Vec<TimeRestriction>,
}

impl Default for RoadCostingOptions {
    fn default() -> Self {
        RoadCostingOptions {
            speed_kmh: 50.0,
            turn_cost_secs: 0.0,
            max_multimodal_distance: 4000,
            avoid_edges: Vec::new(),
            time_restrictions: Vec::new(),
        }
    }
}

/// Road costing for a single travel mode.
pub struct RoadCosting {
    mode: TravelMode,
    access_mask: u16,
    options: RoadCostingOptions,
    avoid: FxHashMap<GraphId, f32>,
    restrictions: FxHashMap<GraphId, (u32, u32)>,
    /// Set while a multimodal traversal is running.
    allow_transit_connections: Cell<bool>,
    walking_limit: Cell<Option<u32>>,
}

impl RoadCosting {
    pub fn new(mode: TravelMode, access_mask: u16, options: RoadCostingOptions) -> RoadCosting {
        let avoid = options.avoid_edges.iter().copied().collect();
        let restrictions = options
            .time_restrictions
            .iter()
            .map(|r| (r.edge_id, (r.start, r.end)))
            .collect();
        RoadCosting {
            mode,
            access_mask,
            options,
            avoid,
            restrictions,
            allow_transit_connections: Cell::new(false),
            walking_limit: Cell::new(None),
        }
    }

    pub fn drive(options: RoadCostingOptions) -> RoadCosting {
        RoadCosting::new(TravelMode::Drive, access::AUTO, options)
    }

    pub fn pedestrian(mut options: RoadCostingOptions) -> RoadCosting {
        if options.speed_kmh > 6.0 {
            options.speed_kmh = 5.0;
        }
        RoadCosting::new(TravelMode::Pedestrian, access::PEDESTRIAN, options)
    }

    pub fn bicycle(mut options: RoadCostingOptions) -> RoadCosting {
        if options.speed_kmh > 30.0 {
            options.speed_kmh = 18.0;
        }
        RoadCosting::new(TravelMode::Bicycle, access::BICYCLE, options)
    }

    fn speed_mps(&self) -> f32 {
        self.options.speed_kmh * 1000.0 / 3600.0
    }

    fn is_transit_connection(use_: Use) -> bool {
        matches!(use_, Use::TransitConnection | Use::EgressConnection | Use::PlatformConnection)
    }

    fn check(&self, mask: u16, edge: &DirectedEdge, pred: &EdgeLabel, edge_id: GraphId) -> Allowance {
        if mask & self.access_mask == 0 {
            return Allowance::deny();
        }
        if Self::is_transit_connection(edge.use_) && !self.allow_transit_connections.get() {
            return Allowance::deny();
        }
        if let Some(limit) = self.walking_limit.get() {
            if self.mode == TravelMode::Pedestrian
                && pred.path_distance() + edge.length as u32 > limit
            {
                return Allowance::deny();
            }
        }
        Allowance { allowed: true, time_restricted: self.restrictions.contains_key(&edge_id) }
    }
}

impl DynamicCost for RoadCosting {
    fn travel_mode(&self) -> TravelMode {
        self.mode
    }

    fn access_mode(&self) -> u16 {
        self.access_mask
    }

    fn allowed(
        &self,
        edge: &DirectedEdge,
        pred: &EdgeLabel,
        _tile: &GraphTile,
        edge_id: GraphId,
        _localtime: u64,
        _tz_index: u32,
    ) -> Allowance {
        self.check(edge.forwardaccess, edge, pred, edge_id)
    }

    fn allowed_reverse(
        &self,
        edge: &DirectedEdge,
        pred: &EdgeLabel,
        opp_edge: &DirectedEdge,
        _opp_tile: &GraphTile,
        opp_edge_id: GraphId,
        _localtime: u64,
        _tz_index: u32,
    ) -> Allowance {
        // The reverse traversal walks against edge direction; the opposing
        // edge carries the direction actually driven.
        self.check(edge.reverseaccess, opp_edge, pred, opp_edge_id)
    }

    fn restricted(
        &self,
        _edge: &DirectedEdge,
        _pred: &EdgeLabel,
        _labels: &[BdEdgeLabel],
        _tile: &GraphTile,
        edge_id: GraphId,
        _forward: bool,
        localtime: u64,
        _tz_index: u32,
    ) -> bool {
        if localtime == 0 {
            return false;
        }
        match self.restrictions.get(&edge_id) {
            Some(&(start, end)) => {
                let second_of_day = (localtime % u64::from(SECONDS_PER_DAY)) as u32;
                second_of_day >= start && second_of_day < end
            }
            None => false,
        }
    }

    fn edge_cost(&self, edge: &DirectedEdge, _tile: &GraphTile, _second_of_week: u32) -> Cost {
        let secs = edge.length / self.speed_mps();
        Cost::new(secs, secs)
    }

    fn transition_cost(&self, _edge: &DirectedEdge, _node: &NodeInfo, pred: &EdgeLabel) -> Cost {
        // Seed labels get no turn cost, there is no maneuver yet.
        if pred.origin() {
            return Cost::default();
        }
        Cost::new(self.options.turn_cost_secs, self.options.turn_cost_secs)
    }

    fn transition_cost_reverse(
        &self,
        _local_edge_idx: u32,
        _node: &NodeInfo,
        _opp_edge: &DirectedEdge,
        _opp_pred_edge: &DirectedEdge,
    ) -> Cost {
        Cost::new(self.options.turn_cost_secs, self.options.turn_cost_secs)
    }

    fn avoid_as_origin_edge(&self, edge_id: GraphId, percent_along: f32) -> bool {
        // Avoid point at or past the origin position blocks the whole seed.
        self.avoid.get(&edge_id).is_some_and(|&p| p >= percent_along)
    }

    fn avoid_as_destination_edge(&self, edge_id: GraphId, percent_along: f32) -> bool {
        self.avoid.get(&edge_id).is_some_and(|&p| p <= percent_along)
    }

    fn set_allow_transit_connections(&self, allow: bool) {
        self.allow_transit_connections.set(allow);
    }

    fn use_max_multimodal_distance(&self) {
        self.walking_limit.set(Some(self.options.max_multimodal_distance));
    }
}
