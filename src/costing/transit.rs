//! Reference transit costing and multimodal tuning knobs
//!
//! The transit costing scores scheduled line edges from departure records
//! and owns the stop/line exclusion state a traversal accumulates while it
//! runs. `MultiModalOptions` collects the penalties the multimodal
//! expansion applies around boarding and transfers.

use rustc_hash::FxHashSet;
use serde::{Deserialize, Serialize};
use std::cell::RefCell;

use crate::graph::{access, DirectedEdge, GraphId, GraphTile, NodeInfo, NodeType};

use super::{Allowance, Cost, DynamicCost, TravelMode};
use crate::label::EdgeLabel;

/// Tuning for the multimodal expansion itself.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MultiModalOptions {
    /// Penalty applied when a transfer changes operators.
    pub operator_change_penalty: f32,
    /// Seconds added before retrying a departure lookup on an in-station
    /// transfer that cannot make the current departure.
    pub transfer_retry_secs: u32,
    /// Maximum walking distance between stops, meters.
    pub max_transfer_distance: f32,
}

impl Default for MultiModalOptions {
    fn default() -> Self {
        MultiModalOptions {
            operator_change_penalty: 300.0,
            transfer_retry_secs: 30,
            max_transfer_distance: 99_999.0,
        }
    }
}

/// Options for the transit costing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransitCostingOptions {
    /// Transfer penalty when changing stations.
    pub transfer_cost_secs: f32,
    /// Baseline transfer penalty at a platform.
    pub default_transfer_cost_secs: f32,
    /// Stops the traveler refuses to use.
    pub excluded_stops: Vec<GraphId>,
    /// Line ids the traveler refuses to ride.
    pub excluded_lines: Vec<u32>,
    pub wheelchair: bool,
    pub bicycle: bool,
}

impl Default for TransitCostingOptions {
    fn default() -> Self {
        TransitCostingOptions {
            transfer_cost_secs: 15.0,
            default_transfer_cost_secs: 0.0,
            excluded_stops: Vec::new(),
            excluded_lines: Vec::new(),
            wheelchair: false,
            bicycle: false,
        }
    }
}

/// Costing for scheduled public transit.
pub struct TransitCosting {
    options: TransitCostingOptions,
    excluded_lines: FxHashSet<u32>,
    /// Stops found in visited tiles that match the exclusion list, keyed by
    /// tile and node position since node records do not carry their id.
    active_stop_exclusions: RefCell<FxHashSet<(u64, u64, u64)>>,
}

fn stop_key(tile: &GraphTile, ll: (f64, f64)) -> (u64, u64, u64) {
    (tile.id().tile_key(), ll.0.to_bits(), ll.1.to_bits())
}

impl TransitCosting {
    pub fn new(options: TransitCostingOptions) -> TransitCosting {
        let excluded_lines = options.excluded_lines.iter().copied().collect();
        TransitCosting {
            options,
            excluded_lines,
            active_stop_exclusions: RefCell::new(FxHashSet::default()),
        }
    }
}

impl DynamicCost for TransitCosting {
    fn travel_mode(&self) -> TravelMode {
        TravelMode::PublicTransit
    }

    fn access_mode(&self) -> u16 {
        access::PEDESTRIAN
    }

    fn allowed(
        &self,
        edge: &DirectedEdge,
        _pred: &EdgeLabel,
        _tile: &GraphTile,
        _edge_id: GraphId,
        _localtime: u64,
        _tz_index: u32,
    ) -> Allowance {
        // Reaching a line edge implies having walked into the platform;
        // exclusions are the only veto.
        if self.excluded_lines.contains(&edge.lineid) {
            return Allowance::deny();
        }
        Allowance::allow()
    }

    fn allowed_reverse(
        &self,
        edge: &DirectedEdge,
        pred: &EdgeLabel,
        _opp_edge: &DirectedEdge,
        opp_tile: &GraphTile,
        opp_edge_id: GraphId,
        localtime: u64,
        tz_index: u32,
    ) -> Allowance {
        self.allowed(edge, pred, opp_tile, opp_edge_id, localtime, tz_index)
    }

    fn edge_cost(&self, _edge: &DirectedEdge, _tile: &GraphTile, _second_of_week: u32) -> Cost {
        // Line edges are never costed without a departure.
        Cost::default()
    }

    fn default_transfer_cost(&self) -> Cost {
        Cost::new(self.options.default_transfer_cost_secs, self.options.default_transfer_cost_secs)
    }

    fn transfer_cost(&self) -> Cost {
        Cost::new(self.options.transfer_cost_secs, self.options.transfer_cost_secs)
    }

    fn is_excluded_node(&self, tile: &GraphTile, node: &NodeInfo) -> bool {
        if node.node_type != NodeType::MultiUseTransitPlatform {
            return false;
        }
        self.active_stop_exclusions.borrow().contains(&stop_key(tile, node.ll))
    }

    fn is_excluded_edge(&self, _tile: &GraphTile, edge: &DirectedEdge) -> bool {
        self.excluded_lines.contains(&edge.lineid)
    }

    fn add_to_exclude_list(&self, tile: &GraphTile) {
        let mut active = self.active_stop_exclusions.borrow_mut();
        for stop in &self.options.excluded_stops {
            if let Some(node) = tile.node(*stop) {
                active.insert(stop_key(tile, node.ll));
            }
        }
    }

    fn wheelchair(&self) -> bool {
        self.options.wheelchair
    }

    fn bicycle(&self) -> bool {
        self.options.bicycle
    }
}
