//! Graph expansion engine
//!
//! A label-setting traversal over the tiled multi-level graph, shared by
//! the one-to-many consumers (isochrones, time-distance matrices,
//! multimodal transit search) and by the reach analysis. Three entry
//! points share one structure: seed the queue from snapped locations, then
//! repeatedly pop the minimum-cost label, settle its edge, and expand from
//! its end node, delegating every scoring decision to the costing and
//! every termination decision to the policy.
//!
//! Two details carry the correctness of the whole loop. The popped label
//! is copied out of the store before expansion, because expansion appends
//! labels and may relocate the backing storage. And the edge status is
//! flipped to permanent before expansion, so a cross-level transition
//! cannot re-enter the predecessor's own edge.

use rustc_hash::{FxHashMap, FxHashSet};
use tracing::{debug, error};

use crate::bucket_queue::DoubleBucketQueue;
use crate::costing::{Cost, DynamicCost, MultiModalOptions, TravelMode, MAX_TRAVEL_MODES};
use crate::edge_status::{EdgeSet, EdgeStatus};
use crate::graph::{DirectedEdge, GraphId, GraphReader, GraphTile, NodeType, Use};
use crate::label::{BdEdgeLabel, MmEdgeLabel, INVALID_LABEL};
use crate::location::Location;
use crate::policy::{ExpansionPolicy, ExpansionRecommendation, RoutingType};
use crate::timeutil::{self, CONSTRAINED_FLOW_SECOND_OF_DAY, SECONDS_PER_DAY};

/// Weight added per meter between the raw input point and its snap point,
/// a slow-walk equivalence for covering the last meters off the network.
const LOCATION_SCORE_FACTOR: f32 = 0.005;

/// Counters for one traversal. Reset by `clear`.
#[derive(Debug, Clone, Default)]
pub struct ExpansionStats {
    pub pq_pushes: usize,
    pub pq_pops: usize,
    pub relaxations: usize,
    pub settled: usize,
}

/// Multimodal traversal state initialized lazily from the origin date-time
/// and the first transit tile encountered.
#[derive(Debug, Default)]
struct MultiModalState {
    /// Origin time as seconds from midnight.
    start_time: u32,
    origin_date_time: String,
    date_set: bool,
    /// Days between the schedule pivot and the origin date.
    date: u32,
    /// Day-of-week bitmask of the origin date.
    dow: u8,
    /// Service day index relative to the transit tile's creation date.
    day: u32,
    /// Origin date precedes the tile's schedule; no departures exist.
    date_before_tile: bool,
    max_transfer_distance: f32,
}

/// The expansion engine. One instance drives one traversal at a time and
/// owns its label store, edge status, and queue.
pub struct Dijkstras<'a, R: GraphReader> {
    reader: &'a R,
    bdedgelabels: Vec<BdEdgeLabel>,
    mmedgelabels: Vec<MmEdgeLabel>,
    adjacencylist: Option<DoubleBucketQueue>,
    edgestatus: EdgeStatus,
    stats: ExpansionStats,

    mode: TravelMode,
    access_mode: u16,
    has_date_time: bool,
    start_tz_index: u32,

    mm_options: MultiModalOptions,
    mm: MultiModalState,
    /// Transit operator names interned to dense ids, per traversal.
    operators: FxHashMap<String, u32>,
    /// Tiles whose stop exclusions were already applied.
    processed_tiles: FxHashSet<u64>,
}

impl<'a, R: GraphReader> Dijkstras<'a, R> {
    pub fn new(reader: &'a R) -> Dijkstras<'a, R> {
        Dijkstras::with_options(reader, MultiModalOptions::default())
    }

    pub fn with_options(reader: &'a R, mm_options: MultiModalOptions) -> Dijkstras<'a, R> {
        Dijkstras {
            reader,
            bdedgelabels: Vec::new(),
            mmedgelabels: Vec::new(),
            adjacencylist: None,
            edgestatus: EdgeStatus::new(),
            stats: ExpansionStats::default(),
            mode: TravelMode::Drive,
            access_mode: 0,
            has_date_time: false,
            start_tz_index: 0,
            mm_options,
            mm: MultiModalState::default(),
            operators: FxHashMap::default(),
            processed_tiles: FxHashSet::default(),
        }
    }

    /// Drop everything a previous traversal produced. Mandatory between
    /// reuses; the configured multimodal options survive.
    pub fn clear(&mut self) {
        self.bdedgelabels.clear();
        self.mmedgelabels.clear();
        self.adjacencylist = None;
        self.edgestatus.clear();
        self.stats = ExpansionStats::default();
        self.has_date_time = false;
        self.start_tz_index = 0;
        self.mm = MultiModalState::default();
        self.operators.clear();
        self.processed_tiles.clear();
    }

    pub fn reader(&self) -> &'a R {
        self.reader
    }

    /// Labels of the last forward or reverse traversal.
    pub fn bd_labels(&self) -> &[BdEdgeLabel] {
        &self.bdedgelabels
    }

    /// Labels of the last multimodal traversal.
    pub fn mm_labels(&self) -> &[MmEdgeLabel] {
        &self.mmedgelabels
    }

    pub fn edge_status(&self) -> &EdgeStatus {
        &self.edgestatus
    }

    pub fn stats(&self) -> &ExpansionStats {
        &self.stats
    }

    fn initialize(&mut self, multimodal: bool, bucket_size: f32, policy: &dyn ExpansionPolicy) {
        let hints = policy.expansion_hints();
        if multimodal {
            self.mmedgelabels.reserve(hints.edge_label_reservation as usize);
        } else {
            self.bdedgelabels.reserve(hints.edge_label_reservation as usize);
        }
        let range = hints.bucket_count as f32 * bucket_size;
        self.adjacencylist = Some(DoubleBucketQueue::new(0.0, range, bucket_size));
    }

    // Queue helpers. The key accessor reads the live sort cost from the
    // label store, so the queue never sees a stale key.

    fn add_bd(&mut self, idx: u32) {
        let labels = &self.bdedgelabels;
        if let Some(queue) = self.adjacencylist.as_mut() {
            queue.add(idx, |i| labels[i as usize].sortcost());
            self.stats.pq_pushes += 1;
        }
    }

    fn decrease_bd(&mut self, idx: u32, new_sort: f32) {
        let labels = &self.bdedgelabels;
        if let Some(queue) = self.adjacencylist.as_mut() {
            queue.decrease(idx, new_sort, |i| labels[i as usize].sortcost());
        }
    }

    fn pop_bd(&mut self) -> Option<u32> {
        let labels = &self.bdedgelabels;
        let popped = self.adjacencylist.as_mut()?.pop(|i| labels[i as usize].sortcost());
        if popped.is_some() {
            self.stats.pq_pops += 1;
        }
        popped
    }

    fn add_mm(&mut self, idx: u32) {
        let labels = &self.mmedgelabels;
        if let Some(queue) = self.adjacencylist.as_mut() {
            queue.add(idx, |i| labels[i as usize].sortcost());
            self.stats.pq_pushes += 1;
        }
    }

    fn decrease_mm(&mut self, idx: u32, new_sort: f32) {
        let labels = &self.mmedgelabels;
        if let Some(queue) = self.adjacencylist.as_mut() {
            queue.decrease(idx, new_sort, |i| labels[i as usize].sortcost());
        }
    }

    fn pop_mm(&mut self) -> Option<u32> {
        let labels = &self.mmedgelabels;
        let popped = self.adjacencylist.as_mut()?.pop(|i| labels[i as usize].sortcost());
        if popped.is_some() {
            self.stats.pq_pops += 1;
        }
        popped
    }

    /// Forward one-to-many traversal from the origin locations.
    pub fn compute(
        &mut self,
        locations: &mut [Location],
        costing: &dyn DynamicCost,
        policy: &mut dyn ExpansionPolicy,
    ) {
        self.clear();
        self.mode = costing.travel_mode();
        self.access_mode = costing.access_mode();
        self.initialize(false, costing.unit_size(), policy);
        self.seed_origins(locations, costing);

        let seed_node =
            self.bdedgelabels.first().map(|l| l.endnode()).unwrap_or(GraphId::INVALID);
        let (start_time, start_sow) = self.set_time(locations, seed_node);

        while let Some(pred_idx) = self.pop_bd() {
            // Copy before expansion; appends may relocate the store.
            let pred = self.bdedgelabels[pred_idx as usize].clone();
            self.edgestatus.update(pred.edgeid(), EdgeSet::Permanent);
            self.stats.settled += 1;

            let localtime = start_time + pred.cost().secs as u64;
            let seconds_of_week = timeutil::normalize_seconds_of_week(
                i64::from(start_sow) + pred.cost().secs as i64,
            );

            match policy.should_expand(pred.label(), RoutingType::Forward, self.bdedgelabels.len())
            {
                ExpansionRecommendation::Stop => break,
                ExpansionRecommendation::Prune => continue,
                ExpansionRecommendation::Continue => {}
            }
            self.expand_forward(
                pred.endnode(),
                &pred,
                pred_idx,
                false,
                localtime,
                seconds_of_week,
                costing,
                policy,
            );
        }
        debug!(
            labels = self.bdedgelabels.len(),
            settled = self.stats.settled,
            "forward expansion complete"
        );
    }

    #[allow(clippy::too_many_arguments)]
    fn expand_forward(
        &mut self,
        node: GraphId,
        pred: &BdEdgeLabel,
        pred_idx: u32,
        from_transition: bool,
        mut localtime: u64,
        mut seconds_of_week: u32,
        costing: &dyn DynamicCost,
        policy: &mut dyn ExpansionPolicy,
    ) {
        // Missing tiles happen with regional datasets; skip quietly.
        let reader = self.reader;
        let Some(tile) = reader.tile(node) else { return };
        let Some(nodeinfo) = tile.node(node) else { return };

        if !from_transition {
            let prev_pred = (pred.predecessor() != INVALID_LABEL)
                .then(|| self.bdedgelabels[pred.predecessor() as usize].label());
            policy.expanding_node(pred.label(), prev_pred, nodeinfo.ll);
        }

        if !costing.allowed_node(nodeinfo) {
            return;
        }

        // Rebase wall time when expansion crosses a timezone boundary.
        if nodeinfo.timezone != self.start_tz_index {
            if let (Some(from), Some(to)) = (
                timeutil::tz_from_index(self.start_tz_index),
                timeutil::tz_from_index(nodeinfo.timezone),
            ) {
                let diff = timeutil::timezone_diff(localtime, from, to);
                localtime = localtime.saturating_add_signed(diff);
                seconds_of_week = timeutil::normalize_seconds_of_week(
                    i64::from(seconds_of_week) + diff,
                );
            }
        }

        let edge_index = nodeinfo.edge_index;
        for (i, directededge) in tile.directededges(nodeinfo).iter().enumerate() {
            let edge_id = node.with_id(edge_index + i as u32);

            if directededge.is_shortcut()
                || self.edgestatus.get(edge_id).set == EdgeSet::Permanent
                || directededge.forwardaccess & self.access_mode == 0
            {
                continue;
            }

            let (check_time, tz) =
                if self.has_date_time { (localtime, nodeinfo.timezone) } else { (0, 0) };
            let allowance =
                costing.allowed(directededge, pred.label(), tile, edge_id, check_time, tz);
            if !allowance.allowed
                || costing.restricted(
                    directededge,
                    pred.label(),
                    &self.bdedgelabels,
                    tile,
                    edge_id,
                    true,
                    check_time,
                    tz,
                )
            {
                continue;
            }

            let sow = if self.has_date_time {
                seconds_of_week
            } else {
                CONSTRAINED_FLOW_SECOND_OF_DAY
            };
            let transition_cost = costing.transition_cost(directededge, nodeinfo, pred.label());
            let newcost =
                pred.cost() + costing.edge_cost(directededge, tile, sow) + transition_cost;

            // Relax a temporary label in place; the sort cost drops by the
            // real improvement so any external heuristic term survives.
            let status = self.edgestatus.get(edge_id);
            if status.set == EdgeSet::Temporary {
                let lab = &self.bdedgelabels[status.index as usize];
                if newcost.cost < lab.cost().cost {
                    let newsort = lab.sortcost() - (lab.cost().cost - newcost.cost);
                    self.decrease_bd(status.index, newsort);
                    self.bdedgelabels[status.index as usize].update(
                        pred_idx,
                        newcost,
                        newsort,
                        transition_cost,
                        allowance.time_restricted,
                    );
                    self.stats.relaxations += 1;
                }
                continue;
            }

            // Needed should a reverse path want to connect here later.
            let opp_edge_id = reader.opposing_edge_id(edge_id).unwrap_or(GraphId::INVALID);

            let idx = self.bdedgelabels.len() as u32;
            self.edgestatus.set(edge_id, EdgeSet::Temporary, idx, tile);
            self.bdedgelabels.push(BdEdgeLabel::new(
                pred_idx,
                edge_id,
                opp_edge_id,
                directededge,
                newcost,
                newcost.cost,
                self.mode,
                transition_cost,
                allowance.time_restricted,
            ));
            self.add_bd(idx);
        }

        // Queue the edges leaving the same junction on other levels. The
        // flag stops the recursion at depth two.
        if !from_transition && nodeinfo.transition_count > 0 {
            for trans in tile.transitions(nodeinfo) {
                self.expand_forward(
                    trans.endnode,
                    pred,
                    pred_idx,
                    true,
                    localtime,
                    seconds_of_week,
                    costing,
                    policy,
                );
            }
        }
    }

    /// Reverse one-to-many traversal toward the destination locations.
    pub fn compute_reverse(
        &mut self,
        locations: &mut [Location],
        costing: &dyn DynamicCost,
        policy: &mut dyn ExpansionPolicy,
    ) {
        self.clear();
        self.mode = costing.travel_mode();
        self.access_mode = costing.access_mode();
        self.initialize(false, costing.unit_size(), policy);
        self.seed_destinations(locations, costing);

        let seed_node =
            self.bdedgelabels.first().map(|l| l.endnode()).unwrap_or(GraphId::INVALID);
        let (start_time, start_sow) = self.set_time(locations, seed_node);

        while let Some(pred_idx) = self.pop_bd() {
            let pred = self.bdedgelabels[pred_idx as usize].clone();
            self.edgestatus.update(pred.edgeid(), EdgeSet::Permanent);
            self.stats.settled += 1;

            // The opposing predecessor edge feeds the reverse transition
            // cost; resolve it fresh in case a transition moved tiles.
            let reader = self.reader;
            let Some(opp_pred_edge) = reader
                .tile(pred.opp_edgeid())
                .and_then(|t| t.directededge(pred.opp_edgeid()))
            else {
                continue;
            };

            let localtime = start_time + pred.cost().secs as u64;
            // Walking backward in time from the arrival instant.
            let seconds_of_week = timeutil::normalize_seconds_of_week(
                i64::from(start_sow) - pred.cost().secs as i64,
            );

            match policy.should_expand(pred.label(), RoutingType::Forward, self.bdedgelabels.len())
            {
                ExpansionRecommendation::Stop => break,
                ExpansionRecommendation::Prune => continue,
                ExpansionRecommendation::Continue => {}
            }
            self.expand_reverse(
                pred.endnode(),
                &pred,
                pred_idx,
                opp_pred_edge,
                false,
                localtime,
                seconds_of_week,
                costing,
                policy,
            );
        }
        debug!(
            labels = self.bdedgelabels.len(),
            settled = self.stats.settled,
            "reverse expansion complete"
        );
    }

    #[allow(clippy::too_many_arguments)]
    fn expand_reverse(
        &mut self,
        node: GraphId,
        pred: &BdEdgeLabel,
        pred_idx: u32,
        opp_pred_edge: &DirectedEdge,
        from_transition: bool,
        mut localtime: u64,
        mut seconds_of_week: u32,
        costing: &dyn DynamicCost,
        policy: &mut dyn ExpansionPolicy,
    ) {
        let reader = self.reader;
        let Some(tile) = reader.tile(node) else { return };
        let Some(nodeinfo) = tile.node(node) else { return };

        if !from_transition {
            let prev_pred = (pred.predecessor() != INVALID_LABEL)
                .then(|| self.bdedgelabels[pred.predecessor() as usize].label());
            policy.expanding_node(pred.label(), prev_pred, nodeinfo.ll);
        }

        if !costing.allowed_node(nodeinfo) {
            return;
        }

        if nodeinfo.timezone != self.start_tz_index {
            if let (Some(from), Some(to)) = (
                timeutil::tz_from_index(self.start_tz_index),
                timeutil::tz_from_index(nodeinfo.timezone),
            ) {
                let diff = timeutil::timezone_diff(localtime, from, to);
                localtime = localtime.saturating_add_signed(diff);
                seconds_of_week = timeutil::normalize_seconds_of_week(
                    i64::from(seconds_of_week) + diff,
                );
            }
        }

        let edge_index = nodeinfo.edge_index;
        for (i, directededge) in tile.directededges(nodeinfo).iter().enumerate() {
            let edge_id = node.with_id(edge_index + i as u32);

            if directededge.reverseaccess & self.access_mode == 0
                || directededge.is_shortcut()
                || self.edgestatus.get(edge_id).set == EdgeSet::Permanent
            {
                continue;
            }

            // The cost of walking this edge backward is the cost of its
            // opposing edge; without one the candidate is unusable.
            let Some((opp_edge_id, opp_tile, opp_edge)) = reader.opposing_edge(edge_id) else {
                continue;
            };

            let (check_time, tz) =
                if self.has_date_time { (localtime, nodeinfo.timezone) } else { (0, 0) };
            let allowance = costing.allowed_reverse(
                directededge,
                pred.label(),
                opp_edge,
                opp_tile,
                opp_edge_id,
                check_time,
                tz,
            );
            if !allowance.allowed
                || costing.restricted(
                    directededge,
                    pred.label(),
                    &self.bdedgelabels,
                    tile,
                    edge_id,
                    false,
                    check_time,
                    tz,
                )
            {
                continue;
            }

            let sow = if self.has_date_time {
                seconds_of_week
            } else {
                CONSTRAINED_FLOW_SECOND_OF_DAY
            };
            let transition_cost = costing.transition_cost_reverse(
                directededge.localedgeidx,
                nodeinfo,
                opp_edge,
                opp_pred_edge,
            );
            let mut newcost = pred.cost() + costing.edge_cost(opp_edge, opp_tile, sow);
            newcost.cost += transition_cost.cost;

            let status = self.edgestatus.get(edge_id);
            if status.set == EdgeSet::Temporary {
                let lab = &self.bdedgelabels[status.index as usize];
                if newcost.cost < lab.cost().cost {
                    let newsort = lab.sortcost() - (lab.cost().cost - newcost.cost);
                    self.decrease_bd(status.index, newsort);
                    self.bdedgelabels[status.index as usize].update(
                        pred_idx,
                        newcost,
                        newsort,
                        transition_cost,
                        allowance.time_restricted,
                    );
                    self.stats.relaxations += 1;
                }
                continue;
            }

            let idx = self.bdedgelabels.len() as u32;
            self.edgestatus.set(edge_id, EdgeSet::Temporary, idx, tile);
            self.bdedgelabels.push(BdEdgeLabel::new(
                pred_idx,
                edge_id,
                opp_edge_id,
                directededge,
                newcost,
                newcost.cost,
                self.mode,
                transition_cost,
                allowance.time_restricted,
            ));
            self.add_bd(idx);
        }

        if !from_transition && nodeinfo.transition_count > 0 {
            for trans in tile.transitions(nodeinfo) {
                self.expand_reverse(
                    trans.endnode,
                    pred,
                    pred_idx,
                    opp_pred_edge,
                    true,
                    localtime,
                    seconds_of_week,
                    costing,
                    policy,
                );
            }
        }
    }

    /// Multimodal (pedestrian plus scheduled transit) traversal from the
    /// origin locations. The origin must carry a date-time; schedules are
    /// meaningless without one.
    pub fn compute_multimodal(
        &mut self,
        locations: &mut [Location],
        mode_costing: &[&dyn DynamicCost; MAX_TRAVEL_MODES],
        mode: TravelMode,
        policy: &mut dyn ExpansionPolicy,
    ) {
        self.clear();

        let pc = mode_costing[TravelMode::Pedestrian.index()];
        pc.set_allow_transit_connections(true);
        pc.use_max_multimodal_distance();
        let tc = mode_costing[TravelMode::PublicTransit.index()];

        self.mode = mode;
        self.access_mode = mode_costing[mode.index()].access_mode();
        self.mm.max_transfer_distance = self.mm_options.max_transfer_distance;

        self.initialize(true, mode_costing[mode.index()].unit_size(), policy);
        self.seed_origins_multimodal(locations, mode_costing[mode.index()]);

        let Some(origin_date_time) = locations.first().and_then(|l| l.date_time.clone()) else {
            error!("no date time set on the origin location for a multimodal expansion");
            return;
        };

        self.start_tz_index = self
            .mmedgelabels
            .first()
            .and_then(|l| {
                self.reader.tile(l.endnode()).and_then(|t| t.node(l.endnode())).map(|n| n.timezone)
            })
            .unwrap_or(0);
        if self.start_tz_index == 0 {
            error!("could not get the timezone at the origin location");
        }
        self.mm.origin_date_time = origin_date_time.clone();
        self.mm.start_time = timeutil::seconds_from_midnight(&origin_date_time);

        while let Some(pred_idx) = self.pop_mm() {
            let pred = self.mmedgelabels[pred_idx as usize].clone();
            self.edgestatus.update(pred.edgeid(), EdgeSet::Permanent);
            self.stats.settled += 1;

            match policy.should_expand(
                pred.label(),
                RoutingType::MultiModal,
                self.mmedgelabels.len(),
            ) {
                ExpansionRecommendation::Stop => break,
                ExpansionRecommendation::Prune => continue,
                ExpansionRecommendation::Continue => {}
            }
            self.expand_multimodal(pred.endnode(), &pred, pred_idx, false, tc, mode_costing, policy);
        }
        debug!(
            labels = self.mmedgelabels.len(),
            settled = self.stats.settled,
            "multimodal expansion complete"
        );
    }

    #[allow(clippy::too_many_arguments)]
    fn expand_multimodal(
        &mut self,
        node: GraphId,
        pred: &MmEdgeLabel,
        pred_idx: u32,
        from_transition: bool,
        tc: &dyn DynamicCost,
        mode_costing: &[&dyn DynamicCost; MAX_TRAVEL_MODES],
        policy: &mut dyn ExpansionPolicy,
    ) {
        let reader = self.reader;
        let Some(tile) = reader.tile(node) else { return };
        let Some(nodeinfo) = tile.node(node) else { return };

        if !from_transition {
            let prev_pred = (pred.predecessor() != INVALID_LABEL)
                .then(|| self.mmedgelabels[pred.predecessor() as usize].label());
            policy.expanding_node(pred.label(), prev_pred, nodeinfo.ll);
        }

        if !mode_costing[pred.mode().index()].allowed_node(nodeinfo) {
            return;
        }

        // Wall time as seconds of day, adjusted across timezones.
        let mut localtime = u64::from(self.mm.start_time) + pred.cost().secs as u64;
        if nodeinfo.timezone != self.start_tz_index {
            if let (Some(from), Some(to)) = (
                timeutil::tz_from_index(self.start_tz_index),
                timeutil::tz_from_index(nodeinfo.timezone),
            ) {
                localtime = localtime.saturating_add_signed(timeutil::timezone_diff(localtime, from, to));
            }
        }
        let mut localtime = localtime as u32;

        let mut transfer_cost = tc.default_transfer_cost();
        let has_transit_in = pred.has_transit();
        let mut prior_stop = pred.prior_stopid();

        if nodeinfo.node_type == NodeType::MultiUseTransitPlatform {
            // Station changes on foot pay the transfer penalty.
            if pred.mode() == TravelMode::Pedestrian && prior_stop.is_valid() && has_transit_in {
                transfer_cost = tc.transfer_cost();
            }

            if self.processed_tiles.insert(tile.id().tile_key()) {
                tc.add_to_exclude_list(tile);
            }
            if tc.is_excluded_node(tile, nodeinfo) {
                return;
            }

            // Entering a stop on foot costs the transfer time up front.
            if pred.mode() == TravelMode::Pedestrian {
                localtime += transfer_cost.secs as u32;
            }

            prior_stop = node;

            // The schedule day index is relative to the transit tile's
            // creation date, so it can only be fixed at the first platform.
            if !self.mm.date_set {
                self.mm.date = timeutil::days_from_pivot_date(&self.mm.origin_date_time);
                self.mm.dow = timeutil::day_of_week_mask(&self.mm.origin_date_time);
                let date_created = tile.header().date_created;
                if self.mm.date < date_created {
                    self.mm.date_before_tile = true;
                } else {
                    self.mm.day = self.mm.date - date_created;
                }
                self.mm.date_set = true;
            }
        }

        let edge_index = nodeinfo.edge_index;
        for (i, directededge) in tile.directededges(nodeinfo).iter().enumerate() {
            let edge_id = node.with_id(edge_index + i as u32);

            if directededge.is_shortcut() || self.edgestatus.get(edge_id).set == EdgeSet::Permanent
            {
                continue;
            }

            let mut mode = pred.mode();
            let mut mode_change = false;
            let mut newcost = pred.cost();
            let mut walking_distance = pred.path_distance();
            let mut trip_id = 0u32;
            let mut block_id = 0u32;
            let mut operator_id = pred.transit_operator();
            let mut has_transit = has_transit_in;
            let mut time_restricted = false;

            if directededge.is_transit_line() {
                // Reaching a line edge means the platform was walked to;
                // only the transit costing and exclusions can veto it.
                let allowance = tc.allowed(directededge, pred.label(), tile, edge_id, 0, 0);
                if !allowance.allowed {
                    continue;
                }
                time_restricted = allowance.time_restricted;
                if tc.is_excluded_edge(tile, directededge) {
                    continue;
                }

                let Some(mut departure) = tile.next_departure(
                    directededge.lineid,
                    localtime,
                    self.mm.day,
                    self.mm.dow,
                    self.mm.date_before_tile,
                    tc.wheelchair(),
                    tc.bicycle(),
                ) else {
                    continue;
                };

                mode_change = mode == TravelMode::Pedestrian;
                trip_id = departure.tripid;
                block_id = departure.blockid;
                has_transit = true;

                if trip_id == pred.tripid() || (block_id != 0 && block_id == pred.blockid()) {
                    // Staying on the same trip or block rides free.
                    operator_id = pred.transit_operator();
                } else {
                    if pred.tripid() > 0 {
                        // In-station transfer: allow a margin to cross the
                        // platform, retrying the lookup when the current
                        // departure cannot be made.
                        let retry = self.mm_options.transfer_retry_secs;
                        if localtime + retry > departure.departure_time {
                            match tile.next_departure(
                                directededge.lineid,
                                localtime + retry,
                                self.mm.day,
                                self.mm.dow,
                                self.mm.date_before_tile,
                                tc.wheelchair(),
                                tc.bicycle(),
                            ) {
                                Some(d) => {
                                    departure = d;
                                    trip_id = departure.tripid;
                                    block_id = departure.blockid;
                                }
                                None => continue,
                            }
                        }
                    }

                    operator_id = self.intern_operator(tile, departure.routeindex);

                    // Transfers pay either the operator-change penalty or
                    // the plain transfer cost, never both.
                    if pred.transit_operator() > 0 && pred.transit_operator() != operator_id {
                        newcost.cost += self.mm_options.operator_change_penalty;
                    } else {
                        newcost.cost += transfer_cost.cost;
                    }
                }

                mode = TravelMode::PublicTransit;
                newcost += tc.transit_edge_cost(directededge, departure, localtime);
            } else {
                if mode == TravelMode::PublicTransit {
                    // Disembark: back on foot with a fresh walking budget.
                    mode = TravelMode::Pedestrian;
                    walking_distance = 0;
                    mode_change = true;
                }

                let costing = mode_costing[mode.index()];
                let allowance = costing.allowed(directededge, pred.label(), tile, edge_id, 0, 0);
                if !allowance.allowed {
                    continue;
                }
                time_restricted = allowance.time_restricted;

                let mut cost = costing.edge_cost(directededge, tile, CONSTRAINED_FLOW_SECOND_OF_DAY);
                cost.cost *= costing.mode_factor();
                newcost += cost;

                if mode == TravelMode::Pedestrian {
                    walking_distance += directededge.length as u32;

                    // Walking in one egress and straight out another is
                    // entering a station without riding anything.
                    if nodeinfo.node_type == NodeType::TransitEgress
                        && pred.use_() == Use::EgressConnection
                        && directededge.use_ == Use::EgressConnection
                    {
                        continue;
                    }
                }
            }

            // No transition cost across a mode change; the wait already
            // prices boarding.
            let transition_cost = if mode_change {
                Cost::default()
            } else {
                mode_costing[mode.index()].transition_cost(directededge, nodeinfo, pred.label())
            };
            newcost += transition_cost;

            // Never walk back into the stop just left.
            if directededge.use_ == Use::TransitConnection && directededge.endnode == pred.prior_stopid()
            {
                continue;
            }
            if directededge.use_ == Use::TransitConnection
                && pred.prior_stopid().is_valid()
                && walking_distance as f32 > self.mm.max_transfer_distance
            {
                continue;
            }

            // The candidate is built before relaxation so the policy can
            // veto it in full.
            let candidate = MmEdgeLabel::new(
                pred_idx,
                edge_id,
                directededge,
                newcost,
                newcost.cost,
                mode,
                walking_distance,
                trip_id,
                prior_stop,
                block_id,
                operator_id,
                has_transit,
                transition_cost,
                time_restricted,
            );

            match policy.should_expand(
                candidate.label(),
                RoutingType::MultiModal,
                self.mmedgelabels.len(),
            ) {
                ExpansionRecommendation::Continue => {}
                _ => continue,
            }

            let status = self.edgestatus.get(edge_id);
            if status.set == EdgeSet::Temporary {
                let lab = &self.mmedgelabels[status.index as usize];
                if newcost.cost < lab.cost().cost {
                    let newsort = lab.sortcost() - (lab.cost().cost - newcost.cost);
                    self.decrease_mm(status.index, newsort);
                    self.mmedgelabels[status.index as usize].update(
                        pred_idx,
                        newcost,
                        newsort,
                        walking_distance,
                        trip_id,
                        block_id,
                        transition_cost,
                        time_restricted,
                    );
                    self.stats.relaxations += 1;
                }
                continue;
            }

            let idx = self.mmedgelabels.len() as u32;
            self.edgestatus.set(edge_id, EdgeSet::Temporary, idx, tile);
            self.mmedgelabels.push(candidate);
            self.add_mm(idx);
        }

        if !from_transition && nodeinfo.transition_count > 0 {
            for trans in tile.transitions(nodeinfo) {
                self.expand_multimodal(trans.endnode, pred, pred_idx, true, tc, mode_costing, policy);
            }
        }
    }

    /// Intern a transit operator name to a dense per-traversal id; 0 when
    /// the route has no operator.
    fn intern_operator(&mut self, tile: &GraphTile, routeindex: u32) -> u32 {
        let Some(route) = tile.transit_route(routeindex) else { return 0 };
        if route.op_name_offset == 0 {
            return 0;
        }
        let name = tile.name(route.op_name_offset);
        if name.is_empty() {
            return 0;
        }
        if let Some(&id) = self.operators.get(name) {
            return id;
        }
        let id = self.operators.len() as u32 + 1;
        self.operators.insert(name.to_string(), id);
        id
    }

    /// Seed the forward traversal from each origin's snapped edges.
    fn seed_origins(&mut self, locations: &[Location], costing: &dyn DynamicCost) {
        let reader = self.reader;
        for location in locations {
            // When the origin sits exactly at a node, the inbound stubs
            // only duplicate the outbound choices; skip them.
            let has_other_edges = location.path_edges.iter().any(|e| !e.end_node);

            for edge in &location.path_edges {
                if has_other_edges && edge.end_node {
                    continue;
                }
                let edge_id = edge.graph_id;
                if costing.avoid_as_origin_edge(edge_id, edge.percent_along) {
                    continue;
                }
                let Some(tile) = reader.tile(edge_id) else { continue };
                let Some(directededge) = tile.directededge(edge_id) else { continue };
                let Some(opp_edge_id) = reader.opposing_edge_id(edge_id) else { continue };

                let mut cost = costing.edge_cost(directededge, tile, CONSTRAINED_FLOW_SECOND_OF_DAY)
                    * (1.0 - edge.percent_along);
                cost.cost += edge.distance * LOCATION_SCORE_FACTOR;

                let idx = self.bdedgelabels.len() as u32;
                let mut label = BdEdgeLabel::new(
                    INVALID_LABEL,
                    edge_id,
                    opp_edge_id,
                    directededge,
                    cost,
                    cost.cost,
                    self.mode,
                    Cost::default(),
                    false,
                );
                label.set_origin();
                self.bdedgelabels.push(label);
                self.add_bd(idx);
                self.edgestatus.set(edge_id, EdgeSet::Temporary, idx, tile);
            }
        }
    }

    /// Seed the reverse traversal. The label is registered under the
    /// opposing edge so expansion proceeds off the opposing end node.
    fn seed_destinations(&mut self, locations: &[Location], costing: &dyn DynamicCost) {
        let reader = self.reader;
        for location in locations {
            let has_other_edges = location.path_edges.iter().any(|e| !e.begin_node);

            for edge in &location.path_edges {
                if has_other_edges && edge.begin_node {
                    continue;
                }
                let edge_id = edge.graph_id;
                if costing.avoid_as_destination_edge(edge_id, edge.percent_along) {
                    continue;
                }
                let Some(tile) = reader.tile(edge_id) else { continue };
                let Some(directededge) = tile.directededge(edge_id) else { continue };
                let Some((opp_edge_id, opp_tile, opp_dir_edge)) = reader.opposing_edge(edge_id)
                else {
                    continue;
                };

                let mut cost = costing.edge_cost(directededge, tile, CONSTRAINED_FLOW_SECOND_OF_DAY)
                    * edge.percent_along;
                cost.cost += edge.distance * LOCATION_SCORE_FACTOR;

                let idx = self.bdedgelabels.len() as u32;
                self.bdedgelabels.push(BdEdgeLabel::new(
                    INVALID_LABEL,
                    opp_edge_id,
                    edge_id,
                    opp_dir_edge,
                    cost,
                    cost.cost,
                    self.mode,
                    Cost::default(),
                    false,
                ));
                self.add_bd(idx);
                self.edgestatus.set(opp_edge_id, EdgeSet::Temporary, idx, opp_tile);
            }
        }
    }

    /// Seed the multimodal traversal. Unlike the other seeders this leaves
    /// the edge status unset; the first pop settles the seed edge.
    fn seed_origins_multimodal(&mut self, locations: &[Location], costing: &dyn DynamicCost) {
        let reader = self.reader;
        for location in locations {
            let has_other_edges = location.path_edges.iter().any(|e| !e.end_node);

            for edge in &location.path_edges {
                if has_other_edges && edge.end_node {
                    continue;
                }
                let edge_id = edge.graph_id;
                if costing.avoid_as_origin_edge(edge_id, edge.percent_along) {
                    continue;
                }
                let Some(tile) = reader.tile(edge_id) else { continue };
                let Some(directededge) = tile.directededge(edge_id) else { continue };
                // No tile at the end node means nothing to expand into.
                if reader.tile(directededge.endnode).is_none() {
                    continue;
                }

                let mut cost = costing.edge_cost(directededge, tile, CONSTRAINED_FLOW_SECOND_OF_DAY)
                    * (1.0 - edge.percent_along);
                cost.cost += edge.distance * LOCATION_SCORE_FACTOR;

                let walked = (directededge.length * (1.0 - edge.percent_along)) as u32;
                let idx = self.mmedgelabels.len() as u32;
                let mut label = MmEdgeLabel::new(
                    INVALID_LABEL,
                    edge_id,
                    directededge,
                    cost,
                    cost.cost,
                    self.mode,
                    walked,
                    0,
                    GraphId::INVALID,
                    0,
                    0,
                    false,
                    Cost::default(),
                    false,
                );
                label.set_origin();
                self.mmedgelabels.push(label);
                self.add_mm(idx);
            }
        }
    }

    /// Fix the traversal's time base from the first location's date-time
    /// and the timezone at the seed end node, and rewrite every location's
    /// date-time into the local timezone of one of its edges' end nodes.
    fn set_time(&mut self, locations: &mut [Location], node_id: GraphId) -> (u64, u32) {
        self.has_date_time = false;
        let Some(date_time) = locations.first().and_then(|l| l.date_time.clone()) else {
            return (0, 0);
        };
        if !node_id.is_valid() {
            return (0, 0);
        }

        let reader = self.reader;
        self.start_tz_index = reader
            .tile(node_id)
            .and_then(|t| t.node(node_id))
            .map(|n| n.timezone)
            .unwrap_or(0);
        let Some(tz) = timeutil::tz_from_index(self.start_tz_index) else {
            error!("could not get the timezone at the start location");
            return (0, 0);
        };

        let Some(start_time) = timeutil::seconds_since_epoch(&date_time, tz) else {
            error!(%date_time, "could not parse the start date time");
            return (0, 0);
        };
        let start_seconds_of_week = timeutil::day_of_week(&date_time) * SECONDS_PER_DAY
            + timeutil::seconds_from_midnight(&date_time);
        self.has_date_time = true;

        for location in locations.iter_mut() {
            let Some(dt) = location.date_time.clone() else { continue };
            for edge in &location.path_edges {
                let Some(endnode) = reader
                    .tile(edge.graph_id)
                    .and_then(|t| t.directededge(edge.graph_id))
                    .map(|e| e.endnode)
                else {
                    continue;
                };
                let Some(node) = reader.tile(endnode).and_then(|t| t.node(endnode)) else {
                    continue;
                };
                let Some(node_tz) = timeutil::tz_from_index(node.timezone) else { continue };

                // "current" becomes now at the node; anything else is
                // re-rendered in the node's local timezone.
                let rewritten = if dt == "current" {
                    timeutil::current_iso(node_tz)
                } else {
                    match timeutil::seconds_since_epoch(&dt, node_tz) {
                        Some(s) => timeutil::iso_in_tz(s, node_tz),
                        None => continue,
                    }
                };
                location.date_time = Some(rewritten);
                break;
            }
        }

        (start_time, start_seconds_of_week)
    }
}
