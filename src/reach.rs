//! Reach analysis
//!
//! Reach scores how routable an edge is: how many distinct junctions can
//! be reached leaving it (outbound) and how many can reach it (inbound),
//! capped at a bound. Location snapping uses it to rank and prune
//! candidate edges when an input point is ambiguous.
//!
//! Two implementations. The simple variant walks topology only, ignoring
//! cost, and counts physical junctions while tolerating the duplicate
//! node records that cross-level transitions introduce. The cost-aware
//! variant runs the expansion engine with a policy that prunes once the
//! label store reaches the bound.

use rustc_hash::FxHashSet;

use crate::costing::{pass_through_edge_filter, pass_through_node_filter, DynamicCost};
use crate::dijkstras::Dijkstras;
use crate::graph::{DirectedEdge, GraphId, GraphReader};
use crate::location::{Location, PathEdge};
use crate::policy::{ExpansionHints, ExpansionPolicy, ExpansionRecommendation, RoutingType};

/// Direction bitmask: count nodes reachable from the edge.
pub const OUTBOUND: u8 = 1;
/// Direction bitmask: count nodes that can reach the edge.
pub const INBOUND: u8 = 2;

/// Reach per direction, each capped at the requested bound.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DirectedReach {
    pub outbound: u32,
    pub inbound: u32,
}

/// Topology-only reach by breadth-first expansion.
///
/// The progress measure is `|queue| + |done| - transitions`: enqueuing a
/// node also enqueues its cross-level counterparts, and the transitions
/// counter discounts those duplicates so the bound counts physical
/// junctions. Nodes never expanded still count; they are reachable.
pub fn simple_reach<R: GraphReader>(
    edge: &DirectedEdge,
    max_reach: u32,
    reader: &R,
    costing: Option<&dyn DynamicCost>,
    direction: u8,
) -> DirectedReach {
    let mut reach = DirectedReach::default();
    if max_reach == 0 {
        return reach;
    }

    let node_filter = match costing {
        Some(c) => c.node_filter(),
        None => pass_through_node_filter(),
    };
    let edge_filter = match costing {
        Some(c) => c.edge_filter(),
        None => pass_through_edge_filter(),
    };

    let mut queue: FxHashSet<u64> = FxHashSet::default();
    let mut done: FxHashSet<u64> = FxHashSet::default();
    queue.reserve(max_reach as usize);
    done.reserve(max_reach as usize);
    let mut transitions: i64 = 0;

    let enqueue = |node_id: GraphId,
                   queue: &mut FxHashSet<u64>,
                   done: &FxHashSet<u64>,
                   transitions: &mut i64| {
        if !node_id.is_valid() || done.contains(&node_id.value()) {
            return;
        }
        let Some(tile) = reader.tile(node_id) else { return };
        let Some(node) = tile.node(node_id) else { return };
        if node_filter(node) {
            return;
        }
        queue.insert(node_id.value());
        // The counterparts on other levels ride along so either record of
        // the junction can be expanded, while the counter keeps the
        // progress measure at one per physical junction.
        for transition in tile.transitions(node) {
            queue.insert(transition.endnode.value());
        }
        *transitions += i64::from(node.transition_count);
    };

    let progress = |queue: &FxHashSet<u64>, done: &FxHashSet<u64>, transitions: i64| -> i64 {
        (queue.len() + done.len()) as i64 - transitions
    };

    if direction & OUTBOUND != 0 {
        if edge_filter(edge) > 0.0 {
            enqueue(edge.endnode, &mut queue, &done, &mut transitions);
        }
        while progress(&queue, &done, transitions) < i64::from(max_reach) && !queue.is_empty() {
            let node_value = match queue.iter().next() {
                Some(v) => *v,
                None => break,
            };
            queue.remove(&node_value);
            done.insert(node_value);

            let node_id = GraphId::from_value(node_value);
            let Some(tile) = reader.tile(node_id) else { continue };
            let Some(node) = tile.node(node_id) else { continue };
            for e in tile.directededges(node) {
                if edge_filter(e) > 0.0 {
                    enqueue(e.endnode, &mut queue, &done, &mut transitions);
                }
            }
        }
        reach.outbound =
            (progress(&queue, &done, transitions).max(0) as u32).min(max_reach);
    }

    if direction & INBOUND != 0 {
        queue.clear();
        done.clear();
        transitions = 0;

        // The inbound seed is the edge's begin node, reached through the
        // opposing edge's end node.
        let begin_node = reader
            .tile(edge.endnode)
            .and_then(|tile| {
                let node = tile.node(edge.endnode)?;
                let opp = tile.directededge_at(node.edge_index + edge.opp_index)?;
                Some(opp.endnode)
            })
            .unwrap_or(GraphId::INVALID);
        if edge_filter(edge) > 0.0 {
            enqueue(begin_node, &mut queue, &done, &mut transitions);
        }

        while progress(&queue, &done, transitions) < i64::from(max_reach) && !queue.is_empty() {
            let node_value = match queue.iter().next() {
                Some(v) => *v,
                None => break,
            };
            queue.remove(&node_value);
            done.insert(node_value);

            let node_id = GraphId::from_value(node_value);
            let Some(tile) = reader.tile(node_id) else { continue };
            let Some(node) = tile.node(node_id) else { continue };
            for e in tile.directededges(node) {
                // Traversal toward this node runs on the opposing edge, so
                // that is the edge the filter judges.
                let Some(end_tile) = reader.tile(e.endnode) else { continue };
                let Some(end_node) = end_tile.node(e.endnode) else { continue };
                let Some(opp_edge) =
                    end_tile.directededge_at(end_node.edge_index + e.opp_index)
                else {
                    continue;
                };
                if edge_filter(opp_edge) > 0.0 {
                    enqueue(e.endnode, &mut queue, &done, &mut transitions);
                }
            }
        }
        reach.inbound =
            (progress(&queue, &done, transitions).max(0) as u32).min(max_reach);
    }

    reach
}

/// Policy that lets the traversal run until the label store reaches the
/// reach bound, then prunes every further branch.
struct ReachPolicy {
    max_reach: u32,
}

impl ExpansionPolicy for ReachPolicy {
    fn should_expand(
        &mut self,
        _pred: &crate::label::EdgeLabel,
        _routing_type: RoutingType,
        num_labels: usize,
    ) -> ExpansionRecommendation {
        if num_labels < self.max_reach as usize {
            ExpansionRecommendation::Continue
        } else {
            ExpansionRecommendation::Prune
        }
    }

    fn expansion_hints(&self) -> ExpansionHints {
        ExpansionHints {
            bucket_count: self.max_reach * 2,
            edge_label_reservation: self.max_reach * 2,
        }
    }
}

/// Cost-aware reach, counting labeled edges of bounded forward and
/// reverse traversals seeded from the edge.
pub struct Reach<'a, R: GraphReader> {
    dijkstras: Dijkstras<'a, R>,
}

impl<'a, R: GraphReader> Reach<'a, R> {
    pub fn new(reader: &'a R) -> Reach<'a, R> {
        Reach { dijkstras: Dijkstras::new(reader) }
    }

    /// Reach of `edge` under `costing`, bounded by `max_reach`, for the
    /// requested directions.
    pub fn reach(
        &mut self,
        edge: &DirectedEdge,
        edge_id: GraphId,
        max_reach: u32,
        costing: &dyn DynamicCost,
        direction: u8,
    ) -> DirectedReach {
        let mut reach = DirectedReach::default();
        if max_reach == 0 {
            return reach;
        }

        // Mock up a location snapped to the middle of the edge so the
        // ordinary seeding path applies.
        let ll = self
            .dijkstras
            .reader()
            .end_node(edge)
            .and_then(|(tile, node_id)| tile.node_ll(node_id))
            .unwrap_or((0.0, 0.0));
        let location = Location::with_edge(ll, PathEdge::new(edge_id, ll));

        let mut policy = ReachPolicy { max_reach };

        if direction & OUTBOUND != 0 {
            let mut locations = vec![location.clone()];
            self.dijkstras.compute(&mut locations, costing, &mut policy);
            reach.outbound = (self.dijkstras.bd_labels().len() as u32).min(max_reach);
        }

        if direction & INBOUND != 0 {
            let mut locations = vec![location];
            self.dijkstras.compute_reverse(&mut locations, costing, &mut policy);
            reach.inbound = (self.dijkstras.bd_labels().len() as u32).min(max_reach);
        }

        self.dijkstras.clear();
        reach
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::costing::{RoadCosting, RoadCostingOptions};
    use crate::graph::{access, builder::edge_id_between, TileSet, TileSetBuilder};

    /// A—B—C—D chain, all bidirectional.
    fn chain() -> (TileSet, Vec<GraphId>) {
        let mut b = TileSetBuilder::new();
        let a = b.add_node(0, 0, (0.0, 0.0));
        let bb = b.add_node(0, 0, (0.001, 0.0));
        let c = b.add_node(0, 0, (0.002, 0.0));
        let d = b.add_node(0, 0, (0.003, 0.0));
        b.add_road(a, bb, 100.0, access::ALL);
        b.add_road(bb, c, 100.0, access::ALL);
        b.add_road(c, d, 100.0, access::ALL);
        (b.build().unwrap(), vec![a, bb, c, d])
    }

    fn edge_of<'t>(tiles: &'t TileSet, from: GraphId, to: GraphId) -> (GraphId, &'t DirectedEdge) {
        let id = edge_id_between(tiles, from, to).unwrap();
        (id, tiles.tile(id).unwrap().directededge(id).unwrap())
    }

    #[test]
    fn test_simple_reach_zero_bound() {
        let (tiles, nodes) = chain();
        let (_, edge) = edge_of(&tiles, nodes[0], nodes[1]);
        let reach = simple_reach(edge, 0, &tiles, None, OUTBOUND | INBOUND);
        assert_eq!(reach, DirectedReach::default());
    }

    #[test]
    fn test_simple_reach_counts_chain() {
        let (tiles, nodes) = chain();
        let (_, edge) = edge_of(&tiles, nodes[0], nodes[1]);
        let reach = simple_reach(edge, 10, &tiles, None, OUTBOUND | INBOUND);
        // From (A,B): B, then back across A and on through C and D.
        assert_eq!(reach.outbound, 4);
        assert_eq!(reach.inbound, 4);
    }

    #[test]
    fn test_simple_reach_cap() {
        let (tiles, nodes) = chain();
        let (_, edge) = edge_of(&tiles, nodes[0], nodes[1]);
        let reach = simple_reach(edge, 2, &tiles, None, OUTBOUND);
        assert_eq!(reach.outbound, 2);
        assert_eq!(reach.inbound, 0);
    }

    #[test]
    fn test_simple_reach_matches_single_direction_runs() {
        let (tiles, nodes) = chain();
        let (_, edge) = edge_of(&tiles, nodes[1], nodes[2]);
        let both = simple_reach(edge, 10, &tiles, None, OUTBOUND | INBOUND);
        let out = simple_reach(edge, 10, &tiles, None, OUTBOUND);
        let inb = simple_reach(edge, 10, &tiles, None, INBOUND);
        assert_eq!(both.outbound, out.outbound);
        assert_eq!(both.inbound, inb.inbound);
        assert_eq!(out.inbound, 0);
        assert_eq!(inb.outbound, 0);
    }

    #[test]
    fn test_cost_aware_reach_capped() {
        let (tiles, nodes) = chain();
        let (edge_id, edge) = edge_of(&tiles, nodes[0], nodes[1]);
        let costing = RoadCosting::drive(RoadCostingOptions::default());
        let mut analyzer = Reach::new(&tiles);
        let reach = analyzer.reach(edge, edge_id, 3, &costing, OUTBOUND | INBOUND);
        assert!(reach.outbound <= 3);
        assert!(reach.inbound <= 3);
        assert!(reach.outbound > 0);
        assert!(reach.inbound > 0);
    }

    #[test]
    fn test_cost_aware_reach_zero_bound() {
        let (tiles, nodes) = chain();
        let (edge_id, edge) = edge_of(&tiles, nodes[0], nodes[1]);
        let costing = RoadCosting::drive(RoadCostingOptions::default());
        let mut analyzer = Reach::new(&tiles);
        let reach = analyzer.reach(edge, edge_id, 0, &costing, OUTBOUND | INBOUND);
        assert_eq!(reach, DirectedReach::default());
    }
}
