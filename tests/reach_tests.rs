//! Reach analysis scenarios
//!
//! Runs the topology-only and cost-aware reach over small synthetic
//! graphs, including the cross-level duplicate bookkeeping and the
//! zero-bound short-circuit.

use std::cell::Cell;

use monarch_route::graph::builder::edge_id_between;
use monarch_route::graph::{access, DirectedEdge, GraphTile, TileSet, TileSetBuilder};
use monarch_route::{
    simple_reach, DirectedReach, GraphId, GraphReader, Reach, RoadCosting, RoadCostingOptions,
    INBOUND, OUTBOUND,
};

fn chain() -> (TileSet, Vec<GraphId>) {
    let mut b = TileSetBuilder::new();
    let a = b.add_node(0, 0, (0.0, 0.0));
    let n_b = b.add_node(0, 0, (0.0001, 0.0));
    let c = b.add_node(0, 0, (0.0002, 0.0));
    let d = b.add_node(0, 0, (0.0003, 0.0));
    b.add_road(a, n_b, 10.0, access::ALL);
    b.add_road(n_b, c, 10.0, access::ALL);
    b.add_road(c, d, 10.0, access::ALL);
    (b.build().unwrap(), vec![a, n_b, c, d])
}

fn edge_of<'t>(tiles: &'t TileSet, from: GraphId, to: GraphId) -> (GraphId, &'t DirectedEdge) {
    let id = edge_id_between(tiles, from, to).unwrap();
    (id, tiles.tile(id).unwrap().directededge(id).unwrap())
}

#[test]
fn simple_reach_covers_chain() {
    let (tiles, nodes) = chain();
    let (_, edge) = edge_of(&tiles, nodes[0], nodes[1]);
    let reach = simple_reach(edge, 10, &tiles, None, OUTBOUND | INBOUND);
    assert_eq!(reach.outbound, 4);
    assert_eq!(reach.inbound, 4);
}

#[test]
fn simple_reach_respects_bound() {
    let (tiles, nodes) = chain();
    let (_, edge) = edge_of(&tiles, nodes[0], nodes[1]);
    let reach = simple_reach(edge, 2, &tiles, None, OUTBOUND | INBOUND);
    assert_eq!(reach.outbound, 2);
    assert_eq!(reach.inbound, 2);
}

#[test]
fn directions_are_independent() {
    let (tiles, nodes) = chain();
    let (_, edge) = edge_of(&tiles, nodes[1], nodes[2]);
    let both = simple_reach(edge, 10, &tiles, None, OUTBOUND | INBOUND);
    let out = simple_reach(edge, 10, &tiles, None, OUTBOUND);
    let inb = simple_reach(edge, 10, &tiles, None, INBOUND);
    assert_eq!(out.outbound, both.outbound);
    assert_eq!(inb.inbound, both.inbound);
    assert_eq!(out.inbound, 0);
    assert_eq!(inb.outbound, 0);
    assert_eq!(simple_reach(edge, 10, &tiles, None, 0), DirectedReach::default());
}

/// Reader wrapper counting tile lookups.
struct CountingReader<'t> {
    tiles: &'t TileSet,
    lookups: Cell<usize>,
}

impl<'t> GraphReader for CountingReader<'t> {
    fn tile(&self, id: GraphId) -> Option<&GraphTile> {
        self.lookups.set(self.lookups.get() + 1);
        self.tiles.tile(id)
    }
}

#[test]
fn zero_bound_touches_no_tiles() {
    let (tiles, nodes) = chain();
    let (_, edge) = edge_of(&tiles, nodes[0], nodes[1]);
    let counting = CountingReader { tiles: &tiles, lookups: Cell::new(0) };
    let reach = simple_reach(edge, 0, &counting, None, OUTBOUND | INBOUND);
    assert_eq!(reach, DirectedReach::default());
    assert_eq!(counting.lookups.get(), 0);
}

#[test]
fn transition_duplicates_count_once() {
    let mut b = TileSetBuilder::new();
    let a = b.add_node(0, 0, (0.0, 0.0));
    let n_b = b.add_node(0, 0, (0.0001, 0.0));
    let b_up = b.add_node(0, 1, (0.0001, 0.0));
    let c_up = b.add_node(0, 1, (0.0002, 0.0));
    b.add_road(a, n_b, 10.0, access::ALL);
    b.add_road(b_up, c_up, 10.0, access::ALL);
    b.add_transition(n_b, b_up);
    b.add_transition(b_up, n_b);
    let tiles = b.build().unwrap();

    let (_, edge) = edge_of(&tiles, a, n_b);
    let reach = simple_reach(edge, 10, &tiles, None, OUTBOUND);
    // Physical junctions are A, B (with its arterial twin), and the
    // arterial neighbor; the twin is a duplicate record, not a junction.
    assert_eq!(reach.outbound, 3);
}

#[test]
fn edge_filter_prunes_expansion() {
    // Drive costing rejects pedestrian-only edges through its filter.
    let mut b = TileSetBuilder::new();
    let a = b.add_node(0, 0, (0.0, 0.0));
    let n_b = b.add_node(0, 0, (0.0001, 0.0));
    let c = b.add_node(0, 0, (0.0002, 0.0));
    b.add_road(a, n_b, 10.0, access::AUTO);
    b.add_road(n_b, c, 10.0, access::PEDESTRIAN);
    let walled = b.build().unwrap();

    let costing = RoadCosting::drive(RoadCostingOptions::default());
    let (_, edge) = edge_of(&walled, a, n_b);
    let reach = simple_reach(edge, 10, &walled, Some(&costing), OUTBOUND);
    // Only A and B are reachable by car.
    assert_eq!(reach.outbound, 2);
}

#[test]
fn cost_aware_reach_bounded_both_directions() {
    let (tiles, nodes) = chain();
    let (edge_id, edge) = edge_of(&tiles, nodes[0], nodes[1]);
    let costing = RoadCosting::drive(RoadCostingOptions::default());
    let mut analyzer = Reach::new(&tiles);

    let reach = analyzer.reach(edge, edge_id, 3, &costing, OUTBOUND | INBOUND);
    assert!(reach.outbound > 0 && reach.outbound <= 3);
    assert!(reach.inbound > 0 && reach.inbound <= 3);

    let unbounded = analyzer.reach(edge, edge_id, 100, &costing, OUTBOUND | INBOUND);
    assert!(unbounded.outbound >= reach.outbound);
    assert!(unbounded.inbound >= reach.inbound);
}

#[test]
fn cost_aware_reach_single_direction_leaves_other_zero() {
    let (tiles, nodes) = chain();
    let (edge_id, edge) = edge_of(&tiles, nodes[1], nodes[2]);
    let costing = RoadCosting::drive(RoadCostingOptions::default());
    let mut analyzer = Reach::new(&tiles);

    let out = analyzer.reach(edge, edge_id, 5, &costing, OUTBOUND);
    assert!(out.outbound > 0);
    assert_eq!(out.inbound, 0);

    let inb = analyzer.reach(edge, edge_id, 5, &costing, INBOUND);
    assert!(inb.inbound > 0);
    assert_eq!(inb.outbound, 0);
}
