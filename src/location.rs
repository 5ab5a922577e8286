//! Wire-protocol location objects
//!
//! A location is a user input point snapped onto one or more candidate
//! graph edges. Each candidate carries where along the edge the snap
//! landed and how far the raw input was from the road.

use serde::{Deserialize, Serialize};

use crate::graph::GraphId;

/// One candidate edge a location snapped to.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PathEdge {
    pub graph_id: GraphId,
    /// Snap point on the edge, (lon, lat).
    pub ll: (f64, f64),
    /// Meters between the raw input point and the snap point.
    pub distance: f32,
    /// Fraction of the edge already behind the snap point, in [0, 1].
    pub percent_along: f32,
    /// Snap landed exactly on the edge's begin node.
    pub begin_node: bool,
    /// Snap landed exactly on the edge's end node.
    pub end_node: bool,
}

impl PathEdge {
    pub fn new(graph_id: GraphId, ll: (f64, f64)) -> PathEdge {
        PathEdge { graph_id, ll, distance: 0.0, percent_along: 0.0, begin_node: false, end_node: false }
    }
}

/// A routing waypoint with its snapped candidates.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Location {
    /// Raw input point, (lon, lat).
    pub ll: (f64, f64),
    /// ISO local date-time (`YYYY-MM-DDTHH:MM`), or the literal string
    /// `"current"`. Absent for time-independent requests.
    pub date_time: Option<String>,
    pub path_edges: Vec<PathEdge>,
}

impl Location {
    pub fn new(ll: (f64, f64)) -> Location {
        Location { ll, date_time: None, path_edges: Vec::new() }
    }

    pub fn with_edge(ll: (f64, f64), edge: PathEdge) -> Location {
        Location { ll, date_time: None, path_edges: vec![edge] }
    }
}
