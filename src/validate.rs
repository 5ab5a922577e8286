//! Traversal invariant checks
//!
//! Replays a finished traversal against the properties the engine
//! guarantees and returns human-readable violations. Integration tests
//! run these after every scenario; they are cheap enough to run against
//! production traversals when debugging.

use crate::edge_status::{EdgeSet, EdgeStatus};
use crate::graph::{GraphId, GraphReader};
use crate::label::{BdEdgeLabel, EdgeLabel, INVALID_LABEL};
use crate::policy::{ExpansionPolicy, ExpansionRecommendation, RoutingType};

/// Policy wrapper that records the settlement sequence while letting the
/// traversal run to exhaustion.
#[derive(Debug, Default)]
pub struct SettlementRecorder {
    pub sortcosts: Vec<f32>,
    pub edges: Vec<GraphId>,
}

impl ExpansionPolicy for SettlementRecorder {
    fn should_expand(
        &mut self,
        pred: &EdgeLabel,
        _routing_type: RoutingType,
        _num_labels: usize,
    ) -> ExpansionRecommendation {
        self.sortcosts.push(pred.sortcost());
        self.edges.push(pred.edgeid());
        ExpansionRecommendation::Continue
    }
}

/// Settlement order must be non-decreasing in sort cost. The bucket queue
/// orders at bucket granularity, so costs within one bucket may settle in
/// insertion order; `tolerance` is the bucket size (zero when all sort
/// costs land on distinct bucket boundaries).
pub fn check_monotone_settlement(sortcosts: &[f32], tolerance: f32) -> Vec<String> {
    let mut errors = Vec::new();
    for pair in sortcosts.windows(2) {
        if pair[1] < pair[0] - tolerance {
            errors.push(format!(
                "settlement order regressed: {} settled after {}",
                pair[1], pair[0]
            ));
        }
    }
    errors
}

/// Labels must reference valid predecessors with non-increasing history,
/// and must never sit on shortcut edges.
pub fn check_label_store<R: GraphReader>(labels: &[BdEdgeLabel], reader: &R) -> Vec<String> {
    let mut errors = Vec::new();
    for (i, label) in labels.iter().enumerate() {
        let edge = reader.tile(label.edgeid()).and_then(|t| t.directededge(label.edgeid()));
        match edge {
            Some(e) if e.is_shortcut() => {
                errors.push(format!("label {i} sits on shortcut edge {:?}", label.edgeid()));
            }
            Some(_) => {}
            None => {
                errors.push(format!("label {i} references missing edge {:?}", label.edgeid()));
            }
        }

        let pred = label.predecessor();
        if pred != INVALID_LABEL {
            if pred as usize >= labels.len() {
                errors.push(format!("label {i} has out-of-range predecessor {pred}"));
            } else if labels[pred as usize].cost().cost > label.cost().cost {
                errors.push(format!(
                    "label {i} is cheaper than its predecessor ({} < {})",
                    label.cost().cost,
                    labels[pred as usize].cost().cost
                ));
            }
        }
    }
    errors
}

/// Every labeled edge's status entry must point back at a label for that
/// edge.
pub fn check_status_consistency(labels: &[BdEdgeLabel], status: &EdgeStatus) -> Vec<String> {
    let mut errors = Vec::new();
    for (edge_id, info) in status.iter() {
        if info.set == EdgeSet::Unreached || info.index == INVALID_LABEL {
            continue;
        }
        match labels.get(info.index as usize) {
            Some(label) if label.edgeid() == edge_id => {}
            Some(label) => errors.push(format!(
                "status for {:?} points at label {} which labels {:?}",
                edge_id,
                info.index,
                label.edgeid()
            )),
            None => errors.push(format!(
                "status for {:?} points at out-of-range label {}",
                edge_id, info.index
            )),
        }
    }
    errors
}
