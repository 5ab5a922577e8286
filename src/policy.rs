//! Expansion policy
//!
//! The traversal is parameterized by a policy object instead of
//! subclassing: isochrones, time-distance matrices, and the reach analysis
//! are sibling policies that decide when to keep expanding, when to prune
//! a branch, and when to stop the whole traversal. The default policy
//! expands until the queue runs dry.

use crate::label::EdgeLabel;

/// What the driver should do with a settled label.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExpansionRecommendation {
    Continue,
    /// Settle the label but do not expand from it.
    Prune,
    /// Terminate the traversal.
    Stop,
}

/// Which traversal flavor is consulting the policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoutingType {
    Forward,
    MultiModal,
}

/// Pre-sizing hints for a traversal.
#[derive(Debug, Clone, Copy)]
pub struct ExpansionHints {
    /// Number of queue buckets; together with the costing's unit size this
    /// fixes the bucketed cost range.
    pub bucket_count: u32,
    /// Label store capacity reserved up front.
    pub edge_label_reservation: u32,
}

impl Default for ExpansionHints {
    fn default() -> Self {
        // Roughly a metro-area traversal; one bucket per cost unit.
        ExpansionHints { bucket_count: 20_000, edge_label_reservation: 500_000 }
    }
}

/// Consumer hooks steering a traversal.
pub trait ExpansionPolicy {
    /// Called once per settled node before its edges are considered.
    fn expanding_node(
        &mut self,
        _pred: &EdgeLabel,
        _prev_pred: Option<&EdgeLabel>,
        _node_ll: (f64, f64),
    ) {
    }

    /// Consulted after each pop, and for each multimodal candidate label
    /// before it is committed. `num_labels` is the current label store
    /// size, which termination conditions are usually written against.
    fn should_expand(
        &mut self,
        _pred: &EdgeLabel,
        _routing_type: RoutingType,
        _num_labels: usize,
    ) -> ExpansionRecommendation {
        ExpansionRecommendation::Continue
    }

    fn expansion_hints(&self) -> ExpansionHints {
        ExpansionHints::default()
    }
}

/// Expands until the queue is exhausted.
#[derive(Debug, Default)]
pub struct DefaultPolicy;

impl ExpansionPolicy for DefaultPolicy {}
