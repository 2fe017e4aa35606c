//! The in-memory workflow graph (§4.1). Built once per deploy from the
//! parsed JSON and discarded when the deploy completes.

use crate::types::{EdgeAttrs, NodeRef, Place, PlaceId, Transition, TransitionId};
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::Direction;
use std::collections::HashMap;

/// A node of the workflow graph — a Place or a Transition. Kept as one enum
/// (mirroring the teacher's single `IRNode` enum) so `petgraph` can hold
/// both kinds of node in one graph without a second index layer.
#[derive(Debug, Clone)]
pub enum GraphNode {
    Place(Place),
    Transition(Transition),
}

impl GraphNode {
    pub fn id(&self) -> &str {
        match self {
            Self::Place(p) => &p.id,
            Self::Transition(t) => &t.id,
        }
    }
}

#[derive(Debug, Clone)]
pub struct GraphEdge {
    pub attrs: EdgeAttrs,
}

pub struct WorkflowGraph {
    pub graph: DiGraph<GraphNode, GraphEdge>,
    by_id: HashMap<String, NodeIndex>,
}

impl WorkflowGraph {
    pub fn new() -> Self {
        Self {
            graph: DiGraph::new(),
            by_id: HashMap::new(),
        }
    }

    pub fn add_place(&mut self, place: Place) -> NodeIndex {
        let id = place.id.clone();
        let idx = self.graph.add_node(GraphNode::Place(place));
        self.by_id.insert(id, idx);
        idx
    }

    pub fn add_transition(&mut self, transition: Transition) -> NodeIndex {
        let id = transition.id.clone();
        let idx = self.graph.add_node(GraphNode::Transition(transition));
        self.by_id.insert(id, idx);
        idx
    }

    pub fn lookup(&self, id: &str) -> Option<NodeIndex> {
        self.by_id.get(id).copied()
    }

    pub fn node(&self, idx: NodeIndex) -> &GraphNode {
        &self.graph[idx]
    }

    pub fn place(&self, id: &str) -> Option<&Place> {
        match self.lookup(id).map(|idx| &self.graph[idx]) {
            Some(GraphNode::Place(p)) => Some(p),
            _ => None,
        }
    }

    pub fn transition(&self, id: &str) -> Option<&Transition> {
        match self.lookup(id).map(|idx| &self.graph[idx]) {
            Some(GraphNode::Transition(t)) => Some(t),
            _ => None,
        }
    }

    /// Resolve an edge endpoint to either a known node or a well-known
    /// literal (§4.1 rule 2); the validator is responsible for flagging
    /// anything that resolves to neither.
    pub fn resolve_ref(&self, raw: &str) -> NodeRef {
        NodeRef::parse(raw)
    }

    pub fn add_edge(&mut self, from: NodeIndex, to: NodeIndex, attrs: EdgeAttrs) {
        self.graph.add_edge(from, to, GraphEdge { attrs });
    }

    pub fn places(&self) -> impl Iterator<Item = &Place> {
        self.graph.node_weights().filter_map(|n| match n {
            GraphNode::Place(p) => Some(p),
            _ => None,
        })
    }

    pub fn transitions(&self) -> impl Iterator<Item = &Transition> {
        self.graph.node_weights().filter_map(|n| match n {
            GraphNode::Transition(t) => Some(t),
            _ => None,
        })
    }

    /// Outgoing transitions reachable from a place in one hop.
    pub fn outgoing_transitions(&self, place_id: &PlaceId) -> Vec<&Transition> {
        let Some(idx) = self.lookup(place_id) else { return Vec::new() };
        self.graph
            .neighbors_directed(idx, Direction::Outgoing)
            .filter_map(|n| match &self.graph[n] {
                GraphNode::Transition(t) => Some(t),
                _ => None,
            })
            .collect()
    }

    /// Incoming transitions feeding into a place in one hop.
    pub fn incoming_transitions(&self, place_id: &PlaceId) -> Vec<&Transition> {
        let Some(idx) = self.lookup(place_id) else { return Vec::new() };
        self.graph
            .neighbors_directed(idx, Direction::Incoming)
            .filter_map(|n| match &self.graph[n] {
                GraphNode::Transition(t) => Some(t),
                _ => None,
            })
            .collect()
    }

    /// Incoming transitions feeding into a transition — used by the join
    /// planner to walk back from a JoinNode to its source places/transitions.
    /// Sorted by edge insertion (JSON arrow) order: petgraph's adjacency
    /// list is LIFO, and callers (join slot assignment, decision branch
    /// evaluation) depend on seeing arrows in the order they were declared.
    pub fn incoming_edges(&self, id: &TransitionId) -> Vec<(NodeIndex, &GraphEdge)> {
        let Some(idx) = self.lookup(id) else { return Vec::new() };
        let mut edges: Vec<_> = self
            .graph
            .edges_directed(idx, Direction::Incoming)
            .map(|e| (e.id(), e.source(), e.weight()))
            .collect();
        edges.sort_by_key(|(edge_idx, _, _)| edge_idx.index());
        edges.into_iter().map(|(_, src, w)| (src, w)).collect()
    }

    pub fn outgoing_edges(&self, id: &str) -> Vec<(NodeIndex, &GraphEdge)> {
        let Some(idx) = self.lookup(id) else { return Vec::new() };
        let mut edges: Vec<_> = self
            .graph
            .edges_directed(idx, Direction::Outgoing)
            .map(|e| (e.id(), e.target(), e.weight()))
            .collect();
        edges.sort_by_key(|(edge_idx, _, _)| edge_idx.index());
        edges.into_iter().map(|(_, tgt, w)| (tgt, w)).collect()
    }

    /// The single place downstream of a transition, if any (§4.3 step 1).
    pub fn downstream_place(&self, transition_id: &TransitionId) -> Option<&Place> {
        let idx = self.lookup(transition_id)?;
        self.graph
            .neighbors_directed(idx, Direction::Outgoing)
            .find_map(|n| match &self.graph[n] {
                GraphNode::Place(p) => Some(p),
                _ => None,
            })
    }

    /// Standalone MonitorNode transitions — not fed from any place, used
    /// only as a Gateway/Xor drop target (§4.1 model surface).
    pub fn standalone_monitor_nodes(&self) -> Vec<&Transition> {
        use crate::types::NodeType;
        self.transitions()
            .filter(|t| t.node_type == NodeType::MonitorNode)
            .filter(|t| {
                let idx = self.lookup(&t.id).unwrap();
                self.graph.neighbors_directed(idx, Direction::Incoming).count() == 0
            })
            .collect()
    }
}

impl Default for WorkflowGraph {
    fn default() -> Self {
        Self::new()
    }
}
