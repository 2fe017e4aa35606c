//! Workflow validation pipeline (§4.1). Runs once, accumulates every error
//! found, reports all of them, then fails if any were collected — never
//! the source's fail-fast-on-first-exception approach (§9).

use crate::facts::RuleFactStore;
use crate::join_planner::plan_join;
use crate::model::WorkflowGraph;
use crate::types::{NodeRef, NodeType};
use std::fmt;

#[derive(Debug, Clone)]
pub struct ValidationError {
    pub place_or_transition: String,
    pub message: String,
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.place_or_transition, self.message)
    }
}

#[derive(Debug, Default)]
pub struct ValidationResult {
    pub errors: Vec<ValidationError>,
    pub warnings: Vec<ValidationError>,
}

impl ValidationResult {
    pub fn is_ok(&self) -> bool {
        self.errors.is_empty()
    }

    fn push_error(&mut self, node: impl Into<String>, message: impl Into<String>) {
        self.errors.push(ValidationError {
            place_or_transition: node.into(),
            message: message.into(),
        });
    }

    fn push_warning(&mut self, node: impl Into<String>, message: impl Into<String>) {
        self.warnings.push(ValidationError {
            place_or_transition: node.into(),
            message: message.into(),
        });
    }

    pub fn summary(&self) -> String {
        self.errors
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join("; ")
    }
}

const CLOSED_NODE_TYPES: &[NodeType] = &[
    NodeType::EdgeNode,
    NodeType::JoinNode,
    NodeType::ForkNode,
    NodeType::XorNode,
    NodeType::DecisionNode,
    NodeType::GatewayNode,
    NodeType::MergeNode,
    NodeType::MonitorNode,
    NodeType::FeedFwdNode,
    NodeType::TerminateNode,
    NodeType::EventGenerator,
];

pub fn validate(graph: &WorkflowGraph, facts: &dyn RuleFactStore) -> ValidationResult {
    let mut result = ValidationResult::default();

    // Rule 1: every place (and every operation of multi-op places) must
    // resolve via activeService, falling back to hasOperation.
    for place in graph.places() {
        if place.is_event_generator() {
            continue;
        }
        let mut ops = vec![place.operation.clone()];
        ops.extend(place.secondary_operations.iter().cloned());
        for op in ops {
            if op.is_empty() {
                continue;
            }
            let found = facts.active_service(&place.service_name, &op).is_some()
                || facts.has_operation(&place.service_name, &op).is_some();
            if !found {
                result.push_error(
                    &place.id,
                    format!("service {} / operation {} not found", place.service_name, op),
                );
            }
        }
    }

    // Rule 2: every edge endpoint resolves to a known node or a literal.
    for edge_ref in graph.graph.edge_indices() {
        let (from, to) = graph.graph.edge_endpoints(edge_ref).unwrap();
        for idx in [from, to] {
            let id = graph.node(idx).id().to_string();
            // nodes reachable here were already resolved to a NodeIndex by
            // the parser, so they're known by construction; literal
            // endpoints never produced an edge in the first place (see
            // json_parser). This check defends future graph-construction
            // paths that might add an edge built from a raw ref.
            if matches!(graph.resolve_ref(&id), NodeRef::Node(_)) && graph.lookup(&id).is_none() {
                result.push_error(id, "edge endpoint does not resolve to a known node");
            }
        }
    }

    // Rule 3: every transition's type is in the closed set (structurally
    // guaranteed by NodeType::parse at JSON-parse time; re-checked here so
    // graphs built by other means are still covered).
    for t in graph.transitions() {
        if !CLOSED_NODE_TYPES.contains(&t.node_type) {
            result.push_error(&t.id, format!("unknown transition type {:?}", t.node_type));
        }
    }

    // Rule 4: non-floating places need at least one edge.
    for place in graph.places() {
        if place.floating || place.is_event_generator() {
            continue;
        }
        let has_edge = !graph.outgoing_transitions(&place.id).is_empty()
            || !graph.incoming_transitions(&place.id).is_empty();
        if !has_edge {
            result.push_error(&place.id, "non-floating place has no incoming or outgoing edge");
        }
    }

    // Rule 5: JoinNode topological incoming-arc count.
    for t in graph.transitions() {
        if t.node_type != NodeType::JoinNode {
            continue;
        }
        match plan_join(graph, &t.id) {
            Ok(plan) => {
                if plan.slots.len() < 2 {
                    result.push_error(&t.id, "join node has fewer than 2 topological incoming arcs");
                } else if plan.slots.len() > crate::codec::MAX_FANOUT as usize {
                    result.push_error(&t.id, "join node exceeds the 99-arc fan-out limit");
                }
                if let Some(downstream) = graph.downstream_place(&t.id) {
                    let expected = if downstream.arg_names.is_empty() {
                        plan.slots.len()
                    } else {
                        downstream.arg_names.len()
                    };
                    if expected != plan.slots.len() {
                        result.push_warning(
                            &t.id,
                            format!(
                                "canonical binding input count {} does not match join arc count {}",
                                expected,
                                plan.slots.len()
                            ),
                        );
                    }
                }
            }
            Err(e) => result.push_error(&t.id, e.to_string()),
        }
    }

    result
}
