//! Rule Generation for a place (§4.5). Produces the atoms the orchestrator
//! must see: `NodeType`, `JoinInputCount`, `DecisionValue`,
//! `meetsCondition`, `terminatesOn`.

use crate::join_planner::plan_join;
use crate::model::{GraphNode, WorkflowGraph};
use crate::types::{MeetsCondition, NodeType, PlaceId, ProcessMode, RuleContent, TerminatesOn, Transition};
use std::collections::BTreeMap;

const TERMINATE_LITERAL: &str = "TERMINATE";

/// Render a `RuleContent` as the atom text embedded in
/// `rulefiledata/data` (§3, §6) — one fact per line, in the order the
/// orchestrator needs to read `NodeType` before anything else.
pub fn render_rule_atoms(content: &RuleContent) -> String {
    let mut out = String::new();
    out.push_str(&format!("NodeType(\"{}\").\n", content.node_type.as_str()));
    if let Some(count) = content.join_input_count {
        out.push_str(&format!("JoinInputCount({count}).\n"));
    }
    for (condition_type, decision_value) in &content.decision_values {
        out.push_str(&format!("DecisionValue(\"{condition_type}\", \"{decision_value}\").\n"));
    }
    for mc in &content.meets_conditions {
        out.push_str(&format!(
            "meetsCondition(\"{}\", \"{}\", \"{}\", \"{}\").\n",
            mc.next_service, mc.next_operation, mc.condition_type, mc.decision_value
        ));
    }
    for t in &content.terminates_on {
        out.push_str(&format!("terminatesOn(\"{}\", \"{}\").\n", t.service, t.operation));
    }
    out
}

/// Pick the controlling transition for a place (§4.5 step 1): a routing
/// outgoing transition wins, else an incoming JoinNode, else the first
/// outgoing transition.
pub fn controlling_transition<'g>(
    graph: &'g WorkflowGraph,
    place_id: &PlaceId,
) -> Option<&'g Transition> {
    let outgoing = graph.outgoing_transitions(place_id);
    if let Some(t) = outgoing.iter().find(|t| t.node_type.is_routing_controller()) {
        return Some(t);
    }
    let incoming = graph.incoming_transitions(place_id);
    if let Some(t) = incoming.iter().find(|t| t.node_type == NodeType::JoinNode) {
        return Some(t);
    }
    outgoing.into_iter().next()
}

/// Generate the full rule content for one place (§4.5).
pub fn generate_rule_content(
    graph: &WorkflowGraph,
    place_id: &PlaceId,
    mode: ProcessMode,
) -> RuleContent {
    let controller = controlling_transition(graph, place_id);
    let node_type = controller.map(|t| t.node_type).unwrap_or(NodeType::EdgeNode);

    let join_input_count = if node_type == NodeType::JoinNode && mode == ProcessMode::PetriNet {
        graph
            .incoming_transitions(place_id)
            .iter()
            .find(|t| t.node_type == NodeType::JoinNode)
            .and_then(|j| plan_join(graph, &j.id).ok())
            .map(|plan| plan.slots.len() as u32)
    } else {
        None
    };

    let mut meets_conditions = Vec::new();
    let mut decision_values = Vec::new();
    let mut terminates_on = Vec::new();

    for outgoing in graph.outgoing_transitions(place_id) {
        emit_for_transition(
            graph,
            outgoing,
            &mut meets_conditions,
            &mut decision_values,
            &mut terminates_on,
        );
    }

    let buffer = graph
        .incoming_transitions(place_id)
        .iter()
        .find_map(|t| t.effective_buffer());

    RuleContent {
        node_type,
        join_input_count,
        decision_values,
        meets_conditions,
        terminates_on,
        buffer,
    }
}

fn target_place_and_operation(graph: &WorkflowGraph, transition_id: &str, endpoint_override: Option<&str>) -> Option<(String, String)> {
    let place = graph.downstream_place(&transition_id.to_string())?;
    let op = endpoint_override.map(str::to_string).unwrap_or_else(|| place.operation.clone());
    Some((place.service_name.clone(), op))
}

fn emit_for_transition(
    graph: &WorkflowGraph,
    transition: &Transition,
    meets_conditions: &mut Vec<MeetsCondition>,
    decision_values: &mut Vec<(String, String)>,
    terminates_on: &mut Vec<TerminatesOn>,
) {
    match transition.node_type {
        NodeType::EdgeNode | NodeType::TerminateNode | NodeType::MergeNode => {
            if let Some((svc, op)) = target_place_and_operation(graph, &transition.id, None) {
                if transition.node_type == NodeType::TerminateNode {
                    terminates_on.push(TerminatesOn { service: svc.clone(), operation: op.clone() });
                }
                meets_conditions.push(MeetsCondition {
                    next_service: svc,
                    next_operation: op,
                    condition_type: String::new(),
                    decision_value: String::new(),
                });
            }
        }
        NodeType::GatewayNode => {
            for (target_idx, edge) in graph.outgoing_edges(&transition.id) {
                let dv = edge.attrs.decision_value.clone().unwrap_or_default();
                let is_terminate = matches!(
                    graph.node(target_idx),
                    GraphNode::Transition(t) if t.node_type == NodeType::TerminateNode
                );
                if is_terminate {
                    meets_conditions.push(MeetsCondition {
                        next_service: TERMINATE_LITERAL.to_string(),
                        next_operation: TERMINATE_LITERAL.to_string(),
                        condition_type: "GATEWAY_NODE".to_string(),
                        decision_value: dv,
                    });
                } else if let Some((svc, op)) = place_or_transition_target(graph, target_idx, edge.attrs.endpoint.as_deref()) {
                    meets_conditions.push(MeetsCondition {
                        next_service: svc,
                        next_operation: op,
                        condition_type: "GATEWAY_NODE".to_string(),
                        decision_value: dv,
                    });
                }
            }
        }
        NodeType::ForkNode => {
            for (target_idx, edge) in graph.outgoing_edges(&transition.id) {
                if let Some((svc, op)) = place_or_transition_target(graph, target_idx, edge.attrs.endpoint.as_deref()) {
                    meets_conditions.push(MeetsCondition {
                        next_service: svc,
                        next_operation: op,
                        condition_type: String::new(),
                        decision_value: String::new(),
                    });
                }
            }
        }
        NodeType::DecisionNode | NodeType::XorNode => {
            let mut groups: BTreeMap<(String, String), Vec<(petgraph::graph::NodeIndex, Option<String>)>> = BTreeMap::new();
            for (target_idx, edge) in graph.outgoing_edges(&transition.id) {
                let key = (
                    edge.attrs.condition.clone().unwrap_or_default(),
                    edge.attrs.decision_value.clone().unwrap_or_default(),
                );
                groups.entry(key).or_default().push((target_idx, edge.attrs.endpoint.clone()));
            }
            for ((condition_type, decision_value), targets) in groups {
                if !condition_type.is_empty() || !decision_value.is_empty() {
                    decision_values.push((condition_type.clone(), decision_value.clone()));
                }
                for (target_idx, endpoint) in targets {
                    let is_end = matches!(graph.node(target_idx), GraphNode::Transition(t) if t.node_type == NodeType::TerminateNode);
                    if is_end {
                        if let Some((svc, op)) = place_or_transition_target(graph, target_idx, endpoint.as_deref()) {
                            terminates_on.push(TerminatesOn { service: svc.clone(), operation: op.clone() });
                            meets_conditions.push(MeetsCondition {
                                next_service: svc,
                                next_operation: op,
                                condition_type: condition_type.clone(),
                                decision_value: decision_value.clone(),
                            });
                        }
                        continue;
                    }
                    if let Some((svc, op)) = place_or_transition_target(graph, target_idx, endpoint.as_deref()) {
                        meets_conditions.push(MeetsCondition {
                            next_service: svc,
                            next_operation: op,
                            condition_type: condition_type.clone(),
                            decision_value: decision_value.clone(),
                        });
                    }
                }
            }
        }
        NodeType::MonitorNode | NodeType::FeedFwdNode | NodeType::JoinNode | NodeType::EventGenerator => {
            // MonitorNode has no downstream rule atoms of its own (§4.7); the
            // others only ever appear as a source, not an outgoing
            // transition of a rule-bearing place.
        }
    }
}

/// Resolve a graph node reached via an outgoing edge to its eventual
/// `(service, operation)` — walking through one more hop if the edge
/// target is itself a transition rather than a place.
fn place_or_transition_target(
    graph: &WorkflowGraph,
    target_idx: petgraph::graph::NodeIndex,
    endpoint_override: Option<&str>,
) -> Option<(String, String)> {
    match graph.node(target_idx) {
        GraphNode::Place(p) => {
            let op = endpoint_override.map(str::to_string).unwrap_or_else(|| p.operation.clone());
            Some((p.service_name.clone(), op))
        }
        GraphNode::Transition(t) => target_place_and_operation(graph, &t.id, endpoint_override),
    }
}
