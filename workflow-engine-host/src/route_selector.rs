//! Route Selector (§4.7). Chooses downstream destinations for an
//! already-invoked place, given its rule content and the business
//! method's return value.
//!
//! Grounded on `vm.rs`'s Fork/Join opcode handling and branch evaluation —
//! generalized from bytecode jump targets to `meetsCondition` rows.

use workflow_engine_core::codec::encode_child;
use workflow_engine_core::types::{MeetsCondition, NodeType, ReturnValue, RuleContent, SequenceId};

#[derive(Debug, Clone, PartialEq)]
pub struct ForkChild {
    pub next_service: String,
    pub next_operation: String,
    pub sequence_id: SequenceId,
}

#[derive(Debug, Clone, PartialEq)]
pub enum RouteDecision {
    /// Single destination, same sequence id.
    Edge { next_service: String, next_operation: String, sequence_id: SequenceId },
    /// TerminateNode reached: record T_out as TERMINATE/TERMINATE and end
    /// the token (§4.7).
    Terminate { sequence_id: SequenceId },
    /// Fan-out to multiple children, each with a codec-encoded id (§4.4).
    Fork { children: Vec<ForkChild> },
    /// MonitorNode: timing only, no downstream.
    MonitorOnly,
    /// GatewayNode with zero matching edges (§4.7).
    Dropped { reason: String },
}

/// Evaluate whether a `meetsCondition` row's guard is satisfied by the
/// return value. Degenerate rows (empty condition_type/decision_value, as
/// emitted for Edge/Terminate/Merge/Fork destinations) are always
/// satisfied — they carry no guard to evaluate.
fn condition_satisfied(mc: &MeetsCondition, value: &ReturnValue) -> bool {
    if mc.condition_type.is_empty() && mc.decision_value.is_empty() {
        return true;
    }
    value.routing_path().as_deref() == Some(mc.decision_value.as_str())
}

/// Select the route for a place given its controlling NodeType, generated
/// rule content, the business return value, and the parent sequence id
/// (§4.7).
pub fn select_route(
    node_type: NodeType,
    content: &RuleContent,
    return_value: Option<&ReturnValue>,
    parent_sequence_id: SequenceId,
) -> RouteDecision {
    match node_type {
        // A JoinNode/FeedFwdNode is only ever the *controller* when a place
        // has no routing-governing outgoing transition of its own (§4.5
        // step 1) — its real outgoing meetsCondition row is still the
        // plain, unguarded edge to the next place, so it routes like one.
        NodeType::EdgeNode | NodeType::MergeNode | NodeType::JoinNode | NodeType::FeedFwdNode => match content.meets_conditions.first() {
            Some(mc) => RouteDecision::Edge {
                next_service: mc.next_service.clone(),
                next_operation: mc.next_operation.clone(),
                sequence_id: parent_sequence_id,
            },
            None => RouteDecision::Dropped { reason: "no destination configured".into() },
        },
        NodeType::TerminateNode => RouteDecision::Terminate { sequence_id: parent_sequence_id },
        NodeType::DecisionNode => {
            let value = match return_value {
                Some(v) => v,
                None => return RouteDecision::Dropped { reason: "no return value to evaluate".into() },
            };
            content
                .meets_conditions
                .iter()
                .find(|mc| condition_satisfied(mc, value))
                .map(|mc| RouteDecision::Edge {
                    next_service: mc.next_service.clone(),
                    next_operation: mc.next_operation.clone(),
                    sequence_id: parent_sequence_id,
                })
                .unwrap_or(RouteDecision::Dropped { reason: "no branch condition satisfied".into() })
        }
        NodeType::XorNode => {
            let value = match return_value {
                Some(v) => v,
                None => return RouteDecision::Dropped { reason: "no return value to evaluate".into() },
            };
            let matches: Vec<&MeetsCondition> =
                content.meets_conditions.iter().filter(|mc| condition_satisfied(mc, value)).collect();
            route_from_matches(matches, parent_sequence_id)
        }
        NodeType::GatewayNode => {
            let value = match return_value {
                Some(v) => v,
                None => return RouteDecision::Dropped { reason: "no routing key returned".into() },
            };
            let key = value.routing_path();
            let matches: Vec<&MeetsCondition> = content
                .meets_conditions
                .iter()
                .filter(|mc| key.as_deref() == Some(mc.decision_value.as_str()))
                .collect();
            if matches.is_empty() {
                return RouteDecision::Dropped { reason: "no gateway edge matched the routing key".into() };
            }
            route_from_matches(matches, parent_sequence_id)
        }
        NodeType::ForkNode => {
            let children: Vec<&MeetsCondition> = content.meets_conditions.iter().collect();
            if children.is_empty() {
                return RouteDecision::Dropped { reason: "fork node has no destinations".into() };
            }
            fork_to(children, parent_sequence_id)
        }
        NodeType::MonitorNode => RouteDecision::MonitorOnly,
        NodeType::EventGenerator => {
            RouteDecision::Dropped { reason: format!("{node_type:?} has no route-selector behavior") }
        }
    }
}

/// One match = EDGE (same sequenceId continues); more than one = treat as
/// fork via the token-id codec (§4.7 XorNode/GatewayNode rule).
fn route_from_matches(matches: Vec<&MeetsCondition>, parent_sequence_id: SequenceId) -> RouteDecision {
    match matches.len() {
        0 => RouteDecision::Dropped { reason: "no branch matched".into() },
        1 => {
            let mc = matches[0];
            RouteDecision::Edge {
                next_service: mc.next_service.clone(),
                next_operation: mc.next_operation.clone(),
                sequence_id: parent_sequence_id,
            }
        }
        _ => fork_to(matches, parent_sequence_id),
    }
}

fn fork_to(destinations: Vec<&MeetsCondition>, parent_sequence_id: SequenceId) -> RouteDecision {
    let fanout = destinations.len() as u32;
    let children = destinations
        .into_iter()
        .enumerate()
        .map(|(i, mc)| ForkChild {
            next_service: mc.next_service.clone(),
            next_operation: mc.next_operation.clone(),
            sequence_id: encode_child(parent_sequence_id, fanout, (i + 1) as u32),
        })
        .collect();
    RouteDecision::Fork { children }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mc(svc: &str, op: &str, ct: &str, dv: &str) -> MeetsCondition {
        MeetsCondition {
            next_service: svc.into(),
            next_operation: op.into(),
            condition_type: ct.into(),
            decision_value: dv.into(),
        }
    }

    #[test]
    fn edge_node_routes_to_its_single_destination() {
        let content = RuleContent {
            node_type: NodeType::EdgeNode,
            join_input_count: None,
            decision_values: vec![],
            meets_conditions: vec![mc("svcB", "op2", "", "")],
            terminates_on: vec![],
            buffer: None,
        };
        let decision = select_route(NodeType::EdgeNode, &content, None, 1_000_000);
        assert_eq!(
            decision,
            RouteDecision::Edge { next_service: "svcB".into(), next_operation: "op2".into(), sequence_id: 1_000_000 }
        );
    }

    #[test]
    fn scenario_3_gateway_single_match_is_edge() {
        let content = RuleContent {
            node_type: NodeType::GatewayNode,
            join_input_count: None,
            decision_values: vec![],
            meets_conditions: vec![
                mc("svcB", "op2", "GATEWAY_NODE", "true"),
                mc("svcC", "op3", "GATEWAY_NODE", "true"),
                mc("Monitor", "monitor", "GATEWAY_NODE", "false"),
            ],
            terminates_on: vec![],
            buffer: None,
        };
        let value = ReturnValue::Str("false".into());
        let decision = select_route(NodeType::GatewayNode, &content, Some(&value), 3_000_000);
        assert_eq!(
            decision,
            RouteDecision::Edge { next_service: "Monitor".into(), next_operation: "monitor".into(), sequence_id: 3_000_000 }
        );
    }

    #[test]
    fn scenario_4_gateway_multi_match_is_fork() {
        let content = RuleContent {
            node_type: NodeType::GatewayNode,
            join_input_count: None,
            decision_values: vec![],
            meets_conditions: vec![
                mc("svcB", "op2", "GATEWAY_NODE", "true"),
                mc("svcC", "op3", "GATEWAY_NODE", "true"),
                mc("Monitor", "monitor", "GATEWAY_NODE", "false"),
            ],
            terminates_on: vec![],
            buffer: None,
        };
        let value = ReturnValue::Str("true".into());
        let decision = select_route(NodeType::GatewayNode, &content, Some(&value), 3_000_000);
        match decision {
            RouteDecision::Fork { children } => {
                assert_eq!(children.len(), 2);
                assert_eq!(children[0].sequence_id, encode_child(3_000_000, 2, 1));
                assert_eq!(children[1].sequence_id, encode_child(3_000_000, 2, 2));
            }
            other => panic!("expected fork, got {other:?}"),
        }
    }

    #[test]
    fn gateway_with_no_match_is_dropped() {
        let content = RuleContent {
            node_type: NodeType::GatewayNode,
            join_input_count: None,
            decision_values: vec![],
            meets_conditions: vec![mc("svcB", "op2", "GATEWAY_NODE", "true")],
            terminates_on: vec![],
            buffer: None,
        };
        let value = ReturnValue::Str("nope".into());
        let decision = select_route(NodeType::GatewayNode, &content, Some(&value), 1);
        assert!(matches!(decision, RouteDecision::Dropped { .. }));
    }

    #[test]
    fn fork_node_splits_unconditionally() {
        let content = RuleContent {
            node_type: NodeType::ForkNode,
            join_input_count: None,
            decision_values: vec![],
            meets_conditions: vec![mc("svcB", "op2", "", ""), mc("svcC", "op3", "", "")],
            terminates_on: vec![],
            buffer: None,
        };
        let decision = select_route(NodeType::ForkNode, &content, None, 2_000_000);
        match decision {
            RouteDecision::Fork { children } => assert_eq!(children.len(), 2),
            other => panic!("expected fork, got {other:?}"),
        }
    }
}
