//! Join Slot Planner (§4.3). For each JoinNode, decide which incoming arc
//! fills which named input slot, and what return-attribute each
//! contributing place must use so a fork child knows where it lands.

use crate::error::{Result, WorkflowError};
use crate::model::{GraphNode, WorkflowGraph};
use crate::types::{NodeType, TransitionId};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JoinSlot {
    pub slot_name: String,
    pub slot_index: u32,
    /// The T_out transition feeding this slot.
    pub source_transition: TransitionId,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JoinPlan {
    pub join_id: TransitionId,
    pub slots: Vec<JoinSlot>,
}

/// `true` iff `source` and `target` are a retry feedback loop rather than a
/// parallel join branch: `T_out_X -> T_in_Y` where `suffix(X) == suffix(Y)`.
pub fn is_feedback_loop(source_id: &str, target_id: &str) -> bool {
    let suffix = |id: &str| {
        id.strip_prefix("T_in_")
            .or_else(|| id.strip_prefix("T_out_"))
            .unwrap_or(id)
    };
    suffix(source_id) == suffix(target_id)
}

/// Plan the input slots for a single JoinNode (§4.3).
pub fn plan_join(graph: &WorkflowGraph, join_id: &TransitionId) -> Result<JoinPlan> {
    let downstream = graph.downstream_place(join_id);
    let arg_names: Vec<String> = downstream
        .map(|p| p.arg_names.clone())
        .filter(|names| !names.is_empty())
        .unwrap_or_default();

    let incoming = graph.incoming_edges(join_id);
    let mut retained: Vec<TransitionId> = Vec::new();

    for (source_idx, _edge) in incoming {
        let GraphNode::Transition(source) = graph.node(source_idx) else {
            continue;
        };
        if source.node_type == NodeType::EventGenerator {
            continue;
        }
        if is_feedback_loop(&source.id, join_id) {
            continue;
        }
        retained.push(source.id.clone());
    }

    if retained.len() > crate::codec::MAX_FANOUT as usize {
        return Err(WorkflowError::WorkflowDefErrorJoin {
            place: join_id.clone(),
            reason: format!("{} incoming arcs exceeds the 99-arc limit", retained.len()),
        });
    }

    let slots = retained
        .into_iter()
        .enumerate()
        .map(|(i, source_transition)| {
            let slot_index = (i + 1) as u32;
            let slot_name = arg_names
                .get(i)
                .cloned()
                .unwrap_or_else(|| format!("token_branch{slot_index}"));
            JoinSlot { slot_name, slot_index, source_transition }
        })
        .collect::<Vec<_>>();

    if !arg_names.is_empty() && slots.len() > arg_names.len() {
        return Err(WorkflowError::WorkflowDefErrorJoin {
            place: join_id.clone(),
            reason: format!(
                "{} retained incoming arcs but only {} declared argument slots",
                slots.len(),
                arg_names.len()
            ),
        });
    }

    Ok(JoinPlan { join_id: join_id.clone(), slots })
}

/// The return-attribute a place must publish under, derived from which
/// join slot (if any) its T_out transition feeds. Places whose T_out does
/// not feed a join default to `"token"` (§4.3 step 3).
pub fn return_attr_for_place(graph: &WorkflowGraph, place_id: &str) -> String {
    for t_out in graph.outgoing_transitions(&place_id.to_string()) {
        for join in graph.transitions().filter(|t| t.node_type == NodeType::JoinNode) {
            let Ok(plan) = plan_join(graph, &join.id) else { continue };
            if let Some(slot) = plan.slots.iter().find(|s| s.source_transition == t_out.id) {
                return slot.slot_name.clone();
            }
        }
    }
    "token".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::json_parser::parse_workflow_json;

    fn two_branch_join_doc() -> &'static str {
        r#"{
            "processType":"PetriNet",
            "elements":[
                {"type":"PLACE","id":"P1","service":"svc","operation":"a"},
                {"type":"PLACE","id":"P2","service":"svc","operation":"b"},
                {"type":"TRANSITION","id":"T_out_P1","node_type":"EdgeNode","transition_type":"T_out"},
                {"type":"TRANSITION","id":"T_out_P2","node_type":"EdgeNode","transition_type":"T_out"},
                {"type":"TRANSITION","id":"Join1","node_type":"JoinNode"},
                {"type":"PLACE","id":"P4","service":"svc","operation":"d"}
            ],
            "arrows":[
                {"source":"P1","target":"T_out_P1"},
                {"source":"P2","target":"T_out_P2"},
                {"source":"T_out_P1","target":"Join1"},
                {"source":"T_out_P2","target":"Join1"},
                {"source":"Join1","target":"P4"}
            ]
        }"#
    }

    #[test]
    fn two_real_branches_fill_two_slots() {
        let parsed = parse_workflow_json(two_branch_join_doc()).unwrap();
        let plan = plan_join(&parsed.graph, &"Join1".to_string()).unwrap();
        assert_eq!(plan.slots.len(), 2);
        assert_eq!(plan.slots[0].slot_index, 1);
        assert_eq!(plan.slots[1].slot_index, 2);
        // no declared arg_names on P4 -> fallback token_branchN naming
        assert_eq!(plan.slots[0].slot_name, "token_branch1");
        assert_eq!(plan.slots[1].slot_name, "token_branch2");
    }

    #[test]
    fn event_generator_source_excluded() {
        let doc = r#"{
            "processType":"PetriNet",
            "elements":[
                {"type":"EVENT_GENERATOR","id":"EG1","service":"svc","operation":"gen"},
                {"type":"PLACE","id":"P2","service":"svc","operation":"b"},
                {"type":"TRANSITION","id":"T_out_P2","node_type":"EdgeNode","transition_type":"T_out"},
                {"type":"TRANSITION","id":"GenFeed","node_type":"EventGenerator"},
                {"type":"TRANSITION","id":"Join1","node_type":"JoinNode"},
                {"type":"PLACE","id":"P4","service":"svc","operation":"d"}
            ],
            "arrows":[
                {"source":"EG1","target":"GenFeed"},
                {"source":"GenFeed","target":"Join1"},
                {"source":"P2","target":"T_out_P2"},
                {"source":"T_out_P2","target":"Join1"},
                {"source":"Join1","target":"P4"}
            ]
        }"#;
        let parsed = parse_workflow_json(doc).unwrap();
        let plan = plan_join(&parsed.graph, &"Join1".to_string()).unwrap();
        assert_eq!(plan.slots.len(), 1);
        assert_eq!(plan.slots[0].source_transition, "T_out_P2");
    }

    #[test]
    fn feedback_loop_detection_matches_suffix() {
        assert!(is_feedback_loop("T_out_P2", "T_in_P2"));
        assert!(!is_feedback_loop("T_out_P2", "T_in_P3"));
    }
}
