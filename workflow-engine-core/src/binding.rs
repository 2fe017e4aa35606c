//! Canonical binding generation (§3, §4.2 step 3). In PetriNet mode,
//! bindings are regenerated wholesale from topology (join slot assignments
//! decide both input names and the place's return attribute). In SOA mode,
//! hand-authored bindings already in the fact store are preserved as-is.

use crate::join_planner::return_attr_for_place;
use crate::model::WorkflowGraph;
use crate::types::{CanonicalBinding, NodeType, ProcessMode};
use std::collections::HashMap;

/// Regenerate canonical bindings for every deployable place (PetriNet
/// mode), or return an empty set to signal "preserve what's already
/// there" (SOA mode) — callers branch on `mode` before calling this so the
/// distinction stays visible at the call site in `deploy.rs`.
pub fn generate_bindings(graph: &WorkflowGraph, mode: ProcessMode) -> Vec<CanonicalBinding> {
    if mode != ProcessMode::PetriNet {
        return Vec::new();
    }

    let mut by_place: HashMap<String, Vec<String>> = HashMap::new();
    for join in graph.transitions().filter(|t| t.node_type == NodeType::JoinNode) {
        let Ok(plan) = crate::join_planner::plan_join(graph, &join.id) else { continue };
        let Some(downstream) = graph.downstream_place(&join.id) else { continue };
        let names = plan.slots.iter().map(|s| s.slot_name.clone()).collect();
        by_place.insert(downstream.id.clone(), names);
    }

    graph
        .places()
        .filter(|p| p.is_deployable())
        .map(|place| {
            let input_slots = by_place
                .get(&place.id)
                .cloned()
                .unwrap_or_else(|| place.arg_names.clone());
            let return_attr = return_attr_for_place(graph, &place.id);
            CanonicalBinding {
                service_name: place.service_name.clone(),
                operation: place.operation.clone(),
                return_attr,
                input_slots,
            }
        })
        .collect()
}

/// Render the `canonicalBinding(operation, returnAttr, input_i)` atom
/// block for a binding, in the form appended to `Service.ruleml` (§4.2
/// step 3).
pub fn render_binding_atoms(binding: &CanonicalBinding) -> String {
    let mut out = String::new();
    for (i, input) in binding.input_slots.iter().enumerate() {
        out.push_str(&format!(
            "canonicalBinding(\"{}\", \"{}\", \"input_{}\", \"{}\").\n",
            binding.operation,
            binding.return_attr,
            i + 1,
            input
        ));
    }
    if binding.input_slots.is_empty() {
        out.push_str(&format!(
            "canonicalBinding(\"{}\", \"{}\").\n",
            binding.operation, binding.return_attr
        ));
    }
    out
}
