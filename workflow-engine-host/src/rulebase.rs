//! Rule-base cache (§4.6 step 4, §9): interprets the atom text carried in
//! a received rule payload back into a `RuleContent`, and resolves the
//! per-place `InputBinding`/return-attribute from the canonical-binding
//! facts so `service_host` can build a real [`PlaceRuntime`] instead of
//! only the hand-built ones `orchestrator`'s own tests use.
//!
//! Grounded on `rulegen::render_rule_atoms`, whose line format this module
//! is the exact inverse of.

use workflow_engine_core::error::{Result, WorkflowError};
use workflow_engine_core::facts::RuleFactStore;
use workflow_engine_core::rule_payload_xml::ParsedRulePayload;
use workflow_engine_core::types::{MeetsCondition, NodeType, ProcessMode, RuleContent, TerminatesOn};

use crate::orchestrator::{InputBinding, PlaceRuntime};

/// Split one atom line's parenthesized argument list into its quoted
/// fields, e.g. `"a", "b", "c"` -> `["a", "b", "c"]`.
fn parse_args(inner: &str) -> Vec<String> {
    if inner.trim().is_empty() {
        return Vec::new();
    }
    inner.split(',').map(|field| field.trim().trim_matches('"').to_string()).collect()
}

fn parse_line(line: &str) -> Option<(&str, Vec<String>)> {
    let line = line.trim().trim_end_matches('.');
    if line.is_empty() {
        return None;
    }
    let open = line.find('(')?;
    let close = line.rfind(')')?;
    let name = &line[..open];
    let args = parse_args(&line[open + 1..close]);
    Some((name, args))
}

/// Interpret the raw atom text of a rule payload into a [`RuleContent`]
/// (the inverse of `rulegen::render_rule_atoms`).
pub fn parse_rule_atoms(raw: &str) -> Result<RuleContent> {
    let mut node_type = None;
    let mut join_input_count = None;
    let mut decision_values = Vec::new();
    let mut meets_conditions = Vec::new();
    let mut terminates_on = Vec::new();

    for line in raw.lines() {
        let Some((name, args)) = parse_line(line) else { continue };
        match name {
            "NodeType" => {
                let kind = args.first().ok_or_else(|| WorkflowError::MalformedToken("NodeType atom missing argument".into()))?;
                node_type = NodeType::parse(kind);
            }
            "JoinInputCount" => {
                join_input_count = args.first().and_then(|s| s.parse().ok());
            }
            "DecisionValue" => {
                if args.len() == 2 {
                    decision_values.push((args[0].clone(), args[1].clone()));
                }
            }
            "meetsCondition" => {
                if args.len() == 4 {
                    meets_conditions.push(MeetsCondition {
                        next_service: args[0].clone(),
                        next_operation: args[1].clone(),
                        condition_type: args[2].clone(),
                        decision_value: args[3].clone(),
                    });
                }
            }
            "terminatesOn" => {
                if args.len() == 2 {
                    terminates_on.push(TerminatesOn { service: args[0].clone(), operation: args[1].clone() });
                }
            }
            _ => {}
        }
    }

    let node_type = node_type.ok_or_else(|| WorkflowError::MalformedToken("rule atoms carry no NodeType".into()))?;

    Ok(RuleContent { node_type, join_input_count, decision_values, meets_conditions, terminates_on, buffer: None })
}

/// Derive the place's input binding from its canonical-binding input
/// slots (§9): zero slots runs on arrival with no attribute check, one
/// slot requires that exact attribute, more than one accepts whichever
/// of them arrives first.
fn derive_input_binding(facts: &dyn RuleFactStore, service: &str, operation: &str) -> InputBinding {
    let Some(row) = facts.canonical_binding(service, operation) else {
        return InputBinding::NullInput;
    };
    let inputs: Vec<String> = (1..)
        .map_while(|i| row.get(&format!("input_{i}")).map(str::to_string))
        .collect();
    match inputs.len() {
        0 => InputBinding::NullInput,
        1 => InputBinding::Single(inputs.into_iter().next().unwrap()),
        _ => InputBinding::AnyOf(inputs),
    }
}

/// Build the runtime a `service_host` orchestrator needs for one place,
/// from its parsed rule payload, the fact store, and the deployed
/// process's mode (static per deployed process, not per payload).
pub fn build_place_runtime(
    place_id: &str,
    parsed: &ParsedRulePayload,
    facts: &dyn RuleFactStore,
    process_mode: ProcessMode,
) -> Result<PlaceRuntime> {
    let content = parse_rule_atoms(&parsed.raw_atoms)?;
    let input_binding = derive_input_binding(facts, &parsed.target_service, &parsed.target_operation);
    let return_attr = facts
        .canonical_binding(&parsed.target_service, &parsed.target_operation)
        .and_then(|row| row.get("returnAttr").map(str::to_string))
        .unwrap_or_else(|| "token".to_string());

    Ok(PlaceRuntime {
        place_id: place_id.to_string(),
        service_name: parsed.target_service.clone(),
        operation: parsed.target_operation.clone(),
        content,
        input_binding,
        return_attr,
        process_mode,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use workflow_engine_core::facts::InMemoryFactStore;
    use workflow_engine_core::rulegen::render_rule_atoms;

    #[test]
    fn parses_every_atom_kind_rendered_by_rulegen() {
        let content = RuleContent {
            node_type: NodeType::GatewayNode,
            join_input_count: Some(2),
            decision_values: vec![("COND".into(), "true".into())],
            meets_conditions: vec![MeetsCondition {
                next_service: "svcB".into(),
                next_operation: "op2".into(),
                condition_type: "GATEWAY_NODE".into(),
                decision_value: "true".into(),
            }],
            terminates_on: vec![TerminatesOn { service: "svcC".into(), operation: "op3".into() }],
            buffer: Some(5),
        };
        let rendered = render_rule_atoms(&content);
        let parsed = parse_rule_atoms(&rendered).unwrap();
        assert_eq!(parsed.node_type, NodeType::GatewayNode);
        assert_eq!(parsed.join_input_count, Some(2));
        assert_eq!(parsed.decision_values, vec![("COND".to_string(), "true".to_string())]);
        assert_eq!(parsed.meets_conditions.len(), 1);
        assert_eq!(parsed.terminates_on.len(), 1);
    }

    #[test]
    fn missing_node_type_is_malformed() {
        let err = parse_rule_atoms("JoinInputCount(2).\n").unwrap_err();
        assert!(matches!(err, WorkflowError::MalformedToken(_)));
    }

    #[test]
    fn input_binding_derives_from_slot_count() {
        let mut facts = InMemoryFactStore::new();
        facts.insert_canonical_binding("svcA", "op", "token", vec!["payload".into()]);
        assert!(matches!(derive_input_binding(&facts, "svcA", "op"), InputBinding::Single(name) if name == "payload"));

        facts.insert_canonical_binding("svcA", "multi", "token", vec!["a".into(), "b".into()]);
        assert!(matches!(derive_input_binding(&facts, "svcA", "multi"), InputBinding::AnyOf(names) if names == vec!["a".to_string(), "b".to_string()]));

        assert!(matches!(derive_input_binding(&facts, "svcA", "ghost"), InputBinding::NullInput));
    }
}
