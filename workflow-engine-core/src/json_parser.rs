//! Workflow JSON parser (§6, §9). A real JSON parser (`serde_json`)
//! replaces the source's hand-rolled regex scanner; the one subtlety worth
//! preserving is tolerance of both the legacy `operation: "x"` place schema
//! and the newer `operations: [...]` schema.

use crate::error::{Result, WorkflowError};
use crate::model::WorkflowGraph;
use crate::types::{EdgeAttrs, NodeType, Place, ProcessMode, Transition, TransitionRole};
use serde_json::Value;

pub struct ParsedWorkflow {
    pub process_type: ProcessMode,
    pub graph: WorkflowGraph,
}

pub fn parse_workflow_json(raw: &str) -> Result<ParsedWorkflow> {
    let doc: Value = serde_json::from_str(raw)?;

    let process_type = match doc.get("processType").and_then(Value::as_str) {
        Some("PetriNet") => ProcessMode::PetriNet,
        Some("SOA") => ProcessMode::Soa,
        other => return Err(WorkflowError::InvalidProcessType(other.map(str::to_string))),
    };

    let mut graph = WorkflowGraph::new();

    for el in doc.get("elements").and_then(Value::as_array).into_iter().flatten() {
        let kind = el.get("type").and_then(Value::as_str).unwrap_or_default();
        let id = el
            .get("id")
            .and_then(Value::as_str)
            .ok_or_else(|| WorkflowError::MalformedToken("element missing id".into()))?
            .to_string();

        match kind {
            "PLACE" => graph.add_place(parse_place(id, el)?),
            "TRANSITION" => graph.add_transition(parse_transition(id, el)?),
            "EVENT_GENERATOR" => {
                let mut place = parse_place(id, el)?;
                place.element_type = Some("EVENT_GENERATOR".to_string());
                graph.add_place(place)
            }
            other => {
                return Err(WorkflowError::MalformedToken(format!(
                    "unknown element type {other:?}"
                )))
            }
        };
    }

    for arrow in doc.get("arrows").and_then(Value::as_array).into_iter().flatten() {
        let source = arrow
            .get("source")
            .and_then(Value::as_str)
            .ok_or_else(|| WorkflowError::MalformedToken("arrow missing source".into()))?;
        let target = arrow
            .get("target")
            .and_then(Value::as_str)
            .ok_or_else(|| WorkflowError::MalformedToken("arrow missing target".into()))?;

        let from_ref = graph.resolve_ref(source);
        let to_ref = graph.resolve_ref(target);

        let (Some(from_idx), Some(to_idx)) = (
            from_ref.as_node_id().and_then(|id| graph.lookup(id)),
            to_ref.as_node_id().and_then(|id| graph.lookup(id)),
        ) else {
            // one or both endpoints are literals (START/END/EVENT_GENERATOR)
            // or unresolved ids; the validator flags the latter. Literal
            // edges carry no routing information the engine needs at
            // runtime, so they are not added to the graph.
            continue;
        };

        let attrs = EdgeAttrs {
            condition: str_field(arrow, "guardCondition").or_else(|| str_field(arrow, "condition")),
            decision_value: str_field(arrow, "decision_value"),
            endpoint: str_field(arrow, "endpoint"),
            label: str_field(arrow, "label"),
        };
        graph.add_edge(from_idx, to_idx, attrs);
    }

    Ok(ParsedWorkflow { process_type, graph })
}

fn str_field(v: &Value, key: &str) -> Option<String> {
    v.get(key).and_then(Value::as_str).map(unescape).filter(|s| !s.is_empty())
}

/// Unescape the literal backslash sequences the spec calls out (`\n \r \t
/// \" \\`) — serde_json already does this for standard JSON escapes, so
/// this only matters for documents authored with already-escaped text
/// inside a string (double-escaped content coming from legacy tooling).
fn unescape(s: &str) -> String {
    if !s.contains('\\') {
        return s.to_string();
    }
    let mut out = String::with_capacity(s.len());
    let mut chars = s.chars();
    while let Some(c) = chars.next() {
        if c == '\\' {
            match chars.next() {
                Some('n') => out.push('\n'),
                Some('r') => out.push('\r'),
                Some('t') => out.push('\t'),
                Some('"') => out.push('"'),
                Some('\\') => out.push('\\'),
                Some(other) => {
                    out.push('\\');
                    out.push(other);
                }
                None => out.push('\\'),
            }
        } else {
            out.push(c);
        }
    }
    out
}

fn parse_place(id: String, el: &Value) -> Result<Place> {
    let service_name = str_field(el, "service").unwrap_or_default();
    let (operation, secondary_operations, arg_names, return_attr) = parse_operations(el);
    Ok(Place {
        id,
        service_name,
        operation,
        secondary_operations,
        arg_names,
        return_attr,
        floating: el.get("floating").and_then(Value::as_bool).unwrap_or(false),
        element_type: str_field(el, "elementType"),
    })
}

/// Tolerates both `operation: "name"` (legacy) and `operations: [...]`
/// (new), where each new-style entry is either a bare string or an object
/// `{name, returnAttribute, arguments: [{name, type}]}`.
fn parse_operations(el: &Value) -> (String, Vec<String>, Vec<String>, Option<String>) {
    if let Some(ops) = el.get("operations").and_then(Value::as_array) {
        let mut names = Vec::new();
        let mut primary_args = Vec::new();
        let mut primary_return = None;
        for (i, op) in ops.iter().enumerate() {
            match op {
                Value::String(s) => names.push(s.clone()),
                Value::Object(_) => {
                    let name = str_field(op, "name").unwrap_or_default();
                    if i == 0 {
                        primary_args = op
                            .get("arguments")
                            .and_then(Value::as_array)
                            .into_iter()
                            .flatten()
                            .filter_map(|a| str_field(a, "name"))
                            .collect();
                        primary_return = str_field(op, "returnAttribute");
                    }
                    names.push(name);
                }
                _ => {}
            }
        }
        let primary = names.first().cloned().unwrap_or_default();
        let secondary = names.into_iter().skip(1).collect();
        (primary, secondary, primary_args, primary_return)
    } else {
        let op = str_field(el, "operation").unwrap_or_default();
        (op, Vec::new(), Vec::new(), str_field(el, "returnAttribute"))
    }
}

fn parse_transition(id: String, el: &Value) -> Result<Transition> {
    let node_type_str = str_field(el, "node_type").ok_or_else(|| {
        WorkflowError::MalformedToken(format!("transition {id} missing node_type"))
    })?;
    let node_type = NodeType::parse(&node_type_str).ok_or_else(|| {
        WorkflowError::MalformedToken(format!("transition {id} has unknown node_type {node_type_str:?}"))
    })?;
    let role = str_field(el, "transition_type").and_then(|s| match s.as_str() {
        "T_in" => Some(TransitionRole::TIn),
        "T_out" => Some(TransitionRole::TOut),
        "Other" => Some(TransitionRole::Other),
        _ => None,
    });
    let buffer = el.get("buffer").and_then(Value::as_u64).map(|b| b as u32);
    Ok(Transition {
        id,
        node_type,
        node_value: str_field(el, "node_value"),
        role,
        buffer,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_missing_process_type() {
        let err = parse_workflow_json(r#"{"elements":[],"arrows":[]}"#).unwrap_err();
        assert!(matches!(err, WorkflowError::InvalidProcessType(None)));
    }

    #[test]
    fn rejects_unknown_process_type() {
        let err = parse_workflow_json(r#"{"processType":"Weird"}"#).unwrap_err();
        assert!(matches!(err, WorkflowError::InvalidProcessType(Some(_))));
    }

    #[test]
    fn parses_legacy_operation_field() {
        let doc = r#"{
            "processType": "SOA",
            "elements": [
                {"type":"PLACE","id":"P1","service":"svcA","operation":"doThing"}
            ],
            "arrows": []
        }"#;
        let parsed = parse_workflow_json(doc).unwrap();
        let p = parsed.graph.place("P1").unwrap();
        assert_eq!(p.operation, "doThing");
        assert_eq!(p.service_name, "svcA");
    }

    #[test]
    fn parses_operations_array_with_object_entries() {
        let doc = r#"{
            "processType": "SOA",
            "elements": [
                {"type":"PLACE","id":"P1","service":"svcA","operations":[
                    {"name":"doThing","returnAttribute":"result","arguments":[{"name":"x","type":"string"}]}
                ]}
            ],
            "arrows": []
        }"#;
        let parsed = parse_workflow_json(doc).unwrap();
        let p = parsed.graph.place("P1").unwrap();
        assert_eq!(p.operation, "doThing");
        assert_eq!(p.arg_names, vec!["x".to_string()]);
        assert_eq!(p.return_attr.as_deref(), Some("result"));
    }

    #[test]
    fn builds_edges_between_known_nodes() {
        let doc = r#"{
            "processType": "SOA",
            "elements": [
                {"type":"PLACE","id":"P1","service":"svcA","operation":"a"},
                {"type":"TRANSITION","id":"T_out_P1","node_type":"EdgeNode","transition_type":"T_out"},
                {"type":"TRANSITION","id":"T_in_P2","node_type":"EdgeNode","transition_type":"T_in"},
                {"type":"PLACE","id":"P2","service":"svcB","operation":"b"}
            ],
            "arrows": [
                {"source":"P1","target":"T_out_P1"},
                {"source":"T_out_P1","target":"T_in_P2"},
                {"source":"T_in_P2","target":"P2"}
            ]
        }"#;
        let parsed = parse_workflow_json(doc).unwrap();
        assert_eq!(parsed.graph.outgoing_transitions(&"P1".to_string()).len(), 1);
        assert_eq!(parsed.graph.incoming_transitions(&"P2".to_string()).len(), 1);
    }
}
