//! The six literal end-to-end scenarios, each built in-process (no real
//! UDP socket, no real fact store) and asserted against an
//! `InMemoryTelemetryRecorder`. Each test wires `PlaceRuntime`s by hand and
//! drives them through `handle_event` the way `Orchestrator::start`'s
//! worker loop would, one hop at a time.

use std::collections::HashSet;
use std::sync::Mutex;

use workflow_engine_core::business::{BusinessInvoker, InMemoryBusinessInvoker, InvocationResult};
use workflow_engine_core::config::SchedulingMode;
use workflow_engine_core::error::Result;
use workflow_engine_core::telemetry::{InMemoryTelemetryRecorder, TelemetryRecorder};
use workflow_engine_core::types::{
    JoinAttribute, MeetsCondition, MonitorData, NodeType, ProcessMode, ReturnValue, RuleContent,
    SequenceId, ServiceRef, Token, TokenHeader, TransitionMeta,
};

use workflow_engine_host::join_coordinator::JoinCoordinator;
use workflow_engine_host::orchestrator::{handle_event, EventOutcome, InputBinding, JoinScheduler, PlaceRuntime, TokenDispatcher};
use workflow_engine_host::route_selector::RouteDecision;

fn versions() -> HashSet<String> {
    ["v1".to_string()].into_iter().collect()
}

fn token(service: &str, operation: &str, seq: SequenceId, attr_name: &str, attr_value: &str, not_after: i64) -> Token {
    Token {
        header: TokenHeader { sequence_id: seq, rule_base_version: Some("v1".into()), monitor_incoming_events: false },
        join_attribute: JoinAttribute { attribute_name: attr_name.into(), attribute_value: attr_value.into(), not_after },
        service: ServiceRef { service_name: service.into(), operation: operation.into() },
        monitor: MonitorData { process_start_time: 42, ..Default::default() },
        transition: TransitionMeta::default(),
    }
}

fn edge_content(destinations: &[(&str, &str)]) -> RuleContent {
    RuleContent {
        node_type: NodeType::EdgeNode,
        join_input_count: None,
        decision_values: vec![],
        meets_conditions: destinations
            .iter()
            .map(|(svc, op)| MeetsCondition { next_service: (*svc).into(), next_operation: (*op).into(), condition_type: String::new(), decision_value: String::new() })
            .collect(),
        terminates_on: vec![],
        buffer: None,
    }
}

/// Records every invocation it's given, then echoes its first argument back
/// as the return value — the same shape as `orchestrator::tests::EchoInvoker`,
/// generalized with a call log so scenarios can assert who ran and with what.
#[derive(Default)]
struct RecordingEchoInvoker {
    calls: Mutex<Vec<(String, String, SequenceId, Vec<String>)>>,
}

impl RecordingEchoInvoker {
    fn calls_for(&self, service: &str, operation: &str) -> Vec<(SequenceId, Vec<String>)> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|(s, o, ..)| s == service && o == operation)
            .map(|(_, _, seq, args)| (*seq, args.clone()))
            .collect()
    }
}

impl BusinessInvoker for RecordingEchoInvoker {
    fn invoke(&self, sequence_id: SequenceId, class_name: &str, operation: &str, args: &[String], _return_attr: &str, _version: &str) -> Option<InvocationResult> {
        self.calls.lock().unwrap().push((class_name.to_string(), operation.to_string(), sequence_id, args.to_vec()));
        Some(InvocationResult { value: ReturnValue::Str(args.first().cloned().unwrap_or_default()), declared_type: "string" })
    }
}

#[derive(Default)]
struct CapturingDispatcher {
    sent: Mutex<Vec<Token>>,
}

impl CapturingDispatcher {
    fn sent_to(&self, service: &str) -> Vec<Token> {
        self.sent.lock().unwrap().iter().filter(|t| t.service.service_name == service).cloned().collect()
    }
}

impl TokenDispatcher for CapturingDispatcher {
    fn dispatch(&self, _next_service: &str, _next_operation: &str, token: &Token) -> Result<()> {
        self.sent.lock().unwrap().push(token.clone());
        Ok(())
    }
}

#[test]
fn scenario_1_linear_edge_flow() {
    let p1 = PlaceRuntime {
        place_id: "P1".into(),
        service_name: "SvcA".into(),
        operation: "opA".into(),
        content: edge_content(&[("SvcB", "opB")]),
        input_binding: InputBinding::Single("token".into()),
        return_attr: "token".into(),
        process_mode: ProcessMode::Soa,
    };
    let p2 = PlaceRuntime {
        place_id: "P2".into(),
        service_name: "SvcB".into(),
        operation: "opB".into(),
        content: RuleContent { node_type: NodeType::TerminateNode, join_input_count: None, decision_values: vec![], meets_conditions: vec![], terminates_on: vec![], buffer: None },
        input_binding: InputBinding::Single("token".into()),
        return_attr: "token".into(),
        process_mode: ProcessMode::Soa,
    };

    let telemetry = InMemoryTelemetryRecorder::new();
    let invoker = RecordingEchoInvoker::default();
    let dispatcher = CapturingDispatcher::default();
    let coordinator = JoinCoordinator::new();
    let scheduler = JoinScheduler::new(SchedulingMode::Optimized);
    let versions = versions();

    let incoming = token("SvcA", "opA", 1_000_000, "token", "x", 0);
    let outcome1 = handle_event(&p1, &incoming, 0, &versions, &invoker, &telemetry, &coordinator, &scheduler, &dispatcher, 0);
    assert!(matches!(outcome1, EventOutcome::Routed(RouteDecision::Edge { .. })));

    let forwarded = dispatcher.sent_to("SvcB").into_iter().next().expect("P1 dispatched to SvcB");
    assert_eq!(forwarded.join_attribute.attribute_value, "x");

    let outcome2 = handle_event(&p2, &forwarded, 0, &versions, &invoker, &telemetry, &coordinator, &scheduler, &dispatcher, 0);
    assert_eq!(outcome2, EventOutcome::Routed(RouteDecision::Terminate { sequence_id: 1_000_000 }));

    assert_eq!(invoker.calls_for("SvcA", "opA"), vec![(1_000_000, vec!["x".to_string()])]);
    assert_eq!(invoker.calls_for("SvcB", "opB"), vec![(1_000_000, vec!["x".to_string()])]);

    assert_eq!(telemetry.t_in_records().len(), 2);
    let t_out = telemetry.t_out_records();
    assert_eq!(t_out.len(), 2);
    let terminate = t_out.iter().find(|r| r.next_service == "TERMINATE").expect("terminate recorded");
    assert_eq!(terminate.sequence_id, 1_000_000);
}

#[test]
fn scenario_2_balanced_fork_and_join() {
    let p1 = PlaceRuntime {
        place_id: "P1".into(),
        service_name: "SvcP1".into(),
        operation: "opP1".into(),
        content: RuleContent {
            node_type: NodeType::ForkNode,
            join_input_count: None,
            decision_values: vec![],
            meets_conditions: vec![
                MeetsCondition { next_service: "SvcP2".into(), next_operation: "opP2".into(), condition_type: String::new(), decision_value: String::new() },
                MeetsCondition { next_service: "SvcP3".into(), next_operation: "opP3".into(), condition_type: String::new(), decision_value: String::new() },
            ],
            terminates_on: vec![],
            buffer: None,
        },
        input_binding: InputBinding::NullInput,
        return_attr: "forkOut".into(),
        process_mode: ProcessMode::PetriNet,
    };
    let p2 = PlaceRuntime {
        place_id: "P2".into(),
        service_name: "SvcP2".into(),
        operation: "opP2".into(),
        content: edge_content(&[("SvcP4", "opP4")]),
        input_binding: InputBinding::Single("forkOut".into()),
        return_attr: "joinAttr".into(),
        process_mode: ProcessMode::PetriNet,
    };
    let p3 = PlaceRuntime {
        place_id: "P3".into(),
        service_name: "SvcP3".into(),
        operation: "opP3".into(),
        content: edge_content(&[("SvcP4", "opP4")]),
        input_binding: InputBinding::Single("forkOut".into()),
        return_attr: "joinAttr".into(),
        process_mode: ProcessMode::PetriNet,
    };
    let p4 = PlaceRuntime {
        place_id: "P4".into(),
        service_name: "SvcP4".into(),
        operation: "opP4".into(),
        content: RuleContent { node_type: NodeType::JoinNode, join_input_count: Some(2), decision_values: vec![], meets_conditions: vec![MeetsCondition { next_service: "SvcP5".into(), next_operation: "opP5".into(), condition_type: String::new(), decision_value: String::new() }], terminates_on: vec![], buffer: None },
        input_binding: InputBinding::Single("joinAttr".into()),
        return_attr: "final".into(),
        process_mode: ProcessMode::PetriNet,
    };

    let telemetry = InMemoryTelemetryRecorder::new();
    let invoker = RecordingEchoInvoker::default();
    let dispatcher = CapturingDispatcher::default();
    let coordinator = JoinCoordinator::new();
    let scheduler = JoinScheduler::new(SchedulingMode::Optimized);
    let versions = versions();

    let trigger = token("SvcP1", "opP1", 2_000_000, "", "", 0);
    let outcome1 = handle_event(&p1, &trigger, 0, &versions, &invoker, &telemetry, &coordinator, &scheduler, &dispatcher, 0);
    assert!(matches!(outcome1, EventOutcome::Routed(RouteDecision::Fork { .. })));

    let genealogy = telemetry.genealogy_records();
    assert_eq!(genealogy.len(), 2);
    assert!(genealogy.iter().all(|g| g.parent_sequence_id == 2_000_000));

    let t_out_p1 = telemetry.t_out_records().into_iter().filter(|r| r.place_id == "P1").count();
    assert_eq!(t_out_p1, 1);

    let child1 = dispatcher.sent_to("SvcP2").into_iter().next().expect("child 1 dispatched");
    let child2 = dispatcher.sent_to("SvcP3").into_iter().next().expect("child 2 dispatched");
    assert_eq!(child1.header.sequence_id, 2_000_201);
    assert_eq!(child2.header.sequence_id, 2_000_202);

    let outcome2 = handle_event(&p2, &child1, 0, &versions, &invoker, &telemetry, &coordinator, &scheduler, &dispatcher, 0);
    assert!(matches!(outcome2, EventOutcome::Routed(RouteDecision::Edge { .. })));
    let outcome3 = handle_event(&p3, &child2, 0, &versions, &invoker, &telemetry, &coordinator, &scheduler, &dispatcher, 0);
    assert!(matches!(outcome3, EventOutcome::Routed(RouteDecision::Edge { .. })));

    let join_in_1 = dispatcher.sent_to("SvcP4").into_iter().find(|t| t.header.sequence_id == 2_000_201).unwrap();
    let join_in_2 = dispatcher.sent_to("SvcP4").into_iter().find(|t| t.header.sequence_id == 2_000_202).unwrap();

    let outcome4 = handle_event(&p4, &join_in_1, 0, &versions, &invoker, &telemetry, &coordinator, &scheduler, &dispatcher, 0);
    assert_eq!(outcome4, EventOutcome::JoinPending);
    let outcome5 = handle_event(&p4, &join_in_2, 0, &versions, &invoker, &telemetry, &coordinator, &scheduler, &dispatcher, 0);
    assert!(matches!(outcome5, EventOutcome::Routed(RouteDecision::Edge { .. })));

    let t_in_p4 = telemetry.t_in_records().into_iter().filter(|r| r.place_id == "P4").count();
    assert_eq!(t_in_p4, 2);

    let join_sync = telemetry.join_sync_records();
    assert_eq!(join_sync.len(), 1);
    assert_eq!(join_sync[0].continuation_sequence_id, 2_000_201);

    assert_eq!(invoker.calls_for("SvcP4", "opP4").len(), 1);
    assert_eq!(invoker.calls_for("SvcP4", "opP4")[0].0, 2_000_201);
}

#[test]
fn scenario_3_gateway_single_match_is_edge() {
    let gateway_content = RuleContent {
        node_type: NodeType::GatewayNode,
        join_input_count: None,
        decision_values: vec![],
        meets_conditions: vec![
            MeetsCondition { next_service: "SvcB".into(), next_operation: "opB".into(), condition_type: "GATEWAY_NODE".into(), decision_value: "true".into() },
            MeetsCondition { next_service: "SvcC".into(), next_operation: "opC".into(), condition_type: "GATEWAY_NODE".into(), decision_value: "true".into() },
            MeetsCondition { next_service: "Monitor".into(), next_operation: "monitor".into(), condition_type: "GATEWAY_NODE".into(), decision_value: "false".into() },
        ],
        terminates_on: vec![],
        buffer: None,
    };
    let p1 = PlaceRuntime { place_id: "P1".into(), service_name: "SvcA".into(), operation: "opA".into(), content: gateway_content, input_binding: InputBinding::NullInput, return_attr: "routing".into(), process_mode: ProcessMode::Soa };

    let mut business = InMemoryBusinessInvoker::new();
    business.register("SvcA", "opA", |_seq, _args, _ret, _ver| Some(InvocationResult { value: ReturnValue::Str("false".into()), declared_type: "string" }));

    let telemetry = InMemoryTelemetryRecorder::new();
    let dispatcher = CapturingDispatcher::default();
    let coordinator = JoinCoordinator::new();
    let scheduler = JoinScheduler::new(SchedulingMode::Optimized);
    let versions = versions();

    let incoming = token("SvcA", "opA", 3_000_000, "", "", 0);
    let outcome = handle_event(&p1, &incoming, 0, &versions, &business, &telemetry, &coordinator, &scheduler, &dispatcher, 0);

    assert_eq!(outcome, EventOutcome::Routed(RouteDecision::Edge { next_service: "Monitor".into(), next_operation: "monitor".into(), sequence_id: 3_000_000 }));
    assert!(telemetry.genealogy_records().is_empty());
    assert_eq!(dispatcher.sent_to("SvcB").len(), 0);
    assert_eq!(dispatcher.sent_to("SvcC").len(), 0);
    assert_eq!(dispatcher.sent_to("Monitor").len(), 1);
}

#[test]
fn scenario_4_gateway_multi_match_is_fork() {
    let gateway_content = RuleContent {
        node_type: NodeType::GatewayNode,
        join_input_count: None,
        decision_values: vec![],
        meets_conditions: vec![
            MeetsCondition { next_service: "SvcB".into(), next_operation: "opB".into(), condition_type: "GATEWAY_NODE".into(), decision_value: "true".into() },
            MeetsCondition { next_service: "SvcC".into(), next_operation: "opC".into(), condition_type: "GATEWAY_NODE".into(), decision_value: "true".into() },
            MeetsCondition { next_service: "Monitor".into(), next_operation: "monitor".into(), condition_type: "GATEWAY_NODE".into(), decision_value: "false".into() },
        ],
        terminates_on: vec![],
        buffer: None,
    };
    let p1 = PlaceRuntime { place_id: "P1".into(), service_name: "SvcA".into(), operation: "opA".into(), content: gateway_content, input_binding: InputBinding::NullInput, return_attr: "routing".into(), process_mode: ProcessMode::Soa };

    let mut business = InMemoryBusinessInvoker::new();
    business.register("SvcA", "opA", |_seq, _args, _ret, _ver| Some(InvocationResult { value: ReturnValue::Str("true".into()), declared_type: "string" }));

    let telemetry = InMemoryTelemetryRecorder::new();
    let dispatcher = CapturingDispatcher::default();
    let coordinator = JoinCoordinator::new();
    let scheduler = JoinScheduler::new(SchedulingMode::Optimized);
    let versions = versions();

    let incoming = token("SvcA", "opA", 3_000_000, "", "", 0);
    let outcome = handle_event(&p1, &incoming, 0, &versions, &business, &telemetry, &coordinator, &scheduler, &dispatcher, 0);

    match outcome {
        EventOutcome::Routed(RouteDecision::Fork { children }) => {
            assert_eq!(children.len(), 2);
            assert_eq!(children[0].sequence_id, 3_000_201);
            assert_eq!(children[1].sequence_id, 3_000_202);
        }
        other => panic!("expected fork, got {other:?}"),
    }
    assert_eq!(dispatcher.sent_to("Monitor").len(), 0);
    assert_eq!(dispatcher.sent_to("SvcB").len(), 1);
    assert_eq!(dispatcher.sent_to("SvcC").len(), 1);
    assert_eq!(telemetry.t_out_records().len(), 1);
    assert_eq!(telemetry.genealogy_records().len(), 2);
}

#[test]
fn scenario_5_join_expiry_drops_the_base() {
    let coordinator = JoinCoordinator::new();

    let first = coordinator.offer(4_000_000, 4_000_301, 3, ProcessMode::PetriNet, "joinAttr", "a", 0, 100, 0);
    assert!(first.is_none());
    let second = coordinator.offer(4_000_000, 4_000_302, 3, ProcessMode::PetriNet, "joinAttr", "b", 0, 100, 0);
    assert!(second.is_none());

    // A sweeping event arrives at t=150, past notAfter=100, with the third
    // branch never having contributed.
    let expired = coordinator.sweep(150);
    assert_eq!(expired, vec![4_000_000]);

    // The base is gone: the third branch's late arrival starts a fresh,
    // empty join rather than completing the expired one.
    let late = coordinator.offer(4_000_000, 4_000_303, 3, ProcessMode::PetriNet, "joinAttr", "c", 0, 100, 150);
    assert!(late.is_none());
}

#[test]
fn scenario_6_mismatched_edge_attribute_is_dropped_then_recovers() {
    let p1 = PlaceRuntime {
        place_id: "P1".into(),
        service_name: "SvcA".into(),
        operation: "opA".into(),
        content: edge_content(&[("SvcB", "opB")]),
        input_binding: InputBinding::Single("diagnosis".into()),
        return_attr: "diagnosis".into(),
        process_mode: ProcessMode::Soa,
    };

    let telemetry = InMemoryTelemetryRecorder::new();
    let invoker = RecordingEchoInvoker::default();
    let dispatcher = CapturingDispatcher::default();
    let coordinator = JoinCoordinator::new();
    let scheduler = JoinScheduler::new(SchedulingMode::Optimized);
    let versions = versions();

    let wrong = token("SvcA", "opA", 5_000_000, "radiology", "lungs", 0);
    let outcome1 = handle_event(&p1, &wrong, 0, &versions, &invoker, &telemetry, &coordinator, &scheduler, &dispatcher, 0);
    assert!(matches!(outcome1, EventOutcome::Rejected(workflow_engine_core::error::WorkflowError::WorkflowDefErrorEdge { .. })));
    assert!(invoker.calls_for("SvcA", "opA").is_empty());
    assert!(dispatcher.sent.lock().unwrap().is_empty());

    // The orchestrator stays live: a correctly-named event right after is
    // processed normally on the same place runtime and collaborators.
    let right = token("SvcA", "opA", 5_000_001, "diagnosis", "flu", 0);
    let outcome2 = handle_event(&p1, &right, 0, &versions, &invoker, &telemetry, &coordinator, &scheduler, &dispatcher, 0);
    assert!(matches!(outcome2, EventOutcome::Routed(RouteDecision::Edge { .. })));
    assert_eq!(invoker.calls_for("SvcA", "opA"), vec![(5_000_001, vec!["flu".to_string()])]);

    assert_eq!(telemetry.t_in_records().len(), 2);
    assert_eq!(telemetry.t_out_records().len(), 1);
}
