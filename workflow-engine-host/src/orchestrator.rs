//! Orchestrator (§4.6) — one bounded FIFO queue and one worker thread per
//! (service, operation) place. Grounded on the teacher's `BpmnLiteEngine`
//! (`engine.rs`), whose single dispatch loop pops one VM instruction at a
//! time; generalized here to "pop one token, coordinate inputs, invoke the
//! business method, route the result."
//!
//! `handle_event` is the pure, synchronously-testable core: it takes its
//! collaborators as trait objects and returns what happened, with no
//! socket or thread of its own. [`Orchestrator`] is the thin thread/queue
//! shell around it that the service-host binary actually runs.

use std::collections::{BTreeMap, HashSet};
use std::sync::mpsc::{sync_channel, Receiver, SyncSender, TrySendError};
use std::sync::Mutex;
use std::thread;

use workflow_engine_core::business::BusinessInvoker;
use workflow_engine_core::config::SchedulingMode;
use workflow_engine_core::error::{Result, WorkflowError};
use workflow_engine_core::telemetry::{GenealogyRecord, TInRecord, TOutRecord, TelemetryRecorder};
use workflow_engine_core::types::{ArgMap, NodeType, ProcessMode, RuleContent, SequenceId, Token};

use crate::join_coordinator::{CompletedJoin, JoinCoordinator};
use crate::route_selector::{select_route, RouteDecision};

/// How a place's business method expects its input assembled (§4.6 step 6,
/// §9 binding list). Resolved once at service-host startup from the
/// canonical-binding facts and handed to the orchestrator with the rule
/// content.
#[derive(Debug, Clone)]
pub enum InputBinding {
    /// Zero-arg service: execute immediately, ignoring the trigger token's
    /// attribute.
    NullInput,
    /// Execute on the first of these attribute names to arrive.
    AnyOf(Vec<String>),
    /// Exactly one attribute must be pending, under this name.
    Single(String),
}

/// Everything the orchestrator needs about the place it serves, computed
/// once at deploy/startup time (§4.5, §4.6).
#[derive(Debug, Clone)]
pub struct PlaceRuntime {
    pub place_id: String,
    pub service_name: String,
    pub operation: String,
    pub content: RuleContent,
    pub input_binding: InputBinding,
    /// The attribute name this place's own output is published under
    /// (join_planner::return_attr_for_place) — "token" when it feeds no
    /// join.
    pub return_attr: String,
    pub process_mode: ProcessMode,
}

/// Send a constructed token onward over the event bus. Implemented over a
/// real UDP socket in `udp.rs`; swapped for an in-memory recorder in
/// tests, the same seam `BusinessInvoker`/`TelemetryRecorder` use (§9).
pub trait TokenDispatcher: Send + Sync {
    fn dispatch(&self, next_service: &str, next_operation: &str, token: &Token) -> Result<()>;
}

/// Holds joins that completed but, under `SEQUENTIAL` scheduling, must
/// wait behind an earlier, still-incomplete base (§4.6 step 6 scheduling
/// note; Open Question #2 in DESIGN.md).
pub struct JoinScheduler {
    mode: SchedulingMode,
    held: Mutex<BTreeMap<i64, CompletedJoin>>,
}

impl JoinScheduler {
    pub fn new(mode: SchedulingMode) -> Self {
        Self { mode, held: Mutex::new(BTreeMap::new()) }
    }

    /// Admit a freshly completed join, returning the ones now clear to
    /// fire, smallest base first.
    pub fn admit(&self, completed: CompletedJoin, coordinator: &JoinCoordinator) -> Vec<CompletedJoin> {
        match self.mode {
            SchedulingMode::Optimized => vec![completed],
            SchedulingMode::Sequential => {
                let mut held = self.held.lock().unwrap();
                held.insert(completed.workflow_base, completed);
                let mut ready = Vec::new();
                loop {
                    let Some(&smallest_held) = held.keys().next() else { break };
                    if let Some(smallest_pending) = coordinator.smallest_pending_base() {
                        if smallest_held > smallest_pending {
                            break;
                        }
                    }
                    ready.push(held.remove(&smallest_held).unwrap());
                }
                ready
            }
        }
    }
}

/// The outcome of one `handle_event` call, for tests and logging.
#[derive(Debug, Clone, PartialEq)]
pub enum EventOutcome {
    /// Dropped silently: wrong service, or SEQUENTIAL held it back.
    Dropped,
    /// Rejected: unknown rule-base version, or a strict single-input
    /// mismatch (§4.6 step 6) — the event is skipped, not propagated as a
    /// panic.
    Rejected(WorkflowError),
    /// Accepted but still waiting on more join contributors.
    JoinPending,
    /// Business method invoked and routed.
    Routed(RouteDecision),
}

/// Run the full per-event procedure for one dequeued token (§4.6).
#[allow(clippy::too_many_arguments)]
pub fn handle_event(
    place: &PlaceRuntime,
    token: &Token,
    buffer_size_at_dequeue: usize,
    valid_versions: &HashSet<String>,
    business: &dyn BusinessInvoker,
    telemetry: &dyn TelemetryRecorder,
    join_coordinator: &JoinCoordinator,
    scheduler: &JoinScheduler,
    dispatcher: &dyn TokenDispatcher,
    now: i64,
) -> EventOutcome {
    let workflow_start_time = token.monitor.process_start_time;

    if token.service.service_name != place.service_name {
        return EventOutcome::Dropped;
    }

    let version = match &token.header.rule_base_version {
        Some(v) if valid_versions.contains(v) => v.clone(),
        other => {
            return EventOutcome::Rejected(WorkflowError::UnknownRuleBaseVersion(
                other.clone().unwrap_or_default(),
            ))
        }
    };

    telemetry.record_t_in(TInRecord {
        place_id: place.place_id.clone(),
        sequence_id: token.header.sequence_id,
        node_type: place.content.node_type.as_str().to_string(),
        workflow_start_time,
        buffer_size_at_dequeue,
    });

    let (args, continuation_sequence_id, start_time) = if place.content.node_type == NodeType::JoinNode {
        match coordinate_join(place, token, join_coordinator, now) {
            Some(completed) => {
                let fired = scheduler.admit(completed, join_coordinator);
                let this_base = workflow_engine_core::codec::workflow_base(token.header.sequence_id);
                let Some(completed) = fired.into_iter().find(|c| c.workflow_base == this_base) else {
                    // SEQUENTIAL held this completed join behind an earlier,
                    // still-incomplete base (§4.6 step 6 scheduling note).
                    return EventOutcome::JoinPending;
                };
                telemetry.record_join_sync(workflow_engine_core::telemetry::JoinSyncRecord {
                    workflow_base: completed.workflow_base,
                    contributing_sequence_ids: completed.contributor_sequence_ids.clone(),
                    continuation_sequence_id: completed.continuation_sequence_id,
                });
                (completed.args, completed.continuation_sequence_id, completed.workflow_start_time)
            }
            None => return EventOutcome::JoinPending,
        }
    } else {
        match coordinate_single(place, token) {
            Ok(args) => (args, token.header.sequence_id, workflow_start_time),
            Err(e) => return EventOutcome::Rejected(e),
        }
    };

    let arg_values: Vec<String> = match &place.input_binding {
        InputBinding::Single(name) => vec![args.get(name).cloned().unwrap_or_default()],
        InputBinding::AnyOf(_) | InputBinding::NullInput => args.values().cloned().collect(),
    };

    let invocation = business.invoke(
        continuation_sequence_id,
        &place.service_name,
        &place.operation,
        &arg_values,
        &place.return_attr,
        &version,
    );

    let Some(invocation) = invocation else {
        return EventOutcome::Rejected(WorkflowError::BusinessInvokeError {
            service: place.service_name.clone(),
            operation: place.operation.clone(),
        });
    };

    let decision = select_route(place.content.node_type, &place.content, Some(&invocation.value), continuation_sequence_id);

    let return_value = invocation.value.as_attribute_string();
    dispatch_decision(place, &decision, continuation_sequence_id, start_time, &version, &return_value, telemetry, dispatcher);

    EventOutcome::Routed(decision)
}

fn coordinate_join(
    place: &PlaceRuntime,
    token: &Token,
    join_coordinator: &JoinCoordinator,
    now: i64,
) -> Option<CompletedJoin> {
    let sequence_id = token.header.sequence_id;
    let base = workflow_engine_core::codec::workflow_base(sequence_id);
    let required = workflow_engine_core::codec::decode(sequence_id)
        .map(|d| d.join_count as usize)
        .unwrap_or_else(|| place.content.join_input_count.unwrap_or(1) as usize);

    join_coordinator.offer(
        base,
        sequence_id,
        required,
        place.process_mode,
        &token.join_attribute.attribute_name,
        &token.join_attribute.attribute_value,
        token.monitor.process_start_time,
        token.join_attribute.not_after,
        now,
    )
}

/// Non-join input coordination (§4.6 step 6: null-input / anyof /
/// single-input strict match).
fn coordinate_single(place: &PlaceRuntime, token: &Token) -> Result<ArgMap> {
    let mut args = ArgMap::new();
    match &place.input_binding {
        InputBinding::NullInput => {}
        InputBinding::AnyOf(names) => {
            if names.iter().any(|n| n == &token.join_attribute.attribute_name) {
                args.insert(token.join_attribute.attribute_name.clone(), token.join_attribute.attribute_value.clone());
            } else {
                return Err(WorkflowError::WorkflowDefErrorEdge {
                    place: place.place_id.clone(),
                    reason: format!("attribute {} matches none of {:?}", token.join_attribute.attribute_name, names),
                });
            }
        }
        InputBinding::Single(expected) => {
            if token.join_attribute.attribute_name != *expected {
                return Err(WorkflowError::WorkflowDefErrorEdge {
                    place: place.place_id.clone(),
                    reason: format!("expected attribute {expected}, got {}", token.join_attribute.attribute_name),
                });
            }
            args.insert(expected.clone(), token.join_attribute.attribute_value.clone());
        }
    }
    Ok(args)
}

#[allow(clippy::too_many_arguments)]
fn dispatch_decision(
    place: &PlaceRuntime,
    decision: &RouteDecision,
    parent_sequence_id: SequenceId,
    workflow_start_time: i64,
    version: &str,
    return_value: &str,
    telemetry: &dyn TelemetryRecorder,
    dispatcher: &dyn TokenDispatcher,
) {
    match decision {
        RouteDecision::Edge { next_service, next_operation, sequence_id } => {
            telemetry.record_t_out(TOutRecord {
                place_id: place.place_id.clone(),
                sequence_id: *sequence_id,
                next_service: next_service.clone(),
                next_operation: next_operation.clone(),
            });
            let token = build_token(*sequence_id, next_service, next_operation, version, workflow_start_time, return_value, place);
            let _ = dispatcher.dispatch(next_service, next_operation, &token);
        }
        RouteDecision::Terminate { sequence_id } => {
            telemetry.record_t_out(TOutRecord {
                place_id: place.place_id.clone(),
                sequence_id: *sequence_id,
                next_service: "TERMINATE".to_string(),
                next_operation: "TERMINATE".to_string(),
            });
        }
        RouteDecision::Fork { children } => {
            telemetry.record_t_out(TOutRecord {
                place_id: place.place_id.clone(),
                sequence_id: parent_sequence_id,
                next_service: "FORK".to_string(),
                next_operation: "FORK".to_string(),
            });
            for child in children {
                telemetry.record_genealogy(GenealogyRecord {
                    parent_sequence_id,
                    child_sequence_id: child.sequence_id,
                });
                let token = build_token(child.sequence_id, &child.next_service, &child.next_operation, version, workflow_start_time, return_value, place);
                let _ = dispatcher.dispatch(&child.next_service, &child.next_operation, &token);
            }
        }
        RouteDecision::MonitorOnly => {
            let elapsed = 0; // wall-clock elapsed time is supplied by the caller's monitor data, not recomputed here
            telemetry.record_monitor(&place.place_id, parent_sequence_id, elapsed);
        }
        RouteDecision::Dropped { .. } => {}
    }
}

#[allow(clippy::too_many_arguments)]
fn build_token(
    sequence_id: SequenceId,
    next_service: &str,
    next_operation: &str,
    version: &str,
    workflow_start_time: i64,
    return_value: &str,
    place: &PlaceRuntime,
) -> Token {
    use workflow_engine_core::types::{JoinAttribute, MonitorData, ServiceRef, TokenHeader, TransitionMeta};
    Token {
        header: TokenHeader {
            sequence_id,
            rule_base_version: Some(version.to_string()),
            monitor_incoming_events: false,
        },
        join_attribute: JoinAttribute {
            attribute_name: place.return_attr.clone(),
            attribute_value: return_value.to_string(),
            not_after: 0,
        },
        service: ServiceRef { service_name: next_service.to_string(), operation: next_operation.to_string() },
        monitor: MonitorData { process_start_time: workflow_start_time, ..Default::default() },
        transition: TransitionMeta { previous_place: Some(place.place_id.clone()), ..Default::default() },
    }
}

/// Bounded queue + single worker thread for one (service, operation)
/// (§4.6, §5). The worker loop itself has no business logic — it just
/// dequeues, records `bufferSizeAtDequeue`, and calls `handle_event`.
pub struct Orchestrator {
    sender: SyncSender<Token>,
    worker: Option<thread::JoinHandle<()>>,
}

impl Orchestrator {
    /// `capacity` is the place's configured buffer size (§4.5 step 5).
    pub fn start(
        place: PlaceRuntime,
        capacity: usize,
        valid_versions: HashSet<String>,
        business: std::sync::Arc<dyn BusinessInvoker>,
        telemetry: std::sync::Arc<dyn TelemetryRecorder>,
        join_coordinator: std::sync::Arc<JoinCoordinator>,
        scheduler: std::sync::Arc<JoinScheduler>,
        dispatcher: std::sync::Arc<dyn TokenDispatcher>,
    ) -> Self {
        let (sender, receiver): (SyncSender<Token>, Receiver<Token>) = sync_channel(capacity.max(1));
        let worker = thread::spawn(move || {
            while let Ok(token) = receiver.recv() {
                let buffer_size_at_dequeue = 0; // recv() already drained the slot; the channel has no peek
                let now = current_millis();
                handle_event(
                    &place,
                    &token,
                    buffer_size_at_dequeue,
                    &valid_versions,
                    business.as_ref(),
                    telemetry.as_ref(),
                    join_coordinator.as_ref(),
                    scheduler.as_ref(),
                    dispatcher.as_ref(),
                    now,
                );
            }
        });
        Self { sender, worker: Some(worker) }
    }

    /// Enqueue a token for this place. A full buffer is a dropped event
    /// (§4.5 buffer semantics), not a blocking backpressure point.
    pub fn offer(&self, token: Token) -> std::result::Result<(), Token> {
        match self.sender.try_send(token) {
            Ok(()) => Ok(()),
            Err(TrySendError::Full(t)) | Err(TrySendError::Disconnected(t)) => Err(t),
        }
    }
}

impl Drop for Orchestrator {
    fn drop(&mut self) {
        if let Some(worker) = self.worker.take() {
            let _ = worker.join();
        }
    }
}

fn current_millis() -> i64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    SystemTime::now().duration_since(UNIX_EPOCH).map(|d| d.as_millis() as i64).unwrap_or(0)
}
