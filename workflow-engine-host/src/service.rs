//! Service-host bootstrap (§4.5 step 4, §4.6, §6): for one service name,
//! spin up one rule-payload listener and one event listener per operation
//! it's declared for, building a [`PlaceRuntime`] + `Orchestrator` the
//! first time that operation's rule payload lands, and routing every
//! subsequent token event into it.
//!
//! Grounded on the teacher's `engine.rs::start` (turn a compiled plan into
//! running workers) and `bpmn-lite-server/src/main.rs`'s one-thread-per-
//! concern bootstrap shape.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use workflow_engine_core::business::{BusinessInvoker, InMemoryBusinessInvoker};
use workflow_engine_core::channel::{resolve_channel, BASE_EVENT_PORT, BASE_RULE_PORT};
use workflow_engine_core::config::EngineConfig;
use workflow_engine_core::error::{Result, WorkflowError};
use workflow_engine_core::facts::RuleFactStore;
use workflow_engine_core::rule_payload_xml::parse_rule_payload_xml;
use workflow_engine_core::telemetry::{InMemoryTelemetryRecorder, TelemetryRecorder};
use workflow_engine_core::token_xml::parse_token_xml;

use crate::join_coordinator::JoinCoordinator;
use crate::orchestrator::{JoinScheduler, Orchestrator};
use crate::rulebase::build_place_runtime;
use crate::udp::{bind_reuse, send_to};

const POLL_TIMEOUT: Duration = Duration::from_millis(250);

/// Orchestrators for this service host's operations, keyed by operation
/// name, built lazily as rule payloads arrive.
#[derive(Default)]
struct PlaceRegistry {
    orchestrators: Mutex<HashMap<String, Orchestrator>>,
}

/// Every collaborator an operation's rule listener needs to build its
/// `PlaceRuntime`/`Orchestrator` the first time a payload lands.
struct HostCollaborators {
    facts: Arc<dyn RuleFactStore>,
    business: Arc<dyn BusinessInvoker>,
    telemetry: Arc<dyn TelemetryRecorder>,
    join_coordinator: Arc<JoinCoordinator>,
    scheduler: Arc<JoinScheduler>,
    dispatcher: Arc<crate::udp::UdpTokenDispatcher>,
    process_mode: workflow_engine_core::types::ProcessMode,
    version: String,
    capacity: usize,
}

/// Run the full service host loop for `service_name` until `stop` is set,
/// then return once every spawned listener thread has exited (§5 drain).
pub fn run_service_host(
    service_name: &str,
    facts: Arc<dyn RuleFactStore>,
    config: &EngineConfig,
    version: &str,
    stop: Arc<AtomicBool>,
) -> Result<()> {
    let ops = facts.operations_for_service(service_name);
    if ops.is_empty() {
        return Err(WorkflowError::ServiceNotFound { service: service_name.to_string(), operation: "*".to_string() });
    }

    let collaborators = Arc::new(HostCollaborators {
        facts: facts.clone(),
        business: Arc::new(InMemoryBusinessInvoker::new()),
        telemetry: Arc::new(InMemoryTelemetryRecorder::new()),
        join_coordinator: Arc::new(JoinCoordinator::new()),
        scheduler: Arc::new(JoinScheduler::new(config.scheduling_mode)),
        dispatcher: Arc::new(crate::udp::UdpTokenDispatcher::new(facts.clone())),
        process_mode: config.process_mode,
        version: version.to_string(),
        capacity: 64,
    });
    let registry = Arc::new(PlaceRegistry::default());

    let mut handles = Vec::new();
    for op in ops {
        let rule_port = resolve_channel(facts.as_ref(), service_name, &op, BASE_RULE_PORT)?.target_port;
        let event_port = resolve_channel(facts.as_ref(), service_name, &op, BASE_EVENT_PORT)?.target_port;

        handles.push(spawn_rule_listener(
            service_name.to_string(),
            op.clone(),
            rule_port,
            collaborators.clone(),
            registry.clone(),
            stop.clone(),
        )?);
        handles.push(spawn_event_listener(op, event_port, registry.clone(), stop.clone())?);
    }

    for handle in handles {
        let _ = handle.join();
    }
    Ok(())
}

fn spawn_rule_listener(
    service_name: String,
    operation: String,
    port: u32,
    collaborators: Arc<HostCollaborators>,
    registry: Arc<PlaceRegistry>,
    stop: Arc<AtomicBool>,
) -> Result<thread::JoinHandle<()>> {
    let socket = bind_reuse(port)?;
    socket.set_read_timeout(Some(POLL_TIMEOUT)).map_err(WorkflowError::Io)?;

    Ok(thread::spawn(move || {
        let mut buf = [0u8; 65536];
        while !stop.load(Ordering::SeqCst) {
            let Ok((n, sender)) = socket.recv_from(&mut buf) else { continue };
            let xml = String::from_utf8_lossy(&buf[..n]).into_owned();
            let Ok(parsed) = parse_rule_payload_xml(&xml) else {
                tracing::warn!(service_name, operation, "dropped unparseable rule payload");
                continue;
            };

            let place_id = format!("{}/{}", parsed.target_service, parsed.target_operation);
            match build_place_runtime(&place_id, &parsed, collaborators.facts.as_ref(), collaborators.process_mode) {
                Ok(place) => {
                    let mut orchestrators = registry.orchestrators.lock().unwrap();
                    orchestrators.entry(operation.clone()).or_insert_with(|| {
                        let valid_versions: std::collections::HashSet<String> =
                            [collaborators.version.clone()].into_iter().collect();
                        Orchestrator::start(
                            place,
                            collaborators.capacity,
                            valid_versions,
                            collaborators.business.clone(),
                            collaborators.telemetry.clone(),
                            collaborators.join_coordinator.clone(),
                            collaborators.scheduler.clone(),
                            collaborators.dispatcher.clone(),
                        )
                    });
                    let ack = format!("CONFIRMED:{}:{}", parsed.rule_base_version, parsed.rule_base_commitment);
                    let _ = send_to(&sender.ip().to_string(), sender.port() as u32, ack.as_bytes());
                }
                Err(e) => tracing::warn!(service_name, operation, error = %e, "failed to build place runtime from rule payload"),
            }
        }
    }))
}

fn spawn_event_listener(
    operation: String,
    port: u32,
    registry: Arc<PlaceRegistry>,
    stop: Arc<AtomicBool>,
) -> Result<thread::JoinHandle<()>> {
    let socket = bind_reuse(port)?;
    socket.set_read_timeout(Some(POLL_TIMEOUT)).map_err(WorkflowError::Io)?;

    Ok(thread::spawn(move || {
        let mut buf = [0u8; 65536];
        while !stop.load(Ordering::SeqCst) {
            let Ok(n) = socket.recv(&mut buf) else { continue };
            let xml = String::from_utf8_lossy(&buf[..n]).into_owned();
            let Ok(token) = parse_token_xml(&xml) else {
                tracing::warn!(operation, "dropped unparseable token");
                continue;
            };
            let orchestrators = registry.orchestrators.lock().unwrap();
            match orchestrators.get(&operation) {
                Some(orchestrator) => {
                    let _ = orchestrator.offer(token);
                }
                None => tracing::warn!(operation, "token arrived before this place's rule payload"),
            }
        }
    }))
}
