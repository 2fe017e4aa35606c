//! Process configuration (§4.11, ambient). Resolution order: CLI args
//! (parsed by the binary, passed in as overrides), then environment
//! variables, then the numeric defaults fixed by §4–§5. Grounded on the
//! teacher's `bpmn-lite-server/src/main.rs` manual-parsing style
//! (`parse_database_url`) rather than a config-file/clap crate — the
//! teacher never reaches for one either.

use std::env;
use std::time::Duration;

use crate::types::ProcessMode;

/// Join completion scheduling policy (§4.6, Open Question #2 in
/// DESIGN.md): OPTIMIZED fires the first complete join found scanning
/// ascending workflowBase order; SEQUENTIAL only ever fires the smallest
/// base, and can stall behind one that never completes. That stall is a
/// deliberate, documented tradeoff an operator opts into, not a defect.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulingMode {
    Optimized,
    Sequential,
}

impl SchedulingMode {
    fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_uppercase().as_str() {
            "OPTIMIZED" => Some(Self::Optimized),
            "SEQUENTIAL" => Some(Self::Sequential),
            _ => None,
        }
    }
}

fn parse_process_mode(s: &str) -> Option<ProcessMode> {
    match s.to_ascii_uppercase().as_str() {
        "PETRINET" => Some(ProcessMode::PetriNet),
        "SOA" => Some(ProcessMode::Soa),
        _ => None,
    }
}

#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub common_folder: String,
    pub scheduling_mode: SchedulingMode,
    pub max_retries: u32,
    pub commit_timeout: Duration,
    pub retry_backoff: Duration,
    /// The service a `service_host` process serves (§6); empty until set
    /// via `WF_SERVICE_NAME` or the binary's own CLI arg.
    pub service_name: String,
    /// Process mode of whatever is deployed to this host (§3) — static per
    /// deployed process, so resolved once at service-host startup rather
    /// than carried on every rule payload.
    pub process_mode: ProcessMode,
}

impl EngineConfig {
    /// Resolve from environment, falling back to the spec's defaults
    /// (§4.2 MAX_RETRIES=3, §4.9 COMMITMENT_TIMEOUT_MS=5s, §5 backoff
    /// 100ms*attempt).
    pub fn from_env() -> Self {
        Self {
            common_folder: env::var("WF_COMMON_FOLDER").unwrap_or_else(|_| ".".to_string()),
            scheduling_mode: env::var("WF_SCHEDULING_MODE")
                .ok()
                .and_then(|s| SchedulingMode::parse(&s))
                .unwrap_or(SchedulingMode::Optimized),
            max_retries: env::var("WF_MAX_RETRIES")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(3),
            commit_timeout: Duration::from_millis(
                env::var("WF_COMMIT_TIMEOUT_MS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(5_000),
            ),
            retry_backoff: Duration::from_millis(
                env::var("WF_RETRY_BACKOFF_MS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(100),
            ),
            service_name: env::var("WF_SERVICE_NAME").unwrap_or_default(),
            process_mode: env::var("WF_PROCESS_MODE")
                .ok()
                .and_then(|s| parse_process_mode(&s))
                .unwrap_or(ProcessMode::Soa),
        }
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            common_folder: ".".to_string(),
            scheduling_mode: SchedulingMode::Optimized,
            max_retries: 3,
            commit_timeout: Duration::from_millis(5_000),
            retry_backoff: Duration::from_millis(100),
            service_name: String::new(),
            process_mode: ProcessMode::Soa,
        }
    }
}
