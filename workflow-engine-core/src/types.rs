//! Domain types shared across the model, validator, rule generator and
//! orchestrator. Ids are plain `String`s — the workflow JSON assigns them,
//! there is no surrogate-key layer to maintain.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

pub type PlaceId = String;
pub type TransitionId = String;
pub type SequenceId = i64;

/// `processType` at the top of a workflow JSON document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub enum ProcessMode {
    PetriNet,
    Soa,
}

/// The closed set of transition kinds from §3.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum NodeType {
    EdgeNode,
    JoinNode,
    ForkNode,
    XorNode,
    DecisionNode,
    GatewayNode,
    MergeNode,
    MonitorNode,
    FeedFwdNode,
    TerminateNode,
    EventGenerator,
}

impl NodeType {
    pub fn parse(s: &str) -> Option<Self> {
        Some(match s {
            "EdgeNode" => Self::EdgeNode,
            "JoinNode" => Self::JoinNode,
            "ForkNode" => Self::ForkNode,
            "XorNode" => Self::XorNode,
            "DecisionNode" => Self::DecisionNode,
            "GatewayNode" => Self::GatewayNode,
            "MergeNode" => Self::MergeNode,
            "MonitorNode" => Self::MonitorNode,
            "FeedFwdNode" => Self::FeedFwdNode,
            "TerminateNode" => Self::TerminateNode,
            "EventGenerator" => Self::EventGenerator,
            _ => return None,
        })
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::EdgeNode => "EdgeNode",
            Self::JoinNode => "JoinNode",
            Self::ForkNode => "ForkNode",
            Self::XorNode => "XorNode",
            Self::DecisionNode => "DecisionNode",
            Self::GatewayNode => "GatewayNode",
            Self::MergeNode => "MergeNode",
            Self::MonitorNode => "MonitorNode",
            Self::FeedFwdNode => "FeedFwdNode",
            Self::TerminateNode => "TerminateNode",
            Self::EventGenerator => "EventGenerator",
        }
    }

    /// Transitions whose outgoing presence overrides everything else when
    /// picking a place's controlling transition (§4.5 step 1).
    pub fn is_routing_controller(&self) -> bool {
        matches!(
            self,
            Self::ForkNode | Self::GatewayNode | Self::DecisionNode | Self::XorNode
        )
    }
}

/// `transition_type` on a TRANSITION element — only `T_in`/`Other` honor
/// `buffer` (§3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TransitionRole {
    TIn,
    TOut,
    Other,
}

#[derive(Debug, Clone)]
pub struct Place {
    pub id: PlaceId,
    pub service_name: String,
    pub operation: String,
    pub secondary_operations: Vec<String>,
    pub arg_names: Vec<String>,
    pub return_attr: Option<String>,
    pub floating: bool,
    pub element_type: Option<String>,
}

impl Place {
    pub fn is_event_generator(&self) -> bool {
        self.element_type.as_deref() == Some("EVENT_GENERATOR")
    }

    /// A place is skipped by the deployer when floating or an event
    /// generator (§4.2 step 5).
    pub fn is_deployable(&self) -> bool {
        !self.floating && !self.is_event_generator()
    }
}

#[derive(Debug, Clone)]
pub struct Transition {
    pub id: TransitionId,
    pub node_type: NodeType,
    pub node_value: Option<String>,
    pub role: Option<TransitionRole>,
    pub buffer: Option<u32>,
}

impl Transition {
    /// `buffer` is only honored on T_in/Other transitions (§3).
    pub fn effective_buffer(&self) -> Option<u32> {
        match self.role {
            Some(TransitionRole::TOut) => None,
            _ => self.buffer,
        }
    }

    /// Suffix used for feedback-loop detection (§4.3): the part of the id
    /// after its `T_in_`/`T_out_` prefix, e.g. `T_out_P2` -> `P2`.
    pub fn suffix(&self) -> &str {
        self.id
            .strip_prefix("T_in_")
            .or_else(|| self.id.strip_prefix("T_out_"))
            .unwrap_or(&self.id)
    }
}

/// An edge's guard/decision metadata (§3).
#[derive(Debug, Clone, Default)]
pub struct EdgeAttrs {
    pub condition: Option<String>,
    pub decision_value: Option<String>,
    pub endpoint: Option<String>,
    pub label: Option<String>,
}

/// Either endpoint of an edge may be a real node id or one of the
/// well-known literals (§4.1 rule 2).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum NodeRef {
    Node(String),
    Start,
    End,
    EventGenerator,
}

impl NodeRef {
    pub fn parse(s: &str) -> Self {
        match s {
            "START" => Self::Start,
            "END" => Self::End,
            "EVENT_GENERATOR" => Self::EventGenerator,
            other => Self::Node(other.to_string()),
        }
    }

    pub fn as_node_id(&self) -> Option<&str> {
        match self {
            Self::Node(id) => Some(id),
            _ => None,
        }
    }
}

/// A typed return value from a business invocation (§4.7 DecisionNode
/// evaluation, §6 canonical binding).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ReturnValue {
    Bool(bool),
    Int(i64),
    Double(f64),
    Str(String),
    Json(serde_json::Value),
}

impl ReturnValue {
    /// Extract `routing_decision.routing_path` from a JSON return value, the
    /// one JSON shape the route selector understands (§4.7).
    pub fn routing_path(&self) -> Option<String> {
        match self {
            Self::Json(v) => v
                .get("routing_decision")
                .and_then(|rd| rd.get("routing_path"))
                .and_then(|p| p.as_str())
                .map(str::to_string),
            Self::Str(s) => Some(s.clone()),
            Self::Bool(b) => Some(b.to_string()),
            Self::Int(i) => Some(i.to_string()),
            Self::Double(d) => Some(d.to_string()),
        }
    }

    /// Render this value as the string a downstream token's join attribute
    /// carries (§4.6 step 7: the place's own output, published under its
    /// `returnAttr`).
    pub fn as_attribute_string(&self) -> String {
        match self {
            Self::Str(s) => s.clone(),
            Self::Bool(b) => b.to_string(),
            Self::Int(i) => i.to_string(),
            Self::Double(d) => d.to_string(),
            Self::Json(v) => v.to_string(),
        }
    }
}

/// One slot in a canonical binding (§3).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CanonicalBinding {
    pub service_name: String,
    pub operation: String,
    pub return_attr: String,
    pub input_slots: Vec<String>,
}

/// `meetsCondition(nextService, nextOperation, conditionType, decisionValue)` —
/// always carried as one row per Open Question #3 (DESIGN.md), never as
/// parallel indexed collections.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct MeetsCondition {
    pub next_service: String,
    pub next_operation: String,
    pub condition_type: String,
    pub decision_value: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TerminatesOn {
    pub service: String,
    pub operation: String,
}

/// The rule content generated for one place (§4.5), prior to XML
/// serialization.
#[derive(Debug, Clone)]
pub struct RuleContent {
    pub node_type: NodeType,
    pub join_input_count: Option<u32>,
    pub decision_values: Vec<(String, String)>,
    pub meets_conditions: Vec<MeetsCondition>,
    pub terminates_on: Vec<TerminatesOn>,
    pub buffer: Option<u32>,
}

/// Header section of the token envelope (§3).
#[derive(Debug, Clone, PartialEq)]
pub struct TokenHeader {
    pub sequence_id: SequenceId,
    pub rule_base_version: Option<String>,
    pub monitor_incoming_events: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct JoinAttribute {
    pub attribute_name: String,
    pub attribute_value: String,
    pub not_after: i64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ServiceRef {
    pub service_name: String,
    pub operation: String,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct MonitorData {
    pub process_start_time: i64,
    pub event_arrival_time: i64,
    pub process_elapsed_time: i64,
    pub calling_service: Option<String>,
    pub lost_events: u32,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct TransitionMeta {
    pub previous_place: Option<String>,
    pub fork_transition: Option<String>,
    pub parent_token_id: Option<SequenceId>,
}

/// The full XML token envelope flowing over the event bus (§3, §6).
#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub header: TokenHeader,
    pub join_attribute: JoinAttribute,
    pub service: ServiceRef,
    pub monitor: MonitorData,
    pub transition: TransitionMeta,
}

/// The rule payload XML pushed by the deployer (§3, §6).
#[derive(Debug, Clone)]
pub struct RulePayload {
    pub rule_base_version: String,
    pub rule_base_commitment: u64,
    pub target_service: String,
    pub target_operation: String,
    pub target_buffer: Option<u32>,
    pub content: RuleContent,
}

/// A flat map of attribute-name -> value, as assembled for a business
/// invocation (§4.6 step 6).
pub type ArgMap = BTreeMap<String, String>;
