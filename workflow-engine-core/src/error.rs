//! The closed error taxonomy of §7, as a `thiserror` enum. Library code in
//! this crate returns `Result<T, WorkflowError>`; binaries wrap it with
//! `anyhow::Context` at the call sites that need extra narrative.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum WorkflowError {
    #[error("invalid process type in workflow JSON: {0:?} (expected PetriNet or SOA)")]
    InvalidProcessType(Option<String>),

    #[error("validation failed with {0} error(s): {1}")]
    ValidationFailed(usize, String),

    #[error("service not found: {service}/{operation}")]
    ServiceNotFound { service: String, operation: String },

    #[error("channel unresolved for channel id {0}")]
    ChannelUnresolved(String),

    #[error("commit timeout for version {version} after {retries} retries")]
    CommitTimeout { version: String, retries: u32 },

    #[error("join node {0} has fewer than 2 topological incoming arcs")]
    JoinInsufficientInputs(String),

    #[error("join {0} expired at {1}")]
    JoinExpired(String, i64),

    #[error("workflow definition error at edge node {place}: {reason}")]
    WorkflowDefErrorEdge { place: String, reason: String },

    #[error("workflow definition error at join node {place}: {reason}")]
    WorkflowDefErrorJoin { place: String, reason: String },

    #[error("business invocation returned no result for {service}/{operation}")]
    BusinessInvokeError { service: String, operation: String },

    #[error("transient I/O error: {0}")]
    TransientIo(String),

    #[error("malformed token: {0}")]
    MalformedToken(String),

    #[error("unknown rule base version {0} for this place")]
    UnknownRuleBaseVersion(String),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("xml error: {0}")]
    Xml(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Neither `serde_json::Error` nor `std::io::Error` implement `PartialEq`,
/// so this can't be derived; compared by their rendered message instead,
/// which is enough for the `assert_eq!`/`matches!` call sites that need it
/// (tests, retry-vs-terminal error comparisons) without pretending I/O
/// errors carry real structural equality.
impl PartialEq for WorkflowError {
    fn eq(&self, other: &Self) -> bool {
        use WorkflowError::*;
        match (self, other) {
            (InvalidProcessType(a), InvalidProcessType(b)) => a == b,
            (ValidationFailed(a1, a2), ValidationFailed(b1, b2)) => a1 == b1 && a2 == b2,
            (ServiceNotFound { service: s1, operation: o1 }, ServiceNotFound { service: s2, operation: o2 }) => s1 == s2 && o1 == o2,
            (ChannelUnresolved(a), ChannelUnresolved(b)) => a == b,
            (CommitTimeout { version: v1, retries: r1 }, CommitTimeout { version: v2, retries: r2 }) => v1 == v2 && r1 == r2,
            (JoinInsufficientInputs(a), JoinInsufficientInputs(b)) => a == b,
            (JoinExpired(a1, a2), JoinExpired(b1, b2)) => a1 == b1 && a2 == b2,
            (WorkflowDefErrorEdge { place: p1, reason: r1 }, WorkflowDefErrorEdge { place: p2, reason: r2 }) => p1 == p2 && r1 == r2,
            (WorkflowDefErrorJoin { place: p1, reason: r1 }, WorkflowDefErrorJoin { place: p2, reason: r2 }) => p1 == p2 && r1 == r2,
            (BusinessInvokeError { service: s1, operation: o1 }, BusinessInvokeError { service: s2, operation: o2 }) => s1 == s2 && o1 == o2,
            (TransientIo(a), TransientIo(b)) => a == b,
            (MalformedToken(a), MalformedToken(b)) => a == b,
            (UnknownRuleBaseVersion(a), UnknownRuleBaseVersion(b)) => a == b,
            (Json(a), Json(b)) => a.to_string() == b.to_string(),
            (Xml(a), Xml(b)) => a == b,
            (Io(a), Io(b)) => a.to_string() == b.to_string(),
            _ => false,
        }
    }
}

pub type Result<T> = std::result::Result<T, WorkflowError>;
