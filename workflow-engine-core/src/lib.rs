//! Core, I/O-free logic of the workflow engine: the workflow model and
//! validator, the rule deployer's planning half, the join slot planner,
//! the token-id codec, rule generation, canonical bindings, the wire XML
//! formats, and the external-collaborator traits (fact store, business
//! invoker, telemetry recorder) with in-memory test doubles.
//!
//! Networking (UDP sockets, thread-per-orchestrator event loops, the
//! commitment protocol) lives in `workflow-engine-host`, which depends on
//! this crate.

pub mod binding;
pub mod business;
pub mod channel;
pub mod codec;
pub mod config;
pub mod deploy;
pub mod error;
pub mod facts;
pub mod join_planner;
pub mod json_parser;
pub mod model;
pub mod rule_payload_xml;
pub mod rulegen;
pub mod telemetry;
pub mod token_xml;
pub mod types;
pub mod validator;
