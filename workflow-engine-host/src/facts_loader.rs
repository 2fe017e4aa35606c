//! Loads the rule fact store from a JSON file on disk at service-host /
//! deployer startup (§6, §9). The spec treats the fact store as an
//! external collaborator with no wire format of its own specified, so this
//! module supplies the simplest concrete one: a JSON document mirroring
//! `InMemoryFactStore`'s own insert methods, read once at startup.

use std::path::Path;

use serde::Deserialize;
use workflow_engine_core::error::{Result, WorkflowError};
use workflow_engine_core::facts::InMemoryFactStore;

#[derive(Debug, Deserialize, Default)]
struct FactsDocument {
    #[serde(default)]
    active_services: Vec<EndpointRow>,
    #[serde(default)]
    has_operations: Vec<EndpointRow>,
    #[serde(default)]
    bound_channels: Vec<BoundChannelRow>,
    #[serde(default)]
    canonical_bindings: Vec<CanonicalBindingRow>,
}

#[derive(Debug, Deserialize)]
struct EndpointRow {
    service: String,
    operation: String,
    channel_id: String,
    port: u32,
}

#[derive(Debug, Deserialize)]
struct BoundChannelRow {
    channel_id: String,
    addr: String,
}

#[derive(Debug, Deserialize)]
struct CanonicalBindingRow {
    service: String,
    operation: String,
    return_attr: String,
    #[serde(default)]
    inputs: Vec<String>,
}

pub fn load_facts(path: &Path) -> Result<InMemoryFactStore> {
    let raw = std::fs::read_to_string(path).map_err(WorkflowError::Io)?;
    let doc: FactsDocument = serde_json::from_str(&raw)?;

    let mut facts = InMemoryFactStore::new();
    for row in &doc.active_services {
        facts.insert_active_service(&row.service, &row.operation, &row.channel_id, row.port);
    }
    for row in &doc.has_operations {
        facts.insert_has_operation(&row.service, &row.operation, &row.channel_id, row.port);
    }
    for row in &doc.bound_channels {
        facts.insert_bound_channel(&row.channel_id, &row.addr);
    }
    for row in &doc.canonical_bindings {
        facts.insert_canonical_binding(&row.service, &row.operation, &row.return_attr, row.inputs.clone());
    }
    Ok(facts)
}
