//! The rule fact store (§6, §9): an external collaborator holding
//! declarative facts (`activeService`, `hasOperation`, `boundChannel`,
//! `canonicalBinding`, …) and answering pattern queries. §9 calls for a
//! duck-typed row-tuple result rather than mirroring the source's
//! row-pointer state machine — `FactRow` below is that result type.
//!
//! Grounded on the teacher's `ProcessStore` trait (`store.rs`): one trait
//! with a small, enumerable set of query methods, backed here by
//! `InMemoryFactStore` exactly as the teacher backs `ProcessStore` with
//! `MemoryStore`. Made synchronous because the dropped-tokio decision
//! (DESIGN.md) removes the only reason the teacher's equivalent is async.

use std::collections::HashMap;

/// One solution row: an ordered list of `(variable, value)` bindings.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FactRow(pub Vec<(String, String)>);

impl FactRow {
    pub fn get(&self, var: &str) -> Option<&str> {
        self.0.iter().find(|(k, _)| k == var).map(|(_, v)| v.as_str())
    }
}

/// The fact-store query surface this crate needs (§6 predicate list).
/// Multi-row queries (`meets_condition`, `canonical_binding`) return
/// `Vec<FactRow>`; single-answer lookups return `Option<FactRow>`.
pub trait RuleFactStore: Send + Sync {
    fn active_service(&self, service: &str, operation: &str) -> Option<FactRow>;
    fn has_operation(&self, service: &str, operation: &str) -> Option<FactRow>;
    fn bound_channel(&self, channel_id: &str) -> Option<FactRow>;
    fn canonical_binding(&self, service: &str, operation: &str) -> Option<FactRow>;
    /// Every operation known (by either `activeService` or `hasOperation`)
    /// for one service name, for a service host to enumerate the places it
    /// must listen for at startup (§6).
    fn operations_for_service(&self, service: &str) -> Vec<String>;
}

#[derive(Debug, Clone, Default)]
struct ChannelRow {
    channel_id: String,
    port: u32,
}

/// In-process test double, the `MemoryStore` analog for `RuleFactStore`.
#[derive(Debug, Default)]
pub struct InMemoryFactStore {
    active_services: HashMap<(String, String), ChannelRow>,
    has_operations: HashMap<(String, String), ChannelRow>,
    bound_channels: HashMap<String, String>,
    canonical_bindings: HashMap<(String, String), (String, Vec<String>)>,
}

impl InMemoryFactStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_active_service(&mut self, service: &str, operation: &str, channel_id: &str, port: u32) {
        self.active_services.insert(
            (service.to_string(), operation.to_string()),
            ChannelRow { channel_id: channel_id.to_string(), port },
        );
    }

    pub fn insert_has_operation(&mut self, service: &str, operation: &str, channel_id: &str, port: u32) {
        self.has_operations.insert(
            (service.to_string(), operation.to_string()),
            ChannelRow { channel_id: channel_id.to_string(), port },
        );
    }

    pub fn insert_bound_channel(&mut self, channel_id: &str, addr: &str) {
        self.bound_channels.insert(channel_id.to_string(), addr.to_string());
    }

    pub fn insert_canonical_binding(
        &mut self,
        service: &str,
        operation: &str,
        return_attr: &str,
        inputs: Vec<String>,
    ) {
        self.canonical_bindings.insert(
            (service.to_string(), operation.to_string()),
            (return_attr.to_string(), inputs),
        );
    }
}

impl RuleFactStore for InMemoryFactStore {
    fn active_service(&self, service: &str, operation: &str) -> Option<FactRow> {
        let row = self.active_services.get(&(service.to_string(), operation.to_string()))?;
        Some(FactRow(vec![
            ("channelId".into(), row.channel_id.clone()),
            ("port".into(), row.port.to_string()),
        ]))
    }

    fn has_operation(&self, service: &str, operation: &str) -> Option<FactRow> {
        let row = self.has_operations.get(&(service.to_string(), operation.to_string()))?;
        Some(FactRow(vec![
            ("channelId".into(), row.channel_id.clone()),
            ("port".into(), row.port.to_string()),
        ]))
    }

    fn bound_channel(&self, channel_id: &str) -> Option<FactRow> {
        let addr = self.bound_channels.get(channel_id)?;
        Some(FactRow(vec![("addr".into(), addr.clone())]))
    }

    fn canonical_binding(&self, service: &str, operation: &str) -> Option<FactRow> {
        let (return_attr, inputs) = self
            .canonical_bindings
            .get(&(service.to_string(), operation.to_string()))?;
        let mut row = vec![("returnAttr".to_string(), return_attr.clone())];
        for (i, input) in inputs.iter().enumerate() {
            row.push((format!("input_{}", i + 1), input.clone()));
        }
        Some(FactRow(row))
    }

    fn operations_for_service(&self, service: &str) -> Vec<String> {
        let mut ops: Vec<String> = self
            .active_services
            .keys()
            .chain(self.has_operations.keys())
            .filter(|(svc, _)| svc == service)
            .map(|(_, op)| op.clone())
            .collect();
        ops.sort();
        ops.dedup();
        ops
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn active_service_miss_falls_back_to_has_operation_at_the_caller() {
        let mut store = InMemoryFactStore::new();
        store.insert_has_operation("svc", "op", "0", 1);
        assert!(store.active_service("svc", "op").is_none());
        assert!(store.has_operation("svc", "op").is_some());
    }

    #[test]
    fn fact_row_get_reads_by_variable_name() {
        let row = FactRow(vec![("channelId".into(), "0".into())]);
        assert_eq!(row.get("channelId"), Some("0"));
        assert_eq!(row.get("missing"), None);
    }

    #[test]
    fn operations_for_service_merges_both_predicate_kinds_and_dedupes() {
        let mut store = InMemoryFactStore::new();
        store.insert_active_service("svc", "a", "0", 1);
        store.insert_has_operation("svc", "b", "0", 2);
        store.insert_active_service("other", "a", "0", 3);
        let mut ops = store.operations_for_service("svc");
        ops.sort();
        assert_eq!(ops, vec!["a".to_string(), "b".to_string()]);
    }
}
