//! Petri-Net Instrumentation (§4.1, §4.6, §4.7, §9). The source's
//! event-logger singleton is injected here as a capability trait so tests
//! can substitute an in-memory recorder (§9) — grounded on `events.rs`'s
//! `RuntimeEvent` enum, which plays the same role for the teacher's VM.

use crate::types::SequenceId;
use std::sync::Mutex;

#[derive(Debug, Clone, PartialEq)]
pub struct TInRecord {
    pub place_id: String,
    pub sequence_id: SequenceId,
    pub node_type: String,
    pub workflow_start_time: i64,
    pub buffer_size_at_dequeue: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TOutRecord {
    pub place_id: String,
    pub sequence_id: SequenceId,
    pub next_service: String,
    pub next_operation: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct GenealogyRecord {
    pub parent_sequence_id: SequenceId,
    pub child_sequence_id: SequenceId,
}

#[derive(Debug, Clone, PartialEq)]
pub struct JoinSyncRecord {
    pub workflow_base: i64,
    pub contributing_sequence_ids: Vec<SequenceId>,
    pub continuation_sequence_id: SequenceId,
}

/// Injected into orchestrators as a capability (§9); the on-disk telemetry
/// database is reached only through an implementation of this trait, never
/// directly from this crate.
pub trait TelemetryRecorder: Send + Sync {
    fn record_t_in(&self, record: TInRecord);
    fn record_t_out(&self, record: TOutRecord);
    fn record_genealogy(&self, record: GenealogyRecord);
    fn record_join_sync(&self, record: JoinSyncRecord);
    fn record_monitor(&self, place_id: &str, sequence_id: SequenceId, elapsed_ms: i64);
}

#[derive(Debug, Default)]
struct Inner {
    t_in: Vec<TInRecord>,
    t_out: Vec<TOutRecord>,
    genealogy: Vec<GenealogyRecord>,
    join_sync: Vec<JoinSyncRecord>,
    monitor: Vec<(String, SequenceId, i64)>,
}

/// In-memory test double. Every orchestrator test scenario in §8 asserts
/// against an instance of this type instead of a real telemetry database.
#[derive(Default)]
pub struct InMemoryTelemetryRecorder {
    inner: Mutex<Inner>,
}

impl InMemoryTelemetryRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn t_in_records(&self) -> Vec<TInRecord> {
        self.inner.lock().unwrap().t_in.clone()
    }

    pub fn t_out_records(&self) -> Vec<TOutRecord> {
        self.inner.lock().unwrap().t_out.clone()
    }

    pub fn genealogy_records(&self) -> Vec<GenealogyRecord> {
        self.inner.lock().unwrap().genealogy.clone()
    }

    pub fn join_sync_records(&self) -> Vec<JoinSyncRecord> {
        self.inner.lock().unwrap().join_sync.clone()
    }
}

impl TelemetryRecorder for InMemoryTelemetryRecorder {
    fn record_t_in(&self, record: TInRecord) {
        self.inner.lock().unwrap().t_in.push(record);
    }

    fn record_t_out(&self, record: TOutRecord) {
        self.inner.lock().unwrap().t_out.push(record);
    }

    fn record_genealogy(&self, record: GenealogyRecord) {
        self.inner.lock().unwrap().genealogy.push(record);
    }

    fn record_join_sync(&self, record: JoinSyncRecord) {
        self.inner.lock().unwrap().join_sync.push(record);
    }

    fn record_monitor(&self, place_id: &str, sequence_id: SequenceId, elapsed_ms: i64) {
        self.inner.lock().unwrap().monitor.push((place_id.to_string(), sequence_id, elapsed_ms));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn records_accumulate_across_calls() {
        let recorder = InMemoryTelemetryRecorder::new();
        recorder.record_t_in(TInRecord {
            place_id: "P1".into(),
            sequence_id: 1,
            node_type: "EdgeNode".into(),
            workflow_start_time: 0,
            buffer_size_at_dequeue: 0,
        });
        recorder.record_t_in(TInRecord {
            place_id: "P2".into(),
            sequence_id: 1,
            node_type: "EdgeNode".into(),
            workflow_start_time: 0,
            buffer_size_at_dequeue: 0,
        });
        assert_eq!(recorder.t_in_records().len(), 2);
    }
}
