//! `JoinCoordinator` (§4.6, §5, §9) — the process-wide, concurrently
//! mutated join-attribute map and join-window map, modelled exactly as §9
//! asks: a single type with `offer`/`sweep`, internal per-base locking so
//! only one thread can ever consume a completed join.
//!
//! Grounded on `vm.rs`'s Join-opcode handling (counter increment,
//! release-on-threshold) generalized from "increment a counter" to "track
//! named attribute contributions," since this spec's joins carry data, not
//! just a arrival count.

use std::collections::HashMap;
use std::sync::Mutex;
use workflow_engine_core::types::{ArgMap, ProcessMode, SequenceId};

#[derive(Debug, Clone)]
struct Contribution {
    sequence_id: SequenceId,
    attr_name: String,
    attr_value: String,
    workflow_start_time: i64,
}

#[derive(Debug)]
struct JoinState {
    required_count: usize,
    not_after: i64,
    contributions: Vec<Contribution>,
}

/// A join that just reached its required contributor count (§4.6 step 6,
/// JoinNode "On completion" sub-steps 1-3).
#[derive(Debug, Clone)]
pub struct CompletedJoin {
    pub workflow_base: i64,
    /// The lowest sequenceId among contributors (§4.6 step 6.1).
    pub continuation_sequence_id: SequenceId,
    /// The workflowStartTime contributed with the lowest id (§4.6 step 6.2).
    pub workflow_start_time: i64,
    /// Assembled input arguments (§4.6 step 6.3): SOA keys by attribute
    /// name, PetriNet carries only the first contributor's payload since a
    /// PetriNet join is synchronization-only.
    pub args: ArgMap,
    pub contributor_sequence_ids: Vec<SequenceId>,
}

#[derive(Default)]
pub struct JoinCoordinator {
    bases: Mutex<HashMap<i64, JoinState>>,
}

impl JoinCoordinator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Offer one branch's contribution to the join at `base`. Returns
    /// `Some(CompletedJoin)` exactly once per base — the instant the
    /// required count is reached — and deletes the base's state so the
    /// same workflowBase can never re-enter this join (§4.6 step 6.5).
    pub fn offer(
        &self,
        base: i64,
        sequence_id: SequenceId,
        required_count: usize,
        mode: ProcessMode,
        attr_name: &str,
        attr_value: &str,
        workflow_start_time: i64,
        not_after: i64,
        now: i64,
    ) -> Option<CompletedJoin> {
        let mut bases = self.bases.lock().unwrap();
        let state = bases.entry(base).or_insert_with(|| JoinState {
            required_count,
            not_after,
            contributions: Vec::new(),
        });

        if now >= state.not_after {
            bases.remove(&base);
            return None;
        }

        state.contributions.push(Contribution {
            sequence_id,
            attr_name: attr_name.to_string(),
            attr_value: attr_value.to_string(),
            workflow_start_time,
        });

        let complete = match mode {
            // PetriNet joins are pure synchronization: complete once the
            // decoded/bound branch count is reached, regardless of names.
            ProcessMode::PetriNet => state.contributions.len() >= state.required_count,
            // SOA joins complete once every distinct attribute name
            // required has at least one contributor.
            ProcessMode::Soa => {
                let distinct: std::collections::HashSet<_> =
                    state.contributions.iter().map(|c| c.attr_name.clone()).collect();
                distinct.len() >= state.required_count
            }
        };

        if !complete {
            return None;
        }

        let state = bases.remove(&base).unwrap();
        let lowest = state
            .contributions
            .iter()
            .min_by_key(|c| c.sequence_id)
            .cloned()
            .expect("at least one contribution on completion");

        let mut args = ArgMap::new();
        match mode {
            ProcessMode::Soa => {
                for c in &state.contributions {
                    args.entry(c.attr_name.clone()).or_insert_with(|| c.attr_value.clone());
                }
            }
            ProcessMode::PetriNet => {
                args.insert(lowest.attr_name.clone(), lowest.attr_value.clone());
            }
        }

        Some(CompletedJoin {
            workflow_base: base,
            continuation_sequence_id: lowest.sequence_id,
            workflow_start_time: lowest.workflow_start_time,
            args,
            contributor_sequence_ids: state.contributions.iter().map(|c| c.sequence_id).collect(),
        })
    }

    /// The smallest workflowBase still waiting on contributors, if any
    /// (§4.6 step 6 SEQUENTIAL scheduling note — a completed larger base
    /// must wait behind this one).
    pub fn smallest_pending_base(&self) -> Option<i64> {
        self.bases.lock().unwrap().keys().min().copied()
    }

    /// Sweep bases past their `notAfter` (§4.6 step 6 closing, §5
    /// "opportunistic on each event"). Returns the bases discarded.
    pub fn sweep(&self, now: i64) -> Vec<i64> {
        let mut bases = self.bases.lock().unwrap();
        let expired: Vec<i64> = bases
            .iter()
            .filter(|(_, state)| now >= state.not_after)
            .map(|(base, _)| *base)
            .collect();
        for base in &expired {
            bases.remove(base);
        }
        expired
    }

    #[cfg(test)]
    fn pending_count(&self, base: i64) -> usize {
        self.bases.lock().unwrap().get(&base).map(|s| s.contributions.len()).unwrap_or(0)
    }
}
