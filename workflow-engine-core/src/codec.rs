//! Token-ID Codec (§4.4). Pure and deterministic: a single integer carries
//! both the workflow instance identity and, once forked, the branch within
//! it. No state, no I/O — everything here is a free function.

/// Largest fan-out a single fork may have; a deployment rejects any
/// JoinNode with more incoming arcs than this (§4.4).
pub const MAX_FANOUT: u32 = 99;

/// `workflowBase = sequenceId − (sequenceId mod 10000)`.
pub fn workflow_base(sequence_id: i64) -> i64 {
    sequence_id - sequence_id.rem_euclid(10_000)
}

/// A fork of fan-out `k` at parent `p` emits child `i` (1-indexed) as
/// `p + k*100 + i`.
///
/// Panics if `k` is 0 or exceeds [`MAX_FANOUT`], or `branch` is out of
/// `[1, k]` — these are programmer errors in the route selector, not
/// runtime conditions to recover from.
pub fn encode_child(parent: i64, fanout: u32, branch: u32) -> i64 {
    assert!(fanout >= 1 && fanout <= MAX_FANOUT, "fanout {fanout} out of range");
    assert!(branch >= 1 && branch <= fanout, "branch {branch} out of range for fanout {fanout}");
    let base = workflow_base(parent);
    base + (fanout as i64) * 100 + branch as i64
}

/// Decoded `(joinCount, branch)` from the low 4 digits of a sequence id.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Decoded {
    pub join_count: u32,
    pub branch: u32,
}

/// `rem = id mod 10000; joinCount = rem div 100; branch = rem mod 100`.
/// An id is "encoded" iff `joinCount >= 2 && 1 <= branch <= joinCount`.
pub fn decode(sequence_id: i64) -> Option<Decoded> {
    let rem = sequence_id.rem_euclid(10_000);
    let join_count = (rem / 100) as u32;
    let branch = (rem % 100) as u32;
    if join_count >= 2 && branch >= 1 && branch <= join_count {
        Some(Decoded { join_count, branch })
    } else {
        None
    }
}

pub fn is_encoded(sequence_id: i64) -> bool {
    decode(sequence_id).is_some()
}
