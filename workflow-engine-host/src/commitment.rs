//! Commitment Protocol (§4.9). Runs on a dedicated listener thread per
//! deploy: bind `BASE_CONFIRM_PORT + versionOffset`, push each rule
//! payload, and wait for a `CONFIRMED:{version}:{commitmentCount}`
//! datagram, retrying with linear backoff up to `max_retries`.
//!
//! Grounded in the teacher's `bpmn-lite-server/src/main.rs` bootstrap
//! shape (one dedicated thread per long-running concern) — there is no
//! gRPC ack here, so the wire format is the plain ASCII line the spec
//! names instead of a protobuf response.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{mpsc, Arc};
use std::thread;

use sha2::{Digest, Sha256};
use workflow_engine_core::channel::BASE_CONFIRM_PORT;
use workflow_engine_core::config::EngineConfig;
use workflow_engine_core::deploy::DeployPlan;
use workflow_engine_core::error::{Result, WorkflowError};
use workflow_engine_core::rule_payload_xml::write_rule_payload_xml;

use crate::udp::{bind_reuse, recv_with_timeout, send_to};

/// The numeric suffix of `version` if it parses as one, else
/// `|hash(version)| mod 100 + 1` (§4.9).
pub fn version_offset(version: &str) -> u32 {
    let digits: String = version.chars().rev().take_while(|c| c.is_ascii_digit()).collect();
    let digits: String = digits.chars().rev().collect();
    if let Ok(n) = digits.parse::<u32>() {
        if !digits.is_empty() {
            return n;
        }
    }
    let hash = Sha256::digest(version.as_bytes());
    let folded = hash.iter().fold(0u64, |acc, b| acc.wrapping_add(*b as u64));
    (folded % 100) as u32 + 1
}

fn expected_ack(version: &str, commitment_count: u64) -> String {
    format!("CONFIRMED:{version}:{commitment_count}")
}

/// Execute a `DeployPlan`: push every payload over UDP to its resolved
/// target and run the commitment protocol, returning the confirmed
/// commitment count (§4.2 steps 4-6, §4.9).
pub fn commit_deploy(plan: &DeployPlan, config: &EngineConfig) -> Result<u64> {
    let offset = version_offset(&plan.build_version);
    let confirm_port = BASE_CONFIRM_PORT + offset;
    let socket = bind_reuse(confirm_port)?;

    let expected_count = plan.expected_commitment_count() as u64;
    let ack = expected_ack(&plan.build_version, expected_count);

    let (tx, rx) = mpsc::channel::<String>();
    let listener_socket = socket.try_clone().map_err(WorkflowError::Io)?;
    let timeout = config.commit_timeout;
    let stop = Arc::new(AtomicBool::new(false));
    let listener_stop = stop.clone();
    // A recv timeout is just one empty poll, not "no more acks are coming" —
    // this must stay alive across every retry round, so only `stop` (set
    // once this function is done with the socket) or a hard socket error
    // ends the thread (§4.9 "retransmit up to MAX_RETRIES times").
    let listener = thread::spawn(move || loop {
        if listener_stop.load(Ordering::SeqCst) {
            return;
        }
        match recv_with_timeout(&listener_socket, timeout) {
            Ok(Some(datagram)) => {
                if tx.send(datagram).is_err() {
                    return;
                }
            }
            Ok(None) => continue,
            Err(_) => return,
        }
    });

    let mut confirmed = false;
    for attempt in 1..=config.max_retries {
        for payload in &plan.payloads {
            let xml = write_rule_payload_xml(&payload.payload)?;
            send_to(&payload.target_addr, payload.target_port, xml.as_bytes())?;
        }

        let deadline = std::time::Instant::now() + config.commit_timeout;
        while std::time::Instant::now() < deadline {
            match rx.recv_timeout(config.commit_timeout) {
                Ok(datagram) if datagram == ack => {
                    confirmed = true;
                    break;
                }
                // mismatched or duplicate acks are ignored, not fatal (§4.9)
                Ok(_) => continue,
                Err(_) => break,
            }
        }
        if confirmed {
            break;
        }
        tracing::warn!(version = %plan.build_version, attempt, "commitment not acknowledged, retrying");
        thread::sleep(config.retry_backoff * attempt);
    }

    stop.store(true, Ordering::SeqCst);
    drop(rx);
    let _ = listener.join();

    if confirmed {
        Ok(expected_count)
    } else {
        Err(WorkflowError::CommitTimeout { version: plan.build_version.clone(), retries: config.max_retries })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn version_offset_uses_numeric_suffix_when_present() {
        assert_eq!(version_offset("v42"), 42);
        assert_eq!(version_offset("release-7"), 7);
    }

    #[test]
    fn version_offset_falls_back_to_a_stable_hash() {
        let a = version_offset("nightly");
        let b = version_offset("nightly");
        assert_eq!(a, b);
        assert!(a >= 1 && a <= 100);
    }

    #[test]
    fn expected_ack_matches_the_literal_wire_format() {
        assert_eq!(expected_ack("v3", 5), "CONFIRMED:v3:5");
    }
}
