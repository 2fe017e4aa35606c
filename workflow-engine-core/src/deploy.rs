//! Rule Deployer (§4.2) — the I/O-free half. Parses, validates, and
//! compiles a workflow JSON document into a `DeployPlan`: one `RulePayload`
//! plus resolved UDP target per deployable place, and the canonical
//! binding atoms to append to `Service.ruleml`. Pushing the payloads over
//! UDP and running the commitment protocol (§4.9) is the host crate's job
//! (`workflow-engine-host::deploy`) — kept out of this crate so the
//! deploy-time logic stays testable without a socket, following the
//! teacher's `engine.rs::compile`/`start` split between "build a plan" and
//! "execute it".

use crate::binding::{generate_bindings, render_binding_atoms};
use crate::channel::{resolve_channel, BASE_RULE_PORT};
use crate::error::{Result, WorkflowError};
use crate::facts::RuleFactStore;
use crate::json_parser::parse_workflow_json;
use crate::rulegen::generate_rule_content;
use crate::types::{CanonicalBinding, RulePayload};
use crate::validator::validate;

#[derive(Debug, Clone)]
pub struct PlannedPayload {
    pub place_id: String,
    pub target_port: u32,
    pub target_addr: String,
    pub payload: RulePayload,
}

#[derive(Debug, Clone)]
pub struct DeployPlan {
    pub process_name: String,
    pub build_version: String,
    pub bindings: Vec<CanonicalBinding>,
    pub binding_atoms: String,
    pub payloads: Vec<PlannedPayload>,
}

impl DeployPlan {
    /// The count `deploy()` should return once every payload in the plan
    /// is confirmed — one per deployable, non-multi-op-collapsed operation
    /// (§4.2 step 6, §8 retry-monotonicity property).
    pub fn expected_commitment_count(&self) -> usize {
        self.payloads.len()
    }
}

/// Build the deploy plan for `processName`/`buildVersion` from an
/// already-loaded workflow JSON document (§4.2 steps 1-3; step 1's file
/// resolution — `{commonFolder}/ProcessDefinitionFolder/{processName}.json`
/// — is the caller's job, since it's a plain path join with no logic of
/// its own worth testing here).
pub fn plan_deploy(
    process_name: &str,
    build_version: &str,
    workflow_json: &str,
    facts: &dyn RuleFactStore,
) -> Result<DeployPlan> {
    let parsed = parse_workflow_json(workflow_json)?;

    let validation = validate(&parsed.graph, facts);
    if !validation.is_ok() {
        return Err(WorkflowError::ValidationFailed(validation.errors.len(), validation.summary()));
    }

    let bindings = generate_bindings(&parsed.graph, parsed.process_type);
    let binding_atoms = bindings.iter().map(render_binding_atoms).collect::<String>();

    let mut payloads = Vec::new();
    let mut commitment = 0u64;
    for place in parsed.graph.places().filter(|p| p.is_deployable()) {
        let mut ops = vec![place.operation.clone()];
        ops.extend(place.secondary_operations.iter().cloned());
        for op in ops {
            if op.is_empty() {
                continue;
            }
            commitment += 1;
            let resolved = resolve_channel(facts, &place.service_name, &op, BASE_RULE_PORT)?;
            let content = generate_rule_content(&parsed.graph, &place.id, parsed.process_type);
            let payload = RulePayload {
                rule_base_version: build_version.to_string(),
                rule_base_commitment: commitment,
                target_service: place.service_name.clone(),
                target_operation: op,
                target_buffer: content.buffer,
                content,
            };
            payloads.push(PlannedPayload {
                place_id: place.id.clone(),
                target_port: resolved.target_port,
                target_addr: resolved.normalized_addr,
                payload,
            });
        }
    }

    Ok(DeployPlan {
        process_name: process_name.to_string(),
        build_version: build_version.to_string(),
        bindings,
        binding_atoms,
        payloads,
    })
}
