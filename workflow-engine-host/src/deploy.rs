//! The networked half of the Rule Deployer (§4.2): load the workflow
//! document, call `plan_deploy` (I/O-free), append the canonical-binding
//! atoms to `Service.ruleml` under the Open Question #1 mutex, then hand
//! the plan to the commitment protocol.
//!
//! Grounded on the teacher's `engine.rs::compile`/`start` split, which
//! this crate's `workflow-engine-core::deploy`/`workflow-engine-host::deploy`
//! pair mirrors directly (see DESIGN.md).

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use workflow_engine_core::config::EngineConfig;
use workflow_engine_core::deploy::plan_deploy;
use workflow_engine_core::error::{Result, WorkflowError};
use workflow_engine_core::facts::RuleFactStore;

use crate::commitment::commit_deploy;

/// Serializes the append-once mutation of `Service.ruleml` across
/// concurrent deploys of different processes in the same host process
/// (Open Question #1, DESIGN.md) — the template file itself has no
/// transactional append primitive, so callers share this lock instead.
static BINDING_FILE_LOCK: Mutex<()> = Mutex::new(());

fn process_definition_path(common_folder: &Path, process_name: &str) -> PathBuf {
    common_folder.join("ProcessDefinitionFolder").join(format!("{process_name}.json"))
}

fn service_ruleml_path(common_folder: &Path) -> PathBuf {
    common_folder.join("Service.ruleml")
}

/// Deploy `process_name` at `build_version`: load its workflow JSON from
/// `{commonFolder}/ProcessDefinitionFolder/{processName}.json` (§4.2 step
/// 1), plan it, append canonical-binding atoms, push every rule payload,
/// and wait for the commitment count to confirm.
pub fn deploy(
    process_name: &str,
    build_version: &str,
    config: &EngineConfig,
    facts: &dyn RuleFactStore,
) -> Result<u64> {
    let common_folder = Path::new(&config.common_folder);
    let doc_path = process_definition_path(common_folder, process_name);
    let workflow_json = fs::read_to_string(&doc_path).map_err(WorkflowError::Io)?;

    let plan = plan_deploy(process_name, build_version, &workflow_json, facts)?;

    {
        let _guard = BINDING_FILE_LOCK.lock().unwrap();
        let ruleml_path = service_ruleml_path(common_folder);
        let mut existing = fs::read_to_string(&ruleml_path).unwrap_or_default();
        existing.push_str(&plan.binding_atoms);
        fs::write(&ruleml_path, existing).map_err(WorkflowError::Io)?;
    }

    tracing::info!(process_name, build_version, payloads = plan.payloads.len(), "deploying rule payloads");

    commit_deploy(&plan, config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn process_definition_path_joins_the_conventional_layout() {
        let path = process_definition_path(Path::new("/etc/wf"), "claims");
        assert_eq!(path, PathBuf::from("/etc/wf/ProcessDefinitionFolder/claims.json"));
    }
}
