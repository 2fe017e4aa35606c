//! Deployer CLI (§4.2, §6): `deployer {processName} {buildVersion}`.
//!
//! Grounded on the teacher's `bpmn-lite-server/src/main.rs` bootstrap
//! shape (`tracing_subscriber::fmt().with_env_filter(...)`, manual arg
//! parsing) — no gRPC server here, just a single synchronous deploy run.

use std::process::ExitCode;

use tracing_subscriber::EnvFilter;
use workflow_engine_core::config::EngineConfig;
use workflow_engine_host::facts_loader::load_facts;

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("info".parse().unwrap()))
        .init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let [process_name, build_version] = &args[..] else {
        eprintln!("usage: deployer {{processName}} {{buildVersion}}");
        return ExitCode::from(1);
    };

    let config = EngineConfig::from_env();
    let facts_path = std::path::Path::new(&config.common_folder).join("facts.json");
    let facts = match load_facts(&facts_path) {
        Ok(f) => f,
        Err(e) => {
            tracing::error!(error = %e, path = %facts_path.display(), "failed to load rule facts");
            return ExitCode::from(1);
        }
    };

    match workflow_engine_host::deploy::deploy(process_name, build_version, &config, &facts) {
        Ok(commitment_count) => {
            tracing::info!(process_name, build_version, commitment_count, "deploy confirmed");
            ExitCode::from(0)
        }
        Err(e) => {
            tracing::error!(process_name, build_version, error = %e, "deploy failed");
            ExitCode::from(1)
        }
    }
}
