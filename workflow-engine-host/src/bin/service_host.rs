//! Service-host CLI (§4.6, §5, §6): `service_host -version vNNN`.
//!
//! Grounded on the teacher's `bpmn-lite-server/src/main.rs` bootstrap
//! shape; the marker-file/SHUTDOWN-datagram lifecycle is this spec's own
//! replacement for the teacher's "serve until ctrl-c" gRPC loop.

use std::process::ExitCode;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use tracing_subscriber::EnvFilter;
use workflow_engine_core::config::EngineConfig;
use workflow_engine_core::facts::RuleFactStore;
use workflow_engine_host::facts_loader::load_facts;
use workflow_engine_host::shutdown::{watch, RunningMarker, DRAIN_BUDGET};

fn parse_version_arg(args: &[String]) -> Option<String> {
    args.windows(2).find(|w| w[0] == "-version").map(|w| w[1].clone())
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("info".parse().unwrap()))
        .init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let Some(version) = parse_version_arg(&args) else {
        eprintln!("usage: service_host -version vNNN");
        return ExitCode::from(1);
    };

    let config = EngineConfig::from_env();
    if config.service_name.is_empty() {
        eprintln!("WF_SERVICE_NAME must name the service this host serves");
        return ExitCode::from(1);
    }

    let facts_path = std::path::Path::new(&config.common_folder).join("facts.json");
    let facts: Arc<dyn RuleFactStore> = match load_facts(&facts_path) {
        Ok(f) => Arc::new(f),
        Err(e) => {
            tracing::error!(error = %e, path = %facts_path.display(), "failed to load rule facts");
            return ExitCode::from(1);
        }
    };

    let offset = workflow_engine_host::commitment::version_offset(&version);
    let marker_path = std::path::Path::new(&config.common_folder).join(format!("running-{}-{}", config.service_name, version));
    let marker = match RunningMarker::create(&marker_path) {
        Ok(m) => m,
        Err(e) => {
            tracing::error!(error = %e, "failed to create running marker");
            return ExitCode::from(1);
        }
    };

    let stop = Arc::new(AtomicBool::new(false));
    let watcher = match watch(marker_path.clone(), offset, stop.clone()) {
        Ok(w) => w,
        Err(e) => {
            tracing::error!(error = %e, "failed to start shutdown watcher");
            return ExitCode::from(1);
        }
    };

    tracing::info!(service = config.service_name, version, "service host starting");
    // Blocks until `watcher` observes shutdown (marker removed or SHUTDOWN
    // datagram) and flips `stop`; the service's own listener threads poll
    // it on the same cadence (§5).
    let result = workflow_engine_host::service::run_service_host(&config.service_name, facts, &config, &version, stop.clone());

    std::thread::sleep(DRAIN_BUDGET);
    let _ = watcher.join();
    drop(marker);

    match result {
        Ok(()) => ExitCode::from(0),
        Err(e) => {
            tracing::error!(error = %e, "service host exited with an error");
            ExitCode::from(1)
        }
    }
}
