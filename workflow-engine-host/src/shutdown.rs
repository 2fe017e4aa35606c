//! Shutdown coordination (§5): a running-marker file, a UDP SHUTDOWN
//! listener on `BASE_SHUTDOWN_PORT + versionNum`, and a drain budget for
//! in-flight orchestrator workers. Grounded on the teacher's
//! `bpmn-lite-server/src/main.rs` bootstrap-thread shape, generalized from
//! "run the gRPC server until ctrl-c" to "run until told to stop, then
//! give workers a fixed window to drain."

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use workflow_engine_core::channel::BASE_SHUTDOWN_PORT;
use workflow_engine_core::error::{Result, WorkflowError};

use crate::udp::bind_reuse;

/// Budget given to in-flight orchestrator workers to finish their current
/// event before the process exits (§5).
pub const DRAIN_BUDGET: Duration = Duration::from_secs(2);

/// A marker file whose presence signals "this service host is up";
/// removing it, or receiving `SHUTDOWN` on the UDP listener, both signal
/// shutdown.
pub struct RunningMarker {
    path: PathBuf,
}

impl RunningMarker {
    pub fn create(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        fs::write(&path, b"running").map_err(WorkflowError::Io)?;
        Ok(Self { path })
    }

    pub fn exists(path: &Path) -> bool {
        path.exists()
    }
}

impl Drop for RunningMarker {
    fn drop(&mut self) {
        let _ = fs::remove_file(&self.path);
    }
}

/// Spawn the shutdown watchers for one service-host process: a poller on
/// the running-marker file and a UDP listener for the literal `SHUTDOWN`
/// datagram. Both set `stop` once triggered; callers check it between
/// dequeues and on a poll interval, then drain for [`DRAIN_BUDGET`] before
/// exiting.
pub fn watch(marker_path: PathBuf, version_num: u32, stop: Arc<AtomicBool>) -> Result<thread::JoinHandle<()>> {
    let socket = bind_reuse(BASE_SHUTDOWN_PORT + version_num)?;
    socket
        .set_read_timeout(Some(Duration::from_millis(250)))
        .map_err(WorkflowError::Io)?;

    Ok(thread::spawn(move || {
        let mut buf = [0u8; 64];
        loop {
            if stop.load(Ordering::SeqCst) {
                return;
            }
            if !marker_path.exists() {
                stop.store(true, Ordering::SeqCst);
                return;
            }
            match socket.recv(&mut buf) {
                Ok(n) if &buf[..n] == b"SHUTDOWN" => {
                    stop.store(true, Ordering::SeqCst);
                    return;
                }
                _ => {}
            }
        }
    }))
}
