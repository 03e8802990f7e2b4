//! Daemon lifecycle commands.

use tracing::info;

use crate::managers::daemon_manager::{try_with_daemon, DaemonManager};
use crate::{RingService, ServiceError, ServiceResult};

fn run<T, F>(service: &RingService, task: &'static str, apply: F) -> ServiceResult<T>
where
    T: Send + 'static,
    F: FnOnce(&mut DaemonManager) -> T + Send + 'static,
{
    let daemon = service.daemon.clone();
    service.executor.submit_and_return(task, move || {
        try_with_daemon(&daemon, apply).ok_or_else(|| ServiceError::Reentrant(task.to_string()))
    })?
}

/// Initialize the engine and start its event pump
pub fn start_daemon(service: &RingService) -> ServiceResult<()> {
    info!("start_daemon requested");
    run(service, "start_daemon", DaemonManager::start)?
}

/// Release video resources and shut the engine down
pub fn stop_daemon(service: &RingService) -> ServiceResult<()> {
    info!("stop_daemon requested");
    run(service, "stop_daemon", DaemonManager::stop)
}

pub fn is_daemon_started(service: &RingService) -> ServiceResult<bool> {
    run(service, "is_daemon_started", |daemon| daemon.is_started())
}
