//! Call control forwarded to the engine.

use std::sync::Mutex;

use ringd_engine::{EngineResult, NativeEngine};
use ringd_executor::ExecutorError;
use tracing::{debug, info};

use crate::managers::daemon_manager::{try_with_daemon, DaemonManager};
use crate::video::{CameraFacing, VideoError};
use crate::{RingService, ServiceError, ServiceResult};

/// Device ringer setting reported by the host
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RingerMode {
    Normal,
    Silent,
    Vibrate,
}

impl RingerMode {
    pub fn mutes_ringtone(self) -> bool {
        !matches!(self, RingerMode::Normal)
    }
}

/// Fail unless the engine is running. Runs on the worker.
fn ensure_started(daemon: &Mutex<DaemonManager>, task: &'static str) -> ServiceResult<()> {
    try_with_daemon(daemon, |daemon| daemon.ensure_started())
        .ok_or_else(|| ServiceError::Reentrant(task.to_string()))??;
    Ok(())
}

/// Queue `op` against the started engine without waiting for it.
fn forward<F>(service: &RingService, task: &'static str, op: F) -> ServiceResult<()>
where
    F: FnOnce(&dyn NativeEngine) -> EngineResult<()> + Send + 'static,
{
    if service.executor.is_shut_down() {
        return Err(ExecutorError::Rejected(task.to_string()).into());
    }

    let daemon = service.daemon.clone();
    let engine = service.engine.clone();
    service.executor.submit(task, move || {
        ensure_started(&daemon, task)?;
        op(engine.as_ref())?;
        Ok(())
    });
    Ok(())
}

/// Place an outgoing call and return its id
pub fn place_call(service: &RingService, account_id: &str, to: &str, video: bool) -> ServiceResult<String> {
    info!("Placing call to {} (video: {})", to, video);
    let daemon = service.daemon.clone();
    let engine = service.engine.clone();
    let account_id = account_id.to_string();
    let to = to.to_string();

    let call_id = service
        .executor
        .submit_and_return("place_call", move || -> ServiceResult<String> {
            ensure_started(&daemon, "place_call")?;
            Ok(engine.place_call(&account_id, &to, video)?)
        })??;
    debug!("Call placed: {}", call_id);
    Ok(call_id)
}

pub fn accept_call(service: &RingService, call_id: &str) -> ServiceResult<()> {
    let call_id = call_id.to_string();
    forward(service, "accept_call", move |engine| engine.accept(&call_id))
}

pub fn refuse_call(service: &RingService, call_id: &str) -> ServiceResult<()> {
    let call_id = call_id.to_string();
    forward(service, "refuse_call", move |engine| engine.refuse(&call_id))
}

pub fn hang_up(service: &RingService, call_id: &str) -> ServiceResult<()> {
    let call_id = call_id.to_string();
    forward(service, "hang_up", move |engine| engine.hang_up(&call_id))
}

pub fn hold(service: &RingService, call_id: &str) -> ServiceResult<()> {
    let call_id = call_id.to_string();
    forward(service, "hold", move |engine| engine.hold(&call_id))
}

pub fn unhold(service: &RingService, call_id: &str) -> ServiceResult<()> {
    let call_id = call_id.to_string();
    forward(service, "unhold", move |engine| engine.unhold(&call_id))
}

/// Switch the outgoing video of `call_id` to the front or back camera. The
/// camera's native parameters are pushed to the engine first.
pub fn switch_input(service: &RingService, call_id: &str, front: bool) -> ServiceResult<()> {
    let facing = if front { CameraFacing::Front } else { CameraFacing::Back };
    let daemon = service.daemon.clone();
    let engine = service.engine.clone();
    let camera = service.camera.clone();
    let call_id = call_id.to_string();

    service
        .executor
        .submit_and_return("switch_input", move || -> ServiceResult<()> {
            ensure_started(&daemon, "switch_input")?;
            let device = camera
                .devices()?
                .into_iter()
                .find(|device| device.info.facing == facing)
                .ok_or_else(|| VideoError::CameraNotFound(if front { "front" } else { "back" }.into()))?;

            let resource = format!("camera://{}", device.id);
            info!("Switching {} to {}", call_id, resource);
            engine.apply_settings(&call_id, camera.native_params(device.id)?)?;
            engine.switch_input(&call_id, &resource)?;
            Ok(())
        })?
}

/// Push the native parameters of every camera to the engine
pub fn set_preview_settings(service: &RingService) -> ServiceResult<()> {
    let daemon = service.daemon.clone();
    let engine = service.engine.clone();
    let camera = service.camera.clone();

    service
        .executor
        .submit_and_return("set_preview_settings", move || -> ServiceResult<()> {
            ensure_started(&daemon, "set_preview_settings")?;
            for device in camera.devices()? {
                let params = camera.native_params(device.id)?;
                debug!(
                    "Camera {} native capture {}x{} @{}fps",
                    device.id, params.width, params.height, params.rate
                );
                engine.apply_settings(&device.id.to_string(), params)?;
            }
            Ok(())
        })?
}

/// Mute the engine ringtone unless the ringer is in normal mode
pub fn ringer_mode_changed(service: &RingService, mode: RingerMode) -> ServiceResult<()> {
    debug!("Ringer mode changed: {:?}", mode);
    forward(service, "ringer_mode_changed", move |engine| {
        engine.mute_ringtone(mode.mutes_ringtone());
        Ok(())
    })
}
