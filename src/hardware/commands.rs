use std::time::Duration;

use crate::{
    hardware::{send_bounded, HardwareRequest, HardwareStatus},
    AppState,
};

async fn bounded(state: &AppState, request: HardwareRequest) -> Result<(), String> {
    let limit = Duration::from_millis(state.settings.hardware_timeout_ms());
    send_bounded(state.hardware.as_ref(), request, limit)
        .await
        .map_err(|e| format!("{e:#}"))
}

pub async fn magnets_on(state: &AppState) -> Result<(), String> {
    bounded(state, HardwareRequest::PowerOn).await
}

pub async fn magnets_off(state: &AppState) -> Result<(), String> {
    bounded(state, HardwareRequest::PowerOff).await
}

pub async fn hardware_status(state: &AppState) -> Result<HardwareStatus, String> {
    Ok(state.hardware.status().await)
}
