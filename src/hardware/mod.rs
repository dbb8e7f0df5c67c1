pub mod commands;
pub mod driver;
pub mod magnets;

use std::{fmt, time::Duration};

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use serde::Serialize;
use tokio::time;

use crate::scoring::Difficulty;

pub use driver::{MagnetDriver, SimulatedDriver, SysfsDriver};
pub use magnets::MagnetBank;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HardwareStatus {
    pub available: bool,
    pub pins: Vec<u8>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum HardwareOperation {
    PowerOn,
    PowerOff,
    TriggerDrop,
}

impl fmt::Display for HardwareOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            HardwareOperation::PowerOn => "power on",
            HardwareOperation::PowerOff => "power off",
            HardwareOperation::TriggerDrop => "trigger drop",
        })
    }
}

/// Control surface of the physical drop rig.
///
/// Every call is best-effort from the trial's point of view: callers bound each one with a
/// timeout and treat failures as warnings.
#[async_trait]
pub trait HardwareGateway: Send + Sync {
    async fn power_on(&self) -> Result<()>;
    async fn power_off(&self) -> Result<()>;
    /// Starts a drop sequence paced for `difficulty`; returns once the sequence is running.
    async fn trigger_drop(&self, difficulty: Difficulty) -> Result<()>;
    async fn status(&self) -> HardwareStatus;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HardwareRequest {
    PowerOn,
    PowerOff,
    TriggerDrop(Difficulty),
}

impl HardwareRequest {
    pub fn operation(self) -> HardwareOperation {
        match self {
            HardwareRequest::PowerOn => HardwareOperation::PowerOn,
            HardwareRequest::PowerOff => HardwareOperation::PowerOff,
            HardwareRequest::TriggerDrop(_) => HardwareOperation::TriggerDrop,
        }
    }
}

/// Sends `request` and gives up after `limit`. A hung rig surfaces as an error.
pub async fn send_bounded(
    gateway: &dyn HardwareGateway,
    request: HardwareRequest,
    limit: Duration,
) -> Result<()> {
    let call = async {
        match request {
            HardwareRequest::PowerOn => gateway.power_on().await,
            HardwareRequest::PowerOff => gateway.power_off().await,
            HardwareRequest::TriggerDrop(difficulty) => gateway.trigger_drop(difficulty).await,
        }
    };

    time::timeout(limit, call)
        .await
        .map_err(|_| anyhow!("hardware did not respond within {}ms", limit.as_millis()))?
}
