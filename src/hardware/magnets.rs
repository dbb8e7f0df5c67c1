use std::{sync::Arc, time::Duration};

use anyhow::{Context, Result};
use async_trait::async_trait;
use log::{error, info, warn};
use rand::seq::SliceRandom;
use tokio::{sync::Mutex, task::JoinHandle, time};
use tokio_util::sync::CancellationToken;

use crate::scoring::Difficulty;

use super::{HardwareGateway, HardwareStatus, MagnetDriver};

/// BCM pins of magnets M1..M10.
pub const MAGNET_PINS: [u8; 10] = [5, 6, 16, 17, 20, 21, 22, 23, 24, 25];

/// All magnets stay energised this long before the first release.
const DROP_HOLD: Duration = Duration::from_millis(500);

struct DropTask {
    cancel_token: CancellationToken,
    handle: JoinHandle<()>,
}

/// Bank of electromagnets holding the flags; releasing a magnet drops its flag.
pub struct MagnetBank {
    driver: Arc<dyn MagnetDriver>,
    pins: Vec<u8>,
    drop_task: Mutex<Option<DropTask>>,
}

impl MagnetBank {
    pub fn new(driver: Arc<dyn MagnetDriver>) -> Result<Self> {
        Self::with_pins(driver, MAGNET_PINS.to_vec())
    }

    pub fn with_pins(driver: Arc<dyn MagnetDriver>, pins: Vec<u8>) -> Result<Self> {
        if driver.available() {
            driver
                .prepare(&pins)
                .context("failed to configure magnet pins")?;
            info!("Magnet pins {:?} configured as outputs", pins);
        } else {
            warn!("GPIO not available; magnet bank is simulated");
        }

        Ok(Self {
            driver,
            pins,
            drop_task: Mutex::new(None),
        })
    }

    async fn set_all(&self, energized: bool) -> Result<()> {
        let driver = self.driver.clone();
        let pins = self.pins.clone();
        tokio::task::spawn_blocking(move || set_pins(driver.as_ref(), &pins, energized))
            .await
            .context("magnet worker join failed")?
    }
}

impl DropTask {
    fn stop(self) {
        self.cancel_token.cancel();
        self.handle.abort();
    }
}

fn set_pins(driver: &dyn MagnetDriver, pins: &[u8], energized: bool) -> Result<()> {
    for &pin in pins {
        driver
            .set(pin, energized)
            .with_context(|| format!("failed to switch GPIO{pin}"))?;
    }
    Ok(())
}

async fn release_sequence(
    driver: Arc<dyn MagnetDriver>,
    order: Vec<u8>,
    interval: Duration,
    difficulty: Difficulty,
    cancel_token: CancellationToken,
) {
    let total = order.len();
    for (idx, pin) in order.into_iter().enumerate() {
        tokio::select! {
            _ = time::sleep(interval) => {}
            _ = cancel_token.cancelled() => {
                info!("Drop sequence aborted after {idx}/{total} magnets");
                return;
            }
        }

        let driver = driver.clone();
        let token = cancel_token.clone();
        let release = move || {
            if token.is_cancelled() {
                return Ok(false);
            }
            driver.set(pin, false).map(|()| true)
        };
        match tokio::task::spawn_blocking(release).await {
            Ok(Ok(true)) => info!("Magnet {}/{} dropped (GPIO{pin})", idx + 1, total),
            Ok(Ok(false)) => return,
            Ok(Err(err)) => error!("Failed to release GPIO{pin}: {err:#}"),
            Err(err) => error!("Magnet release worker failed: {err}"),
        }
    }
    info!("All magnets dropped ({difficulty})");
}

#[async_trait]
impl HardwareGateway for MagnetBank {
    async fn power_on(&self) -> Result<()> {
        self.set_all(true).await?;
        info!("All magnets ON");
        Ok(())
    }

    async fn power_off(&self) -> Result<()> {
        // Held until the pins are written so no drop can start in between.
        let mut drop_task = self.drop_task.lock().await;
        if let Some(task) = drop_task.take() {
            task.stop();
        }
        self.set_all(false).await?;
        info!("All magnets OFF");
        Ok(())
    }

    async fn trigger_drop(&self, difficulty: Difficulty) -> Result<()> {
        let mut drop_task = self.drop_task.lock().await;
        if let Some(task) = drop_task.take() {
            task.stop();
        }
        self.set_all(true).await?;

        let mut order = self.pins.clone();
        order.shuffle(&mut rand::thread_rng());
        let interval = difficulty.drop_interval();
        info!(
            "Drop sequence started ({difficulty}): {}ms between drops, order {:?}",
            interval.as_millis(),
            order
        );

        let cancel_token = CancellationToken::new();
        let driver = self.driver.clone();
        let token = cancel_token.clone();
        let handle = tokio::spawn(async move {
            time::sleep(DROP_HOLD).await;
            release_sequence(driver, order, interval, difficulty, token).await;
        });

        *drop_task = Some(DropTask {
            cancel_token,
            handle,
        });
        Ok(())
    }

    async fn status(&self) -> HardwareStatus {
        let available = self.driver.available();
        HardwareStatus {
            available,
            pins: if available {
                self.pins.clone()
            } else {
                Vec::new()
            },
        }
    }
}
