mod clock;
mod console;
mod db;
mod events;
mod hardware;
mod player_commands;
mod scoring;
mod settings;
mod targets;
mod trial;

#[cfg(test)]
mod testing;

use std::{env, path::PathBuf, sync::Arc, time::Duration};

use anyhow::{Context, Result};
use db::Database;
use events::EventBus;
use hardware::{
    send_bounded, HardwareGateway, HardwareRequest, MagnetBank, MagnetDriver, SimulatedDriver,
    SysfsDriver,
};
use log::{error, info, warn};
use settings::SettingsStore;
use tokio_util::sync::CancellationToken;
use trial::TrialController;

const DATA_DIR_ENV: &str = "FLAG_REACTION_DATA_DIR";
const GPIO_ENV: &str = "FLAG_REACTION_GPIO";
const EVENT_CAPACITY: usize = 256;

pub(crate) struct AppState {
    pub(crate) db: Database,
    pub(crate) trial: TrialController,
    pub(crate) settings: Arc<SettingsStore>,
    pub(crate) hardware: Arc<dyn HardwareGateway>,
}

fn data_dir() -> PathBuf {
    env::var_os(DATA_DIR_ENV)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("data"))
}

fn magnet_bank() -> Result<MagnetBank> {
    let wants_gpio = env::var(GPIO_ENV)
        .map(|value| value.eq_ignore_ascii_case("sysfs"))
        .unwrap_or(false);

    if wants_gpio {
        let driver: Arc<dyn MagnetDriver> = Arc::new(SysfsDriver::default());
        match MagnetBank::new(driver) {
            Ok(bank) => return Ok(bank),
            Err(err) => warn!("GPIO setup failed, falling back to simulation: {err:#}"),
        }
    }
    MagnetBank::new(Arc::new(SimulatedDriver))
}

async fn start() -> Result<()> {
    let data_dir = data_dir();
    std::fs::create_dir_all(&data_dir)
        .with_context(|| format!("failed to create data directory {}", data_dir.display()))?;

    let database = Database::new(data_dir.join("flag_reaction.sqlite3"))?;
    let settings = Arc::new(SettingsStore::new(data_dir.join("settings.json"))?);
    let hardware: Arc<dyn HardwareGateway> = Arc::new(magnet_bank()?);

    let trial = TrialController::new(
        Arc::new(database.clone()),
        Arc::new(database.clone()),
        hardware.clone(),
        settings.clone(),
        EventBus::new(EVENT_CAPACITY),
    );

    let state = AppState {
        db: database,
        trial,
        settings,
        hardware,
    };

    let shutdown = CancellationToken::new();
    let printer = console::spawn_event_printer(state.trial.subscribe(), shutdown.clone());

    let interrupt = shutdown.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Interrupt received, shutting down");
            interrupt.cancel();
        }
    });

    let outcome = console::run_console(&state, shutdown.clone()).await;

    if let Err(err) = state.trial.cancel().await {
        error!("Failed to cancel the running trial: {err}");
    }
    let limit = Duration::from_millis(state.settings.hardware_timeout_ms());
    if let Err(err) = send_bounded(state.hardware.as_ref(), HardwareRequest::PowerOff, limit).await
    {
        warn!("Could not release magnets on shutdown: {err:#}");
    }

    shutdown.cancel();
    if let Err(err) = printer.await {
        error!("Event printer task failed: {err}");
    }
    state.db.shutdown();
    outcome
}

pub fn run() -> Result<()> {
    // Initialize logging (reads RUST_LOG env var)
    env_logger::Builder::from_default_env()
        .filter_level(log::LevelFilter::Info)
        .parse_default_env()
        .init();

    info!("Flag reaction kiosk starting up...");

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("failed to build tokio runtime")?;
    runtime.block_on(start())
}
