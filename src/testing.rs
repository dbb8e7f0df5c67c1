//! Fakes for the trial collaborators, shared by the unit tests.

use std::{
    env, fs,
    path::{Path, PathBuf},
    sync::{
        atomic::{AtomicBool, AtomicI64, Ordering},
        Arc, Mutex,
    },
    time::{SystemTime, UNIX_EPOCH},
};

use anyhow::{bail, Result};
use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::broadcast;

use crate::{
    db::{LeaderboardEntry, Player, Side, TrialRecord},
    events::{EventBus, TrialEvent},
    hardware::{HardwareGateway, HardwareOperation, HardwareStatus},
    scoring::{score, Catches, Difficulty},
    settings::SettingsStore,
    trial::{CaptureMode, Leaderboard, PlayerDirectory, TrialController},
};

/// Unique path under the temp dir. The file and any SQLite sidecars are removed on drop.
pub struct TempFile {
    path: PathBuf,
}

impl TempFile {
    pub fn new(tag: &str, extension: &str) -> Self {
        static NEXT: AtomicI64 = AtomicI64::new(0);
        let suffix = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("clock")
            .as_nanos();
        let seq = NEXT.fetch_add(1, Ordering::SeqCst);
        Self {
            path: env::temp_dir().join(format!("flag_reaction_{tag}_{suffix}_{seq}.{extension}")),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for TempFile {
    fn drop(&mut self) {
        for suffix in ["", "-wal", "-shm"] {
            let mut name = self.path.clone().into_os_string();
            name.push(suffix);
            let _ = fs::remove_file(name);
        }
    }
}

pub fn roster() -> Vec<Player> {
    vec![
        Player {
            id: 1,
            name: "Jordan".into(),
            position: Some("WR".into()),
            side: Some(Side::Offense),
        },
        Player {
            id: 2,
            name: "Casey".into(),
            position: None,
            side: Some(Side::Defense),
        },
    ]
}

pub struct StaticPlayers(pub Vec<Player>);

#[async_trait]
impl PlayerDirectory for StaticPlayers {
    async fn list_players(&self) -> Result<Vec<Player>> {
        Ok(self.0.clone())
    }

    async fn get_player(&self, player_id: i64) -> Result<Option<Player>> {
        Ok(self.0.iter().find(|p| p.id == player_id).cloned())
    }
}

#[derive(Default)]
pub struct RecordingLeaderboard {
    records: Mutex<Vec<TrialRecord>>,
    next_id: AtomicI64,
    failing: AtomicBool,
}

impl RecordingLeaderboard {
    pub fn records(&self) -> Vec<TrialRecord> {
        self.records.lock().unwrap().clone()
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }
}

#[async_trait]
impl Leaderboard for RecordingLeaderboard {
    async fn record_session(
        &self,
        player_id: i64,
        trial_id: &str,
        difficulty: Difficulty,
        catches: Catches,
    ) -> Result<TrialRecord> {
        if self.failing.load(Ordering::SeqCst) {
            bail!("leaderboard storage is offline");
        }
        let record = TrialRecord {
            id: self.next_id.fetch_add(1, Ordering::SeqCst) + 1,
            player_id,
            trial_id: Some(trial_id.to_string()),
            difficulty,
            catches: catches.get(),
            score: score(difficulty, catches),
            played_at: Utc::now(),
        };
        self.records.lock().unwrap().push(record.clone());
        Ok(record)
    }

    async fn top_scores(&self, limit: usize) -> Result<Vec<LeaderboardEntry>> {
        let mut records = self.records();
        records.sort_by(|a, b| b.score.cmp(&a.score));
        Ok(records
            .into_iter()
            .take(limit)
            .map(|r| LeaderboardEntry {
                name: format!("player-{}", r.player_id),
                difficulty: r.difficulty,
                catches: r.catches,
                multiplier: r.difficulty.multiplier(),
                score: r.score,
                played_at: r.played_at,
            })
            .collect())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HardwareScript {
    Ack,
    Fail,
    /// Never answers.
    Hang,
}

pub struct ScriptedHardware {
    script: HardwareScript,
    calls: Mutex<Vec<HardwareOperation>>,
}

impl ScriptedHardware {
    pub fn new(script: HardwareScript) -> Self {
        Self {
            script,
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> Vec<HardwareOperation> {
        self.calls.lock().unwrap().clone()
    }

    async fn answer(&self, operation: HardwareOperation) -> Result<()> {
        self.calls.lock().unwrap().push(operation);
        match self.script {
            HardwareScript::Ack => Ok(()),
            HardwareScript::Fail => bail!("relay board not responding"),
            HardwareScript::Hang => std::future::pending().await,
        }
    }
}

#[async_trait]
impl HardwareGateway for ScriptedHardware {
    async fn power_on(&self) -> Result<()> {
        self.answer(HardwareOperation::PowerOn).await
    }

    async fn power_off(&self) -> Result<()> {
        self.answer(HardwareOperation::PowerOff).await
    }

    async fn trigger_drop(&self, _difficulty: Difficulty) -> Result<()> {
        self.answer(HardwareOperation::TriggerDrop).await
    }

    async fn status(&self) -> HardwareStatus {
        HardwareStatus {
            available: self.script == HardwareScript::Ack,
            pins: Vec::new(),
        }
    }
}

/// A controller wired to fakes, plus handles to inspect them.
pub struct Harness {
    pub controller: TrialController,
    pub events: broadcast::Receiver<TrialEvent>,
    pub leaderboard: Arc<RecordingLeaderboard>,
    pub hardware: Arc<ScriptedHardware>,
    pub settings: Arc<SettingsStore>,
    _settings_file: TempFile,
}

impl Harness {
    pub fn new(mode: CaptureMode, script: HardwareScript) -> Self {
        let settings_file = TempFile::new("harness", "json");
        let settings =
            Arc::new(SettingsStore::new(settings_file.path().to_path_buf()).expect("settings"));
        settings.set_capture_mode(mode).expect("capture mode");

        let leaderboard = Arc::new(RecordingLeaderboard::default());
        let hardware = Arc::new(ScriptedHardware::new(script));
        let bus = EventBus::new(1024);
        let events = bus.subscribe();

        let controller = TrialController::new(
            Arc::new(StaticPlayers(roster())),
            leaderboard.clone(),
            hardware.clone(),
            settings.clone(),
            bus,
        );

        Self {
            controller,
            events,
            leaderboard,
            hardware,
            settings,
            _settings_file: settings_file,
        }
    }

    /// Everything emitted since the last drain.
    pub fn drain(&mut self) -> Vec<TrialEvent> {
        let mut seen = Vec::new();
        while let Ok(event) = self.events.try_recv() {
            seen.push(event);
        }
        seen
    }
}
