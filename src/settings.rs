use anyhow::{Context, Result};
use log::warn;
use serde::{Deserialize, Serialize};
use std::{
    fs,
    path::PathBuf,
    sync::{RwLock, RwLockReadGuard, RwLockWriteGuard},
};

use crate::{targets::PlayArea, trial::CaptureMode};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct KioskSettings {
    pub capture_mode: CaptureMode,
    pub play_area: PlayArea,
    pub hardware_timeout_ms: u64,
    pub leaderboard_size: usize,
}

impl Default for KioskSettings {
    fn default() -> Self {
        Self {
            capture_mode: CaptureMode::Hardware,
            play_area: PlayArea::default(),
            hardware_timeout_ms: 10_000,
            leaderboard_size: 10,
        }
    }
}

pub struct SettingsStore {
    path: PathBuf,
    data: RwLock<KioskSettings>,
}

impl SettingsStore {
    pub fn new(path: PathBuf) -> Result<Self> {
        let data = if path.exists() {
            let contents = fs::read_to_string(&path)
                .with_context(|| format!("Failed to read settings from {}", path.display()))?;
            serde_json::from_str(&contents).unwrap_or_else(|err| {
                warn!("Ignoring malformed settings at {}: {err}", path.display());
                KioskSettings::default()
            })
        } else {
            KioskSettings::default()
        };

        Ok(Self {
            path,
            data: RwLock::new(data),
        })
    }

    fn read(&self) -> RwLockReadGuard<'_, KioskSettings> {
        self.data.read().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, KioskSettings> {
        self.data.write().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn snapshot(&self) -> KioskSettings {
        self.read().clone()
    }

    pub fn capture_mode(&self) -> CaptureMode {
        self.read().capture_mode
    }

    pub fn play_area(&self) -> PlayArea {
        self.read().play_area
    }

    pub fn hardware_timeout_ms(&self) -> u64 {
        self.read().hardware_timeout_ms
    }

    pub fn leaderboard_size(&self) -> usize {
        self.read().leaderboard_size
    }

    pub fn set_capture_mode(&self, mode: CaptureMode) -> Result<()> {
        let mut guard = self.write();
        guard.capture_mode = mode;
        self.persist(&guard)
    }

    fn persist(&self, data: &KioskSettings) -> Result<()> {
        let serialized = serde_json::to_string_pretty(data)?;
        fs::write(&self.path, serialized)
            .with_context(|| format!("Failed to write settings to {}", self.path.display()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::TempFile;

    #[test]
    fn defaults_when_file_missing() {
        let file = TempFile::new("missing", "json");
        let store = SettingsStore::new(file.path().to_path_buf()).unwrap();
        assert_eq!(store.snapshot(), KioskSettings::default());
        assert_eq!(store.capture_mode(), CaptureMode::Hardware);
    }

    #[test]
    fn capture_mode_persists_across_reload() {
        let file = TempFile::new("mode", "json");
        let path = file.path().to_path_buf();
        let store = SettingsStore::new(path.clone()).unwrap();
        store.set_capture_mode(CaptureMode::Software).unwrap();

        let reloaded = SettingsStore::new(path.clone()).unwrap();
        assert_eq!(reloaded.capture_mode(), CaptureMode::Software);
        assert_eq!(reloaded.leaderboard_size(), 10);
    }

    #[test]
    fn partial_and_malformed_files_fall_back() {
        let file = TempFile::new("partial", "json");
        let path = file.path().to_path_buf();
        fs::write(&path, r#"{"hardwareTimeoutMs": 2500}"#).unwrap();
        let store = SettingsStore::new(path.clone()).unwrap();
        assert_eq!(store.hardware_timeout_ms(), 2500);
        assert_eq!(store.play_area(), PlayArea::default());

        fs::write(&path, "not json").unwrap();
        let store = SettingsStore::new(path.clone()).unwrap();
        assert_eq!(store.snapshot(), KioskSettings::default());
    }
}
