use std::{fmt, str::FromStr};

use anyhow::anyhow;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use crate::{clock::TimerHandle, db::Player, scoring::Difficulty, targets::PlayArea};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum TrialPhase {
    #[default]
    Idle,
    PlayerSelected,
    DifficultySelected,
    Countdown,
    Flash,
    ReactionPhase,
    HardwareCapturePhase,
    ScoreEntry,
    Completed,
}

impl TrialPhase {
    /// Phases driven by timers rather than by the operator.
    pub fn is_timed(self) -> bool {
        matches!(
            self,
            TrialPhase::Countdown
                | TrialPhase::Flash
                | TrialPhase::ReactionPhase
                | TrialPhase::HardwareCapturePhase
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            TrialPhase::Idle => "idle",
            TrialPhase::PlayerSelected => "player selected",
            TrialPhase::DifficultySelected => "difficulty selected",
            TrialPhase::Countdown => "counting down",
            TrialPhase::Flash => "flashing",
            TrialPhase::ReactionPhase => "capturing reactions",
            TrialPhase::HardwareCapturePhase => "running the drop rig",
            TrialPhase::ScoreEntry => "awaiting catches",
            TrialPhase::Completed => "completed",
        }
    }
}

impl fmt::Display for TrialPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How reactions are captured after the flash.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum CaptureMode {
    /// On-screen targets clicked by the athlete.
    Software,
    /// Magnet drop rig; the operator counts catches.
    #[default]
    Hardware,
}

impl fmt::Display for CaptureMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            CaptureMode::Software => "software",
            CaptureMode::Hardware => "hardware",
        })
    }
}

impl FromStr for CaptureMode {
    type Err = anyhow::Error;

    fn from_str(value: &str) -> anyhow::Result<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "software" | "sw" => Ok(CaptureMode::Software),
            "hardware" | "hw" => Ok(CaptureMode::Hardware),
            _ => Err(anyhow!("unknown capture mode '{value}'")),
        }
    }
}

/// Frozen when the difficulty is chosen; nothing in here changes once the countdown starts.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TrialConfiguration {
    pub player: Player,
    pub difficulty: Difficulty,
    pub capture_mode: CaptureMode,
    pub play_area: PlayArea,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TrialResult {
    pub trial_id: String,
    pub player_id: i64,
    pub player_name: String,
    pub difficulty: Difficulty,
    pub catches: u8,
    pub multiplier: u32,
    pub score: u32,
}

/// Timers owned by the timed phases. At most one is live at a time.
#[derive(Debug, Default)]
pub struct PhaseTimers {
    pub countdown: Option<TimerHandle>,
    pub flash: Option<TimerHandle>,
    pub reaction: Option<TimerHandle>,
}

impl PhaseTimers {
    pub fn cancel_all(&mut self) {
        for timer in [
            self.countdown.take(),
            self.flash.take(),
            self.reaction.take(),
        ]
        .into_iter()
        .flatten()
        {
            timer.cancel();
        }
    }
}

/// Everything the kiosk knows about the trial in progress.
#[derive(Debug, Default)]
pub struct TrialSession {
    /// Assigned when the countdown starts; one id per attempt.
    pub id: Option<String>,
    pub phase: TrialPhase,
    pub player: Option<Player>,
    pub configuration: Option<TrialConfiguration>,
    pub countdown: Option<u8>,
    pub started_at: Option<DateTime<Utc>>,
    /// Bumped on every phase change. Timer callbacks carry the epoch they were scheduled in
    /// and do nothing once it has moved on.
    pub epoch: u64,
    pub timers: PhaseTimers,
    pub hits: Option<mpsc::UnboundedSender<u32>>,
    pub last_result: Option<TrialResult>,
}

impl TrialSession {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn enter(&mut self, phase: TrialPhase) -> u64 {
        self.epoch = self.epoch.wrapping_add(1);
        self.phase = phase;
        self.epoch
    }

    /// True while the callback scheduled at `epoch` for `phase` is still current.
    pub fn owns(&self, epoch: u64, phase: TrialPhase) -> bool {
        self.epoch == epoch && self.phase == phase
    }

    /// Drops every timer and input channel of the attempt in progress.
    pub fn abandon_attempt(&mut self) {
        self.timers.cancel_all();
        self.hits = None;
        self.id = None;
        self.countdown = None;
        self.started_at = None;
        self.configuration = None;
    }

    /// Back to `Idle`. The epoch keeps counting so stale callbacks stay stale.
    pub fn reset(&mut self) {
        self.abandon_attempt();
        self.player = None;
        self.enter(TrialPhase::Idle);
    }

    pub fn snapshot(&self) -> TrialSnapshot {
        let configuration = self.configuration.as_ref();
        TrialSnapshot {
            session_id: self.id.clone(),
            phase: self.phase,
            player: self.player.clone(),
            difficulty: configuration.map(|c| c.difficulty),
            capture_mode: configuration.map(|c| c.capture_mode),
            countdown: self.countdown,
            started_at: self.started_at,
            last_result: self.last_result.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TrialSnapshot {
    pub session_id: Option<String>,
    pub phase: TrialPhase,
    pub player: Option<Player>,
    pub difficulty: Option<Difficulty>,
    pub capture_mode: Option<CaptureMode>,
    pub countdown: Option<u8>,
    pub started_at: Option<DateTime<Utc>>,
    pub last_result: Option<TrialResult>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reset_keeps_epoch_moving_forward() {
        let mut session = TrialSession::new();
        let countdown = session.enter(TrialPhase::Countdown);
        assert!(session.owns(countdown, TrialPhase::Countdown));

        session.reset();
        assert_eq!(session.phase, TrialPhase::Idle);
        assert!(session.epoch > countdown);

        session.enter(TrialPhase::Countdown);
        assert!(!session.owns(countdown, TrialPhase::Countdown));
    }

    #[test]
    fn capture_mode_parses_and_defaults_to_hardware() {
        assert_eq!(CaptureMode::default(), CaptureMode::Hardware);
        assert_eq!("Software".parse::<CaptureMode>().unwrap(), CaptureMode::Software);
        assert_eq!("hw".parse::<CaptureMode>().unwrap(), CaptureMode::Hardware);
        assert!("both".parse::<CaptureMode>().is_err());
    }

    #[test]
    fn only_machine_driven_phases_are_timed() {
        assert!(TrialPhase::Countdown.is_timed());
        assert!(TrialPhase::HardwareCapturePhase.is_timed());
        assert!(!TrialPhase::ScoreEntry.is_timed());
        assert!(!TrialPhase::Idle.is_timed());
    }
}
