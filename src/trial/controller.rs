use std::{ops::ControlFlow, sync::Arc, time::Duration};

use chrono::Utc;
use log::{debug, error, info, warn};
use rand::{rngs::StdRng, SeedableRng};
use tokio::sync::{broadcast, mpsc, Mutex};
use uuid::Uuid;

use crate::{
    clock::Clock,
    db::{LeaderboardEntry, Player},
    events::{EventBus, TrialEvent},
    hardware::{send_bounded, HardwareGateway, HardwareRequest},
    scoring::{score, Catches, Difficulty},
    settings::SettingsStore,
    targets::{run_targets, TargetGenerator, TargetRunOutcome},
};

use super::{
    CaptureMode, Leaderboard, PlayerDirectory, TrialConfiguration, TrialError, TrialPhase,
    TrialResult, TrialSession, TrialSnapshot, TrialTimings,
};

/// Sequences one trial at a time: player, difficulty, countdown, flash, capture, score.
///
/// Operator actions and timer callbacks all go through the same session lock. Callbacks
/// carry the epoch of the phase that scheduled them and bail out when it has moved on.
#[derive(Clone)]
pub struct TrialController {
    session: Arc<Mutex<TrialSession>>,
    clock: Clock,
    timings: Arc<TrialTimings>,
    players: Arc<dyn PlayerDirectory>,
    leaderboard: Arc<dyn Leaderboard>,
    hardware: Arc<dyn HardwareGateway>,
    settings: Arc<SettingsStore>,
    events: EventBus,
}

impl TrialController {
    pub fn new(
        players: Arc<dyn PlayerDirectory>,
        leaderboard: Arc<dyn Leaderboard>,
        hardware: Arc<dyn HardwareGateway>,
        settings: Arc<SettingsStore>,
        events: EventBus,
    ) -> Self {
        Self {
            session: Arc::new(Mutex::new(TrialSession::new())),
            clock: Clock::new(),
            timings: Arc::new(TrialTimings::default()),
            players,
            leaderboard,
            hardware,
            settings,
            events,
        }
    }

    #[cfg(test)]
    pub fn with_timings(mut self, timings: TrialTimings) -> Self {
        self.timings = Arc::new(timings);
        self
    }

    pub fn subscribe(&self) -> broadcast::Receiver<TrialEvent> {
        self.events.subscribe()
    }

    pub async fn snapshot(&self) -> TrialSnapshot {
        self.session.lock().await.snapshot()
    }

    /// Everyone who can be selected for a trial.
    pub async fn roster(&self) -> Result<Vec<Player>, TrialError> {
        Ok(self.players.list_players().await?)
    }

    pub async fn top_scores(&self, limit: usize) -> Result<Vec<LeaderboardEntry>, TrialError> {
        Ok(self.leaderboard.top_scores(limit).await?)
    }

    pub async fn select_player(&self, player_id: Option<i64>) -> Result<TrialSnapshot, TrialError> {
        let player_id = player_id.ok_or(TrialError::MissingPlayer)?;

        let mut session = self.session.lock().await;
        expect_phase(
            &session,
            "select a player",
            &[TrialPhase::Idle, TrialPhase::PlayerSelected, TrialPhase::Completed],
        )?;

        let player = self
            .players
            .get_player(player_id)
            .await?
            .ok_or(TrialError::UnknownPlayer(player_id))?;

        info!("Player {player} selected (id {})", player.id);
        session.abandon_attempt();
        session.player = Some(player);
        self.transition(&mut session, TrialPhase::PlayerSelected);
        Ok(session.snapshot())
    }

    pub async fn select_difficulty(
        &self,
        difficulty: Option<Difficulty>,
    ) -> Result<TrialSnapshot, TrialError> {
        let difficulty = difficulty.ok_or(TrialError::MissingDifficulty)?;

        let mut session = self.session.lock().await;
        expect_phase(
            &session,
            "select a difficulty",
            &[TrialPhase::PlayerSelected, TrialPhase::DifficultySelected],
        )?;
        let player = session.player.clone().ok_or(TrialError::MissingPlayer)?;

        let configuration = TrialConfiguration {
            player,
            difficulty,
            capture_mode: self.settings.capture_mode(),
            play_area: self.settings.play_area(),
        };
        info!(
            "Difficulty {} selected ({} capture)",
            difficulty, configuration.capture_mode
        );
        session.configuration = Some(configuration);
        self.transition(&mut session, TrialPhase::DifficultySelected);
        self.dispatch_hardware(HardwareRequest::PowerOn);
        Ok(session.snapshot())
    }

    pub async fn begin(&self) -> Result<TrialSnapshot, TrialError> {
        let mut session = self.session.lock().await;
        expect_phase(&session, "begin", &[TrialPhase::DifficultySelected])?;
        if session.configuration.is_none() {
            return Err(TrialError::MissingDifficulty);
        }

        let session_id = Uuid::new_v4().to_string();
        info!("Trial {} starting", session_id);
        session.id = Some(session_id.clone());
        session.started_at = Some(Utc::now());
        let epoch = self.transition(&mut session, TrialPhase::Countdown);

        let first = self.timings.countdown_from;
        session.countdown = Some(first);
        self.events.emit(TrialEvent::CountdownTick {
            session_id,
            value: first,
        });

        let controller = self.clone();
        session.timers.countdown = Some(self.clock.schedule_repeating(
            self.timings.tick_interval,
            move |fired| {
                let controller = controller.clone();
                async move { controller.on_countdown_tick(epoch, fired).await }
            },
        ));

        Ok(session.snapshot())
    }

    /// Forwards an operator click on target `index`. Clicks on anything but the live target
    /// are dropped by the reaction run.
    pub async fn hit(&self, index: u32) -> Result<(), TrialError> {
        let session = self.session.lock().await;
        expect_phase(&session, "register a hit", &[TrialPhase::ReactionPhase])?;
        let delivered = session
            .hits
            .as_ref()
            .is_some_and(|hits| hits.send(index).is_ok());
        if !delivered {
            debug!("hit on target {index} arrived after the run ended");
        }
        Ok(())
    }

    pub async fn submit_catches(&self, catches: Option<i64>) -> Result<TrialResult, TrialError> {
        let mut session = self.session.lock().await;
        expect_phase(&session, "submit catches", &[TrialPhase::ScoreEntry])?;

        let catches = Catches::new(catches.ok_or(TrialError::MissingCatches)?)?;
        let configuration = session
            .configuration
            .clone()
            .ok_or(TrialError::MissingDifficulty)?;
        let trial_id = session
            .id
            .clone()
            .unwrap_or_else(|| Uuid::new_v4().to_string());

        let record = self
            .leaderboard
            .record_session(
                configuration.player.id,
                &trial_id,
                configuration.difficulty,
                catches,
            )
            .await
            .map_err(|err| {
                error!("Failed to record trial {}: {err:#}", trial_id);
                TrialError::Collaborator(err)
            })?;

        let result = TrialResult {
            trial_id,
            player_id: configuration.player.id,
            player_name: configuration.player.name.clone(),
            difficulty: configuration.difficulty,
            catches: catches.get(),
            multiplier: configuration.difficulty.multiplier(),
            score: score(configuration.difficulty, catches),
        };
        info!(
            "Trial {} recorded: {} caught {} on {} for {} points",
            result.trial_id, result.player_name, result.catches, result.difficulty, result.score
        );

        self.events.emit(TrialEvent::TrialRecorded {
            result: result.clone(),
            played_at: record.played_at,
        });

        session.abandon_attempt();
        session.player = None;
        session.last_result = Some(result.clone());
        self.transition(&mut session, TrialPhase::Completed);
        Ok(result)
    }

    /// One step back. Abandoning a running attempt keeps the player selected.
    pub async fn back(&self) -> Result<TrialSnapshot, TrialError> {
        let mut session = self.session.lock().await;
        match session.phase {
            TrialPhase::Idle => {
                return Err(TrialError::InvalidTransition {
                    action: "go back",
                    phase: TrialPhase::Idle,
                })
            }
            TrialPhase::PlayerSelected | TrialPhase::Completed => {
                session.reset();
                self.emit_state(&session);
            }
            phase => {
                if phase.is_timed() || phase == TrialPhase::ScoreEntry {
                    info!(
                        "Trial {} abandoned while {phase}",
                        session.id.as_deref().unwrap_or("-")
                    );
                }
                session.abandon_attempt();
                self.transition(&mut session, TrialPhase::PlayerSelected);
            }
        }
        Ok(session.snapshot())
    }

    /// Abandons everything and returns to `Idle`. Safe to call at any time.
    pub async fn cancel(&self) -> Result<TrialSnapshot, TrialError> {
        let mut session = self.session.lock().await;
        if session.phase != TrialPhase::Idle {
            info!(
                "Trial {} cancelled while {}",
                session.id.as_deref().unwrap_or("-"),
                session.phase
            );
            session.reset();
            self.emit_state(&session);
        }
        Ok(session.snapshot())
    }

    async fn on_countdown_tick(&self, epoch: u64, fired: u32) -> ControlFlow<()> {
        let mut session = self.session.lock().await;
        if !session.owns(epoch, TrialPhase::Countdown) {
            return ControlFlow::Break(());
        }

        let remaining = u32::from(self.timings.countdown_from).saturating_sub(fired);
        match (u8::try_from(remaining), session.id.clone()) {
            (Ok(value), Some(session_id)) if value > 0 => {
                session.countdown = Some(value);
                self.events.emit(TrialEvent::CountdownTick { session_id, value });
                ControlFlow::Continue(())
            }
            _ => {
                // Ending this timer from inside itself: detach, the loop stops on Break.
                if let Some(timer) = session.timers.countdown.take() {
                    timer.detach();
                }
                session.countdown = None;
                self.enter_flash(&mut session);
                ControlFlow::Break(())
            }
        }
    }

    fn enter_flash(&self, session: &mut TrialSession) {
        let epoch = self.transition(session, TrialPhase::Flash);
        let controller = self.clone();
        session.timers.flash = Some(self.clock.schedule_once(
            self.timings.flash_dwell,
            move || async move { controller.on_flash_elapsed(epoch).await },
        ));
    }

    async fn on_flash_elapsed(&self, epoch: u64) {
        let mut session = self.session.lock().await;
        if !session.owns(epoch, TrialPhase::Flash) {
            return;
        }
        if let Some(timer) = session.timers.flash.take() {
            timer.detach();
        }

        let Some(configuration) = session.configuration.clone() else {
            error!("Flash ended without a trial configuration");
            session.reset();
            self.emit_state(&session);
            return;
        };

        match configuration.capture_mode {
            CaptureMode::Software => self.enter_reaction(&mut session, &configuration),
            CaptureMode::Hardware => {
                self.dispatch_hardware(HardwareRequest::TriggerDrop(configuration.difficulty));
                self.transition(&mut session, TrialPhase::HardwareCapturePhase);
                // The rig runs on its own; catches are counted by the operator.
                self.transition(&mut session, TrialPhase::ScoreEntry);
            }
        }
    }

    fn enter_reaction(&self, session: &mut TrialSession, configuration: &TrialConfiguration) {
        let epoch = self.transition(session, TrialPhase::ReactionPhase);
        let session_id = session.id.clone().unwrap_or_default();

        let generator = TargetGenerator::new(
            self.timings.generator.clone(),
            configuration.play_area,
            configuration.difficulty.target_size(),
            StdRng::from_entropy(),
        );
        let (hit_tx, hit_rx) = mpsc::unbounded_channel();
        session.hits = Some(hit_tx);

        let controller = self.clone();
        let clock = self.clock;
        let events = self.events.clone();
        session.timers.reaction = Some(self.clock.spawn(move |cancel_token| async move {
            let outcome =
                run_targets(generator, clock, events, session_id, hit_rx, cancel_token).await;
            if let TargetRunOutcome::Completed { .. } = outcome {
                controller.on_targets_finished(epoch).await;
            }
        }));
    }

    async fn on_targets_finished(&self, epoch: u64) {
        let mut session = self.session.lock().await;
        if !session.owns(epoch, TrialPhase::ReactionPhase) {
            return;
        }
        if let Some(timer) = session.timers.reaction.take() {
            timer.detach();
        }
        session.hits = None;
        self.transition(&mut session, TrialPhase::ScoreEntry);
    }

    fn transition(&self, session: &mut TrialSession, phase: TrialPhase) -> u64 {
        let epoch = session.enter(phase);
        debug!(
            "Trial {} -> {:?} (epoch {epoch})",
            session.id.as_deref().unwrap_or("-"),
            phase
        );
        self.emit_state(session);
        epoch
    }

    fn emit_state(&self, session: &TrialSession) {
        self.events.emit(TrialEvent::StateChanged {
            session_id: session.id.clone(),
            phase: session.phase,
        });
    }

    /// Fires a hardware call in the background. Failures become warnings; the trial never
    /// waits on the rig.
    fn dispatch_hardware(&self, request: HardwareRequest) {
        let hardware = self.hardware.clone();
        let events = self.events.clone();
        let limit = Duration::from_millis(self.settings.hardware_timeout_ms());

        tokio::spawn(async move {
            if let Err(err) = send_bounded(hardware.as_ref(), request, limit).await {
                let operation = request.operation();
                warn!("Hardware {operation} failed: {err:#}");
                events.emit(TrialEvent::HardwareWarning {
                    operation,
                    message: format!("{err:#}"),
                });
            }
        });
    }
}

fn expect_phase(
    session: &TrialSession,
    action: &'static str,
    allowed: &[TrialPhase],
) -> Result<(), TrialError> {
    if allowed.contains(&session.phase) {
        Ok(())
    } else {
        Err(TrialError::InvalidTransition {
            action,
            phase: session.phase,
        })
    }
}
