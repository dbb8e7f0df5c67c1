use log::{debug, warn};

use crate::{
    db::LeaderboardEntry,
    scoring::Difficulty,
    settings::KioskSettings,
    trial::{CaptureMode, TrialController, TrialError, TrialResult, TrialSnapshot},
    AppState,
};

fn controller_from_state(state: &AppState) -> TrialController {
    state.trial.clone()
}

/// Operator mistakes are routine; anything else is worth a warning.
fn rejected(err: TrialError) -> String {
    if err.is_validation() {
        debug!("Rejected operator input: {err}");
    } else {
        warn!("Trial command failed: {err:#}");
    }
    err.to_string()
}

pub async fn get_trial_state(state: &AppState) -> Result<TrialSnapshot, String> {
    Ok(controller_from_state(state).snapshot().await)
}

pub async fn select_player(
    state: &AppState,
    player_id: Option<i64>,
) -> Result<TrialSnapshot, String> {
    controller_from_state(state)
        .select_player(player_id)
        .await
        .map_err(rejected)
}

pub async fn select_difficulty(
    state: &AppState,
    difficulty: Option<&str>,
) -> Result<TrialSnapshot, String> {
    let difficulty = difficulty
        .map(str::parse::<Difficulty>)
        .transpose()
        .map_err(|e| e.to_string())?;
    controller_from_state(state)
        .select_difficulty(difficulty)
        .await
        .map_err(rejected)
}

pub async fn begin_trial(state: &AppState) -> Result<TrialSnapshot, String> {
    controller_from_state(state)
        .begin()
        .await
        .map_err(rejected)
}

pub async fn register_hit(state: &AppState, target_index: u32) -> Result<(), String> {
    controller_from_state(state)
        .hit(target_index)
        .await
        .map_err(rejected)
}

pub async fn submit_catches(state: &AppState, catches: Option<i64>) -> Result<TrialResult, String> {
    controller_from_state(state)
        .submit_catches(catches)
        .await
        .map_err(rejected)
}

pub async fn go_back(state: &AppState) -> Result<TrialSnapshot, String> {
    controller_from_state(state)
        .back()
        .await
        .map_err(rejected)
}

pub async fn cancel_trial(state: &AppState) -> Result<TrialSnapshot, String> {
    controller_from_state(state)
        .cancel()
        .await
        .map_err(rejected)
}

/// Top scores; `limit` defaults to the configured leaderboard size.
pub async fn get_leaderboard(
    state: &AppState,
    limit: Option<usize>,
) -> Result<Vec<LeaderboardEntry>, String> {
    let limit = limit.unwrap_or_else(|| state.settings.leaderboard_size());
    controller_from_state(state)
        .top_scores(limit)
        .await
        .map_err(rejected)
}

/// Takes effect from the next difficulty selection; a trial already configured keeps its mode.
pub async fn set_capture_mode(state: &AppState, mode: CaptureMode) -> Result<(), String> {
    state
        .settings
        .set_capture_mode(mode)
        .map_err(|e| e.to_string())
}

pub async fn get_settings(state: &AppState) -> Result<KioskSettings, String> {
    Ok(state.settings.snapshot())
}
