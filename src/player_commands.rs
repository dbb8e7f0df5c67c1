//! Operator commands for managing the player roster.

use crate::{
    db::{Player, Side, TrialRecord},
    AppState,
};

pub async fn list_players(state: &AppState) -> Result<Vec<Player>, String> {
    state.trial.roster().await.map_err(|e| e.to_string())
}

/// Returns the new player's id, or an error when the name is taken.
pub async fn add_player(
    state: &AppState,
    name: &str,
    position: Option<&str>,
    side: Option<&str>,
) -> Result<i64, String> {
    let side = side
        .filter(|s| !s.trim().is_empty())
        .map(str::parse::<Side>)
        .transpose()
        .map_err(|e| e.to_string())?;

    state
        .db
        .create_player(name, position, side)
        .await
        .map_err(|e| e.to_string())?
        .ok_or_else(|| format!("a player named '{}' already exists", name.trim()))
}

pub async fn remove_player(state: &AppState, player_id: i64) -> Result<(), String> {
    let removed = state
        .db
        .delete_player(player_id)
        .await
        .map_err(|e| e.to_string())?;
    if removed {
        Ok(())
    } else {
        Err(format!("player {player_id} does not exist"))
    }
}

/// Every recorded trial of one player, oldest first.
pub async fn player_history(
    state: &AppState,
    player_id: i64,
) -> Result<Vec<TrialRecord>, String> {
    state
        .db
        .player_sessions(player_id)
        .await
        .map_err(|e| e.to_string())
}
