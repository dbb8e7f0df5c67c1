use anyhow::Result;
use async_trait::async_trait;

use crate::{
    db::{LeaderboardEntry, Player, TrialRecord},
    scoring::{Catches, Difficulty},
};

/// Source of selectable players.
#[async_trait]
pub trait PlayerDirectory: Send + Sync {
    async fn list_players(&self) -> Result<Vec<Player>>;
    async fn get_player(&self, player_id: i64) -> Result<Option<Player>>;
}

/// Where finished trials go. The leaderboard stamps `played_at` and owns ranking.
#[async_trait]
pub trait Leaderboard: Send + Sync {
    async fn record_session(
        &self,
        player_id: i64,
        trial_id: &str,
        difficulty: Difficulty,
        catches: Catches,
    ) -> Result<TrialRecord>;

    async fn top_scores(&self, limit: usize) -> Result<Vec<LeaderboardEntry>>;
}
