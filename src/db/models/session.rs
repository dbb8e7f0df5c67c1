//! Stored trial sessions and leaderboard rows.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::scoring::Difficulty;

/// One recorded trial as persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrialRecord {
    pub id: i64,
    pub player_id: i64,
    pub trial_id: Option<String>,
    pub difficulty: Difficulty,
    pub catches: u8,
    pub score: u32,
    pub played_at: DateTime<Utc>,
}

/// Ranked row served to the leaderboard screen.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LeaderboardEntry {
    pub name: String,
    pub difficulty: Difficulty,
    pub catches: u8,
    pub multiplier: u32,
    pub score: u32,
    pub played_at: DateTime<Utc>,
}
