use anyhow::{anyhow, Result};
use async_trait::async_trait;
use chrono::{SubsecRound, Utc};
use rusqlite::{params, Row};

use crate::{
    db::{
        connection::Database,
        helpers::{format_datetime, parse_datetime, parse_difficulty, to_u32, to_u8},
        models::{LeaderboardEntry, TrialRecord},
    },
    scoring::{score, Catches, Difficulty},
    trial::Leaderboard,
};

fn row_to_record(row: &Row) -> Result<TrialRecord> {
    let difficulty: String = row.get("difficulty")?;
    let played_at: String = row.get("played_at")?;
    let catches: i64 = row.get("catches")?;
    let score: i64 = row.get("score")?;

    Ok(TrialRecord {
        id: row.get("session_id")?,
        player_id: row.get("player_id")?,
        trial_id: row.get("trial_id")?,
        difficulty: parse_difficulty(&difficulty)?,
        catches: to_u8(catches, "catches")?,
        score: to_u32(score, "score")?,
        played_at: parse_datetime(&played_at, "played_at")?,
    })
}

fn row_to_entry(row: &Row) -> Result<LeaderboardEntry> {
    let difficulty: String = row.get("difficulty")?;
    let played_at: String = row.get("played_at")?;
    let catches: i64 = row.get("catches")?;
    let score: i64 = row.get("score")?;
    let difficulty = parse_difficulty(&difficulty)?;

    Ok(LeaderboardEntry {
        name: row.get("name")?,
        difficulty,
        catches: to_u8(catches, "catches")?,
        multiplier: difficulty.multiplier(),
        score: to_u32(score, "score")?,
        played_at: parse_datetime(&played_at, "played_at")?,
    })
}

impl Database {
    /// Stores a finished trial, scoring it on the way in. `played_at` is assigned here.
    pub async fn record_session(
        &self,
        player_id: i64,
        trial_id: Option<&str>,
        difficulty: Difficulty,
        catches: Catches,
    ) -> Result<TrialRecord> {
        let trial_id = trial_id.map(String::from);
        // Stored with millisecond precision; the returned record must match the row.
        let played_at = Utc::now().trunc_subsecs(3);
        let points = score(difficulty, catches);

        self.execute(move |conn| {
            let exists: bool = conn.query_row(
                "SELECT EXISTS(SELECT 1 FROM players WHERE player_id = ?1)",
                params![player_id],
                |row| row.get(0),
            )?;
            if !exists {
                return Err(anyhow!("player {player_id} does not exist"));
            }

            conn.execute(
                "INSERT INTO sessions (player_id, trial_id, difficulty, catches, score, played_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    player_id,
                    trial_id,
                    difficulty.as_str(),
                    catches.get(),
                    points,
                    format_datetime(played_at),
                ],
            )?;

            Ok(TrialRecord {
                id: conn.last_insert_rowid(),
                player_id,
                trial_id,
                difficulty,
                catches: catches.get(),
                score: points,
                played_at,
            })
        })
        .await
    }

    /// Best `limit` trials. Ties go to whoever set the score first.
    pub async fn top_scores(&self, limit: usize) -> Result<Vec<LeaderboardEntry>> {
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        self.execute(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT p.name, s.difficulty, s.catches, s.score, s.played_at
                 FROM sessions s
                 JOIN players p ON p.player_id = s.player_id
                 ORDER BY s.score DESC, s.played_at ASC, s.session_id ASC
                 LIMIT ?1",
            )?;

            let mut rows = stmt.query(params![limit])?;
            let mut entries = Vec::new();
            while let Some(row) = rows.next()? {
                entries.push(row_to_entry(row)?);
            }
            Ok(entries)
        })
        .await
    }

    pub async fn player_sessions(&self, player_id: i64) -> Result<Vec<TrialRecord>> {
        self.execute(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT session_id, player_id, trial_id, difficulty, catches, score, played_at
                 FROM sessions
                 WHERE player_id = ?1
                 ORDER BY played_at ASC, session_id ASC",
            )?;

            let mut rows = stmt.query(params![player_id])?;
            let mut records = Vec::new();
            while let Some(row) = rows.next()? {
                records.push(row_to_record(row)?);
            }
            Ok(records)
        })
        .await
    }
}

#[async_trait]
impl Leaderboard for Database {
    async fn record_session(
        &self,
        player_id: i64,
        trial_id: &str,
        difficulty: Difficulty,
        catches: Catches,
    ) -> Result<TrialRecord> {
        Database::record_session(self, player_id, Some(trial_id), difficulty, catches).await
    }

    async fn top_scores(&self, limit: usize) -> Result<Vec<LeaderboardEntry>> {
        Database::top_scores(self, limit).await
    }
}
