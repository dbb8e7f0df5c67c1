use anyhow::{bail, Result};
use async_trait::async_trait;
use chrono::Utc;
use rusqlite::{params, ErrorCode, OptionalExtension, Row};

use crate::{
    db::{
        connection::Database,
        helpers::{format_datetime, parse_side},
        models::{Player, Side},
    },
    trial::PlayerDirectory,
};

fn row_to_player(row: &Row) -> Result<Player> {
    let side: Option<String> = row.get("side")?;
    Ok(Player {
        id: row.get("player_id")?,
        name: row.get("name")?,
        position: row.get("position")?,
        side: parse_side(side)?,
    })
}

fn is_unique_violation(err: &rusqlite::Error) -> bool {
    matches!(
        err,
        rusqlite::Error::SqliteFailure(failure, _) if failure.code == ErrorCode::ConstraintViolation
    )
}

impl Database {
    /// Adds a player. Returns `None` when the name is already taken.
    pub async fn create_player(
        &self,
        name: &str,
        position: Option<&str>,
        side: Option<Side>,
    ) -> Result<Option<i64>> {
        let name = name.trim().to_string();
        if name.is_empty() {
            bail!("player name must not be empty");
        }
        let position = position
            .map(str::trim)
            .filter(|p| !p.is_empty())
            .map(String::from);

        self.execute(move |conn| {
            let inserted = conn.execute(
                "INSERT INTO players (name, position, side, date_created)
                 VALUES (?1, ?2, ?3, ?4)",
                params![
                    name,
                    position,
                    side.map(|s| s.as_str()),
                    format_datetime(Utc::now()),
                ],
            );
            match inserted {
                Ok(_) => Ok(Some(conn.last_insert_rowid())),
                Err(err) if is_unique_violation(&err) => Ok(None),
                Err(err) => Err(err.into()),
            }
        })
        .await
    }

    pub async fn list_players(&self) -> Result<Vec<Player>> {
        self.execute(|conn| {
            let mut stmt = conn.prepare(
                "SELECT player_id, name, position, side
                 FROM players
                 ORDER BY name COLLATE NOCASE ASC, player_id ASC",
            )?;

            let mut rows = stmt.query([])?;
            let mut players = Vec::new();
            while let Some(row) = rows.next()? {
                players.push(row_to_player(row)?);
            }
            Ok(players)
        })
        .await
    }

    pub async fn get_player(&self, player_id: i64) -> Result<Option<Player>> {
        self.execute(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT player_id, name, position, side
                 FROM players
                 WHERE player_id = ?1",
            )?;

            stmt.query_row(params![player_id], |row| Ok(row_to_player(row)))
                .optional()?
                .transpose()
        })
        .await
    }

    /// Removes a player and their recorded sessions. Returns whether the player existed.
    pub async fn delete_player(&self, player_id: i64) -> Result<bool> {
        self.execute(move |conn| {
            let tx = conn.transaction()?;
            tx.execute(
                "DELETE FROM sessions WHERE player_id = ?1",
                params![player_id],
            )?;
            let removed = tx.execute(
                "DELETE FROM players WHERE player_id = ?1",
                params![player_id],
            )?;
            tx.commit()?;
            Ok(removed > 0)
        })
        .await
    }
}

#[async_trait]
impl PlayerDirectory for Database {
    async fn list_players(&self) -> Result<Vec<Player>> {
        Database::list_players(self).await
    }

    async fn get_player(&self, player_id: i64) -> Result<Option<Player>> {
        Database::get_player(self, player_id).await
    }
}
