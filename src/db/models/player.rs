//! Player directory models.

use std::{fmt, str::FromStr};

use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Side {
    Offense,
    Defense,
    #[serde(rename = "Special Teams")]
    SpecialTeams,
}

impl Side {
    pub fn as_str(&self) -> &'static str {
        match self {
            Side::Offense => "Offense",
            Side::Defense => "Defense",
            Side::SpecialTeams => "Special Teams",
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Side {
    type Err = anyhow::Error;

    fn from_str(value: &str) -> Result<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "offense" => Ok(Side::Offense),
            "defense" => Ok(Side::Defense),
            "special teams" | "special-teams" | "specialteams" => Ok(Side::SpecialTeams),
            _ => Err(anyhow!("unknown side '{value}'")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Player {
    pub id: i64,
    pub name: String,
    pub position: Option<String>,
    pub side: Option<Side>,
}

impl Player {
    /// "position · side", either half alone, or `None` when neither is known.
    pub fn meta(&self) -> Option<String> {
        let position = self
            .position
            .as_deref()
            .map(str::trim)
            .filter(|p| !p.is_empty());
        match (position, self.side) {
            (Some(position), Some(side)) => Some(format!("{position} · {side}")),
            (Some(position), None) => Some(position.to_string()),
            (None, Some(side)) => Some(side.to_string()),
            (None, None) => None,
        }
    }
}

impl fmt::Display for Player {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.meta() {
            Some(meta) => write!(f, "{} ({meta})", self.name),
            None => f.write_str(&self.name),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn player(position: Option<&str>, side: Option<Side>) -> Player {
        Player {
            id: 1,
            name: "Jordan".into(),
            position: position.map(String::from),
            side,
        }
    }

    #[test]
    fn meta_combines_available_parts() {
        assert_eq!(
            player(Some("WR"), Some(Side::Offense)).meta().as_deref(),
            Some("WR · Offense")
        );
        assert_eq!(player(Some(" "), Some(Side::Defense)).meta().as_deref(), Some("Defense"));
        assert_eq!(player(Some("K"), None).meta().as_deref(), Some("K"));
        assert_eq!(player(None, None).meta(), None);
    }

    #[test]
    fn display_appends_meta() {
        assert_eq!(
            player(Some("WR"), Some(Side::Offense)).to_string(),
            "Jordan (WR · Offense)"
        );
        assert_eq!(player(None, None).to_string(), "Jordan");
    }

    #[test]
    fn side_parses_loosely() {
        assert_eq!("special teams".parse::<Side>().unwrap(), Side::SpecialTeams);
        assert_eq!("Defense".parse::<Side>().unwrap(), Side::Defense);
        assert!("goalie".parse::<Side>().is_err());
    }
}
