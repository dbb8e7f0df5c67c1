use std::{fmt, str::FromStr, time::Duration};

use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Difficulty {
    Easy,
    Medium,
    Hard,
    #[serde(rename = "Very Hard", alias = "VeryHard")]
    VeryHard,
}

/// Everything a difficulty level controls.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DifficultyProfile {
    /// Score weight applied to catches.
    pub multiplier: u32,
    /// Edge length of a software reaction target, in play-area units.
    pub target_size: f64,
    /// Wait between successive magnet releases in a hardware drop.
    pub drop_interval: Duration,
}

impl Difficulty {
    pub const ALL: [Difficulty; 4] = [
        Difficulty::Easy,
        Difficulty::Medium,
        Difficulty::Hard,
        Difficulty::VeryHard,
    ];

    pub fn profile(self) -> DifficultyProfile {
        match self {
            Difficulty::Easy => DifficultyProfile {
                multiplier: 1,
                target_size: 100.0,
                drop_interval: Duration::from_millis(3000),
            },
            Difficulty::Medium => DifficultyProfile {
                multiplier: 2,
                target_size: 80.0,
                drop_interval: Duration::from_millis(2000),
            },
            Difficulty::Hard => DifficultyProfile {
                multiplier: 3,
                target_size: 60.0,
                drop_interval: Duration::from_millis(1000),
            },
            Difficulty::VeryHard => DifficultyProfile {
                multiplier: 5,
                target_size: 45.0,
                drop_interval: Duration::from_millis(500),
            },
        }
    }

    pub fn multiplier(self) -> u32 {
        self.profile().multiplier
    }

    pub fn target_size(self) -> f64 {
        self.profile().target_size
    }

    pub fn drop_interval(self) -> Duration {
        self.profile().drop_interval
    }

    /// Name used for storage and display.
    pub fn as_str(self) -> &'static str {
        match self {
            Difficulty::Easy => "Easy",
            Difficulty::Medium => "Medium",
            Difficulty::Hard => "Hard",
            Difficulty::VeryHard => "Very Hard",
        }
    }
}

impl fmt::Display for Difficulty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Difficulty {
    type Err = anyhow::Error;

    /// Accepts the stored names plus loose operator spellings such as `very-hard` or `VERYHARD`.
    fn from_str(value: &str) -> Result<Self> {
        let normalized: String = value
            .chars()
            .filter(|c| !matches!(c, ' ' | '-' | '_'))
            .collect::<String>()
            .to_ascii_lowercase();

        match normalized.as_str() {
            "easy" => Ok(Difficulty::Easy),
            "medium" => Ok(Difficulty::Medium),
            "hard" => Ok(Difficulty::Hard),
            "veryhard" => Ok(Difficulty::VeryHard),
            _ => {
                let known: Vec<&str> = Difficulty::ALL.iter().map(|d| d.as_str()).collect();
                Err(anyhow!(
                    "unknown difficulty '{value}' (expected one of {})",
                    known.join(", ")
                ))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_level_has_distinct_profile() {
        let multipliers: Vec<u32> = Difficulty::ALL.iter().map(|d| d.multiplier()).collect();
        assert_eq!(multipliers, vec![1, 2, 3, 5]);

        let sizes: Vec<f64> = Difficulty::ALL.iter().map(|d| d.target_size()).collect();
        assert_eq!(sizes, vec![100.0, 80.0, 60.0, 45.0]);

        // Harder levels release magnets faster.
        for pair in Difficulty::ALL.windows(2) {
            assert!(pair[0].drop_interval() > pair[1].drop_interval());
        }
    }

    #[test]
    fn parses_stored_and_loose_names() {
        assert_eq!("Easy".parse::<Difficulty>().unwrap(), Difficulty::Easy);
        assert_eq!("Very Hard".parse::<Difficulty>().unwrap(), Difficulty::VeryHard);
        assert_eq!("very-hard".parse::<Difficulty>().unwrap(), Difficulty::VeryHard);
        assert_eq!("MEDIUM".parse::<Difficulty>().unwrap(), Difficulty::Medium);
        let err = "extreme".parse::<Difficulty>().unwrap_err();
        assert!(err.to_string().contains("Easy, Medium, Hard, Very Hard"));
    }

    #[test]
    fn serializes_with_display_name() {
        let json = serde_json::to_string(&Difficulty::VeryHard).unwrap();
        assert_eq!(json, "\"Very Hard\"");

        let parsed: Difficulty = serde_json::from_str("\"VeryHard\"").unwrap();
        assert_eq!(parsed, Difficulty::VeryHard);
    }
}
