use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::Difficulty;

pub const MAX_CATCHES: u8 = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("catches must be between 0 and {max}, got {value}", max = MAX_CATCHES)]
pub struct CatchesOutOfRange {
    pub value: i64,
}

/// Operator-entered count of caught items, always within `0..=MAX_CATCHES`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "i64", into = "u8")]
pub struct Catches(u8);

impl Catches {
    pub fn new(value: i64) -> Result<Self, CatchesOutOfRange> {
        match u8::try_from(value) {
            Ok(count) if count <= MAX_CATCHES => Ok(Self(count)),
            _ => Err(CatchesOutOfRange { value }),
        }
    }

    pub fn get(self) -> u8 {
        self.0
    }
}

impl TryFrom<i64> for Catches {
    type Error = CatchesOutOfRange;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        Catches::new(value)
    }
}

impl From<Catches> for u8 {
    fn from(catches: Catches) -> Self {
        catches.0
    }
}

/// Balanced score used to rank trials: catches weighted by the difficulty multiplier.
pub fn score(difficulty: Difficulty, catches: Catches) -> u32 {
    u32::from(catches.get()) * difficulty.multiplier()
}
