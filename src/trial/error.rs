use thiserror::Error;

use crate::scoring::CatchesOutOfRange;

use super::TrialPhase;

#[derive(Debug, Error)]
pub enum TrialError {
    #[error("select a player first")]
    MissingPlayer,
    #[error("player {0} does not exist")]
    UnknownPlayer(i64),
    #[error("select a difficulty first")]
    MissingDifficulty,
    #[error("enter the number of catches")]
    MissingCatches,
    #[error(transparent)]
    CatchesOutOfRange(#[from] CatchesOutOfRange),
    #[error("cannot {action} while {phase}")]
    InvalidTransition {
        action: &'static str,
        phase: TrialPhase,
    },
    #[error(transparent)]
    Collaborator(#[from] anyhow::Error),
}

impl TrialError {
    /// Operator input problems, as opposed to sequencing or infrastructure failures.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            TrialError::MissingPlayer
                | TrialError::UnknownPlayer(_)
                | TrialError::MissingDifficulty
                | TrialError::MissingCatches
                | TrialError::CatchesOutOfRange(_)
        )
    }
}
