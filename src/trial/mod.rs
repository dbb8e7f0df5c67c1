pub mod collaborators;
pub mod commands;
pub mod config;
pub mod controller;
pub mod error;
pub mod state;

pub use collaborators::{Leaderboard, PlayerDirectory};
pub use config::TrialTimings;
pub use controller::TrialController;
pub use error::TrialError;
pub use state::{
    CaptureMode, TrialConfiguration, TrialPhase, TrialResult, TrialSession, TrialSnapshot,
};
