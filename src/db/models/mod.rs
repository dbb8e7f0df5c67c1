pub mod player;
pub mod session;

pub use player::{Player, Side};
pub use session::{LeaderboardEntry, TrialRecord};
