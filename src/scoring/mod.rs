pub mod difficulty;
pub mod score;

pub use difficulty::Difficulty;
pub use score::{score, Catches, CatchesOutOfRange};
