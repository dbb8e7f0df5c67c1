use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Tunable timings and limits for one reaction run.
#[derive(Debug, Clone)]
pub struct GeneratorConfig {
    /// Targets per run.
    pub max_targets: u32,

    /// An unclicked target expires after this long.
    pub target_lifetime: Duration,

    /// Gap before each spawn so consecutive targets never appear glued together
    pub respawn_delay: Duration,

    /// Pause between the last resolution and the completion signal.
    pub completion_delay: Duration,

    /// How long a reaction-time readout stays visible.
    pub popup_lifetime: Duration,

    /// Minimum distance between a target and any edge of the play area.
    pub margin: f64,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            max_targets: 10,
            target_lifetime: Duration::from_millis(1000),
            respawn_delay: Duration::from_millis(100),
            completion_delay: Duration::from_millis(500),
            popup_lifetime: Duration::from_millis(1200),
            margin: 20.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PlayArea {
    pub width: f64,
    pub height: f64,
}

impl Default for PlayArea {
    fn default() -> Self {
        Self {
            width: 1920.0,
            height: 1080.0,
        }
    }
}
