use std::time::Duration;

use crate::targets::GeneratorConfig;

#[derive(Debug, Clone)]
pub struct TrialTimings {
    /// First value shown by the countdown; one tick per `tick_interval` down to 1.
    pub countdown_from: u8,
    pub tick_interval: Duration,
    pub flash_dwell: Duration,
    pub generator: GeneratorConfig,
}

impl Default for TrialTimings {
    fn default() -> Self {
        Self {
            countdown_from: 3,
            tick_interval: Duration::from_secs(1),
            flash_dwell: Duration::from_millis(1000),
            generator: GeneratorConfig::default(),
        }
    }
}
