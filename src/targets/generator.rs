use rand::{rngs::StdRng, Rng};
use serde::Serialize;
use thiserror::Error;
use tokio::time::Instant;

use super::{GeneratorConfig, PlayArea};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum TargetOutcome {
    Hit,
    Expired,
}

/// One spawned target.
#[derive(Debug, Clone, Serialize)]
pub struct ReactionEvent {
    /// 1-based position in the run.
    pub index: u32,
    pub x: f64,
    pub y: f64,
    pub size: f64,
    #[serde(skip)]
    pub spawned_at: Instant,
    #[serde(skip)]
    pub resolved_at: Option<Instant>,
    pub outcome: Option<TargetOutcome>,
}

impl ReactionEvent {
    /// Time from spawn to click. Only hits have one.
    pub fn reaction_ms(&self) -> Option<u64> {
        match (self.outcome, self.resolved_at) {
            (Some(TargetOutcome::Hit), Some(resolved_at)) => Some(
                resolved_at
                    .saturating_duration_since(self.spawned_at)
                    .as_millis() as u64,
            ),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GeneratorError {
    #[error("target {0} is still unresolved")]
    TargetStillActive(u32),
    #[error("all {0} targets have already been spawned")]
    Exhausted(u32),
}

/// Finite sequence of reaction targets.
///
/// Holds at most one unresolved target; [`TargetGenerator::spawn`] refuses to create a
/// second one until the first has been resolved by a hit or an expiry.
#[derive(Debug)]
pub struct TargetGenerator {
    config: GeneratorConfig,
    area: PlayArea,
    size: f64,
    rng: StdRng,
    spawned: u32,
    resolved: u32,
    active: Option<ReactionEvent>,
}

impl TargetGenerator {
    pub fn new(config: GeneratorConfig, area: PlayArea, size: f64, rng: StdRng) -> Self {
        Self {
            config,
            area,
            size,
            rng,
            spawned: 0,
            resolved: 0,
            active: None,
        }
    }

    pub fn config(&self) -> &GeneratorConfig {
        &self.config
    }

    pub fn resolved_count(&self) -> u32 {
        self.resolved
    }

    pub fn is_exhausted(&self) -> bool {
        self.resolved >= self.config.max_targets
    }

    pub fn spawn(&mut self, now: Instant) -> Result<ReactionEvent, GeneratorError> {
        if let Some(active) = &self.active {
            return Err(GeneratorError::TargetStillActive(active.index));
        }
        if self.spawned >= self.config.max_targets {
            return Err(GeneratorError::Exhausted(self.config.max_targets));
        }

        let (x_max, y_max) = position_bounds(self.area, self.size, self.config.margin);
        let margin = self.config.margin;
        let x = self.rng.gen_range(margin..=x_max);
        let y = self.rng.gen_range(margin..=y_max);

        self.spawned += 1;
        let target = ReactionEvent {
            index: self.spawned,
            x,
            y,
            size: self.size,
            spawned_at: now,
            resolved_at: None,
            outcome: None,
        };
        self.active = Some(target.clone());
        Ok(target)
    }

    /// Resolves the active target if `index` names it; anything else is ignored.
    pub fn resolve(
        &mut self,
        index: u32,
        outcome: TargetOutcome,
        now: Instant,
    ) -> Option<ReactionEvent> {
        if self.active.as_ref().map(|target| target.index) != Some(index) {
            return None;
        }

        let mut target = self.active.take()?;
        target.resolved_at = Some(now);
        target.outcome = Some(outcome);
        self.resolved += 1;
        Some(target)
    }
}

/// Largest top-left coordinate that keeps the whole `size × size` footprint inside the
/// play area with `margin` on every side. Pins to the margin when the area is too small.
fn position_bounds(area: PlayArea, size: f64, margin: f64) -> (f64, f64) {
    let x_max = (area.width - size - margin).max(margin);
    let y_max = (area.height - size - margin).max(margin);
    (x_max, y_max)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use std::time::Duration;

    fn generator(area: PlayArea, size: f64) -> TargetGenerator {
        TargetGenerator::new(
            GeneratorConfig::default(),
            area,
            size,
            StdRng::seed_from_u64(7),
        )
    }

    #[test]
    fn targets_stay_inside_margins() {
        let area = PlayArea {
            width: 400.0,
            height: 300.0,
        };
        let mut gen = generator(area, 60.0);
        let now = Instant::now();

        while !gen.is_exhausted() {
            let target = gen.spawn(now).unwrap();
            assert!(target.x >= 20.0 && target.x + target.size <= area.width - 20.0);
            assert!(target.y >= 20.0 && target.y + target.size <= area.height - 20.0);
            gen.resolve(target.index, TargetOutcome::Expired, now).unwrap();
        }
    }

    #[test]
    fn tiny_area_pins_to_margin() {
        let mut gen = generator(
            PlayArea {
                width: 50.0,
                height: 50.0,
            },
            100.0,
        );
        let target = gen.spawn(Instant::now()).unwrap();
        assert_eq!((target.x, target.y), (20.0, 20.0));
    }

    #[test]
    fn refuses_second_unresolved_target() {
        let mut gen = generator(PlayArea::default(), 100.0);
        let now = Instant::now();

        let first = gen.spawn(now).unwrap();
        assert_eq!(
            gen.spawn(now).unwrap_err(),
            GeneratorError::TargetStillActive(first.index)
        );

        gen.resolve(first.index, TargetOutcome::Hit, now).unwrap();
        assert_eq!(gen.spawn(now).unwrap().index, 2);
    }

    #[test]
    fn stops_after_ten() {
        let mut gen = generator(PlayArea::default(), 80.0);
        let now = Instant::now();

        for expected in 1..=10 {
            let target = gen.spawn(now).unwrap();
            assert_eq!(target.index, expected);
            gen.resolve(target.index, TargetOutcome::Expired, now);
        }
        assert!(gen.is_exhausted());
        assert_eq!(gen.spawn(now).unwrap_err(), GeneratorError::Exhausted(10));
        assert_eq!(gen.resolved_count(), 10);
    }

    #[test]
    fn resolve_ignores_stale_index() {
        let mut gen = generator(PlayArea::default(), 45.0);
        let now = Instant::now();
        let target = gen.spawn(now).unwrap();

        assert!(gen.resolve(target.index + 1, TargetOutcome::Hit, now).is_none());
        assert_eq!(
            gen.spawn(now).unwrap_err(),
            GeneratorError::TargetStillActive(target.index)
        );
        assert_eq!(gen.resolved_count(), 0);
        assert!(gen.resolve(target.index, TargetOutcome::Hit, now).is_some());
    }

    #[test]
    fn reaction_time_only_for_hits() {
        let mut gen = generator(PlayArea::default(), 100.0);
        let spawned_at = Instant::now();

        let target = gen.spawn(spawned_at).unwrap();
        let hit = gen
            .resolve(
                target.index,
                TargetOutcome::Hit,
                spawned_at + Duration::from_millis(312),
            )
            .unwrap();
        assert_eq!(hit.reaction_ms(), Some(312));

        let target = gen.spawn(spawned_at).unwrap();
        let expired = gen
            .resolve(
                target.index,
                TargetOutcome::Expired,
                spawned_at + Duration::from_millis(1000),
            )
            .unwrap();
        assert_eq!(expired.reaction_ms(), None);
    }
}
