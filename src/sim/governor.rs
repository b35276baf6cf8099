//! Adaptive bot population
//!
//! Frame cost is smoothed with an exponential moving average. When the
//! average stays above the degrade threshold the target population drops
//! by one step; below the recover threshold it climbs back. Changes are
//! rate limited by a cooldown and only affect future spawns.

use serde::{Deserialize, Serialize};

use crate::config::SlitherConfig;

/// Average assumed before the first observation (60 Hz)
const INITIAL_FRAME_MS: f32 = 1000.0 / 60.0;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BotPerformanceBudget {
    /// Smoothed frame cost in milliseconds
    pub average_frame_time: f32,
    /// Seconds until the target may change again
    pub cooldown: f32,
    pub target_count: usize,
}

impl BotPerformanceBudget {
    pub fn new(config: &SlitherConfig) -> Self {
        Self {
            average_frame_time: INITIAL_FRAME_MS,
            cooldown: 0.0,
            target_count: Self::max_count(config),
        }
    }

    pub fn max_count(config: &SlitherConfig) -> usize {
        config.bots.count
    }

    pub fn min_count(config: &SlitherConfig) -> usize {
        config.bots.min_count.min(config.bots.count)
    }

    /// Feed one frame cost; returns the new target when it changed
    pub fn observe(&mut self, frame_ms: f32, dt: f32, config: &SlitherConfig) -> Option<usize> {
        let bots = &config.bots;
        let sample = if frame_ms.is_finite() {
            frame_ms.clamp(0.0, bots.frame_ceiling_ms)
        } else {
            bots.frame_ceiling_ms
        };
        self.average_frame_time += (sample - self.average_frame_time) * bots.frame_ema_alpha;
        self.cooldown = (self.cooldown - dt).max(0.0);
        if self.cooldown > 0.0 {
            return None;
        }

        let min = Self::min_count(config);
        let max = Self::max_count(config);
        let step = bots.adjust_step.max(1);
        let previous = self.target_count;
        if self.average_frame_time > bots.degrade_frame_ms && self.target_count > min {
            self.target_count = self.target_count.saturating_sub(step).max(min);
        } else if self.average_frame_time < bots.recover_frame_ms && self.target_count < max {
            self.target_count = (self.target_count + step).min(max);
        } else {
            return None;
        }

        self.cooldown = bots.adjust_cooldown;
        log::info!(
            "Bot target {} -> {} (avg frame {:.1} ms)",
            previous,
            self.target_count,
            self.average_frame_time
        );
        Some(self.target_count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    const DT: f32 = 1.0 / 60.0;

    #[test]
    fn test_starts_at_max() {
        let config = SlitherConfig::default();
        let budget = BotPerformanceBudget::new(&config);
        assert_eq!(budget.target_count, config.bots.count);
        assert_eq!(budget.cooldown, 0.0);
    }

    #[test]
    fn test_degrades_under_load_with_cooldown() {
        let config = SlitherConfig::default();
        let mut budget = BotPerformanceBudget::new(&config);
        let start = budget.target_count;

        let mut changes = 0;
        // Two seconds of 40 ms frames
        for _ in 0..120 {
            if budget.observe(40.0, DT, &config).is_some() {
                changes += 1;
            }
        }
        assert!(budget.average_frame_time > config.bots.degrade_frame_ms);
        assert!(budget.target_count < start);
        // Cooldown of 2 s allows at most one change in two seconds
        assert_eq!(changes, 1);
    }

    #[test]
    fn test_recovers_when_frames_are_cheap() {
        let config = SlitherConfig::default();
        let mut budget = BotPerformanceBudget::new(&config);
        budget.target_count = BotPerformanceBudget::min_count(&config);
        for _ in 0..(60 * 60) {
            budget.observe(8.0, DT, &config);
        }
        assert_eq!(budget.target_count, config.bots.count);
    }

    #[test]
    fn test_outliers_are_clamped() {
        let config = SlitherConfig::default();
        let mut budget = BotPerformanceBudget::new(&config);
        budget.cooldown = 100.0;
        budget.observe(f32::INFINITY, DT, &config);
        budget.observe(1.0e9, DT, &config);
        assert!(budget.average_frame_time <= config.bots.frame_ceiling_ms);
    }

    proptest! {
        #[test]
        fn test_target_stays_in_bounds(frames in prop::collection::vec(0.0f32..200.0, 1..400)) {
            let config = SlitherConfig::default();
            let mut budget = BotPerformanceBudget::new(&config);
            for frame in frames {
                budget.observe(frame, 0.5, &config);
                prop_assert!(budget.target_count >= BotPerformanceBudget::min_count(&config));
                prop_assert!(budget.target_count <= BotPerformanceBudget::max_count(&config));
            }
        }
    }
}
