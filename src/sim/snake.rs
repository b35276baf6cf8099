//! Snake bodies: path recording and fixed-spacing resampling
//!
//! The head leaves a trail of positions (`path`, newest first). Every tick the
//! trail is trimmed to a bounded arc length and resampled into `segments` at
//! multiples of the segment spacing. Growth only changes how far along the
//! trail we sample, so spacing never distorts when the snake grows or shrinks.

use std::collections::VecDeque;

use glam::Vec2;
use serde::{Deserialize, Serialize};

use super::spatial::{OccupantId, OccupantKind, SpatialOccupant};
use crate::config::SlitherConfig;
use crate::{angle_delta, angle_of, heading, normalize_angle};

/// Below this the growth reserve is considered spent
const RESERVE_EPSILON: f32 = 1e-4;
/// Tail remainders shorter than this are folded into the last sample
const TAIL_EPSILON: f32 = 1e-3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SnakeKind {
    Player,
    Bot,
}

/// One resampled body point
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SnakeSegment {
    pub position: Vec2,
    /// Facing direction of the body at this point (radians)
    pub angle: f32,
    /// Arc length from the head
    pub distance: f32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SnakeState {
    pub id: u32,
    pub kind: SnakeKind,
    /// Head first
    pub segments: Vec<SnakeSegment>,
    /// Sampled body length (never above `target_length`)
    pub length: f32,
    pub target_length: f32,
    /// Unboosted speed in units per second
    pub speed: f32,
    /// Current heading (radians)
    pub heading: f32,
    pub color: String,
    /// Boost charge in [0, 1]
    pub boost_charge: f32,
    pub is_boosting: bool,
    /// Recorded head positions, newest first
    pub path: VecDeque<Vec2>,
    /// Arc length of `path`, kept in step with every push and pop
    pub path_length: f32,
    /// Growth banked from pellets, applied gradually
    pub growth_reserve: f32,
    pub score: f32,
}

impl SnakeState {
    /// Build a straight snake with its tail trailing behind `head`
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        id: u32,
        kind: SnakeKind,
        head: Vec2,
        angle: f32,
        length: f32,
        speed: f32,
        color: String,
        config: &SlitherConfig,
    ) -> Self {
        let spacing = config.snake.segment_spacing;
        let step = spacing * 0.5;
        let back = -heading(angle);
        let trail_len = length + spacing * 2.0;
        let points = (trail_len / step).ceil() as usize + 1;
        let path: VecDeque<Vec2> = (0..points).map(|i| head + back * (i as f32 * step)).collect();
        let path_length = (points - 1) as f32 * step;

        let mut snake = Self {
            id,
            kind,
            segments: Vec::new(),
            length: 0.0,
            target_length: length,
            speed,
            heading: normalize_angle(angle),
            color,
            boost_charge: 1.0,
            is_boosting: false,
            path,
            path_length,
            growth_reserve: 0.0,
            score: 0.0,
        };
        let path_len = snake.trim_path(spacing);
        snake.resample(spacing, path_len);
        snake
    }

    pub fn head(&self) -> Vec2 {
        self.path.front().copied().unwrap_or(Vec2::ZERO)
    }

    /// Bank a pellet's value
    pub fn feed(&mut self, value: f32) {
        self.growth_reserve += value;
        self.score += value;
    }

    /// Move growth reserve into the target length at `rate` units per second
    pub fn apply_growth(&mut self, rate: f32, dt: f32) {
        if self.growth_reserve <= 0.0 {
            return;
        }
        let step = (rate * dt).min(self.growth_reserve);
        self.growth_reserve -= step;
        self.target_length += step;
        if self.growth_reserve < RESERVE_EPSILON {
            self.target_length += self.growth_reserve;
            self.growth_reserve = 0.0;
        }
    }

    /// Update boost charge and length cost; returns the speed multiplier
    pub fn update_boost(&mut self, requested: bool, dt: f32, config: &SlitherConfig) -> f32 {
        let boost = &config.boost;
        self.is_boosting = requested && self.boost_charge > 0.0;
        if self.is_boosting {
            let drain = boost.drain_rate / config.snake.initial_length * dt;
            self.boost_charge = (self.boost_charge - drain).max(0.0);
            if self.target_length > config.snake.min_length {
                self.target_length =
                    (self.target_length - boost.drain_rate * dt).max(config.snake.min_length);
            }
            boost.multiplier
        } else {
            self.boost_charge = (self.boost_charge + boost.regen_rate * dt).min(1.0);
            1.0
        }
    }

    /// Index projections for every segment, head and tail tagged
    pub fn occupants(&self, radius: f32) -> impl Iterator<Item = SpatialOccupant> + '_ {
        let last = self.segments.len().saturating_sub(1);
        self.segments.iter().enumerate().map(move |(i, segment)| SpatialOccupant {
            id: OccupantId::Segment {
                snake: self.id,
                index: i as u32,
            },
            kind: match i {
                0 => OccupantKind::SnakeHead,
                i if i == last => OccupantKind::SnakeTail,
                _ => OccupantKind::SnakeSegment,
            },
            position: segment.position,
            radius,
        })
    }

    /// Speed including the boost multiplier currently in effect
    pub fn effective_speed(&self, config: &SlitherConfig) -> f32 {
        if self.is_boosting {
            self.speed * config.boost.multiplier
        } else {
            self.speed
        }
    }

    /// Advance one tick toward `steering` (unit vector or zero)
    pub fn advance(&mut self, steering: Vec2, boost: bool, dt: f32, config: &SlitherConfig) {
        let spacing = config.snake.segment_spacing;

        self.apply_growth(config.snake.growth_rate, dt);
        let multiplier = self.update_boost(boost, dt, config);

        // Turn rate comes from the unboosted speed, so boosting widens the turn radius
        if steering.length_squared() > 1e-8 {
            let max_turn = self.speed / config.snake.min_turn_radius * dt;
            let delta = angle_delta(self.heading, angle_of(steering)).clamp(-max_turn, max_turn);
            self.heading = normalize_angle(self.heading + delta);
        }

        let distance = self.speed * multiplier * dt;
        let head = self.head() + heading(self.heading) * distance;
        self.path.push_front(head);
        self.path_length += distance;

        let path_len = self.trim_path(spacing);
        self.resample(spacing, path_len);
    }

    /// Drop trail points beyond `target_length + 4 * spacing`; returns the kept arc length
    ///
    /// Pops from the tail only, so the cost is the number of points dropped.
    fn trim_path(&mut self, spacing: f32) -> f32 {
        let max_arc = self.target_length + spacing * 4.0;
        while self.path.len() > 2 {
            let n = self.path.len();
            let last = self.path[n - 2].distance(self.path[n - 1]);
            if self.path_length - last < max_arc {
                break;
            }
            self.path.pop_back();
            self.path_length -= last;
        }
        self.path_length = self.path_length.max(0.0);
        self.path_length
    }

    /// Rebuild `segments` from the trail at multiples of `spacing`
    fn resample(&mut self, spacing: f32, path_len: f32) {
        self.segments.clear();
        let Some(&head) = self.path.front() else {
            self.length = 0.0;
            return;
        };
        self.segments.push(SnakeSegment {
            position: head,
            angle: self.heading,
            distance: 0.0,
        });

        let limit = self.target_length.min(path_len).max(0.0);
        let whole = ((limit + TAIL_EPSILON) / spacing).floor() as usize;
        let tail = (limit - whole as f32 * spacing > TAIL_EPSILON).then_some(limit);
        let targets = (1..=whole).map(|i| i as f32 * spacing).chain(tail);

        let mut cursor = 1;
        let mut walked = 0.0;
        for target in targets {
            let target = target.min(path_len);
            let position = loop {
                if cursor >= self.path.len() {
                    break *self.path.back().unwrap_or(&head);
                }
                let a = self.path[cursor - 1];
                let b = self.path[cursor];
                let span = a.distance(b);
                if walked + span >= target {
                    let t = if span > 0.0 { (target - walked) / span } else { 0.0 };
                    break a.lerp(b, t);
                }
                walked += span;
                cursor += 1;
            };
            let previous = self.segments[self.segments.len() - 1].position;
            self.segments.push(SnakeSegment {
                position,
                angle: angle_of(previous - position),
                distance: target,
            });
        }
        self.length = limit;

        debug_assert!(
            self.segments
                .windows(2)
                .rev()
                .skip(1)
                .all(|w| (w[1].distance - w[0].distance - spacing).abs() < 1e-2),
            "segments must be evenly spaced except the tail pair"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn config() -> SlitherConfig {
        SlitherConfig::default()
    }

    fn snake(config: &SlitherConfig) -> SnakeState {
        SnakeState::new(
            1,
            SnakeKind::Player,
            Vec2::ZERO,
            0.0,
            config.snake.initial_length,
            config.snake.base_speed,
            "#fff".to_string(),
            config,
        )
    }

    fn assert_spacing(s: &SnakeState, spacing: f32) {
        let n = s.segments.len();
        for (i, pair) in s.segments.windows(2).enumerate() {
            let arc = pair[1].distance - pair[0].distance;
            if i + 2 < n {
                assert!((arc - spacing).abs() < 1e-2, "pair {i} arc {arc}");
            } else {
                assert!(arc <= spacing + 1e-2);
            }
            // Chord never longer than the arc it spans
            assert!(pair[0].position.distance(pair[1].position) <= arc + 1e-2);
        }
    }

    #[test]
    fn test_new_snake_is_straight_and_full_length() {
        let config = config();
        let s = snake(&config);
        assert_eq!(s.segments[0].position, Vec2::ZERO);
        assert!((s.length - config.snake.initial_length).abs() < 1e-3);
        // 120 / 12 = 10 whole steps plus the head
        assert_eq!(s.segments.len(), 11);
        let tail = s.segments.last().unwrap();
        assert!((tail.position.x + 120.0).abs() < 1e-2);
        assert_spacing(&s, config.snake.segment_spacing);
    }

    #[test]
    fn test_tail_remainder_segment() {
        let config = config();
        let s = SnakeState::new(1, SnakeKind::Bot, Vec2::ZERO, 0.0, 125.0, 100.0, String::new(), &config);
        assert_eq!(s.segments.len(), 12);
        assert!((s.segments.last().unwrap().distance - 125.0).abs() < 1e-3);
        assert_spacing(&s, config.snake.segment_spacing);
    }

    #[test]
    fn test_turn_rate_is_bounded() {
        let config = config();
        let mut s = snake(&config);
        let dt = 1.0 / 60.0;
        s.advance(Vec2::new(0.0, 1.0), false, dt, &config);
        let max_turn = config.snake.base_speed / config.snake.min_turn_radius * dt;
        assert!((s.heading - max_turn).abs() < 1e-5);
    }

    #[test]
    fn test_zero_steering_keeps_heading() {
        let config = config();
        let mut s = snake(&config);
        s.heading = 0.4;
        s.advance(Vec2::ZERO, false, 1.0 / 60.0, &config);
        assert_eq!(s.heading, 0.4);
    }

    #[test]
    fn test_growth_reserve_applies_gradually() {
        let config = config();
        let mut s = snake(&config);
        let start = s.target_length;
        s.feed(8.0);
        assert_eq!(s.growth_reserve, 8.0);
        assert_eq!(s.score, 8.0);

        s.advance(Vec2::X, false, 1.0 / 60.0, &config);
        assert!(s.growth_reserve > 0.0, "must not apply all at once");
        assert!(s.target_length > start);

        for _ in 0..120 {
            s.advance(Vec2::X, false, 1.0 / 60.0, &config);
        }
        assert_eq!(s.growth_reserve, 0.0);
        assert!((s.target_length - (start + 8.0)).abs() < 1e-3);
        assert!(s.length <= s.target_length + 1e-3);
    }

    #[test]
    fn test_boost_drains_charge_and_length() {
        let config = config();
        let mut s = snake(&config);
        let dt = 1.0 / 60.0;
        let mut last_len = s.target_length;
        let mut last_charge = s.boost_charge;
        for _ in 0..30 {
            s.advance(Vec2::X, true, dt, &config);
            assert!(s.is_boosting);
            assert!(s.target_length < last_len);
            assert!(s.boost_charge < last_charge);
            let expected_shed = config.boost.drain_rate * dt;
            assert!((last_len - s.target_length - expected_shed).abs() < 1e-3);
            last_len = s.target_length;
            last_charge = s.boost_charge;
        }
    }

    #[test]
    fn test_boost_stops_when_charge_empty() {
        let config = config();
        let mut s = snake(&config);
        s.boost_charge = 0.0;
        let before = s.head();
        let dt = 1.0 / 60.0;
        let mult = s.update_boost(true, dt, &config);
        assert_eq!(mult, 1.0);
        assert!(!s.is_boosting);
        s.boost_charge = 0.0;
        s.advance(Vec2::X, true, dt, &config);
        let moved = s.head().distance(before);
        assert!((moved - config.snake.base_speed * dt).abs() < 1e-3);
    }

    #[test]
    fn test_boost_respects_min_length() {
        let config = config();
        let mut s = snake(&config);
        s.target_length = config.snake.min_length + 0.01;
        s.advance(Vec2::X, true, 1.0, &config);
        assert_eq!(s.target_length, config.snake.min_length);
        assert!(s.boost_charge >= 0.0);
    }

    #[test]
    fn test_path_memory_is_bounded() {
        let config = config();
        let mut s = snake(&config);
        for i in 0..2000 {
            let steer = heading(i as f32 * 0.01);
            s.advance(steer, false, 1.0 / 60.0, &config);
        }
        let mut arc = 0.0;
        for i in 1..s.path.len() {
            arc += s.path[i - 1].distance(s.path[i]);
        }
        let bound = s.target_length + config.snake.segment_spacing * 4.0;
        // At most one step past the bound survives the trim
        assert!(arc < bound + config.snake.base_speed / 60.0 + 1.0);
    }

    #[test]
    fn test_cached_path_length_tracks_trail() {
        let config = config();
        let mut s = snake(&config);
        for i in 0..3000 {
            if i % 200 == 0 {
                s.feed(20.0);
            }
            let steer = heading((i as f32 * 0.03).sin() * 2.0);
            s.advance(steer, i % 500 < 60, 1.0 / 60.0, &config);
        }
        let arc: f32 = s.path.iter().zip(s.path.iter().skip(1)).map(|(a, b)| a.distance(*b)).sum();
        assert!((s.path_length - arc).abs() < 0.5, "cached {} vs walked {arc}", s.path_length);
        assert!(s.path_length >= s.target_length);
    }

    proptest! {
        #[test]
        fn prop_spacing_holds_under_moves_and_growth(
            steps in prop::collection::vec((-3.2f32..3.2, any::<bool>(), 0.0f32..6.0), 1..150),
            length in 12.0f32..260.0,
        ) {
            let config = config();
            let mut s = SnakeState::new(1, SnakeKind::Bot, Vec2::ZERO, 0.0, length, 140.0, String::new(), &config);
            for (angle, boost, food) in steps {
                if food > 4.0 {
                    s.feed(food);
                }
                s.advance(heading(angle), boost, 1.0 / 60.0, &config);
                prop_assert!(s.length <= s.target_length + 1e-3);
                let n = s.segments.len();
                for (i, pair) in s.segments.windows(2).enumerate() {
                    let arc = pair[1].distance - pair[0].distance;
                    if i + 2 < n {
                        prop_assert!((arc - config.snake.segment_spacing).abs() < 1e-2);
                    } else {
                        prop_assert!(arc > 0.0 && arc <= config.snake.segment_spacing + 1e-2);
                    }
                }
            }
        }
    }
}
