//! Collision detection for snake heads
//!
//! Three checks per snake, in order: arena boundary, own body (strided, past
//! the neck), then every other snake's body through the spatial index.

use glam::Vec2;
use serde::{Deserialize, Serialize};

use super::pellet::ScatterCause;
use super::snake::SnakeState;
use super::spatial::{OccupantKind, QueryFilter, SpatialHash};
use crate::config::SlitherConfig;

/// Why a snake crashed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CrashReason {
    /// Left the arena
    Boundary,
    /// Ran into its own body
    SelfCollision,
    /// Ran into the body of snake `other`
    Snake { other: u32 },
}

impl CrashReason {
    pub fn scatter_cause(self) -> ScatterCause {
        match self {
            CrashReason::Boundary | CrashReason::SelfCollision => ScatterCause::SelfInflicted,
            CrashReason::Snake { .. } => ScatterCause::Collision,
        }
    }
}

/// Body radius stored in the index for each segment
///
/// Head query radius plus body radius equals the collision radius.
pub fn body_radius(config: &SlitherConfig) -> f32 {
    config.collision_radius() * 0.5
}

/// Head beyond `world.radius - boundary_forgiveness`
pub fn hits_boundary(head: Vec2, config: &SlitherConfig) -> bool {
    head.length() > config.world.radius - config.world.boundary_forgiveness
}

/// Head touching its own body past the skip count
///
/// The body is scanned at a stride. A sample close enough that a skipped
/// neighbour could be in reach gets the exact test over the segments up to
/// the next sample, so striding never opens gaps in coverage.
pub fn hits_self(snake: &SnakeState, config: &SlitherConfig) -> bool {
    let head = snake.head();
    let radius = config.collision_radius();
    let stride = config.collision.self_stride.max(1);
    let skip = config.collision.self_skip_segments.max(1);
    let reach = radius + stride as f32 * config.snake.segment_spacing;
    let within = |position: Vec2, r: f32| position.distance_squared(head) < r * r;

    let segments = &snake.segments;
    (skip..segments.len()).step_by(stride).any(|i| {
        within(segments[i].position, reach)
            && segments[i..(i + stride).min(segments.len())]
                .iter()
                .any(|segment| within(segment.position, radius))
    })
}

/// First other snake whose body the head touches, lowest id first
pub fn hits_other(snake: &SnakeState, index: &SpatialHash, config: &SlitherConfig) -> Option<u32> {
    let filter = QueryFilter::kinds(&OccupantKind::SNAKE_PARTS).excluding_owner(snake.id);
    index
        .query(snake.head(), body_radius(config), &filter)
        .first()
        .and_then(|hit| hit.id.owner())
}

/// Run all three checks against the current index contents
pub fn check_snake(snake: &SnakeState, index: &SpatialHash, config: &SlitherConfig) -> Option<CrashReason> {
    if hits_boundary(snake.head(), config) {
        return Some(CrashReason::Boundary);
    }
    if hits_self(snake, config) {
        return Some(CrashReason::SelfCollision);
    }
    hits_other(snake, index, config).map(|other| CrashReason::Snake { other })
}
