//! Bot AI engine
//!
//! Each bot runs a three-state machine (wander / chase / evade). Every tick:
//! 1. `observe` gathers what the bot can see (player distance, chase target)
//! 2. `next_mode` picks the mode from that observation (one transition table)
//! 3. the mode produces a desired direction
//! 4. an avoidance vector sampled from nearby bodies bends that direction
//!
//! Avoidance occasionally lapses for a short window so bots make mistakes.

use glam::Vec2;
use rand::Rng;
use serde::{Deserialize, Serialize};

use super::pellet::PelletField;
use super::snake::{SnakeKind, SnakeState};
use super::spatial::{OccupantId, OccupantKind, QueryFilter, SpatialHash};
use crate::config::SlitherConfig;
use crate::{cartesian_to_polar, heading, lerp_angle, normalize_angle, random_in_disc, smoothstep};

/// Spawn point attempts before accepting a spot near the player
const SPAWN_ATTEMPTS: usize = 16;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum BotMode {
    #[default]
    Wander,
    Chase,
    Evade,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BotAiState {
    pub mode: BotMode,
    /// Seconds spent in the current mode
    pub mode_since: f32,
    pub target_direction: Vec2,
    pub target_pellet_id: Option<u32>,
    pub target_position: Option<Vec2>,
    pub wander_angle: f32,
    /// Seconds until the wander heading is re-rolled
    pub wander_timer: f32,
    /// Seconds until chase is allowed again after evading or giving up
    pub cooldown_timer: f32,
    /// Seconds left in the current avoidance lapse
    pub avoidance_mistake_timer: f32,
}

impl BotAiState {
    pub fn new(wander_angle: f32, wander_timer: f32) -> Self {
        Self {
            mode: BotMode::Wander,
            mode_since: 0.0,
            target_direction: heading(wander_angle),
            target_pellet_id: None,
            target_position: None,
            wander_angle,
            wander_timer,
            cooldown_timer: 0.0,
            avoidance_mistake_timer: 0.0,
        }
    }

    fn enter(&mut self, mode: BotMode, config: &SlitherConfig) {
        if self.mode == mode {
            return;
        }
        let gave_up = self.mode == BotMode::Chase && self.mode_since >= config.ai.chase.max_duration;
        if self.mode == BotMode::Evade || gave_up {
            self.cooldown_timer = config.ai.chase.cooldown;
        }
        if mode != BotMode::Chase {
            self.target_pellet_id = None;
            self.target_position = None;
        }
        self.mode = mode;
        self.mode_since = 0.0;
    }
}

/// A bot: its body, its brain and how many times it has respawned
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BotSnakeState {
    pub snake: SnakeState,
    pub ai: BotAiState,
    pub generation: u32,
}

impl BotSnakeState {
    /// Build a bot whose length and speed scale with `generation`
    pub fn spawn<R: Rng + ?Sized>(
        rng: &mut R,
        id: u32,
        generation: u32,
        position: Vec2,
        config: &SlitherConfig,
    ) -> Self {
        let bots = &config.bots;
        let g = generation as f32;
        let length_scale = (1.0 + g * bots.length_growth_per_generation).min(bots.max_length_scale.max(1.0));
        let speed_scale = (1.0 + g * bots.speed_growth_per_generation).min(bots.max_speed_scale.max(1.0));

        let angle = rng.random::<f32>() * std::f32::consts::TAU;
        let palette = &config.colors.palette;
        let color = palette[rng.random_range(0..palette.len())].clone();
        let wander_timer = roll_wander_interval(rng, config);

        let snake = SnakeState::new(
            id,
            SnakeKind::Bot,
            position,
            angle,
            config.snake.initial_length * length_scale,
            config.snake.base_speed * bots.speed_factor * speed_scale,
            color,
            config,
        );
        Self {
            snake,
            ai: BotAiState::new(angle, wander_timer),
            generation,
        }
    }

    pub fn id(&self) -> u32 {
        self.snake.id
    }
}

/// Pick a spawn point inside the arena, clear of every snake body when possible
///
/// A candidate is rejected while it sits within `spawn_clearance` of the
/// player's head or close enough to a body that the new bot's own length could
/// lie across it.
pub fn pick_spawn_point<R: Rng + ?Sized>(
    rng: &mut R,
    config: &SlitherConfig,
    index: &SpatialHash,
    avoid: Option<Vec2>,
) -> Vec2 {
    let radius = config.world.radius * config.bots.spawn_radius_fraction;
    let body_clearance = config.snake.initial_length + config.collision_radius();
    let filter = QueryFilter::kinds(&OccupantKind::SNAKE_PARTS);
    let blocked = |candidate: Vec2| {
        avoid.is_some_and(|player| candidate.distance(player) < config.bots.spawn_clearance)
            || !index.query(candidate, body_clearance, &filter).is_empty()
    };

    let mut candidate = random_in_disc(rng, Vec2::ZERO, radius);
    for _ in 0..SPAWN_ATTEMPTS {
        if !blocked(candidate) {
            break;
        }
        candidate = random_in_disc(rng, Vec2::ZERO, radius);
    }
    candidate
}

fn roll_wander_interval<R: Rng + ?Sized>(rng: &mut R, config: &SlitherConfig) -> f32 {
    let wander = &config.ai.wander;
    if wander.max_interval > wander.min_interval {
        rng.random_range(wander.min_interval..wander.max_interval)
    } else {
        wander.min_interval
    }
}

/// A queued replacement for a dead bot
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BotRespawnEntry {
    pub id: u32,
    pub time_remaining: f32,
    pub generation: u32,
}

/// Dead bots waiting to come back
#[derive(Debug, Clone, Default)]
pub struct RespawnQueue {
    entries: Vec<BotRespawnEntry>,
}

impl RespawnQueue {
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> &[BotRespawnEntry] {
        &self.entries
    }

    /// Queue a replacement after a random delay
    pub fn schedule<R: Rng + ?Sized>(&mut self, rng: &mut R, id: u32, generation: u32, config: &SlitherConfig) {
        let bots = &config.bots;
        let delay = if bots.respawn_delay_max > bots.respawn_delay_min {
            rng.random_range(bots.respawn_delay_min..bots.respawn_delay_max)
        } else {
            bots.respawn_delay_min
        };
        self.entries.push(BotRespawnEntry {
            id,
            time_remaining: delay,
            generation,
        });
    }

    pub fn advance(&mut self, dt: f32) {
        for entry in &mut self.entries {
            entry.time_remaining = (entry.time_remaining - dt).max(0.0);
        }
    }

    /// Take the earliest-queued entry whose delay has elapsed
    pub fn pop_due(&mut self) -> Option<BotRespawnEntry> {
        let idx = self.entries.iter().position(|e| e.time_remaining <= 0.0)?;
        Some(self.entries.remove(idx))
    }
}

/// World state a bot reads while deciding
pub struct AiContext<'a> {
    pub config: &'a SlitherConfig,
    pub index: &'a SpatialHash,
    pub pellets: &'a PelletField,
    /// Player snake, absent once crashed
    pub player: Option<&'a SnakeState>,
}

/// What the bot senses this tick
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Observation {
    pub player_in_range: bool,
    /// Current chase target still exists and has not been reached
    pub target_valid: bool,
    /// Best new pellet to chase, looked up only while wandering off cooldown
    pub candidate: Option<(u32, Vec2)>,
}

/// Steering output for one tick
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct BotCommand {
    pub steering: Vec2,
    pub boost: bool,
}

/// Mode transition table
pub fn next_mode(ai: &BotAiState, obs: &Observation, config: &SlitherConfig) -> BotMode {
    if obs.player_in_range {
        return BotMode::Evade;
    }
    match ai.mode {
        BotMode::Evade if ai.mode_since < config.ai.evade.min_duration => BotMode::Evade,
        BotMode::Evade => BotMode::Wander,
        BotMode::Chase if obs.target_valid && ai.mode_since < config.ai.chase.max_duration => BotMode::Chase,
        BotMode::Chase => BotMode::Wander,
        BotMode::Wander if ai.cooldown_timer <= 0.0 && obs.candidate.is_some() => BotMode::Chase,
        BotMode::Wander => BotMode::Wander,
    }
}

/// Gather the observation for `bot`
pub fn observe(bot: &BotSnakeState, ctx: &AiContext) -> Observation {
    let head = bot.snake.head();
    let ai = &ctx.config.ai;

    let player_in_range = ctx
        .player
        .is_some_and(|p| p.head().distance(head) <= ai.evade.player_radius);

    let target_valid = bot.ai.mode == BotMode::Chase
        && bot
            .ai
            .target_pellet_id
            .and_then(|id| ctx.pellets.get(id))
            .is_some_and(|p| p.position.distance(head) > ai.chase.reach_radius);

    let candidate = if bot.ai.mode == BotMode::Wander && bot.ai.cooldown_timer <= 0.0 && !player_in_range {
        best_pellet(head, ctx)
    } else {
        None
    };

    Observation {
        player_in_range,
        target_valid,
        candidate,
    }
}

/// Highest `value - distance * weight` pellet inside the chase radius
pub fn best_pellet(head: Vec2, ctx: &AiContext) -> Option<(u32, Vec2)> {
    let chase = &ctx.config.ai.chase;
    let kinds = [OccupantKind::Pellet];
    let mut best: Option<(f32, u32, Vec2)> = None;
    for hit in ctx.index.query(head, chase.pellet_radius, &QueryFilter::kinds(&kinds)) {
        let OccupantId::Pellet(id) = hit.id else {
            continue;
        };
        let Some(pellet) = ctx.pellets.get(id) else {
            continue;
        };
        let distance = pellet.position.distance(head);
        if distance <= chase.reach_radius {
            continue;
        }
        let score = pellet.value - distance * chase.distance_weight;
        if best.is_none_or(|(s, ..)| score > s) {
            best = Some((score, id, pellet.position));
        }
    }
    best.map(|(_, id, position)| (id, position))
}

/// Decide this tick's steering for one bot
///
/// `rng` drives gameplay rolls (wander heading); `cosmetic` drives the
/// imperfections (jitter, avoidance lapses).
pub fn think<R: Rng + ?Sized, C: Rng + ?Sized>(
    bot: &mut BotSnakeState,
    ctx: &AiContext,
    rng: &mut R,
    cosmetic: &mut C,
    dt: f32,
) -> BotCommand {
    let config = ctx.config;
    let ai_cfg = &config.ai;

    bot.ai.mode_since += dt;
    bot.ai.cooldown_timer = (bot.ai.cooldown_timer - dt).max(0.0);

    let obs = observe(bot, ctx);
    let mode = next_mode(&bot.ai, &obs, config);
    bot.ai.enter(mode, config);
    if mode == BotMode::Chase && !obs.target_valid {
        if let Some((id, _)) = obs.candidate {
            bot.ai.target_pellet_id = Some(id);
        }
    }

    let head = bot.snake.head();
    let desired = match mode {
        BotMode::Wander => wander_direction(bot, config, rng, cosmetic, dt),
        BotMode::Chase => {
            let target = bot
                .ai
                .target_pellet_id
                .and_then(|id| ctx.pellets.get(id))
                .map(|p| p.position);
            bot.ai.target_position = target;
            target
                .map(|t| (t - head).normalize_or_zero())
                .unwrap_or(bot.ai.target_direction)
        }
        BotMode::Evade => ctx
            .player
            .map(|p| evade_direction(head, p.head(), config))
            .unwrap_or(bot.ai.target_direction),
    };
    let desired = if desired == Vec2::ZERO {
        heading(bot.snake.heading)
    } else {
        desired
    };
    bot.ai.target_direction = desired;

    let avoiding = if bot.ai.avoidance_mistake_timer > 0.0 {
        bot.ai.avoidance_mistake_timer = (bot.ai.avoidance_mistake_timer - dt).max(0.0);
        false
    } else if cosmetic.random::<f32>() < ai_cfg.mistake_chance * dt {
        bot.ai.avoidance_mistake_timer = ai_cfg.mistake_duration;
        false
    } else {
        true
    };

    let steering = if avoiding {
        let push = avoidance_vector(&bot.snake, desired, ctx);
        let blended = (desired + push * ai_cfg.avoidance_strength).normalize_or_zero();
        if blended == Vec2::ZERO { desired } else { blended }
    } else {
        desired
    };

    let charge = bot.snake.boost_charge;
    let boost = mode == BotMode::Evade
        && (charge > ai_cfg.evade.boost_min_charge || (bot.snake.is_boosting && charge > 0.0));

    BotCommand { steering, boost }
}

/// Random heading re-rolled on a timer, bent inward near the arena edge
fn wander_direction<R: Rng + ?Sized, C: Rng + ?Sized>(
    bot: &mut BotSnakeState,
    config: &SlitherConfig,
    rng: &mut R,
    cosmetic: &mut C,
    dt: f32,
) -> Vec2 {
    let wander = &config.ai.wander;
    let ai = &mut bot.ai;

    ai.wander_timer -= dt;
    if ai.wander_timer <= 0.0 {
        ai.wander_angle = rng.random::<f32>() * std::f32::consts::TAU;
        ai.wander_timer = roll_wander_interval(rng, config);
    }
    let drift = (cosmetic.random::<f32>() * 2.0 - 1.0) * wander.jitter * dt;
    ai.wander_angle = normalize_angle(ai.wander_angle + drift);

    let (r, theta) = cartesian_to_polar(bot.snake.head());
    let edge = smoothstep(wander.boundary_start, wander.boundary_end, r / config.world.radius);
    if edge > 0.0 {
        // Rotate toward the center; `edge` is the pull per 60 Hz frame
        let inward = normalize_angle(theta + std::f32::consts::PI);
        let weight = 1.0 - (1.0 - edge).powf(dt * 60.0);
        ai.wander_angle = lerp_angle(ai.wander_angle, inward, weight);
    }
    heading(ai.wander_angle)
}

/// Away from the player with a mild pull toward the center
pub fn evade_direction(head: Vec2, player_head: Vec2, config: &SlitherConfig) -> Vec2 {
    let away = (head - player_head).normalize_or_zero();
    let inward = -head.normalize_or_zero();
    let blended = (away + inward * config.ai.evade.inward_bias).normalize_or_zero();
    if blended == Vec2::ZERO { away } else { blended }
}

/// Repulsion from nearby bodies at the head and at a look-ahead point
///
/// Contributions fall off with inverse distance and reach zero at the
/// avoidance radius; the player's body weighs `player_bias` times more.
/// Result length is at most 1.
pub fn avoidance_vector(snake: &SnakeState, desired: Vec2, ctx: &AiContext) -> Vec2 {
    let ai = &ctx.config.ai;
    let radius = ai.avoidance_radius;
    if radius <= 0.0 {
        return Vec2::ZERO;
    }
    let head = snake.head();
    let player_id = ctx.player.map(|p| p.id);
    let samples = [head, head + desired * ai.lookahead];
    let filter = QueryFilter::kinds(&OccupantKind::SNAKE_PARTS);

    let mut push = Vec2::ZERO;
    for sample in samples {
        for hit in ctx.index.query(sample, radius, &filter) {
            let OccupantId::Segment { snake: owner, index } = hit.id else {
                continue;
            };
            if owner == snake.id && (index as usize) < ai.self_skip_segments {
                continue;
            }
            let offset = sample - hit.position;
            let distance = offset.length().max(1.0);
            let mut weight = (radius / distance - 1.0).max(0.0);
            if Some(owner) == player_id {
                weight *= ai.player_bias;
            }
            push += offset / distance * weight;
        }
    }
    push.clamp_length_max(1.0)
}
